//! Tip crowding: does a rising surcharge eat into the share riders tip?
//! Monthly averages over the target year.

use super::scan_clean;
use super::types::TipCrowding;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::output;
use crate::schema::{CANON_FARE, CANON_PICKUP_TIME, CANON_SURCHARGE, CANON_TOTAL_AMOUNT};
use crate::zones::ZoneReference;
use polars::prelude::*;

pub fn compute(lf: LazyFrame, target_year: i32) -> Result<Vec<TipCrowding>> {
    let grouped = lf
        .filter(col(CANON_PICKUP_TIME).dt().year().eq(lit(target_year)))
        .with_column(
            // Everything above fare + surcharge is treated as tip. Zero-total
            // rows contribute no sample rather than an infinite ratio.
            when(col(CANON_TOTAL_AMOUNT).neq(lit(0.0)))
                .then(
                    (col(CANON_TOTAL_AMOUNT) - col(CANON_FARE) - col(CANON_SURCHARGE))
                        / col(CANON_TOTAL_AMOUNT),
                )
                .otherwise(lit(NULL))
                .alias("tip_pct"),
        )
        .group_by([col(CANON_PICKUP_TIME)
            .dt()
            .month()
            .cast(DataType::UInt32)
            .alias("month")])
        .agg([
            col(CANON_SURCHARGE).mean().alias("avg_surcharge"),
            col("tip_pct").mean().alias("avg_tip_pct"),
        ])
        .sort("month", SortOptions::default())
        .collect()?;

    let months = grouped.column("month")?.u32()?;
    let surcharges = grouped.column("avg_surcharge")?.f64()?;
    let tip_pcts = grouped.column("avg_tip_pct")?.f64()?;

    let mut rows = Vec::with_capacity(grouped.height());
    for i in 0..grouped.height() {
        rows.push(TipCrowding {
            month: months.get(i).unwrap_or(0),
            avg_surcharge: surcharges.get(i).unwrap_or(0.0),
            avg_tip_pct: tip_pcts.get(i),
        });
    }
    Ok(rows)
}

pub fn run(cfg: &PipelineConfig, _zones: &ZoneReference) -> Result<()> {
    let rows = compute(scan_clean(cfg)?, cfg.target_year)?;
    output::write_rows(&cfg.summary_path("tip_crowding_monthly"), &rows)?;
    Ok(())
}
