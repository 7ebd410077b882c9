//! Quarterly volume of trips entering the congestion zone, split by taxi
//! type, across the before/after comparison window.

use super::types::QuarterVolume;
use super::{pickup_window, scan_clean};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::output;
use crate::schema::{CANON_DROPOFF_LOC, CANON_PICKUP_LOC, CANON_PICKUP_TIME, CANON_TAXI_TYPE};
use crate::zones::ZoneReference;
use chrono::NaiveDate;
use polars::prelude::*;

pub fn compute(
    lf: LazyFrame,
    zones: &ZoneReference,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<QuarterVolume>> {
    let grouped = lf
        .filter(
            pickup_window(start, end)
                .and(zones.outside(col(CANON_PICKUP_LOC)))
                .and(zones.inside(col(CANON_DROPOFF_LOC))),
        )
        .group_by([
            col(CANON_PICKUP_TIME).dt().year().alias("year"),
            col(CANON_PICKUP_TIME)
                .dt()
                .quarter()
                .cast(DataType::Int32)
                .alias("quarter"),
            col(CANON_TAXI_TYPE),
        ])
        .agg([count().cast(DataType::Int64).alias("trips")])
        .sort_by_exprs(
            vec![col("year"), col("quarter"), col(CANON_TAXI_TYPE)],
            vec![false, false, false],
            false,
            false,
        )
        .collect()?;

    let years = grouped.column("year")?.i32()?;
    let quarters = grouped.column("quarter")?.i32()?;
    let taxi_types = grouped.column(CANON_TAXI_TYPE)?.str()?;
    let trips = grouped.column("trips")?.i64()?;

    let mut rows = Vec::with_capacity(grouped.height());
    for i in 0..grouped.height() {
        let year = years.get(i).unwrap_or(0);
        let quarter = quarters.get(i).unwrap_or(1);
        rows.push(QuarterVolume {
            quarter_start: format!("{year}-{:02}-01", (quarter - 1) * 3 + 1),
            taxi_type: taxi_types.get(i).unwrap_or("").to_string(),
            trips_into_zone: trips.get(i).unwrap_or(0),
        });
    }
    Ok(rows)
}

pub fn run(cfg: &PipelineConfig, zones: &ZoneReference) -> Result<()> {
    let rows = compute(
        scan_clean(cfg)?,
        zones,
        cfg.comparison_start,
        cfg.comparison_end,
    )?;
    output::write_rows(&cfg.summary_path("quarter_comparison"), &rows)?;
    Ok(())
}
