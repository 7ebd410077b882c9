//! Border-effect check: year-over-year dropoff volume in the zones ringing
//! the congestion boundary, where priced-out trips would spill over.

use super::scan_clean;
use super::types::BorderEffect;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::output;
use crate::schema::{CANON_DROPOFF_LOC, CANON_PICKUP_TIME};
use crate::zones::ZoneReference;
use polars::prelude::*;
use std::collections::BTreeMap;

pub fn compute(
    lf: LazyFrame,
    zones: &ZoneReference,
    target_year: i32,
) -> Result<Vec<BorderEffect>> {
    let prior_year = target_year - 1;
    let grouped = lf
        .filter(zones.in_border(col(CANON_DROPOFF_LOC)).and(
            col(CANON_PICKUP_TIME)
                .dt()
                .year()
                .is_in(lit(Series::new("years", vec![prior_year, target_year]))),
        ))
        .group_by([
            col(CANON_DROPOFF_LOC),
            col(CANON_PICKUP_TIME).dt().year().alias("year"),
        ])
        .agg([count().cast(DataType::Int64).alias("dropoffs")])
        .collect()?;

    let locs = grouped.column(CANON_DROPOFF_LOC)?.i64()?;
    let years = grouped.column("year")?.i32()?;
    let dropoffs = grouped.column("dropoffs")?.i64()?;

    // (prior, latest) dropoff counts per border zone, defaulting to zero for
    // the year a zone never appears in.
    let mut by_zone: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
    for i in 0..grouped.height() {
        let loc = locs.get(i).unwrap_or(0);
        let n = dropoffs.get(i).unwrap_or(0);
        let entry = by_zone.entry(loc).or_insert((0, 0));
        if years.get(i) == Some(prior_year) {
            entry.0 = n;
        } else {
            entry.1 = n;
        }
    }

    let rows = by_zone
        .into_iter()
        .map(|(loc, (prior, latest))| {
            let pct_change = if prior > 0 {
                (latest as f64 / prior as f64 - 1.0) * 100.0
            } else {
                0.0
            };
            BorderEffect {
                dropoff_loc: loc,
                prior_year,
                prior_dropoffs: prior,
                latest_year: target_year,
                latest_dropoffs: latest,
                pct_change,
            }
        })
        .collect();
    Ok(rows)
}

pub fn run(cfg: &PipelineConfig, zones: &ZoneReference) -> Result<()> {
    let rows = compute(scan_clean(cfg)?, zones, cfg.target_year)?;
    output::write_rows(&cfg.summary_path("border_effect"), &rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TaxiType;
    use crate::test_support::{clean_frame, ms};

    fn border_dropoff(year: i32, day: u32, loc: i64) -> (TaxiType, crate::test_support::SourceRow) {
        let pickup = ms(year, 3, day, 10, 0, 0);
        (
            TaxiType::Yellow,
            (pickup, pickup + 900_000, 50, loc, 2.0, 10.0, 14.0, 0.0),
        )
    }

    #[test]
    fn test_pct_change_year_over_year() {
        let zones = ZoneReference::from_ids(vec![100], vec![236]);
        let mut rows = Vec::new();
        for day in 1..=5 {
            rows.push(border_dropoff(2024, day, 236));
        }
        for day in 1..=6 {
            rows.push(border_dropoff(2025, day, 236));
        }

        let effects = compute(clean_frame(&rows).lazy(), &zones, 2025).unwrap();
        assert_eq!(effects.len(), 1);
        let e = &effects[0];
        assert_eq!(e.dropoff_loc, 236);
        assert_eq!(e.prior_dropoffs, 5);
        assert_eq!(e.latest_dropoffs, 6);
        assert!((e.pct_change - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_prior_reports_zero_change() {
        let zones = ZoneReference::from_ids(vec![100], vec![236]);
        let effects = compute(
            clean_frame(&[border_dropoff(2025, 1, 236)]).lazy(),
            &zones,
            2025,
        )
        .unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].prior_dropoffs, 0);
        assert_eq!(effects[0].latest_dropoffs, 1);
        assert_eq!(effects[0].pct_change, 0.0);
    }

    #[test]
    fn test_only_border_dropoffs_and_both_years_counted() {
        let zones = ZoneReference::from_ids(vec![100], vec![236]);
        let effects = compute(
            clean_frame(&[
                border_dropoff(2024, 1, 236),
                // Non-border dropoff.
                border_dropoff(2024, 2, 50),
                // Outside the two-year comparison.
                border_dropoff(2023, 3, 236),
            ])
            .lazy(),
            &zones,
            2025,
        )
        .unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].prior_dropoffs, 1);
        assert_eq!(effects[0].latest_dropoffs, 0);
        // A nonzero prior year divides normally: all dropoffs gone is -100%.
        assert!((effects[0].pct_change + 100.0).abs() < 1e-9);
    }
}
