//! Surcharge leakage: outside→inside trips after the policy effective date
//! that should carry the congestion surcharge, and the pickup zones where it
//! goes missing most often.

use super::types::{LeakageOrigin, LeakageSummary};
use super::{ms_at, pickup_ms, scan_clean};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::output;
use crate::schema::{CANON_DROPOFF_LOC, CANON_PICKUP_LOC, CANON_SURCHARGE};
use crate::zones::ZoneReference;
use chrono::NaiveDate;
use polars::prelude::*;
use std::cmp::Ordering;
use tracing::info;

/// Trips that owe the surcharge: picked up outside the zone, dropped off
/// inside it, at or after the policy effective date.
fn qualifying(lf: LazyFrame, zones: &ZoneReference, policy_date: NaiveDate) -> LazyFrame {
    lf.filter(
        pickup_ms()
            .gt_eq(lit(ms_at(policy_date)))
            .and(zones.outside(col(CANON_PICKUP_LOC)))
            .and(zones.inside(col(CANON_DROPOFF_LOC))),
    )
}

pub fn compute(
    lf: LazyFrame,
    zones: &ZoneReference,
    policy_date: NaiveDate,
    min_origin_trips: i64,
    top_limit: usize,
) -> Result<(LeakageSummary, Vec<LeakageOrigin>)> {
    let base = qualifying(lf, zones, policy_date);

    let totals = base
        .clone()
        .select([
            count().cast(DataType::Int64).alias("total"),
            col(CANON_SURCHARGE)
                .gt(lit(0.0))
                .cast(DataType::Int64)
                .sum()
                .alias("with_surcharge"),
        ])
        .collect()?;
    let total_trips = totals.column("total")?.i64()?.get(0).unwrap_or(0);
    let with_surcharge = totals.column("with_surcharge")?.i64()?.get(0).unwrap_or(0);
    // Guard: an empty qualifying set reports zero compliance, not a division
    // failure.
    let compliance_rate = if total_trips > 0 {
        with_surcharge as f64 / total_trips as f64
    } else {
        0.0
    };

    let summary = LeakageSummary {
        total_trips,
        with_surcharge,
        compliance_rate,
    };

    let by_origin = base
        .group_by([col(CANON_PICKUP_LOC)])
        .agg([
            count().cast(DataType::Int64).alias("trips"),
            col(CANON_SURCHARGE)
                .lt_eq(lit(0.0))
                .cast(DataType::Int64)
                .sum()
                .alias("missing"),
        ])
        // Volume cutoff keeps small-sample zones out of the ranking.
        .filter(col("trips").gt(lit(min_origin_trips)))
        .collect()?;

    let locs = by_origin.column(CANON_PICKUP_LOC)?.i64()?;
    let trips = by_origin.column("trips")?.i64()?;
    let missing = by_origin.column("missing")?.i64()?;

    let mut origins = Vec::with_capacity(by_origin.height());
    for i in 0..by_origin.height() {
        let trip_count = trips.get(i).unwrap_or(0);
        if trip_count == 0 {
            continue;
        }
        origins.push(LeakageOrigin {
            pickup_loc: locs.get(i).unwrap_or(0),
            trips: trip_count,
            missing_rate: missing.get(i).unwrap_or(0) as f64 / trip_count as f64,
        });
    }
    origins.sort_by(|a, b| {
        b.missing_rate
            .partial_cmp(&a.missing_rate)
            .unwrap_or(Ordering::Equal)
            .then(b.trips.cmp(&a.trips))
    });
    origins.truncate(top_limit);

    Ok((summary, origins))
}

pub fn run(cfg: &PipelineConfig, zones: &ZoneReference) -> Result<()> {
    let (summary, origins) = compute(
        scan_clean(cfg)?,
        zones,
        cfg.policy_effective_date,
        cfg.min_origin_trips,
        cfg.top_origin_limit,
    )?;

    info!(
        total = summary.total_trips,
        compliance_rate = summary.compliance_rate,
        "Leakage audit"
    );
    output::write_rows(&cfg.summary_path("leakage_audit"), &[summary])?;
    output::write_rows(&cfg.summary_path("top_leakage_origins"), &origins)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TaxiType;
    use crate::test_support::{clean_frame, ms};

    fn policy() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
    }

    /// Outside (7) to inside (100) after the policy date, with a surcharge.
    fn qualifying_trip(day: u32, surcharge: f64) -> (TaxiType, crate::test_support::SourceRow) {
        let pickup = ms(2025, 2, day, 9, 0, 0);
        (
            TaxiType::Yellow,
            (pickup, pickup + 900_000, 7, 100, 3.0, 15.0, 20.0, surcharge),
        )
    }

    #[test]
    fn test_compliance_rate_is_k_over_n() {
        let zones = ZoneReference::from_ids(vec![100], vec![]);
        // Four qualifying trips, three with a surcharge.
        let df = clean_frame(&[
            qualifying_trip(1, 0.75),
            qualifying_trip(2, 0.75),
            qualifying_trip(3, 2.50),
            qualifying_trip(4, 0.0),
        ]);

        let (summary, _) = compute(df.lazy(), &zones, policy(), 0, 3).unwrap();
        assert_eq!(summary.total_trips, 4);
        assert_eq!(summary.with_surcharge, 3);
        assert!((summary.compliance_rate - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_non_qualifying_trips_excluded() {
        let zones = ZoneReference::from_ids(vec![100], vec![]);
        let before_policy = ms(2025, 1, 2, 9, 0, 0);
        let inside_pickup = ms(2025, 2, 1, 9, 0, 0);
        let df = clean_frame(&[
            qualifying_trip(1, 0.75),
            // Before the policy date.
            (
                TaxiType::Yellow,
                (before_policy, before_policy + 900_000, 7, 100, 3.0, 15.0, 20.0, 0.0),
            ),
            // Pickup already inside the zone.
            (
                TaxiType::Yellow,
                (inside_pickup, inside_pickup + 900_000, 100, 100, 3.0, 15.0, 20.0, 0.0),
            ),
        ]);

        let (summary, _) = compute(df.lazy(), &zones, policy(), 0, 3).unwrap();
        assert_eq!(summary.total_trips, 1);
        assert_eq!(summary.with_surcharge, 1);
    }

    #[test]
    fn test_empty_qualifying_set_guards_division() {
        let zones = ZoneReference::from_ids(vec![100], vec![]);
        let before_policy = ms(2024, 6, 1, 9, 0, 0);
        let df = clean_frame(&[(
            TaxiType::Yellow,
            (before_policy, before_policy + 900_000, 7, 100, 3.0, 15.0, 20.0, 0.0),
        )]);

        let (summary, origins) = compute(df.lazy(), &zones, policy(), 0, 3).unwrap();
        assert_eq!(summary.total_trips, 0);
        assert_eq!(summary.compliance_rate, 0.0);
        assert!(origins.is_empty());
    }

    #[test]
    fn test_origin_ranking_applies_cutoff_and_limit() {
        let zones = ZoneReference::from_ids(vec![100], vec![]);
        let mut rows = Vec::new();
        // Zone 7: 3 trips, all missing the surcharge.
        for day in 1..=3 {
            rows.push(qualifying_trip(day, 0.0));
        }
        // Zone 8: 3 trips, one missing.
        for (day, surcharge) in [(1, 0.0), (2, 0.75), (3, 0.75)] {
            let pickup = ms(2025, 2, day, 12, 0, 0);
            rows.push((
                TaxiType::Green,
                (pickup, pickup + 900_000, 8, 100, 3.0, 15.0, 20.0, surcharge),
            ));
        }
        // Zone 9: a single trip, below the volume cutoff.
        let pickup = ms(2025, 2, 9, 12, 0, 0);
        rows.push((
            TaxiType::Yellow,
            (pickup, pickup + 900_000, 9, 100, 3.0, 15.0, 20.0, 0.0),
        ));

        let (_, origins) = compute(clean_frame(&rows).lazy(), &zones, policy(), 2, 3).unwrap();
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0].pickup_loc, 7);
        assert!((origins[0].missing_rate - 1.0).abs() < 1e-12);
        assert_eq!(origins[1].pickup_loc, 8);
        assert!((origins[1].missing_rate - 1.0 / 3.0).abs() < 1e-12);
    }
}
