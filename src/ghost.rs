//! Ghost Filter Engine: classifies physically-impossible trip records and
//! publishes the canonical clean dataset plus an audit of everything it
//! excluded.
//!
//! The three predicates are independent and non-exclusive: a record may break
//! more than one rule and is then counted in each rule's audit row. The clean
//! dataset is exactly the records breaking none of them, filtered out of the
//! same lazy plan that feeds the audit counts, so the two can never drift.
//!
//! The full scan covers tens of millions of rows, so the stage is guarded by
//! a completion manifest: a rerun over an unchanged input set is a no-op.

use crate::config::{GhostThresholds, PipelineConfig};
use crate::error::{PipelineError, Result, StageOutcome};
use crate::schema::{
    self, CANON_DROPOFF_TIME, CANON_FARE, CANON_PICKUP_TIME, CANON_TAXI_TYPE,
    CANON_TRIP_DISTANCE, TaxiType,
};
use crate::{audit, manifest, output};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub const STAGE_CLEAN: &str = "clean";

/// Derived once per record, persisted in the clean dataset.
pub const TRIP_MINUTES: &str = "trip_minutes";
pub const AVG_SPEED_MPH: &str = "avg_speed_mph";

/// One audit row per classification rule, broken down by taxi type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostAuditRecord {
    pub ghost_type: String,
    pub yellow_count: i64,
    pub green_count: i64,
    pub total_count: i64,
}

/// Adds `trip_minutes` and `avg_speed_mph` to a normalized stream.
///
/// Speed policy (applied pipeline-wide): a non-positive duration yields a
/// null speed. Such records contribute no speed sample anywhere; if they are
/// fraudulent they are caught by the teleporter or stationary rules.
pub fn with_derived_metrics(lf: LazyFrame) -> LazyFrame {
    let as_ms = |name: &str| {
        col(name)
            .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
            .cast(DataType::Int64)
    };

    lf.with_column(
        ((as_ms(CANON_DROPOFF_TIME) - as_ms(CANON_PICKUP_TIME)).cast(DataType::Float64)
            / lit(60_000.0))
        .alias(TRIP_MINUTES),
    )
    .with_column(
        when(col(TRIP_MINUTES).gt(lit(0.0)))
            .then(col(CANON_TRIP_DISTANCE) / (col(TRIP_MINUTES) / lit(60.0)))
            .otherwise(lit(NULL))
            .alias(AVG_SPEED_MPH),
    )
}

/// Faster than the ceiling. Null speed (zero-duration trip) is not a physics
/// ghost.
pub fn physics_ghost(t: &GhostThresholds) -> Expr {
    col(AVG_SPEED_MPH)
        .gt(lit(t.speed_ceiling_mph))
        .fill_null(lit(false))
}

/// Implausibly short but expensive. A null fare cannot prove the rule, so it
/// stays clean rather than vanishing from both the clean set and the audit.
pub fn teleporter_ghost(t: &GhostThresholds) -> Expr {
    col(TRIP_MINUTES)
        .lt(lit(t.min_trip_minutes))
        .and(col(CANON_FARE).gt(lit(t.min_teleport_fare)))
        .fill_null(lit(false))
}

/// Charged for going nowhere.
pub fn stationary_ghost() -> Expr {
    col(CANON_TRIP_DISTANCE)
        .eq(lit(0.0))
        .and(col(CANON_FARE).gt(lit(0.0)))
        .fill_null(lit(false))
}

/// A record is clean iff it breaks none of the three rules.
pub fn clean_mask(t: &GhostThresholds) -> Expr {
    physics_ghost(t)
        .or(teleporter_ghost(t))
        .or(stationary_ghost())
        .not()
}

fn discover_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|e| PipelineError::InvalidConfig(format!("bad glob `{pattern}`: {e}")))?
        .filter_map(|p| p.ok())
        .collect();

    if paths.is_empty() {
        return Err(PipelineError::MissingInput {
            path: PathBuf::from(pattern),
            produced_by: "ingestion provider (raw trip files)",
        });
    }
    Ok(paths)
}

/// The normalized, metric-enriched union of both taxi-type streams.
fn unified_scan(cfg: &PipelineConfig) -> Result<LazyFrame> {
    let mut parts = Vec::new();
    for taxi_type in [TaxiType::Yellow, TaxiType::Green] {
        let pattern = cfg.raw_glob(taxi_type);
        discover_inputs(&pattern)?;
        let lf = LazyFrame::scan_parquet(&pattern, ScanArgsParquet::default())?;
        parts.push(schema::normalize(lf, taxi_type)?);
    }
    let unified = concat(parts.as_slice(), UnionArgs::default())?;
    Ok(with_derived_metrics(unified))
}

fn audit_records(counts: &DataFrame) -> Result<Vec<GhostAuditRecord>> {
    let taxi_type = counts.column(CANON_TAXI_TYPE)?.str()?;
    let mut records = Vec::with_capacity(3);

    for rule in ["physics", "teleporter", "stationary"] {
        let rule_counts = counts.column(rule)?.i64()?;
        let mut yellow = 0i64;
        let mut green = 0i64;
        for i in 0..counts.height() {
            let n = rule_counts.get(i).unwrap_or(0);
            if taxi_type.get(i) == Some("yellow") {
                yellow += n;
            } else {
                green += n;
            }
        }
        records.push(GhostAuditRecord {
            ghost_type: rule.to_string(),
            yellow_count: yellow,
            green_count: green,
            total_count: yellow + green,
        });
    }
    Ok(records)
}

/// Runs the cleaning stage: classify, audit, publish the clean dataset.
///
/// Skips the whole scan when a completion manifest matches the current raw
/// input set (fingerprinted by path and size) and the published clean dataset
/// is still on disk.
pub fn run_clean(cfg: &PipelineConfig) -> Result<StageOutcome> {
    cfg.ensure_dirs()?;

    let mut inputs = discover_inputs(&cfg.raw_glob(TaxiType::Yellow))?;
    inputs.extend(discover_inputs(&cfg.raw_glob(TaxiType::Green))?);
    let fingerprint = manifest::fingerprint(&inputs)?;

    let manifest_path = cfg.clean_manifest_path();
    if manifest::is_satisfied(&manifest_path, STAGE_CLEAN, &fingerprint)? {
        info!(
            clean = %cfg.clean_path().display(),
            "Clean dataset already published for these inputs, skipping rescan"
        );
        return Ok(StageOutcome::Skipped);
    }

    info!(files = inputs.len(), "Cleaning raw trip records");
    let unified = unified_scan(cfg)?;
    let thresholds = &cfg.thresholds;

    // Per-rule counts by taxi type, one grouped scan over the same plan the
    // clean filter runs against.
    let counts = unified
        .clone()
        .group_by([col(CANON_TAXI_TYPE)])
        .agg([
            physics_ghost(thresholds).cast(DataType::Int64).sum().alias("physics"),
            teleporter_ghost(thresholds).cast(DataType::Int64).sum().alias("teleporter"),
            stationary_ghost().cast(DataType::Int64).sum().alias("stationary"),
        ])
        .collect()?;
    let records = audit_records(&counts)?;

    // Reconciliation: every excluded record shows up in the audit counts
    // (modulo overlap between rules).
    let totals = unified
        .clone()
        .select([
            count().cast(DataType::Int64).alias("total"),
            clean_mask(thresholds).cast(DataType::Int64).sum().alias("clean"),
        ])
        .collect()?;
    let total_rows = totals.column("total")?.i64()?.get(0).unwrap_or(0);
    let clean_rows = totals.column("clean")?.i64()?.get(0).unwrap_or(0);
    let audited: i64 = records.iter().map(|r| r.total_count).sum();
    info!(
        total_rows,
        clean_rows,
        excluded = total_rows - clean_rows,
        audited_with_overlap = audited,
        "Ghost classification complete"
    );

    // Streaming sink to a temp path, renamed into place once complete.
    let clean_path = cfg.clean_path();
    let tmp_path = clean_path.with_extension("parquet.tmp");
    unified
        .filter(clean_mask(thresholds))
        .sink_parquet(tmp_path.clone(), ParquetWriteOptions::default())?;
    std::fs::rename(&tmp_path, &clean_path)?;

    output::write_rows(&cfg.ghost_audit_path(), &records)?;
    audit::write_suspicious_entities(cfg, &records)?;

    manifest::record_complete(&manifest_path, STAGE_CLEAN, &fingerprint, &clean_path)?;
    info!(clean = %clean_path.display(), "Clean dataset published");
    Ok(StageOutcome::Ran)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ms, source_frame};

    fn classified(rows: &[crate::test_support::SourceRow]) -> DataFrame {
        let t = GhostThresholds::default();
        let lf = schema::normalize(source_frame(TaxiType::Yellow, rows).lazy(), TaxiType::Yellow)
            .unwrap();
        with_derived_metrics(lf)
            .with_columns([
                physics_ghost(&t).alias("physics"),
                teleporter_ghost(&t).alias("teleporter"),
                stationary_ghost().alias("stationary"),
                clean_mask(&t).alias("clean"),
            ])
            .collect()
            .unwrap()
    }

    fn flag(df: &DataFrame, name: &str, i: usize) -> bool {
        df.column(name).unwrap().bool().unwrap().get(i).unwrap()
    }

    #[test]
    fn test_teleporter_scenario() {
        // 0.5 minutes, $25 fare: teleporter (and, at 600 mph, physics too --
        // overlapping membership is preserved).
        let base = ms(2025, 3, 1, 12, 0, 0);
        let df = classified(&[(base, base + 30_000, 7, 236, 5.0, 25.0, 30.0, 0.0)]);

        assert!(flag(&df, "teleporter", 0));
        assert!(flag(&df, "physics", 0));
        assert!(!flag(&df, "stationary", 0));
        assert!(!flag(&df, "clean", 0));
    }

    #[test]
    fn test_stationary_scenario() {
        let base = ms(2025, 3, 1, 12, 0, 0);
        let df = classified(&[(base, base + 600_000, 7, 236, 0.0, 12.0, 14.0, 0.0)]);

        assert!(flag(&df, "stationary", 0));
        assert!(!flag(&df, "physics", 0));
        assert!(!flag(&df, "teleporter", 0));
        assert!(!flag(&df, "clean", 0));
    }

    #[test]
    fn test_physics_scenario() {
        // 10 miles in 5 minutes = 120 mph.
        let base = ms(2025, 3, 1, 12, 0, 0);
        let df = classified(&[(base, base + 300_000, 7, 236, 10.0, 30.0, 35.0, 0.0)]);

        assert!(flag(&df, "physics", 0));
        assert!(!flag(&df, "teleporter", 0));
        assert!(!flag(&df, "clean", 0));
    }

    #[test]
    fn test_zero_duration_speed_is_null_not_physics() {
        let base = ms(2025, 3, 1, 12, 0, 0);
        // Same pickup and dropoff instant, cheap fare: no rule fires.
        let df = classified(&[(base, base, 7, 236, 1.0, 5.0, 6.0, 0.0)]);

        assert!(df.column(AVG_SPEED_MPH).unwrap().f64().unwrap().get(0).is_none());
        assert!(!flag(&df, "physics", 0));
        assert!(flag(&df, "clean", 0));
    }

    #[test]
    fn test_null_fare_record_stays_clean_and_audited() {
        let base = ms(2025, 3, 1, 12, 0, 0);
        let t = GhostThresholds::default();
        let mut df = source_frame(
            TaxiType::Yellow,
            &[(base, base + 600_000, 7, 236, 0.0, 0.0, 14.0, 0.0)],
        );
        df.with_column(Series::new("fare_amount", &[None::<f64>]))
            .unwrap();

        let lf = schema::normalize(df.lazy(), TaxiType::Yellow).unwrap();
        let out = with_derived_metrics(lf)
            .with_columns([
                physics_ghost(&t).alias("physics"),
                teleporter_ghost(&t).alias("teleporter"),
                stationary_ghost().alias("stationary"),
                clean_mask(&t).alias("clean"),
            ])
            .collect()
            .unwrap();

        // An unprovable rule is false, never null: the record fires nothing
        // and survives into the clean set.
        assert!(!flag(&out, "physics", 0));
        assert!(!flag(&out, "teleporter", 0));
        assert!(!flag(&out, "stationary", 0));
        assert!(flag(&out, "clean", 0));
    }

    #[test]
    fn test_exclusion_law() {
        let base = ms(2025, 3, 1, 12, 0, 0);
        let df = classified(&[
            (base, base + 30_000, 7, 236, 5.0, 25.0, 30.0, 0.0), // ghost
            (base, base + 600_000, 7, 236, 0.0, 12.0, 14.0, 0.0), // ghost
            (base, base + 900_000, 7, 236, 3.0, 14.0, 18.0, 0.75), // clean
        ]);

        for i in 0..df.height() {
            let expected = !flag(&df, "physics", i)
                && !flag(&df, "teleporter", i)
                && !flag(&df, "stationary", i);
            assert_eq!(flag(&df, "clean", i), expected);
        }
    }

    #[test]
    fn test_audit_counts_preserve_overlap() {
        let base = ms(2025, 3, 1, 12, 0, 0);
        let t = GhostThresholds::default();
        let lf = schema::normalize(
            source_frame(
                TaxiType::Yellow,
                // One record that is both physics and teleporter.
                &[(base, base + 30_000, 7, 236, 5.0, 25.0, 30.0, 0.0)],
            )
            .lazy(),
            TaxiType::Yellow,
        )
        .unwrap();

        let counts = with_derived_metrics(lf)
            .group_by([col(CANON_TAXI_TYPE)])
            .agg([
                physics_ghost(&t).cast(DataType::Int64).sum().alias("physics"),
                teleporter_ghost(&t).cast(DataType::Int64).sum().alias("teleporter"),
                stationary_ghost().cast(DataType::Int64).sum().alias("stationary"),
            ])
            .collect()
            .unwrap();

        let records = audit_records(&counts).unwrap();
        let physics = records.iter().find(|r| r.ghost_type == "physics").unwrap();
        let teleporter = records.iter().find(|r| r.ghost_type == "teleporter").unwrap();
        assert_eq!(physics.yellow_count, 1);
        assert_eq!(teleporter.yellow_count, 1);
        assert_eq!(physics.total_count + teleporter.total_count, 2);
    }
}
