//! Audit-log tables for human review. These live under `audit_logs/` and
//! are never read back by the pipeline.

use crate::analyzers::{ms_at, pickup_ms, scan_clean};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ghost::GhostAuditRecord;
use crate::output;
use crate::schema::{CANON_DROPOFF_LOC, CANON_PICKUP_LOC, CANON_SURCHARGE};
use crate::zones::ZoneReference;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
struct SuspiciousEntity {
    rank: usize,
    taxi_type: &'static str,
    ghost_records: i64,
}

#[derive(Debug, Serialize)]
struct LeakageZone {
    rank: usize,
    pickup_loc: i64,
    missing_surcharge_trips: i64,
}

/// Ranks the fleet entities by how many ghost classifications their records
/// drew, across all rules (overlap included).
pub fn write_suspicious_entities(
    cfg: &PipelineConfig,
    records: &[GhostAuditRecord],
) -> Result<()> {
    let yellow: i64 = records.iter().map(|r| r.yellow_count).sum();
    let green: i64 = records.iter().map(|r| r.green_count).sum();

    let mut ranked = [("yellow", yellow), ("green", green)];
    ranked.sort_by_key(|(_, n)| std::cmp::Reverse(*n));

    let rows: Vec<SuspiciousEntity> = ranked
        .into_iter()
        .enumerate()
        .map(|(i, (taxi_type, n))| SuspiciousEntity {
            rank: i + 1,
            taxi_type,
            ghost_records: n,
        })
        .collect();

    std::fs::create_dir_all(cfg.audit_dir())?;
    output::write_rows(&cfg.audit_dir().join("suspicious_entities.csv"), &rows)?;
    Ok(())
}

/// Pickup zones sending the most surcharge-free trips into the congestion
/// zone after the policy date, for enforcement follow-up.
pub fn write_leakage_zones(cfg: &PipelineConfig, zones: &ZoneReference) -> Result<()> {
    let grouped = scan_clean(cfg)?
        .filter(
            pickup_ms()
                .gt_eq(lit(ms_at(cfg.policy_effective_date)))
                .and(zones.inside(col(CANON_DROPOFF_LOC)))
                .and(col(CANON_SURCHARGE).lt_eq(lit(0.0))),
        )
        .group_by([col(CANON_PICKUP_LOC)])
        .agg([count().cast(DataType::Int64).alias("missing")])
        .sort(
            "missing",
            SortOptions {
                descending: true,
                ..Default::default()
            },
        )
        .limit(cfg.audit_zone_limit as u32)
        .collect()?;

    let locs = grouped.column(CANON_PICKUP_LOC)?.i64()?;
    let missing = grouped.column("missing")?.i64()?;
    let rows: Vec<LeakageZone> = (0..grouped.height())
        .map(|i| LeakageZone {
            rank: i + 1,
            pickup_loc: locs.get(i).unwrap_or(0),
            missing_surcharge_trips: missing.get(i).unwrap_or(0),
        })
        .collect();

    std::fs::create_dir_all(cfg.audit_dir())?;
    let path = cfg.audit_dir().join("leakage_zones.csv");
    output::write_rows(&path, &rows)?;
    info!(zones = rows.len(), path = %path.display(), "Leakage zone audit written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    fn record(ghost_type: &str, yellow: i64, green: i64) -> GhostAuditRecord {
        GhostAuditRecord {
            ghost_type: ghost_type.to_string(),
            yellow_count: yellow,
            green_count: green,
            total_count: yellow + green,
        }
    }

    #[test]
    fn test_suspicious_entities_ranked_by_ghost_volume() {
        let dir = scratch_dir("audit_entities");
        let cfg = PipelineConfig {
            data_dir: dir.clone(),
            ..Default::default()
        };

        write_suspicious_entities(
            &cfg,
            &[record("physics", 2, 10), record("stationary", 1, 5)],
        )
        .unwrap();

        let content =
            std::fs::read_to_string(cfg.audit_dir().join("suspicious_entities.csv")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "rank,taxi_type,ghost_records");
        assert_eq!(lines[1], "1,green,15");
        assert_eq!(lines[2], "2,yellow,3");
    }
}
