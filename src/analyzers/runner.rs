//! Runs every aggregation metric over the published clean dataset with
//! per-metric fault isolation: one failing metric is reported and skipped,
//! the rest still publish.

use super::{border, leakage, quarters, rain, tips, velocity};
use crate::audit;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::zones::ZoneReference;
use tracing::{error, info};

/// Outcome of one metric run.
#[derive(Debug)]
pub struct MetricReport {
    pub name: &'static str,
    pub error: Option<String>,
}

impl MetricReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

type MetricFn = fn(&PipelineConfig, &ZoneReference) -> Result<()>;

const METRICS: &[(&str, MetricFn)] = &[
    ("leakage_audit", leakage::run),
    ("quarter_comparison", quarters::run),
    ("border_effect", border::run),
    ("velocity_heatmaps", velocity::run),
    ("tip_crowding", tips::run),
    ("rain_elasticity", rain::run),
    ("leakage_zone_audit", audit::write_leakage_zones),
];

/// Runs all metrics. Returns an error only when the shared inputs (clean
/// dataset, zone reference) are unusable; individual metric failures are
/// captured in the reports.
pub fn run_all(cfg: &PipelineConfig) -> Result<Vec<MetricReport>> {
    let clean = cfg.clean_path();
    if !clean.exists() {
        return Err(PipelineError::MissingInput {
            path: clean,
            produced_by: "clean",
        });
    }
    let zones = ZoneReference::load(
        &cfg.zone_csv(),
        &cfg.congestion_borough,
        &cfg.border_zones,
    )?;

    let mut reports = Vec::with_capacity(METRICS.len());
    for (name, metric) in METRICS {
        match metric(cfg, &zones) {
            Ok(()) => {
                info!(metric = name, "Metric published");
                reports.push(MetricReport { name, error: None });
            }
            Err(e) => {
                error!(metric = name, error = %e, "Metric failed, continuing");
                reports.push(MetricReport {
                    name,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    Ok(reports)
}
