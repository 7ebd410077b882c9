//! Pipeline configuration and the ingestion-provider manifest.
//!
//! Stored as plain JSON on disk. Every field has a default mirroring the
//! production deployment, so an empty `{}` config file is valid:
//! ```json
//! {
//!   "data_dir": "data",
//!   "thresholds": { "speed_ceiling_mph": 65.0 },
//!   "border_zones": [236, 237, 238, 239]
//! }
//! ```

use crate::error::{PipelineError, Result};
use crate::schema::TaxiType;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Thresholds for the three ghost-classification predicates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GhostThresholds {
    /// Trips faster than this are physics ghosts.
    pub speed_ceiling_mph: f64,
    /// Trips shorter than this are teleporter candidates.
    pub min_trip_minutes: f64,
    /// A short trip is only a teleporter ghost above this fare.
    pub min_teleport_fare: f64,
}

impl Default for GhostThresholds {
    fn default() -> Self {
        Self {
            speed_ceiling_mph: 65.0,
            min_trip_minutes: 1.0,
            min_teleport_fare: 20.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory holding `raw/`, `processed/` and `audit_logs/`.
    pub data_dir: PathBuf,
    pub thresholds: GhostThresholds,

    /// Borough whose zones approximate the congestion zone.
    pub congestion_borough: String,
    /// Zone IDs just outside the congestion boundary, for the border-effect
    /// metric.
    pub border_zones: Vec<i64>,

    /// Date the surcharge policy took effect; leakage metrics only consider
    /// pickups at or after this instant.
    pub policy_effective_date: NaiveDate,
    /// Year the leakage / tip / rain metrics report on.
    pub target_year: i32,
    /// Half-open pickup window for the quarter comparison and the velocity
    /// heatmap.
    pub comparison_start: NaiveDate,
    pub comparison_end: NaiveDate,

    /// Minimum trips for a pickup zone to appear in the leakage ranking.
    pub min_origin_trips: i64,
    /// Heatmap buckets with at most this many trips are dropped.
    pub min_heatmap_trips: i64,
    /// Fill value for heatmap cells with no surviving bucket.
    pub default_speed_mph: f64,
    pub top_origin_limit: usize,
    pub audit_zone_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            thresholds: GhostThresholds::default(),
            congestion_borough: "Manhattan".to_string(),
            border_zones: vec![236, 237, 238, 239],
            policy_effective_date: NaiveDate::from_ymd_opt(2025, 1, 5)
                .unwrap_or(NaiveDate::MIN),
            target_year: 2025,
            comparison_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            comparison_end: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap_or(NaiveDate::MIN),
            min_origin_trips: 100,
            min_heatmap_trips: 10,
            default_speed_mph: 15.0,
            top_origin_limit: 3,
            audit_zone_limit: 10,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.data_dir.join("audit_logs")
    }

    /// Glob pattern for the raw parquet files of one taxi type.
    pub fn raw_glob(&self, taxi_type: TaxiType) -> String {
        format!(
            "{}/{}/*.parquet",
            self.raw_dir().display(),
            taxi_type.as_str()
        )
    }

    pub fn zone_csv(&self) -> PathBuf {
        self.raw_dir().join("taxi_zones.csv")
    }

    pub fn weather_csv(&self) -> PathBuf {
        self.raw_dir().join("daily_weather.csv")
    }

    pub fn ingestion_manifest_path(&self) -> PathBuf {
        self.raw_dir().join("ingestion_manifest.json")
    }

    pub fn clean_path(&self) -> PathBuf {
        self.processed_dir().join("clean_trips.parquet")
    }

    pub fn clean_manifest_path(&self) -> PathBuf {
        self.processed_dir().join("clean_trips.manifest.json")
    }

    pub fn ghost_audit_path(&self) -> PathBuf {
        self.processed_dir().join("ghost_audit.csv")
    }

    pub fn imputed_month_path(&self) -> PathBuf {
        self.processed_dir().join("imputed_month.csv")
    }

    pub fn summary_path(&self, name: &str) -> PathBuf {
        self.processed_dir().join(format!("{name}.csv"))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.raw_dir())?;
        std::fs::create_dir_all(self.processed_dir())?;
        std::fs::create_dir_all(self.audit_dir())?;
        Ok(())
    }
}

/// One historical month used to reconstruct the missing one.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceMonth {
    pub year: i32,
    pub weight: f64,
    pub path: PathBuf,
    #[serde(default)]
    pub taxi_type: TaxiType,
}

/// What the Ingestion Provider reports about the raw catalog. The
/// `missing_month` signal is authoritative; the pipeline never infers it.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionManifest {
    pub missing_month: bool,
    pub target_year: i32,
    pub target_month: u32,
    #[serde(default)]
    pub reference_months: Vec<ReferenceMonth>,
}

impl IngestionManifest {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                path: path.to_path_buf(),
                produced_by: "ingestion provider",
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
