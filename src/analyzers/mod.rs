//! Aggregation Engine: scan-once relational summaries over the clean trip
//! dataset.
//!
//! Each metric module exposes a pure `compute` over a lazy frame plus a `run`
//! that opens its own scoped scan of the clean parquet and publishes one
//! small CSV. The runner executes them with per-metric fault isolation.

pub mod border;
pub mod leakage;
pub mod quarters;
pub mod rain;
pub mod runner;
pub mod tips;
pub mod types;
pub mod utility;
pub mod velocity;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::schema::CANON_PICKUP_TIME;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;

/// Opens a fresh lazy scan over the published clean dataset. Every metric
/// calls this itself so stages stay independently re-runnable.
pub(crate) fn scan_clean(cfg: &PipelineConfig) -> Result<LazyFrame> {
    let path = cfg.clean_path();
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            path,
            produced_by: "clean",
        });
    }
    Ok(LazyFrame::scan_parquet(path, ScanArgsParquet::default())?)
}

/// Pickup timestamp as epoch milliseconds, for window filters against
/// [`ms_at`] thresholds.
pub(crate) fn pickup_ms() -> Expr {
    col(CANON_PICKUP_TIME)
        .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
        .cast(DataType::Int64)
}

/// Epoch milliseconds at midnight of a civil date.
pub(crate) fn ms_at(date: NaiveDate) -> i64 {
    NaiveDateTime::new(date, NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}

/// Pickup restricted to the half-open `[start, end)` window.
pub(crate) fn pickup_window(start: NaiveDate, end: NaiveDate) -> Expr {
    pickup_ms()
        .gt_eq(lit(ms_at(start)))
        .and(pickup_ms().lt(lit(ms_at(end))))
}
