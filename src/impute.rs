//! Imputation Engine: reconstructs a missing reporting month as a weighted
//! blend of day-of-month aggregates from historical reference months.
//!
//! Runs only when the Ingestion Provider signals the missing month. The
//! combination is total over every calendar day of the target month: a day
//! absent from a reference contributes a zero trip count, and averages are
//! blended only when every reference has the day (null otherwise), so no day
//! is silently dropped.

use crate::config::{IngestionManifest, PipelineConfig, ReferenceMonth};
use crate::error::{PipelineError, Result, StageOutcome};
use crate::schema::{self, CANON_FARE, CANON_PICKUP_TIME, CANON_TRIP_DISTANCE};
use crate::output;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

pub const STAGE_IMPUTE: &str = "impute";

/// Projected metrics for one day of the reconstructed month.
#[derive(Debug, Clone, Serialize)]
pub struct ImputedDay {
    pub date: String,
    pub trips: f64,
    pub avg_distance: Option<f64>,
    pub avg_fare: Option<f64>,
}

struct DayAggregate {
    trips: i64,
    avg_distance: Option<f64>,
    avg_fare: Option<f64>,
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        PipelineError::InvalidConfig(format!("invalid target month {year}-{month:02}"))
    })?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| {
        PipelineError::InvalidConfig(format!("invalid target month {year}-{month:02}"))
    })?;
    Ok((next - first).num_days() as u32)
}

/// Day-of-month aggregates for one reference file: trip count, mean distance,
/// mean fare.
fn daily_aggregates(reference: &ReferenceMonth) -> Result<HashMap<u32, DayAggregate>> {
    if !reference.path.exists() {
        return Err(PipelineError::MissingInput {
            path: reference.path.clone(),
            produced_by: "ingestion provider (reference month files)",
        });
    }

    let lf = LazyFrame::scan_parquet(&reference.path, ScanArgsParquet::default())?;
    let df = schema::normalize(lf, reference.taxi_type)?
        .group_by([col(CANON_PICKUP_TIME)
            .dt()
            .day()
            .cast(DataType::UInt32)
            .alias("day")])
        .agg([
            count().cast(DataType::Int64).alias("trips"),
            col(CANON_TRIP_DISTANCE).mean().alias("avg_distance"),
            col(CANON_FARE).mean().alias("avg_fare"),
        ])
        .collect()?;

    let days = df.column("day")?.u32()?;
    let trips = df.column("trips")?.i64()?;
    let avg_distance = df.column("avg_distance")?.f64()?;
    let avg_fare = df.column("avg_fare")?.f64()?;

    let mut out = HashMap::with_capacity(df.height());
    for i in 0..df.height() {
        if let Some(day) = days.get(i) {
            out.insert(
                day,
                DayAggregate {
                    trips: trips.get(i).unwrap_or(0),
                    avg_distance: avg_distance.get(i),
                    avg_fare: avg_fare.get(i),
                },
            );
        }
    }
    Ok(out)
}

fn blend(
    references: &[ReferenceMonth],
    aggregates: &[HashMap<u32, DayAggregate>],
    day: u32,
    metric: impl Fn(&DayAggregate) -> Option<f64>,
) -> Option<f64> {
    let mut total = 0.0;
    for (reference, by_day) in references.iter().zip(aggregates) {
        total += reference.weight * metric(by_day.get(&day)?)?;
    }
    Some(total)
}

/// Blends the references into one projected row per calendar day of the
/// target month.
pub fn impute_month(
    references: &[ReferenceMonth],
    target_year: i32,
    target_month: u32,
) -> Result<Vec<ImputedDay>> {
    if references.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "imputation requires at least one reference month".to_string(),
        ));
    }
    let weight_sum: f64 = references.iter().map(|r| r.weight).sum();
    if (weight_sum - 1.0).abs() > 1e-6 {
        return Err(PipelineError::InvalidConfig(format!(
            "imputation weights sum to {weight_sum}, expected 1.0"
        )));
    }

    let aggregates: Vec<HashMap<u32, DayAggregate>> = references
        .iter()
        .map(daily_aggregates)
        .collect::<Result<_>>()?;

    let days = days_in_month(target_year, target_month)?;
    let mut rows = Vec::with_capacity(days as usize);
    for day in 1..=days {
        let trips: f64 = references
            .iter()
            .zip(&aggregates)
            .map(|(r, by_day)| r.weight * by_day.get(&day).map_or(0, |a| a.trips) as f64)
            .sum();

        rows.push(ImputedDay {
            date: format!("{target_year}-{target_month:02}-{day:02}"),
            trips,
            avg_distance: blend(references, &aggregates, day, |a| a.avg_distance),
            avg_fare: blend(references, &aggregates, day, |a| a.avg_fare),
        });
    }
    Ok(rows)
}

/// Runs the imputation stage when (and only when) the ingestion manifest
/// signals that the latest month is missing.
pub fn run_impute(cfg: &PipelineConfig) -> Result<StageOutcome> {
    cfg.ensure_dirs()?;
    let manifest = IngestionManifest::load(&cfg.ingestion_manifest_path())?;

    if !manifest.missing_month {
        info!("Ingestion provider reports no missing month, nothing to impute");
        return Ok(StageOutcome::Skipped);
    }

    info!(
        target_year = manifest.target_year,
        target_month = manifest.target_month,
        references = manifest.reference_months.len(),
        "Imputing missing month"
    );

    let rows = impute_month(
        &manifest.reference_months,
        manifest.target_year,
        manifest.target_month,
    )?;
    output::write_rows(&cfg.imputed_month_path(), &rows)?;
    info!(days = rows.len(), path = %cfg.imputed_month_path().display(), "Imputed month published");
    Ok(StageOutcome::Ran)
}
