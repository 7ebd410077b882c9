//! Rain elasticity: daily trip volume and distance against precipitation,
//! anchored on the weather table so dry data gaps still show up as
//! zero-trip days.

use super::types::{MonthlyRain, RainDay};
use super::{scan_clean, utility};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::output;
use crate::schema::{CANON_PICKUP_TIME, CANON_TRIP_DISTANCE};
use crate::zones::ZoneReference;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

fn scan_weather(path: &Path, target_year: i32) -> Result<LazyFrame> {
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
            produced_by: "weather provider",
        });
    }
    let lf = LazyCsvReader::new(path)
        .has_header(true)
        .with_try_parse_dates(true)
        .finish()?
        .select([
            col("date").cast(DataType::Date),
            col("precipitation_mm")
                .cast(DataType::Float64)
                .fill_null(lit(0.0)),
        ])
        // The year filter lives on the weather side so days with zero
        // surviving trips stay in the table.
        .filter(col("date").dt().year().eq(lit(target_year)));
    Ok(lf)
}

pub fn compute(
    trips: LazyFrame,
    weather: LazyFrame,
    target_year: i32,
) -> Result<(Vec<RainDay>, Vec<MonthlyRain>)> {
    let daily_trips = trips
        .filter(col(CANON_PICKUP_TIME).dt().year().eq(lit(target_year)))
        .group_by([col(CANON_PICKUP_TIME).cast(DataType::Date).alias("date")])
        .agg([
            count().cast(DataType::Int64).alias("daily_trips"),
            col(CANON_TRIP_DISTANCE).mean().alias("avg_distance"),
        ]);

    let joined = weather
        .join(
            daily_trips,
            [col("date")],
            [col("date")],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(col("daily_trips").fill_null(lit(0i64)))
        .with_column(col("date").dt().month().cast(DataType::UInt32).alias("month"))
        .sort("date", SortOptions::default())
        .collect()?;

    let dates = joined.column("date")?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let months = joined.column("month")?.u32()?;
    let prcp = joined.column("precipitation_mm")?.f64()?;
    let trips_col = joined.column("daily_trips")?.i64()?;
    let distances = joined.column("avg_distance")?.f64()?;

    let xs: Vec<f64> = (0..joined.height())
        .map(|i| prcp.get(i).unwrap_or(0.0))
        .collect();
    let ys: Vec<f64> = (0..joined.height())
        .map(|i| trips_col.get(i).unwrap_or(0) as f64)
        .collect();
    let corr = utility::pearson(&xs, &ys);

    let mut days = Vec::with_capacity(joined.height());
    let mut by_month: BTreeMap<u32, (f64, Vec<f64>)> = BTreeMap::new();
    for i in 0..joined.height() {
        let precipitation = xs[i];
        let daily = trips_col.get(i).unwrap_or(0);
        days.push(RainDay {
            date: dates.get(i).unwrap_or("").to_string(),
            precipitation_mm: precipitation,
            daily_trips: daily,
            avg_distance: distances.get(i),
            elasticity_corr: corr,
        });
        let entry = by_month
            .entry(months.get(i).unwrap_or(0))
            .or_insert((0.0, Vec::new()));
        entry.0 += precipitation;
        entry.1.push(daily as f64);
    }

    let mut monthly: Vec<MonthlyRain> = by_month
        .into_iter()
        .map(|(month, (total, daily))| MonthlyRain {
            month,
            total_precipitation_mm: total,
            avg_daily_trips: utility::mean(&daily),
        })
        .collect();
    monthly.sort_by(|a, b| {
        b.total_precipitation_mm
            .partial_cmp(&a.total_precipitation_mm)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok((days, monthly))
}

pub fn run(cfg: &PipelineConfig, _zones: &ZoneReference) -> Result<()> {
    let weather = scan_weather(&cfg.weather_csv(), cfg.target_year)?;
    let (days, monthly) = compute(scan_clean(cfg)?, weather, cfg.target_year)?;

    if let Some(wettest) = monthly.first() {
        info!(
            month = wettest.month,
            total_mm = wettest.total_precipitation_mm,
            avg_daily_trips = wettest.avg_daily_trips,
            "Wettest month"
        );
    }
    output::write_rows(&cfg.summary_path("rain_elasticity"), &days)?;
    output::write_rows(&cfg.summary_path("monthly_rain"), &monthly)?;
    Ok(())
}
