//! Velocity heatmaps: mean in-zone speed per weekday/hour bucket, one 7×24
//! matrix per (year, quarter) in the comparison window.

use super::{pickup_window, scan_clean};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ghost::AVG_SPEED_MPH;
use crate::output;
use crate::schema::{CANON_DROPOFF_LOC, CANON_PICKUP_LOC, CANON_PICKUP_TIME};
use crate::zones::ZoneReference;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::info;

/// One pivoted heatmap: weekday rows (Monday=1 through Sunday=7) by hour
/// columns, cells holding mean speed in mph.
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub year: i32,
    pub quarter: i32,
    pub cells: [[f64; 24]; 7],
}

pub fn compute(
    lf: LazyFrame,
    zones: &ZoneReference,
    start: NaiveDate,
    end: NaiveDate,
    min_trips: i64,
    default_speed: f64,
) -> Result<Vec<Heatmap>> {
    let grouped = lf
        .filter(
            pickup_window(start, end)
                .and(zones.inside(col(CANON_PICKUP_LOC)))
                .and(zones.inside(col(CANON_DROPOFF_LOC))),
        )
        .group_by([
            col(CANON_PICKUP_TIME).dt().year().alias("year"),
            col(CANON_PICKUP_TIME)
                .dt()
                .quarter()
                .cast(DataType::Int32)
                .alias("quarter"),
            col(CANON_PICKUP_TIME)
                .dt()
                .weekday()
                .cast(DataType::Int32)
                .alias("day_of_week"),
            col(CANON_PICKUP_TIME)
                .dt()
                .hour()
                .cast(DataType::Int32)
                .alias("hour"),
        ])
        .agg([
            col(AVG_SPEED_MPH).mean().alias("mean_speed"),
            count().cast(DataType::Int64).alias("trips"),
        ])
        // Thin buckets carry too much noise to plot.
        .filter(col("trips").gt(lit(min_trips)))
        .collect()?;

    let years = grouped.column("year")?.i32()?;
    let quarters = grouped.column("quarter")?.i32()?;
    let days = grouped.column("day_of_week")?.i32()?;
    let hours = grouped.column("hour")?.i32()?;
    let speeds = grouped.column("mean_speed")?.f64()?;

    let mut maps: BTreeMap<(i32, i32), [[f64; 24]; 7]> = BTreeMap::new();
    for i in 0..grouped.height() {
        let key = (years.get(i).unwrap_or(0), quarters.get(i).unwrap_or(1));
        let cells = maps.entry(key).or_insert([[default_speed; 24]; 7]);
        let day = days.get(i).unwrap_or(1);
        let hour = hours.get(i).unwrap_or(0);
        if !(1..=7).contains(&day) || !(0..24).contains(&hour) {
            continue;
        }
        if let Some(speed) = speeds.get(i) {
            cells[(day - 1) as usize][hour as usize] = speed;
        }
    }

    Ok(maps
        .into_iter()
        .map(|((year, quarter), cells)| Heatmap {
            year,
            quarter,
            cells,
        })
        .collect())
}

pub fn run(cfg: &PipelineConfig, zones: &ZoneReference) -> Result<()> {
    let heatmaps = compute(
        scan_clean(cfg)?,
        zones,
        cfg.comparison_start,
        cfg.comparison_end,
        cfg.min_heatmap_trips,
        cfg.default_speed_mph,
    )?;

    let mut header = vec!["day_of_week".to_string()];
    header.extend((0..24).map(|h| format!("h{h:02}")));

    for map in &heatmaps {
        let rows: Vec<Vec<String>> = map
            .cells
            .iter()
            .enumerate()
            .map(|(day, hours)| {
                let mut row = vec![(day + 1).to_string()];
                row.extend(hours.iter().map(|s| format!("{s:.2}")));
                row
            })
            .collect();
        let path = cfg.summary_path(&format!("velocity_heatmap_{}_q{}", map.year, map.quarter));
        output::write_matrix(&path, &header, &rows)?;
        info!(year = map.year, quarter = map.quarter, path = %path.display(), "Velocity heatmap");
    }
    Ok(())
}
