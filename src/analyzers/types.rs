//! Summary-row types published by the Aggregation Engine. One struct per
//! dashboard table; all rows are small, derived, and fully rebuilt each run.

use serde::Serialize;

/// Global surcharge compliance for outside→inside trips after the policy
/// effective date.
#[derive(Debug, Clone, Serialize)]
pub struct LeakageSummary {
    pub total_trips: i64,
    pub with_surcharge: i64,
    pub compliance_rate: f64,
}

/// A pickup zone ranked by its missing-surcharge rate.
#[derive(Debug, Clone, Serialize)]
pub struct LeakageOrigin {
    pub pickup_loc: i64,
    pub trips: i64,
    pub missing_rate: f64,
}

/// Trips entering the zone per quarter and taxi type.
#[derive(Debug, Clone, Serialize)]
pub struct QuarterVolume {
    pub quarter_start: String,
    pub taxi_type: String,
    pub trips_into_zone: i64,
}

/// Year-over-year dropoff change for one border zone.
#[derive(Debug, Clone, Serialize)]
pub struct BorderEffect {
    pub dropoff_loc: i64,
    pub prior_year: i32,
    pub prior_dropoffs: i64,
    pub latest_year: i32,
    pub latest_dropoffs: i64,
    pub pct_change: f64,
}

/// Monthly surcharge level versus tipping behavior.
#[derive(Debug, Clone, Serialize)]
pub struct TipCrowding {
    pub month: u32,
    pub avg_surcharge: f64,
    pub avg_tip_pct: Option<f64>,
}

/// One day of the weather-anchored elasticity table. The correlation is a
/// single coefficient broadcast onto every row for the dashboard's benefit.
#[derive(Debug, Clone, Serialize)]
pub struct RainDay {
    pub date: String,
    pub precipitation_mm: f64,
    pub daily_trips: i64,
    pub avg_distance: Option<f64>,
    pub elasticity_corr: f64,
}

/// Monthly rainfall totals against mean daily trip volume, ranked wettest
/// first.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRain {
    pub month: u32,
    pub total_precipitation_mm: f64,
    pub avg_daily_trips: f64,
}
