//! Schema normalization: maps the two source column layouts onto the one
//! canonical trip schema.
//!
//! The layouts differ only in the vendor prefix on the timestamp columns
//! (`tpep_` for yellow, `lpep_` for green). The mapping is resolved once,
//! here, against the scanned schema; everything downstream consumes only
//! canonical names and never probes for alternatives.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::Deserialize;

pub const CANON_PICKUP_TIME: &str = "pickup_time";
pub const CANON_DROPOFF_TIME: &str = "dropoff_time";
pub const CANON_PICKUP_LOC: &str = "pickup_loc";
pub const CANON_DROPOFF_LOC: &str = "dropoff_loc";
pub const CANON_TRIP_DISTANCE: &str = "trip_distance";
pub const CANON_FARE: &str = "fare";
pub const CANON_TOTAL_AMOUNT: &str = "total_amount";
pub const CANON_SURCHARGE: &str = "congestion_surcharge";
pub const CANON_TAXI_TYPE: &str = "taxi_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxiType {
    #[default]
    Yellow,
    Green,
}

impl TaxiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxiType::Yellow => "yellow",
            TaxiType::Green => "green",
        }
    }

    fn timestamp_prefix(&self) -> &'static str {
        match self {
            TaxiType::Yellow => "tpep",
            TaxiType::Green => "lpep",
        }
    }
}

/// Canonical-name → source-name pairs for one taxi type.
pub fn column_mapping(taxi_type: TaxiType) -> Vec<(&'static str, String)> {
    let prefix = taxi_type.timestamp_prefix();
    vec![
        (CANON_PICKUP_TIME, format!("{prefix}_pickup_datetime")),
        (CANON_DROPOFF_TIME, format!("{prefix}_dropoff_datetime")),
        (CANON_PICKUP_LOC, "PULocationID".to_string()),
        (CANON_DROPOFF_LOC, "DOLocationID".to_string()),
        (CANON_TRIP_DISTANCE, "trip_distance".to_string()),
        (CANON_FARE, "fare_amount".to_string()),
        (CANON_TOTAL_AMOUNT, "total_amount".to_string()),
        (CANON_SURCHARGE, "congestion_surcharge".to_string()),
    ]
}

/// Projects a source-layout scan onto the canonical schema and tags it with
/// its taxi type.
///
/// Location IDs are widened to Int64 and money/distance columns to Float64 so
/// yellow and green streams concatenate cleanly. A null surcharge means "no
/// surcharge recorded" and is filled with 0.0 here, once, so compliance
/// denominators stay honest downstream.
///
/// # Errors
///
/// [`PipelineError::SchemaMismatch`] when a required source column is absent.
pub fn normalize(lf: LazyFrame, taxi_type: TaxiType) -> Result<LazyFrame> {
    let schema = lf.schema()?;
    let mapping = column_mapping(taxi_type);

    for (_, source) in &mapping {
        if schema.get(source.as_str()).is_none() {
            return Err(PipelineError::SchemaMismatch {
                column: source.clone(),
                taxi_type: taxi_type.as_str(),
            });
        }
    }

    let projection: Vec<Expr> = mapping
        .iter()
        .map(|(canonical, source)| match *canonical {
            CANON_PICKUP_LOC | CANON_DROPOFF_LOC => {
                col(source).cast(DataType::Int64).alias(canonical)
            }
            CANON_SURCHARGE => col(source)
                .cast(DataType::Float64)
                .fill_null(lit(0.0))
                .alias(canonical),
            CANON_TRIP_DISTANCE | CANON_FARE | CANON_TOTAL_AMOUNT => {
                col(source).cast(DataType::Float64).alias(canonical)
            }
            _ => col(source).alias(canonical),
        })
        .collect();

    Ok(lf
        .select(projection)
        .with_column(lit(taxi_type.as_str()).alias(CANON_TAXI_TYPE)))
}
