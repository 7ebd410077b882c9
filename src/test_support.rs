//! Shared helpers for unit tests: synthetic source-layout frames and scratch
//! directories under the OS temp dir.

use crate::schema::TaxiType;
use polars::prelude::*;
use std::path::PathBuf;

/// One synthetic source row:
/// `(pickup_ms, dropoff_ms, pu_loc, do_loc, distance, fare, total, surcharge)`.
pub type SourceRow = (i64, i64, i64, i64, f64, f64, f64, f64);

/// Builds a DataFrame in the raw source layout for `taxi_type`.
pub fn source_frame(taxi_type: TaxiType, rows: &[SourceRow]) -> DataFrame {
    let prefix = match taxi_type {
        TaxiType::Yellow => "tpep",
        TaxiType::Green => "lpep",
    };

    let pickup_ms: Vec<i64> = rows.iter().map(|r| r.0).collect();
    let dropoff_ms: Vec<i64> = rows.iter().map(|r| r.1).collect();
    let pu: Vec<i64> = rows.iter().map(|r| r.2).collect();
    let dl: Vec<i64> = rows.iter().map(|r| r.3).collect();
    let dist: Vec<f64> = rows.iter().map(|r| r.4).collect();
    let fare: Vec<f64> = rows.iter().map(|r| r.5).collect();
    let total: Vec<f64> = rows.iter().map(|r| r.6).collect();
    let surcharge: Vec<f64> = rows.iter().map(|r| r.7).collect();

    let datetime = DataType::Datetime(TimeUnit::Milliseconds, None);
    let pickup = Series::new(&format!("{prefix}_pickup_datetime"), pickup_ms)
        .cast(&datetime)
        .unwrap();
    let dropoff = Series::new(&format!("{prefix}_dropoff_datetime"), dropoff_ms)
        .cast(&datetime)
        .unwrap();

    DataFrame::new(vec![
        pickup,
        dropoff,
        Series::new("PULocationID", pu),
        Series::new("DOLocationID", dl),
        Series::new("trip_distance", dist),
        Series::new("fare_amount", fare),
        Series::new("total_amount", total),
        Series::new("congestion_surcharge", surcharge),
    ])
    .unwrap()
}

/// Epoch milliseconds for a civil timestamp, for building synthetic rows.
pub fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
    chrono::NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

/// Fresh scratch directory under the OS temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("congestion_audit_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Builds a DataFrame in the canonical clean-dataset shape (normalized
/// columns plus derived metrics) from typed source rows.
pub fn clean_frame(rows: &[(TaxiType, SourceRow)]) -> DataFrame {
    let mut parts = Vec::new();
    for taxi_type in [TaxiType::Yellow, TaxiType::Green] {
        let typed: Vec<SourceRow> = rows
            .iter()
            .filter(|(t, _)| *t == taxi_type)
            .map(|(_, r)| *r)
            .collect();
        if typed.is_empty() {
            continue;
        }
        let lf = crate::schema::normalize(source_frame(taxi_type, &typed).lazy(), taxi_type)
            .unwrap();
        parts.push(lf);
    }
    let unified = concat(parts.as_slice(), UnionArgs::default()).unwrap();
    crate::ghost::with_derived_metrics(unified).collect().unwrap()
}

/// Writes a DataFrame as parquet for scan-based tests.
pub fn write_parquet(df: &mut DataFrame, path: &std::path::Path) {
    let file = std::fs::File::create(path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();
}
