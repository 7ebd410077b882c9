//! Zone reference: which location IDs sit inside the congestion zone, and
//! which form the border set just outside it.
//!
//! Loaded once per stage from a static CSV (`location_id,borough`). Zone
//! membership is exposed as polars expressions so the predicate pushes down
//! into the lazy scans.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ZoneReference {
    congestion: Vec<i64>,
    border: Vec<i64>,
}

impl ZoneReference {
    /// Loads the reference table and keeps the IDs whose borough matches the
    /// configured congestion borough. `border_zones` comes from config, not
    /// from the table: the boundary set is a policy choice, not geography.
    pub fn load(path: &Path, congestion_borough: &str, border_zones: &[i64]) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                path: path.to_path_buf(),
                produced_by: "ingestion provider (zone reference)",
            });
        }

        let df = LazyCsvReader::new(path)
            .has_header(true)
            .finish()?
            .filter(col("borough").eq(lit(congestion_borough)))
            .select([col("location_id").cast(DataType::Int64)])
            .collect()?;

        let congestion: Vec<i64> = df
            .column("location_id")?
            .i64()?
            .into_iter()
            .flatten()
            .collect();

        if congestion.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "zone reference {} has no rows for borough `{congestion_borough}`",
                path.display()
            )));
        }

        info!(
            zones = congestion.len(),
            borough = congestion_borough,
            "Congestion zone loaded"
        );

        Ok(Self {
            congestion,
            border: border_zones.to_vec(),
        })
    }

    #[cfg(test)]
    pub fn from_ids(congestion: Vec<i64>, border: Vec<i64>) -> Self {
        Self { congestion, border }
    }

    /// `expr` is a location column inside the congestion zone.
    pub fn inside(&self, expr: Expr) -> Expr {
        expr.is_in(lit(Series::new("congestion_zone", self.congestion.clone())))
    }

    /// `expr` is a location column outside the congestion zone.
    pub fn outside(&self, expr: Expr) -> Expr {
        self.inside(expr).not()
    }

    /// `expr` is a location column in the border-zone set.
    pub fn in_border(&self, expr: Expr) -> Expr {
        expr.is_in(lit(Series::new("border_zones", self.border.clone())))
    }
}
