//! Congestion-pricing trip audit pipeline: cleans raw taxi trip records,
//! reconstructs a missing month from weighted historical references, and
//! publishes the dashboard summary tables.

pub mod analyzers;
pub mod audit;
pub mod config;
pub mod error;
pub mod ghost;
pub mod impute;
pub mod manifest;
pub mod output;
pub mod schema;
pub mod zones;

#[cfg(test)]
pub(crate) mod test_support;
