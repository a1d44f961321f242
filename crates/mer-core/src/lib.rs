//! Domain model for monthly report consolidation.
//!
//! Holds the declarative file/metric catalog, the record and dataset types,
//! structured diagnostics, percentile math and the period classifier. All
//! filesystem work lives in `mer-data`.

pub mod catalog;
pub mod classifier;
pub mod data_processors;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod percentile;
pub mod settings;
pub mod time_utils;

pub use error::{MerError, Result};
