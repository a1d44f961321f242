//! Filesystem side of monthly report consolidation.
//!
//! Locates and parses the report files of each month directory, resolves
//! metric columns, aggregates one record per month and assembles the
//! archive-wide dataset. Also writes the finished dataset.

pub mod aggregator;
pub mod assembler;
pub mod columns;
pub mod extract;
pub mod files;
pub mod reader;
pub mod writer;

pub use mer_core as core;
