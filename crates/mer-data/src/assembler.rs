//! Archive-wide dataset assembly.
//!
//! Walks the month subdirectories of an archive root, aggregates each
//! month, drops months that produced nothing and fills the remaining gaps
//! with per-column medians.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use mer_core::catalog::Catalog;
use mer_core::diagnostics::{AssemblyReport, ImputedValue, MetricCoverage, MonthDiagnostics};
use mer_core::error::{MerError, Result};
use mer_core::models::{Dataset, MonthContext, MonthRecord};
use mer_core::percentile::median;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregator::MonthlyAggregator;

// ── AssemblyOptions ───────────────────────────────────────────────────────────

/// Which month directories to consider and how to process them.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    /// Months whose first day is before this date are skipped.
    pub start_date: NaiveDate,
    /// When set, only directory names starting with this prefix are used.
    pub dir_prefix: Option<String>,
    /// Aggregate months on the rayon thread pool.
    pub parallel: bool,
}

impl AssemblyOptions {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            dir_prefix: None,
            parallel: true,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dir_prefix = Some(prefix.into());
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

// ── DatasetAssembler ──────────────────────────────────────────────────────────

pub struct DatasetAssembler<'a> {
    catalog: &'a Catalog,
    options: AssemblyOptions,
}

impl<'a> DatasetAssembler<'a> {
    pub fn new(catalog: &'a Catalog, options: AssemblyOptions) -> Self {
        Self { catalog, options }
    }

    /// Build the dataset for the archive at `root`.
    ///
    /// Fails only when `root` is not a directory or when not a single month
    /// yields a metric. Everything else is recorded in the report.
    pub fn assemble(&self, root: &Path) -> Result<(Dataset, AssemblyReport)> {
        if !root.is_dir() {
            return Err(MerError::ArchiveNotFound(root.to_path_buf()));
        }

        let mut report = AssemblyReport::default();
        let contexts = self.month_contexts(root, &mut report);
        info!(
            "Found {} month directories in {} ({} scanned)",
            contexts.len(),
            root.display(),
            report.directories_scanned
        );

        let aggregator = MonthlyAggregator::new(self.catalog);
        let results: Vec<(MonthRecord, MonthDiagnostics)> = if self.options.parallel {
            contexts.par_iter().map(|ctx| aggregator.aggregate(ctx)).collect()
        } else {
            contexts.iter().map(|ctx| aggregator.aggregate(ctx)).collect()
        };

        // Results follow directory name order, so the first non-empty
        // directory for a month wins.
        let mut seen: HashSet<NaiveDate> = HashSet::new();
        let mut records = Vec::with_capacity(results.len());
        for (record, diagnostics) in results {
            if diagnostics.is_empty() {
                warn!("Dropping {}: no metrics extracted", diagnostics.directory);
                report.dropped_empty.push(diagnostics.directory.clone());
            } else if !seen.insert(record.date) {
                warn!(
                    "Skipping {}: {} already taken",
                    diagnostics.directory,
                    record.date.format("%Y-%m")
                );
                report.duplicates.push(diagnostics.directory.clone());
            } else {
                records.push(record);
            }
            report.months.push(diagnostics);
        }

        if records.is_empty() {
            return Err(MerError::NoMonthsExtracted(root.to_path_buf()));
        }
        records.sort_by_key(|r| r.date);
        report.months_kept = records.len();

        let columns: Vec<String> = self
            .catalog
            .metric_ids()
            .into_iter()
            .filter(|m| records.iter().any(|r| r.get(m).is_some()))
            .collect();

        report.coverage = coverage(&records, &columns);
        report.imputed = impute_medians(&mut records, &columns);

        let dataset = Dataset::new(records, columns);
        if let Some((first, last)) = dataset.date_range() {
            info!(
                "Assembled {} months ({} to {}), {} metric column(s), {} imputed cell(s)",
                dataset.len(),
                first.format("%Y-%m"),
                last.format("%Y-%m"),
                dataset.metrics().len(),
                report.imputed.len()
            );
        }
        Ok((dataset, report))
    }

    /// Parse and filter the month directories under `root`.
    fn month_contexts(&self, root: &Path, report: &mut AssemblyReport) -> Vec<MonthContext> {
        let mut contexts = Vec::new();

        for dir in list_subdirectories(root) {
            report.directories_scanned += 1;
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if let Some(prefix) = &self.options.dir_prefix {
                if !name.starts_with(prefix.as_str()) {
                    debug!("Skipping {}: no {} prefix", name, prefix);
                    report.filtered_by_prefix.push(name);
                    continue;
                }
            }

            let ctx = match MonthContext::from_directory(&dir) {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!("Skipping directory: {}", e);
                    report.unparseable.push(name);
                    continue;
                }
            };

            if ctx.month() < self.options.start_date {
                debug!("Skipping {}: before {}", name, self.options.start_date);
                report.before_start.push(name);
                continue;
            }

            contexts.push(ctx);
        }
        contexts
    }
}

/// Immediate subdirectories of `root`, sorted by name.
pub fn list_subdirectories(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Months carrying each column, before imputation.
fn coverage(records: &[MonthRecord], columns: &[String]) -> Vec<MetricCoverage> {
    columns
        .iter()
        .map(|metric| MetricCoverage {
            metric: metric.clone(),
            months_present: records.iter().filter(|r| r.get(metric).is_some()).count(),
            months_total: records.len(),
        })
        .collect()
}

/// Fill every gap with the median of the column's present values.
fn impute_medians(records: &mut [MonthRecord], columns: &[String]) -> Vec<ImputedValue> {
    let mut imputed = Vec::new();
    for metric in columns {
        let Some(fill) = median(records.iter().filter_map(|r| r.get(metric))) else {
            continue;
        };
        for record in records.iter_mut() {
            if record.impute(metric, fill) {
                debug!("Imputed {} for {} with {}", metric, record.date, fill);
                imputed.push(ImputedValue {
                    month: record.date,
                    metric: metric.clone(),
                    value: fill,
                });
            }
        }
    }
    imputed
}

// ── Tests ─────────────────────────────────────────────────────────────────────
