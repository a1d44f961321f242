//! Machine-readable summary of one consolidation run.

use std::path::Path;

use mer_core::diagnostics::{AssemblyReport, MetricCoverage};
use mer_core::models::{ClassificationResult, Dataset};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub metric: String,
    pub percentile: f64,
    pub threshold: f64,
    pub elevated_months: Vec<String>,
}

/// Run outcome without timestamps, so reruns produce identical files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub months_kept: usize,
    pub first_month: Option<String>,
    pub last_month: Option<String>,
    pub metrics: Vec<String>,
    pub derived_columns: Vec<String>,
    pub coverage: Vec<MetricCoverage>,
    pub imputed_cells: usize,
    pub dropped_months: Vec<String>,
    pub skipped_directories: usize,
    pub classification: Option<ClassificationSummary>,
}

impl RunSummary {
    pub fn build(
        dataset: &Dataset,
        report: &AssemblyReport,
        derived_columns: Vec<String>,
        classification: Option<&ClassificationResult>,
    ) -> Self {
        let range = dataset.date_range();
        let classification = classification.map(|result| ClassificationSummary {
            metric: result.metric.clone(),
            percentile: result.percentile,
            threshold: result.threshold,
            elevated_months: dataset
                .records()
                .iter()
                .zip(&result.labels)
                .filter(|(_, label)| **label)
                .map(|(record, _)| record.date.format("%Y-%m").to_string())
                .collect(),
        });

        Self {
            months_kept: dataset.len(),
            first_month: range.map(|(first, _)| first.format("%Y-%m").to_string()),
            last_month: range.map(|(_, last)| last.format("%Y-%m").to_string()),
            metrics: dataset.metrics().to_vec(),
            derived_columns,
            coverage: report.coverage.clone(),
            imputed_cells: report.imputed.len(),
            dropped_months: report.dropped_empty.clone(),
            skipped_directories: report.unparseable.len()
                + report.filtered_by_prefix.len()
                + report.before_start.len()
                + report.duplicates.len(),
            classification,
        }
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}
