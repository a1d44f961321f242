//! Percentile-threshold labelling of elevated-activity months.

use tracing::{info, warn};

use crate::error::{MerError, Result};
use crate::models::{ClassificationResult, Dataset};
use crate::percentile::{percentile, sorted_finite};

/// Percentile used when none is configured.
pub const DEFAULT_PERCENTILE: f64 = 75.0;

/// Labels each month as elevated when its metric reaches a percentile
/// threshold computed over the whole dataset.
#[derive(Debug, Clone)]
pub struct PeriodClassifier {
    metric: String,
    percentile: f64,
}

impl PeriodClassifier {
    pub fn new(metric: impl Into<String>, percentile: f64) -> Self {
        Self {
            metric: metric.into(),
            percentile,
        }
    }

    /// Classifier over `metric` at [`DEFAULT_PERCENTILE`].
    pub fn with_default_percentile(metric: impl Into<String>) -> Self {
        Self::new(metric, DEFAULT_PERCENTILE)
    }

    /// Compute the threshold and label every record.
    ///
    /// Records lacking the metric do not contribute to the threshold and are
    /// labelled below it. A record is elevated when its value is greater than
    /// or equal to the threshold.
    pub fn classify(&self, dataset: &Dataset) -> Result<ClassificationResult> {
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(MerError::Config(format!(
                "percentile must be within 0..=100, got {}",
                self.percentile
            )));
        }

        let column = dataset.column(&self.metric);
        let present = sorted_finite(column.iter().flatten().copied());
        let Some(threshold) = percentile(&present, self.percentile) else {
            warn!(
                "Cannot classify periods: no month carries {}",
                self.metric
            );
            return Err(MerError::MetricUnavailable(self.metric.clone()));
        };

        let labels: Vec<bool> = column
            .iter()
            .map(|v| v.is_some_and(|x| x >= threshold))
            .collect();

        let missing = column.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            warn!(
                "{} month(s) lack {} and are labelled below threshold",
                missing, self.metric
            );
        }

        let result = ClassificationResult {
            metric: self.metric.clone(),
            percentile: self.percentile,
            threshold,
            labels,
        };
        info!(
            "Threshold for {} at p{}: {:.2}; {} of {} months elevated",
            self.metric,
            self.percentile,
            threshold,
            result.elevated_count(),
            dataset.len()
        );
        Ok(result)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
