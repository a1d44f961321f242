//! Per-month aggregation across every configured file type.

use mer_core::catalog::Catalog;
use mer_core::diagnostics::MonthDiagnostics;
use mer_core::models::{MonthContext, MonthRecord};
use tracing::{debug, info, warn};

use crate::extract::MetricExtractor;

// ── MonthlyAggregator ─────────────────────────────────────────────────────────

/// Runs one [`MetricExtractor`] per catalog file type against a month
/// directory and merges the results into a single [`MonthRecord`].
#[derive(Debug, Clone)]
pub struct MonthlyAggregator<'a> {
    extractors: Vec<MetricExtractor<'a>>,
}

impl<'a> MonthlyAggregator<'a> {
    /// One extractor per file type, in catalog order. File types without any
    /// metric are skipped.
    pub fn new(catalog: &'a Catalog) -> Self {
        let extractors = catalog
            .file_types
            .iter()
            .map(|ft| MetricExtractor::new(ft, catalog.metrics_for(&ft.id)))
            .filter(|e| !e.metrics().is_empty())
            .collect();
        Self { extractors }
    }

    pub fn extractors(&self) -> &[MetricExtractor<'a>] {
        &self.extractors
    }

    /// Extract every metric for `ctx`.
    ///
    /// When two extractors produce the same metric the first value is kept
    /// and the clash is listed in [`MonthDiagnostics::conflicts`]. A month
    /// with no metric at all is still returned; the caller decides whether
    /// to keep it.
    pub fn aggregate(&self, ctx: &MonthContext) -> (MonthRecord, MonthDiagnostics) {
        let mut record = MonthRecord::new(ctx.month());
        let mut diagnostics = MonthDiagnostics::new(ctx.name(), ctx.month());

        for extractor in &self.extractors {
            let (file, outcomes) = extractor.extract(ctx);
            diagnostics.files.push(file);

            for outcome in outcomes {
                if let Some(value) = outcome.extraction.value() {
                    if !record.insert_extracted(&outcome.metric, value) {
                        warn!(
                            "{}: {} already extracted, ignoring value from {}",
                            ctx.name(),
                            outcome.metric,
                            outcome.file_type
                        );
                        diagnostics.conflicts.push(outcome.metric.clone());
                    }
                }
                diagnostics.metrics.push(outcome);
            }
        }

        diagnostics.extracted = record.extracted_count();
        if diagnostics.is_empty() {
            warn!("{}: no metrics extracted", ctx.name());
        } else {
            info!(
                "{} ({}): {} metric(s) extracted",
                ctx.name(),
                ctx.year_month(),
                diagnostics.extracted
            );
        }
        debug!("{}: {:?}", ctx.name(), record.values());

        (record, diagnostics)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
