//! Structured diagnostics returned by the resolvers, the monthly aggregator
//! and the dataset assembler.
//!
//! Nothing here writes to a shared sink; callers receive these values and
//! decide how to render them.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

use crate::models::Extraction;

// ── File resolution ───────────────────────────────────────────────────────────

/// Which resolution step located a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum FileMatch {
    ExactName,
    CaseInsensitiveName,
    Pattern {
        pattern: String,
        case_insensitive: bool,
    },
}

/// Result of looking for one file type in a month directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FileResolution {
    Found { path: PathBuf, matched_by: FileMatch },
    /// Nothing matched; lists the `.csv` entries that were present.
    NotFound { csv_entries: Vec<String> },
}

impl FileResolution {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            FileResolution::Found { path, .. } => Some(path),
            FileResolution::NotFound { .. } => None,
        }
    }
}

// ── Column resolution ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMatchKind {
    /// Case-insensitive equality with a candidate.
    Exact,
    /// Candidate and label contain one another. Known to produce false
    /// positives when labels share substrings.
    Substring,
}

/// A resolved column label and its position in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMatch {
    pub label: String,
    pub index: usize,
    pub candidate: String,
    pub kind: ColumnMatchKind,
}

// ── Per-month reports ─────────────────────────────────────────────────────────

/// Shape of a table that was read successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub columns: Vec<String>,
    pub rows: usize,
    pub skipped_rows: usize,
    pub delimiter: char,
    pub fallback_encoding: bool,
    /// Date column used to filter rows, for month-filtered file types.
    pub date_column: Option<String>,
    /// Rows left after month filtering, for month-filtered file types.
    pub rows_in_month: Option<usize>,
}

/// What happened to one file type for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub file_type: String,
    pub resolution: FileResolution,
    pub table: Option<TableReport>,
    /// Why a located file contributed nothing (unreadable, no date column).
    pub error: Option<String>,
}

/// What happened to one metric for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricOutcome {
    pub metric: String,
    pub file_type: String,
    /// Resolved columns; one per summed component.
    pub columns: Vec<ColumnMatch>,
    pub extraction: Extraction,
}

/// Everything the monthly aggregator observed for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthDiagnostics {
    pub directory: String,
    pub month: NaiveDate,
    pub files: Vec<FileReport>,
    pub metrics: Vec<MetricOutcome>,
    /// Metrics offered by more than one extractor; the first value was kept.
    pub conflicts: Vec<String>,
    pub extracted: usize,
}

impl MonthDiagnostics {
    pub fn new(directory: impl Into<String>, month: NaiveDate) -> Self {
        Self {
            directory: directory.into(),
            month,
            files: Vec::new(),
            metrics: Vec::new(),
            conflicts: Vec::new(),
            extracted: 0,
        }
    }

    /// Whether the month yielded no metric at all.
    pub fn is_empty(&self) -> bool {
        self.extracted == 0
    }
}

// ── Dataset-level reports ─────────────────────────────────────────────────────

/// How many kept months had a metric before imputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricCoverage {
    pub metric: String,
    pub months_present: usize,
    pub months_total: usize,
}

impl MetricCoverage {
    pub fn percent(&self) -> f64 {
        if self.months_total == 0 {
            return 0.0;
        }
        self.months_present as f64 / self.months_total as f64 * 100.0
    }
}

/// A cell filled with its column median.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputedValue {
    pub month: NaiveDate,
    pub metric: String,
    pub value: f64,
}

/// Completeness report of one dataset assembly run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyReport {
    pub directories_scanned: usize,
    /// Directory names whose month could not be parsed.
    pub unparseable: Vec<String>,
    /// Directory names excluded by the prefix filter.
    pub filtered_by_prefix: Vec<String>,
    /// Directory names dated before the start date.
    pub before_start: Vec<String>,
    /// Directory names whose month was already taken by an earlier directory.
    pub duplicates: Vec<String>,
    /// Directory names that yielded zero metrics.
    pub dropped_empty: Vec<String>,
    pub months_kept: usize,
    pub coverage: Vec<MetricCoverage>,
    pub imputed: Vec<ImputedValue>,
    pub months: Vec<MonthDiagnostics>,
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Absence;

    #[test]
    fn test_file_resolution_path() {
        let found = FileResolution::Found {
            path: PathBuf::from("a/kills.csv"),
            matched_by: FileMatch::ExactName,
        };
        assert_eq!(found.path(), Some(&PathBuf::from("a/kills.csv")));

        let missing = FileResolution::NotFound {
            csv_entries: vec!["other.csv".to_string()],
        };
        assert!(missing.path().is_none());
    }

    #[test]
    fn test_coverage_percent() {
        let cov = MetricCoverage {
            metric: "trade_value".to_string(),
            months_present: 3,
            months_total: 4,
        };
        assert!((cov.percent() - 75.0).abs() < 1e-9);

        let none = MetricCoverage {
            months_total: 0,
            months_present: 0,
            ..cov
        };
        assert_eq!(none.percent(), 0.0);
    }

    #[test]
    fn test_month_diagnostics_empty_flag() {
        let month = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let mut diag = MonthDiagnostics::new("MER_Jun2022", month);
        assert!(diag.is_empty());
        diag.extracted = 2;
        assert!(!diag.is_empty());
    }

    #[test]
    fn test_outcome_serializes_extraction_state() {
        let outcome = MetricOutcome {
            metric: "total_isk".to_string(),
            file_type: "money_supply".to_string(),
            columns: vec![],
            extraction: Extraction::Absent(Absence::ColumnNotFound),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["extraction"]["absent"], "column_not_found");
    }
}
