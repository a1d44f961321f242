use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{MerError, Result};
use crate::time_utils::parse_month_directory;

// ── Catalog entries ───────────────────────────────────────────────────────────

/// How the numeric cells of a resolved column are reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    /// Total over all rows.
    Sum,
    /// Arithmetic mean over all rows.
    Mean,
    /// The final row only (single-snapshot files).
    LastValue,
}

impl Aggregation {
    /// Reduce per-row cells, where `None` marks a missing (non-numeric) cell.
    ///
    /// `Sum` and `Mean` skip missing cells and yield `None` when no numeric
    /// cell remains. `LastValue` looks at the final row only, so a missing
    /// final cell yields `None` even if earlier rows were numeric.
    pub fn apply(&self, cells: &[Option<f64>]) -> Option<f64> {
        match self {
            Aggregation::LastValue => cells.last().copied().flatten(),
            Aggregation::Sum | Aggregation::Mean => {
                let numeric: Vec<f64> = cells.iter().filter_map(|c| *c).collect();
                if numeric.is_empty() {
                    return None;
                }
                let total: f64 = numeric.iter().sum();
                if *self == Aggregation::Mean {
                    Some(total / numeric.len() as f64)
                } else {
                    Some(total)
                }
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::LastValue => "last-value",
        };
        f.write_str(name)
    }
}

/// A logical source-file category and the literal names it may appear under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTypeSpec {
    /// Logical identifier, e.g. `"production"`.
    pub id: String,
    /// Exact file names, tried in order.
    pub candidates: Vec<String>,
    /// Glob patterns tried when no candidate name matches.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Date-column candidates. When non-empty, rows are restricted to the
    /// target month before any metric of this file type is aggregated.
    #[serde(default)]
    pub date_columns: Vec<String>,
}

impl FileTypeSpec {
    /// Whether rows must be filtered to the target month.
    pub fn is_month_filtered(&self) -> bool {
        !self.date_columns.is_empty()
    }
}

/// A logical metric and where to find it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Canonical identifier, also the output column name.
    pub id: String,
    /// Identifier of the [`FileTypeSpec`] supplying this metric.
    pub file_type: String,
    /// Column-name candidates, matched case-insensitively in order.
    #[serde(default)]
    pub candidates: Vec<String>,
    pub aggregation: Aggregation,
    /// Column groups whose aggregates are added together. When non-empty the
    /// metric is the total over every group that resolves, and `candidates`
    /// is ignored.
    #[serde(default)]
    pub components: Vec<Vec<String>>,
}

impl MetricSpec {
    /// The candidate groups to resolve, one per summed component.
    pub fn column_groups(&self) -> Vec<&[String]> {
        if self.components.is_empty() {
            vec![self.candidates.as_slice()]
        } else {
            self.components.iter().map(|g| g.as_slice()).collect()
        }
    }
}

// ── MonthContext ──────────────────────────────────────────────────────────────

/// One archive subdirectory and the calendar month it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthContext {
    directory: PathBuf,
    name: String,
    month: NaiveDate,
}

impl MonthContext {
    /// Build a context from a month directory, parsing the month from its
    /// trailing `<Mon><YYYY>` token.
    pub fn from_directory(directory: &Path) -> Result<Self> {
        let name = directory
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let month = parse_month_directory(&name)
            .ok_or_else(|| MerError::InvalidMonthDirectory(name.clone()))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            name,
            month,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Directory name as found on disk.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First day of the month.
    pub fn month(&self) -> NaiveDate {
        self.month
    }

    /// `"%Y-%m"` key for the month.
    pub fn year_month(&self) -> String {
        self.month.format("%Y-%m").to_string()
    }

    /// Whether `date` falls within this context's calendar month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.month.year() && date.month() == self.month.month()
    }
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Why a metric has no value for a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Absence {
    FileNotFound,
    ColumnNotFound,
    NoRowsForMonth,
    NoNumericValues,
}

impl fmt::Display for Absence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Absence::FileNotFound => "file not found",
            Absence::ColumnNotFound => "column not found",
            Absence::NoRowsForMonth => "no rows for the target month",
            Absence::NoNumericValues => "no numeric values",
        };
        f.write_str(text)
    }
}

/// Outcome of extracting one metric for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    Value(f64),
    Absent(Absence),
    /// The source file existed but could not be used.
    Failed(String),
}

impl Extraction {
    pub fn value(&self) -> Option<f64> {
        match self {
            Extraction::Value(v) => Some(*v),
            _ => None,
        }
    }
}

// ── MonthRecord ───────────────────────────────────────────────────────────────

/// Metrics extracted for a single month. Metrics may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthRecord {
    pub date: NaiveDate,
    values: BTreeMap<String, f64>,
    extracted: usize,
}

impl MonthRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
            extracted: 0,
        }
    }

    /// Record an extracted value. Returns `false` without touching the
    /// existing value when `metric` is already present.
    pub fn insert_extracted(&mut self, metric: &str, value: f64) -> bool {
        if self.values.contains_key(metric) {
            return false;
        }
        self.values.insert(metric.to_string(), value);
        self.extracted += 1;
        true
    }

    /// Fill a missing metric with a dataset-level estimate. Does not count
    /// towards [`MonthRecord::extracted_count`].
    pub fn impute(&mut self, metric: &str, value: f64) -> bool {
        if self.values.contains_key(metric) {
            return false;
        }
        self.values.insert(metric.to_string(), value);
        true
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    /// Number of metrics obtained by extraction (imputed values excluded).
    pub fn extracted_count(&self) -> usize {
        self.extracted
    }
}

// ── Dataset ───────────────────────────────────────────────────────────────────

/// Chronologically ordered month records, unique by date.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<MonthRecord>,
    metrics: Vec<String>,
}

impl Dataset {
    /// Freeze `records` into a dataset. Records are sorted by date; when two
    /// share a date the one listed first is kept.
    ///
    /// `metrics` fixes the column order of the dataset.
    pub fn new(mut records: Vec<MonthRecord>, metrics: Vec<String>) -> Self {
        records.sort_by_key(|r| r.date);
        records.dedup_by_key(|r| r.date);
        Self { records, metrics }
    }

    pub fn records(&self) -> &[MonthRecord] {
        &self.records
    }

    /// Metric identifiers in column order.
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-record values of `metric`, aligned with [`Dataset::records`].
    pub fn column(&self, metric: &str) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.get(metric)).collect()
    }

    /// First and last month, if any.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.records.first()?.date, self.records.last()?.date))
    }
}

// ── ClassificationResult ──────────────────────────────────────────────────────

/// Percentile-threshold labels for a frozen [`Dataset`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub metric: String,
    pub percentile: f64,
    pub threshold: f64,
    /// One label per dataset record, in record order.
    pub labels: Vec<bool>,
}

impl ClassificationResult {
    /// Number of records labelled as elevated.
    pub fn elevated_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// `1` for elevated, `0` otherwise.
    pub fn label_value(&self, index: usize) -> u8 {
        u8::from(self.labels.get(index).copied().unwrap_or(false))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── Aggregation ───────────────────────────────────────────────────────────

    #[test]
    fn test_aggregation_rules_over_fixture() {
        let cells = [Some(10.0), Some(20.0), Some(30.0)];
        assert_eq!(Aggregation::Sum.apply(&cells), Some(60.0));
        assert_eq!(Aggregation::Mean.apply(&cells), Some(20.0));
        assert_eq!(Aggregation::LastValue.apply(&cells), Some(30.0));
    }

    #[test]
    fn test_aggregation_skips_missing_cells() {
        let cells = [Some(10.0), None, Some(30.0)];
        assert_eq!(Aggregation::Sum.apply(&cells), Some(40.0));
        assert_eq!(Aggregation::Mean.apply(&cells), Some(20.0));
    }

    #[test]
    fn test_aggregation_all_missing_is_none_not_zero() {
        let cells = [None, None];
        assert_eq!(Aggregation::Sum.apply(&cells), None);
        assert_eq!(Aggregation::Mean.apply(&cells), None);
        assert_eq!(Aggregation::LastValue.apply(&[]), None);
    }

    #[test]
    fn test_last_value_uses_final_row_only() {
        let cells = [Some(10.0), Some(20.0), None];
        assert_eq!(Aggregation::LastValue.apply(&cells), None);
    }

    #[test]
    fn test_aggregation_serde_names() {
        let json = serde_json::to_string(&Aggregation::LastValue).unwrap();
        assert_eq!(json, "\"last-value\"");
        let parsed: Aggregation = serde_json::from_str("\"mean\"").unwrap();
        assert_eq!(parsed, Aggregation::Mean);
    }

    // ── MetricSpec ────────────────────────────────────────────────────────────

    #[test]
    fn test_column_groups_prefers_components() {
        let single = MetricSpec {
            id: "trade_value".to_string(),
            file_type: "trade".to_string(),
            candidates: vec!["trade_value".to_string()],
            aggregation: Aggregation::Sum,
            components: vec![],
        };
        assert_eq!(single.column_groups().len(), 1);

        let summed = MetricSpec {
            components: vec![vec!["a".to_string()], vec!["b".to_string()]],
            ..single
        };
        assert_eq!(summed.column_groups().len(), 2);
        assert_eq!(summed.column_groups()[1], ["b".to_string()]);
    }

    // ── MonthContext ──────────────────────────────────────────────────────────

    #[test]
    fn test_month_context_from_directory() {
        let ctx = MonthContext::from_directory(Path::new("/a/EVEOnline_MER_Jun2022")).unwrap();
        assert_eq!(ctx.month(), date(2022, 6, 1));
        assert_eq!(ctx.year_month(), "2022-06");
        assert_eq!(ctx.name(), "EVEOnline_MER_Jun2022");
        assert!(ctx.contains(date(2022, 6, 30)));
        assert!(!ctx.contains(date(2022, 7, 1)));
        assert!(!ctx.contains(date(2021, 6, 15)));
    }

    #[test]
    fn test_month_context_rejects_unparseable_name() {
        let err = MonthContext::from_directory(Path::new("/a/readme")).unwrap_err();
        assert!(matches!(err, MerError::InvalidMonthDirectory(name) if name == "readme"));
    }

    // ── MonthRecord ───────────────────────────────────────────────────────────

    #[test]
    fn test_month_record_never_overwrites() {
        let mut rec = MonthRecord::new(date(2022, 6, 1));
        assert!(rec.insert_extracted("trade_value", 1.0));
        assert!(!rec.insert_extracted("trade_value", 2.0));
        assert_eq!(rec.get("trade_value"), Some(1.0));
        assert_eq!(rec.extracted_count(), 1);
    }

    #[test]
    fn test_month_record_imputation_not_counted() {
        let mut rec = MonthRecord::new(date(2022, 6, 1));
        rec.insert_extracted("a", 1.0);
        assert!(rec.impute("b", 5.0));
        assert!(!rec.impute("a", 9.0));
        assert_eq!(rec.get("a"), Some(1.0));
        assert_eq!(rec.get("b"), Some(5.0));
        assert_eq!(rec.extracted_count(), 1);
    }

    // ── Dataset ───────────────────────────────────────────────────────────────

    #[test]
    fn test_dataset_sorted_and_unique_by_date() {
        let mut first = MonthRecord::new(date(2022, 6, 1));
        first.insert_extracted("a", 1.0);
        let mut dup = MonthRecord::new(date(2022, 6, 1));
        dup.insert_extracted("a", 2.0);
        let earlier = MonthRecord::new(date(2022, 1, 1));

        let ds = Dataset::new(vec![first, dup, earlier], vec!["a".to_string()]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records()[0].date, date(2022, 1, 1));
        assert_eq!(ds.column("a"), vec![None, Some(1.0)]);
        assert_eq!(ds.date_range(), Some((date(2022, 1, 1), date(2022, 6, 1))));
    }

    #[test]
    fn test_empty_dataset_has_no_range() {
        let ds = Dataset::new(vec![], vec![]);
        assert!(ds.is_empty());
        assert!(ds.date_range().is_none());
    }

    // ── ClassificationResult ──────────────────────────────────────────────────

    #[test]
    fn test_classification_counts() {
        let result = ClassificationResult {
            metric: "m".to_string(),
            percentile: 75.0,
            threshold: 3.0,
            labels: vec![false, true, true],
        };
        assert_eq!(result.elevated_count(), 2);
        assert_eq!(result.label_value(0), 0);
        assert_eq!(result.label_value(1), 1);
        assert_eq!(result.label_value(10), 0);
    }
}
