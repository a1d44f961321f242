//! Per-file-type metric extraction.
//!
//! A [`MetricExtractor`] owns one [`FileTypeSpec`] and the metrics it
//! supplies. It resolves and reads the file once per month, optionally
//! restricts rows to the target month, then resolves and aggregates each
//! metric's column(s). Every outcome is an [`Extraction`]; nothing here
//! returns an error.

use mer_core::diagnostics::{ColumnMatch, FileReport, FileResolution, MetricOutcome, TableReport};
use mer_core::models::{Absence, Extraction, FileTypeSpec, MetricSpec, MonthContext};
use mer_core::time_utils::parse_cell_date;
use tracing::{debug, warn};

use crate::columns::resolve_column;
use crate::files::resolve_file;
use crate::reader::{read_table, RawTable, TextEncoding};

/// Extracts every metric of one file type from a month directory.
#[derive(Debug, Clone)]
pub struct MetricExtractor<'a> {
    file_type: &'a FileTypeSpec,
    metrics: Vec<&'a MetricSpec>,
}

impl<'a> MetricExtractor<'a> {
    pub fn new(file_type: &'a FileTypeSpec, metrics: Vec<&'a MetricSpec>) -> Self {
        Self { file_type, metrics }
    }

    pub fn file_type(&self) -> &FileTypeSpec {
        self.file_type
    }

    pub fn metrics(&self) -> &[&'a MetricSpec] {
        &self.metrics
    }

    /// Resolve, read and aggregate this file type for `ctx`.
    ///
    /// Returns the file report and one outcome per metric, in catalog order.
    pub fn extract(&self, ctx: &MonthContext) -> (FileReport, Vec<MetricOutcome>) {
        let resolution = resolve_file(ctx.directory(), self.file_type);
        self.extract_resolved(resolution, ctx)
    }

    /// [`MetricExtractor::extract`] after the file has been resolved.
    ///
    /// A found file that cannot be read fails every metric of this type.
    pub fn extract_resolved(
        &self,
        resolution: FileResolution,
        ctx: &MonthContext,
    ) -> (FileReport, Vec<MetricOutcome>) {
        let path = match &resolution {
            FileResolution::Found { path, .. } => path.clone(),
            FileResolution::NotFound { csv_entries } => {
                warn!(
                    "{}: no {} file (csv present: {})",
                    ctx.name(),
                    self.file_type.id,
                    if csv_entries.is_empty() {
                        "none".to_string()
                    } else {
                        csv_entries.join(", ")
                    }
                );
                let outcomes = self.all(Extraction::Absent(Absence::FileNotFound));
                return (self.report(resolution, None, None), outcomes);
            }
        };

        let table = match read_table(&path) {
            Ok(t) => t,
            Err(e) => {
                let reason = e.to_string();
                warn!("{}: {} unusable: {}", ctx.name(), self.file_type.id, reason);
                let outcomes = self.all(Extraction::Failed(reason.clone()));
                return (self.report(resolution, None, Some(reason)), outcomes);
            }
        };

        let (table_report, error, outcomes) = self.extract_from_table(&table, ctx);
        (self.report(resolution, Some(table_report), error), outcomes)
    }

    /// Aggregate this file type's metrics from an already-read table.
    pub fn extract_from_table(
        &self,
        table: &RawTable,
        ctx: &MonthContext,
    ) -> (TableReport, Option<String>, Vec<MetricOutcome>) {
        let mut report = TableReport {
            columns: table.columns.clone(),
            rows: table.row_count(),
            skipped_rows: table.skipped_rows,
            delimiter: char::from(table.delimiter),
            fallback_encoding: table.encoding == TextEncoding::Latin1,
            date_column: None,
            rows_in_month: None,
        };

        if table.is_empty() {
            debug!("{}: {} file is empty", ctx.name(), self.file_type.id);
            return (report, None, self.all(Extraction::Absent(Absence::ColumnNotFound)));
        }

        let selected = if self.file_type.is_month_filtered() {
            let Some(date_column) = resolve_column(&table.columns, &self.file_type.date_columns)
            else {
                let reason = format!(
                    "no date column among [{}]",
                    self.file_type.date_columns.join(", ")
                );
                warn!("{}: {} {}", ctx.name(), self.file_type.id, reason);
                return (report, Some(reason.clone()), self.all(Extraction::Failed(reason)));
            };
            let rows = rows_in_month(table, date_column.index, ctx);
            debug!(
                "{}: {} rows of {} fall in {}",
                ctx.name(),
                rows.len(),
                table.row_count(),
                ctx.year_month()
            );
            report.date_column = Some(date_column.label);
            report.rows_in_month = Some(rows.len());
            Some(rows)
        } else {
            None
        };

        let outcomes = self
            .metrics
            .iter()
            .map(|metric| self.extract_metric(metric, table, selected.as_deref(), ctx))
            .collect();
        (report, None, outcomes)
    }

    fn extract_metric(
        &self,
        metric: &MetricSpec,
        table: &RawTable,
        rows: Option<&[usize]>,
        ctx: &MonthContext,
    ) -> MetricOutcome {
        let mut columns: Vec<ColumnMatch> = Vec::new();
        let mut total: Option<f64> = None;

        for group in metric.column_groups() {
            let Some(column) = resolve_column(&table.columns, group) else {
                continue;
            };
            // A loose substring match can land two groups on one column.
            if columns.iter().any(|c| c.index == column.index) {
                continue;
            }
            let cells = table.numeric_column(column.index, rows);
            if let Some(v) = metric.aggregation.apply(&cells) {
                total = Some(total.unwrap_or(0.0) + v);
            }
            columns.push(column);
        }

        let extraction = if columns.is_empty() {
            Extraction::Absent(Absence::ColumnNotFound)
        } else if rows.is_some_and(|r| r.is_empty()) {
            Extraction::Absent(Absence::NoRowsForMonth)
        } else {
            match total {
                Some(v) => Extraction::Value(v),
                None => Extraction::Absent(Absence::NoNumericValues),
            }
        };

        match &extraction {
            Extraction::Value(v) => debug!(
                "{}: {} = {} ({} over {:?})",
                ctx.name(),
                metric.id,
                v,
                metric.aggregation,
                columns.iter().map(|c| c.label.as_str()).collect::<Vec<_>>()
            ),
            other => warn!("{}: {} missing: {:?}", ctx.name(), metric.id, other),
        }

        MetricOutcome {
            metric: metric.id.clone(),
            file_type: self.file_type.id.clone(),
            columns,
            extraction,
        }
    }

    fn all(&self, extraction: Extraction) -> Vec<MetricOutcome> {
        self.metrics
            .iter()
            .map(|m| MetricOutcome {
                metric: m.id.clone(),
                file_type: self.file_type.id.clone(),
                columns: Vec::new(),
                extraction: extraction.clone(),
            })
            .collect()
    }

    fn report(
        &self,
        resolution: FileResolution,
        table: Option<TableReport>,
        error: Option<String>,
    ) -> FileReport {
        FileReport {
            file_type: self.file_type.id.clone(),
            resolution,
            table,
            error,
        }
    }
}

/// Indices of rows whose date cell falls in the month of `ctx`.
/// Rows with an unparseable date are excluded.
pub fn rows_in_month(table: &RawTable, date_index: usize, ctx: &MonthContext) -> Vec<usize> {
    table
        .cells(date_index, None)
        .into_iter()
        .enumerate()
        .filter(|(_, cell)| parse_cell_date(cell).is_some_and(|d| ctx.contains(d)))
        .map(|(i, _)| i)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mer_core::catalog::Catalog;
    use mer_core::models::Aggregation;
    use std::path::Path;
    use tempfile::TempDir;

    fn month_dir(root: &Path, name: &str) -> MonthContext {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        MonthContext::from_directory(&dir).unwrap()
    }

    fn write(ctx: &MonthContext, name: &str, content: &str) {
        std::fs::write(ctx.directory().join(name), content).unwrap();
    }

    fn fixture_type(date_columns: &[&str]) -> FileTypeSpec {
        FileTypeSpec {
            id: "fixture".to_string(),
            candidates: vec!["fixture.csv".to_string()],
            patterns: vec![],
            date_columns: date_columns.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn fixture_metric(id: &str, aggregation: Aggregation) -> MetricSpec {
        MetricSpec {
            id: id.to_string(),
            file_type: "fixture".to_string(),
            candidates: vec!["value".to_string()],
            aggregation,
            components: vec![],
        }
    }

    fn value_of(outcomes: &[MetricOutcome], metric: &str) -> Extraction {
        outcomes
            .iter()
            .find(|o| o.metric == metric)
            .map(|o| o.extraction.clone())
            .unwrap()
    }

    fn builtin_extractor<'a>(catalog: &'a Catalog, id: &str) -> MetricExtractor<'a> {
        MetricExtractor::new(catalog.file_type(id).unwrap(), catalog.metrics_for(id))
    }

    // ── aggregation rules ─────────────────────────────────────────────────────

    #[test]
    fn test_sum_mean_last_value_over_fixture() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(&ctx, "fixture.csv", "value\n10\n20\n30\n");

        let ft = fixture_type(&[]);
        let sum = fixture_metric("sum", Aggregation::Sum);
        let mean = fixture_metric("mean", Aggregation::Mean);
        let last = fixture_metric("last", Aggregation::LastValue);
        let extractor = MetricExtractor::new(&ft, vec![&sum, &mean, &last]);

        let (report, outcomes) = extractor.extract(&ctx);
        assert!(report.error.is_none());
        assert_eq!(value_of(&outcomes, "sum"), Extraction::Value(60.0));
        assert_eq!(value_of(&outcomes, "mean"), Extraction::Value(20.0));
        assert_eq!(value_of(&outcomes, "last"), Extraction::Value(30.0));
    }

    #[test]
    fn test_non_numeric_cells_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(&ctx, "fixture.csv", "value\n10\nn/a\n30\n");

        let ft = fixture_type(&[]);
        let mean = fixture_metric("mean", Aggregation::Mean);
        let (_, outcomes) = MetricExtractor::new(&ft, vec![&mean]).extract(&ctx);
        assert_eq!(value_of(&outcomes, "mean"), Extraction::Value(20.0));
    }

    #[test]
    fn test_all_non_numeric_is_absent_not_zero() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(&ctx, "fixture.csv", "value\nx\ny\n");

        let ft = fixture_type(&[]);
        let sum = fixture_metric("sum", Aggregation::Sum);
        let (_, outcomes) = MetricExtractor::new(&ft, vec![&sum]).extract(&ctx);
        assert_eq!(
            value_of(&outcomes, "sum"),
            Extraction::Absent(Absence::NoNumericValues)
        );
    }

    // ── month filtering ───────────────────────────────────────────────────────

    fn june_with_july_row() -> String {
        let mut csv = String::from("history_date,production_isk\n");
        for day in 1..=30 {
            csv.push_str(&format!("2022-06-{day:02},1\n"));
        }
        csv.push_str("2022-07-01,1000\n");
        csv
    }

    #[test]
    fn test_month_filter_excludes_rows_of_other_months() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "EVEOnline_MER_Jun2022");
        write(&ctx, "produced_destroyed_mined.csv", &june_with_july_row());

        let catalog = Catalog::builtin();
        let (report, outcomes) = builtin_extractor(&catalog, "production").extract(&ctx);

        assert_eq!(value_of(&outcomes, "production_isk"), Extraction::Value(30.0));
        let table = report.table.unwrap();
        assert_eq!(table.date_column.as_deref(), Some("history_date"));
        assert_eq!(table.rows_in_month, Some(30));
        assert_eq!(table.rows, 31);
    }

    #[test]
    fn test_month_without_rows_is_missing_not_zero() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "EVEOnline_MER_Aug2022");
        write(&ctx, "produced_destroyed_mined.csv", &june_with_july_row());

        let catalog = Catalog::builtin();
        let (_, outcomes) = builtin_extractor(&catalog, "production").extract(&ctx);

        assert_eq!(
            value_of(&outcomes, "production_isk"),
            Extraction::Absent(Absence::NoRowsForMonth)
        );
        assert!(outcomes.iter().all(|o| o.extraction.value().is_none()));
    }

    #[test]
    fn test_month_filter_falls_back_to_second_date_column() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(
            &ctx,
            "ProducedDestroyedMined.csv",
            "Date,destroyed\n2022-06-05,4\n2022-05-31,100\n2022-06-20,6\n",
        );

        let catalog = Catalog::builtin();
        let (_, outcomes) = builtin_extractor(&catalog, "production").extract(&ctx);
        assert_eq!(value_of(&outcomes, "destruction_isk"), Extraction::Value(10.0));
    }

    #[test]
    fn test_month_filtered_file_without_date_column_fails() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(&ctx, "fixture.csv", "value\n1\n");

        let ft = fixture_type(&["history_date"]);
        let sum = fixture_metric("sum", Aggregation::Sum);
        let (report, outcomes) = MetricExtractor::new(&ft, vec![&sum]).extract(&ctx);

        assert!(report.error.unwrap().contains("no date column"));
        assert!(matches!(value_of(&outcomes, "sum"), Extraction::Failed(_)));
    }

    // ── missing inputs ────────────────────────────────────────────────────────

    #[test]
    fn test_missing_file_is_absent_for_every_metric() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");

        let catalog = Catalog::builtin();
        let (report, outcomes) = builtin_extractor(&catalog, "trade").extract(&ctx);

        assert!(matches!(report.resolution, FileResolution::NotFound { .. }));
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .iter()
            .all(|o| o.extraction == Extraction::Absent(Absence::FileNotFound)));
    }

    #[test]
    fn test_unreadable_file_fails_every_metric() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(&ctx, "RegionalStats.csv", "region,trade_value\nA,1\n");

        let catalog = Catalog::builtin();
        let extractor = builtin_extractor(&catalog, "trade");
        let resolution = resolve_file(ctx.directory(), extractor.file_type());
        assert!(matches!(resolution, FileResolution::Found { .. }));
        // Gone between resolution and reading.
        std::fs::remove_file(ctx.directory().join("RegionalStats.csv")).unwrap();

        let (report, outcomes) = extractor.extract_resolved(resolution, &ctx);
        assert!(report.table.is_none());
        assert!(report.error.is_some());
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.extraction, Extraction::Failed(_))));
    }

    #[test]
    fn test_missing_column_omits_only_that_metric() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(&ctx, "regional_stats.csv", "region,trade_value\nA,5\nB,7\n");

        let catalog = Catalog::builtin();
        let (_, outcomes) = builtin_extractor(&catalog, "trade").extract(&ctx);

        assert_eq!(value_of(&outcomes, "trade_value"), Extraction::Value(12.0));
        assert_eq!(
            value_of(&outcomes, "total_exports"),
            Extraction::Absent(Absence::ColumnNotFound)
        );
    }

    #[test]
    fn test_empty_file_yields_no_values() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(&ctx, "kill_dump.csv", "");

        let catalog = Catalog::builtin();
        let (report, outcomes) = builtin_extractor(&catalog, "losses").extract(&ctx);

        assert!(report.error.is_none());
        assert_eq!(
            value_of(&outcomes, "total_isk_destroyed"),
            Extraction::Absent(Absence::ColumnNotFound)
        );
    }

    // ── file-type specifics ───────────────────────────────────────────────────

    #[test]
    fn test_money_supply_semicolon_decimal_comma_mean() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(
            &ctx,
            "MoneySupply.csv",
            "date;iskVelocity;Total ISK\n2022-06-01;0,5;100\n2022-06-02;1,5;300\n",
        );

        let catalog = Catalog::builtin();
        let (_, outcomes) = builtin_extractor(&catalog, "money_supply").extract(&ctx);

        assert_eq!(value_of(&outcomes, "isk_velocity"), Extraction::Value(1.0));
        assert_eq!(value_of(&outcomes, "total_isk"), Extraction::Value(200.0));
    }

    #[test]
    fn test_mining_volume_sums_resolved_components() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(
            &ctx,
            "mining_history_by_security_band.csv",
            "security,asteroid_volume_mined,IceVolumeMined\nhigh,10,1\nlow,20,2\n",
        );

        let catalog = Catalog::builtin();
        let (_, outcomes) = builtin_extractor(&catalog, "mining").extract(&ctx);
        let outcome = outcomes.iter().find(|o| o.metric == "total_volume_mined").unwrap();

        assert_eq!(outcome.extraction, Extraction::Value(33.0));
        assert_eq!(outcome.columns.len(), 2);
    }

    #[test]
    fn test_losses_sum_whole_file() {
        let tmp = TempDir::new().unwrap();
        let ctx = month_dir(tmp.path(), "MER_Jun2022");
        write(
            &ctx,
            "KillDump.csv",
            "kill_datetime,iskDestroyed\n2022-06-01,100\n2022-05-30,50\n",
        );

        let catalog = Catalog::builtin();
        let (_, outcomes) = builtin_extractor(&catalog, "losses").extract(&ctx);
        assert_eq!(
            value_of(&outcomes, "total_isk_destroyed"),
            Extraction::Value(150.0)
        );
    }
}
