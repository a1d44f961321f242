//! Human-readable rendering of the assembly diagnostics.

use std::fmt::Write;

use mer_core::diagnostics::{AssemblyReport, FileMatch, FileReport, FileResolution, MetricOutcome};
use mer_core::models::{ClassificationResult, Dataset, Extraction};

/// Render the diagnostics log: skipped directories, one block per month,
/// coverage, imputed cells and the classification outcome.
pub fn render_diagnostics(
    report: &AssemblyReport,
    dataset: &Dataset,
    classification: Option<&ClassificationResult>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Monthly report consolidation");
    let _ = writeln!(out, "============================");
    let _ = writeln!(out, "Directories scanned: {}", report.directories_scanned);
    let _ = writeln!(out, "Months kept: {}", report.months_kept);

    for (title, names) in [
        ("Skipped, no month in name", &report.unparseable),
        ("Skipped, prefix filter", &report.filtered_by_prefix),
        ("Skipped, before start date", &report.before_start),
        ("Skipped, duplicate month", &report.duplicates),
        ("Dropped, no metrics", &report.dropped_empty),
    ] {
        if !names.is_empty() {
            let _ = writeln!(out, "{title}: {}", names.join(", "));
        }
    }

    for month in &report.months {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "── {} {} ──",
            month.month.format("%Y-%m"),
            month.directory
        );
        let _ = writeln!(out, "  files:");
        for file in &month.files {
            let _ = writeln!(out, "    {}", file_line(file));
        }
        let _ = writeln!(out, "  metrics:");
        for metric in &month.metrics {
            let _ = writeln!(out, "    {}", metric_line(metric));
        }
        if !month.conflicts.is_empty() {
            let _ = writeln!(out, "  conflicts: {}", month.conflicts.join(", "));
        }
        let _ = writeln!(out, "  extracted: {}", month.extracted);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Coverage before imputation:");
    for cov in &report.coverage {
        let _ = writeln!(
            out,
            "  {:<22} {}/{} ({:.1}%)",
            cov.metric,
            cov.months_present,
            cov.months_total,
            cov.percent()
        );
    }

    if !report.imputed.is_empty() {
        let _ = writeln!(out, "Imputed with column median:");
        for cell in &report.imputed {
            let _ = writeln!(
                out,
                "  {} {} = {}",
                cell.month.format("%Y-%m"),
                cell.metric,
                cell.value
            );
        }
    }

    let _ = writeln!(out);
    match classification {
        Some(result) => {
            let _ = writeln!(
                out,
                "Period label: {} >= p{} threshold {}; {} of {} months elevated",
                result.metric,
                result.percentile,
                result.threshold,
                result.elevated_count(),
                result.labels.len()
            );
            let elevated: Vec<String> = dataset
                .records()
                .iter()
                .zip(&result.labels)
                .filter(|(_, label)| **label)
                .map(|(record, _)| record.date.format("%Y-%m").to_string())
                .collect();
            if !elevated.is_empty() {
                let _ = writeln!(out, "  elevated: {}", elevated.join(", "));
            }
        }
        None => {
            let _ = writeln!(out, "Period label: not computed");
        }
    }

    out
}

fn file_line(file: &FileReport) -> String {
    let mut line = match &file.resolution {
        FileResolution::Found { path, matched_by } => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let how = match matched_by {
                FileMatch::ExactName => "exact name".to_string(),
                FileMatch::CaseInsensitiveName => "name, ignoring case".to_string(),
                FileMatch::Pattern {
                    pattern,
                    case_insensitive: false,
                } => format!("pattern {pattern}"),
                FileMatch::Pattern { pattern, .. } => format!("pattern {pattern}, ignoring case"),
            };
            format!("{}: {} ({})", file.file_type, name, how)
        }
        FileResolution::NotFound { csv_entries } if csv_entries.is_empty() => {
            format!("{}: NOT FOUND (no csv files present)", file.file_type)
        }
        FileResolution::NotFound { csv_entries } => format!(
            "{}: NOT FOUND (csv present: {})",
            file.file_type,
            csv_entries.join(", ")
        ),
    };

    if let Some(table) = &file.table {
        let _ = write!(line, ", {} rows", table.rows);
        if table.skipped_rows > 0 {
            let _ = write!(line, ", {} malformed skipped", table.skipped_rows);
        }
        if table.delimiter != ',' {
            let _ = write!(line, ", delimiter '{}'", table.delimiter);
        }
        if table.fallback_encoding {
            let _ = write!(line, ", latin-1");
        }
        if let (Some(column), Some(rows)) = (&table.date_column, table.rows_in_month) {
            let _ = write!(line, ", {rows} in month by {column}");
        }
    }
    if let Some(error) = &file.error {
        let _ = write!(line, "; ERROR: {error}");
    }
    line
}

fn metric_line(outcome: &MetricOutcome) -> String {
    let columns: Vec<&str> = outcome.columns.iter().map(|c| c.label.as_str()).collect();
    match &outcome.extraction {
        Extraction::Value(v) => format!("{} = {} [{}]", outcome.metric, v, columns.join(" + ")),
        Extraction::Absent(reason) => format!("{}: missing ({})", outcome.metric, reason),
        Extraction::Failed(reason) => format!("{}: failed ({})", outcome.metric, reason),
    }
}
