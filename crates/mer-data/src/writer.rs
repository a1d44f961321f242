//! Delimited output of an assembled dataset.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use mer_core::error::{MerError, Result};
use mer_core::models::{ClassificationResult, Dataset};
use tracing::info;

/// A column computed outside the dataset, aligned with its records.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Names of the non-metric output columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub date_column: String,
    pub label_column: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            date_column: "history_date".to_string(),
            label_column: "is_war_period".to_string(),
        }
    }
}

/// Write `dataset` as comma-separated text to `path`.
///
/// Columns: the month date, every metric in dataset order, any derived
/// columns, then the period label when `labels` is given. Missing values
/// are written as empty cells. Output depends only on the arguments, so an
/// unchanged dataset always produces identical bytes.
pub fn write_dataset(
    path: &Path,
    dataset: &Dataset,
    layout: &OutputLayout,
    derived: &[DerivedColumn],
    labels: Option<&ClassificationResult>,
) -> Result<()> {
    header(dataset, layout, derived, labels)?;
    let file = std::fs::File::create(path)?;
    write_dataset_to(file, dataset, layout, derived, labels)?;
    info!("Wrote {} months to {}", dataset.len(), path.display());
    Ok(())
}

/// [`write_dataset`] into any writer.
pub fn write_dataset_to<W: io::Write>(
    writer: W,
    dataset: &Dataset,
    layout: &OutputLayout,
    derived: &[DerivedColumn],
    labels: Option<&ClassificationResult>,
) -> Result<()> {
    let header = header(dataset, layout, derived, labels)?;
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&header).map_err(io::Error::from)?;

    for (i, record) in dataset.records().iter().enumerate() {
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        row.push(record.date.format("%Y-%m-%d").to_string());
        row.extend(dataset.metrics().iter().map(|m| cell(record.get(m))));
        row.extend(derived.iter().map(|c| cell(c.values[i])));
        if let Some(result) = labels {
            row.push(result.label_value(i).to_string());
        }
        out.write_record(&row).map_err(io::Error::from)?;
    }

    out.flush()?;
    Ok(())
}

/// Output header, after checking every extra column lines up with the
/// dataset and no name appears twice.
fn header<'a>(
    dataset: &'a Dataset,
    layout: &'a OutputLayout,
    derived: &'a [DerivedColumn],
    labels: Option<&ClassificationResult>,
) -> Result<Vec<&'a str>> {
    for column in derived {
        if column.values.len() != dataset.len() {
            return Err(MerError::Config(format!(
                "derived column {} has {} values for {} months",
                column.name,
                column.values.len(),
                dataset.len()
            )));
        }
    }
    if let Some(result) = labels {
        if result.labels.len() != dataset.len() {
            return Err(MerError::Config(format!(
                "{} labels for {} months",
                result.labels.len(),
                dataset.len()
            )));
        }
    }

    let mut header: Vec<&str> = vec![layout.date_column.as_str()];
    header.extend(dataset.metrics().iter().map(String::as_str));
    header.extend(derived.iter().map(|c| c.name.as_str()));
    if labels.is_some() {
        header.push(layout.label_column.as_str());
    }

    let mut names = HashSet::new();
    if let Some(dup) = header.iter().find(|name| !names.insert(**name)) {
        return Err(MerError::Config(format!("duplicate output column {dup}")));
    }
    Ok(header)
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
