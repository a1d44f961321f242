use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use crate::error::{MerError, Result};

// ── VelocityFormula ────────────────────────────────────────────────────────────

/// Formula for the optional derived money-velocity column.
///
/// Different report generations computed this ratio differently, so the
/// choice is always explicit and the raw extracted velocity is kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VelocityFormula {
    /// `trade_value / total_isk`
    TradeOverSupply,
    /// `(trade_value + destruction_isk) / total_isk`
    TradeDestructionOverSupply,
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Consolidate monthly economic report archives into one time series
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mer-consolidate",
    about = "Consolidate monthly economic report archives into one time series",
    version
)]
pub struct Settings {
    /// Directory holding one subdirectory per month
    #[arg(long, env = "MER_ARCHIVES")]
    pub archives: PathBuf,

    /// Output dataset (delimited text)
    #[arg(long, default_value = "consolidated.csv")]
    pub output: PathBuf,

    /// First month to include (YYYY-MM-DD)
    #[arg(long, default_value = "2019-12-01")]
    pub start_date: String,

    /// Only consider month directories whose name starts with this prefix
    #[arg(long)]
    pub dir_prefix: Option<String>,

    /// Metric used for the period label
    #[arg(long, default_value = "total_isk_destroyed")]
    pub label_metric: String,

    /// Percentile threshold for the period label (0-100)
    #[arg(long, default_value = "75")]
    pub percentile: f64,

    /// Name of the period label column
    #[arg(long, default_value = "is_war_period")]
    pub label_column: String,

    /// Name of the month column
    #[arg(long, default_value = "history_date")]
    pub date_column: String,

    /// JSON catalog replacing the built-in file/metric tables
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Diagnostics log path (defaults to `<output stem>_log.txt`)
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,

    /// Run summary path (defaults to `<output stem>_summary.json`)
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Add a derived velocity column computed with this formula
    #[arg(long, value_enum)]
    pub velocity_formula: Option<VelocityFormula>,

    /// Process months one at a time instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse from an explicit argument list, validate and apply `--debug`.
    pub fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let settings =
            Settings::try_parse_from(args).map_err(|e| MerError::Config(e.to_string()))?;
        settings.finish()
    }

    /// Parse the process arguments. `--help`, `--version` and usage errors
    /// exit the process the way clap normally does.
    pub fn load() -> Result<Self> {
        Settings::parse().finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.validate()?;
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        Ok(self)
    }

    /// Reject values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(MerError::Config(format!(
                "percentile must be within 0..=100, got {}",
                self.percentile
            )));
        }
        self.start_date()?;
        if self.label_column == self.date_column {
            return Err(MerError::Config(
                "label column and date column must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject a date or label column named like one of `reserved`, the
    /// metric and derived columns that share the output header.
    pub fn validate_columns(&self, reserved: &[String]) -> Result<()> {
        for (flag, name) in [
            ("--date-column", &self.date_column),
            ("--label-column", &self.label_column),
        ] {
            if reserved.iter().any(|r| r == name) {
                return Err(MerError::Config(format!(
                    "{flag} {name} collides with an output column of the same name"
                )));
            }
        }
        Ok(())
    }

    /// The parsed `--start-date`.
    pub fn start_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").map_err(|e| {
            MerError::Config(format!("invalid start date {:?}: {e}", self.start_date))
        })
    }

    /// Where the diagnostics log goes.
    pub fn diagnostics_path(&self) -> PathBuf {
        self.diagnostics
            .clone()
            .unwrap_or_else(|| sibling_path(&self.output, "_log.txt"))
    }

    /// Where the JSON run summary goes.
    pub fn summary_path(&self) -> PathBuf {
        self.summary
            .clone()
            .unwrap_or_else(|| sibling_path(&self.output, "_summary.json"))
    }
}

/// `dir/stem.ext` → `dir/stem<suffix>`.
fn sibling_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "consolidated".to_string());
    output.with_file_name(format!("{stem}{suffix}"))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
