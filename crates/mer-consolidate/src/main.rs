mod bootstrap;
mod derive;
mod report;
mod summary;

use anyhow::Result;
use mer_core::catalog::Catalog;
use mer_core::classifier::PeriodClassifier;
use mer_core::error::MerError;
use mer_core::settings::Settings;
use mer_data::assembler::{AssemblyOptions, DatasetAssembler};
use mer_data::writer::{write_dataset, OutputLayout};

use crate::summary::RunSummary;

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level)?;
    tracing::info!("mer-consolidate v{} starting", env!("CARGO_PKG_VERSION"));

    let summary = run(&settings)?;
    tracing::info!(
        "Done: {} months, {} imputed cell(s), output {}",
        summary.months_kept,
        summary.imputed_cells,
        settings.output.display()
    );
    Ok(())
}

/// Assemble, classify and write every output for one run.
fn run(settings: &Settings) -> Result<RunSummary> {
    let catalog = match &settings.catalog {
        Some(path) => Catalog::load_from(path)?,
        None => Catalog::builtin(),
    };
    let mut reserved = catalog.metric_ids();
    reserved.push(derive::DERIVED_VELOCITY_COLUMN.to_string());
    settings.validate_columns(&reserved)?;

    let mut options = AssemblyOptions::new(settings.start_date()?);
    if let Some(prefix) = &settings.dir_prefix {
        options = options.with_prefix(prefix.clone());
    }
    if settings.sequential {
        options = options.sequential();
    }
    tracing::info!(
        "Scanning {} for months from {}",
        settings.archives.display(),
        options.start_date
    );
    let (dataset, report) = DatasetAssembler::new(&catalog, options).assemble(&settings.archives)?;

    let classifier = PeriodClassifier::new(&settings.label_metric, settings.percentile);
    let classification = match classifier.classify(&dataset) {
        Ok(result) => Some(result),
        Err(MerError::MetricUnavailable(metric)) => {
            tracing::warn!(
                "{} is missing from every month; writing without {}",
                metric,
                settings.label_column
            );
            None
        }
        Err(e) => return Err(e.into()),
    };

    let derived: Vec<_> = settings
        .velocity_formula
        .map(|formula| derive::derive_velocity(&dataset, formula))
        .into_iter()
        .collect();

    let diagnostics_path = settings.diagnostics_path();
    let summary_path = settings.summary_path();
    bootstrap::ensure_parent_dirs(&[
        settings.output.as_path(),
        diagnostics_path.as_path(),
        summary_path.as_path(),
    ])?;

    let layout = OutputLayout {
        date_column: settings.date_column.clone(),
        label_column: settings.label_column.clone(),
    };
    write_dataset(
        &settings.output,
        &dataset,
        &layout,
        &derived,
        classification.as_ref(),
    )?;

    let log = report::render_diagnostics(&report, &dataset, classification.as_ref());
    std::fs::write(&diagnostics_path, log)?;
    tracing::info!("Diagnostics written to {}", diagnostics_path.display());

    let summary = RunSummary::build(
        &dataset,
        &report,
        derived.iter().map(|c| c.name.clone()).collect(),
        classification.as_ref(),
    );
    summary.write(&summary_path)?;
    tracing::info!("Summary written to {}", summary_path.display());

    Ok(summary)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
