//! Ratios computed from extracted metrics at the output stage.

use mer_core::models::{Dataset, MonthRecord};
use mer_core::settings::VelocityFormula;
use mer_data::writer::DerivedColumn;

pub const DERIVED_VELOCITY_COLUMN: &str = "isk_velocity_derived";

/// Money velocity per month under `formula`.
///
/// A month lacking an input, or with a zero money supply, gets no value.
pub fn derive_velocity(dataset: &Dataset, formula: VelocityFormula) -> DerivedColumn {
    let values = dataset
        .records()
        .iter()
        .map(|record| velocity(record, formula))
        .collect();
    DerivedColumn {
        name: DERIVED_VELOCITY_COLUMN.to_string(),
        values,
    }
}

fn velocity(record: &MonthRecord, formula: VelocityFormula) -> Option<f64> {
    let supply = record.get("total_isk").filter(|s| *s != 0.0)?;
    let trade = record.get("trade_value")?;
    let numerator = match formula {
        VelocityFormula::TradeOverSupply => trade,
        VelocityFormula::TradeDestructionOverSupply => trade + record.get("destruction_isk")?,
    };
    Some(numerator / supply)
}
