//! Declarative file-type and metric tables.
//!
//! Every file-name and column-name variant the pipeline knows about lives
//! here; the resolvers in `mer-data` only consult these tables.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MerError, Result};
use crate::models::{Aggregation, FileTypeSpec, MetricSpec};

/// The full set of file types and metrics for a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub file_types: Vec<FileTypeSpec>,
    pub metrics: Vec<MetricSpec>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn file_type(id: &str, candidates: &[&str], patterns: &[&str], date_columns: &[&str]) -> FileTypeSpec {
    FileTypeSpec {
        id: id.to_string(),
        candidates: strings(candidates),
        patterns: strings(patterns),
        date_columns: strings(date_columns),
    }
}

fn metric(id: &str, file_type: &str, candidates: &[&str], aggregation: Aggregation) -> MetricSpec {
    MetricSpec {
        id: id.to_string(),
        file_type: file_type.to_string(),
        candidates: strings(candidates),
        aggregation,
        components: Vec::new(),
    }
}

impl Catalog {
    /// The catalog for the monthly economic report archives.
    pub fn builtin() -> Self {
        let file_types = vec![
            file_type(
                "production",
                &[
                    "produced_destroyed_mined.csv",
                    "ProducedDestroyedMined.csv",
                    "Produced_Destroyed_Mined.csv",
                    "producedDestroyedMined.csv",
                    "PRODUCED_DESTROYED_MINED.csv",
                ],
                &["*produced*destroyed*mined*.csv", "*Produced*Destroyed*Mined*.csv"],
                &["history_date", "date"],
            ),
            file_type(
                "trade",
                &[
                    "regional_stats.csv",
                    "RegionalStats.csv",
                    "Regional_Stats.csv",
                    "regionalStats.csv",
                    "REGIONAL_STATS.csv",
                ],
                &["*regional*stats*.csv", "*Regional*Stats*.csv"],
                &[],
            ),
            file_type(
                "losses",
                &[
                    "kill_dump.csv",
                    "Killdump.csv",
                    "killdump.csv",
                    "Kill_Dump.csv",
                    "KillDump.csv",
                    "KILL_DUMP.csv",
                    "killDump.csv",
                    "kills.csv",
                    "Kills.csv",
                ],
                &["*kill*dump*.csv", "*Kill*Dump*.csv", "*KILL*DUMP*.csv"],
                &[],
            ),
            file_type(
                "money_supply",
                &[
                    "money_supply.csv",
                    "MoneySupply.csv",
                    "Money_Supply.csv",
                    "moneySupply.csv",
                    "MONEY_SUPPLY.csv",
                ],
                &["*money*supply*.csv", "*Money*Supply*.csv"],
                &[],
            ),
            file_type(
                "mining",
                &[
                    "mining_history_by_security_band.csv",
                    "MiningHistoryBySecurityBand.csv",
                    "Mining_History_By_Security_Band.csv",
                    "miningHistoryBySecurityBand.csv",
                    "MINING_HISTORY_BY_SECURITY_BAND.csv",
                ],
                &["*mining*history*security*.csv", "*Mining*History*Security*.csv"],
                &[],
            ),
        ];

        let mut metrics = vec![
            metric(
                "production_isk",
                "production",
                &["production_isk", "productionisk", "produced", "production"],
                Aggregation::Sum,
            ),
            metric(
                "destruction_isk",
                "production",
                &["destruction_isk", "destructionisk", "destroyed", "destruction"],
                Aggregation::Sum,
            ),
            metric(
                "mining_isk",
                "production",
                &["mining_isk", "miningisk", "mining.value", "mining"],
                Aggregation::Sum,
            ),
            metric(
                "trade_value",
                "trade",
                &["trade_value", "tradevalue", "trade.value", "trade"],
                Aggregation::Sum,
            ),
            metric("total_exports", "trade", &["exports", "export"], Aggregation::Sum),
            metric("total_imports", "trade", &["imports", "import"], Aggregation::Sum),
            metric(
                "total_isk_destroyed",
                "losses",
                &[
                    "isk_destroyed",
                    "iskDestroyed",
                    "iskdestroyed",
                    "destroyed_value",
                    "isk_lost",
                    "iskLost",
                ],
                Aggregation::Sum,
            ),
            metric(
                "isk_velocity",
                "money_supply",
                &["isk_velocity", "iskvelocity", "velocity"],
                Aggregation::Mean,
            ),
            metric(
                "total_isk",
                "money_supply",
                &["total_isk", "totalisk", "total isk"],
                Aggregation::Mean,
            ),
        ];

        let volume_groups = ["asteroid", "gas", "ice", "moon"]
            .iter()
            .map(|kind| vec![format!("{kind}_volume_mined"), format!("{kind}volumemined")])
            .collect();
        metrics.push(MetricSpec {
            id: "total_volume_mined".to_string(),
            file_type: "mining".to_string(),
            candidates: Vec::new(),
            aggregation: Aggregation::Sum,
            components: volume_groups,
        });

        Self { file_types, metrics }
    }

    /// Load a catalog from a JSON file and validate it.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| MerError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        catalog.validate()?;
        debug!(
            "Loaded catalog from {}: {} file types, {} metrics",
            path.display(),
            catalog.file_types.len(),
            catalog.metrics.len()
        );
        Ok(catalog)
    }

    /// Check identifiers are unique, every metric names a known file type and
    /// has something to resolve, and every glob pattern compiles.
    pub fn validate(&self) -> Result<()> {
        let mut type_ids = HashSet::new();
        for ft in &self.file_types {
            if !type_ids.insert(ft.id.as_str()) {
                return Err(MerError::Config(format!("duplicate file type: {}", ft.id)));
            }
            if ft.candidates.is_empty() && ft.patterns.is_empty() {
                return Err(MerError::Config(format!(
                    "file type {} has no candidate names or patterns",
                    ft.id
                )));
            }
            for pattern in &ft.patterns {
                glob::Pattern::new(pattern).map_err(|e| {
                    MerError::Config(format!("file type {}: bad pattern {pattern:?}: {e}", ft.id))
                })?;
            }
        }

        let mut metric_ids = HashSet::new();
        for m in &self.metrics {
            if !metric_ids.insert(m.id.as_str()) {
                return Err(MerError::Config(format!("duplicate metric: {}", m.id)));
            }
            if !type_ids.contains(m.file_type.as_str()) {
                return Err(MerError::Config(format!(
                    "metric {} refers to unknown file type {}",
                    m.id, m.file_type
                )));
            }
            if m.column_groups().iter().all(|g| g.is_empty()) {
                return Err(MerError::Config(format!(
                    "metric {} has no column candidates",
                    m.id
                )));
            }
        }
        Ok(())
    }

    pub fn file_type(&self, id: &str) -> Option<&FileTypeSpec> {
        self.file_types.iter().find(|ft| ft.id == id)
    }

    pub fn metric(&self, id: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.id == id)
    }

    /// Metrics supplied by `file_type`, in catalog order.
    pub fn metrics_for(&self, file_type: &str) -> Vec<&MetricSpec> {
        self.metrics
            .iter()
            .filter(|m| m.file_type == file_type)
            .collect()
    }

    /// All metric identifiers in catalog order.
    pub fn metric_ids(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.id.clone()).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
