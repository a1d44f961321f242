//! Mapping logical metric names onto the column labels a file actually uses.

use mer_core::diagnostics::{ColumnMatch, ColumnMatchKind};

fn normalise(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Find the column for the first satisfiable candidate.
///
/// Every candidate is first tried for a case-insensitive exact match. Only
/// when none matches exactly is the substring fallback tried: a candidate
/// contained in a label, or a label contained in a candidate. In both passes
/// candidate order decides and column order breaks ties.
///
/// The substring pass is lossy: `"trade"` will happily match
/// `"trade_volume_units"`. Blank labels and blank candidates never match.
pub fn resolve_column(columns: &[String], candidates: &[String]) -> Option<ColumnMatch> {
    let labels: Vec<String> = columns.iter().map(|c| normalise(c)).collect();
    let wanted: Vec<String> = candidates
        .iter()
        .map(|c| normalise(c))
        .collect();

    for (candidate, key) in candidates.iter().zip(&wanted) {
        if key.is_empty() {
            continue;
        }
        if let Some(index) = labels.iter().position(|l| l == key) {
            return Some(matched(columns, index, candidate, ColumnMatchKind::Exact));
        }
    }

    for (candidate, key) in candidates.iter().zip(&wanted) {
        if key.is_empty() {
            continue;
        }
        let hit = labels
            .iter()
            .position(|l| !l.is_empty() && (l.contains(key.as_str()) || key.contains(l.as_str())));
        if let Some(index) = hit {
            return Some(matched(columns, index, candidate, ColumnMatchKind::Substring));
        }
    }

    None
}

fn matched(columns: &[String], index: usize, candidate: &str, kind: ColumnMatchKind) -> ColumnMatch {
    ColumnMatch {
        label: columns[index].clone(),
        index,
        candidate: candidate.to_string(),
        kind,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
