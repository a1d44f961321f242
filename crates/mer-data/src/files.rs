//! Locating the physical file behind a logical file type.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use mer_core::diagnostics::{FileMatch, FileResolution};
use mer_core::models::FileTypeSpec;
use tracing::{debug, warn};

/// Regular files directly inside `dir`, sorted by name.
///
/// Sorting fixes what "first match" means, so that resolution is
/// deterministic across platforms and runs.
pub fn list_files(dir: &Path) -> Vec<(String, PathBuf)> {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            (name, entry.into_path())
        })
        .collect()
}

/// Resolve `spec` inside `dir`.
///
/// Steps, stopping at the first hit:
/// 1. each candidate name, exactly (case-sensitive);
/// 2. each candidate name against the directory listing, ignoring case;
/// 3. each glob pattern, case-sensitive then case-insensitive.
///
/// When several entries match the same step the first in name order wins.
/// On failure the `.csv` entries present are reported.
pub fn resolve_file(dir: &Path, spec: &FileTypeSpec) -> FileResolution {
    let entries = list_files(dir);

    // Compared against the listing rather than checked with `is_file`, so the
    // case-sensitive step behaves the same on case-insensitive filesystems.
    for name in &spec.candidates {
        if let Some((_, path)) = entries.iter().find(|(n, _)| n == name) {
            return found(spec, path.clone(), FileMatch::ExactName);
        }
    }

    for name in &spec.candidates {
        let wanted = name.to_lowercase();
        if let Some((_, path)) = entries.iter().find(|(n, _)| n.to_lowercase() == wanted) {
            return found(spec, path.clone(), FileMatch::CaseInsensitiveName);
        }
    }

    for raw in &spec.patterns {
        let pattern = match Pattern::new(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!("Ignoring invalid pattern {:?} for {}: {}", raw, spec.id, e);
                continue;
            }
        };
        for case_sensitive in [true, false] {
            let options = MatchOptions {
                case_sensitive,
                require_literal_separator: true,
                require_literal_leading_dot: true,
            };
            if let Some((_, path)) = entries
                .iter()
                .find(|(n, _)| pattern.matches_with(n, options))
            {
                let matched_by = FileMatch::Pattern {
                    pattern: raw.clone(),
                    case_insensitive: !case_sensitive,
                };
                return found(spec, path.clone(), matched_by);
            }
        }
    }

    let csv_entries: Vec<String> = entries
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| name.to_lowercase().ends_with(".csv"))
        .collect();
    debug!(
        "No {} file in {} (csv files present: {:?})",
        spec.id,
        dir.display(),
        csv_entries
    );
    FileResolution::NotFound { csv_entries }
}

fn found(spec: &FileTypeSpec, path: PathBuf, matched_by: FileMatch) -> FileResolution {
    debug!("Resolved {} to {} via {:?}", spec.id, path.display(), matched_by);
    FileResolution::Found { path, matched_by }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
