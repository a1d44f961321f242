// ── NumericCoercer ────────────────────────────────────────────────────────────

/// Turns raw table cells into numbers, treating anything unusable as missing.
pub struct NumericCoercer;

impl NumericCoercer {
    /// Coerce one cell.
    ///
    /// * Surrounding whitespace and quotes are ignored.
    /// * Empty, non-numeric, NaN and infinite cells are `None`.
    /// * With `decimal_comma`, a cell such as `"1,5"` (comma, no dot) is read
    ///   as `1.5`. Semicolon-delimited exports use this convention.
    pub fn coerce(cell: &str, decimal_comma: bool) -> Option<f64> {
        let s = cell.trim().trim_matches('"').trim();
        if s.is_empty() {
            return None;
        }

        let parsed = match s.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) if decimal_comma && s.contains(',') && !s.contains('.') => {
                s.replacen(',', ".", 1).parse::<f64>().ok()
            }
            Err(_) => None,
        };

        parsed.filter(|v| v.is_finite())
    }

    /// Coerce every cell of a column.
    pub fn coerce_all<'a>(
        cells: impl IntoIterator<Item = &'a str>,
        decimal_comma: bool,
    ) -> Vec<Option<f64>> {
        cells
            .into_iter()
            .map(|c| Self::coerce(c, decimal_comma))
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
