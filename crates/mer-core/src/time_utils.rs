use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::debug;

/// Trailing `<Mon><YYYY>` token, e.g. the `Jun2022` of `EVEOnline_MER_Jun2022`.
static MONTH_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[_\-\s.])([A-Za-z]{3})(\d{4})$").expect("month token regex")
});

// ── Month directories ─────────────────────────────────────────────────────────

/// Map a three-letter English month abbreviation to its number.
///
/// Matching ignores case (`"jun"`, `"Jun"` and `"JUN"` are all June).
pub fn month_from_abbreviation(abbr: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = abbr.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|idx| idx as u32 + 1)
}

/// Parse the first-of-month date from an archive directory name.
///
/// The trailing token must be a month abbreviation immediately followed by a
/// four-digit year and preceded by a separator (or nothing).
/// Returns `None` for anything else.
pub fn parse_month_directory(name: &str) -> Option<NaiveDate> {
    let caps = MONTH_TOKEN_RE.captures(name.trim())?;
    let month = month_from_abbreviation(&caps[1])?;
    let year: i32 = caps[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

// ── Cell dates ────────────────────────────────────────────────────────────────

/// Parse a date cell from a source table.
///
/// Handles RFC 3339 timestamps (with `Z` or an offset), ISO dates and
/// date-times with or without fractional seconds, and the slash/dot forms
/// found in some exports. Day-first is tried before month-first for the
/// ambiguous `dd/mm/yyyy` form.
pub fn parse_cell_date(cell: &str) -> Option<NaiveDate> {
    let s = cell.trim().trim_matches('"');
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y.%m.%d %H:%M:%S",
        "%Y.%m.%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.date());
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%d.%m.%Y", "%d/%m/%Y", "%m/%d/%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    debug!("could not parse date cell \"{}\"", s);
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── month_from_abbreviation ───────────────────────────────────────────────

    #[test]
    fn test_month_from_abbreviation() {
        assert_eq!(month_from_abbreviation("Jan"), Some(1));
        assert_eq!(month_from_abbreviation("dec"), Some(12));
        assert_eq!(month_from_abbreviation("SEP"), Some(9));
        assert_eq!(month_from_abbreviation("Sept"), None);
        assert_eq!(month_from_abbreviation("xyz"), None);
    }

    // ── parse_month_directory ─────────────────────────────────────────────────

    #[test]
    fn test_parse_month_directory_standard_name() {
        assert_eq!(
            parse_month_directory("EVEOnline_MER_Jun2022"),
            Some(date(2022, 6, 1))
        );
        assert_eq!(
            parse_month_directory("EVEOnline_MER_Dec2019"),
            Some(date(2019, 12, 1))
        );
    }

    #[test]
    fn test_parse_month_directory_bare_token_and_separators() {
        assert_eq!(parse_month_directory("Mar2021"), Some(date(2021, 3, 1)));
        assert_eq!(parse_month_directory("report-Feb2020"), Some(date(2020, 2, 1)));
        assert_eq!(parse_month_directory("MER oct2023"), Some(date(2023, 10, 1)));
    }

    #[test]
    fn test_parse_month_directory_rejects_invalid() {
        assert_eq!(parse_month_directory("EVEOnline_MER_Foo2022"), None);
        assert_eq!(parse_month_directory("EVEOnline_MER_Jun22"), None);
        assert_eq!(parse_month_directory("EVEOnline_MER_Jun2022_old"), None);
        assert_eq!(parse_month_directory("XJun2022"), None);
        assert_eq!(parse_month_directory(""), None);
    }

    // ── parse_cell_date ───────────────────────────────────────────────────────

    #[test]
    fn test_parse_cell_date_iso_forms() {
        assert_eq!(parse_cell_date("2022-06-15"), Some(date(2022, 6, 15)));
        assert_eq!(parse_cell_date("2022-06-15 13:45:00"), Some(date(2022, 6, 15)));
        assert_eq!(parse_cell_date("2022-06-15T13:45:00.250"), Some(date(2022, 6, 15)));
        assert_eq!(parse_cell_date("2022-06-15T23:00:00Z"), Some(date(2022, 6, 15)));
        assert_eq!(parse_cell_date("2022.06.15 10:00"), Some(date(2022, 6, 15)));
    }

    #[test]
    fn test_parse_cell_date_slash_and_dot_forms() {
        assert_eq!(parse_cell_date("2022/06/15"), Some(date(2022, 6, 15)));
        assert_eq!(parse_cell_date("15.06.2022"), Some(date(2022, 6, 15)));
        assert_eq!(parse_cell_date("15/06/2022"), Some(date(2022, 6, 15)));
        // Not a valid day-first date, so month-first applies.
        assert_eq!(parse_cell_date("06/30/2022"), Some(date(2022, 6, 30)));
    }

    #[test]
    fn test_parse_cell_date_garbage() {
        assert_eq!(parse_cell_date(""), None);
        assert_eq!(parse_cell_date("   "), None);
        assert_eq!(parse_cell_date("not a date"), None);
        assert_eq!(parse_cell_date("2022-13-01"), None);
    }

    #[test]
    fn test_parse_cell_date_quoted() {
        assert_eq!(parse_cell_date("\"2022-06-01\""), Some(date(2022, 6, 1)));
    }
}
