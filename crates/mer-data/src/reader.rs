//! Delimited-file loading.
//!
//! Reads one report file into a [`RawTable`] that keeps the header labels
//! exactly as found, tolerating semicolon exports, non-UTF-8 encodings and
//! ragged rows.

use std::path::{Path, PathBuf};

use mer_core::data_processors::NumericCoercer;
use mer_core::error::{MerError, Result};
use tracing::{debug, warn};

// ── RawTable ──────────────────────────────────────────────────────────────────

/// Text encoding a table was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

/// One parsed file: verbatim column labels and well-formed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub delimiter: u8,
    pub encoding: TextEncoding,
    /// Rows discarded for having the wrong number of fields.
    pub skipped_rows: usize,
}

impl RawTable {
    /// A table with no header row.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells of column `index`, optionally restricted to `row_indices`.
    pub fn cells<'a>(&'a self, index: usize, row_indices: Option<&'a [usize]>) -> Vec<&'a str> {
        match row_indices {
            Some(selected) => selected
                .iter()
                .filter_map(|&r| self.rows.get(r))
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
            None => self
                .rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        }
    }

    /// Numeric view of column `index`; non-numeric cells are `None`.
    pub fn numeric_column(&self, index: usize, row_indices: Option<&[usize]>) -> Vec<Option<f64>> {
        NumericCoercer::coerce_all(self.cells(index, row_indices), self.delimiter == b';')
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Pick the delimiter from the header line: `;` when present, `,` otherwise.
pub fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.contains(';') {
        b';'
    } else {
        b','
    }
}

/// Decode raw bytes as UTF-8 (dropping a BOM), falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), TextEncoding::Utf8),
        Err(_) => (
            bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Latin1,
        ),
    }
}

/// Read and parse a delimited file.
///
/// An unreadable file or an unparseable header is an error. A zero-byte file
/// is an empty table, not an error. Rows whose field count differs from the
/// header are skipped and counted.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path).map_err(|source| MerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let (text, encoding) = decode_text(&bytes);
    if encoding == TextEncoding::Latin1 {
        debug!("{} is not valid UTF-8, decoded as Latin-1", path.display());
    }
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| MerError::TableParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    // A header of one empty field is what an empty file looks like.
    if columns.iter().all(|c| c.is_empty()) {
        return Ok(RawTable {
            path: path.to_path_buf(),
            columns: Vec::new(),
            rows: Vec::new(),
            delimiter,
            encoding,
            skipped_rows: 0,
        });
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut skipped_rows = 0usize;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping unparseable row in {}: {}", path.display(), e);
                skipped_rows += 1;
                continue;
            }
        };
        if record.len() != columns.len() {
            // A lone empty field is a blank line, not a malformed row.
            if !(record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty())) {
                skipped_rows += 1;
            }
            continue;
        }
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    if skipped_rows > 0 {
        warn!(
            "{}: skipped {} malformed row(s)",
            path.display(),
            skipped_rows
        );
    }

    debug!(
        "Read {}: {} columns, {} rows, delimiter {:?}",
        path.display(),
        columns.len(),
        rows.len(),
        char::from(delimiter)
    );

    Ok(RawTable {
        path: path.to_path_buf(),
        columns,
        rows,
        delimiter,
        encoding,
        skipped_rows,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
