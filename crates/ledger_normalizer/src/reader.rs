use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};

use crate::error::{PipelineError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Encodings tried in order; the first clean decode wins.
///
/// Shift_JIS in `encoding_rs` is the WHATWG variant, which covers the
/// Windows-31J (cp932) extensions used by the ledger exports.
pub fn candidate_encodings() -> [&'static Encoding; 2] {
    [UTF_8, SHIFT_JIS]
}

/// One data row with its 1-based line number in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub cells: Vec<String>,
}

impl RawRow {
    /// Cell at `idx`, empty when the row is shorter than the header.
    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// Header plus data rows of one decoded source file.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub path: PathBuf,
    pub encoding: &'static Encoding,
    pub header: Vec<String>,
    /// Line of the header record; 0 when the file is empty.
    pub header_line: u64,
    pub rows: Vec<RawRow>,
}

impl SourceTable {
    /// The header record as a data row, for layouts without a header.
    pub fn header_row(&self) -> Option<RawRow> {
        if self.header.is_empty() {
            return None;
        }
        Some(RawRow {
            line: self.header_line,
            cells: self.header.clone(),
        })
    }
}

/// Reads and decodes a ledger export.
///
/// `delimiter` of `None` detects tab vs comma from the first non-blank line.
pub fn read_source(path: &Path, delimiter: Option<u8>) -> Result<SourceTable> {
    let bytes = fs::read(path).map_err(|e| PipelineError::unreadable(path, e))?;

    let (text, encoding) = decode_bytes(&bytes).ok_or_else(|| {
        let tried: Vec<&str> = candidate_encodings().iter().map(|e| e.name()).collect();
        PipelineError::unreadable(path, format!("not valid {}", tried.join(" or ")))
    })?;

    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&text));
    let (header, header_line, rows) =
        split_rows(&text, delimiter).map_err(|e| PipelineError::unreadable(path, e))?;

    tracing::debug!(
        path = %path.display(),
        encoding = encoding.name(),
        delimiter = %(delimiter as char).escape_default(),
        rows = rows.len(),
        "source decoded"
    );

    Ok(SourceTable {
        path: path.to_path_buf(),
        encoding,
        header,
        header_line,
        rows,
    })
}

/// Decodes with the first candidate encoding that yields no malformed
/// sequences. A UTF-8 byte-order mark is stripped first.
pub fn decode_bytes(bytes: &[u8]) -> Option<(String, &'static Encoding)> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    candidate_encodings().into_iter().find_map(|encoding| {
        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .map(|text| (text.into_owned(), encoding))
    })
}

fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if first_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

type SplitRows = (Vec<String>, u64, Vec<RawRow>);

fn split_rows(text: &str, delimiter: u8) -> std::result::Result<SplitRows, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut header: Option<(Vec<String>, u64)> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cells: Vec<String> = record.iter().map(str::to_string).collect();

        if header.is_none() {
            // Leading blank lines never become the header
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            header = Some((cells, line));
            continue;
        }
        rows.push(RawRow { line, cells });
    }

    let (header, header_line) = header.unwrap_or_default();
    Ok((header, header_line, rows))
}
