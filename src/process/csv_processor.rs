use csv::ReaderBuilder;
use std::{collections::HashSet, fs::File, io::Read, path::Path};
use tracing::{debug, warn};

use super::raw_table::Table;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("file is empty, expected a header row")]
    Empty,

    #[error("duplicate column `{0}` in header")]
    DuplicateColumn(String),

    #[error("line {line} has {found} fields but the header has {expected}")]
    TooManyFields {
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("reading staged file: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a staged CSV file from disk.
pub fn parse_csv_file(path: &Path) -> Result<Table, ParseError> {
    let file = File::open(path)?;
    parse_csv(file)
}

/// Parse delimited text with a header row.
///
/// - header names are kept verbatim (only a leading UTF-8 BOM is dropped)
/// - a repeated header name is an error
/// - rows shorter than the header are padded with `None`; longer rows are an error
/// - empty cells become `None`
pub fn parse_csv<R: Read>(reader: R) -> Result<Table, ParseError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(ParseError::Empty);
    }
    if let Some(first) = headers.first_mut() {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    {
        let mut seen = HashSet::with_capacity(headers.len());
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(ParseError::DuplicateColumn(name.clone()));
            }
        }
    }

    let width = headers.len();
    let mut rows = Vec::new();
    let mut short_rows = 0usize;

    for result in rdr.records() {
        let record = result?;
        if record.len() > width {
            return Err(ParseError::TooManyFields {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                found: record.len(),
                expected: width,
            });
        }
        if record.len() < width {
            short_rows += 1;
        }

        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
            .collect();
        row.resize(width, None);
        rows.push(row);
    }

    if short_rows > 0 {
        warn!(short_rows, "padded short rows with nulls");
    }
    debug!(columns = width, rows = rows.len(), "parsed csv");

    Ok(Table { headers, rows })
}
