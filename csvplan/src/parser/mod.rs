//! CSV load and store with encoding and delimiter auto-detection.
//!
//! Loading turns bytes into a [`Table`], inferring one element type per
//! column. Storing writes a comma-delimited file with a header row.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::table::{Column, Table, Value};

/// How to read a CSV source. `None` fields are auto-detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub encoding: Option<String>,
    pub delimiter: Option<u8>,
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: u8,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => {
            String::from_utf8(bytes.to_vec()).map_err(|e| CsvError::Encoding {
                encoding: encoding.to_string(),
                message: e.to_string(),
            })
        }
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned())
        }
        other => {
            let codec = encoding_rs::Encoding::for_label(other.as_bytes()).ok_or_else(|| {
                CsvError::Encoding {
                    encoding: encoding.to_string(),
                    message: "unsupported encoding".to_string(),
                }
            })?;
            let (decoded, _, had_errors) = codec.decode(bytes);
            if had_errors {
                return Err(CsvError::Encoding {
                    encoding: encoding.to_string(),
                    message: "input contains malformed sequences".to_string(),
                });
            }
            Ok(decoded.into_owned())
        }
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [b',', b';', b'\t', b'|'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded CSV text with an explicit delimiter.
pub fn parse_table(content: &str, delimiter: u8) -> CsvResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(CsvError::EmptyFile);
    }
    for (i, name) in headers.iter().enumerate() {
        if headers[..i].contains(name) {
            return Err(CsvError::DuplicateHeader(name.clone()));
        }
    }

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            return Err(CsvError::Parse {
                line: record.position().map(|p| p.line()),
                message: format!(
                    "found {} fields, expected at most {}",
                    record.len(),
                    headers.len()
                ),
            });
        }
        for (i, cells) in raw.iter_mut().enumerate() {
            cells.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, cells)| Column::new(name, infer_column(cells)))
        .collect();

    Table::from_columns(columns).map_err(|e| CsvError::Parse {
        line: None,
        message: e.to_string(),
    })
}

/// Turn raw cells into typed values, one element type per column.
fn infer_column(cells: Vec<String>) -> Vec<Value> {
    let present = || cells.iter().filter(|c| !c.is_empty());

    if present().all(|c| c.trim().parse::<i64>().is_ok()) {
        return cells
            .iter()
            .map(|c| c.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null))
            .collect();
    }
    if present().all(|c| parse_float(c).is_some()) {
        return cells
            .iter()
            .map(|c| parse_float(c).map(Value::Float).unwrap_or(Value::Null))
            .collect();
    }
    if present().all(|c| parse_bool(c).is_some()) {
        return cells
            .iter()
            .map(|c| parse_bool(c).map(Value::Bool).unwrap_or(Value::Null))
            .collect();
    }
    cells
        .into_iter()
        .map(|c| if c.is_empty() { Value::Null } else { Value::Str(c) })
        .collect()
}

// Rejects "inf"/"nan" spellings so words stay text.
fn parse_float(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if !cell.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    cell.parse().ok()
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse CSV bytes, detecting whatever `options` leaves open.
pub fn parse_bytes(bytes: &[u8], options: &ReadOptions) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let encoding = options
        .encoding
        .clone()
        .unwrap_or_else(|| detect_encoding(bytes));
    let content = decode_content(bytes, &encoding)?;
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));
    let table = parse_table(&content, delimiter)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file.
pub fn parse_file(path: impl AsRef<Path>, options: &ReadOptions) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CsvError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes(&bytes, options)
}

/// Load a table from a CSV file.
pub fn read_table(path: impl AsRef<Path>, options: &ReadOptions) -> CsvResult<Table> {
    parse_file(path, options).map(|r| r.table)
}

/// Serialize a table as comma-delimited CSV.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.column_names())?;
    for i in 0..table.row_count() {
        out.write_record(table.row(i).iter().map(|v| v.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

/// Store a table as a CSV file, replacing any existing file.
pub fn write_table(table: &Table, path: impl AsRef<Path>) -> CsvResult<()> {
    let path = path.as_ref();
    let write_err = |source: std::io::Error| CsvError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(write_err)?;
    write_csv(table, file).map_err(|e| match e.into_kind() {
        csv::ErrorKind::Io(source) => write_err(source),
        other => CsvError::Parse {
            line: None,
            message: format!("{other:?}"),
        },
    })
}

/// Render a table as CSV text.
pub fn to_csv_string(table: &Table) -> CsvResult<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| CsvError::Encoding {
        encoding: "utf-8".to_string(),
        message: e.to_string(),
    })
}
