//! Error types for the csvplan transformation engine.
//!
//! This module defines one error type per concern:
//!
//! - [`CsvError`] - reading, decoding and writing tabular data
//! - [`ValidationError`] - a catalog operation rejected its input
//! - [`PlanError`] - a configuration document could not be resolved
//! - [`PipelineError`] - top-level wrapper used by stages and single-file runs
//! - [`ConfigError`] - an environment setting has an unusable value
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while loading or storing a table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Source could not be read.
    #[error("Cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination could not be written.
    #[error("Cannot write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bytes could not be decoded with the requested encoding.
    #[error("Failed to decode input as {encoding}: {message}")]
    Encoding { encoding: String, message: String },

    /// Malformed CSV content.
    #[error("Invalid CSV{}: {message}", line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Parse { line: Option<u64>, message: String },

    /// No header row.
    #[error("CSV input is empty")]
    EmptyFile,

    /// Header names must be unique.
    #[error("Duplicate column '{0}' in CSV header")]
    DuplicateHeader(String),
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        CsvError::Parse {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A transformation refused to run against the current table.
///
/// Raised before any mutation, so the table handed to the failing operation
/// is never left half-transformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A referenced column is not in the table.
    #[error("{operation}: column '{column}' not found")]
    MissingColumn {
        operation: &'static str,
        column: String,
    },

    /// Several referenced columns are not in the table.
    #[error("{operation}: columns not found: {}", columns.join(", "))]
    MissingColumns {
        operation: &'static str,
        columns: Vec<String>,
    },

    /// None of the listed columns exist.
    #[error("{operation}: none of the columns [{}] exist", columns.join(", "))]
    NoValidColumns {
        operation: &'static str,
        columns: Vec<String>,
    },

    /// The operation would produce two columns with the same name.
    #[error("{operation}: duplicate column '{column}'")]
    DuplicateColumn {
        operation: &'static str,
        column: String,
    },

    /// A parameter is malformed.
    #[error("{operation}: invalid parameter '{parameter}': {message}")]
    InvalidParameter {
        operation: &'static str,
        parameter: String,
        message: String,
    },

    /// Text span start lies past its end after clamping.
    #[error("replace_text: empty span [{start}, {end}) in column '{column}' at row {row}")]
    InvalidSpan {
        column: String,
        row: usize,
        start: usize,
        end: usize,
    },

    /// A sort direction is not a boolean.
    #[error("sort: direction for column '{column}' must be a boolean, found {found}")]
    InvalidSortOrder { column: String, found: String },

    /// Column element type differs from the expected one.
    #[error("{operation}: column '{column}' expected type {expected}, found {found}")]
    TypeMismatch {
        operation: &'static str,
        column: String,
        expected: String,
        found: String,
    },

    /// Null or empty value in a column that must not be blank.
    #[error("check_not_blank: blank value in column '{column}' at row {row}")]
    BlankValue { column: String, row: usize },

    /// A value could not be coerced.
    #[error("{operation}: cannot convert value {value} in column '{column}' at row {row}")]
    ConversionFailed {
        operation: &'static str,
        column: String,
        row: usize,
        value: String,
    },

    /// The filter condition does not parse.
    #[error("filter_records: invalid condition '{condition}': {message}")]
    InvalidCondition { condition: String, message: String },

    /// The filter condition references an unknown column.
    #[error("filter_records: condition '{condition}' references unknown column '{column}'")]
    UnknownConditionColumn { condition: String, column: String },

    /// The filter condition compares incompatible values.
    #[error("filter_records: condition '{condition}' expected {expected}, found {found} at row {row}")]
    ConditionType {
        condition: String,
        row: usize,
        expected: String,
        found: String,
    },
}

// =============================================================================
// Plan Errors
// =============================================================================

/// Errors resolving a transformation or pipeline document.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Document could not be read.
    #[error("Cannot read plan '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON syntax error.
    #[error("Plan JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML syntax error.
    #[error("Plan YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The top-level document is not a list.
    #[error("A {kind} plan must be a sequence of records")]
    NotASequence { kind: &'static str },

    /// A record is not a single-key mapping.
    #[error("{kind} record #{index} must be a mapping with exactly one key, found {found}")]
    MalformedRecord {
        kind: &'static str,
        index: usize,
        found: String,
    },

    /// A record names a type outside the catalog.
    #[error("{kind} record #{index}: unknown type '{name}'")]
    UnknownType {
        kind: &'static str,
        index: usize,
        name: String,
    },

    /// A record's parameters do not match its type.
    #[error("{kind} record #{index} ('{name}'): {message}")]
    InvalidParameters {
        kind: &'static str,
        index: usize,
        name: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// This is the per-stage error kept in a
/// [`crate::transform::pipeline::PipelineReport`] and the error returned by
/// [`crate::transform::pipeline::process_file`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Table I/O error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Plan resolution error.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Operation rejected the table.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// An environment setting could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {key}='{value}': {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub message: String,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for catalog operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for plan loading.
pub type PlanResult<T> = Result<T, PlanError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for settings.
pub type ConfigResult<T> = Result<T, ConfigError>;
