//! # csvplan - declarative column transformations for CSV tables
//!
//! csvplan loads a CSV file into a typed in-memory table, applies an ordered
//! plan of column operations (split, merge, rename, filter, sort, checks...)
//! and writes the result back out. A pipeline chains file-level stages that
//! join, split or process CSV files.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Executor   │────▶│   CSV File  │
//! │  (any enc)  │     │  (auto-enc) │     │  (plan DSL) │     │   (UTF-8)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csvplan::{process_file, ReadOptions, TransformationPlan};
//! use std::path::Path;
//!
//! let plan = TransformationPlan::from_path(Path::new("plan.yaml"), Default::default())?;
//! let summary = process_file(
//!     Path::new("input.csv"),
//!     &plan,
//!     Path::new("output.csv"),
//!     &ReadOptions::default(),
//! )?;
//! println!("Wrote {} rows", summary.rows[0]);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment settings
//! - [`logs`] - Logging setup and helpers
//! - [`table`] - Table, column and value model
//! - [`parser`] - CSV load/store with auto-detection
//! - [`transform`] - Plan DSL, executor and pipeline runner

// Core modules
pub mod error;
pub mod table;

// Ambient
pub mod config;
pub mod logs;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

pub use transform::{dsl, pipeline};

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, PipelineError, PlanError, ValidationError,
};

// =============================================================================
// Re-exports - Table model
// =============================================================================

pub use table::{Column, DataType, Table, Value};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes,
    parse_file,
    read_table,
    write_table,
    ParseResult,
    ReadOptions,
};

// =============================================================================
// Re-exports - DSL
// =============================================================================

pub use transform::dsl::{
    apply_transformations,
    example_plan,
    execute,
    operations_description,
    PlanOptions,
    Transformation,
    TransformationPlan,
    TransformOutcome,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    inner_join,
    process_file,
    run_pipeline,
    PipelineOptions,
    PipelinePlan,
    PipelineReport,
    Stage,
    StageReport,
    StageSummary,
};

// =============================================================================
// Re-exports - Settings
// =============================================================================

pub use config::Settings;
