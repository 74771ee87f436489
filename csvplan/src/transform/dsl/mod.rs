//! DSL (Domain Specific Language) for column transformations
//!
//! This module provides:
//! - `plan`: Transformation plan definition (what a plan file contains)
//! - `condition`: Row conditions used by `filter_records`
//! - `operations`: The catalog of table operations
//! - `executor`: Execute plans on tables
//!
//! ## Usage Flow
//!
//! ```text
//! CSV → parser::read_table → TransformationPlan::from_path → executor::apply_transformations → parser::write_table
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use csvplan::dsl::{apply_transformations, TransformationPlan};
//! use csvplan::parser::{read_table, write_table, ReadOptions};
//!
//! // 1. Load the table
//! let table = read_table(Path::new("people.csv"), &ReadOptions::default())?;
//!
//! // 2. Load the plan
//! let plan = TransformationPlan::from_path(Path::new("plan.yaml"), Default::default())?;
//!
//! // 3. Run it
//! let table = apply_transformations(table, &plan)?;
//!
//! // 4. Store the result
//! write_table(&table, Path::new("out.csv"))?;
//! ```

pub mod condition;
pub mod executor;
pub mod operations;
pub mod plan;

// Re-exports for convenience
pub use condition::{CmpOp, Condition};
pub use executor::{apply_transformations, execute, StepFailure, TransformOutcome};
pub use operations::{operations_description, Rejected};
pub use plan::{
    example_plan, CaseType, OrderedMap, PlanFormat, PlanOptions, RecordFilter, Transformation,
    TransformationPlan, TRANSFORMATION_TYPES,
};
