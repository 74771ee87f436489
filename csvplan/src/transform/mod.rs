//! Transformation module.
//!
//! - DSL: Transformation plans, the operation catalog and the executor
//! - Pipeline: File-level merge, split and process stages

pub mod dsl;
pub mod pipeline;

pub use dsl::*;
pub use pipeline::*;
