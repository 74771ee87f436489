//! DSL Executor
//!
//! Runs a [`TransformationPlan`] against a table, step by step, in plan order.

use tracing::debug;

use crate::error::{ValidationError, ValidationResult};
use crate::table::Table;

use super::plan::TransformationPlan;

/// The step that stopped a plan
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    /// Position of the step in the plan
    pub index: usize,
    /// Type name of the failing step
    pub operation: &'static str,
    pub error: ValidationError,
}

/// Result of executing a plan
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    /// The table after every step that succeeded
    pub table: Table,
    /// Number of steps applied
    pub applied: usize,
    /// First failing step, if any; later steps were not run
    pub failure: Option<StepFailure>,
}

impl TransformOutcome {
    /// Check if every step was applied
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        match &self.failure {
            None => format!(
                "Applied {} steps: {} rows, {} columns",
                self.applied,
                self.table.row_count(),
                self.table.column_count()
            ),
            Some(failure) => format!(
                "Applied {} steps, step #{} ({}) failed: {}",
                self.applied, failure.index, failure.operation, failure.error
            ),
        }
    }

    /// The final table, or the failing step's error
    pub fn into_result(self) -> ValidationResult<Table> {
        match self.failure {
            None => Ok(self.table),
            Some(failure) => Err(failure.error),
        }
    }
}

/// Execute a plan, keeping the partially transformed table on failure.
///
/// Steps run in order; the first failure stops the plan. The returned table
/// reflects every step applied before it, with no rollback.
pub fn execute(mut table: Table, plan: &TransformationPlan) -> TransformOutcome {
    for (index, step) in plan.steps().iter().enumerate() {
        debug!(
            step = index,
            operation = step.name(),
            rows = table.row_count(),
            columns = table.column_count(),
            "Applying transformation"
        );
        match step.apply(table) {
            Ok(next) => table = next,
            Err(rejected) => {
                debug!(step = index, operation = step.name(), error = %rejected.error, "Transformation rejected");
                return TransformOutcome {
                    table: rejected.table,
                    applied: index,
                    failure: Some(StepFailure {
                        index,
                        operation: step.name(),
                        error: rejected.error,
                    }),
                };
            }
        }
    }

    TransformOutcome {
        table,
        applied: plan.len(),
        failure: None,
    }
}

/// Apply every transformation of the plan, in order.
pub fn apply_transformations(table: Table, plan: &TransformationPlan) -> ValidationResult<Table> {
    execute(table, plan).into_result()
}
