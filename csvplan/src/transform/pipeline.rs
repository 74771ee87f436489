//! Pipeline runner: file-level `merge`, `split` and `process` stages.
//!
//! A pipeline plan is a sequence of `{stage: parameters}` records. Stages run
//! strictly in order and only share data through the files they read and
//! write. A failing stage is reported and the runner moves on to the next one.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvplan::pipeline::{run_pipeline, PipelineOptions, PipelinePlan};
//! use std::path::Path;
//!
//! let plan = PipelinePlan::from_path(Path::new("pipeline.yaml"), Default::default())?;
//! let report = run_pipeline(&plan, &PipelineOptions::default());
//! println!("{}", report.summary());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::dsl::plan::{load_document, resolve_records};
use super::dsl::{apply_transformations, OrderedMap, PlanOptions, TransformationPlan};
use crate::error::{PipelineResult, PlanResult, ValidationResult};
use crate::logs::{log_error, log_info, log_success};
use crate::parser::{read_table, write_table, ReadOptions};
use crate::table::{Column, Table, Value};

/// Every stage type name a pipeline record may use.
pub const STAGE_TYPES: &[&str] = &["merge", "split", "process"];

/// One pipeline stage with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Stage {
    /// Inner-join two files on a key column.
    Merge {
        input_file1: PathBuf,
        input_file2: PathBuf,
        output_file: PathBuf,
        key_column: String,
    },

    /// Write column subsets of one file to several files (output -> columns).
    Split {
        input_file: PathBuf,
        output_definitions: OrderedMap<Vec<String>>,
    },

    /// Run a transformation plan file over one file.
    Process {
        input_file: PathBuf,
        transformation_file: PathBuf,
        output_file: PathBuf,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Merge { .. } => "merge",
            Stage::Split { .. } => "split",
            Stage::Process { .. } => "process",
        }
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct PipelinePlan {
    stages: Vec<Stage>,
}

impl PipelinePlan {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Resolve a parsed document.
    pub fn from_value(document: JsonValue, options: PlanOptions) -> PlanResult<Self> {
        resolve_records(document, "pipeline", STAGE_TYPES, options).map(Self::new)
    }

    pub fn from_json(json: &str) -> PlanResult<Self> {
        Self::from_value(serde_json::from_str(json)?, PlanOptions::default())
    }

    pub fn from_yaml(yaml: &str) -> PlanResult<Self> {
        Self::from_value(serde_yaml::from_str(yaml)?, PlanOptions::default())
    }

    /// Load a pipeline file (`.json` or YAML).
    pub fn from_path(path: &Path, options: PlanOptions) -> PlanResult<Self> {
        Self::from_value(load_document(path)?, options)
    }
}

/// How the runner reads inputs and plans.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Options for every CSV input
    pub read: ReadOptions,
    /// Strictness for nested transformation plans
    pub plan: PlanOptions,
    /// Directory relative file names are resolved against (default: working directory)
    pub base_dir: Option<PathBuf>,
}

impl PipelineOptions {
    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// What a successful stage produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    /// Files written, in write order
    pub outputs: Vec<PathBuf>,
    /// Rows written per file
    pub rows: Vec<usize>,
}

/// Outcome of one stage.
#[derive(Debug)]
pub struct StageReport {
    pub index: usize,
    pub kind: &'static str,
    pub duration_ms: u64,
    pub outcome: PipelineResult<StageSummary>,
}

impl StageReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl Serialize for StageReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StageReport", 5)?;
        state.serialize_field("index", &self.index)?;
        state.serialize_field("kind", self.kind)?;
        state.serialize_field("duration_ms", &self.duration_ms)?;
        match &self.outcome {
            Ok(summary) => {
                state.serialize_field("status", "ok")?;
                state.serialize_field("summary", summary)?;
            }
            Err(e) => {
                state.serialize_field("status", "failed")?;
                state.serialize_field("error", &e.to_string())?;
            }
        }
        state.end()
    }
}

/// Result of a whole pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> usize {
        self.stages.iter().filter(|s| s.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.stages.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Pipeline {}: {} stages, {} succeeded, {} failed in {} ms",
            self.run_id,
            self.stages.len(),
            self.succeeded(),
            self.failed(),
            (self.finished_at - self.started_at).num_milliseconds()
        )
    }
}

/// Run every stage in order, isolating failures per stage.
pub fn run_pipeline(plan: &PipelinePlan, options: &PipelineOptions) -> PipelineReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    log_info(format!("Pipeline {run_id}: {} stages", plan.len()));

    let mut stages = Vec::with_capacity(plan.len());
    for (index, stage) in plan.stages().iter().enumerate() {
        log_info(format!("Stage #{index} ({})", stage.name()));
        let start = Instant::now();
        let outcome = run_stage(stage, options);
        match &outcome {
            Ok(summary) => {
                for (path, rows) in summary.outputs.iter().zip(&summary.rows) {
                    log_success(format!("Wrote {rows} rows to '{}'", path.display()));
                }
            }
            Err(e) => log_error(format!("Stage #{index} ({}) failed: {e}", stage.name())),
        }
        stages.push(StageReport {
            index,
            kind: stage.name(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome,
        });
    }

    let report = PipelineReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        stages,
    };
    log_info(report.summary());
    report
}

/// Run a single stage.
pub fn run_stage(stage: &Stage, options: &PipelineOptions) -> PipelineResult<StageSummary> {
    match stage {
        Stage::Merge {
            input_file1,
            input_file2,
            output_file,
            key_column,
        } => merge_files(
            &options.resolve(input_file1),
            &options.resolve(input_file2),
            &options.resolve(output_file),
            key_column,
            &options.read,
        ),
        Stage::Split {
            input_file,
            output_definitions,
        } => {
            let outputs: Vec<(PathBuf, Vec<String>)> = output_definitions
                .iter()
                .map(|(path, columns)| (options.resolve(Path::new(path)), columns.clone()))
                .collect();
            split_file(&options.resolve(input_file), &outputs, &options.read)
        }
        Stage::Process {
            input_file,
            transformation_file,
            output_file,
        } => {
            let plan = TransformationPlan::from_path(&options.resolve(transformation_file), options.plan)?;
            process_file(
                &options.resolve(input_file),
                &plan,
                &options.resolve(output_file),
                &options.read,
            )
        }
    }
}

/// Inner-join two CSV files on `key_column` and store the result.
pub fn merge_files(
    left: &Path,
    right: &Path,
    output: &Path,
    key_column: &str,
    read: &ReadOptions,
) -> PipelineResult<StageSummary> {
    let left = read_table(left, read)?;
    let right = read_table(right, read)?;
    let joined = inner_join(&left, &right, key_column)?;
    write_table(&joined, output)?;
    Ok(StageSummary {
        outputs: vec![output.to_path_buf()],
        rows: vec![joined.row_count()],
    })
}

/// Project one CSV file into several, one per `(output, columns)` entry.
///
/// Every projection is checked before the first file is written.
pub fn split_file(
    input: &Path,
    outputs: &[(PathBuf, Vec<String>)],
    read: &ReadOptions,
) -> PipelineResult<StageSummary> {
    let table = read_table(input, read)?;
    let projections = outputs
        .iter()
        .map(|(path, columns)| table.project("split", columns).map(|p| (path, p)))
        .collect::<ValidationResult<Vec<_>>>()?;

    let mut summary = StageSummary {
        outputs: Vec::with_capacity(projections.len()),
        rows: Vec::with_capacity(projections.len()),
    };
    for (path, projection) in projections {
        write_table(&projection, path)?;
        summary.outputs.push(path.clone());
        summary.rows.push(projection.row_count());
    }
    Ok(summary)
}

/// Load one CSV file, apply a plan and store the result.
pub fn process_file(
    input: &Path,
    plan: &TransformationPlan,
    output: &Path,
    read: &ReadOptions,
) -> PipelineResult<StageSummary> {
    let table = read_table(input, read)?;
    let table = apply_transformations(table, plan)?;
    write_table(&table, output)?;
    Ok(StageSummary {
        outputs: vec![output.to_path_buf()],
        rows: vec![table.row_count()],
    })
}

/// Inner equi-join on `key`.
///
/// Output columns are the left columns followed by the right columns other
/// than the key; a non-key name present on both sides gets `_x` (left) and
/// `_y` (right). Rows follow left order, then right order among matches.
/// Keys match on their text form, except that an integral float matches the
/// equal integer (`1.0` joins `1`). Missing keys never match.
pub fn inner_join(left: &Table, right: &Table, key: &str) -> ValidationResult<Table> {
    let left_key = left.require("merge", key)?;
    let right_key = right.require("merge", key)?;

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (row, value) in right_key.values.iter().enumerate() {
        if let Some(text) = join_key(value) {
            index.entry(text).or_default().push(row);
        }
    }

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (row, value) in left_key.values.iter().enumerate() {
        let Some(matches) = join_key(value).and_then(|text| index.get(&text)) else {
            continue;
        };
        pairs.extend(matches.iter().map(|&r| (row, r)));
    }

    let left_rows: Vec<usize> = pairs.iter().map(|p| p.0).collect();
    let right_rows: Vec<usize> = pairs.iter().map(|p| p.1).collect();
    let pick = |values: &[Value], rows: &[usize]| -> Vec<Value> {
        rows.iter().map(|&r| values[r].clone()).collect()
    };
    let clashes = |name: &str| name != key && left.has_column(name) && right.has_column(name);

    let mut columns = Vec::with_capacity(left.column_count() + right.column_count());
    for column in left.columns() {
        let name = if clashes(&column.name) {
            format!("{}_x", column.name)
        } else {
            column.name.clone()
        };
        columns.push(Column::new(name, pick(&column.values, &left_rows)));
    }
    for column in right.columns().iter().filter(|c| c.name != key) {
        let name = if clashes(&column.name) {
            format!("{}_y", column.name)
        } else {
            column.name.clone()
        };
        columns.push(Column::new(name, pick(&column.values, &right_rows)));
    }

    Table::from_columns(columns)
}

fn join_key(value: &Value) -> Option<String> {
    match value {
        Value::Float(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => {
            Some((*x as i64).to_string())
        }
        other => other.as_text(),
    }
}
