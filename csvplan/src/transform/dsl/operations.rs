//! Catalog operations
//!
//! Each [`Transformation`] consumes a table and hands it back transformed.
//! Every operation checks its column references and parameters against the
//! current table before it changes anything, so a rejected table comes back
//! exactly as it went in.

use std::fmt;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{ValidationError, ValidationResult};
use crate::logs::log_warning;
use crate::table::{DataType, Table, Value};

use super::condition::Condition;
use super::plan::{CaseType, OrderedMap, RecordFilter, Transformation};

/// A table an operation refused to transform, returned untouched with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub table: Table,
    pub error: ValidationError,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for Rejected {}

impl Transformation {
    /// Apply this operation, taking ownership of the table.
    pub fn apply(&self, mut table: Table) -> Result<Table, Rejected> {
        match self.run(&mut table) {
            Ok(()) => Ok(table),
            Err(error) => Err(Rejected { table, error }),
        }
    }

    fn run(&self, table: &mut Table) -> ValidationResult<()> {
        match self {
            Transformation::Split { column, separator } => apply_split(table, column, separator),
            Transformation::SplitPair {
                column,
                separator,
                first,
            } => apply_split_pair(table, column, separator, *first),
            Transformation::Replace {
                column,
                match_value,
                replacement,
                regex,
            } => apply_replace(table, column, match_value, replacement, *regex),
            Transformation::ReplaceText {
                column,
                start_position,
                end_position,
                replacement,
                start,
            } => apply_replace_text(
                table,
                column,
                *start_position,
                *end_position,
                replacement,
                *start,
            ),
            Transformation::Merge {
                columns,
                output_column,
                separator,
            } => apply_merge(
                table,
                columns,
                output_column.as_deref(),
                separator.as_deref().unwrap_or(""),
            ),
            Transformation::Filter { columns } => {
                *table = table.project("filter", columns)?;
                Ok(())
            }
            Transformation::FilterRecords(filter) => apply_filter_records(table, filter),
            Transformation::Rename { mapping } => table.rename_columns("rename", &mapping.0),
            Transformation::MapValue {
                column,
                mapping,
                default_value,
            } => apply_map_value(
                table,
                "map_value",
                column,
                mapping,
                Some(default_value.as_ref().unwrap_or(&Value::Null)),
            ),
            Transformation::MapValues { column, mapping } => {
                apply_map_value(table, "map_values", column, mapping, None)
            }
            Transformation::ConvertCase { mapping } => apply_convert_case(table, mapping),
            Transformation::CopyColumns { mapping } => apply_copy_columns(table, mapping),
            Transformation::Sort { mapping } => apply_sort(table, mapping),
            Transformation::CheckDataType { mapping } => check_data_type(table, mapping),
            Transformation::CheckNotBlank { columns } => check_not_blank(table, columns),
            Transformation::Convert(column) => apply_convert(table, column),
        }
    }
}

// =============================================================================
// Column splitting and text rewriting
// =============================================================================

fn require_separator(operation: &'static str, separator: &str) -> ValidationResult<()> {
    if separator.is_empty() {
        return Err(ValidationError::InvalidParameter {
            operation,
            parameter: "separator".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Write `parts[i]` of every row into `column_{i+1}`.
fn write_parts(
    table: &mut Table,
    operation: &'static str,
    column: &str,
    rows: Vec<Vec<Value>>,
    width: usize,
) -> ValidationResult<()> {
    let mut generated: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); width];
    for mut parts in rows {
        parts.resize(width, Value::Null);
        for (target, part) in generated.iter_mut().zip(parts) {
            target.push(part);
        }
    }
    for (i, values) in generated.into_iter().enumerate() {
        table.set_column(operation, &format!("{column}_{}", i + 1), values)?;
    }
    Ok(())
}

fn apply_split(table: &mut Table, column: &str, separator: &str) -> ValidationResult<()> {
    require_separator("split", separator)?;
    let source = table.require("split", column)?;

    let rows: Vec<Vec<Value>> = source
        .values
        .iter()
        .map(|v| match v.as_text() {
            Some(text) => text.split(separator).map(Value::text).collect(),
            None => Vec::new(),
        })
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    write_parts(table, "split", column, rows, width)
}

fn apply_split_pair(
    table: &mut Table,
    column: &str,
    separator: &str,
    first: bool,
) -> ValidationResult<()> {
    require_separator("split_pair", separator)?;
    let source = table.require("split_pair", column)?;

    let rows: Vec<Vec<Value>> = source
        .values
        .iter()
        .map(|v| {
            let Some(text) = v.as_text() else {
                return Vec::new();
            };
            let pair = if first {
                text.split_once(separator)
            } else {
                text.rsplit_once(separator)
            };
            match pair {
                Some((left, right)) => vec![Value::text(left), Value::text(right)],
                None => vec![Value::text(text)],
            }
        })
        .collect();
    write_parts(table, "split_pair", column, rows, 2)
}

fn apply_replace(
    table: &mut Table,
    column: &str,
    match_value: &str,
    replacement: &str,
    regex: bool,
) -> ValidationResult<()> {
    table.require("replace", column)?;
    let pattern = if regex {
        Some(
            Regex::new(match_value).map_err(|e| ValidationError::InvalidParameter {
                operation: "replace",
                parameter: "match_value".to_string(),
                message: e.to_string(),
            })?,
        )
    } else {
        None
    };

    if let Some(target) = table.column_mut(column) {
        for value in target.values.iter_mut() {
            let Some(text) = value.as_text() else {
                continue;
            };
            *value = Value::Str(match &pattern {
                Some(re) => re.replace_all(&text, replacement).into_owned(),
                None if match_value.is_empty() => text,
                None => text.replace(match_value, replacement),
            });
        }
    }
    Ok(())
}

/// Character span `[start, end)` to overwrite in a value of `len` characters.
fn text_span(len: usize, start_position: usize, end_position: usize, from_start: bool) -> (usize, usize) {
    if from_start {
        (start_position, end_position.saturating_add(1).min(len))
    } else {
        (
            len.saturating_sub(end_position.saturating_add(1)),
            len.saturating_sub(start_position),
        )
    }
}

fn apply_replace_text(
    table: &mut Table,
    column: &str,
    start_position: usize,
    end_position: usize,
    replacement: &str,
    from_start: bool,
) -> ValidationResult<()> {
    let mut chars = replacement.chars();
    let fill = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return Err(ValidationError::InvalidParameter {
                operation: "replace_text",
                parameter: "replacement".to_string(),
                message: format!("must be a single character, got '{replacement}'"),
            })
        }
    };

    let source = table.require("replace_text", column)?;
    let mut rewritten = Vec::with_capacity(source.len());
    for (row, value) in source.values.iter().enumerate() {
        let Some(text) = value.as_text() else {
            rewritten.push(Value::Null);
            continue;
        };
        let chars: Vec<char> = text.chars().collect();
        let (start, end) = text_span(chars.len(), start_position, end_position, from_start);
        if start > end {
            return Err(ValidationError::InvalidSpan {
                column: column.to_string(),
                row,
                start,
                end,
            });
        }
        let mut out: String = chars[..start].iter().collect();
        out.extend(std::iter::repeat(fill).take(end - start));
        out.extend(&chars[end..]);
        rewritten.push(Value::Str(out));
    }
    table.set_column("replace_text", column, rewritten)
}

fn apply_merge(
    table: &mut Table,
    columns: &[String],
    output_column: Option<&str>,
    separator: &str,
) -> ValidationResult<()> {
    let present: Vec<&str> = columns
        .iter()
        .map(|c| c.trim())
        .filter(|c| table.has_column(c))
        .collect();
    if present.is_empty() {
        return Err(ValidationError::NoValidColumns {
            operation: "merge",
            columns: columns.to_vec(),
        });
    }
    let output = match output_column {
        Some(name) => name.trim().to_string(),
        None => present.join("_"),
    };

    let sources: Vec<&[Value]> = present
        .iter()
        .filter_map(|c| table.column(c).map(|col| col.values.as_slice()))
        .collect();
    let merged = (0..table.row_count())
        .map(|row| {
            let parts: Vec<String> = sources.iter().filter_map(|s| s[row].as_text()).collect();
            Value::Str(parts.join(separator))
        })
        .collect();
    table.set_column("merge", &output, merged)
}

// =============================================================================
// Row selection and ordering
// =============================================================================

fn apply_filter_records(table: &mut Table, filter: &RecordFilter) -> ValidationResult<()> {
    let condition = match filter {
        RecordFilter::Expression { condition } => Condition::parse(condition)?,
        RecordFilter::Comparison {
            column,
            operator,
            value,
        } => Condition::comparison(column, operator, value.clone())?,
    };
    let rows = condition.select(table)?;
    *table = std::mem::take(table).take_rows(&rows);
    Ok(())
}

fn apply_sort(table: &mut Table, mapping: &OrderedMap<JsonValue>) -> ValidationResult<()> {
    table.require_all("sort", mapping.keys())?;

    let mut keys: Vec<(&[Value], bool)> = Vec::with_capacity(mapping.len());
    for (column, direction) in mapping.iter() {
        let JsonValue::Bool(ascending) = direction else {
            return Err(ValidationError::InvalidSortOrder {
                column: column.to_string(),
                found: direction.to_string(),
            });
        };
        if let Some(col) = table.column(column) {
            keys.push((col.values.as_slice(), *ascending));
        }
    }

    let mut order: Vec<usize> = (0..table.row_count()).collect();
    // stable: ties keep their current relative order
    order.sort_by(|&a, &b| {
        keys.iter()
            .map(|(values, ascending)| match (&values[a], &values[b]) {
                (Value::Null, Value::Null) => std::cmp::Ordering::Equal,
                (Value::Null, _) => std::cmp::Ordering::Greater,
                (_, Value::Null) => std::cmp::Ordering::Less,
                (x, y) if *ascending => x.sort_cmp(y),
                (x, y) => y.sort_cmp(x),
            })
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    *table = std::mem::take(table).take_rows(&order);
    Ok(())
}

// =============================================================================
// Value mapping and case conversion
// =============================================================================

/// Look every value up by its text form. Unmatched values become `fallback`,
/// or stay as they are when there is none.
fn apply_map_value(
    table: &mut Table,
    operation: &'static str,
    column: &str,
    mapping: &OrderedMap<Value>,
    fallback: Option<&Value>,
) -> ValidationResult<()> {
    let mapped = table
        .require(operation, column)?
        .values
        .iter()
        .map(|v| {
            v.as_text()
                .and_then(|key| mapping.get(&key))
                .or(fallback)
                .unwrap_or(v)
                .clone()
        })
        .collect();
    table.set_column(operation, column, mapped)
}

/// Upper-case the first letter of every run of letters, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn sentence_case(text: &str) -> String {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str().to_lowercase();
    first.to_uppercase().chain(rest.chars()).collect()
}

impl CaseType {
    pub fn convert(self, text: &str) -> String {
        match self {
            CaseType::Uppercase => text.to_uppercase(),
            CaseType::Lowercase => text.to_lowercase(),
            CaseType::Titlecase => title_case(text),
            CaseType::Sentencecase => sentence_case(text),
        }
    }
}

fn apply_convert_case(table: &mut Table, mapping: &OrderedMap<CaseType>) -> ValidationResult<()> {
    table.require_all("convert_case", mapping.keys())?;

    for (name, case) in mapping.iter() {
        let Some(column) = table.column_mut(name) else {
            continue;
        };
        if column.data_type() != DataType::String {
            log_warning(format!(
                "convert_case: skipping column '{name}' of type {}",
                column.data_type()
            ));
            continue;
        }
        for value in column.values.iter_mut() {
            if let Value::Str(text) = value {
                *text = case.convert(text);
            }
        }
    }
    Ok(())
}

fn apply_copy_columns(table: &mut Table, mapping: &OrderedMap<String>) -> ValidationResult<()> {
    table.require_all("copy_columns", mapping.keys())?;
    for (source, target) in mapping.iter() {
        let values = table.require("copy_columns", source)?.values.clone();
        table.set_column("copy_columns", target, values)?;
    }
    Ok(())
}

// =============================================================================
// Checks and coercion
// =============================================================================

fn check_data_type(table: &Table, mapping: &OrderedMap<DataType>) -> ValidationResult<()> {
    table.require_all("check_data_type", mapping.keys())?;
    for (name, expected) in mapping.iter() {
        let found = table.require("check_data_type", name)?.data_type();
        if found != *expected {
            return Err(ValidationError::TypeMismatch {
                operation: "check_data_type",
                column: name.to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }
    Ok(())
}

fn check_not_blank(table: &Table, columns: &[String]) -> ValidationResult<()> {
    table.require_all("check_not_blank", columns.iter().map(String::as_str))?;
    for name in columns {
        let column = table.require("check_not_blank", name)?;
        if let Some(row) = column.values.iter().position(Value::is_blank) {
            return Err(ValidationError::BlankValue {
                column: name.clone(),
                row,
            });
        }
    }
    Ok(())
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(x) if x.is_finite() && x.trunc().abs() < i64::MAX as f64 => Some(x.trunc() as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn apply_convert(table: &mut Table, column: &str) -> ValidationResult<()> {
    let source = table.require("convert", column)?;
    let mut converted = Vec::with_capacity(source.len());
    for (row, value) in source.values.iter().enumerate() {
        let n = to_integer(value).ok_or_else(|| ValidationError::ConversionFailed {
            operation: "convert",
            column: column.to_string(),
            row,
            value: value.describe(),
        })?;
        converted.push(Value::Int(n));
    }
    table.set_column("convert", column, converted)
}

/// Get a description of every catalog operation for the CLI
pub fn operations_description() -> String {
    r#"Available transformations:

| Type | Parameters | Effect |
|------|------------|--------|
| split | column, separator | Split into column_1..column_N on every separator |
| split_pair | column, separator, first (default true) | Split once from the left (first) or right into column_1, column_2 |
| replace | column, match_value, replacement, regex (default false) | Replace every occurrence in the column's text |
| replace_text | column, start_position, end_position, replacement (one char), start (default true) | Mask a character span, counted from the left (start) or right |
| merge | columns, output_column (optional), separator (default "") | Join present values of existing columns into one |
| filter / filter_columns | columns | Keep exactly these columns, in this order |
| filter_records | condition, or column + operator + value | Keep rows matching e.g. "Age > 25 and City == 'Paris'" |
| rename / rename_column | mapping: {old: new} | Rename columns |
| map_value | column, mapping: {from: to}, default_value (optional) | Look values up; unmatched become default_value or missing |
| map_values | column, mapping: {from: to} | Look values up; unmatched values are kept |
| convert_case | mapping: {column: uppercase|lowercase|titlecase|sentencecase} | Rewrite text columns |
| copy_columns | mapping: {source: new} | Duplicate columns |
| sort | mapping: {column: ascending (bool)} | Stable multi-key sort, missing values last |
| check_data_type | mapping: {column: integer|float|boolean|string} | Fail unless the column has that type |
| check_not_blank | columns | Fail on missing or empty values |
| convert | column name | Coerce a column to integers |

Example plan in YAML:
- split:
    column: Name
    separator: " "
- filter_records:
    condition: Age > 25
- sort:
    mapping:
      Age: false"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use serde_json::json;

    fn people() -> Table {
        Table::from_columns(vec![
            Column::new("Name", vec!["John Doe".into(), "Jane Smith".into()]),
            Column::new("Age", vec![Value::Int(25), Value::Int(30)]),
        ])
        .unwrap()
    }

    fn values(table: &Table, column: &str) -> Vec<Value> {
        table.column(column).unwrap().values.clone()
    }

    fn texts(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::text(*s)).collect()
    }

    fn step(record: serde_json::Value) -> Transformation {
        serde_json::from_value(record).unwrap()
    }

    #[test]
    fn test_split_pads_short_rows() {
        let table = Table::from_columns(vec![Column::new(
            "Tags",
            vec!["a,b,c".into(), "d".into(), Value::Null],
        )])
        .unwrap();
        let out = step(json!({"split": {"column": "Tags", "separator": ","}}))
            .apply(table)
            .unwrap();
        assert_eq!(out.column_names(), vec!["Tags", "Tags_1", "Tags_2", "Tags_3"]);
        assert_eq!(values(&out, "Tags_1"), vec!["a".into(), "d".into(), Value::Null]);
        assert_eq!(values(&out, "Tags_3"), vec!["c".into(), Value::Null, Value::Null]);
    }

    #[test]
    fn test_split_rejects_empty_separator() {
        let err = step(json!({"split": {"column": "Name", "separator": ""}}))
            .apply(people())
            .unwrap_err();
        assert_eq!(err.table, people());
        assert!(matches!(err.error, ValidationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_split_pair_directions() {
        let table = Table::from_columns(vec![Column::new("Path", texts(&["a/b/c", "d"]))]).unwrap();

        let left = step(json!({"split_pair": {"column": "Path", "separator": "/"}}))
            .apply(table.clone())
            .unwrap();
        assert_eq!(values(&left, "Path_1"), texts(&["a", "d"]));
        assert_eq!(values(&left, "Path_2"), vec!["b/c".into(), Value::Null]);

        let right = step(json!({"split_pair": {"column": "Path", "separator": "/", "first": false}}))
            .apply(table)
            .unwrap();
        assert_eq!(values(&right, "Path_1"), texts(&["a/b", "d"]));
        assert_eq!(values(&right, "Path_2"), vec!["c".into(), Value::Null]);
    }

    #[test]
    fn test_split_overwrites_generated_columns() {
        let table = Table::from_columns(vec![
            Column::new("Name", texts(&["John Doe", "Jane Smith"])),
            Column::new("Name_1", texts(&["old", "old"])),
        ])
        .unwrap();

        let out = step(json!({"split": {"column": "Name", "separator": " "}}))
            .apply(table.clone())
            .unwrap();
        assert_eq!(out.column_names(), vec!["Name", "Name_1", "Name_2"]);
        assert_eq!(values(&out, "Name_1"), texts(&["John", "Jane"]));

        let out = step(json!({"split_pair": {"column": "Name", "separator": " ", "first": false}}))
            .apply(table)
            .unwrap();
        assert_eq!(out.column_names(), vec!["Name", "Name_1", "Name_2"]);
        assert_eq!(values(&out, "Name_1"), texts(&["John", "Jane"]));
        assert_eq!(values(&out, "Name_2"), texts(&["Doe", "Smith"]));
    }

    #[test]
    fn test_replace_is_literal_by_default() {
        let table = Table::from_columns(vec![Column::new(
            "City",
            vec!["New York".into(), "a.b".into(), Value::Null],
        )])
        .unwrap();
        let out = step(json!({"replace": {"column": "City", "match_value": ".", "replacement": "-"}}))
            .apply(table.clone())
            .unwrap();
        assert_eq!(values(&out, "City"), vec!["New York".into(), "a-b".into(), Value::Null]);

        let out = step(json!({"replace": {"column": "City", "match_value": "[a-z]", "replacement": "", "regex": true}}))
            .apply(table)
            .unwrap();
        assert_eq!(values(&out, "City"), vec!["N Y".into(), ".".into(), Value::Null]);
    }

    #[test]
    fn test_replace_coerces_to_text() {
        let out = step(json!({"replace": {"column": "Age", "match_value": "2", "replacement": "X"}}))
            .apply(people())
            .unwrap();
        assert_eq!(values(&out, "Age"), texts(&["X5", "30"]));
    }

    #[test]
    fn test_replace_invalid_regex_leaves_table() {
        let err = step(json!({"replace": {"column": "Name", "match_value": "(", "replacement": "", "regex": true}}))
            .apply(people())
            .unwrap_err();
        assert_eq!(err.table, people());
    }

    #[test]
    fn test_replace_text_spans() {
        let table = Table::from_columns(vec![Column::new("Card", texts(&["1234567890"]))]).unwrap();

        let masked = step(json!({"replace_text": {"column": "Card", "start_position": 0, "end_position": 5, "replacement": "*"}}))
            .apply(table.clone())
            .unwrap();
        assert_eq!(values(&masked, "Card"), texts(&["******7890"]));

        let masked = step(json!({"replace_text": {"column": "Card", "start_position": 0, "end_position": 3, "replacement": "#", "start": false}}))
            .apply(table.clone())
            .unwrap();
        assert_eq!(values(&masked, "Card"), texts(&["123456####"]));

        let clamped = step(json!({"replace_text": {"column": "Card", "start_position": 8, "end_position": 20, "replacement": "x"}}))
            .apply(table)
            .unwrap();
        assert_eq!(values(&clamped, "Card"), texts(&["12345678xx"]));
    }

    #[test]
    fn test_replace_text_invalid_span_names_row() {
        let table = Table::from_columns(vec![Column::new("Code", texts(&["abcdef", "ab"]))]).unwrap();
        let err = step(json!({"replace_text": {"column": "Code", "start_position": 4, "end_position": 5, "replacement": "*"}}))
            .apply(table.clone())
            .unwrap_err();
        assert_eq!(
            err.error,
            ValidationError::InvalidSpan {
                column: "Code".to_string(),
                row: 1,
                start: 4,
                end: 2,
            }
        );
        assert_eq!(err.table, table);
    }

    #[test]
    fn test_replace_text_requires_single_char() {
        let err = step(json!({"replace_text": {"column": "Name", "start_position": 0, "end_position": 1, "replacement": "**"}}))
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_merge_full_name() {
        let out = step(json!({"merge": {"columns": ["Name"], "output_column": "Full_Name"}}))
            .apply(people())
            .unwrap();
        assert_eq!(values(&out, "Full_Name"), values(&out, "Name"));
    }

    #[test]
    fn test_merge_drops_unknown_and_missing() {
        let table = Table::from_columns(vec![
            Column::new("First", vec!["Ann".into(), Value::Null]),
            Column::new("Last", texts(&["Lee", "Kim"])),
        ])
        .unwrap();
        let out = step(json!({"merge": {"columns": ["First", " Nope ", " Last"], "separator": " "}}))
            .apply(table)
            .unwrap();
        assert_eq!(values(&out, "First_Last"), texts(&["Ann Lee", "Kim"]));
    }

    #[test]
    fn test_merge_requires_one_existing_column() {
        let err = step(json!({"merge": {"columns": ["x", "y"]}}))
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::NoValidColumns { .. }));
    }

    #[test]
    fn test_split_then_merge_round_trip() {
        let plan = [
            step(json!({"split": {"column": "Name", "separator": " "}})),
            step(json!({"merge": {"columns": ["Name_1", "Name_2"], "output_column": "Joined", "separator": " "}})),
        ];
        let mut table = people();
        for s in &plan {
            table = s.apply(table).unwrap();
        }
        assert_eq!(values(&table, "Joined"), values(&table, "Name"));
    }

    #[test]
    fn test_filter_unknown_column_fails() {
        let err = step(json!({"filter": {"columns": ["Name", "Salary"]}}))
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::MissingColumn { .. }));
        assert_eq!(err.table, people());
    }

    #[test]
    fn test_filter_rejects_duplicate_names() {
        let err = step(json!({"filter": {"columns": ["Name", "Age", "Name"]}}))
            .apply(people())
            .unwrap_err();
        assert_eq!(
            err.error,
            ValidationError::DuplicateColumn {
                operation: "filter",
                column: "Name".to_string(),
            }
        );
        assert_eq!(err.table, people());
    }

    #[test]
    fn test_filter_rejects_empty_list() {
        let err = step(json!({"filter": {"columns": []}}))
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::InvalidParameter { operation: "filter", .. }));
        assert_eq!(err.table, people());
    }

    #[test]
    fn test_filter_superset_then_subset() {
        let wide = step(json!({"filter": {"columns": ["Age", "Name"]}}));
        let narrow = step(json!({"filter": {"columns": ["Name"]}}));
        let twice = narrow.apply(wide.apply(people()).unwrap()).unwrap();
        let once = narrow.apply(people()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_filter_records_condition() {
        let out = step(json!({"filter_records": {"condition": "Age > 25"}}))
            .apply(people())
            .unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(values(&out, "Age"), vec![Value::Int(30)]);
        assert_eq!(values(&out, "Name"), texts(&["Jane Smith"]));
    }

    #[test]
    fn test_filter_records_structured() {
        let out = step(json!({"filter_records": {"column": "Name", "operator": "==", "value": "John Doe"}}))
            .apply(people())
            .unwrap();
        assert_eq!(values(&out, "Age"), vec![Value::Int(25)]);
    }

    #[test]
    fn test_filter_records_unknown_column() {
        let err = step(json!({"filter_records": {"condition": "Salary > 1"}}))
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::UnknownConditionColumn { .. }));
    }

    #[test]
    fn test_rename_missing_column() {
        let err = step(json!({"rename": {"mapping": {"Title": "Name2"}}}))
            .apply(people())
            .unwrap_err();
        assert!(err.to_string().contains("Title"));
    }

    #[test]
    fn test_map_value_default_and_missing() {
        let with_default = step(json!({"map_value": {"column": "Name", "mapping": {"John Doe": "JD"}, "default_value": "Unknown"}}))
            .apply(people())
            .unwrap();
        assert_eq!(values(&with_default, "Name"), texts(&["JD", "Unknown"]));
        assert!(!values(&with_default, "Name").iter().any(Value::is_null));

        let without = step(json!({"map_value": {"column": "Age", "mapping": {"25": 1}}}))
            .apply(people())
            .unwrap();
        assert_eq!(values(&without, "Age"), vec![Value::Int(1), Value::Null]);
    }

    #[test]
    fn test_convert_case() {
        let table = Table::from_columns(vec![
            Column::new("A", texts(&["hello wORLD", "o'neil-smith"])),
            Column::new("B", texts(&["hello wORLD", "o'neil"])),
            Column::new("N", vec![Value::Int(1), Value::Int(2)]),
        ])
        .unwrap();
        let out = step(json!({"convert_case": {"mapping": {"A": "titlecase", "B": "sentencecase", "N": "uppercase"}}}))
            .apply(table)
            .unwrap();
        assert_eq!(values(&out, "A"), texts(&["Hello World", "O'Neil-Smith"]));
        assert_eq!(values(&out, "B"), texts(&["Hello world", "O'neil"]));
        assert_eq!(values(&out, "N"), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_convert_case_missing_column() {
        let err = step(json!({"convert_case": {"mapping": {"Nope": "uppercase"}}}))
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::MissingColumn { .. }));
    }

    #[test]
    fn test_copy_columns_overwrites() {
        let out = step(json!({"copy_columns": {"mapping": {"Name": "Age"}}}))
            .apply(people())
            .unwrap();
        assert_eq!(out.column_names(), vec!["Name", "Age"]);
        assert_eq!(values(&out, "Age"), values(&out, "Name"));
    }

    #[test]
    fn test_sort_descending_input() {
        let table = Table::from_columns(vec![
            Column::new("Name", texts(&["John Doe", "Jane Smith"])),
            Column::new("Age", vec![Value::Int(30), Value::Int(25)]),
        ])
        .unwrap();
        let out = step(json!({"sort": {"mapping": {"Age": true}}}))
            .apply(table)
            .unwrap();
        assert_eq!(values(&out, "Name"), texts(&["Jane Smith", "John Doe"]));
    }

    #[test]
    fn test_sort_multi_key_and_nulls_last() {
        let table = Table::from_columns(vec![
            Column::new("Team", texts(&["b", "a", "b", "a"])),
            Column::new("Score", vec![Value::Int(1), Value::Null, Value::Int(3), Value::Float(2.5)]),
        ])
        .unwrap();
        let sort = step(json!({"sort": {"mapping": {"Team": true, "Score": false}}}));
        let once = sort.apply(table).unwrap();
        assert_eq!(
            values(&once, "Score"),
            vec![Value::Float(2.5), Value::Null, Value::Int(3), Value::Int(1)]
        );
        let twice = sort.apply(once.clone()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_sort_rejects_non_boolean() {
        let err = step(json!({"sort": {"mapping": {"Age": "asc"}}}))
            .apply(people())
            .unwrap_err();
        assert_eq!(
            err.error,
            ValidationError::InvalidSortOrder {
                column: "Age".to_string(),
                found: "\"asc\"".to_string(),
            }
        );
    }

    #[test]
    fn test_check_data_type() {
        step(json!({"check_data_type": {"mapping": {"Age": "int64", "Name": "object"}}}))
            .apply(people())
            .unwrap();

        let err = step(json!({"check_data_type": {"mapping": {"Age": "float"}}}))
            .apply(people())
            .unwrap_err();
        assert!(err.to_string().contains("expected type float, found integer"));
    }

    #[test]
    fn test_check_not_blank_iff_blank() {
        let check = step(json!({"check_not_blank": {"columns": ["Name"]}}));
        assert!(check.apply(people()).is_ok());

        for blank in [Value::Null, Value::text("")] {
            let table = Table::from_columns(vec![Column::new("Name", vec!["x".into(), blank])]).unwrap();
            let err = check.apply(table).unwrap_err();
            assert_eq!(
                err.error,
                ValidationError::BlankValue {
                    column: "Name".to_string(),
                    row: 1
                }
            );
        }
    }

    #[test]
    fn test_map_values_keeps_unmatched() {
        let table = Table::from_columns(vec![Column::new(
            "City",
            vec!["NYC".into(), "Paris".into(), Value::Null],
        )])
        .unwrap();
        let out = step(json!({"map_values": {"column": "City", "mapping": {"NYC": "New York"}}}))
            .apply(table)
            .unwrap();
        assert_eq!(
            values(&out, "City"),
            vec!["New York".into(), "Paris".into(), Value::Null]
        );

        let err = step(json!({"map_values": {"column": "Town", "mapping": {}}}))
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::MissingColumn { operation: "map_values", .. }));
    }

    #[test]
    fn test_convert_missing_value_names_row() {
        let table = Table::from_columns(vec![Column::new(
            "N",
            vec![Value::Int(1), Value::Int(2), Value::Null],
        )])
        .unwrap();
        let err = Transformation::Convert("N".to_string())
            .apply(table.clone())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::ConversionFailed { row: 2, .. }));
        assert!(err.error.to_string().contains("at row 2"));
        assert_eq!(err.table, table);
    }

    #[test]
    fn test_convert() {
        let table = Table::from_columns(vec![Column::new(
            "N",
            vec![Value::text(" 42 "), Value::Float(-2.9), Value::Bool(true), Value::Int(7)],
        )])
        .unwrap();
        let out = Transformation::Convert("N".to_string()).apply(table).unwrap();
        assert_eq!(
            values(&out, "N"),
            vec![Value::Int(42), Value::Int(-2), Value::Int(1), Value::Int(7)]
        );

        let err = Transformation::Convert("Name".to_string())
            .apply(people())
            .unwrap_err();
        assert!(matches!(err.error, ValidationError::ConversionFailed { row: 0, .. }));
    }
}
