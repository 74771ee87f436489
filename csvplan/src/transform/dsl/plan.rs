//! Transformation plan definition
//!
//! A plan is an ordered list of single-key records, `{type: parameters}`.
//! Records are resolved into [`Transformation`] values when the plan is
//! loaded, so an unknown type or a malformed parameter set is reported
//! before any operation touches a table.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{PlanError, PlanResult};
use crate::logs::log_warning;
use crate::table::{DataType, Value};

/// Every type name a transformation record may use, aliases included.
pub const TRANSFORMATION_TYPES: &[&str] = &[
    "split",
    "split_pair",
    "replace",
    "replace_text",
    "merge",
    "filter",
    "filter_columns",
    "filter_records",
    "rename",
    "rename_column",
    "map_value",
    "map_values",
    "convert_case",
    "copy_columns",
    "sort",
    "check_data_type",
    "check_not_blank",
    "convert",
];

/// One catalog operation with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Transformation {
    /// Split a column into `column_1..column_N` on every separator.
    Split {
        column: String,
        #[serde(alias = "delimiter", deserialize_with = "text")]
        separator: String,
    },

    /// Split a column into `column_1`, `column_2` on the first or last separator.
    SplitPair {
        column: String,
        #[serde(alias = "delimiter", deserialize_with = "text")]
        separator: String,
        #[serde(default = "default_true")]
        first: bool,
    },

    /// Replace occurrences of `match_value` in the column's text.
    Replace {
        column: String,
        #[serde(deserialize_with = "text")]
        match_value: String,
        #[serde(deserialize_with = "text")]
        replacement: String,
        /// Treat `match_value` as a regular expression
        #[serde(default)]
        regex: bool,
    },

    /// Overwrite a fixed character span with a repeated character.
    ReplaceText {
        column: String,
        start_position: usize,
        end_position: usize,
        #[serde(deserialize_with = "text")]
        replacement: String,
        #[serde(default = "default_true")]
        start: bool,
    },

    /// Concatenate columns into one.
    Merge {
        columns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_column: Option<String>,
        #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
    },

    /// Keep exactly the listed columns, in order.
    #[serde(alias = "filter_columns")]
    Filter { columns: Vec<String> },

    /// Keep the rows matching a condition.
    FilterRecords(RecordFilter),

    /// Rename columns (old -> new).
    #[serde(alias = "rename_column")]
    Rename { mapping: OrderedMap<String> },

    /// Replace values through a lookup table.
    MapValue {
        column: String,
        mapping: OrderedMap<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<Value>,
    },

    /// Replace values through a lookup table, keeping unmatched values.
    MapValues {
        column: String,
        mapping: OrderedMap<Value>,
    },

    /// Rewrite text columns to a letter case.
    ConvertCase { mapping: OrderedMap<CaseType> },

    /// Duplicate columns under new names (source -> new).
    CopyColumns { mapping: OrderedMap<String> },

    /// Stable multi-key sort (column -> ascending).
    ///
    /// Directions stay raw so a non-boolean is reported against the column.
    Sort { mapping: OrderedMap<JsonValue> },

    /// Assert column element types.
    CheckDataType { mapping: OrderedMap<DataType> },

    /// Assert no null or empty values.
    CheckNotBlank { columns: Vec<String> },

    /// Coerce a column to integers.
    Convert(String),
}

fn default_true() -> bool {
    true
}

/// Row selection for `filter_records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum RecordFilter {
    /// Boolean expression over column names, e.g. `Age > 25 and City == 'Paris'`.
    Expression { condition: String },
    /// A single comparison, e.g. `{column: Age, operator: ">", value: 25}`.
    Comparison {
        column: String,
        operator: String,
        value: Value,
    },
}

/// Target letter case for `convert_case`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseType {
    Uppercase,
    Lowercase,
    Titlecase,
    Sentencecase,
}

impl Transformation {
    /// Canonical type name.
    pub fn name(&self) -> &'static str {
        match self {
            Transformation::Split { .. } => "split",
            Transformation::SplitPair { .. } => "split_pair",
            Transformation::Replace { .. } => "replace",
            Transformation::ReplaceText { .. } => "replace_text",
            Transformation::Merge { .. } => "merge",
            Transformation::Filter { .. } => "filter",
            Transformation::FilterRecords(_) => "filter_records",
            Transformation::Rename { .. } => "rename",
            Transformation::MapValue { .. } => "map_value",
            Transformation::MapValues { .. } => "map_values",
            Transformation::ConvertCase { .. } => "convert_case",
            Transformation::CopyColumns { .. } => "copy_columns",
            Transformation::Sort { .. } => "sort",
            Transformation::CheckDataType { .. } => "check_data_type",
            Transformation::CheckNotBlank { .. } => "check_not_blank",
            Transformation::Convert(_) => "convert",
        }
    }
}

// =============================================================================
// Ordered mappings
// =============================================================================

/// A string-keyed mapping that keeps declaration order.
///
/// Sort keys, renames and copies are applied in the order they are written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(mut self, key: impl Into<String>, value: V) -> Self {
        self.0.push((key.into(), value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if entries.iter().any(|(k, _): &(String, V)| *k == key) {
                        return Err(serde::de::Error::custom(format!("duplicate key '{key}'")));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Accept any scalar where text is expected (`separator: 1` in YAML).
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected text, found {other}"
        ))),
    }
}

fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => Ok(None),
        other => text(other).map(Some).map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Plan documents
// =============================================================================

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Yaml,
}

impl PlanFormat {
    /// `.json` files are JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => PlanFormat::Json,
            _ => PlanFormat::Yaml,
        }
    }
}

/// How strictly records are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Skip records with an unknown type (with a warning) instead of failing.
    pub skip_unknown: bool,
}

/// Parse a configuration document into a generic value.
pub fn parse_document(content: &str, format: PlanFormat) -> PlanResult<JsonValue> {
    Ok(match format {
        PlanFormat::Json => serde_json::from_str(content)?,
        PlanFormat::Yaml => serde_yaml::from_str(content)?,
    })
}

/// Read and parse a configuration document.
pub fn load_document(path: &Path) -> PlanResult<JsonValue> {
    let content = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&content, PlanFormat::from_path(path))
}

/// Resolve a sequence of `{type: parameters}` records.
pub(crate) fn resolve_records<T: DeserializeOwned>(
    document: JsonValue,
    kind: &'static str,
    known: &[&str],
    options: PlanOptions,
) -> PlanResult<Vec<T>> {
    let records = match document {
        JsonValue::Array(records) => records,
        JsonValue::Null => Vec::new(),
        _ => return Err(PlanError::NotASequence { kind }),
    };

    let mut resolved = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let name = match &record {
            JsonValue::Object(map) if map.len() == 1 => map.keys().next().cloned().unwrap_or_default(),
            other => {
                return Err(PlanError::MalformedRecord {
                    kind,
                    index,
                    found: other.to_string(),
                })
            }
        };

        if !known.contains(&name.as_str()) {
            if options.skip_unknown {
                log_warning(format!("Skipping {kind} record #{index}: unknown type '{name}'"));
                continue;
            }
            return Err(PlanError::UnknownType { kind, index, name });
        }

        let item = serde_json::from_value(record).map_err(|e| PlanError::InvalidParameters {
            kind,
            index,
            name: name.clone(),
            message: e.to_string(),
        })?;
        resolved.push(item);
    }
    Ok(resolved)
}

/// An ordered, immutable list of transformations.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct TransformationPlan {
    steps: Vec<Transformation>,
}

impl TransformationPlan {
    pub fn new(steps: Vec<Transformation>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Transformation] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolve a parsed document.
    pub fn from_value(document: JsonValue, options: PlanOptions) -> PlanResult<Self> {
        resolve_records(document, "transformation", TRANSFORMATION_TYPES, options).map(Self::new)
    }

    /// Parse a plan from JSON text.
    pub fn from_json(json: &str) -> PlanResult<Self> {
        Self::from_value(parse_document(json, PlanFormat::Json)?, PlanOptions::default())
    }

    /// Parse a plan from YAML text.
    pub fn from_yaml(yaml: &str) -> PlanResult<Self> {
        Self::from_value(parse_document(yaml, PlanFormat::Yaml)?, PlanOptions::default())
    }

    /// Load a plan file (`.json` or YAML).
    pub fn from_path(path: &Path, options: PlanOptions) -> PlanResult<Self> {
        Self::from_value(load_document(path)?, options)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> PlanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to YAML string
    ///
    /// Goes through a JSON value so variants come out as plain
    /// `type: parameters` mappings rather than YAML tags.
    pub fn to_yaml(&self) -> PlanResult<String> {
        let document = serde_json::to_value(self)?;
        Ok(serde_yaml::to_string(&document)?)
    }
}

/// Generate an example plan for documentation
pub fn example_plan() -> TransformationPlan {
    TransformationPlan::new(vec![
        Transformation::Split {
            column: "Name".to_string(),
            separator: " ".to_string(),
        },
        Transformation::Replace {
            column: "Location".to_string(),
            match_value: "New".to_string(),
            replacement: "Old".to_string(),
            regex: false,
        },
        Transformation::Merge {
            columns: vec!["Name_1".to_string(), "Name_2".to_string()],
            output_column: Some("Full_Name".to_string()),
            separator: Some("_".to_string()),
        },
        Transformation::Filter {
            columns: vec!["Full_Name".to_string(), "Age".to_string()],
        },
        Transformation::FilterRecords(RecordFilter::Expression {
            condition: "Age > 25".to_string(),
        }),
        Transformation::Rename {
            mapping: OrderedMap::new()
                .insert("Full_Name", "Name".to_string())
                .insert("Age", "Years".to_string()),
        },
        Transformation::MapValue {
            column: "Name".to_string(),
            mapping: OrderedMap::new().insert("John_Doe", Value::text("JD")),
            default_value: Some(Value::text("Unknown")),
        },
        Transformation::ConvertCase {
            mapping: OrderedMap::new().insert("Name", CaseType::Uppercase),
        },
        Transformation::CopyColumns {
            mapping: OrderedMap::new()
                .insert("Name", "Full_Name".to_string())
                .insert("Years", "Age".to_string()),
        },
        Transformation::Sort {
            mapping: OrderedMap::new()
                .insert("Full_Name", JsonValue::Bool(true))
                .insert("Age", JsonValue::Bool(false)),
        },
    ])
}
