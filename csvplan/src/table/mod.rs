//! In-memory table model.
//!
//! A [`Table`] is an ordered list of uniquely named [`Column`]s that all share
//! one row count. Row order is significant and only changes when an operation
//! reorders or selects rows explicitly.

pub mod value;

pub use value::{DataType, Value};

use crate::error::{ValidationError, ValidationResult};

/// A named sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Element type inferred from the present values.
    pub fn data_type(&self) -> DataType {
        DataType::infer(&self.values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered, uniquely named columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Create an empty table with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from columns, checking names and lengths.
    pub fn from_columns(columns: Vec<Column>) -> ValidationResult<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut table = Table {
            columns: Vec::with_capacity(columns.len()),
            rows,
        };
        for column in columns {
            if table.has_column(&column.name) {
                return Err(ValidationError::DuplicateColumn {
                    operation: "table",
                    column: column.name,
                });
            }
            table.check_len("table", &column.name, column.len())?;
            table.columns.push(column);
        }
        Ok(table)
    }

    /// Build a table from a header and row-major records.
    ///
    /// Short rows are padded with missing values.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Value>>) -> ValidationResult<Self> {
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();
        for mut row in rows {
            row.resize(columns.len(), Value::Null);
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }
        Self::from_columns(columns)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Look up a column or fail naming the operation.
    pub fn require(&self, operation: &'static str, name: &str) -> ValidationResult<&Column> {
        self.column(name).ok_or_else(|| ValidationError::MissingColumn {
            operation,
            column: name.to_string(),
        })
    }

    /// Fail if any of `names` is absent, listing every missing one.
    pub fn require_all<'a>(
        &self,
        operation: &'static str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> ValidationResult<()> {
        let missing: Vec<String> = names
            .into_iter()
            .filter(|n| !self.has_column(n))
            .map(str::to_string)
            .collect();
        match missing.len() {
            0 => Ok(()),
            1 => Err(ValidationError::MissingColumn {
                operation,
                column: missing.into_iter().next().unwrap_or_default(),
            }),
            _ => Err(ValidationError::MissingColumns {
                operation,
                columns: missing,
            }),
        }
    }

    /// Replace the values of an existing column or append a new one.
    pub fn set_column(
        &mut self,
        operation: &'static str,
        name: &str,
        values: Vec<Value>,
    ) -> ValidationResult<()> {
        if self.columns.is_empty() {
            self.rows = values.len();
        }
        self.check_len(operation, name, values.len())?;
        match self.column_mut(name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column::new(name, values)),
        }
        Ok(())
    }

    /// Rename columns; the resulting names must be unique.
    pub fn rename_columns(
        &mut self,
        operation: &'static str,
        renames: &[(String, String)],
    ) -> ValidationResult<()> {
        self.require_all(operation, renames.iter().map(|(old, _)| old.as_str()))?;
        let new_names: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                renames
                    .iter()
                    .find(|(old, _)| *old == c.name)
                    .map(|(_, new)| new.clone())
                    .unwrap_or_else(|| c.name.clone())
            })
            .collect();
        for (i, name) in new_names.iter().enumerate() {
            if new_names[..i].contains(name) {
                return Err(ValidationError::DuplicateColumn {
                    operation,
                    column: name.clone(),
                });
            }
        }
        for (column, name) in self.columns.iter_mut().zip(new_names) {
            column.name = name;
        }
        Ok(())
    }

    /// New table holding exactly `names`, in the given order.
    ///
    /// At least one column is required; a table without columns cannot be
    /// stored as CSV.
    pub fn project(&self, operation: &'static str, names: &[String]) -> ValidationResult<Table> {
        if names.is_empty() {
            return Err(ValidationError::InvalidParameter {
                operation,
                parameter: "columns".to_string(),
                message: "must list at least one column".to_string(),
            });
        }
        self.require_all(operation, names.iter().map(String::as_str))?;
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ValidationError::DuplicateColumn {
                    operation,
                    column: name.clone(),
                });
            }
        }
        let columns = names
            .iter()
            .filter_map(|n| self.column(n).cloned())
            .collect();
        Ok(Table {
            columns,
            rows: self.rows,
        })
    }

    /// Reorder or select rows by index.
    pub fn take_rows(self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .into_iter()
            .map(|c| {
                let values = indices.iter().map(|&i| c.values[i].clone()).collect();
                Column::new(c.name, values)
            })
            .collect();
        Table {
            columns,
            rows: indices.len(),
        }
    }

    /// Values of one row, in column order.
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    fn check_len(&self, operation: &'static str, name: &str, len: usize) -> ValidationResult<()> {
        if len != self.rows {
            return Err(ValidationError::InvalidParameter {
                operation,
                parameter: name.to_string(),
                message: format!("column has {len} values but the table has {} rows", self.rows),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::from_columns(vec![
            Column::new("Name", vec!["John Doe".into(), "Jane Smith".into()]),
            Column::new("Age", vec![Value::Int(30), Value::Int(25)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_rejects_duplicates() {
        let err = Table::from_columns(vec![
            Column::new("a", vec![Value::Int(1)]),
            Column::new("a", vec![Value::Int(2)]),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let table = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Int(1)], vec![Value::Int(2), Value::Int(3)]],
        )
        .unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("b").unwrap().values, vec![Value::Null, Value::Int(3)]);
    }

    #[test]
    fn test_rename_allows_swap() {
        let mut table = people();
        table
            .rename_columns(
                "rename",
                &[("Name".into(), "Age".into()), ("Age".into(), "Name".into())],
            )
            .unwrap();
        assert_eq!(table.column_names(), vec!["Age", "Name"]);
    }

    #[test]
    fn test_rename_rejects_collision() {
        let mut table = people();
        let err = table
            .rename_columns("rename", &[("Name".into(), "Age".into())])
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateColumn { .. }));
        assert_eq!(table.column_names(), vec!["Name", "Age"]);
    }

    #[test]
    fn test_project_keeps_given_order() {
        let table = people();
        let projected = table.project("filter", &["Age".into(), "Name".into()]).unwrap();
        assert_eq!(projected.column_names(), vec!["Age", "Name"]);
        assert_eq!(projected.row_count(), 2);
    }

    #[test]
    fn test_project_requires_a_column() {
        let err = people().project("split", &[]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidParameter { operation: "split", .. }));
    }

    #[test]
    fn test_require_all_lists_missing() {
        let table = people();
        let err = table.require_all("filter", ["x", "Name", "y"]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumns {
                operation: "filter",
                columns: vec!["x".into(), "y".into()],
            }
        );
    }

    #[test]
    fn test_take_rows() {
        let table = people().take_rows(&[1]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column("Name").unwrap().values, vec![Value::text("Jane Smith")]);
    }
}
