//! Statement construction from structured inputs.
//!
//! Everything here is pure string/parameter assembly: a built [`Statement`]
//! is an immutable SQL string plus its bound values, produced fresh per call
//! and handed to the executor. No statement is ever cached.

use crate::error::PgAccessError;
use crate::types::SqlValue;

mod dml;
mod select;

pub use dml::{
    BatchStatement, delete_statement, insert_returning_statement, insert_statement,
    update_statement, update_statement_literal_where,
};
pub use select::Select;

/// An immutable SQL string with its ordered bound parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    /// The SQL text.
    pub sql: String,
    /// Values bound to `$1..$n`, in order.
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Wrap raw SQL with no bound parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Ordered column-name to value pairs for INSERT and UPDATE.
///
/// Insertion order is the binding order: the first column pushed binds `$1`.
#[derive(Debug, Clone, Default)]
pub struct ColumnValues {
    entries: Vec<(String, SqlValue)>,
}

impl ColumnValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column/value pair.
    #[must_use]
    pub fn push(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.entries.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up a value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Column names joined with `", "`, in insertion order.
    #[must_use]
    pub fn joined_columns(&self) -> String {
        self.entries
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The values alone, in insertion order.
    #[must_use]
    pub fn values(&self) -> Vec<SqlValue> {
        self.entries.iter().map(|(_, value)| value.clone()).collect()
    }
}

impl<C, V> FromIterator<(C, V)> for ColumnValues
where
    C: Into<String>,
    V: Into<SqlValue>,
{
    fn from_iter<T: IntoIterator<Item = (C, V)>>(iter: T) -> Self {
        let mut values = ColumnValues::new();
        for (column, value) in iter {
            values = values.push(column, value);
        }
        values
    }
}

/// Conflict handling for INSERT. The two conflict behaviors are mutually
/// exclusive by construction.
#[derive(Debug, Clone, Default)]
pub enum ConflictMode {
    /// No ON CONFLICT clause.
    #[default]
    None,
    /// `ON CONFLICT (cols) DO NOTHING`
    DoNothing { unique_columns: Vec<String> },
    /// `ON CONFLICT (cols) <clause>`, e.g. `DO UPDATE SET hits = t.hits + 1`
    DoUpdate {
        unique_columns: Vec<String>,
        clause: String,
    },
}

/// `" $1, $2, ..."` for `count` values, numbered from `offset + 1`.
pub(crate) fn placeholder_list(count: usize, offset: usize) -> String {
    (1..=count)
        .map(|i| format!("${}", offset + i))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn require_values(values: &ColumnValues, operation: &str) -> Result<(), PgAccessError> {
    if values.is_empty() {
        return Err(PgAccessError::ValidationError(format!(
            "{operation} requires at least one column/value pair"
        )));
    }
    Ok(())
}
