use std::collections::HashMap;
use std::sync::Arc;

use crate::types::SqlValue;

use super::row::{Row, build_index_cache};

/// An ordered, fully materialized set of rows from a read operation.
///
/// Column names are stored once and shared by every row. There is no
/// streaming or cursor support; reads return the whole result set.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub rows: Vec<Row>,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a result set preallocated for `capacity` rows.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            rows: Vec::with_capacity(capacity),
            column_names: None,
            column_index_cache: None,
        }
    }

    /// Set the column names shared by all rows, building the name-to-index
    /// cache once.
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(build_index_cache(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append a row built from `values`; a no-op if column names were never
    /// set (a statement with no result columns).
    pub fn push_values(&mut self, values: Vec<SqlValue>) {
        let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        else {
            return;
        };
        self.rows.push(Row {
            column_names: column_names.clone(),
            values,
            column_index_cache: cache.clone(),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
