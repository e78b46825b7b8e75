use crate::condition::Conditions;
use crate::error::PgAccessError;

use super::{ColumnValues, ConflictMode, Statement, placeholder_list, require_values};

/// Build an INSERT statement with positional placeholders bound in map order.
///
/// ```rust
/// use pg_access::{ColumnValues, ConflictMode, insert_statement};
///
/// let values = ColumnValues::new().push("a", 1_i64).push("b", 2_i64);
/// let stmt = insert_statement(
///     "t",
///     &values,
///     &ConflictMode::DoNothing { unique_columns: vec!["a".into()] },
/// )
/// .unwrap();
/// assert_eq!(stmt.sql, "INSERT INTO t (a, b) VALUES ($1, $2) ON CONFLICT (a) DO NOTHING;");
/// ```
///
/// # Errors
/// Returns `ValidationError` for an empty value map or a conflict mode with
/// no unique columns.
pub fn insert_statement(
    table: &str,
    values: &ColumnValues,
    conflict: &ConflictMode,
) -> Result<Statement, PgAccessError> {
    require_values(values, "insert")?;

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        values.joined_columns(),
        placeholder_list(values.len(), 0)
    );
    sql.push_str(&conflict_clause(conflict)?);
    sql.push(';');

    Ok(Statement {
        sql,
        params: values.values(),
    })
}

/// Same as [`insert_statement`] but appends `RETURNING <expr>`; the executor
/// returns the produced scalar instead of a row count.
///
/// # Errors
/// Returns `ValidationError` for an empty value map.
pub fn insert_returning_statement(
    table: &str,
    values: &ColumnValues,
    returning: &str,
) -> Result<Statement, PgAccessError> {
    require_values(values, "insert")?;

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {};",
        table,
        values.joined_columns(),
        placeholder_list(values.len(), 0),
        returning
    );

    Ok(Statement {
        sql,
        params: values.values(),
    })
}

fn conflict_clause(conflict: &ConflictMode) -> Result<String, PgAccessError> {
    let unique_list = |columns: &[String]| -> Result<String, PgAccessError> {
        if columns.is_empty() {
            return Err(PgAccessError::ValidationError(
                "conflict handling requires at least one unique column".to_string(),
            ));
        }
        Ok(columns.join(", "))
    };

    match conflict {
        ConflictMode::None => Ok(String::new()),
        ConflictMode::DoNothing { unique_columns } => Ok(format!(
            " ON CONFLICT ({}) DO NOTHING",
            unique_list(unique_columns)?
        )),
        ConflictMode::DoUpdate {
            unique_columns,
            clause,
        } => Ok(format!(
            " ON CONFLICT ({}) {}",
            unique_list(unique_columns)?,
            clause
        )),
    }
}

/// Build an UPDATE statement. The single-column `SET (c) = ROW($1)` row
/// constructor form is preserved for compatibility. The condition set must be
/// non-empty: an unconditional UPDATE is a caller contract violation.
///
/// Condition placeholders are numbered after the SET values.
///
/// # Errors
/// Returns `ValidationError` for an empty value map or an empty condition set.
pub fn update_statement(
    table: &str,
    values: &ColumnValues,
    conditions: &Conditions,
) -> Result<Statement, PgAccessError> {
    let (mut sql, mut params) = update_prefix(table, values, conditions)?;
    let rendered = conditions.render(params.len())?;
    sql.push_str(&format!(" WHERE ({});", rendered.sql));
    params.extend(rendered.params);
    Ok(Statement { sql, params })
}

/// [`update_statement`] with the WHERE condition rendered by textual
/// substitution instead of bound parameters.
///
/// This exists only for callers that need the historical query text
/// byte-for-byte (`... WHERE (id = 7);`). It shares the injection risk of
/// [`Conditions::render_literal`]; prefer [`update_statement`].
///
/// # Errors
/// Returns `ValidationError` for an empty value map or an empty condition set.
pub fn update_statement_literal_where(
    table: &str,
    values: &ColumnValues,
    conditions: &Conditions,
) -> Result<Statement, PgAccessError> {
    let (mut sql, params) = update_prefix(table, values, conditions)?;
    sql.push_str(&format!(" WHERE ({});", conditions.render_literal()?));
    Ok(Statement { sql, params })
}

fn update_prefix(
    table: &str,
    values: &ColumnValues,
    conditions: &Conditions,
) -> Result<(String, Vec<crate::types::SqlValue>), PgAccessError> {
    require_values(values, "update")?;
    if conditions.is_empty() {
        return Err(PgAccessError::ValidationError(
            "update requires a non-empty condition set".to_string(),
        ));
    }

    let placeholders = placeholder_list(values.len(), 0);
    // Postgres rejects a one-element parenthesized list on the right-hand
    // side of a multi-column SET, hence the ROW() constructor.
    let sql = if values.len() == 1 {
        format!(
            "UPDATE {} SET ({}) = ROW({})",
            table,
            values.joined_columns(),
            placeholders
        )
    } else {
        format!(
            "UPDATE {} SET ({}) = ({})",
            table,
            values.joined_columns(),
            placeholders
        )
    };
    Ok((sql, values.values()))
}

/// Build a DELETE statement. As with UPDATE, an empty condition set is
/// rejected rather than emitting an unconditional DELETE.
///
/// # Errors
/// Returns `ValidationError` for an empty condition set.
pub fn delete_statement(table: &str, conditions: &Conditions) -> Result<Statement, PgAccessError> {
    if conditions.is_empty() {
        return Err(PgAccessError::ValidationError(
            "delete requires a non-empty condition set".to_string(),
        ));
    }
    let rendered = conditions.render(0)?;
    Ok(Statement {
        sql: format!("DELETE FROM {} WHERE ({})", table, rendered.sql),
        params: rendered.params,
    })
}

/// One entry in a heterogeneous insert/update batch.
///
/// Each descriptor is built as its own parameterized statement; the executor
/// runs them sequentially inside a single transaction so the batch commits or
/// rolls back as a whole.
#[derive(Debug, Clone)]
pub enum BatchStatement {
    Insert {
        table: String,
        values: ColumnValues,
    },
    Update {
        table: String,
        values: ColumnValues,
        conditions: Conditions,
    },
}

impl BatchStatement {
    /// Build this descriptor into a statement.
    ///
    /// # Errors
    /// Returns `ValidationError` under the same rules as the single-statement
    /// builders.
    pub fn build(&self) -> Result<Statement, PgAccessError> {
        match self {
            BatchStatement::Insert { table, values } => {
                insert_statement(table, values, &ConflictMode::None)
            }
            BatchStatement::Update {
                table,
                values,
                conditions,
            } => update_statement(table, values, conditions),
        }
    }
}
