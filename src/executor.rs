//! Statement execution against pooled connections.
//!
//! Every operation acquires a connection for its own duration only. Writes
//! run inside a transaction; multi-statement batches commit or roll back
//! together. Failures are logged with the offending statement and re-raised
//! unchanged in kind.

use std::sync::Arc;

use chrono::NaiveDateTime;
use deadpool_postgres::{Object, Pool, Transaction as PgTransaction};
use serde_json::Value as JsonValue;
use tokio_postgres::Statement as PgStatement;
use tracing::{debug, error};

use crate::builder::Statement;
use crate::error::PgAccessError;
use crate::results::ResultSet;
use crate::types::{SqlValue, as_pg_refs};

/// Parse a driver command tag into an affected-row count.
///
/// The tag's last space-separated token is the count: `"UPDATE 3"` -> 3,
/// `"INSERT 0 1"` -> 1. tokio-postgres pre-parses counts on the extended
/// protocol, so the executor receives them directly; this parser pins the tag
/// rule for callers consuming simple-protocol output (where only the tag text
/// is available).
///
/// # Errors
/// Returns `ExecutionError` if the tag has no trailing integer token.
pub fn parse_command_tag(tag: &str) -> Result<u64, PgAccessError> {
    tag.rsplit(' ')
        .next()
        .and_then(|token| token.parse::<u64>().ok())
        .ok_or_else(|| {
            PgAccessError::execution(tag, "command tag has no trailing row count")
        })
}

/// Acquire a connection from `pool`, scoped to the caller's operation.
pub(crate) async fn acquire(pool: &Pool) -> Result<Object, PgAccessError> {
    Ok(pool.get().await?)
}

/// Execute a SELECT on a pooled connection and materialize the full result.
pub(crate) async fn run_select(
    pool: &Pool,
    statement: &Statement,
) -> Result<ResultSet, PgAccessError> {
    let conn = acquire(pool).await?;
    debug!(query = %statement.sql, "select-query");
    let result = query_on_client(&conn, statement).await;
    log_on_error("select", statement, result)
}

/// Execute a single write statement inside its own transaction and return
/// the affected-row count.
pub(crate) async fn run_write(
    pool: &Pool,
    statement: &Statement,
    label: &str,
) -> Result<u64, PgAccessError> {
    let mut conn = acquire(pool).await?;
    debug!(query = %statement.sql, "{label}-query");
    let result = async {
        let tx = begin(&mut conn).await?;
        let rows = execute_in_tx(&tx, statement).await?;
        tx.commit().await?;
        Ok(rows)
    }
    .await;
    log_on_error(label, statement, result)
}

/// Execute a write with `RETURNING`, yielding the first column of the first
/// row (or `None` when the statement produced no row).
pub(crate) async fn run_write_returning(
    pool: &Pool,
    statement: &Statement,
) -> Result<Option<SqlValue>, PgAccessError> {
    let mut conn = acquire(pool).await?;
    debug!(query = %statement.sql, "insert-with-returning-query");
    let result = async {
        let tx = begin(&mut conn).await?;
        let prepared = tx.prepare(&statement.sql).await?;
        let refs = as_pg_refs(&statement.params);
        let row = tx.query_opt(&prepared, &refs).await?;
        tx.commit().await?;
        match row {
            Some(row) => Ok(Some(extract_value(&row, 0)?)),
            None => Ok(None),
        }
    }
    .await;
    log_on_error("insert-with-returning", statement, result)
}

/// Execute a sequence of statements inside one transaction; all of them
/// commit or roll back together. Returns the summed affected-row count.
pub(crate) async fn run_write_batch(
    pool: &Pool,
    statements: &[Statement],
) -> Result<u64, PgAccessError> {
    let mut conn = acquire(pool).await?;
    let batch_sql = statements
        .iter()
        .map(|s| s.sql.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let mut total = 0_u64;
    let tx = begin(&mut conn)
        .await
        .map_err(|e| attach_statement(&batch_sql, e))?;
    for statement in statements {
        debug!(query = %statement.sql, "insert-and-update-query");
        match execute_in_tx(&tx, statement).await {
            Ok(rows) => total += rows,
            Err(e) => {
                // Keep the statement failure; a rollback failure on top of it
                // is only worth a log line.
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "insert-and-update rollback failed");
                }
                return log_on_error("insert-and-update", statement, Err(e));
            }
        }
    }
    tx.commit().await.map_err(|e| {
        error!(query = %batch_sql, error = %e, "insert-and-update commit failed");
        PgAccessError::execution(batch_sql.clone(), e)
    })?;
    Ok(total)
}

/// Execute a raw multi-statement script inside this layer's own transaction.
/// Success is gated on the commit completing; any statement failure rolls the
/// whole script back.
pub(crate) async fn run_raw_script(pool: &Pool, sql: &str) -> Result<(), PgAccessError> {
    let mut conn = acquire(pool).await?;
    debug!(query = %sql, "raw-transaction-query");
    let tx = begin(&mut conn)
        .await
        .map_err(|e| attach_statement(sql, e))?;
    if let Err(e) = tx.batch_execute(sql).await {
        error!(query = %sql, error = %e, "raw transaction query failed");
        if let Err(rollback_err) = tx.rollback().await {
            error!(error = %rollback_err, "raw transaction rollback failed");
        }
        return Err(PgAccessError::execution(sql, e));
    }
    tx.commit()
        .await
        .map_err(|e| PgAccessError::execution(sql, e))
}

async fn begin(conn: &mut Object) -> Result<PgTransaction<'_>, PgAccessError> {
    Ok(conn.transaction().await?)
}

async fn execute_in_tx(
    tx: &PgTransaction<'_>,
    statement: &Statement,
) -> Result<u64, PgAccessError> {
    let prepared = tx.prepare(&statement.sql).await?;
    let refs = as_pg_refs(&statement.params);
    Ok(tx.execute(&prepared, &refs).await?)
}

async fn query_on_client(
    conn: &Object,
    statement: &Statement,
) -> Result<ResultSet, PgAccessError> {
    let prepared = conn.prepare(&statement.sql).await?;
    let refs = as_pg_refs(&statement.params);
    let rows = conn.query(&prepared, &refs).await?;
    build_result_set(&prepared, &rows)
}

fn log_on_error<T>(
    label: &str,
    statement: &Statement,
    result: Result<T, PgAccessError>,
) -> Result<T, PgAccessError> {
    result.map_err(|e| {
        error!(query = %statement.sql, error = %e, "{label} query error");
        attach_statement(&statement.sql, e)
    })
}

/// Rewrap a driver error so it carries the statement it came from; errors
/// that already do (or are not driver errors) pass through unchanged.
fn attach_statement(sql: &str, e: PgAccessError) -> PgAccessError {
    match e {
        e @ PgAccessError::ExecutionError { .. } => e,
        PgAccessError::PostgresError(cause) => PgAccessError::execution(sql, cause),
        other => other,
    }
}

/// Build a result set using statement metadata for column names.
pub(crate) fn build_result_set(
    stmt: &PgStatement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, PgAccessError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(extract_value(row, idx)?);
        }
        result_set.push_values(values);
    }

    Ok(result_set)
}

/// Extract a [`SqlValue`] from a tokio-postgres row at the given index,
/// dispatching on the column's Postgres type name.
pub(crate) fn extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<SqlValue, PgAccessError> {
    let type_info = row.columns()[idx].type_();

    if type_info.name() == "int2" {
        let val: Option<i16> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))))
    } else if type_info.name() == "int4" {
        let val: Option<i32> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))))
    } else if type_info.name() == "int8" {
        let val: Option<i64> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Int))
    } else if type_info.name() == "float4" || type_info.name() == "float8" {
        let val: Option<f64> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Float))
    } else if type_info.name() == "bool" {
        let val: Option<bool> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Bool))
    } else if type_info.name() == "timestamp" || type_info.name() == "timestamptz" {
        let val: Option<NaiveDateTime> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Timestamp))
    } else if type_info.name() == "json" || type_info.name() == "jsonb" {
        let val: Option<JsonValue> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::JSON))
    } else if type_info.name() == "bytea" {
        let val: Option<Vec<u8>> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Blob))
    } else {
        // Text types, and anything else that stringifies
        let val: Option<String> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tag_parses_to_count() {
        assert_eq!(parse_command_tag("UPDATE 3").unwrap(), 3);
    }

    #[test]
    fn insert_tag_takes_last_token() {
        assert_eq!(parse_command_tag("INSERT 0 1").unwrap(), 1);
    }

    #[test]
    fn delete_tag_parses() {
        assert_eq!(parse_command_tag("DELETE 12").unwrap(), 12);
    }

    #[test]
    fn tag_without_count_is_an_execution_error() {
        let err = parse_command_tag("COMMIT").unwrap_err();
        assert!(matches!(err, PgAccessError::ExecutionError { .. }));
    }

    #[test]
    fn empty_tag_is_an_execution_error() {
        assert!(parse_command_tag("").is_err());
    }
}
