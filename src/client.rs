//! The public database client.
//!
//! Reads route to the replica pool when one is configured; every write goes
//! to the primary. Each operation builds its statement fresh, executes it on
//! a scoped pooled connection, and (for writes, when a publisher is
//! configured) emits a change record after success.

use std::sync::Arc;

use deadpool_postgres::Config as PgConfig;

use crate::builder::{
    BatchStatement, ColumnValues, ConflictMode, Select, Statement, delete_statement,
    insert_returning_statement, insert_statement, update_statement,
};
use crate::condition::Conditions;
use crate::error::PgAccessError;
use crate::executor;
use crate::notify::{ChangeOp, ChangeRecord, Publisher, publish_change};
use crate::pool::{PgPools, PoolSettings, ReplicaSettings};
use crate::results::ResultSet;
use crate::types::SqlValue;

/// Async Postgres access client: builder-driven CRUD plus raw-SQL escape
/// hatches, over a primary pool and an optional read replica.
#[derive(Clone)]
pub struct PgAccess {
    pools: PgPools,
    publisher: Option<Arc<dyn Publisher>>,
}

impl PgAccess {
    /// Connect both pools eagerly. See [`PgPools::connect`] for the failure
    /// modes.
    ///
    /// # Errors
    /// Returns `ConfigError` for incomplete configuration, or a pool/driver
    /// error if a pool cannot be established.
    pub async fn connect(
        pg_config: PgConfig,
        settings: &PoolSettings,
        replica: &ReplicaSettings,
    ) -> Result<Self, PgAccessError> {
        Ok(Self {
            pools: PgPools::connect(pg_config, settings, replica).await?,
            publisher: None,
        })
    }

    /// Enable the notification side-channel. Writes publish a
    /// [`ChangeRecord`] after success; without a publisher, writes are
    /// silent.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// The underlying pools, mainly for health checks.
    #[must_use]
    pub fn pools(&self) -> &PgPools {
        &self.pools
    }

    /// Execute a built SELECT on the read pool.
    ///
    /// # Errors
    /// Returns `ValidationError` for a malformed builder input, or an
    /// execution error carrying the statement text.
    pub async fn select(&self, query: Select) -> Result<ResultSet, PgAccessError> {
        let statement = query.build()?;
        executor::run_select(self.pools.read_pool(), &statement).await
    }

    /// INSERT one row; returns the affected-row count.
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty value map, or an execution
    /// error carrying the statement text.
    pub async fn insert(
        &self,
        table: &str,
        values: &ColumnValues,
        conflict: &ConflictMode,
    ) -> Result<u64, PgAccessError> {
        let statement = insert_statement(table, values, conflict)?;
        let rows = executor::run_write(self.pools.write_pool(), &statement, "insert").await?;
        self.publish(ChangeRecord::from_write(table, values, None, ChangeOp::Insert))
            .await;
        Ok(rows)
    }

    /// INSERT one row with `RETURNING <expr>`; returns the produced scalar
    /// (None when the statement produced no row, e.g. a conflict skip).
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty value map, or an execution
    /// error carrying the statement text.
    pub async fn insert_with_returning(
        &self,
        table: &str,
        values: &ColumnValues,
        returning: &str,
    ) -> Result<Option<SqlValue>, PgAccessError> {
        let statement = insert_returning_statement(table, values, returning)?;
        let value = executor::run_write_returning(self.pools.write_pool(), &statement).await?;
        self.publish(ChangeRecord::from_write(table, values, None, ChangeOp::Insert))
            .await;
        Ok(value)
    }

    /// UPDATE rows matching a non-empty condition set; returns the
    /// affected-row count.
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty value map or empty conditions
    /// (nothing is executed), or an execution error carrying the statement
    /// text.
    pub async fn update(
        &self,
        table: &str,
        values: &ColumnValues,
        conditions: &Conditions,
    ) -> Result<u64, PgAccessError> {
        let statement = update_statement(table, values, conditions)?;
        let rows = executor::run_write(self.pools.write_pool(), &statement, "update").await?;
        self.publish(ChangeRecord::from_write(
            table,
            values,
            Some(conditions),
            ChangeOp::Update,
        ))
        .await;
        Ok(rows)
    }

    /// DELETE rows matching a non-empty condition set; returns the
    /// affected-row count.
    ///
    /// # Errors
    /// Returns `ValidationError` for empty conditions (nothing is executed),
    /// or an execution error carrying the statement text.
    pub async fn delete(
        &self,
        table: &str,
        conditions: &Conditions,
    ) -> Result<u64, PgAccessError> {
        let statement = delete_statement(table, conditions)?;
        executor::run_write(self.pools.write_pool(), &statement, "delete").await
    }

    /// Execute a heterogeneous list of insert/update descriptors inside one
    /// transaction; all of them commit or roll back together. Returns the
    /// summed affected-row count.
    ///
    /// # Errors
    /// Returns `ValidationError` if any descriptor is malformed (nothing is
    /// executed), or an execution error carrying the failing statement.
    pub async fn insert_and_update(
        &self,
        batch: &[BatchStatement],
    ) -> Result<u64, PgAccessError> {
        let statements = batch
            .iter()
            .map(BatchStatement::build)
            .collect::<Result<Vec<_>, _>>()?;
        let rows = executor::run_write_batch(self.pools.write_pool(), &statements).await?;
        for descriptor in batch {
            self.publish(batch_change_record(descriptor)).await;
        }
        Ok(rows)
    }

    /// Execute a raw SELECT on the read pool.
    ///
    /// # Errors
    /// Returns an execution error carrying the statement text.
    pub async fn execute_raw_select(&self, sql: &str) -> Result<ResultSet, PgAccessError> {
        executor::run_select(self.pools.read_pool(), &Statement::raw(sql)).await
    }

    /// Execute a raw INSERT inside a transaction. The caller supplies the
    /// change record to publish (the SQL text is never parsed).
    ///
    /// # Errors
    /// Returns an execution error carrying the statement text.
    pub async fn execute_raw_insert(
        &self,
        sql: &str,
        change: Option<ChangeRecord>,
    ) -> Result<u64, PgAccessError> {
        self.execute_raw_write(sql, "raw-insert", change).await
    }

    /// Execute a raw UPDATE inside a transaction. The caller supplies the
    /// change record to publish.
    ///
    /// # Errors
    /// Returns an execution error carrying the statement text.
    pub async fn execute_raw_update(
        &self,
        sql: &str,
        change: Option<ChangeRecord>,
    ) -> Result<u64, PgAccessError> {
        self.execute_raw_write(sql, "raw-update", change).await
    }

    /// Execute a raw statement that may insert or update. The caller supplies
    /// the change record to publish.
    ///
    /// # Errors
    /// Returns an execution error carrying the statement text.
    pub async fn execute_insert_or_update(
        &self,
        sql: &str,
        change: Option<ChangeRecord>,
    ) -> Result<u64, PgAccessError> {
        self.execute_raw_write(sql, "insert-or-update", change).await
    }

    /// Execute a raw multi-statement script inside this layer's own
    /// transaction; success means the whole script committed.
    ///
    /// # Errors
    /// Returns an execution error carrying the script text if any statement
    /// or the commit fails; the script is rolled back.
    pub async fn execute_raw_transaction(
        &self,
        sql: &str,
        change: Option<ChangeRecord>,
    ) -> Result<(), PgAccessError> {
        executor::run_raw_script(self.pools.write_pool(), sql).await?;
        if let Some(record) = change {
            self.publish(record).await;
        }
        Ok(())
    }

    /// Close both pools.
    pub fn close(&self) {
        self.pools.close();
    }

    async fn execute_raw_write(
        &self,
        sql: &str,
        label: &str,
        change: Option<ChangeRecord>,
    ) -> Result<u64, PgAccessError> {
        let rows =
            executor::run_write(self.pools.write_pool(), &Statement::raw(sql), label).await?;
        if let Some(record) = change {
            self.publish(record).await;
        }
        Ok(rows)
    }

    async fn publish(&self, record: ChangeRecord) {
        if let Some(publisher) = &self.publisher {
            publish_change(publisher.as_ref(), record).await;
        }
    }
}

fn batch_change_record(descriptor: &BatchStatement) -> ChangeRecord {
    match descriptor {
        BatchStatement::Insert { table, values } => {
            ChangeRecord::from_write(table, values, None, ChangeOp::Insert)
        }
        BatchStatement::Update {
            table,
            values,
            conditions,
        } => ChangeRecord::from_write(table, values, Some(conditions), ChangeOp::Update),
    }
}
