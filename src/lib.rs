//! Structured async PostgreSQL access layer.
//!
//! Builds single-table CRUD statements from structured inputs (tables,
//! column/value maps, ordered condition sets), executes them over
//! deadpool-managed connections with optional read-replica routing, and
//! emits a structured change record after each successful write when a
//! [`Publisher`] is configured.
//!
//! ```rust,no_run
//! use pg_access::{ColumnValues, Conditions, ConflictMode, PgAccess, PoolSettings,
//!     ReplicaSettings, Select, SqlValue};
//!
//! # async fn demo() -> Result<(), pg_access::PgAccessError> {
//! let mut cfg = deadpool_postgres::Config::new();
//! cfg.dbname = Some("app".into());
//! cfg.host = Some("localhost".into());
//! cfg.port = Some(5432);
//! cfg.user = Some("app".into());
//! cfg.password = Some("secret".into());
//!
//! let db = PgAccess::connect(cfg, &PoolSettings::default(), &ReplicaSettings::default()).await?;
//!
//! let values = ColumnValues::new().push("name", "alice").push("active", true);
//! db.insert("accounts", &values, &ConflictMode::None).await?;
//!
//! let rows = db
//!     .select(Select::new("accounts", &["id", "name"])
//!         .filter(Conditions::new().push("active = %s", SqlValue::Bool(true))))
//!     .await?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod condition;
pub mod error;
pub mod executor;
pub mod notify;
pub mod pool;
pub mod results;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use builder::{
    BatchStatement, ColumnValues, ConflictMode, Select, Statement, delete_statement,
    insert_returning_statement, insert_statement, update_statement,
    update_statement_literal_where,
};
pub use client::PgAccess;
pub use condition::{Conditions, RenderedCondition};
pub use error::PgAccessError;
pub use executor::parse_command_tag;
pub use notify::{ChangeOp, ChangeRecord, Publisher};
pub use pool::{PgPools, PoolSettings, ReplicaSettings};
pub use results::{ResultSet, Row};
pub use types::SqlValue;
