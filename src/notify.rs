//! Change notification side-channel.
//!
//! After a successful write, the client hands a [`ChangeRecord`] to the
//! configured [`Publisher`]. Publishing is fire-and-forget relative to the
//! write: a publish failure is logged and never fails the write it describes.
//! Raw-SQL write paths take an explicit record from the caller; nothing here
//! parses SQL text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::builder::ColumnValues;
use crate::condition::Conditions;
use crate::error::PgAccessError;
use crate::types::SqlValue;

/// Column whose value identifies the entity group a write belongs to.
const ENTITY_GROUP_COLUMN: &str = "company_id";

/// The kind of write a change record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A structured description of one completed write, emitted to downstream
/// consumers. Not persisted by this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Identifier of the entity group the write belongs to (the table's
    /// `company_id` value, when present).
    pub entity_group: Option<JsonValue>,
    /// The table the write touched.
    pub table: String,
    /// The operation kind.
    pub operation: ChangeOp,
    /// The written column/value pairs, in binding order.
    pub data: Vec<(String, JsonValue)>,
    /// The condition payload for updates, as fragment/value text pairs.
    pub condition: Option<Vec<(String, String)>>,
}

impl ChangeRecord {
    /// Build a record straight from a built statement's call parameters.
    #[must_use]
    pub fn from_write(
        table: &str,
        values: &ColumnValues,
        conditions: Option<&Conditions>,
        operation: ChangeOp,
    ) -> Self {
        let data = values
            .iter()
            .map(|(column, value)| (column.to_string(), to_json(value)))
            .collect();
        Self {
            entity_group: values.get(ENTITY_GROUP_COLUMN).map(to_json),
            table: table.to_string(),
            operation,
            data,
            condition: conditions.map(condition_pairs),
        }
    }
}

fn condition_pairs(conditions: &Conditions) -> Vec<(String, String)> {
    conditions
        .fragments()
        .map(|(fragment, value)| {
            (
                fragment.to_string(),
                value.map(SqlValue::to_sql_literal).unwrap_or_default(),
            )
        })
        .collect()
}

fn to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Int(i) => JsonValue::from(*i),
        SqlValue::Float(f) => JsonValue::from(*f),
        SqlValue::Text(s) => JsonValue::from(s.clone()),
        SqlValue::Bool(b) => JsonValue::from(*b),
        SqlValue::Timestamp(dt) => JsonValue::from(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        SqlValue::Null => JsonValue::Null,
        SqlValue::JSON(j) => j.clone(),
        SqlValue::Blob(_) => JsonValue::Null,
    }
}

/// Transport for change records. The implementation is an external
/// collaborator (message bus, webhook, in-process channel).
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver one change record.
    ///
    /// # Errors
    /// Returns `PublishError` when delivery fails; the caller logs it and
    /// moves on.
    async fn publish(&self, record: ChangeRecord) -> Result<(), PgAccessError>;
}

/// Publish `record` through `publisher`, swallowing (but logging) failures so
/// they never surface as the write's failure.
pub(crate) async fn publish_change(publisher: &dyn Publisher, record: ChangeRecord) {
    let table = record.table.clone();
    if let Err(e) = publisher.publish(record).await {
        warn!(table = %table, error = %e, "change record publish failed");
    }
}
