// End-to-end behavior against an embedded PostgreSQL instance.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::runtime::Runtime;

use pg_access::{
    BatchStatement, ChangeOp, ChangeRecord, ColumnValues, Conditions, ConflictMode, PgAccess,
    PgAccessError, PoolSettings, Publisher, ReplicaSettings, Select, SqlValue,
};
#[cfg(feature = "test-utils")]
use pg_access::test_utils::{setup_postgres_embedded, stop_postgres_embedded};

#[derive(Default)]
struct RecordingPublisher {
    records: Mutex<Vec<ChangeRecord>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, record: ChangeRecord) -> Result<(), PgAccessError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

impl RecordingPublisher {
    fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _record: ChangeRecord) -> Result<(), PgAccessError> {
        Err(PgAccessError::PublishError("transport down".to_string()))
    }
}

#[cfg(feature = "test-utils")]
#[test]
fn crud_roundtrip_with_notifications() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = deadpool_postgres::Config::new();
    cfg.dbname = Some("pg_access_test".to_string());
    let embedded = setup_postgres_embedded(&cfg)?;

    let rt = Runtime::new().unwrap();
    let result: Result<(), Box<dyn std::error::Error>> = rt.block_on(async {
        let publisher = Arc::new(RecordingPublisher::default());
        let settings = PoolSettings {
            min_size: 2,
            keepalive_idle: Some(std::time::Duration::from_secs(60)),
            ..PoolSettings::default()
        };
        let db = PgAccess::connect(
            embedded.config.clone(),
            &settings,
            &ReplicaSettings::default(),
        )
        .await?
        .with_publisher(publisher.clone());

        db.execute_raw_transaction(
            "CREATE TABLE accounts (
                id BIGSERIAL PRIMARY KEY,
                company_id BIGINT NOT NULL,
                name TEXT NOT NULL UNIQUE,
                balance BIGINT NOT NULL DEFAULT 0,
                active BOOL NOT NULL DEFAULT true
            );",
            None,
        )
        .await?;

        // insert publishes exactly one record with the original values
        let values = ColumnValues::new()
            .push("company_id", 42_i64)
            .push("name", "alice")
            .push("balance", 100_i64);
        let rows = db.insert("accounts", &values, &ConflictMode::None).await?;
        assert_eq!(rows, 1);
        assert_eq!(publisher.count(), 1);
        {
            let records = publisher.records.lock().unwrap();
            assert_eq!(records[0].operation, ChangeOp::Insert);
            assert_eq!(records[0].table, "accounts");
            assert_eq!(records[0].entity_group, Some(serde_json::json!(42)));
            let columns: Vec<_> = records[0].data.iter().map(|(c, _)| c.as_str()).collect();
            assert_eq!(columns, ["company_id", "name", "balance"]);
            let name = records[0]
                .data
                .iter()
                .find(|(column, _)| column == "name")
                .map(|(_, value)| value.clone());
            assert_eq!(name, Some(serde_json::json!("alice")));
        }

        // conflict-ignore inserts nothing and is reported as zero rows
        let rows = db
            .insert(
                "accounts",
                &values,
                &ConflictMode::DoNothing {
                    unique_columns: vec!["name".to_string()],
                },
            )
            .await?;
        assert_eq!(rows, 0);

        // a failed insert never publishes
        let before = publisher.count();
        let bad = ColumnValues::new().push("no_such_column", 1_i64);
        let err = db
            .insert("accounts", &bad, &ConflictMode::None)
            .await
            .unwrap_err();
        assert!(matches!(err, PgAccessError::ExecutionError { .. }));
        assert_eq!(publisher.count(), before);

        // insert_with_returning yields the generated key and publishes
        let bob = ColumnValues::new()
            .push("company_id", 42_i64)
            .push("name", "bob")
            .push("balance", 50_i64);
        let id = db.insert_with_returning("accounts", &bob, "id").await?;
        assert!(matches!(id, Some(SqlValue::Int(_))));

        // select returns ordered rows addressable by column name
        let rs = db
            .select(
                Select::new("accounts", &["name", "balance"])
                    .filter(Conditions::new().push("company_id = %s", SqlValue::Int(42)))
                    .order_by("name"),
            )
            .await?;
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows[0].get("name"), Some(&SqlValue::Text("alice".into())));
        assert_eq!(rs.rows[1].get("balance"), Some(&SqlValue::Int(50)));

        // update hits only the matched row and publishes with the condition
        let rows = db
            .update(
                "accounts",
                &ColumnValues::new().push("balance", 75_i64),
                &Conditions::new().push("name = %s", "bob"),
            )
            .await?;
        assert_eq!(rows, 1);
        {
            let records = publisher.records.lock().unwrap();
            let last = records.last().unwrap();
            assert_eq!(last.operation, ChangeOp::Update);
            assert!(last.condition.is_some());
        }

        // batch commits together and publishes per descriptor
        let batch = vec![
            BatchStatement::Insert {
                table: "accounts".to_string(),
                values: ColumnValues::new()
                    .push("company_id", 7_i64)
                    .push("name", "carol"),
            },
            BatchStatement::Update {
                table: "accounts".to_string(),
                values: ColumnValues::new().push("balance", 10_i64),
                conditions: Conditions::new().push("name = %s", "carol"),
            },
        ];
        let rows = db.insert_and_update(&batch).await?;
        assert_eq!(rows, 2);

        // a failing statement rolls the whole batch back
        let before_names = db
            .select(Select::new("accounts", &["name"]))
            .await?
            .len();
        let bad_batch = vec![
            BatchStatement::Insert {
                table: "accounts".to_string(),
                values: ColumnValues::new()
                    .push("company_id", 7_i64)
                    .push("name", "dave"),
            },
            BatchStatement::Insert {
                table: "no_such_table".to_string(),
                values: ColumnValues::new().push("x", 1_i64),
            },
        ];
        let err = db.insert_and_update(&bad_batch).await.unwrap_err();
        match err {
            PgAccessError::ExecutionError { statement, .. } => {
                assert!(statement.contains("no_such_table"));
            }
            other => panic!("expected ExecutionError, got {other:?}"),
        }
        let after_names = db
            .select(Select::new("accounts", &["name"]))
            .await?
            .len();
        assert_eq!(before_names, after_names);

        // raw write with an explicit change record publishes it; None stays silent
        let before = publisher.count();
        db.execute_raw_insert(
            "INSERT INTO accounts (company_id, name) VALUES (9, 'erin');",
            None,
        )
        .await?;
        assert_eq!(publisher.count(), before);
        db.execute_raw_update(
            "UPDATE accounts SET balance = 1 WHERE name = 'erin';",
            Some(ChangeRecord {
                entity_group: Some(serde_json::json!(9)),
                table: "accounts".to_string(),
                operation: ChangeOp::Update,
                data: Default::default(),
                condition: None,
            }),
        )
        .await?;
        assert_eq!(publisher.count(), before + 1);

        // raw transaction script failure rolls back and surfaces an error
        let err = db
            .execute_raw_transaction("INSERT INTO no_such_table VALUES (1);", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PgAccessError::ExecutionError { .. }));

        // idle reaping retires pooled connections without breaking later use
        db.pools().reap_idle(std::time::Duration::from_secs(0));

        // delete removes the row and returns the count
        let rows = db
            .delete("accounts", &Conditions::new().push("name = %s", "erin"))
            .await?;
        assert_eq!(rows, 1);

        // a failing publisher never fails the write it describes
        let silent = PgAccess::connect(
            embedded.config.clone(),
            &PoolSettings::default(),
            &ReplicaSettings::default(),
        )
        .await?
        .with_publisher(Arc::new(FailingPublisher));
        let rows = silent
            .insert(
                "accounts",
                &ColumnValues::new()
                    .push("company_id", 1_i64)
                    .push("name", "frank"),
                &ConflictMode::None,
            )
            .await?;
        assert_eq!(rows, 1);
        silent.close();

        db.close();
        Ok(())
    });

    stop_postgres_embedded(embedded);
    result
}

#[cfg(feature = "test-utils")]
#[test]
fn reads_route_to_replica_when_enabled() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = deadpool_postgres::Config::new();
    cfg.dbname = Some("pg_access_replica_test".to_string());
    let embedded = setup_postgres_embedded(&cfg)?;

    let rt = Runtime::new().unwrap();
    let result: Result<(), Box<dyn std::error::Error>> = rt.block_on(async {
        // Point the "replica" at the same embedded server; routing is what
        // is under test, not replication itself.
        let replica = ReplicaSettings {
            enabled: true,
            host: embedded.config.host.clone(),
            port: embedded.config.port,
        };
        let db = PgAccess::connect(
            embedded.config.clone(),
            &PoolSettings::default(),
            &replica,
        )
        .await?;
        assert!(db.pools().replica_enabled());
        assert!(!std::ptr::eq(
            db.pools().read_pool(),
            db.pools().write_pool()
        ));

        db.execute_raw_transaction("CREATE TABLE t (id BIGINT);", None)
            .await?;
        db.insert(
            "t",
            &ColumnValues::new().push("id", 1_i64),
            &ConflictMode::None,
        )
        .await?;
        let rs = db.execute_raw_select("SELECT id FROM t;").await?;
        assert_eq!(rs.len(), 1);

        // without a replica, reads fall back to the primary pool
        let db_plain = PgAccess::connect(
            embedded.config.clone(),
            &PoolSettings::default(),
            &ReplicaSettings::default(),
        )
        .await?;
        assert!(std::ptr::eq(
            db_plain.pools().read_pool(),
            db_plain.pools().write_pool()
        ));

        db_plain.close();
        db.close();
        Ok(())
    });

    stop_postgres_embedded(embedded);
    result
}
