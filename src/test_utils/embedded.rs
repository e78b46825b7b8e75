use postgresql_embedded::PostgreSQL;

use super::SHARED_RUNTIME;
use crate::error::PgAccessError;
use crate::pool::{PgPools, PoolSettings, ReplicaSettings};

/// Represents a running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    /// A working deadpool config pointing at the embedded server.
    pub config: deadpool_postgres::Config,
}

/// Set up an embedded `PostgreSQL` instance for testing.
///
/// Creates the database named in `cfg.dbname` and returns a config carrying
/// the embedded server's host, port, and credentials.
///
/// # Errors
/// Returns an error if the embedded server cannot be set up or started, if
/// database provisioning fails, or if the post-start connectivity check
/// fails.
///
/// # Panics
/// Panics if `cfg.dbname` is `None` because the target database name is
/// required.
pub fn setup_postgres_embedded(
    cfg: &deadpool_postgres::Config,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();

        // Bundled binaries, so no download conflicts
        postgresql.setup().await?;
        postgresql.start().await?;

        let port = postgresql.settings().port;
        let host = postgresql.settings().host.clone();
        let user = postgresql.settings().username.clone();
        let password = postgresql.settings().password.clone();

        let db_name = cfg.dbname.as_ref().expect("dbname is required");
        postgresql.create_database(db_name).await?;

        let mut final_cfg = cfg.clone();
        final_cfg.host = Some(host);
        final_cfg.port = Some(port);
        final_cfg.user = Some(user);
        final_cfg.password = Some(password);

        // Quick connectivity check through the crate's own pool path
        let pools = PgPools::connect(
            final_cfg.clone(),
            &PoolSettings::default(),
            &ReplicaSettings::default(),
        )
        .await
        .map_err(|e: PgAccessError| format!("embedded postgres connectivity check: {e}"))?;
        pools.close();

        Ok(EmbeddedPostgres {
            postgresql,
            port,
            config: final_cfg,
        })
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}
