//! Pool ownership and read/write routing.
//!
//! One primary pool handles every write; an optional replica pool takes the
//! reads when enabled. Both pools are created eagerly at `connect` and live
//! for the process lifetime.

use std::time::Duration;

use deadpool_postgres::{Config as PgConfig, Pool, PoolConfig, Runtime};
use tokio_postgres::NoTls;
use tracing::debug;

use crate::error::PgAccessError;

/// Pool sizing and acquisition limits.
///
/// Acquisition is bounded: a caller that waits longer than `acquire_timeout`
/// for a free connection gets a pool error instead of queuing forever
/// (detectable via [`PgAccessError::is_pool_exhausted`]).
///
/// The pool keeps no background reaper, so there is no automatic
/// idle-connection lifetime; `keepalive_idle` covers dead-peer detection at
/// the TCP level, and [`PgPools::reap_idle`] lets the application retire
/// long-idle connections on its own schedule.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Connections opened up front per pool at `connect`.
    pub min_size: usize,
    /// Maximum number of live connections per pool.
    pub max_size: usize,
    /// How long a caller may wait for a free connection.
    pub acquire_timeout: Duration,
    /// TCP keepalive idle interval for pooled connections; `None` keeps the
    /// driver default.
    pub keepalive_idle: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 16,
            acquire_timeout: Duration::from_secs(5),
            keepalive_idle: None,
        }
    }
}

/// Read-replica routing configuration.
///
/// When `enabled`, `host` and `port` are mandatory; `connect` fails fast with
/// a `ConfigError` before any pool is created if either is missing.
#[derive(Debug, Clone, Default)]
pub struct ReplicaSettings {
    pub enabled: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Primary write pool plus optional read-replica pool.
#[derive(Clone)]
pub struct PgPools {
    primary: Pool,
    replica: Option<Pool>,
}

impl std::fmt::Debug for PgPools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPools")
            .field("primary", &"<pool>")
            .field("replica_enabled", &self.replica.is_some())
            .finish()
    }
}

impl PgPools {
    /// Create the primary pool (and the replica pool when enabled), verifying
    /// each with one test acquisition so misconfiguration fails at startup
    /// rather than on the first query.
    ///
    /// # Errors
    /// Returns `ConfigError` if required connection fields are missing or the
    /// replica is enabled without host/port; `PoolError`/`PostgresError` if a
    /// pool cannot be created or its test acquisition fails.
    pub async fn connect(
        pg_config: PgConfig,
        settings: &PoolSettings,
        replica: &ReplicaSettings,
    ) -> Result<Self, PgAccessError> {
        validate_config(&pg_config)?;
        validate_settings(settings)?;

        let replica_config = if replica.enabled {
            let (Some(host), Some(port)) = (replica.host.clone(), replica.port) else {
                return Err(PgAccessError::ConfigError(
                    "read replica enabled but host/port missing".to_string(),
                ));
            };
            let mut cfg = pg_config.clone();
            cfg.host = Some(host);
            cfg.port = Some(port);
            Some(cfg)
        } else {
            None
        };

        let primary = create_pool(pg_config, settings).await?;
        debug!("primary pool established");

        let replica = match replica_config {
            Some(cfg) => {
                let pool = create_pool(cfg, settings).await?;
                debug!("read replica pool established");
                Some(pool)
            }
            None => None,
        };

        Ok(Self { primary, replica })
    }

    /// The pool write operations must use.
    #[must_use]
    pub fn write_pool(&self) -> &Pool {
        &self.primary
    }

    /// The pool read operations should use: the replica when enabled,
    /// otherwise the primary.
    #[must_use]
    pub fn read_pool(&self) -> &Pool {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    #[must_use]
    pub fn replica_enabled(&self) -> bool {
        self.replica.is_some()
    }

    /// Retire connections that have sat idle for longer than `max_idle`,
    /// in both pools. deadpool has no background reaper, so enforcing an
    /// idle-connection lifetime is the application's call to make.
    pub fn reap_idle(&self, max_idle: Duration) {
        self.primary
            .retain(|_, metrics| metrics.last_used() <= max_idle);
        if let Some(replica) = &self.replica {
            replica.retain(|_, metrics| metrics.last_used() <= max_idle);
        }
    }

    /// Close both pools. In-flight connections finish their current
    /// operation; new acquisitions fail.
    pub fn close(&self) {
        debug!("closing connection pools");
        self.primary.close();
        if let Some(replica) = &self.replica {
            replica.close();
        }
    }
}

fn validate_config(pg_config: &PgConfig) -> Result<(), PgAccessError> {
    if pg_config.dbname.is_none() {
        return Err(PgAccessError::ConfigError("dbname is required".to_string()));
    }
    if pg_config.host.is_none() {
        return Err(PgAccessError::ConfigError("host is required".to_string()));
    }
    if pg_config.port.is_none() {
        return Err(PgAccessError::ConfigError("port is required".to_string()));
    }
    if pg_config.user.is_none() {
        return Err(PgAccessError::ConfigError("user is required".to_string()));
    }
    if pg_config.password.is_none() {
        return Err(PgAccessError::ConfigError(
            "password is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(settings: &PoolSettings) -> Result<(), PgAccessError> {
    if settings.max_size == 0 {
        return Err(PgAccessError::ConfigError(
            "pool max_size must be at least 1".to_string(),
        ));
    }
    if settings.min_size > settings.max_size {
        return Err(PgAccessError::ConfigError(format!(
            "pool min_size {} exceeds max_size {}",
            settings.min_size, settings.max_size
        )));
    }
    Ok(())
}

async fn create_pool(
    mut pg_config: PgConfig,
    settings: &PoolSettings,
) -> Result<Pool, PgAccessError> {
    let mut pool_config = PoolConfig::new(settings.max_size);
    pool_config.timeouts.wait = Some(settings.acquire_timeout);
    pg_config.pool = Some(pool_config);
    if let Some(idle) = settings.keepalive_idle {
        pg_config.keepalives = Some(true);
        pg_config.keepalives_idle = Some(idle);
    }

    let pool = pg_config
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| PgAccessError::ConfigError(format!("failed to create pool: {e}")))?;

    // deadpool creates connections lazily; hold min_size of them open before
    // returning so the floor is warm and bad credentials or an unreachable
    // host fail at connect time.
    let mut warm = Vec::with_capacity(settings.min_size.max(1));
    for _ in 0..settings.min_size.max(1) {
        warm.push(pool.get().await?);
    }
    drop(warm);

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> PgConfig {
        let mut cfg = PgConfig::new();
        cfg.dbname = Some("db".into());
        cfg.host = Some("localhost".into());
        cfg.port = Some(5432);
        cfg.user = Some("u".into());
        cfg.password = Some("p".into());
        cfg
    }

    #[tokio::test]
    async fn replica_enabled_without_host_fails_with_config_error() {
        let replica = ReplicaSettings {
            enabled: true,
            host: None,
            port: Some(5433),
        };
        let result =
            PgPools::connect(base_config(), &PoolSettings::default(), &replica).await;
        assert!(matches!(result, Err(PgAccessError::ConfigError(_))));
    }

    #[tokio::test]
    async fn min_size_above_max_size_fails_with_config_error() {
        let settings = PoolSettings {
            min_size: 8,
            max_size: 4,
            ..PoolSettings::default()
        };
        let result =
            PgPools::connect(base_config(), &settings, &ReplicaSettings::default()).await;
        assert!(matches!(result, Err(PgAccessError::ConfigError(_))));
    }

    #[tokio::test]
    async fn missing_dbname_fails_with_config_error() {
        let mut cfg = base_config();
        cfg.dbname = None;
        let result = PgPools::connect(
            cfg,
            &PoolSettings::default(),
            &ReplicaSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(PgAccessError::ConfigError(_))));
    }
}
