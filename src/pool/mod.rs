//! One blocking connection pool per DSN.
//!
//! A [`PoolRegistry`] creates a pool the first time a DSN is used and hands out
//! [`PoolConnection`]s from it. Dropping a `PoolConnection` returns it to its pool,
//! rolling back first if a transaction is still open.

mod connection;
mod manager;

pub use connection::Connection;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use r2d2::{Pool, PooledConnection};
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::error::RawlError;
use crate::types::{DatabaseType, IsolationLevel, TransactionStatus};
use manager::{ConnectionManager, TracingErrorHandler};

/// Snapshot of one pool's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently open, idle or checked out.
    pub connections: u32,
    pub idle: u32,
}

/// Registry of pools keyed by DSN.
///
/// Share one registry (usually behind an `Arc`) between every model that should
/// reuse the same connections.
#[derive(Debug)]
pub struct PoolRegistry {
    config: PoolConfig,
    pools: Mutex<HashMap<String, Pool<ConnectionManager>>>,
}

impl PoolRegistry {
    /// # Errors
    /// Returns `RawlError::ConfigError` if `config` is invalid.
    pub fn new(config: PoolConfig) -> Result<Self, RawlError> {
        config.validate()?;
        Ok(PoolRegistry {
            config,
            pools: Mutex::new(HashMap::new()),
        })
    }

    /// Registry configured from `RAWL_*` environment variables.
    ///
    /// # Errors
    /// Returns `RawlError::ConfigError` for malformed variables.
    pub fn from_env() -> Result<Self, RawlError> {
        Self::new(PoolConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Pool<ConnectionManager>>> {
        match self.pools.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn pool_for(&self, dsn: &str) -> Result<Pool<ConnectionManager>, RawlError> {
        let mut pools = self.lock();
        if let Some(pool) = pools.get(dsn) {
            debug!("reusing connection pool");
            return Ok(pool.clone());
        }

        let manager = ConnectionManager::new(dsn, self.config.sqlite_busy_timeout)?;
        let db_type = manager.database_type();
        let pool = Pool::builder()
            .min_idle(Some(self.config.min_connections))
            .max_size(self.config.max_connections)
            .connection_timeout(self.config.acquire_timeout)
            .test_on_check_out(self.config.test_on_checkout)
            .error_handler(Box::new(TracingErrorHandler))
            .build_unchecked(manager);
        info!(
            ?db_type,
            min = self.config.min_connections,
            max = self.config.max_connections,
            "created connection pool"
        );
        pools.insert(dsn.to_string(), pool.clone());
        Ok(pool)
    }

    /// Check out a connection for `dsn`, creating its pool on first use.
    ///
    /// Blocks while the pool is exhausted, up to the configured acquire timeout or
    /// `deadline`, whichever comes first. Connectivity failures are retried
    /// `connect_retries` times.
    ///
    /// # Errors
    /// Returns `RawlError::Timeout` if `deadline` passes, `RawlError::ConnectionError`
    /// if no connection could be obtained, and `RawlError::ConfigError` for a DSN
    /// naming no compiled-in backend.
    pub fn acquire(
        &self,
        dsn: &str,
        deadline: Option<Instant>,
    ) -> Result<PoolConnection, RawlError> {
        let pool = self.pool_for(dsn)?;
        let mut attempt = 0u32;
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(RawlError::Timeout(
                            "deadline expired waiting for a connection".to_string(),
                        ));
                    }
                    remaining.min(self.config.acquire_timeout)
                }
                None => self.config.acquire_timeout,
            };

            match pool.get_timeout(wait) {
                Ok(mut conn) => {
                    if conn.status() == TransactionStatus::Idle {
                        conn.set_isolation(IsolationLevel::ReadCommitted)?;
                    }
                    debug!(attempt, "checked out connection");
                    return Ok(PoolConnection { inner: conn });
                }
                Err(err) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(RawlError::Timeout(format!(
                            "deadline expired waiting for a connection: {err}"
                        )));
                    }
                    if attempt >= self.config.connect_retries {
                        error!(attempts = attempt + 1, error = %err, "connection checkout failed");
                        return Err(err.into());
                    }
                    attempt += 1;
                    warn!(attempt, error = %err, "connection checkout failed, retrying");
                    thread::sleep(self.config.retry_backoff);
                }
            }
        }
    }

    /// Size of the pool for `dsn`, if one has been created.
    #[must_use]
    pub fn stats(&self, dsn: &str) -> Option<PoolStats> {
        self.lock().get(dsn).map(|pool| {
            let state = pool.state();
            PoolStats {
                connections: state.connections,
                idle: state.idle_connections,
            }
        })
    }

    /// Backend a DSN resolves to, without opening anything.
    ///
    /// # Errors
    /// Returns `RawlError::ConfigError` for an unrecognized DSN.
    pub fn database_type(dsn: &str) -> Result<DatabaseType, RawlError> {
        DatabaseType::from_dsn(dsn)
    }

    /// Forget the pool for `dsn`. Idle connections close once checked-out ones return.
    pub fn close(&self, dsn: &str) -> bool {
        let removed = self.lock().remove(dsn).is_some();
        if removed {
            info!("closed connection pool");
        }
        removed
    }
}

/// A checked-out connection. Dropping it returns the connection to its pool.
#[derive(Debug)]
pub struct PoolConnection {
    inner: PooledConnection<ConnectionManager>,
}

impl Deref for PoolConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.inner
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.inner
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if self.inner.status().is_open() {
            warn!("rolling back uncommitted work before release");
            // a failed rollback marks the connection broken; r2d2 then discards it
            let _ = self.inner.rollback();
        }
    }
}
