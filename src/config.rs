use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RawlError;

/// Minimum number of connections a pool keeps warm.
pub const POOL_MIN_CONN: u32 = 1;
/// Maximum number of connections a pool will open for one DSN.
pub const POOL_MAX_CONN: u32 = 25;

/// Options for every pool created by a [`PoolRegistry`](crate::pool::PoolRegistry).
///
/// ```rust
/// use std::time::Duration;
/// use rawl::PoolConfig;
///
/// let config = PoolConfig::default()
///     .with_max_connections(4)
///     .with_acquire_timeout(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    /// How long a caller blocks on an exhausted pool before giving up.
    pub acquire_timeout: Duration,
    /// Extra attempts made when checkout fails with a connectivity error.
    pub connect_retries: u32,
    pub retry_backoff: Duration,
    pub sqlite_busy_timeout: Duration,
    pub test_on_checkout: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: POOL_MIN_CONN,
            max_connections: POOL_MAX_CONN,
            acquire_timeout: Duration::from_secs(30),
            connect_retries: 0,
            retry_backoff: Duration::from_millis(100),
            sqlite_busy_timeout: Duration::from_secs(5),
            test_on_checkout: false,
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `RAWL_POOL_MIN`, `RAWL_POOL_MAX`,
    /// `RAWL_ACQUIRE_TIMEOUT_MS` and `RAWL_CONNECT_RETRIES` when set.
    ///
    /// # Errors
    /// Returns `RawlError::ConfigError` if a variable is set but unparsable, or the
    /// resulting configuration fails [`PoolConfig::validate`].
    pub fn from_env() -> Result<Self, RawlError> {
        let mut config = Self::default();
        if let Some(min) = env_var::<u32>("RAWL_POOL_MIN")? {
            config.min_connections = min;
        }
        if let Some(max) = env_var::<u32>("RAWL_POOL_MAX")? {
            config.max_connections = max;
        }
        if let Some(ms) = env_var::<u64>("RAWL_ACQUIRE_TIMEOUT_MS")? {
            config.acquire_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = env_var::<u32>("RAWL_CONNECT_RETRIES")? {
            config.connect_retries = retries;
        }
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    #[must_use]
    pub fn with_connect_retries(mut self, connect_retries: u32, retry_backoff: Duration) -> Self {
        self.connect_retries = connect_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    #[must_use]
    pub fn with_sqlite_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.sqlite_busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn with_test_on_checkout(mut self, test_on_checkout: bool) -> Self {
        self.test_on_checkout = test_on_checkout;
        self
    }

    /// # Errors
    /// Returns `RawlError::ConfigError` for a zero-sized pool, `min > max` or a zero
    /// acquire timeout.
    pub fn validate(&self) -> Result<(), RawlError> {
        if self.acquire_timeout.is_zero() {
            return Err(RawlError::ConfigError(
                "acquire_timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(RawlError::ConfigError(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(RawlError::ConfigError(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>, RawlError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            RawlError::ConfigError(format!("{name} has an invalid value: {raw:?}"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pool_constants() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let config = PoolConfig::default()
            .with_min_connections(5)
            .with_max_connections(2);
        assert!(matches!(config.validate(), Err(RawlError::ConfigError(_))));
        assert!(PoolConfig::default().with_max_connections(0).validate().is_err());
    }
}
