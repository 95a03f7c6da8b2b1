// PostgreSQL backend
//
// - connect: DSN parsing and client setup
// - query: statement execution and value extraction

mod query;

pub(crate) use query::run;

use ::postgres::{Client, Config, NoTls};
use tracing::debug;

use crate::error::RawlError;

/// Open a blocking client for a `postgresql://` URL or a `key=value` DSN.
///
/// # Errors
/// Returns `RawlError::ConfigError` for an unparsable DSN and
/// `RawlError::ConnectionError` if the server cannot be reached.
pub(crate) fn connect(dsn: &str) -> Result<Client, RawlError> {
    let config: Config = dsn
        .parse()
        .map_err(|e| RawlError::ConfigError(format!("invalid postgres DSN: {e}")))?;
    let client = config
        .connect(NoTls)
        .map_err(|e| RawlError::ConnectionError(format!("failed to connect to postgres: {e}")))?;
    debug!("opened postgres connection");
    Ok(client)
}
