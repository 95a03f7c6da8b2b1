// SQLite backend
//
// - open: DSN to path resolution and per-connection pragmas
// - query: statement execution and value extraction

mod query;

pub(crate) use query::run;

use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::RawlError;

/// Strip the `sqlite://` / `sqlite:` scheme; `file:` URIs and bare paths pass through.
pub(crate) fn database_path(dsn: &str) -> &str {
    let dsn = dsn.trim();
    dsn.strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn)
}

/// Open a connection with WAL journaling and the configured busy timeout.
///
/// # Errors
/// Returns `RawlError::ConnectionError` if the database file cannot be opened.
pub(crate) fn open(dsn: &str, busy_timeout: Duration) -> Result<Connection, RawlError> {
    let path = database_path(dsn);
    let conn = Connection::open(path).map_err(|e| {
        RawlError::ConnectionError(format!("failed to open sqlite database {path:?}: {e}"))
    })?;
    conn.busy_timeout(busy_timeout)?;

    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        warn!(path, mode = %mode, "sqlite database is not in WAL mode");
    }
    debug!(path, "opened sqlite connection");
    Ok(conn)
}
