use std::time::Duration;

use r2d2::{HandleError, ManageConnection};
use tracing::error;

use super::connection::{Backend, Connection};
use crate::error::RawlError;
use crate::types::DatabaseType;

/// r2d2 manager that opens [`Connection`]s for one DSN.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionManager {
    dsn: String,
    db_type: DatabaseType,
    #[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
    sqlite_busy_timeout: Duration,
}

impl ConnectionManager {
    pub(crate) fn new(dsn: &str, sqlite_busy_timeout: Duration) -> Result<Self, RawlError> {
        Ok(ConnectionManager {
            dsn: dsn.to_string(),
            db_type: DatabaseType::from_dsn(dsn)?,
            sqlite_busy_timeout,
        })
    }

    pub(crate) fn database_type(&self) -> DatabaseType {
        self.db_type
    }
}

impl ManageConnection for ConnectionManager {
    type Connection = Connection;
    type Error = RawlError;

    fn connect(&self) -> Result<Connection, RawlError> {
        let backend = match self.db_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Backend::Postgres(crate::postgres::connect(&self.dsn)?),
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {
                Backend::Sqlite(crate::sqlite::open(&self.dsn, self.sqlite_busy_timeout)?)
            }
        };
        Ok(Connection::new(backend))
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), RawlError> {
        conn.ping()
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        conn.is_broken()
    }
}

/// Routes r2d2's background connection errors into tracing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TracingErrorHandler;

impl HandleError<RawlError> for TracingErrorHandler {
    fn handle_error(&self, err: RawlError) {
        error!(error = %err, "connection pool error");
    }
}
