use std::fmt;
use std::time::Instant;

use tracing::warn;

use crate::cursor::Outcome;
use crate::error::RawlError;
use crate::types::{DatabaseType, IsolationLevel, TransactionStatus};

/// Driver handle behind a pooled [`Connection`].
pub(crate) enum Backend {
    #[cfg(feature = "postgres")]
    Postgres(postgres::Client),
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Connection),
}

/// A database connection that tracks its own transaction state.
///
/// Connections are never in autocommit mode: the first statement after `Idle`
/// opens a transaction at the connection's isolation level, and it stays open
/// until [`Connection::commit`] or [`Connection::rollback`].
pub struct Connection {
    backend: Backend,
    status: TransactionStatus,
    isolation: IsolationLevel,
    local_timeout: bool,
    broken: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("database_type", &self.database_type())
            .field("status", &self.status)
            .field("isolation", &self.isolation)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn new(backend: Backend) -> Self {
        Connection {
            backend,
            status: TransactionStatus::Idle,
            isolation: IsolationLevel::default(),
            local_timeout: false,
            broken: false,
        }
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match &self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    #[must_use]
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Isolation level for the next transaction.
    ///
    /// # Errors
    /// Returns `RawlError::TransactionError` while a transaction is open.
    pub fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), RawlError> {
        if self.status.is_open() {
            return Err(RawlError::TransactionError(
                "cannot change isolation level inside an open transaction".to_string(),
            ));
        }
        self.isolation = level;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), RawlError> {
        if self.status.is_open() {
            return Ok(());
        }
        let sql = match &self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(_) => format!("BEGIN ISOLATION LEVEL {}", self.isolation.as_sql()),
            // SQLite transactions are always serializable
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(_) => "BEGIN".to_string(),
        };
        self.control(&sql)?;
        self.status = TransactionStatus::InTransaction;
        Ok(())
    }

    /// Bound the next statement by `deadline`.
    #[cfg_attr(not(feature = "postgres"), allow(unused_variables))]
    fn apply_deadline(&mut self, deadline: Option<Instant>) -> Result<(), RawlError> {
        let remaining_ms = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(RawlError::Timeout(
                        "deadline expired before execution".to_string(),
                    ));
                }
                Some(remaining.as_millis().max(1))
            }
            None if self.local_timeout => None,
            None => return Ok(()),
        };

        match &mut self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(client) => {
                let ms = remaining_ms.unwrap_or(0);
                client.batch_execute(&format!("SET LOCAL statement_timeout = {ms}"))?;
                self.local_timeout = remaining_ms.is_some();
            }
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(_) => {}
        }
        Ok(())
    }

    /// Run one statement inside the current (or a freshly opened) transaction.
    pub(crate) fn run(
        &mut self,
        sql: &str,
        deadline: Option<Instant>,
    ) -> Result<Outcome, RawlError> {
        self.begin()?;
        let result = self.apply_deadline(deadline).and_then(|()| match &mut self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(client) => crate::postgres::run(client, sql),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(conn) => crate::sqlite::run(conn, sql),
        });
        if result.is_err() {
            self.status = TransactionStatus::Failed;
        }
        result
    }

    /// Run several `;`-separated statements inside the current transaction.
    pub(crate) fn run_batch(&mut self, sql: &str) -> Result<(), RawlError> {
        self.begin()?;
        let result = self.control(sql);
        if result.is_err() {
            self.status = TransactionStatus::Failed;
        }
        result
    }

    fn control(&mut self, sql: &str) -> Result<(), RawlError> {
        match &mut self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(client) => client.batch_execute(sql)?,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(conn) => conn.execute_batch(sql)?,
        }
        Ok(())
    }

    /// Commit the open transaction; a no-op when idle.
    ///
    /// A Postgres transaction that hit an error is aborted by the server, and its
    /// `COMMIT` would quietly roll back. It is rolled back here instead and reported
    /// as a `RawlError::TransactionError`. SQLite keeps the work of the statements
    /// that succeeded, so committing after a failure commits those.
    ///
    /// # Errors
    /// Returns `RawlError::TransactionError` for an aborted Postgres transaction, or
    /// the backend error if the commit is rejected; the connection is then left
    /// `Failed` and must be rolled back.
    pub fn commit(&mut self) -> Result<(), RawlError> {
        if !self.status.is_open() {
            return Ok(());
        }
        if self.status == TransactionStatus::Failed {
            let aborted = match &self.backend {
                #[cfg(feature = "postgres")]
                Backend::Postgres(_) => true,
                #[cfg(feature = "sqlite")]
                Backend::Sqlite(_) => false,
            };
            if aborted {
                warn!("commit on an aborted transaction, rolling back");
                self.rollback()?;
                return Err(RawlError::TransactionError(
                    "transaction was aborted by an earlier error and has been rolled back"
                        .to_string(),
                ));
            }
            warn!("committing after a failed statement");
        }
        match self.control("COMMIT") {
            Ok(()) => {
                self.status = TransactionStatus::Idle;
                self.local_timeout = false;
                Ok(())
            }
            Err(err) => {
                self.status = TransactionStatus::Failed;
                Err(err)
            }
        }
    }

    /// Roll back the open transaction; a no-op when idle.
    ///
    /// # Errors
    /// Returns the backend error if the rollback fails. The connection is then
    /// marked broken so the pool discards it instead of reusing it.
    pub fn rollback(&mut self) -> Result<(), RawlError> {
        if !self.status.is_open() {
            return Ok(());
        }
        match self.control("ROLLBACK") {
            Ok(()) => {
                self.status = TransactionStatus::Idle;
                self.local_timeout = false;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "rollback failed, discarding connection");
                self.broken = true;
                Err(err)
            }
        }
    }

    pub(crate) fn ping(&mut self) -> Result<(), RawlError> {
        match &mut self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(client) => {
                client.is_valid(std::time::Duration::from_secs(5))?;
            }
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(conn) => conn.query_row("SELECT 1", [], |_| Ok(()))?,
        }
        Ok(())
    }

    pub(crate) fn is_broken(&self) -> bool {
        if self.broken {
            return true;
        }
        match &self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(client) => client.is_closed(),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(_) => false,
        }
    }
}
