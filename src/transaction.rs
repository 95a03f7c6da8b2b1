use std::time::Instant;

use tracing::{debug, warn};

use crate::cursor::Cursor;
use crate::error::RawlError;
use crate::pool::{PoolConnection, PoolRegistry};
use crate::types::TransactionStatus;

/// A connection held across statements, plus the cursor reused by them.
#[derive(Debug)]
pub(crate) struct OpenTransaction {
    pub(crate) conn: PoolConnection,
    cursor: Option<Cursor>,
    started_at: Instant,
}

impl OpenTransaction {
    /// The connection and the transaction's cursor, creating the cursor on first use.
    pub(crate) fn parts(&mut self) -> (&mut PoolConnection, &mut Cursor) {
        let cursor = self.cursor.get_or_insert_with(Cursor::new);
        (&mut self.conn, cursor)
    }

    fn finish(mut self, outcome: &'static str) -> PoolConnection {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.close();
        }
        debug!(
            outcome,
            elapsed_ms = self.started_at.elapsed().as_millis(),
            "transaction finished"
        );
        self.conn
    }
}

/// Closed or open; a model owns exactly one.
#[derive(Debug, Default)]
pub struct TransactionState {
    open: Option<OpenTransaction>,
}

impl TransactionState {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Status of the held connection; `Idle` when closed.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.open
            .as_ref()
            .map_or(TransactionStatus::Idle, |tx| tx.conn.status())
    }

    pub(crate) fn current(&mut self) -> Option<&mut OpenTransaction> {
        self.open.as_mut()
    }

    /// Check out a connection and hold it until commit or rollback.
    ///
    /// # Errors
    /// Returns `RawlError::TransactionError` if a transaction is already open, or the
    /// pool's error if no connection can be acquired.
    pub(crate) fn start(&mut self, registry: &PoolRegistry, dsn: &str) -> Result<(), RawlError> {
        if self.open.is_some() {
            return Err(RawlError::TransactionError(
                "a transaction is already open on this model".to_string(),
            ));
        }
        let conn = registry.acquire(dsn, None)?;
        debug!("transaction started");
        self.open = Some(OpenTransaction {
            conn,
            cursor: None,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Commit and release the held connection. Closed is a no-op.
    ///
    /// # Errors
    /// Returns the backend error if the commit fails. The state is closed either way;
    /// the connection is rolled back on release.
    pub(crate) fn commit(&mut self) -> Result<(), RawlError> {
        let Some(tx) = self.open.take() else {
            warn!("cannot commit, no open transaction");
            return Ok(());
        };
        let mut conn = tx.finish("commit");
        conn.commit()
    }

    /// Roll back and release the held connection. Closed is a no-op.
    ///
    /// # Errors
    /// Returns the backend error if the rollback fails; the connection is then
    /// discarded rather than pooled.
    pub(crate) fn rollback(&mut self) -> Result<(), RawlError> {
        let Some(tx) = self.open.take() else {
            warn!("cannot rollback, no open transaction");
            return Ok(());
        };
        let mut conn = tx.finish("rollback");
        conn.rollback()
    }
}
