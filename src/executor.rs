//! Statement execution against a pooled or transaction-held connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::assembly::CompiledStatement;
use crate::cursor::Cursor;
use crate::error::RawlError;
use crate::pool::{Connection, PoolRegistry};
use crate::results::ResultRow;
use crate::transaction::TransactionState;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// Per-call execution options.
///
/// ```rust
/// use std::time::Duration;
/// use rawl::ExecOptions;
///
/// let opts = ExecOptions::new()
///     .commit(false)
///     .columns(["rawl_id", "name"])
///     .with_timeout(Duration::from_secs(2));
/// assert_eq!(opts.commit_flag(), Some(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    commit: Option<bool>,
    columns: Option<Vec<String>>,
    deadline: Option<Instant>,
}

impl ExecOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit right after the statement. Unset means "commit unless a transaction is open".
    #[must_use]
    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = Some(commit);
        self
    }

    /// Working columns used to name the values of each returned row.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now; a timeout too large to represent sets none.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.deadline(deadline),
            None => self,
        }
    }

    #[must_use]
    pub fn commit_flag(&self) -> Option<bool> {
        self.commit
    }

    #[must_use]
    pub fn working_columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    #[must_use]
    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Rows (if any) and the statement's row count.
#[derive(Debug)]
pub(crate) struct Executed {
    pub rows: Vec<ResultRow>,
    pub rowcount: i64,
}

/// Where a statement runs.
pub(crate) struct Target<'a> {
    pub registry: &'a PoolRegistry,
    pub dsn: &'a str,
    pub transaction: &'a mut TransactionState,
}

/// Run `statement` on the open transaction's connection, or on a freshly acquired one.
///
/// A non-transactional connection and cursor are released on every exit path; a
/// transaction's are kept for the next statement.
pub(crate) fn execute(
    target: Target<'_>,
    statement: &CompiledStatement,
    default_columns: &[String],
    opts: &ExecOptions,
) -> Result<Executed, RawlError> {
    let query_id = NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed);
    let commit = opts.commit.unwrap_or(!target.transaction.is_open());
    let working: Arc<Vec<String>> = Arc::new(
        opts.columns
            .clone()
            .unwrap_or_else(|| default_columns.to_vec()),
    );

    if let Some(tx) = target.transaction.current() {
        let (conn, cursor) = tx.parts();
        return run_on(query_id, conn, cursor, statement, working, commit, opts.deadline);
    }

    let mut conn = target.registry.acquire(target.dsn, opts.deadline)?;
    let mut cursor = Cursor::new();
    let result = run_on(
        query_id,
        &mut conn,
        &mut cursor,
        statement,
        working,
        commit,
        opts.deadline,
    );
    cursor.close();
    debug!(query_id, "releasing connection");
    result
}

fn run_on(
    query_id: u64,
    conn: &mut Connection,
    cursor: &mut Cursor,
    statement: &CompiledStatement,
    working: Arc<Vec<String>>,
    commit: bool,
    deadline: Option<Instant>,
) -> Result<Executed, RawlError> {
    debug!(query_id, sql = %statement, "executing");
    let outcome = conn.run(statement.as_str(), deadline).map_err(|err| {
        error!(query_id, sql = %statement, error = %err, "statement failed");
        err
    })?;
    cursor.load(outcome);

    if commit {
        debug!(query_id, "autocommit");
        conn.commit()?;
    }

    let rowcount = cursor.rowcount();
    debug!(query_id, rowcount, "executed");

    let rows = if rowcount > 0 && cursor.description().is_some() {
        cursor
            .fetch_all()
            .into_iter()
            .map(|values| ResultRow::from_values(Arc::clone(&working), values))
            .collect()
    } else {
        Vec::new()
    };
    Ok(Executed { rows, rowcount })
}
