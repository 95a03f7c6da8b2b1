use std::sync::Arc;

use crate::types::RowValues;

/// What a backend reports after running one statement.
#[derive(Debug, Clone, Default)]
pub(crate) struct Outcome {
    /// Output column names; `None` for statements that produce no result columns.
    pub columns: Option<Arc<Vec<String>>>,
    pub rows: Vec<Vec<RowValues>>,
    /// Rows returned for queries, rows affected for everything else.
    pub rowcount: i64,
}

impl Outcome {
    pub(crate) fn affected(count: u64) -> Self {
        Outcome {
            columns: None,
            rows: Vec::new(),
            rowcount: i64::try_from(count).unwrap_or(i64::MAX),
        }
    }

    pub(crate) fn fetched(columns: Vec<String>, rows: Vec<Vec<RowValues>>) -> Self {
        let rowcount = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        Outcome {
            columns: Some(Arc::new(columns)),
            rows,
            rowcount,
        }
    }
}

/// Buffered result of the most recent statement on a connection.
///
/// `rowcount` is -1 until something has been executed. A cursor that belongs to an
/// open transaction is reused for every statement in it.
#[derive(Debug)]
pub struct Cursor {
    rowcount: i64,
    description: Option<Arc<Vec<String>>>,
    rows: Vec<Vec<RowValues>>,
    closed: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    #[must_use]
    pub fn new() -> Self {
        Cursor {
            rowcount: -1,
            description: None,
            rows: Vec::new(),
            closed: false,
        }
    }

    pub(crate) fn load(&mut self, outcome: Outcome) {
        self.rowcount = outcome.rowcount;
        self.description = outcome.columns;
        self.rows = outcome.rows;
    }

    #[must_use]
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    /// Output column names of the last statement.
    #[must_use]
    pub fn description(&self) -> Option<&Arc<Vec<String>>> {
        self.description.as_ref()
    }

    /// Drain the buffered rows.
    pub fn fetch_all(&mut self) -> Vec<Vec<RowValues>> {
        std::mem::take(&mut self.rows)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.rows.clear();
        self.closed = true;
    }
}
