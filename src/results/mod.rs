//! Fetched rows.

mod row;

pub use row::{ResultRow, RowKey};
