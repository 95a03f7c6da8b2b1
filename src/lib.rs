//! Raw SQL data access over pooled, blocking connections.
//!
//! A [`Model`] binds a table, its ordered columns and its primary key to a DSN.
//! Statements are written as SQL templates; identifiers and values are quoted on
//! their way in, rows come back as [`ResultRow`]s addressable by name or position.
//! Connections come from a [`PoolRegistry`] shared between models.

mod assembly;
mod columns;
pub mod config;
mod cursor;
pub mod error;
mod executor;
pub mod json;
mod model;
pub mod pool;
pub mod prelude;
pub mod quoting;
pub mod results;
mod transaction;
pub mod types;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use assembly::{CompiledStatement, assemble_simple, assemble_with_columns};
pub use columns::{ColumnEnumeration, ColumnSet, ColumnSpec, TableDescriptor};
pub use config::PoolConfig;
pub use cursor::Cursor;
pub use error::{ErrorKind, RawlError};
pub use executor::ExecOptions;
pub use model::Model;
pub use pool::{PoolConnection, PoolRegistry, PoolStats};
pub use results::{ResultRow, RowKey};
pub use transaction::TransactionState;
pub use types::{DatabaseType, IsolationLevel, RowValues, TransactionStatus};
