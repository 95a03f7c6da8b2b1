//! Convenient imports for common functionality.

pub use crate::assembly::{CompiledStatement, assemble_simple, assemble_with_columns};
pub use crate::columns::{ColumnEnumeration, ColumnSpec};
pub use crate::config::PoolConfig;
pub use crate::error::{ErrorKind, RawlError};
pub use crate::executor::ExecOptions;
pub use crate::model::Model;
pub use crate::pool::PoolRegistry;
pub use crate::results::{ResultRow, RowKey};
pub use crate::types::{DatabaseType, RowValues, TransactionStatus};
