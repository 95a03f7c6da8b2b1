use thiserror::Error;

#[derive(Debug, Error)]
pub enum RawlError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Unknown index value {0}")]
    IndexOutOfRange(String),

    #[error("{0} is not available")]
    ColumnNotFound(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Deadline exceeded: {0}")]
    Timeout(String),
}

/// Coarse classification of a [`RawlError`].
///
/// Callers that only care about *what kind* of failure happened (retry on
/// connectivity, report addressing bugs, surface database errors) match on
/// this instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid model construction or malformed statement template.
    Configuration,
    /// An insert map referenced a column outside the model's column set.
    Validation,
    /// Pool exhaustion, connection establishment failure or an expired deadline.
    Connectivity,
    /// The database rejected a statement.
    Execution,
    /// A result row was addressed with an unknown name or index.
    Addressing,
}

impl RawlError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            #[cfg(feature = "postgres")]
            RawlError::PostgresError(_) => ErrorKind::Execution,
            #[cfg(feature = "sqlite")]
            RawlError::SqliteError(_) => ErrorKind::Execution,
            RawlError::TransactionError(_) => ErrorKind::Execution,
            RawlError::ConfigError(_)
            | RawlError::TemplateError(_)
            | RawlError::ParameterError(_) => ErrorKind::Configuration,
            RawlError::ValidationError(_) => ErrorKind::Validation,
            RawlError::ConnectionError(_) | RawlError::Timeout(_) => ErrorKind::Connectivity,
            RawlError::IndexOutOfRange(_) | RawlError::ColumnNotFound(_) => ErrorKind::Addressing,
        }
    }

    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        self.kind() == ErrorKind::Connectivity
    }
}

impl From<r2d2::Error> for RawlError {
    fn from(err: r2d2::Error) -> Self {
        RawlError::ConnectionError(format!("pool checkout failed: {err}"))
    }
}

pub type Result<T, E = RawlError> = std::result::Result<T, E>;
