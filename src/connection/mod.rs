//! Connection provider: runs a [`Statement`] and returns a text matrix.
//!
//! The metric core never talks to PostgreSQL directly. It hands a statement
//! to a [`ConnectionProvider`] and reads back a [`TabularResult`]:
//!
//! - [`PostgresProvider`] — real server via the `postgres` crate
//! - [`mock::MockProvider`] — canned results for tests

pub mod mock;
mod params;
mod pg;

pub use self::params::{CONNECTION_PARAM_COUNT, ConnectionParams, SslMode};
pub use self::pg::{PostgresProvider, format_postgres_error};

use crate::metrics::{CatalogRow, Statement};

/// Error type for connection setup and transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Environment variable not set.
    EnvNotSet(String),
    /// Invalid connection parameter.
    InvalidParam(String),
    /// Connection failed.
    Connect(String),
    /// TLS setup failed.
    Tls(String),
    /// Query could not be sent or the connection dropped.
    Query(String),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::EnvNotSet(var) => write!(f, "PostgreSQL: {} not set", var),
            ConnectionError::InvalidParam(msg) => write!(f, "PostgreSQL: {}", msg),
            ConnectionError::Connect(msg) => write!(f, "PostgreSQL: {}", msg),
            ConnectionError::Tls(msg) => write!(f, "PostgreSQL TLS: {}", msg),
            ConnectionError::Query(msg) => write!(f, "PostgreSQL query error: {}", msg),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Outcome reported by the server for one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStatus {
    TuplesOk,
    Failed(String),
}

/// Rows of text values plus the server status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularResult {
    pub rows: Vec<CatalogRow>,
    pub status: ResultStatus,
}

impl TabularResult {
    pub fn ok(rows: Vec<CatalogRow>) -> Self {
        Self {
            rows,
            status: ResultStatus::TuplesOk,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            status: ResultStatus::Failed(message.into()),
        }
    }

    /// Server error message, `None` on success.
    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            ResultStatus::TuplesOk => None,
            ResultStatus::Failed(msg) => Some(msg),
        }
    }

    /// First column of the first row, if any.
    pub fn first_cell(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }
}

/// Executes statements. Implementations own all I/O, timeouts and
/// cancellation; callers never retry.
pub trait ConnectionProvider {
    fn execute(&mut self, statement: &Statement) -> Result<TabularResult, ConnectionError>;
}
