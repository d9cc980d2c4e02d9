//! Error type shared by the resolver, the aggregator and the agent layer.

use crate::metrics::Decoder;

/// Failure of a single metric or discovery request.
///
/// Every variant is terminal for the request that produced it; nothing in
/// this crate retries.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Key is not in the template table.
    UnknownMetric(String),
    /// Key needs a table name but none was given.
    MissingRequiredParameter { key: String },
    /// Database-wide form was requested for a per-object-only field.
    InvalidAggregation { key: String },
    /// Connection provider failed or reported a non-success status.
    QueryExecution(String),
    /// Catalog row width does not match the discovery field tags.
    SchemaMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// Scalar text could not be parsed under the declared decoder.
    Decode { decoder: Decoder, value: String },
    /// Agent item key could not be parsed.
    InvalidItemKey(String),
}

impl MetricError {
    /// Stable name of the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricError::UnknownMetric(_) => "UnknownMetric",
            MetricError::MissingRequiredParameter { .. } => "MissingRequiredParameter",
            MetricError::InvalidAggregation { .. } => "InvalidAggregation",
            MetricError::QueryExecution(_) => "QueryExecutionError",
            MetricError::SchemaMismatch { .. } => "SchemaMismatch",
            MetricError::Decode { .. } => "DecodeError",
            MetricError::InvalidItemKey(_) => "InvalidItemKey",
        }
    }
}

impl std::fmt::Display for MetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricError::UnknownMetric(key) => write!(f, "unsupported item key: {}", key),
            MetricError::MissingRequiredParameter { key } => {
                write!(f, "{}: table name parameter is required", key)
            }
            MetricError::InvalidAggregation { key } => {
                write!(f, "{}: cannot aggregate this field, specify a table", key)
            }
            MetricError::QueryExecution(msg) => write!(f, "PostgreSQL query error: {}", msg),
            MetricError::SchemaMismatch {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {} has {} columns, expected {}",
                row, found, expected
            ),
            MetricError::Decode { decoder, value } => {
                write!(f, "cannot decode {:?} as {}", value, decoder)
            }
            MetricError::InvalidItemKey(msg) => write!(f, "invalid item key: {}", msg),
        }
    }
}

impl std::error::Error for MetricError {}
