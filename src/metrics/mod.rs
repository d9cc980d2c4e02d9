//! Metric resolution and discovery aggregation.
//!
//! ```text
//!   item key ──► templates::resolve ──► Statement + Decoder ──► provider ──► decode
//!            └─► discovery::resolve_discovery ──► Statement + tags ──► provider ──► aggregate
//! ```
//!
//! Nothing here performs I/O. The template tables are built once and never
//! mutated, so concurrent requests share them freely.

mod decode;
mod discovery;
mod queries;
mod templates;

pub use decode::{Decoder, ScalarValue, decode};
pub use discovery::{
    CHILD_DISCOVERY_TAGS, CatalogRow, DiscoveryPayload, DiscoveryRecord, DiscoveryTemplate,
    ResolvedDiscovery, TABLE_DISCOVERY_TAGS, aggregate, discovery_templates, resolve_discovery,
};
pub use templates::{
    AggregateForm, MetricTemplate, ResolvedQuery, metric_templates, normalize_key, resolve,
};

/// SQL text plus the values bound to its `$n` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Renders the statement with parameters inlined as quoted literals.
    ///
    /// For logs and `pgzbx sql` only; execution always binds `params`.
    pub fn literal_sql(&self) -> String {
        let mut sql = self.sql.clone();
        // Highest index first so `$1` never matches the prefix of `$10`.
        for (idx, param) in self.params.iter().enumerate().rev() {
            sql = sql.replace(&format!("${}", idx + 1), &quote_literal(param));
        }
        sql
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A metric request after item-key parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRequest {
    pub key: String,
    /// Target table name. `None` when absent or empty.
    pub object: Option<String>,
}

impl MetricRequest {
    pub fn new(key: impl Into<String>, object: Option<&str>) -> Self {
        Self {
            key: key.into(),
            object: object.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    /// True when no table is named and the request covers the whole database.
    pub fn is_database_scoped(&self) -> bool {
        self.object.is_none()
    }
}
