//! Metric template table and query resolution.
//!
//! Each metric key maps to exactly one [`MetricTemplate`]. Resolution is a
//! table lookup followed by a choice between the per-object SQL (table name
//! bound as `$1`) and the database-wide aggregate form.

use std::sync::LazyLock;

use super::decode::Decoder;
use super::queries::{self, FIELD_PLACEHOLDER, OBJECT_PLACEHOLDER};
use super::{MetricRequest, Statement};
use crate::error::MetricError;

/// Optional key prefix used by agent item keys (`pg.table.size`).
const KEY_PREFIX: &str = "pg.";

/// What a metric does when no table is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateForm {
    /// Database-wide query with no parameters.
    Sql(String),
    /// Only meaningful for one table (inheritance family).
    RequiresObject,
    /// Field cannot be summed (timestamps).
    Forbidden,
}

/// Query template for one metric key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTemplate {
    pub key: String,
    pub per_object_sql: String,
    pub aggregate: AggregateForm,
    pub decoder: Decoder,
}

impl MetricTemplate {
    /// Template with fixed SQL text.
    ///
    /// # Panics
    /// If `per_object_sql` does not contain exactly one `$1`, or the
    /// aggregate SQL contains any.
    fn fixed(key: &str, per_object_sql: &str, aggregate: AggregateForm, decoder: Decoder) -> Self {
        assert_eq!(
            per_object_sql.matches(OBJECT_PLACEHOLDER).count(),
            1,
            "{key}: per-object template must bind the table name exactly once"
        );
        if let AggregateForm::Sql(sql) = &aggregate {
            assert!(
                !sql.contains(OBJECT_PLACEHOLDER),
                "{key}: aggregate template must not bind a table name"
            );
        }
        Self {
            key: key.to_string(),
            per_object_sql: per_object_sql.to_string(),
            aggregate,
            decoder,
        }
    }

    /// Template over a statistics-view column: `table.<field>`.
    ///
    /// `aggregate_sql` is `None` for fields without a database-wide form.
    fn stat_field(
        field: &str,
        per_object_sql: &str,
        aggregate_sql: Option<&str>,
        decoder: Decoder,
    ) -> Self {
        let per_object = substitute_field(per_object_sql, field);
        let aggregate = match aggregate_sql {
            Some(sql) => AggregateForm::Sql(substitute_field(sql, field)),
            None => AggregateForm::Forbidden,
        };
        Self::fixed(&format!("table.{field}"), &per_object, aggregate, decoder)
    }

    /// Picks the SQL for `object`.
    fn bind(&self, object: Option<&str>) -> Result<Statement, MetricError> {
        if let Some(name) = object {
            return Ok(Statement::new(
                self.per_object_sql.clone(),
                vec![name.to_string()],
            ));
        }
        match &self.aggregate {
            AggregateForm::Sql(sql) => Ok(Statement::new(sql.clone(), Vec::new())),
            AggregateForm::RequiresObject => Err(MetricError::MissingRequiredParameter {
                key: self.key.clone(),
            }),
            AggregateForm::Forbidden => Err(MetricError::InvalidAggregation {
                key: self.key.clone(),
            }),
        }
    }
}

/// Replaces the single `{field}` point, which must precede any `$1`.
///
/// # Panics
/// On arity mismatch. Templates are fixed at build time, so this is a
/// programming error.
fn substitute_field(template: &str, field: &str) -> String {
    assert_eq!(
        template.matches(FIELD_PLACEHOLDER).count(),
        1,
        "field template must have exactly one field placeholder: {template}"
    );
    if let (Some(f), Some(o)) = (
        template.find(FIELD_PLACEHOLDER),
        template.find(OBJECT_PLACEHOLDER),
    ) {
        assert!(f < o, "field placeholder must precede the table name: {template}");
    }
    template.replace(FIELD_PLACEHOLDER, field)
}

/// Resolved metric query: what to run and how to read the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub statement: Statement,
    pub decoder: Decoder,
}

static METRIC_TEMPLATES: LazyLock<Vec<MetricTemplate>> = LazyLock::new(build_metric_templates);

fn build_metric_templates() -> Vec<MetricTemplate> {
    let mut table = Vec::new();

    for field in queries::STAT_COUNTER_FIELDS {
        table.push(MetricTemplate::stat_field(
            field,
            queries::STAT_FIELD,
            Some(queries::STAT_FIELD_SUM),
            Decoder::Integer,
        ));
    }
    for field in queries::STAT_TIMESTAMP_FIELDS {
        table.push(MetricTemplate::stat_field(
            field,
            queries::STAT_FIELD,
            None,
            Decoder::String,
        ));
    }
    for field in queries::STATIO_FIELDS {
        table.push(MetricTemplate::stat_field(
            field,
            queries::STATIO_FIELD,
            Some(queries::STATIO_FIELD_SUM),
            Decoder::Integer,
        ));
    }

    table.push(MetricTemplate::fixed(
        "table.size",
        queries::TABLE_SIZE,
        AggregateForm::Sql(queries::TABLE_SIZE_SUM.to_string()),
        Decoder::Integer,
    ));
    table.push(MetricTemplate::fixed(
        "table.rows",
        queries::TABLE_ROWS,
        AggregateForm::Sql(queries::TABLE_ROWS_SUM.to_string()),
        Decoder::Integer,
    ));
    table.push(MetricTemplate::fixed(
        "table.children",
        queries::CHILD_COUNT,
        AggregateForm::RequiresObject,
        Decoder::Integer,
    ));
    table.push(MetricTemplate::fixed(
        "table.children.size",
        queries::CHILDREN_SIZE,
        AggregateForm::RequiresObject,
        Decoder::Integer,
    ));
    table.push(MetricTemplate::fixed(
        "table.children.tuples",
        queries::CHILDREN_TUPLES,
        AggregateForm::RequiresObject,
        Decoder::Integer,
    ));

    for (i, t) in table.iter().enumerate() {
        assert!(
            table[..i].iter().all(|prev| prev.key != t.key),
            "duplicate metric key {}",
            t.key
        );
    }
    table
}

/// All metric templates in declaration order.
pub fn metric_templates() -> &'static [MetricTemplate] {
    &METRIC_TEMPLATES
}

/// Strips the optional `pg.` agent prefix.
pub fn normalize_key(key: &str) -> &str {
    key.strip_prefix(KEY_PREFIX).unwrap_or(key)
}

/// Resolves `key` and the optional table name into SQL and a decoder.
///
/// An empty `object` counts as absent.
pub fn resolve(key: &str, object: Option<&str>) -> Result<ResolvedQuery, MetricError> {
    MetricRequest::new(key, object).resolve()
}

impl MetricRequest {
    pub fn resolve(&self) -> Result<ResolvedQuery, MetricError> {
        let key = normalize_key(&self.key);
        let template = metric_templates()
            .iter()
            .find(|t| t.key == key)
            .ok_or_else(|| MetricError::UnknownMetric(self.key.clone()))?;

        let statement = template.bind(self.object.as_deref())?;
        Ok(ResolvedQuery {
            statement,
            decoder: template.decoder,
        })
    }
}
