//! Discovery: catalog rows to `{"data":[{"{#TAG}":"value"}]}` documents.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::queries;
use super::templates::normalize_key;
use super::{MetricRequest, Statement};
use crate::error::MetricError;

/// One catalog result row. Column order is fixed by the query; `None` is SQL
/// NULL.
pub type CatalogRow = Vec<Option<String>>;

/// Field tags for `table.discovery`, in query column order.
pub const TABLE_DISCOVERY_TAGS: &[&str] = &[
    "OID",
    "DATABASE",
    "SCHEMA",
    "TABLESPACE",
    "TABLE",
    "TYPE",
    "OWNER",
    "PERSISTENCE",
    "ISSUBCLASS",
];

/// Field tags for `table.children.discovery`, in query column order.
pub const CHILD_DISCOVERY_TAGS: &[&str] = &["OID", "TABLE", "SCHEMA"];

/// Discovery query and the tags its columns map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryTemplate {
    pub key: &'static str,
    pub sql: &'static str,
    pub tags: &'static [&'static str],
    /// Parent table name is bound as `$1` and must be given.
    pub requires_object: bool,
}

const DISCOVERY_TEMPLATES: &[DiscoveryTemplate] = &[
    DiscoveryTemplate {
        key: "table.discovery",
        sql: queries::DISCOVER_TABLES,
        tags: TABLE_DISCOVERY_TAGS,
        requires_object: false,
    },
    DiscoveryTemplate {
        key: "table.children.discovery",
        sql: queries::DISCOVER_TABLE_CHILDREN,
        tags: CHILD_DISCOVERY_TAGS,
        requires_object: true,
    },
];

/// All discovery templates.
pub fn discovery_templates() -> &'static [DiscoveryTemplate] {
    DISCOVERY_TEMPLATES
}

/// Resolved discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDiscovery {
    pub statement: Statement,
    pub tags: &'static [&'static str],
}

/// Resolves a discovery key. `table.discovery` ignores `object`.
pub fn resolve_discovery(
    key: &str,
    object: Option<&str>,
) -> Result<ResolvedDiscovery, MetricError> {
    let request = MetricRequest::new(key, object);
    let template = DISCOVERY_TEMPLATES
        .iter()
        .find(|t| t.key == normalize_key(&request.key))
        .ok_or_else(|| MetricError::UnknownMetric(request.key.clone()))?;

    if template.requires_object && request.is_database_scoped() {
        return Err(MetricError::MissingRequiredParameter {
            key: request.key.clone(),
        });
    }
    let params = if template.requires_object {
        request.object.into_iter().collect()
    } else {
        Vec::new()
    };

    Ok(ResolvedDiscovery {
        statement: Statement::new(template.sql, params),
        tags: template.tags,
    })
}

/// One discovered entity: tag → value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryRecord {
    fields: Vec<(String, String)>,
}

impl DiscoveryRecord {
    /// Value for `tag` (without the `{#` `}` delimiters).
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }
}

/// Serializes as `{"{#TAG}": "value", ...}` in column order.
impl Serialize for DiscoveryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (tag, value) in &self.fields {
            map.serialize_entry(&format!("{{#{}}}", tag), value)?;
        }
        map.end()
    }
}

/// Ordered discovery records, in source row order.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct DiscoveryPayload {
    #[serde(rename = "data")]
    pub records: Vec<DiscoveryRecord>,
}

impl std::fmt::Display for DiscoveryPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

/// Zips `tags` positionally onto every row.
///
/// Rows keep their source order. A row whose width differs from `tags`
/// fails the whole call with `SchemaMismatch`. NULL becomes `""`.
pub fn aggregate(rows: &[CatalogRow], tags: &[&str]) -> Result<DiscoveryPayload, MetricError> {
    let mut records = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        if row.len() != tags.len() {
            return Err(MetricError::SchemaMismatch {
                row: idx,
                expected: tags.len(),
                found: row.len(),
            });
        }
        let fields = tags
            .iter()
            .zip(row)
            .map(|(tag, value)| (tag.to_string(), value.clone().unwrap_or_default()))
            .collect();
        records.push(DiscoveryRecord { fields });
    }

    Ok(DiscoveryPayload { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    /// Counts the top-level items of a query's SELECT list.
    fn select_width(sql: &str) -> usize {
        let body = sql
            .trim_start()
            .strip_prefix("SELECT")
            .expect("query starts with SELECT");
        let mut depth = 0i32;
        let mut width = 1;
        for (idx, c) in body.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => width += 1,
                _ => {}
            }
            if depth == 0
                && body[idx..].starts_with("FROM")
                && body[..idx].ends_with(char::is_whitespace)
            {
                return width;
            }
        }
        panic!("no top-level FROM in {sql}");
    }

    fn row(values: &[&str]) -> CatalogRow {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn empty_rows_give_empty_payload() {
        let payload = aggregate(&[], TABLE_DISCOVERY_TAGS).unwrap();
        assert!(payload.records.is_empty());
        assert_eq!(payload.to_string(), r#"{"data":[]}"#);
    }

    #[test]
    fn single_row_maps_tags() {
        let payload = aggregate(&[row(&["123", "public", "orders"])], &["OID", "SCHEMA", "TABLE"])
            .unwrap();
        assert_eq!(payload.records.len(), 1);
        let rec = &payload.records[0];
        assert_eq!(rec.get("OID"), Some("123"));
        assert_eq!(rec.get("SCHEMA"), Some("public"));
        assert_eq!(rec.get("TABLE"), Some("orders"));
        assert_eq!(rec.get("DATABASE"), None);
    }

    #[test]
    fn row_order_is_preserved() {
        let rows = vec![
            row(&["3", "zeta", "public"]),
            row(&["1", "alpha", "public"]),
            row(&["2", "mid", "audit"]),
        ];
        let payload = aggregate(&rows, CHILD_DISCOVERY_TAGS).unwrap();
        let tables: Vec<_> = payload
            .records
            .iter()
            .map(|r| r.get("TABLE").unwrap())
            .collect();
        assert_eq!(tables, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn width_mismatch_is_schema_error() {
        let rows = vec![row(&["1", "a", "public"]), row(&["2", "b"])];
        let err = aggregate(&rows, CHILD_DISCOVERY_TAGS).unwrap_err();
        assert_eq!(
            err,
            MetricError::SchemaMismatch {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn null_becomes_empty_string() {
        let rows = vec![vec![Some("7".to_string()), None, Some("public".to_string())]];
        let payload = aggregate(&rows, CHILD_DISCOVERY_TAGS).unwrap();
        assert_eq!(payload.records[0].get("TABLE"), Some(""));
    }

    #[test]
    fn json_wraps_tags_in_macro_delimiters() {
        let payload = aggregate(&[row(&["16384", "orders", "public"])], CHILD_DISCOVERY_TAGS)
            .unwrap();
        let value: Value = serde_json::from_str(&payload.to_string()).unwrap();
        let first = &value["data"][0];
        assert_eq!(first["{#OID}"], "16384");
        assert_eq!(first["{#TABLE}"], "orders");
        assert_eq!(first["{#SCHEMA}"], "public");
        assert_eq!(first.as_object().unwrap().len(), 3);
    }

    #[test]
    fn discovery_queries_match_tag_counts() {
        assert_eq!(select_width(queries::DISCOVER_TABLES), 9);
        assert_eq!(select_width(queries::DISCOVER_TABLE_CHILDREN), 3);
        for t in discovery_templates() {
            assert_eq!(select_width(t.sql), t.tags.len(), "{}", t.key);
        }
    }

    #[test]
    fn select_width_skips_nested_lists() {
        assert_eq!(select_width("SELECT a, COALESCE(b, c), (SELECT x, y FROM t) FROM u"), 3);
    }

    #[test]
    fn json_keeps_column_order() {
        let payload = aggregate(&[row(&["16384", "orders", "public"])], CHILD_DISCOVERY_TAGS)
            .unwrap();
        assert_eq!(
            payload.to_string(),
            r#"{"data":[{"{#OID}":"16384","{#TABLE}":"orders","{#SCHEMA}":"public"}]}"#
        );
    }

    #[test]
    fn resolve_table_discovery_ignores_object() {
        let d = resolve_discovery("pg.table.discovery", Some("orders")).unwrap();
        assert!(d.statement.params.is_empty());
        assert_eq!(d.tags, TABLE_DISCOVERY_TAGS);
    }

    #[test]
    fn resolve_children_discovery_binds_parent() {
        let d = resolve_discovery("table.children.discovery", Some("measurements")).unwrap();
        assert_eq!(d.statement.params, vec!["measurements".to_string()]);
        assert_eq!(d.tags, CHILD_DISCOVERY_TAGS);
        assert!(
            d.statement
                .literal_sql()
                .contains("i.inhparent = 'measurements'::text::regclass")
        );
    }

    #[test]
    fn resolve_children_discovery_requires_parent() {
        assert_eq!(
            resolve_discovery("table.children.discovery", Some("")).unwrap_err(),
            MetricError::MissingRequiredParameter {
                key: "table.children.discovery".into()
            }
        );
    }

    #[test]
    fn resolve_unknown_discovery() {
        assert_eq!(
            resolve_discovery("index.discovery", None).unwrap_err().kind(),
            "UnknownMetric"
        );
    }
}
