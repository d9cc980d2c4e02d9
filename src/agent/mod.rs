//! Agent boundary: item key in, rendered value out.
//!
//! The first five item-key params are connection settings (see
//! [`ConnectionParams`]); the sixth is the table name for keys that take one.

mod key;

pub use key::{AgentRequest, parse_item_key};

use std::time::Duration;

use tracing::debug;

use crate::connection::{
    CONNECTION_PARAM_COUNT, ConnectionParams, ConnectionProvider, PostgresProvider, SslMode,
};
use crate::error::MetricError;
use crate::metrics::{
    self, AggregateForm, DiscoveryPayload, ResolvedDiscovery, ResolvedQuery, ScalarValue,
    Statement,
};

/// Index of the key-specific (table name) param, right after the
/// connection params.
pub const OBJECT_PARAM: usize = CONNECTION_PARAM_COUNT;

/// Rendered response for the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResponse {
    Scalar(ScalarValue),
    Discovery(DiscoveryPayload),
}

impl std::fmt::Display for AgentResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentResponse::Scalar(v) => write!(f, "{}", v),
            AgentResponse::Discovery(p) => write!(f, "{}", p),
        }
    }
}

/// What a request will run, before any connection is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Metric(ResolvedQuery),
    Discovery(ResolvedDiscovery),
}

impl Plan {
    pub fn statement(&self) -> &Statement {
        match self {
            Plan::Metric(q) => &q.statement,
            Plan::Discovery(d) => &d.statement,
        }
    }
}

/// Resolves `key` against the discovery table first, then the metric table.
pub fn plan(key: &str, object: Option<&str>) -> Result<Plan, MetricError> {
    match metrics::resolve_discovery(key, object) {
        Err(MetricError::UnknownMetric(_)) => metrics::resolve(key, object).map(Plan::Metric),
        other => other.map(Plan::Discovery),
    }
}

/// Runs one request against `provider`.
pub fn handle<P: ConnectionProvider>(
    provider: &mut P,
    key: &str,
    object: Option<&str>,
) -> Result<AgentResponse, MetricError> {
    debug!(key, object, "handling request");
    let plan = plan(key, object)?;

    let result = provider
        .execute(plan.statement())
        .map_err(|e| MetricError::QueryExecution(e.to_string()))?;
    if let Some(msg) = result.failure() {
        return Err(MetricError::QueryExecution(msg.to_string()));
    }

    if result.rows.is_empty() {
        debug!(key, sql = %plan.statement().literal_sql(), "no results returned");
    }

    match plan {
        Plan::Metric(query) => {
            let value = metrics::decode(query.decoder, result.first_cell())?;
            Ok(AgentResponse::Scalar(value))
        }
        Plan::Discovery(discovery) => {
            let payload = metrics::aggregate(&result.rows, discovery.tags)?;
            Ok(AgentResponse::Discovery(payload))
        }
    }
}

/// Connection options that do not come from the item key.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    /// Overrides `PGSSLMODE` when set.
    pub sslmode: Option<SslMode>,
    pub connect_timeout: Option<Duration>,
}

/// Parses `item_key`, connects with its leading params and runs it.
pub fn process(item_key: &str, options: &AgentOptions) -> Result<AgentResponse, MetricError> {
    let request = parse_item_key(item_key)?;
    let object = request.param(OBJECT_PARAM);

    // Fail on key errors before touching the network.
    plan(&request.key, object)?;

    let mut params = ConnectionParams::from_item_params(&request.params)
        .map_err(|e| MetricError::QueryExecution(e.to_string()))?;
    if let Some(mode) = options.sslmode {
        params = params.with_sslmode(mode);
    }
    if let Some(timeout) = options.connect_timeout {
        params = params.with_connect_timeout(timeout);
    }

    let mut provider = PostgresProvider::new(params);
    handle(&mut provider, &request.key, object)
}

/// How a supported key uses the table-name param.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableParam {
    None,
    Optional,
    Required,
}

/// Every supported item key (with `pg.` prefix) and its table param.
pub fn supported_keys() -> Vec<(String, TableParam)> {
    let discovery = metrics::discovery_templates().iter().map(|t| {
        let param = if t.requires_object {
            TableParam::Required
        } else {
            TableParam::None
        };
        (format!("pg.{}", t.key), param)
    });
    let metric = metrics::metric_templates().iter().map(|t| {
        let param = match t.aggregate {
            AggregateForm::Sql(_) => TableParam::Optional,
            AggregateForm::RequiresObject | AggregateForm::Forbidden => TableParam::Required,
        };
        (format!("pg.{}", t.key), param)
    });
    discovery.chain(metric).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockProvider;
    use crate::connection::{ConnectionError, TabularResult};

    #[test]
    fn scalar_metric_end_to_end() {
        let mut mock = MockProvider::new().with_scalar(Some("16384"));
        let resp = handle(&mut mock, "pg.table.size", Some("orders")).unwrap();
        assert_eq!(resp, AgentResponse::Scalar(ScalarValue::Integer(16384)));
        assert_eq!(resp.to_string(), "16384");
        assert_eq!(mock.executed()[0].params, vec!["orders".to_string()]);
    }

    #[test]
    fn row_estimate_is_rounded() {
        let mut mock = MockProvider::new().with_scalar(Some("3.14028e+06"));
        let resp = handle(&mut mock, "table.rows", None).unwrap();
        assert_eq!(resp.to_string(), "3140280");
        assert!(mock.executed()[0].sql.contains("SUM(reltuples)"));
    }

    #[test]
    fn zero_rows_give_empty_value() {
        let mut mock = MockProvider::new().with_rows(&[]);
        let resp = handle(&mut mock, "table.last_vacuum", Some("orders")).unwrap();
        assert_eq!(resp, AgentResponse::Scalar(ScalarValue::Null));
        assert_eq!(resp.to_string(), "");
    }

    #[test]
    fn table_discovery_end_to_end() {
        let mut mock = MockProvider::new().with_rows(&[
            &[
                "16390", "shop", "public", "pg_default", "orders", "orders", "app", "permanent",
                "0",
            ],
            &[
                "16402", "shop", "public", "pg_default", "orders_2024", "orders_2024", "app",
                "permanent", "1",
            ],
        ]);
        let resp = handle(&mut mock, "pg.table.discovery", None).unwrap();
        let AgentResponse::Discovery(payload) = &resp else {
            panic!("expected discovery, got {:?}", resp);
        };
        assert_eq!(payload.records.len(), 2);
        assert_eq!(payload.records[1].get("ISSUBCLASS"), Some("1"));

        let json: serde_json::Value = serde_json::from_str(&resp.to_string()).unwrap();
        assert_eq!(json["data"][0]["{#TABLE}"], "orders");
        assert_eq!(json["data"][1]["{#TABLE}"], "orders_2024");
        assert_eq!(json["data"][0]["{#PERSISTENCE}"], "permanent");
    }

    #[test]
    fn empty_discovery_is_not_an_error() {
        let mut mock = MockProvider::new().with_rows(&[]);
        let resp = handle(&mut mock, "table.children.discovery", Some("orders")).unwrap();
        assert_eq!(resp.to_string(), r#"{"data":[]}"#);
    }

    #[test]
    fn discovery_schema_drift_is_reported() {
        let mut mock = MockProvider::new().with_rows(&[&["1", "orders"]]);
        let err = handle(&mut mock, "table.children.discovery", Some("orders")).unwrap_err();
        assert_eq!(err.kind(), "SchemaMismatch");
    }

    #[test]
    fn failed_status_is_query_error() {
        let mut mock = MockProvider::new().with_result(Ok(TabularResult::failed(
            "ERROR: relation \"nope\" does not exist",
        )));
        let err = handle(&mut mock, "table.children", Some("nope")).unwrap_err();
        assert_eq!(
            err,
            MetricError::QueryExecution("ERROR: relation \"nope\" does not exist".into())
        );
    }

    #[test]
    fn connection_error_is_query_error() {
        let mut mock = MockProvider::new()
            .with_result(Err(ConnectionError::Connect("connection refused".into())));
        let err = handle(&mut mock, "table.size", None).unwrap_err();
        assert_eq!(err.kind(), "QueryExecutionError");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn resolution_errors_skip_the_provider() {
        let mut mock = MockProvider::new();
        assert_eq!(
            handle(&mut mock, "table.children.size", None).unwrap_err().kind(),
            "MissingRequiredParameter"
        );
        assert_eq!(
            handle(&mut mock, "table.last_analyze", None).unwrap_err().kind(),
            "InvalidAggregation"
        );
        assert_eq!(
            handle(&mut mock, "table.nope", None).unwrap_err().kind(),
            "UnknownMetric"
        );
        assert!(mock.executed().is_empty());
    }

    #[test]
    fn non_numeric_scalar_is_decode_error() {
        let mut mock = MockProvider::new().with_scalar(Some("many"));
        let err = handle(&mut mock, "table.seq_scan", Some("orders")).unwrap_err();
        assert_eq!(err.kind(), "DecodeError");
    }

    #[test]
    fn plan_prefers_discovery_table() {
        assert!(matches!(
            plan("table.children.discovery", Some("t")).unwrap(),
            Plan::Discovery(_)
        ));
        assert!(matches!(
            plan("table.children", Some("t")).unwrap(),
            Plan::Metric(_)
        ));
    }

    #[test]
    fn process_rejects_bad_keys_before_connecting() {
        let opts = AgentOptions::default();
        assert_eq!(
            process("pg.table.size[a", &opts).unwrap_err().kind(),
            "InvalidItemKey"
        );
        assert_eq!(
            process("pg.table.children[h,5432,db,u,p]", &opts)
                .unwrap_err()
                .kind(),
            "MissingRequiredParameter"
        );
        assert_eq!(
            process("pg.index.size[h,5432,db,u,p,x]", &opts)
                .unwrap_err()
                .kind(),
            "UnknownMetric"
        );
    }

    #[test]
    fn supported_keys_cover_both_tables() {
        let keys = supported_keys();
        assert!(keys.contains(&("pg.table.discovery".to_string(), TableParam::None)));
        assert!(keys.contains(&(
            "pg.table.children.discovery".to_string(),
            TableParam::Required
        )));
        assert!(keys.contains(&("pg.table.size".to_string(), TableParam::Optional)));
        assert!(keys.contains(&("pg.table.last_vacuum".to_string(), TableParam::Required)));
        assert_eq!(
            keys.len(),
            metrics::discovery_templates().len() + metrics::metric_templates().len()
        );
    }
}
