//! `postgres`-crate backed connection provider.

use native_tls::TlsConnector;
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use postgres_native_tls::MakeTlsConnector;
use tracing::debug;

use super::{ConnectionError, ConnectionParams, ConnectionProvider, SslMode, TabularResult};
use crate::metrics::{CatalogRow, Statement};

/// Connects lazily on the first statement and keeps the client for the
/// lifetime of the provider (one agent request).
pub struct PostgresProvider {
    params: ConnectionParams,
    client: Option<Client>,
}

impl PostgresProvider {
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            client: None,
        }
    }

    fn ensure_connected(&mut self) -> Result<&mut Client, ConnectionError> {
        if self.client.is_none() {
            let client = self.connect()?;
            debug!(server = %self.params.describe(), "connected to PostgreSQL");
            self.client = Some(client);
        }
        self.client
            .as_mut()
            .ok_or_else(|| ConnectionError::Connect("not connected".to_string()))
    }

    fn connect(&self) -> Result<Client, ConnectionError> {
        let config = self.params.to_config();
        let result = match self.params.sslmode {
            SslMode::Disable => config.connect(NoTls),
            // libpq semantics: prefer/require encrypt without verifying the
            // server certificate.
            SslMode::Prefer | SslMode::Require => {
                let connector = TlsConnector::builder()
                    .danger_accept_invalid_certs(true)
                    .build()
                    .map_err(|e| ConnectionError::Tls(e.to_string()))?;
                config.connect(MakeTlsConnector::new(connector))
            }
        };
        result.map_err(|e| ConnectionError::Connect(format_postgres_error(&e)))
    }
}

impl ConnectionProvider for PostgresProvider {
    fn execute(&mut self, statement: &Statement) -> Result<TabularResult, ConnectionError> {
        let client = self.ensure_connected()?;
        let params: Vec<&(dyn ToSql + Sync)> = statement
            .params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        let rows = match client.query(statement.sql.as_str(), &params) {
            Ok(rows) => rows,
            // Server rejected the statement: report it as a failed result.
            Err(e) if e.as_db_error().is_some() => {
                return Ok(TabularResult::failed(format_postgres_error(&e)));
            }
            Err(e) => return Err(ConnectionError::Query(format_postgres_error(&e))),
        };

        let mut matrix: Vec<CatalogRow> = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(row.len());
            for idx in 0..row.len() {
                let value: Option<String> = row
                    .try_get(idx)
                    .map_err(|e| ConnectionError::Query(format_postgres_error(&e)))?;
                values.push(value);
            }
            matrix.push(values);
        }

        Ok(TabularResult::ok(matrix))
    }
}

/// Formats PostgreSQL error message for display.
pub fn format_postgres_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else if msg.contains("password authentication failed") {
            "password authentication failed".to_string()
        } else if msg.contains("does not exist") {
            msg.split("FATAL:")
                .last()
                .unwrap_or(&msg)
                .trim()
                .to_string()
        } else {
            msg
        }
    }
}
