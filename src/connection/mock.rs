//! In-memory connection provider for testing without a PostgreSQL server.
//!
//! `MockProvider` replays queued results in order and records every
//! statement it was asked to run.

use std::collections::VecDeque;

use super::{ConnectionError, ConnectionProvider, TabularResult};
use crate::metrics::Statement;

/// Replays canned results.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    responses: VecDeque<Result<TabularResult, ConnectionError>>,
    executed: Vec<Statement>,
}

impl MockProvider {
    /// Creates a provider with no queued results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful result built from string rows.
    pub fn with_rows(mut self, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| Some(v.to_string())).collect())
            .collect();
        self.responses.push_back(Ok(TabularResult::ok(rows)));
        self
    }

    /// Queues a single-cell result. `None` is SQL NULL.
    pub fn with_scalar(mut self, value: Option<&str>) -> Self {
        self.responses
            .push_back(Ok(TabularResult::ok(vec![vec![value.map(str::to_string)]])));
        self
    }

    /// Queues an arbitrary result.
    pub fn with_result(mut self, result: Result<TabularResult, ConnectionError>) -> Self {
        self.responses.push_back(result);
        self
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> &[Statement] {
        &self.executed
    }
}

impl ConnectionProvider for MockProvider {
    fn execute(&mut self, statement: &Statement) -> Result<TabularResult, ConnectionError> {
        self.executed.push(statement.clone());
        self.responses
            .pop_front()
            .unwrap_or_else(|| Ok(TabularResult::ok(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_order_then_empty() {
        let mut mock = MockProvider::new()
            .with_scalar(Some("1"))
            .with_rows(&[&["a", "b"], &["c", "d"]]);
        let stmt = Statement::new("SELECT 1", Vec::new());

        assert_eq!(mock.execute(&stmt).unwrap().first_cell(), Some("1"));
        assert_eq!(mock.execute(&stmt).unwrap().rows.len(), 2);
        assert!(mock.execute(&stmt).unwrap().rows.is_empty());
        assert_eq!(mock.executed().len(), 3);
    }

    #[test]
    fn replays_errors() {
        let mut mock = MockProvider::new()
            .with_result(Err(ConnectionError::Connect("connection refused".into())));
        let stmt = Statement::new("SELECT 1", Vec::new());
        assert!(mock.execute(&stmt).is_err());
    }
}
