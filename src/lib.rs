//! pgzbx - PostgreSQL table metrics for a monitoring agent.
//!
//! This library provides:
//! - `metrics` — metric key → SQL resolution, scalar decoding, discovery
//! - `connection` — connection provider trait, `postgres` backend, mock
//! - `agent` — item-key parsing, request dispatch, response rendering
//!
//! The `pgzbx` binary wraps `agent::process` for use as an external check.

pub mod agent;
pub mod connection;
pub mod error;
pub mod metrics;

pub use error::MetricError;
