//! Observability
//!
//! In-process counters and histograms exposed through the server's `/metrics`
//! endpoint. Structured logs go through `tracing` at the call sites.

pub mod metrics;

pub use metrics::{Counter, Histogram, MetricsCollector};
