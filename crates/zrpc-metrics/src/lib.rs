//! zrpc Metrics Collection
//!
//! Thread-safe call metrics for zrpc servers: request counts, failures grouped
//! by status code and latency percentiles per method path.
//!
//! # Architecture
//!
//! - [`MetricsRegistry`]: atomic counters plus a per-method table
//! - [`MetricsCollector`]: the trait the server's router records into
//! - [`MetricsSnapshot`]: serializable point-in-time view
//!
//! # Usage Example
//!
//! ```rust
//! use zrpc_metrics::{MetricsCollector, ServerMetricsCollector};
//! use zrpc_common::protocol::Code;
//! use std::time::Instant;
//!
//! let collector = ServerMetricsCollector::new();
//!
//! let start = Instant::now();
//! // ... dispatch the call ...
//! collector.record_call("/zitadel.action.v3alpha.ActionService/ListTargets", start, Code::Ok);
//!
//! let snapshot = collector.snapshot();
//! println!("Total requests: {}", snapshot.total_requests);
//! ```
//!
//! # Built-in Monitoring Endpoints
//!
//! The HTTP server answers two GET paths from the collector:
//!
//! - **`/_metrics`**: the complete [`MetricsSnapshot`]
//! - **`/_info`**: [`ServerInfo`] with version, uptime and registered services

mod collector;
mod registry;
mod snapshot;

pub use collector::{MetricsCollector, ServerMetricsCollector, INFO_PATH, METRICS_PATH};
pub use registry::{MetricsConfig, MetricsRegistry};
pub use snapshot::{MethodMetrics, MetricsSnapshot, ServerInfo};
