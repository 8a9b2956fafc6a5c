// Copyright 2025 zrpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::registry::{MetricsConfig, MetricsRegistry};
use crate::snapshot::{MetricsSnapshot, ServerInfo};
use std::sync::Arc;
use std::time::Instant;
use zrpc_common::protocol::{Code, Result, Status};

/// Path of the metrics snapshot endpoint.
pub const METRICS_PATH: &str = "/_metrics";
/// Path of the server info endpoint.
pub const INFO_PATH: &str = "/_info";

/// Trait for metrics collection in zrpc servers.
///
/// Implementations track per-method call statistics and answer the built-in
/// monitoring endpoints (`/_metrics` and `/_info`). Those paths never reach
/// the service registry.
///
/// # Example
///
/// ```rust
/// use zrpc_metrics::{MetricsCollector, ServerMetricsCollector};
/// use zrpc_common::protocol::Code;
/// use std::time::Instant;
///
/// let collector = ServerMetricsCollector::new();
///
/// if collector.is_metrics_request("/_info") {
///     let info = collector.handle_metrics_request("/_info", &[]).unwrap();
///     assert_eq!(info["server"], "zrpc");
/// }
///
/// let start = Instant::now();
/// // ... dispatch the call ...
/// collector.record_call("/zrpc.echo.v1.EchoService/Echo", start, Code::Ok);
/// ```
pub trait MetricsCollector: Send + Sync {
    /// Returns `true` for `/_metrics` and `/_info`.
    fn is_metrics_request(&self, path: &str) -> bool;

    /// Renders a monitoring endpoint as JSON.
    ///
    /// `services` lists the registered service names reported by `/_info`.
    /// Any other path yields a `not_found` status.
    fn handle_metrics_request(&self, path: &str, services: &[String]) -> Result<serde_json::Value>;

    /// Records a finished call with its latency and final status code.
    ///
    /// # Arguments
    /// * `method` - The method path that was called
    /// * `start_time` - The `Instant` when dispatch began
    /// * `code` - `Code::Ok` for success, the failing code otherwise
    fn record_call(&self, method: &str, start_time: Instant, code: Code);

    fn connection_opened(&self);

    fn connection_closed(&self);

    fn snapshot(&self) -> MetricsSnapshot;
}

/// Metrics collector for zrpc servers.
///
/// # Example
///
/// ```rust
/// use zrpc_metrics::{MetricsCollector, ServerMetricsCollector};
/// use zrpc_common::protocol::Code;
/// use std::time::Instant;
///
/// let collector = ServerMetricsCollector::new();
///
/// let start = Instant::now();
/// collector.record_call("/zrpc.echo.v1.EchoService/Echo", start, Code::Ok);
/// collector.record_call("/zrpc.echo.v1.EchoService/Echo", start, Code::InvalidArgument);
///
/// let snapshot = collector.snapshot();
/// assert_eq!(snapshot.total_requests, 2);
/// assert_eq!(snapshot.failed_requests, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ServerMetricsCollector {
    registry: Arc<MetricsRegistry>,
}

impl ServerMetricsCollector {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            registry: Arc::new(MetricsRegistry::with_config(config)),
        }
    }

    /// Creates a collector sharing an existing registry.
    pub fn with_registry(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    pub fn info(&self, services: &[String]) -> ServerInfo {
        ServerInfo::new(self.registry.uptime_ms(), services.to_vec())
    }
}

impl Default for ServerMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for ServerMetricsCollector {
    fn is_metrics_request(&self, path: &str) -> bool {
        path == METRICS_PATH || path == INFO_PATH
    }

    fn handle_metrics_request(&self, path: &str, services: &[String]) -> Result<serde_json::Value> {
        match path {
            METRICS_PATH => Ok(serde_json::to_value(self.snapshot())?),
            INFO_PATH => Ok(serde_json::to_value(self.info(services))?),
            other => Err(Status::not_found(format!("no monitoring endpoint at {}", other)).into()),
        }
    }

    fn record_call(&self, method: &str, start_time: Instant, code: Code) {
        let latency_us = start_time.elapsed().as_micros() as u64;
        self.registry.record_method_call(method, latency_us, code);
    }

    fn connection_opened(&self) {
        self.registry.increment_active_connections();
    }

    fn connection_closed(&self) {
        self.registry.decrement_active_connections();
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zrpc_common::protocol::ZrpcError;

    #[test]
    fn test_is_metrics_request() {
        let collector = ServerMetricsCollector::new();
        assert!(collector.is_metrics_request("/_metrics"));
        assert!(collector.is_metrics_request("/_info"));
        assert!(!collector.is_metrics_request("/zrpc.echo.v1.EchoService/Echo"));
        assert!(!collector.is_metrics_request("_metrics"));
    }

    #[test]
    fn test_info_lists_services() {
        let collector = ServerMetricsCollector::new();
        let services = vec!["zrpc.echo.v1.EchoService".to_string()];
        let info = collector.handle_metrics_request("/_info", &services).unwrap();

        assert_eq!(info["server"], "zrpc");
        assert_eq!(info["services"][0], "zrpc.echo.v1.EchoService");
        assert!(info["version"].is_string());
    }

    #[test]
    fn test_metrics_snapshot_json() {
        let collector = ServerMetricsCollector::new();
        collector.record_call("/a.S/M", Instant::now(), Code::NotFound);

        let metrics = collector.handle_metrics_request("/_metrics", &[]).unwrap();
        assert_eq!(metrics["total_requests"], 1);
        assert_eq!(metrics["methods"]["/a.S/M"]["failures_by_code"]["not_found"], 1);
    }

    #[test]
    fn test_unknown_monitoring_path() {
        let collector = ServerMetricsCollector::new();
        let err = collector.handle_metrics_request("/_health", &[]).unwrap_err();
        assert!(matches!(err, ZrpcError::Status(status) if status.code == Code::NotFound));
    }

    #[test]
    fn test_connection_tracking() {
        let collector = ServerMetricsCollector::new();
        collector.connection_opened();
        collector.connection_opened();
        collector.connection_closed();
        assert_eq!(collector.snapshot().active_connections, 1);
    }

    #[test]
    fn test_shared_registry() {
        let registry = Arc::new(MetricsRegistry::new());
        let a = ServerMetricsCollector::with_registry(Arc::clone(&registry));
        let b = ServerMetricsCollector::with_registry(registry);

        a.record_call("/a.S/M", Instant::now(), Code::Ok);
        assert_eq!(b.snapshot().total_requests, 1);
    }
}
