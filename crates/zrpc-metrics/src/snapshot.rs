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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Server information, served at `/_info`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub server: String,
    pub version: String,
    pub uptime_ms: u64,
    /// Fully-qualified names of the registered services
    pub services: Vec<String>,
}

impl ServerInfo {
    pub fn new(uptime_ms: u64, services: Vec<String>) -> Self {
        Self {
            server: "zrpc".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_ms,
            services,
        }
    }
}

/// Metrics for one method path
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodMetrics {
    pub call_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Failed calls keyed by status code name (`"invalid_argument"`, ...)
    pub failures_by_code: BTreeMap<String, u64>,
    pub avg_latency_us: u64,
    pub p50_latency_us: u64,
    pub p95_latency_us: u64,
    pub p99_latency_us: u64,
}

impl MethodMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Complete metrics snapshot, served at `/_metrics`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub active_connections: u64,
    pub uptime_ms: u64,
    pub methods: BTreeMap<String, MethodMetrics>,
}

impl MetricsSnapshot {
    pub fn new(uptime_ms: u64) -> Self {
        Self {
            uptime_ms,
            ..Self::default()
        }
    }
}
