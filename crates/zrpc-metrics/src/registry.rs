use crate::snapshot::{MethodMetrics, MetricsSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use zrpc_common::protocol::{Code, Result, ZrpcError};

/// One bucket per bit length of the latency in microseconds.
const NUM_LATENCY_BUCKETS: usize = 65;

/// Configuration for metrics size limits.
///
/// # Example
///
/// ```rust
/// use zrpc_metrics::MetricsConfig;
///
/// let config = MetricsConfig {
///     max_methods: 256,
///     cleanup_interval: 500,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Maximum number of distinct method paths to track
    ///
    /// When exceeded, least-recently-called methods are evicted.
    pub max_methods: usize,
    /// Number of recorded calls between eviction passes
    pub cleanup_interval: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_methods: 1000,
            cleanup_interval: 1000,
        }
    }
}

impl MetricsConfig {
    pub fn with_max_methods(mut self, max_methods: usize) -> Self {
        self.max_methods = max_methods;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_methods == 0 {
            return Err(ZrpcError::InvalidConfig(
                "max_methods must be greater than 0".to_string(),
            ));
        }
        if self.cleanup_interval == 0 {
            return Err(ZrpcError::InvalidConfig(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Base-2 latency histogram.
///
/// Bucket `i` counts samples whose bit length is `i`, i.e. latencies in
/// `[2^(i-1), 2^i)` microseconds; bucket 0 holds zero-length samples.
/// Percentiles interpolate linearly inside the matching bucket.
#[derive(Debug)]
struct LatencyHistogram {
    buckets: [AtomicU64; NUM_LATENCY_BUCKETS],
    total_latency: AtomicU64,
    sample_count: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            total_latency: AtomicU64::new(0),
            sample_count: AtomicU64::new(0),
        }
    }

    fn bucket_of(latency_us: u64) -> usize {
        (u64::BITS - latency_us.leading_zeros()) as usize
    }

    /// Lower and upper latency bound of a bucket.
    fn bucket_bounds(bucket: usize) -> (u64, u64) {
        match bucket {
            0 => (0, 1),
            64 => (1 << 63, u64::MAX),
            _ => (1 << (bucket - 1), 1 << bucket),
        }
    }

    fn record(&self, latency_us: u64) {
        self.buckets[Self::bucket_of(latency_us)].fetch_add(1, Ordering::Relaxed);
        self.total_latency.fetch_add(latency_us, Ordering::Relaxed);
        self.sample_count.fetch_add(1, Ordering::Relaxed);
    }

    fn percentile(&self, percentile: u64) -> u64 {
        let total = self.sample_count.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }

        let target = (total * percentile) / 100;
        let mut cumulative = 0;
        for (index, bucket) in self.buckets.iter().enumerate() {
            let count = bucket.load(Ordering::Relaxed);
            if count > 0 && cumulative + count >= target {
                let (lower, upper) = Self::bucket_bounds(index);
                let fraction = target.saturating_sub(cumulative) as f64 / count as f64;
                return lower + (fraction * (upper - lower) as f64) as u64;
            }
            cumulative += count;
        }
        0
    }

    /// Returns `(avg, p50, p95, p99)` in microseconds.
    fn summary(&self) -> (u64, u64, u64, u64) {
        let total = self.sample_count.load(Ordering::Relaxed);
        if total == 0 {
            return (0, 0, 0, 0);
        }
        let avg = self.total_latency.load(Ordering::Relaxed) / total;
        (avg, self.percentile(50), self.percentile(95), self.percentile(99))
    }
}

#[derive(Debug)]
struct MethodStats {
    call_count: AtomicU64,
    success_count: AtomicU64,
    failures: [AtomicU64; Code::ALL.len()],
    latencies: LatencyHistogram,
    /// Registry tick of the last call, for LRU eviction
    last_tick: AtomicU64,
}

impl MethodStats {
    fn new(tick: u64) -> Self {
        Self {
            call_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failures: std::array::from_fn(|_| AtomicU64::new(0)),
            latencies: LatencyHistogram::new(),
            last_tick: AtomicU64::new(tick),
        }
    }

    fn record(&self, latency_us: u64, code: Code, tick: u64) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if code == Code::Ok {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures[code as usize].fetch_add(1, Ordering::Relaxed);
        }
        self.latencies.record(latency_us);
        self.last_tick.fetch_max(tick, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MethodMetrics {
        let failures_by_code: BTreeMap<String, u64> = Code::ALL
            .iter()
            .filter_map(|code| {
                let count = self.failures[*code as usize].load(Ordering::Relaxed);
                (count > 0).then(|| (code.as_str().to_string(), count))
            })
            .collect();
        let (avg_latency_us, p50_latency_us, p95_latency_us, p99_latency_us) =
            self.latencies.summary();

        MethodMetrics {
            call_count: self.call_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: failures_by_code.values().sum(),
            failures_by_code,
            avg_latency_us,
            p50_latency_us,
            p95_latency_us,
            p99_latency_us,
        }
    }
}

/// Thread-safe metrics registry.
///
/// Global and per-method counters are relaxed atomics; the method table sits
/// behind an `RwLock` that is only write-locked to insert or evict entries.
/// Snapshots are eventually consistent.
///
/// # Example
///
/// ```rust
/// use zrpc_metrics::MetricsRegistry;
/// use zrpc_common::protocol::Code;
///
/// let registry = MetricsRegistry::new();
/// registry.record_method_call("/zrpc.echo.v1.EchoService/Echo", 150, Code::Ok);
///
/// let snapshot = registry.snapshot();
/// assert_eq!(snapshot.total_requests, 1);
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    active_connections: AtomicU64,
    methods: RwLock<HashMap<String, Arc<MethodStats>>>,
    start_time: Instant,
    config: MetricsConfig,
    /// Logical clock, advanced once per recorded call
    tick: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            methods: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
            config,
            tick: AtomicU64::new(0),
        }
    }

    pub fn increment_active_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // never wraps below zero, even on unbalanced calls
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Records one finished call on `method` with its latency and status code.
    pub fn record_method_call(&self, method: &str, latency_us: u64, code: Code) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if code == Code::Ok {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;

        let existing = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned();
        let stats = match existing {
            Some(stats) => stats,
            None => self
                .methods
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(method.to_string())
                .or_insert_with(|| Arc::new(MethodStats::new(tick)))
                .clone(),
        };
        stats.record(latency_us, code, tick);

        if tick % self.config.cleanup_interval.max(1) == 0 {
            self.evict_least_recent();
        }
    }

    /// Drops least-recently-called methods beyond `max_methods`.
    fn evict_least_recent(&self) {
        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
        if methods.len() <= self.config.max_methods {
            return;
        }

        let mut entries: Vec<(String, u64)> = methods
            .iter()
            .map(|(name, stats)| (name.clone(), stats.last_tick.load(Ordering::Relaxed)))
            .collect();
        entries.sort_by_key(|(_, tick)| *tick);

        let excess = entries.len() - self.config.max_methods;
        for (name, _) in entries.into_iter().take(excess) {
            methods.remove(&name);
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let methods = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect();

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
            methods,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
