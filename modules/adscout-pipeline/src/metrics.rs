//! Process metrics, rendered in Prometheus text exposition format.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use adscout_store::StoreStats;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestKey {
    method: String,
    path: String,
    status: u16,
}

#[derive(Debug, Clone, Copy, Default)]
struct RequestStats {
    count: u64,
    total_seconds: f64,
}

/// Process-scoped collector, injected into the API layer and the runner.
pub struct MetricsCollector {
    started: Instant,
    requests: Mutex<HashMap<RequestKey, RequestStats>>,
    pipeline_runs: AtomicU64,
    pipeline_success: AtomicU64,
    pipeline_failures: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            requests: Mutex::new(HashMap::new()),
            pipeline_runs: AtomicU64::new(0),
            pipeline_success: AtomicU64::new(0),
            pipeline_failures: AtomicU64::new(0),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &str, path: &str, status: u16, seconds: f64) {
        let key = RequestKey {
            method: method.to_string(),
            path: path.to_string(),
            status,
        };
        let mut requests = self.requests.lock().expect("metrics lock poisoned");
        let stats = requests.entry(key).or_default();
        stats.count += 1;
        stats.total_seconds += seconds;
    }

    pub fn record_run(&self, success: bool) {
        self.pipeline_runs.fetch_add(1, Ordering::Relaxed);
        if success {
            self.pipeline_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.pipeline_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Render the exposition text. Live gauges (active runs, storage counts)
    /// are sampled by the caller and passed in.
    pub fn render(&self, active_runs: usize, store: &StoreStats) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# HELP uptime_seconds Time since service started");
        let _ = writeln!(out, "# TYPE uptime_seconds gauge");
        let _ = writeln!(out, "uptime_seconds {:.2}", self.started.elapsed().as_secs_f64());
        let _ = writeln!(out);

        {
            let requests = self.requests.lock().expect("metrics lock poisoned");

            let _ = writeln!(out, "# HELP http_requests_total Total number of HTTP requests");
            let _ = writeln!(out, "# TYPE http_requests_total counter");
            for (key, stats) in requests.iter() {
                let _ = writeln!(
                    out,
                    "http_requests_total{{method=\"{}\",path=\"{}\",status=\"{}\"}} {}",
                    key.method, key.path, key.status, stats.count
                );
            }
            let _ = writeln!(out);

            let _ = writeln!(out, "# HELP http_request_duration_seconds Mean HTTP request latency");
            let _ = writeln!(out, "# TYPE http_request_duration_seconds gauge");
            for (key, stats) in requests.iter() {
                if stats.count > 0 {
                    let _ = writeln!(
                        out,
                        "http_request_duration_seconds{{method=\"{}\",path=\"{}\",status=\"{}\"}} {:.4}",
                        key.method,
                        key.path,
                        key.status,
                        stats.total_seconds / stats.count as f64
                    );
                }
            }
            let _ = writeln!(out);
        }

        let runs = self.pipeline_runs.load(Ordering::Relaxed);
        let success = self.pipeline_success.load(Ordering::Relaxed);
        let failures = self.pipeline_failures.load(Ordering::Relaxed);

        let _ = writeln!(out, "# HELP pipeline_runs_total Total number of pipeline runs");
        let _ = writeln!(out, "# TYPE pipeline_runs_total counter");
        let _ = writeln!(out, "pipeline_runs_total {runs}");
        let _ = writeln!(out);

        let _ = writeln!(out, "# HELP pipeline_success_total Successful pipeline runs");
        let _ = writeln!(out, "# TYPE pipeline_success_total counter");
        let _ = writeln!(out, "pipeline_success_total {success}");
        let _ = writeln!(out);

        let _ = writeln!(out, "# HELP pipeline_failures_total Failed pipeline runs");
        let _ = writeln!(out, "# TYPE pipeline_failures_total counter");
        let _ = writeln!(out, "pipeline_failures_total {failures}");
        let _ = writeln!(out);

        let _ = writeln!(out, "# HELP pipeline_active_runs Currently running pipelines");
        let _ = writeln!(out, "# TYPE pipeline_active_runs gauge");
        let _ = writeln!(out, "pipeline_active_runs {active_runs}");
        let _ = writeln!(out);

        let _ = writeln!(out, "# HELP db_keywords_total Keywords in storage");
        let _ = writeln!(out, "# TYPE db_keywords_total gauge");
        let _ = writeln!(out, "db_keywords_total {}", store.keywords);
        let _ = writeln!(out);

        let _ = writeln!(out, "# HELP db_products_total Discovered products in storage");
        let _ = writeln!(out, "# TYPE db_products_total gauge");
        let _ = writeln!(out, "db_products_total {}", store.products);
        let _ = writeln!(out);

        let _ = writeln!(out, "# HELP db_products_with_traffic_total Products with traffic data");
        let _ = writeln!(out, "# TYPE db_products_with_traffic_total gauge");
        let _ = writeln!(out, "db_products_with_traffic_total {}", store.products_with_traffic);

        if runs > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "# HELP pipeline_success_rate_percentage Pipeline success rate");
            let _ = writeln!(out, "# TYPE pipeline_success_rate_percentage gauge");
            let _ = writeln!(
                out,
                "pipeline_success_rate_percentage {:.2}",
                success as f64 / runs as f64 * 100.0
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counters_and_gauges() {
        let metrics = MetricsCollector::new();
        metrics.record_request("GET", "/pipeline/status", 200, 0.05);
        metrics.record_request("GET", "/pipeline/status", 200, 0.15);
        metrics.record_run(true);
        metrics.record_run(false);

        let store = StoreStats {
            keywords: 2,
            products: 10,
            products_with_traffic: 4,
        };
        let text = metrics.render(1, &store);

        assert!(text.contains(
            "http_requests_total{method=\"GET\",path=\"/pipeline/status\",status=\"200\"} 2"
        ));
        assert!(text.contains("pipeline_runs_total 2"));
        assert!(text.contains("pipeline_success_total 1"));
        assert!(text.contains("pipeline_failures_total 1"));
        assert!(text.contains("pipeline_active_runs 1"));
        assert!(text.contains("db_products_total 10"));
        assert!(text.contains("pipeline_success_rate_percentage 50.00"));
    }
}
