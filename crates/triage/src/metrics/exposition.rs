use crate::metrics::collector::Collector;
use core::fmt::Write;

impl Collector {
    /// Renders the collector in the Prometheus text exposition format.
    ///
    /// Metric names are `{namespace}_{pattern}_{name}`.
    pub fn render_prometheus(&self, namespace: &str, pattern: &str) -> String {
        let stats = self.snapshot();
        let metric = |name: &str| format!("{namespace}_{pattern}_{name}");
        let mut out = String::with_capacity(1024);

        let counters = [
            ("requests_total", "Total number of requests", stats.total_requests),
            ("requests_success", "Number of successful requests", stats.success_requests),
            ("requests_error", "Number of failed requests", stats.error_requests),
            (
                "requests_rejected",
                "Number of requests rejected at admission",
                stats.rejected_requests,
            ),
        ];
        for (name, help, value) in counters {
            let name = metric(name);
            // Writing to a String cannot fail.
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}\n");
        }

        let latency = metric("latency_ms");
        let _ = writeln!(out, "# HELP {latency} Request latency in milliseconds");
        let _ = writeln!(out, "# TYPE {latency} summary");
        for (quantile, value) in [
            ("0.5", stats.median_latency),
            ("0.95", stats.p95_latency),
            ("0.99", stats.p99_latency),
        ] {
            let _ = writeln!(out, "{latency}{{quantile=\"{quantile}\"}} {value:.2}");
        }
        let _ = writeln!(out);

        let throughput = metric("requests_per_second");
        let _ = writeln!(out, "# HELP {throughput} Request throughput over the measurement window");
        let _ = writeln!(out, "# TYPE {throughput} gauge");
        let _ = writeln!(out, "{throughput} {:.2}", stats.requests_per_second);

        out
    }
}
