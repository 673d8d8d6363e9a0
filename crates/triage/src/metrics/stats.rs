use crate::metrics::collector::Inner;
use core::{fmt, time::Duration};
use serde::Serialize;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Immutable summary computed by [`Collector::snapshot`](crate::Collector::snapshot).
///
/// Latencies are in milliseconds, rates in percent of the total.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_requests: u64,
    pub success_requests: u64,
    pub error_requests: u64,
    pub rejected_requests: u64,
    #[serde(rename = "error_rate_percent")]
    pub error_rate: f64,
    #[serde(rename = "rejection_rate_percent")]
    pub rejection_rate: f64,

    #[serde(rename = "min_latency_ms")]
    pub min_latency: f64,
    #[serde(rename = "max_latency_ms")]
    pub max_latency: f64,
    #[serde(rename = "mean_latency_ms")]
    pub mean_latency: f64,
    #[serde(rename = "median_latency_ms")]
    pub median_latency: f64,
    #[serde(rename = "p95_latency_ms")]
    pub p95_latency: f64,
    #[serde(rename = "p99_latency_ms")]
    pub p99_latency: f64,

    #[serde(rename = "duration_seconds")]
    pub duration: f64,
    pub requests_per_second: f64,

    #[serde(rename = "memory_allocations", skip_serializing_if = "is_zero")]
    pub allocations: u64,
    #[serde(rename = "memory_bytes", skip_serializing_if = "is_zero")]
    pub allocated_bytes: u64,
    #[serde(rename = "memory_mb", skip_serializing_if = "is_zero_f64")]
    pub allocated_mb: f64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

/// Nearest-rank percentile of an ascending slice.
///
/// The rank is `floor(p / 100 * n)`, clamped to the last index. Returns
/// [`Duration::ZERO`] for an empty slice.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).floor().max(0.0) as usize;
    sorted[rank.min(n - 1)]
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

#[allow(clippy::cast_precision_loss)]
fn ratio_percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl Stats {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn from_inner(inner: &Inner) -> Self {
        let duration = inner.elapsed().as_secs_f64();
        let requests_per_second = if duration > 0.0 {
            inner.total as f64 / duration
        } else {
            0.0
        };

        let mut stats = Self {
            total_requests: inner.total,
            success_requests: inner.success,
            error_requests: inner.errors,
            rejected_requests: inner.rejected,
            error_rate: ratio_percent(inner.errors, inner.total),
            rejection_rate: ratio_percent(inner.rejected, inner.total),
            duration,
            requests_per_second,
            allocations: inner.allocations,
            allocated_bytes: inner.bytes,
            allocated_mb: inner.bytes as f64 / BYTES_PER_MB,
            ..Self::default()
        };

        if !inner.latencies.is_empty() {
            let mut sorted = inner.latencies.clone();
            sorted.sort_unstable();

            let sum: Duration = sorted.iter().sum();
            stats.min_latency = millis(sorted[0]);
            stats.max_latency = millis(sorted[sorted.len() - 1]);
            stats.mean_latency = millis(sum) / sorted.len() as f64;
            stats.median_latency = millis(percentile(&sorted, 50.0));
            stats.p95_latency = millis(percentile(&sorted, 95.0));
            stats.p99_latency = millis(percentile(&sorted, 99.0));
        }

        stats
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Requests:    {}", self.total_requests)?;
        writeln!(f, "Successful:        {}", self.success_requests)?;
        writeln!(f, "Failed:            {}", self.error_requests)?;
        writeln!(f, "Rejected:          {}", self.rejected_requests)?;
        writeln!(f, "Error Rate:        {:.2}%", self.error_rate)?;
        if self.rejected_requests > 0 {
            writeln!(f, "Rejection Rate:    {:.2}%", self.rejection_rate)?;
        }
        writeln!(f)?;
        writeln!(f, "Duration:          {:.2}s", self.duration)?;
        writeln!(f, "Requests/sec:      {:.2}", self.requests_per_second)?;
        writeln!(f)?;
        writeln!(f, "Latency (ms):")?;
        writeln!(f, "  Min:             {:.2}", self.min_latency)?;
        writeln!(f, "  Mean:            {:.2}", self.mean_latency)?;
        writeln!(f, "  Median:          {:.2}", self.median_latency)?;
        writeln!(f, "  P95:             {:.2}", self.p95_latency)?;
        writeln!(f, "  P99:             {:.2}", self.p99_latency)?;
        write!(f, "  Max:             {:.2}", self.max_latency)?;
        if self.allocated_mb > 0.0 {
            write!(
                f,
                "\n\nMemory:            {:.2} MB ({} allocations)",
                self.allocated_mb, self.allocations
            )?;
        }
        Ok(())
    }
}
