use crate::server::config::Pattern;
use serde::Serialize;
use std::io::{self, Write};
use triage::Stats;

/// Outcome of one pattern's run.
#[derive(Debug, Clone)]
pub struct PatternReport {
    pub pattern: Pattern,
    pub stats: Stats,
}

#[derive(Serialize)]
struct JsonReport {
    pattern: &'static str,
    total_requests: u64,
    success_requests: u64,
    error_requests: u64,
    rejected_requests: u64,
    duration_seconds: f64,
    requests_per_second: f64,
    latency_ms: JsonLatency,
    error_rate_percent: f64,
    rejection_rate_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<JsonMemory>,
}

#[derive(Serialize)]
struct JsonLatency {
    min: f64,
    mean: f64,
    median: f64,
    p95: f64,
    p99: f64,
    max: f64,
}

#[derive(Serialize)]
struct JsonMemory {
    allocations: u64,
    bytes: u64,
    mb: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl From<&PatternReport> for JsonReport {
    fn from(report: &PatternReport) -> Self {
        let stats = &report.stats;
        Self {
            pattern: report.pattern.name(),
            total_requests: stats.total_requests,
            success_requests: stats.success_requests,
            error_requests: stats.error_requests,
            rejected_requests: stats.rejected_requests,
            duration_seconds: round2(stats.duration),
            requests_per_second: round2(stats.requests_per_second),
            latency_ms: JsonLatency {
                min: round2(stats.min_latency),
                mean: round2(stats.mean_latency),
                median: round2(stats.median_latency),
                p95: round2(stats.p95_latency),
                p99: round2(stats.p99_latency),
                max: round2(stats.max_latency),
            },
            error_rate_percent: round2(stats.error_rate),
            rejection_rate_percent: round2(stats.rejection_rate),
            memory: (stats.allocations > 0).then(|| JsonMemory {
                allocations: stats.allocations,
                bytes: stats.allocated_bytes,
                mb: round2(stats.allocated_mb),
            }),
        }
    }
}

/// Writes `reports` as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_json(out: &mut impl Write, reports: &[PatternReport]) -> io::Result<()> {
    let reports: Vec<JsonReport> = reports.iter().map(JsonReport::from).collect();
    serde_json::to_writer_pretty(&mut *out, &reports)?;
    writeln!(out)
}

/// Writes the run header describing the load shape.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_header(
    out: &mut impl Write,
    requests: usize,
    concurrency: usize,
    workers: usize,
    queue_capacity: usize,
) -> io::Result<()> {
    writeln!(out, "\nTriage worker pool load test")?;
    writeln!(out, "Configuration:")?;
    writeln!(out, "  Total Requests:  {requests}")?;
    writeln!(out, "  Concurrency:     {concurrency} clients")?;
    writeln!(out, "  Workers:         {workers}")?;
    writeln!(out, "  Queue Size:      {queue_capacity}")
}

/// Writes the per-pattern breakdown, then a summary table and the fastest
/// pattern when more than one ran.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_report(out: &mut impl Write, reports: &[PatternReport]) -> io::Result<()> {
    writeln!(out, "\nRESULTS COMPARISON\n")?;

    for report in reports {
        let stats = &report.stats;
        writeln!(out, "Pattern: {}", report.pattern.display_name())?;
        write!(
            out,
            "├─ Requests:      {} total, {} success, {} error",
            stats.total_requests, stats.success_requests, stats.error_requests
        )?;
        if stats.rejected_requests > 0 {
            write!(out, ", {} rejected", stats.rejected_requests)?;
        }
        writeln!(out)?;
        writeln!(out, "├─ Throughput:    {:.2} req/s", stats.requests_per_second)?;
        writeln!(out, "├─ Duration:      {:.2} seconds", stats.duration)?;
        writeln!(out, "├─ Latency (ms):")?;
        writeln!(out, "│  ├─ Min:        {:.2}", stats.min_latency)?;
        writeln!(out, "│  ├─ Mean:       {:.2}", stats.mean_latency)?;
        writeln!(out, "│  ├─ Median:     {:.2}", stats.median_latency)?;
        writeln!(out, "│  ├─ P95:        {:.2}", stats.p95_latency)?;
        writeln!(out, "│  ├─ P99:        {:.2}", stats.p99_latency)?;
        writeln!(out, "│  └─ Max:        {:.2}", stats.max_latency)?;
        if stats.allocations > 0 {
            writeln!(
                out,
                "├─ Memory:        {} allocations, {:.2} MB",
                stats.allocations, stats.allocated_mb
            )?;
        }
        if stats.error_rate > 0.0 {
            writeln!(out, "└─ Error Rate:    {:.2}%", stats.error_rate)?;
        }
        if stats.rejection_rate > 0.0 {
            writeln!(out, "└─ Rejection:     {:.2}%", stats.rejection_rate)?;
        }
        writeln!(out)?;
    }

    if reports.len() < 2 {
        return Ok(());
    }

    writeln!(out, "Summary Table:")?;
    writeln!(
        out,
        "| {:<19} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} |",
        "Pattern", "Req/s", "Mean(ms)", "P95(ms)", "P99(ms)", "Errors"
    )?;
    writeln!(out, "|{:-<21}|{:-<10}|{:-<10}|{:-<10}|{:-<10}|{:-<10}|", "", "", "", "", "", "")?;
    for report in reports {
        let stats = &report.stats;
        writeln!(
            out,
            "| {:<19} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>7.2}% |",
            report.pattern.display_name(),
            stats.requests_per_second,
            stats.mean_latency,
            stats.p95_latency,
            stats.p99_latency,
            stats.error_rate
        )?;
    }
    writeln!(out)?;

    let Some(best) = reports.iter().max_by(|a, b| {
        a.stats
            .requests_per_second
            .total_cmp(&b.stats.requests_per_second)
    }) else {
        return Ok(());
    };
    writeln!(out, "Winner: {}", best.pattern.display_name())?;
    for other in reports.iter().filter(|r| r.pattern != best.pattern) {
        if other.stats.requests_per_second > 0.0 && best.stats.mean_latency > 0.0 {
            writeln!(
                out,
                "   {:.2}x faster than {} ({:.2}x lower latency)",
                best.stats.requests_per_second / other.stats.requests_per_second,
                other.pattern.display_name(),
                other.stats.mean_latency / best.stats.mean_latency
            )?;
        }
    }
    Ok(())
}
