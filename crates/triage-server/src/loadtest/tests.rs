use super::*;
use clap::Parser;

fn config(requests: usize, concurrency: usize, patterns: PatternSelection) -> LoadTestConfig {
    LoadTestConfig {
        requests,
        concurrency,
        pool: PoolConfig::new(2, 8),
        simulator: SimulatorConfig::fixed(Duration::from_millis(5)),
        patterns: patterns.patterns(),
        json: true,
    }
}

#[test]
fn remainder_goes_to_the_first_clients() {
    assert_eq!(split_requests(10, 4), vec![3, 3, 2, 2]);
    assert_eq!(split_requests(3, 5), vec![1, 1, 1, 0, 0]);
    assert_eq!(split_requests(10, 4).iter().sum::<usize>(), 10);
    assert!(split_requests(10, 0).is_empty());
}

#[test]
fn keys_cycle_through_the_key_space() {
    assert_eq!(patient_key(0, 0), "P00000");
    assert_eq!(patient_key(2, 7), "P02007");
    assert_eq!(patient_key(10, 5), "P00005");
    assert!(triage::validate_key(&patient_key(99, 999)).is_ok());
}

#[test]
fn args_validate_into_config() {
    let args = LoadTestArgs::try_parse_from([
        "triage-loadtest",
        "--requests",
        "50",
        "--pattern",
        "optimized",
        "--json",
    ])
    .unwrap();
    let config = LoadTestConfig::try_from(args).unwrap();
    assert_eq!(config.requests, 50);
    assert_eq!(config.concurrency, 100);
    assert_eq!(config.patterns, &[Pattern::Optimized]);
    assert!(config.json);

    let args =
        LoadTestArgs::try_parse_from(["triage-loadtest", "--concurrency", "0"]).unwrap();
    assert!(LoadTestConfig::try_from(args).is_err());

    let args = LoadTestArgs::try_parse_from([
        "triage-loadtest",
        "--min-latency",
        "10",
        "--max-latency",
        "5",
    ])
    .unwrap();
    assert!(LoadTestConfig::try_from(args).is_err());
}

#[tokio::test(start_paused = true)]
async fn every_request_is_accounted_for() {
    let config = config(60, 6, PatternSelection::All);
    let reports = run(&config).await.unwrap();
    assert_eq!(reports.len(), 2);

    for report in &reports {
        let stats = &report.stats;
        assert_eq!(stats.total_requests, 60);
        assert_eq!(stats.success_requests + stats.error_requests, 60);
        assert_eq!(stats.error_requests, 0);
        assert_eq!(stats.rejected_requests, 0);
        assert!(stats.min_latency <= stats.p99_latency);
    }

    let fresh = &reports[0].stats;
    let recycled = &reports[1].stats;
    assert_eq!(reports[0].pattern, Pattern::Workerpool);
    assert_eq!(fresh.allocations, 60);
    assert!(recycled.allocations < fresh.allocations);
    assert_eq!(
        recycled.allocated_bytes,
        recycled.allocations * size_of::<Response>() as u64
    );
}

#[tokio::test(start_paused = true)]
async fn saturated_queue_counts_rejections() {
    let mut config = config(40, 20, PatternSelection::Workerpool);
    config.pool = PoolConfig::new(1, 1).with_enqueue_wait(Duration::from_millis(1));
    config.simulator = SimulatorConfig::fixed(Duration::from_millis(50));

    let reports = run(&config).await.unwrap();
    let stats = &reports[0].stats;
    assert!(stats.rejected_requests > 0);
    assert_eq!(
        stats.total_requests,
        stats.success_requests + stats.error_requests + stats.rejected_requests
    );
    assert_eq!(stats.total_requests, 40);
}

fn report(pattern: Pattern, rps: f64, mean: f64) -> PatternReport {
    PatternReport {
        pattern,
        stats: triage::Stats {
            total_requests: 10,
            success_requests: 10,
            requests_per_second: rps,
            mean_latency: mean,
            ..triage::Stats::default()
        },
    }
}

#[test]
fn report_names_the_fastest_pattern() {
    let reports = [
        report(Pattern::Workerpool, 100.0, 20.0),
        report(Pattern::Optimized, 200.0, 10.0),
    ];
    let mut out = Vec::new();
    write_report(&mut out, &reports).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("Pattern: Worker Pool"));
    assert!(text.contains("Summary Table:"));
    assert!(text.contains("Winner: Optimized"));
    assert!(text.contains("2.00x faster than Worker Pool (2.00x lower latency)"));
}

#[test]
fn single_pattern_report_has_no_summary() {
    let mut out = Vec::new();
    write_report(&mut out, &[report(Pattern::Optimized, 50.0, 5.0)]).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Pattern: Optimized"));
    assert!(!text.contains("Winner"));
}

#[test]
fn json_output_nests_latencies() {
    let mut out = Vec::new();
    write_json(&mut out, &[report(Pattern::Workerpool, 123.456, 7.891)]).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(json[0]["pattern"], "workerpool");
    assert_eq!(json[0]["requests_per_second"], 123.46);
    assert_eq!(json[0]["latency_ms"]["mean"], 7.89);
    assert!(json[0].get("memory").is_none());
}
