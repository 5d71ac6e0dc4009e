//! Scheduler integration tests with stub probers
//!
//! Covers the concurrency bound, the retry budget, per-probe timeouts and
//! recovery from shard workers that panic.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use iptv_checker::aggregator::Aggregator;
use iptv_checker::models::{ProbeOutcome, ProbeStatus};
use iptv_checker::probe::Probe;
use iptv_checker::scheduler::{Scheduler, SchedulerConfig, SchedulerError, ShutdownHandle};

use common::{
    fast_config, records, ConcurrencyProbe, HangingProbe, PanickingProbe, ScriptedProbe,
};

fn numbered_urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("http://stream{i}.example/live"))
        .collect()
}

async fn run_all(
    config: SchedulerConfig,
    prober: Arc<dyn Probe>,
    urls: &[&str],
) -> (iptv_checker::aggregator::CheckOutcome, iptv_checker::scheduler::RunSummary) {
    let channels = records(urls);
    let scheduler = Scheduler::new(config, prober).unwrap();
    let mut aggregator = Aggregator::new(channels.len());
    let summary = scheduler.run(&channels, &mut aggregator).await;
    (aggregator.finish(), summary)
}

/// A single worker never has more than `concurrent` probes in flight
#[tokio::test]
async fn test_concurrency_bound_single_worker() {
    let urls = numbered_urls(24);
    let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(20)));

    let (outcome, _) = run_all(fast_config(1, 3, 0), probe.clone(), &urls).await;

    assert_eq!(outcome.counts.working, 24);
    assert!(probe.peak() <= 3, "peak was {}", probe.peak());
    assert!(probe.peak() >= 1);
}

/// The bound applies per worker, so the global peak is at most workers x concurrent
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bound_multiple_workers() {
    let urls = numbered_urls(40);
    let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(15)));

    let (outcome, summary) = run_all(fast_config(2, 3, 0), probe.clone(), &urls).await;

    assert_eq!(outcome.counts.working, 40);
    assert_eq!(summary.shards, 2);
    assert!(probe.peak() <= 6, "peak was {}", probe.peak());
}

/// A channel that keeps timing out is probed exactly max_retries + 1 times
#[tokio::test]
async fn test_retry_budget_for_timeouts() {
    let url = "http://slow.example/live";
    let probe = Arc::new(ScriptedProbe::new().script(url, vec![ProbeStatus::TimedOut]));

    let (outcome, _) = run_all(fast_config(1, 2, 2), probe.clone(), &[url]).await;

    assert_eq!(probe.calls(url), 3);
    assert_eq!(outcome.counts.timed_out, 1);
    assert_eq!(outcome.broken.len(), 1);
}

/// Errors are retried too, and a later success wins
#[tokio::test]
async fn test_retry_recovers_after_error() {
    let url = "http://flaky.example/live";
    let probe = Arc::new(ScriptedProbe::new().script(
        url,
        vec![ProbeStatus::error("connection reset"), ProbeStatus::Working],
    ));

    let (outcome, _) = run_all(fast_config(1, 1, 2), probe.clone(), &[url]).await;

    assert_eq!(probe.calls(url), 2);
    assert_eq!(outcome.counts.working, 1);
    assert!(outcome.broken.is_empty());
}

/// Broken is definitive and never retried
#[tokio::test]
async fn test_broken_is_not_retried() {
    let url = "http://gone.example/live";
    let probe = Arc::new(ScriptedProbe::new().script(url, vec![ProbeStatus::broken("HTTP 404")]));

    let (outcome, _) = run_all(fast_config(1, 1, 3), probe.clone(), &[url]).await;

    assert_eq!(probe.calls(url), 1);
    assert_eq!(outcome.counts.broken, 1);
    assert_eq!(outcome.failure_reasons, vec![("HTTP 404".to_string(), 1)]);
}

/// A probe that never answers ends as TimedOut shortly after the deadline
#[tokio::test]
async fn test_hanging_probe_times_out() {
    let config = SchedulerConfig {
        timeout: Duration::from_millis(100),
        ..fast_config(1, 4, 0)
    };

    let started = Instant::now();
    let (outcome, _) = run_all(
        config,
        Arc::new(HangingProbe),
        &["http://a.example/", "http://b.example/"],
    )
    .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.counts.timed_out, 2);
    assert_eq!(outcome.broken.len(), 2);
}

/// Mixed results still classify every channel exactly once
#[tokio::test]
async fn test_every_channel_classified_once() {
    let urls = numbered_urls(30);
    let mut probe = ScriptedProbe::new();
    for (i, url) in urls.iter().enumerate() {
        let status = match i % 3 {
            0 => ProbeStatus::Working,
            1 => ProbeStatus::broken("connection refused"),
            _ => ProbeStatus::TimedOut,
        };
        probe = probe.script(url, vec![status]);
    }
    let urls: Vec<&str> = urls.iter().map(String::as_str).collect();

    let (outcome, summary) = run_all(fast_config(4, 2, 1), Arc::new(probe), &urls).await;

    assert_eq!(outcome.working.len() + outcome.broken.len(), 30);
    assert_eq!(outcome.working.len(), 10);
    assert!(outcome.unknown.is_empty());
    assert!(summary.failures.is_empty());
    assert!(outcome
        .working
        .windows(2)
        .all(|w| w[0].sequence_index < w[1].sequence_index));
}

/// A worker that panics once is re-run for its unchecked channels
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shard_panic_recovers() {
    let urls = [
        "http://a.example/",
        "http://b.example/",
        "http://boom.example/",
        "http://c.example/",
        "http://d.example/",
        "http://e.example/",
    ];
    let probe = Arc::new(PanickingProbe::new(1));

    let channels = records(&urls);
    let scheduler = Scheduler::new(fast_config(2, 1, 0), probe.clone()).unwrap();
    let mut aggregator = Aggregator::new(channels.len());
    let summary = scheduler.run(&channels, &mut aggregator).await;

    assert_eq!(aggregator.rejected(), 0);
    let outcome = aggregator.finish();

    assert_eq!(probe.panics(), 1);
    assert_eq!(outcome.working.len(), 6);
    assert!(outcome.unknown.is_empty());
    assert!(summary
        .failures
        .iter()
        .any(|e| matches!(e, SchedulerError::ShardPanicked { .. })));
    assert!(!summary.is_partial());
    assert_eq!(summary.shard_runs, 3);
}

/// A worker that keeps panicking leaves its remaining channels Unknown
#[tokio::test]
async fn test_shard_panic_exhausts_runs() {
    let urls = ["http://a.example/", "http://boom.example/", "http://c.example/"];
    let probe = Arc::new(PanickingProbe::always());

    let (outcome, summary) = run_all(fast_config(1, 1, 0), probe, &urls).await;

    assert_eq!(outcome.working.len(), 1);
    assert_eq!(outcome.working[0].url, "http://a.example/");

    let unknown: Vec<&str> = outcome.unknown.iter().map(|(c, _)| c.url.as_str()).collect();
    assert_eq!(unknown, vec!["http://boom.example/", "http://c.example/"]);
    assert!(outcome.unknown[0].1.contains("failed after 2 runs"));

    assert!(summary.is_partial());
    assert!(matches!(
        summary.failures.last(),
        Some(SchedulerError::ShardExhausted { runs: 2, unknown: 2, .. })
    ));
}

/// Stops the run from inside a probe
struct StopOnProbe {
    shutdown: ShutdownHandle,
}

#[async_trait]
impl Probe for StopOnProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        if url.contains("stop") {
            self.shutdown.trigger();
        }
        ProbeOutcome::working(Duration::from_millis(1))
    }
}

/// Shutdown lets in-flight probes finish and leaves the rest Unknown
#[tokio::test]
async fn test_shutdown_mid_run() {
    let shutdown = ShutdownHandle::new();
    let probe = Arc::new(StopOnProbe {
        shutdown: shutdown.clone(),
    });
    let urls = [
        "http://a.example/",
        "http://stop.example/",
        "http://c.example/",
        "http://d.example/",
    ];

    let channels = records(&urls);
    let scheduler = Scheduler::new(fast_config(1, 1, 0), probe)
        .unwrap()
        .with_shutdown(shutdown);
    let mut aggregator = Aggregator::new(channels.len());
    let summary = scheduler.run(&channels, &mut aggregator).await;
    let outcome = aggregator.finish();

    assert!(summary.interrupted);
    assert_eq!(outcome.working.len(), 2);
    assert_eq!(outcome.unknown.len(), 2);
    assert!(outcome
        .unknown
        .iter()
        .all(|(_, reason)| reason.contains("shutdown")));
}
