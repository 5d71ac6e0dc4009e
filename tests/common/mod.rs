//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use iptv_checker::models::{ChannelRecord, ProbeOutcome, ProbeStatus};
use iptv_checker::probe::Probe;
use iptv_checker::scheduler::SchedulerConfig;
use iptv_checker::utils::retry::RetryConfig;

/// The two-channel playlist with one dead and one live stream
pub const DEAD_ALIVE_PLAYLIST: &str = "#EXTM3U\n#EXTINF:-1,Channel A\nhttp://dead.example/stream\n#EXTINF:-1,Channel B\nhttp://alive.example/stream\n";

/// Create channel records for the given URLs
pub fn records(urls: &[&str]) -> Vec<ChannelRecord> {
    urls.iter()
        .enumerate()
        .map(|(i, url)| ChannelRecord::new(format!("#EXTINF:-1,Channel {i}"), *url, i, i * 2 + 2))
        .collect()
}

/// Scheduler settings without backoff delays
pub fn fast_config(processes: usize, concurrent: usize, max_retries: u32) -> SchedulerConfig {
    SchedulerConfig {
        processes,
        concurrent,
        timeout: Duration::from_secs(2),
        probe_retry: RetryConfig::immediate(max_retries),
        shard_retry: RetryConfig::immediate(1),
    }
}

/// Working when the URL contains "alive", refused otherwise
pub struct ByHostProbe;

#[async_trait]
impl Probe for ByHostProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        if url.contains("alive") {
            ProbeOutcome::working(Duration::from_millis(5))
        } else {
            ProbeOutcome::failed(ProbeStatus::broken("connection refused"))
        }
    }
}

/// Replays a scripted sequence of statuses per URL and counts calls
///
/// Once a script runs out its last status repeats. Unscripted URLs are working.
#[derive(Default)]
pub struct ScriptedProbe {
    scripts: Mutex<HashMap<String, Vec<ProbeStatus>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, statuses: Vec<ProbeStatus>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), statuses);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(url.to_string()).or_default();
            *n += 1;
            *n
        };

        let status = self
            .scripts
            .lock()
            .unwrap()
            .get(url)
            .and_then(|s| s.get(call - 1).or_else(|| s.last()).cloned())
            .unwrap_or(ProbeStatus::Working);

        if status.is_working() {
            ProbeOutcome::working(Duration::from_millis(1))
        } else {
            ProbeOutcome::failed(status)
        }
    }
}

/// Records the highest number of probes running at once
#[derive(Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
    pub delay: Duration,
}

impl ConcurrencyProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ConcurrencyProbe {
    async fn probe(&self, _url: &str) -> ProbeOutcome {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        ProbeOutcome::working(self.delay)
    }
}

/// Never answers
pub struct HangingProbe;

#[async_trait]
impl Probe for HangingProbe {
    async fn probe(&self, _url: &str) -> ProbeOutcome {
        std::future::pending().await
    }
}

/// Panics on URLs containing "boom", at most `limit` times in total
pub struct PanickingProbe {
    limit: usize,
    panics: AtomicUsize,
}

impl PanickingProbe {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            panics: AtomicUsize::new(0),
        }
    }

    pub fn always() -> Self {
        Self::new(usize::MAX)
    }

    pub fn panics(&self) -> usize {
        self.panics.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for PanickingProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        if url.contains("boom") {
            let previous = self
                .panics
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < self.limit).then_some(n + 1)
                });
            if previous.is_ok() {
                panic!("probe exploded on {url}");
            }
        }
        ProbeOutcome::working(Duration::from_millis(1))
    }
}
