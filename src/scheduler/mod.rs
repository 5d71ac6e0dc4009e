//! Two-level concurrency scheduler
//!
//! Channels are split round-robin into `processes` shards. Each shard runs as
//! its own tokio task with a pool of at most `concurrent` probes, and every
//! shard sends terminal verdicts over one result channel to the supervisor,
//! which is the only writer into the [`Aggregator`].
//!
//! # Architecture
//!
//! ```text
//!   channels ──partition──► shard 0 ─┐
//!                           shard 1 ─┼──mpsc──► supervisor ──► Aggregator
//!                           shard N ─┘              │
//!                              ▲                    │ panic / missing verdicts
//!                              └──── re-run ────────┘
//! ```
//!
//! # Failure handling
//!
//! A shard that panics, errors, or ends with channels lacking a verdict is
//! re-run with only those channels, up to `shard_retry.max_retries` times.
//! Verdicts the failed run already delivered are kept. Channels still
//! missing after the last run become `Unknown`.
//!
//! # Modules
//!
//! - [`shard`] - Shard worker and round-robin partitioning
//! - [`error`] - Scheduler error types

pub mod error;
pub mod shard;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub use error::{SchedulerError, SchedulerResult};
pub use shard::{partition, ShardJob, ShardLimits, ShardReport};

use crate::aggregator::Aggregator;
use crate::models::{ChannelRecord, ProbeVerdict};
use crate::probe::Probe;
use crate::utils::retry::RetryConfig;

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of shard workers
    pub processes: usize,

    /// Maximum probes in flight within one shard
    pub concurrent: usize,

    /// Deadline for a single probe attempt
    pub timeout: Duration,

    /// Backoff and budget for re-probing timed-out or errored channels
    pub probe_retry: RetryConfig,

    /// Backoff and budget for re-running failed shards
    pub shard_retry: RetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            processes: 1,
            concurrent: 5,
            timeout: Duration::from_secs(10),
            probe_retry: RetryConfig::default(),
            shard_retry: RetryConfig::new(2),
        }
    }
}

impl SchedulerConfig {
    /// Check that every limit is usable
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` naming the first bad field
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.processes == 0 {
            return Err(SchedulerError::invalid_config(
                "processes",
                "must be at least 1",
            ));
        }
        if self.concurrent == 0 {
            return Err(SchedulerError::invalid_config(
                "concurrent",
                "must be at least 1",
            ));
        }
        if self.timeout.is_zero() {
            return Err(SchedulerError::invalid_config(
                "timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn shard_limits(&self) -> ShardLimits {
        ShardLimits {
            concurrent: self.concurrent,
            timeout: self.timeout,
            retry: self.probe_retry.clone(),
        }
    }
}

/// Cooperative stop signal shared with every shard
///
/// Triggering it stops new dispatches. Probes already in flight run to
/// completion or time out.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request shutdown
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened during one scheduler run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Non-empty shards started
    pub shards: usize,

    /// Shard runs started, re-runs included
    pub shard_runs: usize,

    /// Shard failures, recovered or not
    pub failures: Vec<SchedulerError>,

    /// Shutdown was requested before every channel was dispatched
    pub interrupted: bool,

    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether some channels ended up without a definitive verdict
    pub fn is_partial(&self) -> bool {
        self.interrupted
            || self
                .failures
                .iter()
                .any(|e| matches!(e, SchedulerError::ShardExhausted { .. }))
    }
}

/// Supervisor of the shard workers
pub struct Scheduler {
    config: SchedulerConfig,
    prober: Arc<dyn Probe>,
    shutdown: ShutdownHandle,
}

impl Scheduler {
    /// Create a scheduler around a prober
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if a limit is out of range
    pub fn new(config: SchedulerConfig, prober: Arc<dyn Probe>) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            prober,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Use an externally owned shutdown handle
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Probe every channel and feed the verdicts into `aggregator`
    ///
    /// On return every channel has exactly one verdict in the aggregator,
    /// `Unknown` for those that could not be checked.
    pub async fn run(&self, channels: &[ChannelRecord], aggregator: &mut Aggregator) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let channels: Vec<Arc<ChannelRecord>> =
            channels.iter().cloned().map(Arc::new).collect();
        if channels.is_empty() {
            return summary;
        }

        let capacity = (self.config.concurrent * self.config.processes).clamp(16, 4096);
        let (tx, mut rx) = mpsc::channel::<ProbeVerdict>(capacity);
        let mut tasks: JoinSet<SchedulerResult<ShardReport>> = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, ShardJob> = HashMap::new();

        for (shard_id, shard) in partition(&channels, self.config.processes)
            .into_iter()
            .enumerate()
        {
            if shard.is_empty() {
                debug!(shard = shard_id, "Skipping empty shard");
                continue;
            }
            let job = ShardJob {
                shard_id,
                run: 1,
                channels: shard,
            };
            self.spawn_shard(&mut tasks, &mut running, job, &tx, Duration::ZERO);
            summary.shards += 1;
            summary.shard_runs += 1;
        }

        info!(
            channels = channels.len(),
            shards = summary.shards,
            concurrent = self.config.concurrent,
            timeout_secs = self.config.timeout.as_secs_f64(),
            "Checking channels"
        );

        while !tasks.is_empty() {
            tokio::select! {
                Some(verdict) = rx.recv() => {
                    aggregator.insert(verdict);
                }
                Some(joined) = tasks.join_next_with_id() => {
                    // Everything the finished shard sent is already queued
                    while let Ok(verdict) = rx.try_recv() {
                        aggregator.insert(verdict);
                    }

                    let (id, failure, interrupted) = match joined {
                        Ok((id, Ok(report))) => (id, None, report.interrupted),
                        Ok((id, Err(e))) => (id, Some(e), false),
                        Err(join_error) => {
                            let id = join_error.id();
                            let (shard, run) = running
                                .get(&id)
                                .map(|job| (job.shard_id, job.run))
                                .unwrap_or_default();
                            let failure = if join_error.is_panic() {
                                SchedulerError::shard_panicked(shard, run, join_error.into_panic().as_ref())
                            } else {
                                SchedulerError::ShardCancelled { shard, run }
                            };
                            (id, Some(failure), false)
                        }
                    };

                    let Some(job) = running.remove(&id) else {
                        continue;
                    };
                    summary.interrupted |= interrupted;

                    if let Some(next) = self.settle_shard(job, failure, aggregator, &mut summary) {
                        let delay = self.config.shard_retry.delay_for(next.run - 1);
                        self.spawn_shard(&mut tasks, &mut running, next, &tx, delay);
                        summary.shard_runs += 1;
                    }
                }
            }
        }

        drop(tx);
        while let Some(verdict) = rx.recv().await {
            aggregator.insert(verdict);
        }

        summary.elapsed = started.elapsed();
        info!(
            checked = aggregator.len(),
            shard_runs = summary.shard_runs,
            failures = summary.failures.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Channel checks finished"
        );

        summary
    }

    fn spawn_shard(
        &self,
        tasks: &mut JoinSet<SchedulerResult<ShardReport>>,
        running: &mut HashMap<tokio::task::Id, ShardJob>,
        job: ShardJob,
        results: &mpsc::Sender<ProbeVerdict>,
        delay: Duration,
    ) {
        let prober = Arc::clone(&self.prober);
        let limits = self.config.shard_limits();
        let results = results.clone();
        let shutdown = self.shutdown.subscribe();
        let task_job = job.clone();

        let handle = tasks.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            shard::run_shard(task_job, prober, limits, results, shutdown).await
        });
        running.insert(handle.id(), job);
    }

    /// Decide what happens to a finished shard run
    ///
    /// Returns the follow-up job when the shard must be re-run.
    fn settle_shard(
        &self,
        job: ShardJob,
        failure: Option<SchedulerError>,
        aggregator: &mut Aggregator,
        summary: &mut RunSummary,
    ) -> Option<ShardJob> {
        let missing: Vec<Arc<ChannelRecord>> = job
            .channels
            .iter()
            .filter(|c| !aggregator.contains(c.sequence_index))
            .cloned()
            .collect();

        if let Some(ref e) = failure {
            warn!(shard = job.shard_id, run = job.run, error = %e, "Shard worker failed");
        }

        if missing.is_empty() {
            if let Some(e) = failure {
                summary.failures.push(e);
            }
            debug!(shard = job.shard_id, run = job.run, "Shard complete");
            return None;
        }

        if self.shutdown.is_triggered() {
            for channel in missing {
                aggregator.insert(ProbeVerdict::unknown(
                    channel,
                    "not checked: shutdown requested",
                ));
            }
            summary.interrupted = true;
            return None;
        }

        let failure = failure.unwrap_or(SchedulerError::IncompleteShard {
            shard: job.shard_id,
            run: job.run,
            missing: missing.len(),
        });
        summary.failures.push(failure);

        if self.config.shard_retry.allows_another(job.run) {
            warn!(
                shard = job.shard_id,
                next_run = job.run + 1,
                channels = missing.len(),
                "Re-running shard for unchecked channels"
            );
            return Some(ShardJob {
                shard_id: job.shard_id,
                run: job.run + 1,
                channels: missing,
            });
        }

        let exhausted = SchedulerError::ShardExhausted {
            shard: job.shard_id,
            runs: job.run,
            unknown: missing.len(),
        };
        error!(shard = job.shard_id, error = %exhausted, "Giving up on shard");
        for channel in missing {
            aggregator.insert(ProbeVerdict::unknown(
                channel,
                format!("shard {} failed after {} runs", job.shard_id, job.run),
            ));
        }
        summary.failures.push(exhausted);

        None
    }
}
