//! Shard worker: a bounded pool of probes over one slice of the playlist
//!
//! Channels are dispatched FIFO, at most `concurrent` at a time. A retryable
//! outcome goes back to the end of the queue and waits out its backoff
//! before the next attempt. Terminal verdicts leave through the result
//! channel as soon as they are known.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::error::{SchedulerError, SchedulerResult};
use crate::models::{ChannelRecord, ChannelState, ProbeVerdict};
use crate::probe::{probe_with_timeout, Probe};
use crate::utils::retry::RetryConfig;

/// One run of one shard
#[derive(Debug, Clone)]
pub struct ShardJob {
    pub shard_id: usize,
    /// 1-based run number; re-runs after a failure increment it
    pub run: u32,
    pub channels: Vec<Arc<ChannelRecord>>,
}

/// Limits applied inside a shard worker
#[derive(Debug, Clone)]
pub struct ShardLimits {
    pub concurrent: usize,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

/// What a shard worker did before returning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardReport {
    /// Terminal verdicts sent
    pub delivered: usize,
    /// Probe attempts made, retries included
    pub attempts: usize,
    /// Dispatch stopped because shutdown was requested
    pub interrupted: bool,
}

/// Partition channels into `processes` round-robin shards
///
/// Channel `i` lands in shard `i % processes`. Shards keep input order.
pub fn partition<T: Clone>(items: &[T], processes: usize) -> Vec<Vec<T>> {
    let processes = processes.max(1);
    let mut shards: Vec<Vec<T>> = (0..processes)
        .map(|_| Vec::with_capacity(items.len() / processes + 1))
        .collect();

    for (i, item) in items.iter().enumerate() {
        shards[i % processes].push(item.clone());
    }

    shards
}

/// Drain one shard through the prober
///
/// # Errors
///
/// Returns `SchedulerError::ResultChannelClosed` if the supervisor stopped
/// listening for verdicts
pub async fn run_shard(
    job: ShardJob,
    prober: Arc<dyn Probe>,
    limits: ShardLimits,
    results: mpsc::Sender<ProbeVerdict>,
    shutdown: watch::Receiver<bool>,
) -> SchedulerResult<ShardReport> {
    let ShardJob {
        shard_id,
        run,
        channels,
    } = job;
    let concurrent = limits.concurrent.max(1);

    debug!(
        shard = shard_id,
        run,
        channels = channels.len(),
        concurrent,
        "Shard worker started"
    );

    let mut queue: VecDeque<(Arc<ChannelRecord>, ChannelState)> = channels
        .into_iter()
        .map(|channel| (channel, ChannelState::new()))
        .collect();
    let mut in_flight = FuturesUnordered::new();
    let mut report = ShardReport::default();

    loop {
        while in_flight.len() < concurrent && !report.interrupted {
            if *shutdown.borrow() {
                info!(
                    shard = shard_id,
                    undispatched = queue.len(),
                    "Shutdown requested, dispatch stopped"
                );
                report.interrupted = true;
                break;
            }

            let Some((channel, state)) = queue.pop_front() else {
                break;
            };
            let Some(ChannelState::InFlight { attempt }) = state.dispatch() else {
                continue;
            };

            let backoff = limits.retry.delay_for(attempt - 1);
            let prober = Arc::clone(&prober);
            let timeout = limits.timeout;
            report.attempts += 1;

            in_flight.push(async move {
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
                let outcome = probe_with_timeout(prober.as_ref(), &channel.url, timeout).await;
                (channel, attempt, outcome)
            });
        }

        let Some((channel, attempt, outcome)) = in_flight.next().await else {
            break;
        };

        let state = ChannelState::InFlight { attempt };
        match state.complete(&outcome.status, limits.retry.max_retries) {
            Some(ChannelState::Pending { attempts }) => {
                debug!(
                    shard = shard_id,
                    channel = %channel.name(),
                    status = %outcome.status,
                    attempts,
                    "Probe will be retried"
                );
                queue.push_back((channel, ChannelState::Pending { attempts }));
            }
            _ => {
                info!(
                    shard = shard_id,
                    channel = %channel.name(),
                    status = %outcome.status,
                    latency_ms = outcome.latency.map(|d| d.as_millis() as u64),
                    attempts = attempt,
                    "Channel checked"
                );
                let verdict = ProbeVerdict::from_outcome(channel, outcome, attempt);
                results
                    .send(verdict)
                    .await
                    .map_err(|_| SchedulerError::ResultChannelClosed { shard: shard_id })?;
                report.delivered += 1;
            }
        }
    }

    debug!(
        shard = shard_id,
        run,
        delivered = report.delivered,
        attempts = report.attempts,
        "Shard worker finished"
    );

    Ok(report)
}
