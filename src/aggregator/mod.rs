//! Result aggregation
//!
//! The [`Aggregator`] is the single owner of verdicts for one playlist. It
//! accepts them in any order, rejects duplicates, keeps running counts, and
//! hands back both categories in input order once checking is done.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{Category, ChannelRecord, CheckCounts, ProbeVerdict};

/// Callback invoked after every accepted verdict
///
/// Observers only watch; nothing they do feeds back into checking.
pub trait ProgressObserver: Send {
    fn on_update(&mut self, counts: &CheckCounts, latest: &ProbeVerdict);
}

/// Observer that logs progress every `interval` completed channels
pub struct LogProgress {
    label: String,
    interval: usize,
}

impl LogProgress {
    pub fn new(label: impl Into<String>, interval: usize) -> Self {
        Self {
            label: label.into(),
            interval: interval.max(1),
        }
    }
}

impl ProgressObserver for LogProgress {
    fn on_update(&mut self, counts: &CheckCounts, _latest: &ProbeVerdict) {
        let completed = counts.completed();
        if completed % self.interval == 0 || completed == counts.total {
            info!(
                playlist = %self.label,
                completed,
                total = counts.total,
                working = counts.working,
                failed = counts.not_working(),
                percent = format!("{:.1}", counts.completion_percentage()),
                "Progress"
            );
        }
    }
}

/// Final aggregated result for one playlist
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    /// Working channels in input order
    pub working: Vec<Arc<ChannelRecord>>,

    /// Broken, timed-out and errored channels in input order
    pub broken: Vec<Arc<ChannelRecord>>,

    /// Channels without a definitive verdict, with the reason
    pub unknown: Vec<(Arc<ChannelRecord>, String)>,

    pub counts: CheckCounts,

    /// Distinct failure reasons with occurrence counts, most frequent first
    pub failure_reasons: Vec<(String, usize)>,
}

impl CheckOutcome {
    /// Channels of one output category
    pub fn category(&self, category: Category) -> &[Arc<ChannelRecord>] {
        match category {
            Category::Working => &self.working,
            Category::Broken => &self.broken,
        }
    }
}

/// Single-writer collector of verdicts
pub struct Aggregator {
    verdicts: BTreeMap<usize, ProbeVerdict>,
    counts: CheckCounts,
    rejected: usize,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl Aggregator {
    /// Create an aggregator expecting `total` channels
    pub fn new(total: usize) -> Self {
        Self {
            verdicts: BTreeMap::new(),
            counts: CheckCounts::new(total),
            rejected: 0,
            observer: None,
        }
    }

    /// Attach a progress observer
    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Record a verdict
    ///
    /// Returns `false` and leaves the state untouched when a verdict for the
    /// same sequence index was already recorded.
    pub fn insert(&mut self, verdict: ProbeVerdict) -> bool {
        let index = verdict.sequence_index();
        if self.verdicts.contains_key(&index) {
            warn!(
                sequence_index = index,
                channel = %verdict.channel.name(),
                status = %verdict.status,
                "Duplicate verdict rejected"
            );
            self.rejected += 1;
            return false;
        }

        self.counts.record(&verdict.status);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_update(&self.counts, &verdict);
        }
        self.verdicts.insert(index, verdict);
        true
    }

    /// Whether a verdict exists for `sequence_index`
    pub fn contains(&self, sequence_index: usize) -> bool {
        self.verdicts.contains_key(&sequence_index)
    }

    pub fn counts(&self) -> &CheckCounts {
        &self.counts
    }

    /// Number of duplicate verdicts rejected so far
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Split the collected verdicts into ordered categories
    pub fn finish(self) -> CheckOutcome {
        let mut outcome = CheckOutcome {
            counts: self.counts,
            ..Default::default()
        };
        let mut reasons: HashMap<String, usize> = HashMap::new();

        // BTreeMap iteration is already in sequence order
        for verdict in self.verdicts.into_values() {
            if let Some(reason) = verdict.status.reason() {
                *reasons.entry(reason.to_string()).or_default() += 1;
            }

            match Category::for_status(&verdict.status) {
                Some(Category::Working) => outcome.working.push(verdict.channel),
                Some(Category::Broken) => outcome.broken.push(verdict.channel),
                None => {
                    let reason = verdict.status.reason().unwrap_or_default().to_string();
                    outcome.unknown.push((verdict.channel, reason));
                }
            }
        }

        let mut failure_reasons: Vec<(String, usize)> = reasons.into_iter().collect();
        failure_reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        outcome.failure_reasons = failure_reasons;

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeStatus;
    use std::sync::Mutex;

    fn verdict(index: usize, status: ProbeStatus) -> ProbeVerdict {
        let channel = Arc::new(ChannelRecord::new(
            format!("#EXTINF:-1,Channel {index}"),
            format!("http://host/{index}"),
            index,
            index * 2 + 2,
        ));
        ProbeVerdict {
            channel,
            status,
            latency: None,
            attempts: 1,
        }
    }

    #[test]
    fn test_finish_restores_order() {
        let mut aggregator = Aggregator::new(5);
        aggregator.insert(verdict(4, ProbeStatus::Working));
        aggregator.insert(verdict(1, ProbeStatus::broken("HTTP 404")));
        aggregator.insert(verdict(0, ProbeStatus::Working));
        aggregator.insert(verdict(3, ProbeStatus::TimedOut));
        aggregator.insert(verdict(2, ProbeStatus::error("bad")));

        let outcome = aggregator.finish();
        let idx = |v: &[Arc<ChannelRecord>]| v.iter().map(|c| c.sequence_index).collect::<Vec<_>>();

        assert_eq!(idx(&outcome.working), vec![0, 4]);
        assert_eq!(idx(&outcome.broken), vec![1, 2, 3]);
        assert!(outcome.unknown.is_empty());
        assert_eq!(outcome.counts.completed(), 5);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut aggregator = Aggregator::new(1);
        assert!(aggregator.insert(verdict(0, ProbeStatus::TimedOut)));
        assert!(!aggregator.insert(verdict(0, ProbeStatus::Working)));

        assert_eq!(aggregator.rejected(), 1);
        assert_eq!(aggregator.counts().timed_out, 1);
        assert_eq!(aggregator.counts().working, 0);
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_unknown_excluded_from_outputs() {
        let mut aggregator = Aggregator::new(2);
        aggregator.insert(verdict(0, ProbeStatus::Working));
        aggregator.insert(verdict(1, ProbeStatus::unknown("shard failed")));

        let outcome = aggregator.finish();
        assert_eq!(outcome.working.len(), 1);
        assert!(outcome.broken.is_empty());
        assert_eq!(outcome.unknown.len(), 1);
        assert_eq!(outcome.unknown[0].1, "shard failed");
        assert_eq!(outcome.counts.unknown, 1);
    }

    #[test]
    fn test_failure_reasons_sorted_by_frequency() {
        let mut aggregator = Aggregator::new(4);
        aggregator.insert(verdict(0, ProbeStatus::broken("HTTP 404")));
        aggregator.insert(verdict(1, ProbeStatus::TimedOut));
        aggregator.insert(verdict(2, ProbeStatus::broken("HTTP 404")));
        aggregator.insert(verdict(3, ProbeStatus::Working));

        let outcome = aggregator.finish();
        assert_eq!(
            outcome.failure_reasons,
            vec![("HTTP 404".to_string(), 2), ("Timeout".to_string(), 1)]
        );
    }

    struct Recorder(Arc<Mutex<Vec<usize>>>);

    impl ProgressObserver for Recorder {
        fn on_update(&mut self, counts: &CheckCounts, _latest: &ProbeVerdict) {
            self.0.lock().unwrap().push(counts.completed());
        }
    }

    #[test]
    fn test_observer_called_per_accepted_verdict() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aggregator = Aggregator::new(2).with_observer(Box::new(Recorder(seen.clone())));

        aggregator.insert(verdict(0, ProbeStatus::Working));
        aggregator.insert(verdict(0, ProbeStatus::Working));
        aggregator.insert(verdict(1, ProbeStatus::Working));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
