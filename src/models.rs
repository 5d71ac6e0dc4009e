// Core data structures for the playlist checker

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// One playlist entry: a metadata line plus its stream URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Raw `#EXTINF:` line, kept exactly as read (minus the line terminator)
    pub extinf_line: String,
    /// Stream address to probe
    pub url: String,
    /// 0-based position among the parsed channels of the source file
    pub sequence_index: usize,
    /// 1-based line of `extinf_line` in the source file
    pub line_number: usize,
}

impl ChannelRecord {
    pub fn new(
        extinf_line: impl Into<String>,
        url: impl Into<String>,
        sequence_index: usize,
        line_number: usize,
    ) -> Self {
        Self {
            extinf_line: extinf_line.into(),
            url: url.into(),
            sequence_index,
            line_number,
        }
    }

    /// Display name: the text after the last comma of the metadata line
    pub fn name(&self) -> &str {
        static NAME_RE: OnceLock<Regex> = OnceLock::new();

        let re = NAME_RE.get_or_init(|| Regex::new(r",([^,]+)$").expect("Invalid regex pattern"));

        re.captures(self.extinf_line.trim_end())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown Channel")
    }
}

/// Outcome category of a probe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// Connection established and a response received in time
    Working,
    /// Refused, unresolvable, or an explicit error response
    Broken { reason: String },
    /// No definitive answer within the timeout
    TimedOut,
    /// Malformed URL, unsupported scheme or unexpected protocol failure
    Error { reason: String },
    /// Never probed to completion because its shard could not finish
    Unknown { reason: String },
}

impl ProbeStatus {
    pub fn broken(reason: impl Into<String>) -> Self {
        Self::Broken {
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self, Self::Working)
    }

    /// Statuses that may go back to `Pending` while the retry budget allows
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Error { .. })
    }

    /// Short label used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Broken { .. } => "broken",
            Self::TimedOut => "timed-out",
            Self::Error { .. } => "error",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Reason shown in failure summaries, `None` for working channels
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Working => None,
            Self::TimedOut => Some("Timeout"),
            Self::Broken { reason } | Self::Error { reason } | Self::Unknown { reason } => {
                Some(reason)
            }
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) if !matches!(self, Self::TimedOut) => {
                write!(f, "{} ({reason})", self.label())
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// Result of a single probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    /// Time to first response, only set when the stream is working
    pub latency: Option<Duration>,
}

impl ProbeOutcome {
    pub fn working(latency: Duration) -> Self {
        Self {
            status: ProbeStatus::Working,
            latency: Some(latency),
        }
    }

    pub fn failed(status: ProbeStatus) -> Self {
        Self {
            status,
            latency: None,
        }
    }

    pub fn timed_out() -> Self {
        Self::failed(ProbeStatus::TimedOut)
    }
}

/// Terminal classification of one channel
#[derive(Debug, Clone)]
pub struct ProbeVerdict {
    pub channel: Arc<ChannelRecord>,
    pub status: ProbeStatus,
    pub latency: Option<Duration>,
    /// Number of probe attempts made (0 when never probed)
    pub attempts: u32,
}

impl ProbeVerdict {
    /// Build the final verdict from the last probe attempt
    pub fn from_outcome(channel: Arc<ChannelRecord>, outcome: ProbeOutcome, attempts: u32) -> Self {
        let latency = if outcome.status.is_working() {
            outcome.latency
        } else {
            None
        };

        Self {
            channel,
            status: outcome.status,
            latency,
            attempts,
        }
    }

    /// Verdict for a channel that could not be probed to completion
    pub fn unknown(channel: Arc<ChannelRecord>, reason: impl Into<String>) -> Self {
        Self {
            channel,
            status: ProbeStatus::unknown(reason),
            latency: None,
            attempts: 0,
        }
    }

    pub fn sequence_index(&self) -> usize {
        self.channel.sequence_index
    }
}

/// Per-channel state machine driven by the scheduler
///
/// `Pending -> InFlight -> Done`, with `InFlight -> Pending` allowed for
/// retryable outcomes while the retry budget is not exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Pending { attempts: u32 },
    InFlight { attempt: u32 },
    Done(ProbeStatus),
}

impl ChannelState {
    pub fn new() -> Self {
        Self::Pending { attempts: 0 }
    }

    /// Transition `Pending -> InFlight`
    pub fn dispatch(&self) -> Option<Self> {
        match self {
            Self::Pending { attempts } => Some(Self::InFlight {
                attempt: attempts + 1,
            }),
            _ => None,
        }
    }

    /// Transition out of `InFlight` given the attempt outcome and retry budget
    pub fn complete(&self, status: &ProbeStatus, max_retries: u32) -> Option<Self> {
        match self {
            Self::InFlight { attempt } => {
                if status.is_retryable() && *attempt <= max_retries {
                    Some(Self::Pending { attempts: *attempt })
                } else {
                    Some(Self::Done(status.clone()))
                }
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

/// Output category of a checked channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Working,
    Broken,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Broken => "broken",
        }
    }

    pub fn all() -> [Self; 2] {
        [Self::Working, Self::Broken]
    }

    /// Category a terminal status is written to, `None` for unknown channels
    pub fn for_status(status: &ProbeStatus) -> Option<Self> {
        match status {
            ProbeStatus::Working => Some(Self::Working),
            ProbeStatus::Broken { .. } | ProbeStatus::TimedOut | ProbeStatus::Error { .. } => {
                Some(Self::Broken)
            }
            ProbeStatus::Unknown { .. } => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running counters over the verdicts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCounts {
    /// Channels handed to the scheduler
    pub total: usize,
    pub working: usize,
    /// Explicitly rejected (does not include timed-out or errored)
    pub broken: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub unknown: usize,
}

impl CheckCounts {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, status: &ProbeStatus) {
        match status {
            ProbeStatus::Working => self.working += 1,
            ProbeStatus::Broken { .. } => self.broken += 1,
            ProbeStatus::TimedOut => self.timed_out += 1,
            ProbeStatus::Error { .. } => self.errored += 1,
            ProbeStatus::Unknown { .. } => self.unknown += 1,
        }
    }

    /// Channels with a verdict so far
    pub fn completed(&self) -> usize {
        self.working + self.broken + self.timed_out + self.errored + self.unknown
    }

    /// Channels written to the broken playlist
    pub fn not_working(&self) -> usize {
        self.broken + self.timed_out + self.errored
    }

    /// Completion percentage (0.0 - 100.0)
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed() as f64 / self.total as f64) * 100.0
    }

    /// Working share among channels with a definitive verdict (0.0 - 1.0)
    pub fn working_rate(&self) -> f64 {
        let checked = self.working + self.not_working();
        if checked == 0 {
            return 0.0;
        }
        self.working as f64 / checked as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_extraction() {
        let channel = ChannelRecord::new(
            r#"#EXTINF:-1 tvg-id="bbc1" group-title="UK",BBC One HD"#,
            "http://example.com/bbc1",
            0,
            2,
        );
        assert_eq!(channel.name(), "BBC One HD");

        let unnamed = ChannelRecord::new("#EXTINF:-1", "http://example.com", 0, 2);
        assert_eq!(unnamed.name(), "Unknown Channel");
    }

    #[test]
    fn test_state_machine_retry_budget() {
        let state = ChannelState::new();
        let in_flight = state.dispatch().unwrap();
        assert_eq!(in_flight, ChannelState::InFlight { attempt: 1 });

        // First timeout goes back to pending with a budget of one retry
        let next = in_flight.complete(&ProbeStatus::TimedOut, 1).unwrap();
        assert_eq!(next, ChannelState::Pending { attempts: 1 });

        // Second timeout is terminal
        let in_flight = next.dispatch().unwrap();
        let done = in_flight.complete(&ProbeStatus::TimedOut, 1).unwrap();
        assert_eq!(done, ChannelState::Done(ProbeStatus::TimedOut));
        assert!(done.is_terminal());
        assert!(done.dispatch().is_none());
    }

    #[test]
    fn test_state_machine_broken_is_terminal() {
        let in_flight = ChannelState::new().dispatch().unwrap();
        let done = in_flight
            .complete(&ProbeStatus::broken("HTTP 404"), 5)
            .unwrap();
        assert!(done.is_terminal());
    }

    #[test]
    fn test_category_for_status() {
        assert_eq!(
            Category::for_status(&ProbeStatus::Working),
            Some(Category::Working)
        );
        assert_eq!(
            Category::for_status(&ProbeStatus::TimedOut),
            Some(Category::Broken)
        );
        assert_eq!(
            Category::for_status(&ProbeStatus::error("invalid URL")),
            Some(Category::Broken)
        );
        assert_eq!(Category::for_status(&ProbeStatus::unknown("shard")), None);
    }

    #[test]
    fn test_verdict_drops_latency_when_not_working() {
        let channel = Arc::new(ChannelRecord::new("#EXTINF:-1,A", "http://a", 0, 2));
        let outcome = ProbeOutcome {
            status: ProbeStatus::TimedOut,
            latency: Some(Duration::from_millis(5)),
        };
        let verdict = ProbeVerdict::from_outcome(channel, outcome, 2);
        assert!(verdict.latency.is_none());
        assert_eq!(verdict.attempts, 2);
    }

    #[test]
    fn test_counts() {
        let mut counts = CheckCounts::new(5);
        counts.record(&ProbeStatus::Working);
        counts.record(&ProbeStatus::broken("HTTP 500"));
        counts.record(&ProbeStatus::TimedOut);
        counts.record(&ProbeStatus::error("bad"));

        assert_eq!(counts.completed(), 4);
        assert_eq!(counts.not_working(), 3);
        assert!((counts.completion_percentage() - 80.0).abs() < 0.01);
        assert!((counts.working_rate() - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProbeStatus::Working.to_string(), "working");
        assert_eq!(ProbeStatus::TimedOut.to_string(), "timed-out");
        assert_eq!(
            ProbeStatus::broken("HTTP 404").to_string(),
            "broken (HTTP 404)"
        );
    }
}
