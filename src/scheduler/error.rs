//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Scheduler settings out of range
    InvalidConfig { field: String, reason: String },

    /// Shard worker panicked
    ShardPanicked {
        shard: usize,
        run: u32,
        message: String,
    },

    /// Shard worker task was cancelled before it finished
    ShardCancelled { shard: usize, run: u32 },

    /// Shard worker could not deliver a verdict
    ResultChannelClosed { shard: usize },

    /// Shard worker returned with channels still lacking a verdict
    IncompleteShard {
        shard: usize,
        run: u32,
        missing: usize,
    },

    /// Shard failed on every allowed run; its remaining channels are unknown
    ShardExhausted {
        shard: usize,
        runs: u32,
        unknown: usize,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { field, reason } => {
                write!(f, "Invalid scheduler setting '{}': {}", field, reason)
            }
            Self::ShardPanicked {
                shard,
                run,
                message,
            } => {
                write!(f, "Shard {} panicked on run {}: {}", shard, run, message)
            }
            Self::ShardCancelled { shard, run } => {
                write!(f, "Shard {} was cancelled on run {}", shard, run)
            }
            Self::ResultChannelClosed { shard } => {
                write!(f, "Shard {} lost its result channel", shard)
            }
            Self::IncompleteShard {
                shard,
                run,
                missing,
            } => {
                write!(
                    f,
                    "Shard {} finished run {} with {} channels unchecked",
                    shard, run, missing
                )
            }
            Self::ShardExhausted {
                shard,
                runs,
                unknown,
            } => {
                write!(
                    f,
                    "Shard {} failed after {} runs, {} channels left unknown",
                    shard, runs, unknown
                )
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a shard panic error from a panic payload
    pub fn shard_panicked(shard: usize, run: u32, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        Self::ShardPanicked {
            shard,
            run,
            message,
        }
    }
}
