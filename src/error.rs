//! Unified error handling for the iptv-checker crate
//!
//! This module provides a unified error type that consolidates the errors a
//! playlist check can end with into a single `Error` enum, while maintaining
//! the ability to use domain-specific errors when needed.
//!
//! Probe failures never show up here: they become verdicts inside the probe
//! engine and are reported per channel.

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{PlaylistError, ProbeError};

/// Classification of errors for logging and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP client, sockets)
    Network,
    /// Playlist decoding and parsing errors
    Parsing,
    /// Playlist file I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Shard worker errors
    Scheduler,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
        }
    }
}

/// Unified error type for the iptv-checker crate
#[derive(Error, Debug)]
pub enum Error {
    /// Playlist read, decode and write errors
    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    /// Probe setup errors
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Playlist(e) => match e {
                PlaylistError::Decode { .. }
                | PlaylistError::Empty { .. }
                | PlaylistError::UnknownEncoding(_) => ErrorCategory::Parsing,
                PlaylistError::Read { .. } | PlaylistError::Write { .. } => ErrorCategory::Storage,
            },
            Self::Probe(_) => ErrorCategory::Network,
            Self::Scheduler(SchedulerError::InvalidConfig { .. }) => ErrorCategory::Config,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
