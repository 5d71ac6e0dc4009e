//! Error types for playlist I/O and stream probing
//!
//! This module defines custom error types used throughout the application.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing a stream URL
///
/// These never escape the probe engine: every variant is folded into a
/// [`ProbeStatus`](crate::models::ProbeStatus) before it reaches the scheduler.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket level error outside of the HTTP client
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered with an error status
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection refused or host could not be resolved
    #[error("{0}")]
    Unreachable(String),

    /// Server answered but the body is not a usable playlist
    #[error("Invalid HLS playlist: {0}")]
    InvalidPlaylist(String),

    /// Server answered with a success status but no data
    #[error("Empty response")]
    EmptyResponse,

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL scheme is not probed by any handshake
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Errors that can occur while reading or writing playlist files
#[derive(Error, Debug)]
pub enum PlaylistError {
    /// Input file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output file could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// None of the configured encodings could decode the file
    #[error("Could not decode {} with any of: {tried}", path.display())]
    Decode { path: PathBuf, tried: String },

    /// File has no content
    #[error("File {} is empty", path.display())]
    Empty { path: PathBuf },

    /// Encoding label from the configuration is not recognised
    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),
}

impl PlaylistError {
    /// Path of the file involved, when there is one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::Decode { path, .. }
            | Self::Empty { path } => Some(path),
            Self::UnknownEncoding(_) => None,
        }
    }
}
