//! iptv-checker - IPTV playlist stream checker
//!
//! Probes every channel of M3U/M3U8 playlists for reachability and writes the
//! playlist back out split into working and broken channels.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`playlist`] - M3U parsing and writing
//! - [`probe`] - Per-scheme stream reachability checks
//! - [`scheduler`] - Sharded, bounded-concurrency probe scheduling
//! - [`aggregator`] - Ordered collection of verdicts and progress counts
//! - [`checker`] - Per-file and batch checking flow
//! - [`storage`] - Output naming and resume detection
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use iptv_checker::checker::PlaylistChecker;
//! use iptv_checker::config::Config;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let checker = PlaylistChecker::from_config(&config)?;
//!     let report = checker.check_file(Path::new("IN/news.m3u8")).await?;
//!     println!("{}", report.render(true, 10));
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod checker;
pub mod config;
pub mod error;
pub mod models;
pub mod playlist;
pub mod probe;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::aggregator::{Aggregator, CheckOutcome, ProgressObserver};
    pub use crate::checker::{BatchReport, CheckOptions, FileReport, PlaylistChecker};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{ChannelRecord, ProbeOutcome, ProbeStatus, ProbeVerdict};
    pub use crate::probe::{Probe, StreamProber};
    pub use crate::scheduler::{Scheduler, SchedulerConfig, ShutdownHandle};
}

// Direct re-exports for convenience
pub use models::{Category, ChannelRecord, CheckCounts, ProbeStatus, ProbeVerdict};
