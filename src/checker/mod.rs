//! Per-file checking flow
//!
//! [`PlaylistChecker`] ties the pieces together for one input:
//! read and parse the playlist, probe every channel through the scheduler,
//! aggregate the verdicts, and write the working and broken playlists.
//! Batches run file by file; a file that cannot be read or written is
//! reported and the batch moves on.

pub mod report;

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub use report::{BatchReport, FileReport, WrittenOutput};

use crate::aggregator::{Aggregator, CheckOutcome, LogProgress};
use crate::config::Config;
use crate::error::Result;
use crate::models::Category;
use crate::playlist::{read_playlist, remove_stale, write_playlist};
use crate::probe::{Probe, StreamProber};
use crate::scheduler::{Scheduler, ShutdownHandle};
use crate::storage::OutputLayout;

/// What to read and where to write
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Encoding labels tried in order when reading inputs
    pub encodings: Vec<String>,
    pub layout: OutputLayout,
    pub write_working: bool,
    pub write_broken: bool,
    /// Log progress every N checked channels
    pub progress_interval: usize,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            encodings: vec![String::from("utf-8")],
            layout: OutputLayout::default(),
            write_working: true,
            write_broken: true,
            progress_interval: 50,
        }
    }
}

impl CheckOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            encodings: config.input.encodings.clone(),
            layout: config.output_layout(),
            write_working: !config.output.broken_only,
            write_broken: !config.output.working_only,
            progress_interval: config.report.progress_interval,
        }
    }

    fn writes(&self, category: Category) -> bool {
        match category {
            Category::Working => self.write_working,
            Category::Broken => self.write_broken,
        }
    }
}

/// Checks playlist files end to end
pub struct PlaylistChecker {
    scheduler: Scheduler,
    options: CheckOptions,
}

impl PlaylistChecker {
    pub fn new(scheduler: Scheduler, options: CheckOptions) -> Self {
        Self { scheduler, options }
    }

    /// Build a checker with the network prober from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the
    /// scheduler limits are invalid
    pub fn from_config(config: &Config) -> Result<Self> {
        let prober: Arc<dyn Probe> = Arc::new(StreamProber::new(&config.probe_config())?);
        let scheduler = Scheduler::new(config.scheduler_config(), prober)?;
        Ok(Self::new(scheduler, CheckOptions::from_config(config)))
    }

    /// Use an externally owned shutdown handle
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.scheduler = self.scheduler.with_shutdown(shutdown);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.scheduler.shutdown_handle()
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Check one playlist file and write its outputs
    ///
    /// # Errors
    ///
    /// Returns `Error::Playlist` if the input cannot be read or decoded, or an
    /// output cannot be written
    pub async fn check_file(&self, input: &Path) -> Result<FileReport> {
        let started_at = Local::now();
        let started = Instant::now();

        let playlist = read_playlist(input, &self.options.encodings)?;
        info!(
            input = %input.display(),
            channels = playlist.channels.len(),
            malformed = playlist.malformed,
            "Loaded playlist"
        );

        if playlist.is_empty() {
            warn!(input = %input.display(), "No valid channels found");
            return Ok(FileReport::empty(input, playlist.malformed));
        }

        let label = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut aggregator = Aggregator::new(playlist.channels.len()).with_observer(Box::new(
            LogProgress::new(label, self.options.progress_interval),
        ));

        let summary = self.scheduler.run(&playlist.channels, &mut aggregator).await;
        let outcome = aggregator.finish();
        let outputs = self.write_outputs(input, playlist.header.as_deref(), &outcome)?;

        if summary.is_partial() {
            warn!(
                input = %input.display(),
                unknown = outcome.counts.unknown,
                "Playlist only partially checked"
            );
        }

        let report = FileReport {
            input: input.to_path_buf(),
            started_at,
            elapsed: started.elapsed(),
            counts: outcome.counts,
            malformed: playlist.malformed,
            outputs,
            failure_reasons: outcome.failure_reasons,
            unknown: outcome
                .unknown
                .iter()
                .map(|(channel, reason)| (channel.name().to_string(), reason.clone()))
                .collect(),
            shard_failures: summary.failures,
            interrupted: summary.interrupted,
        };

        info!(
            input = %input.display(),
            working = report.counts.working,
            failed = report.counts.not_working(),
            unknown = report.counts.unknown,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Playlist checked"
        );

        Ok(report)
    }

    /// Write each enabled category of `outcome` next to `input`
    ///
    /// An empty category writes nothing and removes a stale output of that
    /// category from an earlier run.
    ///
    /// # Errors
    ///
    /// Returns `Error::Playlist` if an output cannot be written or removed
    pub fn write_outputs(
        &self,
        input: &Path,
        header: Option<&str>,
        outcome: &CheckOutcome,
    ) -> Result<Vec<WrittenOutput>> {
        let mut written = Vec::new();

        for category in Category::all() {
            if !self.options.writes(category) {
                continue;
            }

            let path = self.options.layout.path_for(input, category);
            let channels = outcome.category(category);

            if channels.is_empty() {
                remove_stale(&path)?;
                continue;
            }

            let count = write_playlist(&path, header, channels.iter().map(Arc::as_ref))?;
            written.push(WrittenOutput {
                category,
                path,
                channels: count,
            });
        }

        Ok(written)
    }

    /// Check several files one after another
    ///
    /// A fatal error on one file is recorded and the batch continues. Files
    /// left over after a shutdown request are not started.
    pub async fn check_files(&self, inputs: &[PathBuf]) -> BatchReport {
        let started = Instant::now();
        let mut batch = BatchReport::default();

        for (i, input) in inputs.iter().enumerate() {
            if self.scheduler.shutdown_handle().is_triggered() {
                warn!(remaining = inputs.len() - i, "Shutdown requested, skipping remaining files");
                break;
            }

            info!(
                file = i + 1,
                of = inputs.len(),
                input = %input.display(),
                "Checking playlist"
            );

            match self.check_file(input).await {
                Ok(report) => batch.files.push(report),
                Err(e) => {
                    error!(
                        input = %input.display(),
                        category = e.category().as_str(),
                        error = %e,
                        "Failed to check playlist"
                    );
                    batch.failed.push((input.clone(), e.to_string()));
                }
            }
        }

        batch.elapsed = started.elapsed();
        batch
    }
}
