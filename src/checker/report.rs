//! Per-file and batch reports

use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{Category, CheckCounts};
use crate::scheduler::SchedulerError;
use crate::storage::ResumeStatus;
use crate::utils::{format_duration, truncate_text};

/// Longest failure reason shown in a summary line
const MAX_REASON_WIDTH: usize = 100;

/// One output playlist written for an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub category: Category,
    pub path: PathBuf,
    pub channels: usize,
}

/// Result of checking one playlist file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub counts: CheckCounts,
    /// Entries dropped by the parser
    pub malformed: usize,
    pub outputs: Vec<WrittenOutput>,
    /// Distinct failure reasons, most frequent first
    pub failure_reasons: Vec<(String, usize)>,
    /// Channel name and reason of every channel left without a verdict
    pub unknown: Vec<(String, String)>,
    /// Shard failures seen while checking
    pub shard_failures: Vec<SchedulerError>,
    /// Checking stopped early on shutdown
    pub interrupted: bool,
}

impl FileReport {
    /// Report for an input with no channels to check
    pub fn empty(input: &Path, malformed: usize) -> Self {
        Self {
            input: input.to_path_buf(),
            started_at: Local::now(),
            elapsed: Duration::ZERO,
            counts: CheckCounts::default(),
            malformed,
            outputs: Vec::new(),
            failure_reasons: Vec::new(),
            unknown: Vec::new(),
            shard_failures: Vec::new(),
            interrupted: false,
        }
    }

    /// Entries seen in the input, unparsable ones included
    pub fn entries(&self) -> usize {
        self.counts.total + self.malformed
    }

    pub fn is_partial(&self) -> bool {
        self.interrupted || self.counts.unknown > 0
    }

    /// Human readable summary
    pub fn render(&self, show_errors: bool, max_errors: usize) -> String {
        let mut out = String::new();
        let name = self
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string());
        let c = &self.counts;

        let _ = writeln!(out, "{name}");
        let _ = writeln!(out, "{}", "-".repeat(name.chars().count()));
        let _ = writeln!(
            out,
            "Started:     {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "Total:       {}", c.total);
        let _ = writeln!(
            out,
            "Working:     {} ({:.1}%)",
            c.working,
            c.working_rate() * 100.0
        );
        let _ = writeln!(out, "Broken:      {}", c.broken);
        let _ = writeln!(out, "Timed out:   {}", c.timed_out);
        let _ = writeln!(out, "Errors:      {}", c.errored);
        if self.malformed > 0 {
            let _ = writeln!(out, "Unparsable:  {}", self.malformed);
        }
        if c.unknown > 0 {
            let _ = writeln!(out, "Unknown:     {}", c.unknown);
        }
        let _ = writeln!(out, "Elapsed:     {}", format_duration(self.elapsed));

        for output in &self.outputs {
            let _ = writeln!(
                out,
                "Output {} ({}): {}",
                output.category,
                output.channels,
                output.path.display()
            );
        }

        if show_errors && !self.failure_reasons.is_empty() {
            let _ = writeln!(out, "Top failure reasons:");
            for (reason, count) in self.failure_reasons.iter().take(max_errors) {
                let _ = writeln!(out, "  {count:>5}  {}", truncate_text(reason, MAX_REASON_WIDTH));
            }
        }

        if !self.unknown.is_empty() {
            let _ = writeln!(out, "Not checked:");
            for (channel, reason) in self.unknown.iter().take(max_errors.max(1)) {
                let _ = writeln!(
                    out,
                    "  {channel}: {}",
                    truncate_text(reason, MAX_REASON_WIDTH)
                );
            }
            if self.unknown.len() > max_errors.max(1) {
                let _ = writeln!(
                    out,
                    "  ... and {} more",
                    self.unknown.len() - max_errors.max(1)
                );
            }
        }

        if self.interrupted {
            let _ = writeln!(out, "Warning: interrupted before every channel was checked");
        }

        out
    }
}

/// Result of checking a set of playlist files
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    /// Inputs that could not be processed, with the error
    pub failed: Vec<(PathBuf, String)>,
    /// Inputs skipped because a previous run already completed them
    pub skipped: Vec<(PathBuf, ResumeStatus)>,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Counts summed over every checked file
    pub fn totals(&self) -> CheckCounts {
        self.files.iter().fold(CheckCounts::default(), |mut acc, f| {
            acc.total += f.counts.total;
            acc.working += f.counts.working;
            acc.broken += f.counts.broken;
            acc.timed_out += f.counts.timed_out;
            acc.errored += f.counts.errored;
            acc.unknown += f.counts.unknown;
            acc
        })
    }

    pub fn malformed(&self) -> usize {
        self.files.iter().map(|f| f.malformed).sum()
    }

    /// Whether every input was processed without a fatal error
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Human readable batch summary
    pub fn render(&self) -> String {
        let mut out = String::new();
        let totals = self.totals();

        let _ = writeln!(out, "Batch Summary");
        let _ = writeln!(out, "=============");
        let _ = writeln!(out, "Files checked:  {}", self.files.len());
        if !self.skipped.is_empty() {
            let _ = writeln!(out, "Files skipped:  {}", self.skipped.len());
        }
        if !self.failed.is_empty() {
            let _ = writeln!(out, "Files failed:   {}", self.failed.len());
        }
        let _ = writeln!(out, "Channels:       {}", totals.total);
        let _ = writeln!(
            out,
            "Working:        {} ({:.1}%)",
            totals.working,
            totals.working_rate() * 100.0
        );
        let _ = writeln!(out, "Not working:    {}", totals.not_working());
        if self.malformed() > 0 {
            let _ = writeln!(out, "Unparsable:     {}", self.malformed());
        }
        if totals.unknown > 0 {
            let _ = writeln!(out, "Unknown:        {}", totals.unknown);
        }
        let _ = writeln!(out, "Elapsed:        {}", format_duration(self.elapsed));

        for (path, error) in &self.failed {
            let _ = writeln!(out, "Failed: {}: {error}", path.display());
        }

        out
    }
}
