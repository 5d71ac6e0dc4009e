//! Resume detection for batch runs
//!
//! An input counts as complete when its existing output playlists together
//! hold exactly as many channels as the input itself. Anything else is
//! either new (no outputs yet) or incomplete (outputs from an interrupted or
//! partial run).

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::OutputLayout;
use crate::models::Category;
use crate::playlist::{read_playlist, remove_stale};
use crate::utils::error::PlaylistError;

/// Channel counts found in the outputs of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCounts {
    /// Channels in the working output, `None` when the file is absent
    pub working: Option<usize>,
    /// Channels in the broken output, `None` when the file is absent
    pub broken: Option<usize>,
    /// Channels in the input
    pub expected: usize,
}

impl OutputCounts {
    pub fn found(&self) -> usize {
        self.working.unwrap_or(0) + self.broken.unwrap_or(0)
    }
}

impl fmt::Display for OutputCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [("working", self.working), ("broken", self.broken)]
            .into_iter()
            .filter_map(|(name, count)| count.map(|n| format!("{name}({n})")))
            .collect();
        write!(
            f,
            "{} = {}/{}",
            parts.join(" + "),
            self.found(),
            self.expected
        )
    }
}

/// Resume state of one input playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeStatus {
    /// No outputs exist
    New,
    /// Outputs account for every input channel
    Complete(OutputCounts),
    /// Outputs exist but do not account for every input channel
    Incomplete(OutputCounts),
    /// Outputs exist but the input or an output could not be read
    Unreadable { reason: String },
}

impl ResumeStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

impl fmt::Display for ResumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("New"),
            Self::Complete(counts) => write!(f, "Complete: {counts}"),
            Self::Incomplete(counts) => write!(f, "Incomplete: {counts}"),
            Self::Unreadable { reason } => write!(f, "Error checking: {reason}"),
        }
    }
}

/// Resume state of a set of inputs
#[derive(Debug, Clone, Default)]
pub struct ResumeInfo {
    pub entries: Vec<(PathBuf, ResumeStatus)>,
}

impl ResumeInfo {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn completed(&self) -> usize {
        self.count(|s| matches!(s, ResumeStatus::Complete(_)))
    }

    pub fn incomplete(&self) -> usize {
        self.count(|s| matches!(s, ResumeStatus::Incomplete(_)))
    }

    /// Inputs with no usable outputs, unreadable ones included
    pub fn new_files(&self) -> usize {
        self.total() - self.completed() - self.incomplete()
    }

    fn count(&self, pred: impl Fn(&ResumeStatus) -> bool) -> usize {
        self.entries.iter().filter(|(_, s)| pred(s)).count()
    }
}

/// Decides which inputs still need checking
#[derive(Debug, Clone)]
pub struct ResumeManager {
    layout: OutputLayout,
    encodings: Vec<String>,
}

impl ResumeManager {
    pub fn new(layout: OutputLayout, encodings: Vec<String>) -> Self {
        Self { layout, encodings }
    }

    /// Inspect the outputs of one input
    pub fn inspect(&self, input: &Path) -> ResumeStatus {
        let working_path = self.layout.path_for(input, Category::Working);
        let broken_path = self.layout.path_for(input, Category::Broken);

        if !working_path.exists() && !broken_path.exists() {
            return ResumeStatus::New;
        }

        match self.count_outputs(input, &working_path, &broken_path) {
            Ok(counts) if counts.expected == 0 => ResumeStatus::Unreadable {
                reason: String::from("input has no channels"),
            },
            Ok(counts) if counts.found() == counts.expected => ResumeStatus::Complete(counts),
            Ok(counts) => ResumeStatus::Incomplete(counts),
            Err(e) => {
                warn!(input = %input.display(), error = %e, "Could not check resume status");
                ResumeStatus::Unreadable {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn count_outputs(
        &self,
        input: &Path,
        working_path: &Path,
        broken_path: &Path,
    ) -> Result<OutputCounts, PlaylistError> {
        let expected = read_playlist(input, &self.encodings)?.channels.len();
        let count = |path: &Path| -> Result<Option<usize>, PlaylistError> {
            if !path.exists() {
                return Ok(None);
            }
            Ok(Some(read_playlist(path, &self.encodings)?.channels.len()))
        };

        Ok(OutputCounts {
            working: count(working_path)?,
            broken: count(broken_path)?,
            expected,
        })
    }

    /// Split inputs into those to check and those already complete
    ///
    /// With `force` every input is checked.
    pub fn filter(
        &self,
        inputs: Vec<PathBuf>,
        force: bool,
    ) -> (Vec<PathBuf>, Vec<(PathBuf, ResumeStatus)>) {
        if force {
            return (inputs, Vec::new());
        }

        let mut to_check = Vec::with_capacity(inputs.len());
        let mut skipped = Vec::new();

        for input in inputs {
            match self.inspect(&input) {
                status @ ResumeStatus::Complete(_) => {
                    info!(input = %input.display(), status = %status, "Skipping checked playlist");
                    skipped.push((input, status));
                }
                ResumeStatus::New => to_check.push(input),
                status => {
                    info!(input = %input.display(), status = %status, "Re-checking playlist");
                    to_check.push(input);
                }
            }
        }

        (to_check, skipped)
    }

    /// Resume state of every input
    pub fn info(&self, inputs: &[PathBuf]) -> ResumeInfo {
        ResumeInfo {
            entries: inputs
                .iter()
                .map(|input| (input.clone(), self.inspect(input)))
                .collect(),
        }
    }

    /// Remove the outputs of one input
    ///
    /// # Errors
    ///
    /// Returns `PlaylistError::Write` if an existing output cannot be removed
    pub fn remove_outputs(&self, input: &Path) -> Result<Vec<PathBuf>, PlaylistError> {
        let mut removed = Vec::new();
        for category in Category::all() {
            let path = self.layout.path_for(input, category);
            if remove_stale(&path)? {
                info!(path = %path.display(), "Removed incomplete output");
                removed.push(path);
            }
        }
        Ok(removed)
    }

    /// Remove the outputs of every incomplete input
    ///
    /// # Errors
    ///
    /// Returns `PlaylistError::Write` on the first output that cannot be removed
    pub fn cleanup_incomplete(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, PlaylistError> {
        let mut removed = Vec::new();
        for input in inputs {
            if matches!(self.inspect(input), ResumeStatus::Incomplete(_)) {
                removed.extend(self.remove_outputs(input)?);
            }
        }
        Ok(removed)
    }
}
