pub mod check;
pub mod resume;

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use iptv_checker::storage::OutputLayout;

// Re-export command functions for convenience
pub use check::{check, CheckArgs};
pub use resume::{cleanup, status};

/// Playlist input: one file or every playlist in a directory
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct InputArgs {
    /// Playlist file to check
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Directory of playlists to check
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

/// Resolve the input arguments to a sorted list of playlist files
///
/// Directory scans pick `*.m3u` and `*.m3u8` files directly inside the
/// directory and leave out outputs of earlier runs.
pub fn collect_inputs(input: &InputArgs, layout: &OutputLayout) -> Result<Vec<PathBuf>> {
    if let Some(file) = &input.file {
        if !file.is_file() {
            anyhow::bail!("Playlist file not found: {}", file.display());
        }
        return Ok(vec![file.clone()]);
    }

    let Some(dir) = &input.dir else {
        anyhow::bail!("Either --file or --dir is required");
    };

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_playlist(path) && !layout.is_output_name(path))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No .m3u or .m3u8 files found in {}", dir.display());
    }

    Ok(files)
}

fn is_playlist(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("m3u") || e.eq_ignore_ascii_case("m3u8"))
        .unwrap_or(false)
}
