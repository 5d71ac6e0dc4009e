//! M3U playlist writer
//!
//! Output is a pure function of the header and the channel list, so writing
//! the same aggregated result twice yields byte-identical files.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::parser::HEADER_PREFIX;
use crate::models::ChannelRecord;
use crate::utils::error::PlaylistError;

/// Render channels as M3U text
///
/// `header` is the original header line of the input playlist; `#EXTM3U` is
/// used when the input had none. Channels must already be in sequence order.
pub fn render_playlist<'a, I>(header: Option<&str>, channels: I) -> String
where
    I: IntoIterator<Item = &'a ChannelRecord>,
{
    let mut out = String::new();
    out.push_str(header.unwrap_or(HEADER_PREFIX));
    out.push('\n');

    for channel in channels {
        out.push_str(&channel.extinf_line);
        out.push('\n');
        out.push_str(&channel.url);
        out.push('\n');
    }

    out
}

/// Write channels to `path` atomically
///
/// The playlist is written to a temporary sibling file and renamed into place,
/// so a reader never observes a partially written playlist.
///
/// # Errors
///
/// Returns `PlaylistError::Write` if the file cannot be created or renamed
pub fn write_playlist<'a, I>(
    path: &Path,
    header: Option<&str>,
    channels: I,
) -> Result<usize, PlaylistError>
where
    I: IntoIterator<Item = &'a ChannelRecord>,
{
    let channels: Vec<&ChannelRecord> = channels.into_iter().collect();
    debug_assert!(
        channels
            .windows(2)
            .all(|w| w[0].sequence_index < w[1].sequence_index),
        "channels must be sorted by sequence index"
    );

    let content = render_playlist(header, channels.iter().copied());
    let write_err = |source| PlaylistError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp = temp_path(path);
    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(source));
    }

    info!(path = %path.display(), channels = channels.len(), "Playlist saved");
    Ok(channels.len())
}

/// Remove a previously written playlist, if any
///
/// # Errors
///
/// Returns `PlaylistError::Write` if the file exists but cannot be removed
pub fn remove_stale(path: &Path) -> Result<bool, PlaylistError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale playlist");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(PlaylistError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
