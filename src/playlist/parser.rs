//! M3U/M3U8 playlist parser
//!
//! Turns playlist text into an ordered list of [`ChannelRecord`]s. Parsing
//! never fails: entries that do not form a metadata + URL pair are skipped
//! and counted as malformed.

use std::path::Path;
use tracing::{debug, warn};

use crate::models::ChannelRecord;
use crate::utils::decode_with_fallback;
use crate::utils::error::PlaylistError;

/// Playlist header directive
pub const HEADER_PREFIX: &str = "#EXTM3U";

/// Channel metadata directive
pub const EXTINF_PREFIX: &str = "#EXTINF:";

/// Result of parsing one playlist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlaylist {
    /// Original header line, when the playlist has one
    pub header: Option<String>,

    /// Channels in input order
    pub channels: Vec<ChannelRecord>,

    /// Entries dropped because they were not a metadata + URL pair
    pub malformed: usize,

    /// 1-based line numbers of the dropped entries
    pub malformed_lines: Vec<usize>,
}

impl ParsedPlaylist {
    /// Number of entries seen, valid or not
    pub fn total_entries(&self) -> usize {
        self.channels.len() + self.malformed
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Parse playlist text into channel records
pub fn parse(content: &str) -> ParsedPlaylist {
    let mut playlist = ParsedPlaylist::default();
    let mut pending: Option<(String, usize)> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw.trim_end_matches('\r');
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with(HEADER_PREFIX) {
            if playlist.header.is_none() && playlist.channels.is_empty() && pending.is_none() {
                playlist.header = Some(trimmed.to_string());
            }
            continue;
        }

        if trimmed.starts_with(EXTINF_PREFIX) {
            if let Some((_, orphan_line)) = pending.take() {
                warn!(line = orphan_line, "Metadata line without stream URL");
                playlist.malformed += 1;
                playlist.malformed_lines.push(orphan_line);
            }
            pending = Some((line.to_string(), line_number));
            continue;
        }

        if trimmed.starts_with('#') {
            // Other directives and comments
            continue;
        }

        match pending.take() {
            Some((extinf_line, extinf_number)) => {
                let sequence_index = playlist.channels.len();
                playlist.channels.push(ChannelRecord::new(
                    extinf_line,
                    trimmed,
                    sequence_index,
                    extinf_number,
                ));
            }
            None => {
                warn!(line = line_number, url = %trimmed, "Stream URL without metadata line");
                playlist.malformed += 1;
                playlist.malformed_lines.push(line_number);
            }
        }
    }

    if let Some((_, orphan_line)) = pending {
        warn!(line = orphan_line, "Metadata line without stream URL at end of file");
        playlist.malformed += 1;
        playlist.malformed_lines.push(orphan_line);
    }

    debug!(
        channels = playlist.channels.len(),
        malformed = playlist.malformed,
        "Parsed playlist"
    );

    playlist
}

/// Read a playlist file, decoding it with the first matching encoding
///
/// # Errors
///
/// Returns `PlaylistError` if the file cannot be read, decoded, or is empty
pub fn read_playlist(path: &Path, encodings: &[String]) -> Result<ParsedPlaylist, PlaylistError> {
    let bytes = std::fs::read(path).map_err(|source| PlaylistError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(PlaylistError::Empty {
            path: path.to_path_buf(),
        });
    }

    let (content, encoding) =
        decode_with_fallback(&bytes, encodings)?.ok_or_else(|| PlaylistError::Decode {
            path: path.to_path_buf(),
            tried: encodings.join(", "),
        })?;

    if content.trim().is_empty() {
        return Err(PlaylistError::Empty {
            path: path.to_path_buf(),
        });
    }

    debug!(path = %path.display(), encoding, "Decoded playlist");

    Ok(parse(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#EXTM3U\n#EXTINF:-1,Channel A\nhttp://dead.example/stream\n#EXTINF:-1,Channel B\nhttp://alive.example/stream\n";

    #[test]
    fn test_parse_basic_pairs() {
        let playlist = parse(SAMPLE);

        assert_eq!(playlist.header.as_deref(), Some("#EXTM3U"));
        assert_eq!(playlist.channels.len(), 2);
        assert_eq!(playlist.malformed, 0);

        let a = &playlist.channels[0];
        assert_eq!(a.extinf_line, "#EXTINF:-1,Channel A");
        assert_eq!(a.url, "http://dead.example/stream");
        assert_eq!(a.sequence_index, 0);
        assert_eq!(a.line_number, 2);

        let b = &playlist.channels[1];
        assert_eq!(b.sequence_index, 1);
        assert_eq!(b.name(), "Channel B");
    }

    #[test]
    fn test_trailing_metadata_is_malformed() {
        let content = format!("{SAMPLE}#EXTINF:-1,Channel C\n");
        let playlist = parse(&content);

        assert_eq!(playlist.channels.len(), 2);
        assert_eq!(playlist.malformed, 1);
        assert_eq!(playlist.malformed_lines, vec![6]);
        assert_eq!(playlist.total_entries(), 3);
    }

    #[test]
    fn test_consecutive_metadata_drops_first() {
        let content = "#EXTM3U\n#EXTINF:-1,Lost\n#EXTINF:-1,Kept\nhttp://kept\n";
        let playlist = parse(content);

        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.channels[0].name(), "Kept");
        assert_eq!(playlist.malformed, 1);
        assert_eq!(playlist.malformed_lines, vec![2]);
    }

    #[test]
    fn test_url_without_metadata_is_malformed() {
        let content = "#EXTM3U\nhttp://orphan\n#EXTINF:-1,A\nhttp://a\n";
        let playlist = parse(content);

        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.malformed, 1);
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let content = "#EXTM3U x-tvg-url=\"http://epg\"\r\n\r\n#EXTINF:-1 tvg-id=\"a\",A\r\n#EXTVLCOPT:http-user-agent=VLC\r\n# plain comment\r\n\r\n  http://a/stream  \r\n";
        let playlist = parse(content);

        assert_eq!(
            playlist.header.as_deref(),
            Some("#EXTM3U x-tvg-url=\"http://epg\"")
        );
        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.channels[0].extinf_line, "#EXTINF:-1 tvg-id=\"a\",A");
        assert_eq!(playlist.channels[0].url, "http://a/stream");
    }

    #[test]
    fn test_metadata_line_kept_verbatim() {
        let content = "#EXTM3U\r\n  #EXTINF:-1 tvg-name=\"A\" ,A  \r\nhttp://a\r\n";
        let playlist = parse(content);

        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(
            playlist.channels[0].extinf_line,
            "  #EXTINF:-1 tvg-name=\"A\" ,A  "
        );
    }

    #[test]
    fn test_headerless_playlist() {
        let playlist = parse("#EXTINF:-1,A\nhttp://a\n");
        assert!(playlist.header.is_none());
        assert_eq!(playlist.channels.len(), 1);
    }

    #[test]
    fn test_unusual_urls_are_kept_for_the_probe() {
        let playlist = parse("#EXTINF:-1,A\nnot-a-url\n#EXTINF:-1,B\nudp://@239.0.0.1:1234\n");
        assert_eq!(playlist.channels.len(), 2);
        assert_eq!(playlist.channels[0].url, "not-a-url");
    }

    #[test]
    fn test_empty_input() {
        let playlist = parse("");
        assert!(playlist.is_empty());
        assert_eq!(playlist.malformed, 0);
    }

    #[test]
    fn test_read_playlist_missing_file() {
        let result = read_playlist(Path::new("/nonexistent/list.m3u"), &["utf-8".to_string()]);
        assert!(matches!(result, Err(PlaylistError::Read { .. })));
    }

    #[test]
    fn test_read_playlist_empty_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.m3u");
        std::fs::write(&path, "  \n").unwrap();

        let result = read_playlist(&path, &["utf-8".to_string()]);
        assert!(matches!(result, Err(PlaylistError::Empty { .. })));
    }
}
