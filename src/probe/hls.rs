//! Minimal HLS playlist inspection
//!
//! Only what a reachability check needs: is the body a playlist, and which
//! URI should be checked next.

use url::Url;

use crate::utils::error::ProbeError;

const HLS_HEADER: &str = "#EXTM3U";
const STREAM_INF: &str = "#EXT-X-STREAM-INF";

/// Next step after fetching an HLS playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlsPlaylist {
    /// Master playlist; holds the first variant URI
    Master { variant: String },
    /// Media playlist; holds the first segment URI
    Media { segment: String },
    /// Valid playlist with no variants and no segments
    Empty,
}

impl HlsPlaylist {
    /// Inspect a playlist body
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::InvalidPlaylist` if the body does not start with `#EXTM3U`
    pub fn parse(body: &str) -> Result<Self, ProbeError> {
        let body = body.trim_start_matches('\u{feff}');
        if !body.trim_start().starts_with(HLS_HEADER) {
            return Err(ProbeError::InvalidPlaylist(
                "missing #EXTM3U header".to_string(),
            ));
        }

        let mut after_stream_inf = false;
        let mut first_segment = None;

        for line in body.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(STREAM_INF) {
                after_stream_inf = true;
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if after_stream_inf {
                return Ok(Self::Master {
                    variant: line.to_string(),
                });
            }
            if first_segment.is_none() {
                first_segment = Some(line.to_string());
            }
        }

        Ok(match first_segment {
            Some(segment) => Self::Media { segment },
            None => Self::Empty,
        })
    }
}

/// Resolve a playlist reference against the URL it was served from
///
/// # Errors
///
/// Returns `ProbeError::InvalidPlaylist` if the reference is not a valid URI
pub fn resolve(base: &Url, reference: &str) -> Result<Url, ProbeError> {
    base.join(reference)
        .map_err(|e| ProbeError::InvalidPlaylist(format!("bad URI {reference:?}: {e}")))
}
