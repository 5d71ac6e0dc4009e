//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use encoding_rs::Encoding;
use std::time::Duration;

use self::error::PlaylistError;

/// Decode bytes by trying each encoding label in order
///
/// A leading UTF-8 byte order mark is removed. Returns `Ok(None)` when no
/// encoding decodes the input without replacement characters.
///
/// # Errors
///
/// Returns `PlaylistError::UnknownEncoding` if a label is not a known encoding
pub fn decode_with_fallback(
    bytes: &[u8],
    labels: &[String],
) -> Result<Option<(String, &'static str)>, PlaylistError> {
    for label in labels {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| PlaylistError::UnknownEncoding(label.clone()))?;

        let bytes = if encoding == encoding_rs::UTF_8 {
            bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
        } else {
            bytes
        };

        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return Ok(Some((text.into_owned(), encoding.name())));
        }
    }

    Ok(None)
}

/// Truncate text to a maximum length
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Format a duration for summaries (`42.0s`, `3m 5s`, `1h 2m 3s`)
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }

    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours == 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{hours}h {minutes}m {seconds}s")
    }
}
