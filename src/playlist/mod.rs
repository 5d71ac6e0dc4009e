//! Playlist reading and writing
//!
//! - [`parser`] - M3U/M3U8 text to ordered channel records
//! - [`writer`] - ordered channel records back to M3U text

pub mod parser;
pub mod writer;

pub use parser::{parse, read_playlist, ParsedPlaylist, EXTINF_PREFIX, HEADER_PREFIX};
pub use writer::{remove_stale, render_playlist, write_playlist};
