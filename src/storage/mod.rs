//! Output file layout and resume detection
//!
//! - [`OutputLayout`] - where the working and broken playlists of an input go
//! - [`resume`] - whether an input was already fully checked by a previous run

pub mod resume;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use resume::{ResumeInfo, ResumeManager, ResumeStatus};

use crate::models::Category;

/// Naming scheme for output playlists
///
/// An input `dir/news.m3u8` checked with prefix `checked` produces
/// `checked_news_working.m3u8` and `checked_news_broken.m3u8`, each in its
/// configured directory or next to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub prefix: String,
    pub working_dir: Option<PathBuf>,
    pub broken_dir: Option<PathBuf>,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            prefix: String::from("checked"),
            working_dir: None,
            broken_dir: None,
        }
    }
}

impl OutputLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Output path of `category` for `input`
    pub fn path_for(&self, input: &Path, category: Category) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("playlist"));
        let extension = input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let file_name = format!(
            "{}_{}_{}{}",
            sanitize_file_component(&self.prefix),
            stem,
            category.as_str(),
            extension
        );

        let dir = match category {
            Category::Working => self.working_dir.as_deref(),
            Category::Broken => self.broken_dir.as_deref(),
        };

        match dir {
            Some(dir) => dir.join(file_name),
            None => input
                .parent()
                .map(|p| p.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
        }
    }

    /// Whether `path` looks like an output this layout would produce
    pub fn is_output_name(&self, path: &Path) -> bool {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return false;
        };
        let prefix = format!("{}_", sanitize_file_component(&self.prefix));
        stem.starts_with(&prefix)
            && Category::all()
                .iter()
                .any(|c| stem.ends_with(&format!("_{}", c.as_str())))
    }
}

/// Replace characters that are not allowed in file names
pub fn sanitize_file_component(name: &str) -> String {
    static UNSAFE_RE: OnceLock<Regex> = OnceLock::new();

    let re = UNSAFE_RE
        .get_or_init(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).expect("Invalid regex pattern"));

    re.replace_all(name.trim(), "_").into_owned()
}
