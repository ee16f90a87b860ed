//! Folder configuration, kept in `.revtrack/config.txt` as a `config` block.
//!
//! A missing file, a missing key or a value that does not parse all fall back to the
//! default for that key, so a hand-edited config can never stop the watcher.

use crate::diff::{DiffOptions, DEFAULT_MAX_LINES, DEFAULT_MAX_LINE_LEN};
use crate::markup::{self, Block, FieldValue, MarkupDocument};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const CONFIG_FILENAME: &str = "config.txt";
const CONFIG_BLOCK: &str = "config";

pub const DEFAULT_ARCHIVE_THRESHOLD: usize = 100;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackConfig {
    /// History length above which a record is reported LARGE and archived by `fix`.
    pub archive_threshold: usize,
    /// `./exact/path.txt`, `dir/*` (everything below dir) or `*suffix` patterns.
    pub ignore: Vec<String>,
    /// Document extensions eligible for tracking, with the leading dot.
    pub extensions: Vec<String>,
    pub poll_interval_ms: u64,
    pub diff_max_lines: usize,
    pub diff_max_line_len: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            archive_threshold: DEFAULT_ARCHIVE_THRESHOLD,
            ignore: Vec::new(),
            extensions: vec![".txt".to_string()],
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            diff_max_lines: DEFAULT_MAX_LINES,
            diff_max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

fn number<T: FromStr>(block: &Block, key: &str, default: T) -> T {
    block
        .fields
        .get_str(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn strings(block: &Block, key: &str) -> Option<Vec<String>> {
    block.fields.get(key).map(|value| {
        value
            .values()
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
}

impl TrackConfig {
    pub fn parse(text: &str) -> Self {
        let defaults = Self::default();
        let Some(block) = markup::find_block(text, CONFIG_BLOCK) else {
            return defaults;
        };
        let extensions = strings(&block, "extensions")
            .filter(|exts| !exts.is_empty())
            .map(|exts| exts.into_iter().map(normalize_ext).collect())
            .unwrap_or(defaults.extensions);

        Self {
            archive_threshold: number(&block, "archive_threshold", defaults.archive_threshold),
            ignore: strings(&block, "ignore").unwrap_or_default(),
            extensions,
            poll_interval_ms: number(&block, "poll_interval_ms", defaults.poll_interval_ms)
                .max(50),
            diff_max_lines: number(&block, "diff_max_lines", defaults.diff_max_lines),
            diff_max_line_len: number(&block, "diff_max_line_len", defaults.diff_max_line_len),
        }
    }

    pub fn render(&self) -> String {
        let block = Block::new(CONFIG_BLOCK)
            .with_comment("revtrack folder settings")
            .with_field(
                "archive_threshold",
                FieldValue::scalar(self.archive_threshold.to_string()),
            )
            .with_field("ignore", FieldValue::list(self.ignore.iter().cloned()))
            .with_field("extensions", FieldValue::list(self.extensions.iter().cloned()))
            .with_field(
                "poll_interval_ms",
                FieldValue::scalar(self.poll_interval_ms.to_string()),
            )
            .with_field(
                "diff_max_lines",
                FieldValue::scalar(self.diff_max_lines.to_string()),
            )
            .with_field(
                "diff_max_line_len",
                FieldValue::scalar(self.diff_max_line_len.to_string()),
            );
        markup::render(&MarkupDocument::new().with_block(block))
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            max_lines: self.diff_max_lines,
            max_line_len: self.diff_max_line_len,
        }
    }

    pub fn has_tracked_extension(&self, rel_path: &str) -> bool {
        self.extensions.iter().any(|ext| rel_path.ends_with(ext.as_str()))
    }

    /// `rel_path` is relative to the folder, with `/` separators and no leading `./`.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.ignore.iter().any(|pattern| {
            let pattern = pattern.trim_start_matches("./");
            if let Some(dir) = pattern.strip_suffix("/*") {
                rel_path.starts_with(&format!("{}/", dir))
            } else if let Some(suffix) = pattern.strip_prefix('*') {
                rel_path.ends_with(suffix)
            } else {
                rel_path == pattern
            }
        })
    }
}

fn normalize_ext(ext: String) -> String {
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_block_gives_defaults() {
        assert_eq!(TrackConfig::parse(""), TrackConfig::default());
        assert_eq!(TrackConfig::parse("random text"), TrackConfig::default());
    }

    #[test]
    fn test_render_parse_round_trip() {
        let config = TrackConfig {
            archive_threshold: 20,
            ignore: vec!["drafts/*".to_string(), "./scratch.txt".to_string()],
            extensions: vec![".txt".to_string(), ".md".to_string()],
            poll_interval_ms: 250,
            diff_max_lines: 10,
            diff_max_line_len: 80,
        };
        assert_eq!(TrackConfig::parse(&config.render()), config);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let text = "=d=config=w=\n=x= archive_threshold;|lots|; =z=\n=x= extensions;|md|; =z=\n=q=config=e=";
        let config = TrackConfig::parse(text);
        assert_eq!(config.archive_threshold, DEFAULT_ARCHIVE_THRESHOLD);
        assert_eq!(config.extensions, vec![".md"]);
    }

    #[test]
    fn test_ignore_patterns() {
        let config = TrackConfig {
            ignore: vec![
                "./drafts/*".to_string(),
                "scratch.txt".to_string(),
                "*.old.txt".to_string(),
            ],
            ..TrackConfig::default()
        };
        assert!(config.is_ignored("drafts/a.txt"));
        assert!(config.is_ignored("drafts/deep/b.txt"));
        assert!(config.is_ignored("scratch.txt"));
        assert!(config.is_ignored("notes/plan.old.txt"));
        assert!(!config.is_ignored("drafts.txt"));
        assert!(!config.is_ignored("notes/scratch.txt"));
    }
}
