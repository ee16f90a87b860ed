//! Line diff between two versions of a document.
//!
//! Only added and removed lines are reported, never context. The result is bounded so a
//! large paste cannot blow up a history record: at most `max_lines` lines per side, each cut
//! to `max_line_len` characters.

use serde::Serialize;

pub const DEFAULT_MAX_LINES: usize = 50;
pub const DEFAULT_MAX_LINE_LEN: usize = 200;

/// Above this many LCS cells the changed middle is reported wholesale.
const MAX_LCS_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    pub max_lines: usize,
    pub max_line_len: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl LineDiff {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

pub fn diff(old: &str, new: &str) -> LineDiff {
    diff_with(old, new, DiffOptions::default())
}

pub fn diff_with(old: &str, new: &str, opts: DiffOptions) -> LineDiff {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_lines[prefix..]
        .iter()
        .rev()
        .zip(new_lines[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old_lines[prefix..old_lines.len() - suffix];
    let b = &new_lines[prefix..new_lines.len() - suffix];

    let mut out = LineDiff::default();
    let keep = |line: &str| -> String { line.chars().take(opts.max_line_len).collect() };

    if a.len().saturating_mul(b.len()) > MAX_LCS_CELLS {
        tracing::debug!(old = a.len(), new = b.len(), "diff region too large for LCS");
        out.added = b.iter().copied().take(opts.max_lines).map(keep).collect();
        out.removed = a.iter().copied().take(opts.max_lines).map(keep).collect();
        return out;
    }

    let (added, removed) = lcs_changes(a, b);
    out.added = added
        .into_iter()
        .take(opts.max_lines)
        .map(keep)
        .collect();
    out.removed = removed
        .into_iter()
        .take(opts.max_lines)
        .map(keep)
        .collect();
    out
}

/// Lines of `b` not in the LCS, and lines of `a` not in the LCS, in document order.
fn lcs_changes<'a>(a: &[&'a str], b: &[&'a str]) -> (Vec<&'a str>, Vec<&'a str>) {
    let (n, m) = (a.len(), b.len());
    // table[i][j] = LCS length of a[i..] and b[j..]
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            removed.push(a[i]);
            i += 1;
        } else {
            added.push(b[j]);
            j += 1;
        }
    }
    removed.extend_from_slice(&a[i..]);
    added.extend_from_slice(&b[j..]);
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_have_no_changes() {
        let text = "one\ntwo\nthree";
        let d = diff(text, text);
        assert_eq!(d, LineDiff::default());
        assert!(!d.has_changes());
    }

    #[test]
    fn test_from_empty() {
        let d = diff("", "a\nb");
        assert_eq!(d.added, vec!["a", "b"]);
        assert!(d.removed.is_empty());
    }

    #[test]
    fn test_append_line() {
        let d = diff("line1\nline2", "line1\nline2\nline3");
        assert_eq!(d.added, vec!["line3"]);
        assert!(d.removed.is_empty());
    }

    #[test]
    fn test_replace_in_middle() {
        let d = diff("a\nb\nc\nd", "a\nx\nc\ny\nd");
        assert_eq!(d.added, vec!["x", "y"]);
        assert_eq!(d.removed, vec!["b"]);
    }

    #[test]
    fn test_moved_line_counts_once() {
        let d = diff("a\nb\nc", "b\nc\na");
        assert_eq!(d.added, vec!["a"]);
        assert_eq!(d.removed, vec!["a"]);
    }

    #[test]
    fn test_output_is_bounded() {
        let new: String = (0..120).map(|i| format!("{}{}\n", i, "x".repeat(300))).collect();
        let d = diff("", &new);
        assert_eq!(d.added.len(), DEFAULT_MAX_LINES);
        assert!(d.added.iter().all(|l| l.chars().count() == DEFAULT_MAX_LINE_LEN));
    }

    #[test]
    fn test_custom_bounds() {
        let opts = DiffOptions {
            max_lines: 1,
            max_line_len: 3,
        };
        let d = diff_with("gone\nalso gone", "fresh\nnew", opts);
        assert_eq!(d.added, vec!["fre"]);
        assert_eq!(d.removed, vec!["gon"]);
    }

    #[test]
    fn test_trailing_newline_is_not_a_change() {
        assert!(!diff("a\nb", "a\nb\n").has_changes());
    }
}
