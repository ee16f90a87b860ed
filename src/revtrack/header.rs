//! The tracking header a document carries to opt into revision tracking.
//!
//! It is an ordinary `meta` block at the top of the document:
//!
//! ```text
//! =d=meta=w=
//! =dw=
//! =#= tracked document | edit content below =o=
//! =x= file;|./notes/plan.txt|; =z=
//! =x= version;|av1r1|; =z=
//! =x= log;|./.revtrack/records/notes%2Fplan.txt|; =z=
//! =x= update;|2026-01-15T10:00:00Z|; =z=
//! =x= refs, =z=
//! =wd=
//! =q=meta=e=
//! ```
//!
//! The `version` field is authoritative for the document's revision. Changing its base
//! letter by hand declares a rebase. `refs` lists other documents this one depends on.

use crate::markup::{self, Block, Container, FieldValue};
use crate::model::{format_timestamp, now};
use crate::revision::RevisionId;

pub const HEADER_BLOCK: &str = "meta";
const HEADER_NOTE: &str = "tracked document | edit content below";

pub fn has_header(text: &str) -> bool {
    markup::has_block(text, HEADER_BLOCK)
}

pub fn header_field(text: &str, key: &str) -> Option<String> {
    markup::get_block_field(text, HEADER_BLOCK, key)
        .and_then(|value| value.first().map(str::to_string))
}

/// The header's revision, `None` when there is no header or the field is not a valid id.
pub fn header_revision(text: &str) -> Option<RevisionId> {
    header_field(text, "version").and_then(|v| RevisionId::parse(&v))
}

/// Paths of the documents this one references, in declared order.
///
/// Accepts a list field or a scalar separated by commas or pipes.
pub fn declared_refs(text: &str) -> Vec<String> {
    let values: Vec<String> = match markup::get_block_field(text, HEADER_BLOCK, "refs") {
        Some(FieldValue::List(values)) => values,
        Some(FieldValue::Scalar(value)) => value
            .split([',', '|'])
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// A fresh header block for a document at `display_path`, without a trailing newline.
pub fn create_header(display_path: &str, log_pointer: &str) -> String {
    let container = Container::new()
        .with_comment(HEADER_NOTE)
        .with_field("file", FieldValue::scalar(display_path))
        .with_field("version", FieldValue::scalar(RevisionId::default().to_string()))
        .with_field("log", FieldValue::scalar(log_pointer))
        .with_field("update", FieldValue::scalar(format_timestamp(&now())))
        .with_field("refs", FieldValue::List(Vec::new()));
    markup::render_block(&Block::new(HEADER_BLOCK).with_container(container))
}

/// Prepend a header, separated from the existing content by a blank line.
pub fn add_header(content: &str, display_path: &str, log_pointer: &str) -> String {
    format!(
        "{}\n\n{}",
        create_header(display_path, log_pointer),
        content
    )
}

/// Rewrite one header field in place. The rest of the document is left byte for byte.
pub fn set_field(text: &str, key: &str, value: &str) -> Option<String> {
    let mut block = markup::find_block(text, HEADER_BLOCK)?;
    block.assign(key, FieldValue::scalar(value));
    markup::replace_block(text, HEADER_BLOCK, &markup::render_block(&block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_header_then_read_it_back() {
        let text = add_header("body\n", "./plan.txt", "./.revtrack/records/plan.txt");
        assert!(has_header(&text));
        assert!(text.ends_with("=q=meta=e=\n\nbody\n"));
        assert_eq!(header_revision(&text), Some(RevisionId::default()));
        assert_eq!(header_field(&text, "file").as_deref(), Some("./plan.txt"));
        assert!(declared_refs(&text).is_empty());
    }

    #[test]
    fn test_plain_text_has_no_header() {
        assert!(!has_header("just prose"));
        assert_eq!(header_revision("just prose"), None);
    }

    #[test]
    fn test_declared_refs_forms() {
        let listed = "=d=meta=w=\n=x= refs;|./a.txt|;,;|./b.txt|; =z=\n=q=meta=e=";
        assert_eq!(declared_refs(listed), vec!["./a.txt", "./b.txt"]);

        let scalar = "=d=meta=w=\n=x= refs;|./a.txt, ./b.txt|; =z=\n=q=meta=e=";
        assert_eq!(declared_refs(scalar), vec!["./a.txt", "./b.txt"]);
    }

    #[test]
    fn test_set_field_only_touches_header() {
        let text = add_header("line1\nline2", "./a.txt", "log");
        let updated = set_field(&text, "version", "av1r2").unwrap();
        assert_eq!(header_revision(&updated).map(|r| r.to_string()).as_deref(), Some("av1r2"));
        assert!(updated.ends_with("\n\nline1\nline2"));
        assert_eq!(header_field(&updated, "file").as_deref(), Some("./a.txt"));
        assert!(set_field("no header", "version", "av1r2").is_none());
    }

    #[test]
    fn test_invalid_version_reads_as_absent() {
        let text = "=d=meta=w=\n=x= version;|draft|; =z=\n=q=meta=e=";
        assert!(has_header(text));
        assert_eq!(header_revision(text), None);
    }
}
