//! # Markup Format
//!
//! Every artifact revtrack persists (records, archive side-files, the index, session logs,
//! the config) and the tracking header inside a document use one line-oriented grammar.
//!
//! ```text
//! =d=meta=w=                          block open, name is [A-Za-z0-9_]+
//! =#= a comment =o=                   comment
//! =x= version;|av1r2|; =z=            scalar field
//! =x= refs;|./a.txt|;,;|./b.txt|; =z= list field (a trailing `,` marks a one-item list)
//! =dw=                                container, one level deep, only inside a block
//! =x= 2026-01-15T10:00:00Z;|save:1|; =z=
//! =+= an added line =o=
//! =-= a removed line =o=
//! =wd=
//! =q=meta=e=                          block close, same name as the open tag
//! ```
//!
//! Anything else inside a block or container is kept as a raw line. Text outside blocks is
//! ignored, which is what lets a tracking header live at the top of a prose document.
//!
//! Malformed input never fails: an unterminated block or container, or a close tag whose
//! name does not match, is skipped and parsing carries on with the rest of the text.
//!
//! ## Escaping
//!
//! Payloads (comments, added/removed lines, field values) may contain anything on a single
//! line. Where a payload character would otherwise read as grammar, the renderer puts a
//! backslash before it, and the lexer treats backslash-escaped characters as plain text.
//! Only `\`, `=` and `|` are ever escaped, and only when needed, so ordinary text such as
//! `a=b` or `x | y` is written as is.
//!
//! This module is the only place that knows the syntax. Everything else works with
//! [`MarkupDocument`], [`Block`] and [`Container`].

mod lex;
mod parse;
mod render;

pub use parse::parse;
pub use render::{render, render_block};

use parse::{block_spans, parse_block};

/// A field value. Rendering is fixed by the variant, never inferred from the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        FieldValue::Scalar(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }

    /// The scalar text, or the first entry of a list.
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::List(vs) => vs.first().map(String::as_str),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Scalar(v) => vec![v.as_str()],
            FieldValue::List(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn extend(self, other: FieldValue) -> FieldValue {
        let mut values = match self {
            FieldValue::Scalar(v) => vec![v],
            FieldValue::List(vs) => vs,
        };
        match other {
            FieldValue::Scalar(v) => values.push(v),
            FieldValue::List(vs) => values.extend(vs),
        }
        FieldValue::List(values)
    }
}

/// Ordered field mapping. Keys are unique and keep their first insertion position.
///
/// Keys must be non-empty and free of whitespace, `=`, `;`, `|` and `,`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::first)
    }

    /// Set a field, replacing any previous value in place.
    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Assign a key again: the previous and new values merge into a list.
    pub(crate) fn merge(&mut self, key: &str, value: FieldValue) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => {
                let previous = std::mem::replace(&mut slot.1, FieldValue::List(Vec::new()));
                slot.1 = previous.extend(value);
            }
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub fields: Fields,
    pub comments: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub raw_lines: Vec<String>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.set(key, value);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    pub fn with_added(mut self, line: impl Into<String>) -> Self {
        self.added.push(line.into());
        self
    }

    pub fn with_removed(mut self, line: impl Into<String>) -> Self {
        self.removed.push(line.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub fields: Fields,
    pub comments: Vec<String>,
    pub containers: Vec<Container>,
    pub raw_lines: Vec<String>,
}

impl Block {
    /// `name` must match `[A-Za-z0-9_]+`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::default(),
            comments: Vec::new(),
            containers: Vec::new(),
            raw_lines: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.set(key, value);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    /// Look a key up in the block's own fields, then in its containers in order.
    pub fn lookup(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .get(key)
            .or_else(|| self.containers.iter().find_map(|c| c.fields.get(key)))
    }

    /// Overwrite a key wherever [`Block::lookup`] would find it, or on the block itself.
    pub fn assign(&mut self, key: &str, value: FieldValue) {
        if self.fields.get(key).is_some() {
            self.fields.set(key, value);
            return;
        }
        match self
            .containers
            .iter_mut()
            .find(|c| c.fields.get(key).is_some())
        {
            Some(container) => container.fields.set(key, value),
            None => self.fields.set(key, value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupDocument {
    blocks: Vec<Block>,
}

impl MarkupDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block. A block with the same name is replaced in place, keeping names unique.
    pub fn push(&mut self, block: Block) {
        match self.blocks.iter_mut().find(|b| b.name == block.name) {
            Some(slot) => *slot = block,
            None => self.blocks.push(block),
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.push(block);
        self
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.name == name)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub(crate) fn push_parsed(&mut self, block: Block) -> bool {
        if self.block(&block.name).is_some() {
            return false;
        }
        self.blocks.push(block);
        true
    }
}

pub fn has_block(text: &str, name: &str) -> bool {
    block_spans(text).iter().any(|span| span.name == name)
}

/// Parse only the first block called `name`.
pub fn find_block(text: &str, name: &str) -> Option<Block> {
    block_spans(text)
        .into_iter()
        .find(|span| span.name == name)
        .map(|span| parse_block(span.name, span.body(text)))
}

pub fn get_block_field(text: &str, name: &str, key: &str) -> Option<FieldValue> {
    find_block(text, name).and_then(|block| block.lookup(key).cloned())
}

/// Substitute the first block called `name`, leaving all surrounding text untouched.
/// Returns `None` when there is no such block.
pub fn replace_block(text: &str, name: &str, new_block_text: &str) -> Option<String> {
    let span = block_spans(text).into_iter().find(|span| span.name == name)?;
    let mut out = String::with_capacity(text.len() + new_block_text.len());
    out.push_str(&text[..span.start]);
    out.push_str(new_block_text);
    out.push_str(&text[span.end..]);
    Some(out)
}
