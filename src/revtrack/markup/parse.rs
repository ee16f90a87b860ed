use super::lex::{find_unescaped, unescape};
use super::{Block, Container, FieldValue, Fields, MarkupDocument};

/// Location of one well-formed block inside a larger text.
pub(super) struct BlockSpan<'a> {
    pub name: &'a str,
    pub start: usize,
    pub end: usize,
    body_start: usize,
    body_end: usize,
}

impl<'a> BlockSpan<'a> {
    pub fn body(&self, text: &'a str) -> &'a str {
        &text[self.body_start..self.body_end]
    }
}

/// Top-level blocks in document order. Unterminated or mismatched tags are skipped.
pub(super) fn block_spans(text: &str) -> Vec<BlockSpan<'_>> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(open) = find_unescaped(text, pos, "=d=") {
        let name_start = open + 3;
        let name_len = text[name_start..]
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        let name_end = name_start + name_len;
        if name_len == 0 || !text[name_end..].starts_with("=w=") {
            pos = open + 1;
            continue;
        }

        let name = &text[name_start..name_end];
        let body_start = name_end + 3;
        let close = format!("=q={}=e=", name);
        match find_unescaped(text, body_start, &close) {
            Some(body_end) => {
                let end = body_end + close.len();
                spans.push(BlockSpan {
                    name,
                    start: open,
                    end,
                    body_start,
                    body_end,
                });
                pos = end;
            }
            None => {
                tracing::trace!(block = name, "skipping unterminated block");
                pos = open + 1;
            }
        }
    }
    spans
}

pub fn parse(text: &str) -> MarkupDocument {
    let mut doc = MarkupDocument::new();
    for span in block_spans(text) {
        if !doc.push_parsed(parse_block(span.name, span.body(text))) {
            tracing::trace!(block = span.name, "skipping duplicate block");
        }
    }
    doc
}

pub(super) fn parse_block(name: &str, body: &str) -> Block {
    let mut block = Block::new(name);
    let mut remaining = String::with_capacity(body.len());
    let mut pos = 0;

    while let Some(open) = find_unescaped(body, pos, "=dw=") {
        let inner = open + 4;
        let Some(close) = find_unescaped(body, inner, "=wd=") else {
            break;
        };
        remaining.push_str(&body[pos..open]);
        remaining.push('\n');
        block.containers.push(parse_container(&body[inner..close]));
        pos = close + 4;
    }
    remaining.push_str(&body[pos..]);

    for line in remaining.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(text) = delimited(line, "=#=", "=o=") {
            block.comments.push(payload(text));
        } else if let Some(inner) = delimited(line, "=x=", "=z=") {
            parse_field_line(inner, &mut block.fields);
        } else {
            block.raw_lines.push(line.to_string());
        }
    }
    block
}

fn parse_container(body: &str) -> Container {
    let mut container = Container::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(text) = delimited(line, "=#=", "=o=") {
            container.comments.push(payload(text));
        } else if let Some(text) = delimited(line, "=+=", "=o=") {
            container.added.push(payload(text));
        } else if let Some(text) = delimited(line, "=-=", "=o=") {
            container.removed.push(payload(text));
        } else if let Some(inner) = delimited(line, "=x=", "=z=") {
            parse_field_line(inner, &mut container.fields);
        } else {
            container.raw_lines.push(line.to_string());
        }
    }
    container
}

fn delimited<'a>(line: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = find_unescaped(line, 0, open)? + open.len();
    let end = find_unescaped(line, start, close)?;
    Some(&line[start..end])
}

/// The renderer pads payloads with one space on each side.
fn payload(text: &str) -> String {
    let text = text.strip_prefix(' ').unwrap_or(text);
    let text = text.strip_suffix(' ').unwrap_or(text);
    unescape(text)
}

fn is_key_char(c: char) -> bool {
    !(c.is_whitespace() || matches!(c, ';' | '|' | ','))
}

/// `key;|v|;` pairs separated by whitespace. Comma-joined segments and a trailing comma
/// mark a list. A key seen twice merges into a list.
fn parse_field_line(inner: &str, fields: &mut Fields) {
    let mut rest = inner;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let key_len = rest.find(|c: char| !is_key_char(c)).unwrap_or(rest.len());
        if key_len == 0 {
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            rest = &rest[skip..];
            continue;
        }
        let key = &rest[..key_len];
        rest = &rest[key_len..];

        let mut values = Vec::new();
        let mut listed = false;
        if let Some(after) = rest.strip_prefix(',') {
            listed = true;
            rest = after;
        } else {
            while let Some(after) = rest.strip_prefix(";|") {
                let Some(end) = find_unescaped(after, 0, "|;") else {
                    rest = "";
                    break;
                };
                values.push(unescape(&after[..end]));
                rest = &after[end + 2..];
                match rest.strip_prefix(',') {
                    Some(after_comma) => {
                        listed = true;
                        rest = after_comma;
                    }
                    None => break,
                }
            }
        }

        let value = match (listed, values.len()) {
            (false, 0) => continue,
            (false, 1) => FieldValue::Scalar(values.remove(0)),
            _ => FieldValue::List(values),
        };
        fields.merge(key, value);
    }
}
