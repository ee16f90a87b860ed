//! Token search and payload escaping shared by the parser and the renderer.

/// Every literal the grammar reacts to. Block tags are built from `=d=`/`=w=`/`=q=`/`=e=`.
const TOKENS: &[&str] = &[
    "=dw=", "=wd=", "=d=", "=w=", "=q=", "=e=", "=x=", "=z=", "=#=", "=o=", "=+=", "=-=",
];

fn starts_token(rest: &str) -> bool {
    TOKENS.iter().any(|t| rest.starts_with(t))
}

/// A byte is escaped when an odd number of backslashes directly precede it.
fn is_escaped(s: &str, idx: usize) -> bool {
    let slashes = s.as_bytes()[..idx]
        .iter()
        .rev()
        .take_while(|b| **b == b'\\')
        .count();
    slashes % 2 == 1
}

/// Find the first unescaped occurrence of `pat` at or after `from`.
pub(super) fn find_unescaped(s: &str, from: usize, pat: &str) -> Option<usize> {
    let mut start = from;
    while start <= s.len() {
        let idx = start + s[start..].find(pat)?;
        if !is_escaped(s, idx) {
            return Some(idx);
        }
        // patterns all start with an ASCII byte
        start = idx + 1;
    }
    None
}

pub(super) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        let rest = &text[i..];
        let next = rest[c.len_utf8()..].chars().next();
        match c {
            '\\' if matches!(next, None | Some('\\') | Some('=') | Some('|')) => {
                out.push_str("\\\\")
            }
            '=' if starts_token(rest) => out.push_str("\\="),
            '|' if next == Some(';') => out.push_str("\\|"),
            _ => out.push(c),
        }
    }
    out
}

pub(super) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '\\' | '=' | '|') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
