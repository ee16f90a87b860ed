use super::lex::escape;
use super::{Block, Container, FieldValue, Fields, MarkupDocument};

/// Blocks are separated by a blank line; a non-empty document ends with a newline.
pub fn render(doc: &MarkupDocument) -> String {
    if doc.is_empty() {
        return String::new();
    }
    let mut out = doc
        .blocks()
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}

/// One block, without a trailing newline.
pub fn render_block(block: &Block) -> String {
    let mut lines = vec![format!("=d={}=w=", block.name)];
    lines.extend(block.comments.iter().map(|c| format!("=#= {} =o=", escape(c))));
    push_fields(&mut lines, &block.fields);
    for container in &block.containers {
        push_container(&mut lines, container);
    }
    lines.extend(block.raw_lines.iter().cloned());
    lines.push(format!("=q={}=e=", block.name));
    lines.join("\n")
}

fn push_container(lines: &mut Vec<String>, container: &Container) {
    lines.push("=dw=".to_string());
    lines.extend(container.comments.iter().map(|c| format!("=#= {} =o=", escape(c))));
    push_fields(lines, &container.fields);
    lines.extend(container.added.iter().map(|a| format!("=+= {} =o=", escape(a))));
    lines.extend(container.removed.iter().map(|r| format!("=-= {} =o=", escape(r))));
    lines.extend(container.raw_lines.iter().cloned());
    lines.push("=wd=".to_string());
}

fn push_fields(lines: &mut Vec<String>, fields: &Fields) {
    for (key, value) in fields.iter() {
        lines.push(format!("=x= {}{} =z=", key, render_value(value)));
    }
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Scalar(v) => format!(";|{}|;", escape(v)),
        FieldValue::List(values) if values.is_empty() => ",".to_string(),
        FieldValue::List(values) => {
            let mut out = values
                .iter()
                .map(|v| format!(";|{}|;", escape(v)))
                .collect::<Vec<_>>()
                .join(",");
            if values.len() == 1 {
                out.push(',');
            }
            out
        }
    }
}
