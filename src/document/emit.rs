//! Serialize a document tree back to YAML text with two-space indentation.

use super::Document;
use super::node::{Entry, Node, NodeKind, Scalar};

pub fn emit(doc: &Document) -> String {
    let mut out = String::new();

    if doc.explicit_start {
        out.push_str("---\n");
    }

    if let Some(root) = &doc.root {
        comments(&root.head_comment, 0, &mut out);
        match &root.kind {
            NodeKind::Mapping(entries) => mapping(entries, 0, &mut out),
            NodeKind::Sequence(items) if !items.is_empty() => sequence(items, 0, &mut out),
            NodeKind::Sequence(_) => out.push_str("[]\n"),
            NodeKind::Scalar(scalar) => {
                match scalar {
                    Scalar::Inline(raw) => out.push_str(raw),
                    Scalar::Block { header, .. } => out.push_str(header),
                }
                line_comment(root.line_comment.as_deref(), &mut out);
                out.push('\n');
                if let Scalar::Block { lines, .. } = scalar {
                    block_lines(lines, 2, &mut out);
                }
            }
        }
    }

    comments(&doc.foot_comment, 0, &mut out);
    out
}

fn pad(indent: usize, out: &mut String) {
    out.extend(std::iter::repeat_n(' ', indent));
}

fn comments(lines: &[String], indent: usize, out: &mut String) {
    for line in lines {
        if !line.is_empty() {
            pad(indent, out);
            out.push_str(line);
        }
        out.push('\n');
    }
}

fn line_comment(comment: Option<&str>, out: &mut String) {
    if let Some(comment) = comment {
        out.push(' ');
        out.push_str(comment);
    }
}

fn block_lines(lines: &[String], indent: usize, out: &mut String) {
    for line in lines {
        if !line.is_empty() {
            pad(indent, out);
            out.push_str(line);
        }
        out.push('\n');
    }
}

fn mapping(entries: &[Entry], indent: usize, out: &mut String) {
    for entry in entries {
        comments(&entry.key.head_comment, indent, out);
        pad(indent, out);
        if let NodeKind::Scalar(Scalar::Inline(raw)) = &entry.key.kind {
            out.push_str(raw);
        }
        out.push(':');
        value(&entry.value, entry.key.line_comment.as_deref(), indent, out);
    }
}

/// Write a value after `key:` or `-`, nesting blocks at `indent + 2`.
fn value(node: &Node, outer_comment: Option<&str>, indent: usize, out: &mut String) {
    let comment = node.line_comment.as_deref().or(outer_comment);

    match &node.kind {
        NodeKind::Scalar(Scalar::Inline(raw)) => {
            if !raw.is_empty() {
                out.push(' ');
                out.push_str(raw);
            }
            line_comment(comment, out);
            out.push('\n');
        }
        NodeKind::Scalar(Scalar::Block { header, lines }) => {
            out.push(' ');
            out.push_str(header);
            line_comment(comment, out);
            out.push('\n');
            block_lines(lines, indent + 2, out);
        }
        NodeKind::Mapping(entries) if entries.is_empty() => {
            out.push_str(" {}");
            line_comment(comment, out);
            out.push('\n');
        }
        NodeKind::Sequence(items) if items.is_empty() => {
            out.push_str(" []");
            line_comment(comment, out);
            out.push('\n');
        }
        NodeKind::Mapping(entries) => {
            line_comment(comment, out);
            out.push('\n');
            comments(&node.head_comment, indent + 2, out);
            mapping(entries, indent + 2, out);
            comments(&node.foot_comment, indent + 2, out);
        }
        NodeKind::Sequence(items) => {
            line_comment(comment, out);
            out.push('\n');
            comments(&node.head_comment, indent + 2, out);
            sequence(items, indent + 2, out);
            comments(&node.foot_comment, indent + 2, out);
        }
    }
}

fn sequence(items: &[Node], indent: usize, out: &mut String) {
    for item in items {
        comments(&item.head_comment, indent, out);
        pad(indent, out);
        out.push('-');

        match &item.kind {
            // `- key: value` with the rest of the mapping aligned under the first key.
            NodeKind::Mapping(entries)
                if !entries.is_empty()
                    && item.line_comment.is_none()
                    && entries[0].key.head_comment.is_empty() =>
            {
                let mut nested = String::new();
                mapping(entries, indent + 2, &mut nested);
                out.push(' ');
                out.push_str(&nested[indent + 2..]);
                comments(&item.foot_comment, indent + 2, out);
            }
            NodeKind::Sequence(inner)
                if !inner.is_empty()
                    && item.line_comment.is_none()
                    && inner[0].head_comment.is_empty() =>
            {
                let mut nested = String::new();
                sequence(inner, indent + 2, &mut nested);
                out.push(' ');
                out.push_str(&nested[indent + 2..]);
                comments(&item.foot_comment, indent + 2, out);
            }
            _ => value(item, None, indent, out),
        }
    }
}
