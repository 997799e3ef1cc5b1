//! Line-oriented parser for the block-YAML subset used by config files.
//!
//! Full-line comments are buffered and attached to the next node as head
//! comments, except that comments indented into a nested block that just
//! ended become that block's foot comment. Trailing comments become line
//! comments; whatever is left at the end of the input becomes the
//! document's foot comment.

use super::Document;
use super::node::{Entry, Node, NodeKind, Scalar};
use crate::error::{KegError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Content,
}

#[derive(Debug, Clone)]
struct Line {
    number: usize,
    indent: usize,
    text: String,
    kind: LineKind,
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
    /// Buffered comment lines with their indentation (`None` for blank lines).
    pending: Vec<(Option<usize>, String)>,
}

fn error(number: usize, reason: impl std::fmt::Display) -> KegError {
    KegError::invalid(format!("document line {}", number), reason)
}

/// Parse YAML text into a [`Document`].
pub fn parse(text: &str) -> Result<Document> {
    let mut parser = Parser {
        lines: split_lines(text)?,
        pos: 0,
        pending: Vec::new(),
    };
    parser.parse_document()
}

fn split_lines(text: &str) -> Result<Vec<Line>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let number = i + 1;
        let raw = raw.trim_end();
        let body = raw.trim_start_matches(' ');
        let indent = raw.len() - body.len();

        let kind = if body.is_empty() {
            LineKind::Blank
        } else if body.trim_start().starts_with('#') {
            LineKind::Comment
        } else if body.starts_with('\t') {
            return Err(error(number, "tabs are not allowed in indentation"));
        } else {
            LineKind::Content
        };

        let text = match kind {
            LineKind::Comment => body.trim_start(),
            _ => body,
        };
        lines.push(Line {
            number,
            indent,
            text: text.to_string(),
            kind,
        });
    }

    Ok(lines)
}

fn is_seq_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

fn is_block_header(value: &str) -> bool {
    value.starts_with('|') || value.starts_with('>')
}

/// Index of the quote closing the quoted scalar that opens `text`.
fn closing_quote(text: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    let (_, open) = chars.next()?;
    match open {
        '"' => {
            let mut escaped = false;
            for (i, c) in chars {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    return Some(i);
                }
            }
            None
        }
        '\'' => {
            let mut chars = chars.peekable();
            while let Some((i, c)) = chars.next() {
                if c == '\'' {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        chars.next();
                    } else {
                        return Some(i);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

/// A one-line scalar; anchors, aliases and tags are outside the supported subset.
fn plain_scalar(number: usize, value: String) -> Result<Node> {
    match value.chars().next() {
        Some('&') => Err(error(number, "anchors are not supported")),
        Some('*') => Err(error(number, "aliases are not supported")),
        Some('!') => Err(error(number, "tags are not supported")),
        _ => Ok(Node::scalar(value)),
    }
}

/// Split `key: rest` into the raw key and the raw remainder.
fn split_key(text: &str) -> Option<(String, String)> {
    if text.starts_with('"') || text.starts_with('\'') {
        let end = closing_quote(text)?;
        let after = text[end + 1..].trim_start();
        let rest = after.strip_prefix(':')?;
        if !rest.is_empty() && !rest.starts_with(' ') {
            return None;
        }
        return Some((text[..=end].to_string(), rest.trim_start().to_string()));
    }

    if text.starts_with(['[', '{', '#', '|', '>', '&', '*', '!', '?']) {
        return None;
    }

    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        if c == '#' && i > 0 && prev == ' ' {
            return None;
        }
        if c == ':' && text[i + 1..].chars().next().is_none_or(|n| n == ' ') {
            let key = text[..i].trim_end();
            if key.is_empty() {
                return None;
            }
            return Some((key.to_string(), text[i + 1..].trim_start().to_string()));
        }
        prev = c;
    }
    None
}

/// Separate a trailing `# comment` from a value, ignoring `#` inside quotes.
fn split_comment(text: &str) -> (String, Option<String>) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;

    for (i, c) in text.char_indices() {
        match quote {
            Some('"') => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    quote = None;
                }
            }
            Some(_) => {
                if c == '\'' {
                    quote = None;
                }
            }
            None => {
                let at_token_start =
                    prev.is_none_or(|p| p == ' ' || p == '[' || p == '{' || p == ',');
                if (c == '"' || c == '\'') && at_token_start {
                    quote = Some(c);
                } else if c == '#' && prev.is_none_or(|p| p == ' ') {
                    return (text[..i].trim_end().to_string(), Some(text[i..].to_string()));
                }
            }
        }
        prev = Some(c);
    }

    (text.trim_end().to_string(), None)
}

impl Parser {
    fn current(&self) -> Option<&Line> {
        self.lines.get(self.pos)
    }

    /// Buffer comment and blank lines up to the next content line.
    fn collect_comments(&mut self) {
        while let Some(line) = self.lines.get(self.pos) {
            match line.kind {
                LineKind::Blank => self.pending.push((None, String::new())),
                LineKind::Comment => self.pending.push((Some(line.indent), line.text.clone())),
                LineKind::Content => break,
            }
            self.pos += 1;
        }
    }

    fn take_pending(&mut self) -> Vec<String> {
        self.pending.drain(..).map(|(_, text)| text).collect()
    }

    /// Buffered comments indented at least `indent`, up to the last such
    /// comment. Blank lines after it stay buffered for the next node.
    fn take_foot(&mut self, indent: usize) -> Vec<String> {
        let mut end = 0;
        for (i, (line_indent, _)) in self.pending.iter().enumerate() {
            match line_indent {
                Some(n) if *n >= indent => end = i + 1,
                Some(_) => break,
                None => {}
            }
        }
        self.pending.drain(..end).map(|(_, text)| text).collect()
    }

    fn parse_document(&mut self) -> Result<Document> {
        let mut doc = Document::empty();

        self.collect_comments();
        if let Some(line) = self.current() {
            if line.indent == 0 && (line.text == "---" || line.text.starts_with("--- ")) {
                doc.explicit_start = true;
                self.pos += 1;
                self.collect_comments();
            }
        }

        if let Some(line) = self.current() {
            let indent = line.indent;
            doc.root = Some(self.parse_block(indent)?);
        }

        self.collect_comments();
        if let Some(line) = self.current() {
            if line.text == "---" {
                return Err(error(line.number, "multiple documents are not supported"));
            }
            return Err(error(line.number, "unexpected content after the root node"));
        }

        doc.foot_comment = self.take_pending();
        Ok(doc)
    }

    /// Parse the block starting at the current content line, which sits at `indent`.
    fn parse_block(&mut self, indent: usize) -> Result<Node> {
        self.collect_comments();
        let Some(line) = self.current() else {
            return Ok(Node::scalar(""));
        };

        if is_seq_item(&line.text) {
            return self.parse_sequence(indent);
        }
        if split_key(&line.text).is_some() {
            return self.parse_mapping(indent);
        }

        // A lone scalar on its own line.
        let (value, comment) = split_comment(&line.text);
        self.pos += 1;
        let mut node = if is_block_header(&value) {
            self.block_scalar(value, indent.saturating_sub(1))
        } else {
            Node::scalar(value)
        };
        node.head_comment = self.take_pending();
        node.line_comment = comment;
        self.reject_continuation(indent)?;
        Ok(node)
    }

    fn parse_mapping(&mut self, indent: usize) -> Result<Node> {
        let mut entries = Vec::new();

        loop {
            self.collect_comments();
            let Some(line) = self.current() else { break };
            if line.indent < indent {
                break;
            }
            let number = line.number;
            if line.indent > indent {
                return Err(error(number, "unexpected indentation"));
            }
            if is_seq_item(&line.text) {
                return Err(error(number, "sequence item where a mapping key was expected"));
            }
            let (key_raw, rest) = split_key(&line.text)
                .ok_or_else(|| error(number, "expected `key: value`"))?;
            self.pos += 1;

            let mut key = Node::scalar(key_raw);
            key.head_comment = self.take_pending();
            let value = self.parse_value(&rest, number, indent, &mut key)?;
            entries.push(Entry { key, value });
        }

        let mut node = Node::mapping(entries);
        if indent > 0 {
            node.foot_comment = self.take_foot(indent);
        }
        Ok(node)
    }

    /// Parse what follows `key:`; nested blocks must be indented past `indent`,
    /// except a sequence, which may sit at the key's own indentation.
    fn parse_value(
        &mut self,
        rest: &str,
        number: usize,
        indent: usize,
        key: &mut Node,
    ) -> Result<Node> {
        let (value, comment) = split_comment(rest);

        if value.is_empty() {
            key.line_comment = comment;
            self.collect_comments();
            return match self.current() {
                Some(next) if next.indent > indent => {
                    let nested = next.indent;
                    self.parse_block(nested)
                }
                Some(next) if next.indent == indent && is_seq_item(&next.text) => {
                    self.parse_sequence(indent)
                }
                _ => Ok(Node::scalar("")),
            };
        }

        let mut node = if is_block_header(&value) {
            self.block_scalar(value, indent)
        } else {
            let node = plain_scalar(number, value)?;
            self.reject_continuation(indent)?;
            node
        };
        node.line_comment = comment;
        Ok(node)
    }

    /// A scalar is done at the end of its line; deeper content after it is an error.
    fn reject_continuation(&mut self, indent: usize) -> Result<()> {
        self.collect_comments();
        match self.current() {
            Some(next) if next.indent > indent => Err(error(
                next.number,
                "unexpected indentation (multi-line scalars are not supported)",
            )),
            _ => Ok(()),
        }
    }

    fn parse_sequence(&mut self, indent: usize) -> Result<Node> {
        let mut items = Vec::new();

        loop {
            self.collect_comments();
            let Some(line) = self.current() else { break };
            if line.indent < indent || (line.indent == indent && !is_seq_item(&line.text)) {
                break;
            }
            let number = line.number;
            if line.indent > indent {
                return Err(error(number, "unexpected indentation"));
            }

            let rest = line.text[1..].to_string();
            let trimmed = rest.trim_start();
            let column = indent + 1 + (rest.len() - trimmed.len());
            let head = self.take_pending();

            let mut item = if trimmed.is_empty() || trimmed.starts_with('#') {
                self.pos += 1;
                let (_, comment) = split_comment(trimmed);
                self.collect_comments();
                let mut node = match self.current() {
                    Some(next) if next.indent > indent => {
                        let nested = next.indent;
                        self.parse_block(nested)?
                    }
                    _ => Node::scalar(""),
                };
                node.line_comment = comment.or(node.line_comment);
                node
            } else if is_seq_item(trimmed) || split_key(trimmed).is_some() {
                // `- key: value` or `- - item`: reparse the remainder as a block at its column.
                self.lines[self.pos] = Line {
                    number,
                    indent: column,
                    text: trimmed.to_string(),
                    kind: LineKind::Content,
                };
                self.parse_block(column)?
            } else {
                self.pos += 1;
                let (value, comment) = split_comment(trimmed);
                let mut node = if is_block_header(&value) {
                    self.block_scalar(value, indent)
                } else {
                    plain_scalar(number, value)?
                };
                node.line_comment = comment;
                node
            };

            let mut comments = head;
            comments.append(&mut item.head_comment);
            item.head_comment = comments;
            items.push(item);
        }

        let mut node = Node::sequence(items);
        if indent > 0 {
            node.foot_comment = self.take_foot(indent);
        }
        Ok(node)
    }

    /// Consume the content lines of a `|`/`>` block scalar whose parent sits at `indent`.
    fn block_scalar(&mut self, header: String, indent: usize) -> Node {
        let mut raw: Vec<(Option<usize>, String)> = Vec::new();

        while let Some(line) = self.current() {
            if line.kind == LineKind::Blank {
                raw.push((None, String::new()));
            } else if line.indent > indent {
                raw.push((Some(line.indent), line.text.clone()));
            } else {
                break;
            }
            self.pos += 1;
        }

        // Trailing blank lines belong to whatever follows.
        while raw.last().is_some_and(|(i, _)| i.is_none()) {
            raw.pop();
            self.pos -= 1;
        }

        let base = raw.iter().filter_map(|(i, _)| *i).min().unwrap_or(0);
        let lines = raw
            .into_iter()
            .map(|(i, text)| match i {
                Some(i) => format!("{}{}", " ".repeat(i - base), text),
                None => String::new(),
            })
            .collect();

        Node {
            kind: NodeKind::Scalar(Scalar::Block { header, lines }),
            head_comment: Vec::new(),
            line_comment: None,
            foot_comment: Vec::new(),
        }
    }
}
