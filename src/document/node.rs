//! Generic YAML tree with attached comments.

use crate::error::{KegError, Result};
use serde_json::{Map, Value};

/// Fields used to match up sequence items whose content changed.
const IDENTITY_FIELDS: &[&str] = &["alias", "name", "id"];

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Comment and blank lines directly above the node (`""` for a blank line).
    pub head_comment: Vec<String>,
    /// Trailing `# ...` comment on the node's line.
    pub line_comment: Option<String>,
    /// Comment lines after the last child of a nested block, kept at its indentation.
    pub foot_comment: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Mapping(Vec<Entry>),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

/// One `key: value` pair. Comments above the pair live on the key.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Node,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Plain, quoted or single-line flow text exactly as written. Empty means null.
    Inline(String),
    /// A `|` or `>` block scalar: header plus content lines relative to the block indent.
    Block { header: String, lines: Vec<String> },
}

impl Entry {
    pub fn new(key: &str, value: Node) -> Self {
        Self {
            key: Node::scalar(encode_string(key)),
            value,
        }
    }

    /// The decoded key.
    pub fn key_text(&self) -> String {
        match &self.key.kind {
            NodeKind::Scalar(Scalar::Inline(raw)) => decode_key(raw),
            _ => String::new(),
        }
    }
}

impl Node {
    fn bare(kind: NodeKind) -> Self {
        Self {
            kind,
            head_comment: Vec::new(),
            line_comment: None,
            foot_comment: Vec::new(),
        }
    }

    pub fn scalar(raw: impl Into<String>) -> Self {
        Self::bare(NodeKind::Scalar(Scalar::Inline(raw.into())))
    }

    pub fn mapping(entries: Vec<Entry>) -> Self {
        Self::bare(NodeKind::Mapping(entries))
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Self::bare(NodeKind::Sequence(items))
    }

    pub fn is_null(&self) -> bool {
        match &self.kind {
            NodeKind::Scalar(Scalar::Inline(raw)) => {
                matches!(raw.as_str(), "" | "~" | "null" | "Null" | "NULL")
            }
            _ => false,
        }
    }

    /// True for an empty mapping/sequence or a null scalar.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            NodeKind::Mapping(entries) => entries.is_empty(),
            NodeKind::Sequence(items) => items.is_empty(),
            NodeKind::Scalar(_) => self.is_null(),
        }
    }

    pub fn entries(&self) -> Option<&[Entry]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Value node stored under `key` in a mapping.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries()?
            .iter()
            .find(|e| e.key_text() == key)
            .map(|e| &e.value)
    }

    /// Follow a key path through nested mappings.
    pub fn get_path(&self, path: &[&str]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Decode the subtree into a JSON value.
    pub fn to_json(&self) -> Result<Value> {
        self.to_json_at("$")
    }

    fn to_json_at(&self, at: &str) -> Result<Value> {
        match &self.kind {
            NodeKind::Mapping(entries) => {
                let mut map = Map::new();
                for entry in entries {
                    let key = entry.key_text();
                    let value = entry.value.to_json_at(&format!("{}.{}", at, key))?;
                    map.insert(key, value);
                }
                Ok(Value::Object(map))
            }
            NodeKind::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| item.to_json_at(&format!("{}[{}]", at, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            NodeKind::Scalar(Scalar::Inline(raw)) => {
                decode_scalar(raw).map_err(|e| KegError::invalid(at.to_string(), e))
            }
            NodeKind::Scalar(Scalar::Block { header, lines }) => {
                decode_block(header, lines).map_err(|e| KegError::invalid(at.to_string(), e))
            }
        }
    }

    /// Build a fresh, comment-free subtree from a JSON value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Node::mapping(
                map.iter()
                    .map(|(k, v)| Entry::new(k, Node::from_json(v)))
                    .collect(),
            ),
            Value::Array(items) => Node::sequence(items.iter().map(Node::from_json).collect()),
            scalar => Node::scalar(encode_scalar(scalar)),
        }
    }

    /// Make this node hold `value`, touching as little of the tree as possible.
    ///
    /// Subtrees whose decoded value is already equal are left alone, so their
    /// comments and formatting survive. Mapping keys are updated in place,
    /// new keys are appended and keys missing from `value` are removed unless
    /// they held null or an empty collection. Sequence items are matched by equal value, then by an
    /// identity field, then by position.
    pub fn assign(&mut self, value: &Value) {
        if self.to_json().ok().as_ref() == Some(value) {
            return;
        }

        match (&mut self.kind, value) {
            (NodeKind::Mapping(entries), Value::Object(map)) => {
                entries.retain(|e| map.contains_key(&e.key_text()) || e.value.is_empty());
                for entry in entries.iter_mut() {
                    if let Some(v) = map.get(&entry.key_text()) {
                        entry.value.assign(v);
                    }
                }
                for (key, v) in map {
                    if !entries.iter().any(|e| &e.key_text() == key) {
                        entries.push(Entry::new(key, Node::from_json(v)));
                    }
                }
            }
            (NodeKind::Sequence(items), Value::Array(values)) => {
                reconcile_sequence(items, values);
            }
            (kind, value) => {
                *kind = Node::from_json(value).kind;
            }
        }
    }

    /// Turn this node into a mapping if it is not one already and return its entries.
    fn entries_mut(&mut self) -> &mut Vec<Entry> {
        if !matches!(self.kind, NodeKind::Mapping(_)) {
            self.kind = NodeKind::Mapping(Vec::new());
        }
        match &mut self.kind {
            NodeKind::Mapping(entries) => entries,
            _ => unreachable!("node was converted to a mapping"),
        }
    }

    fn items_mut(&mut self) -> &mut Vec<Node> {
        if !matches!(self.kind, NodeKind::Sequence(_)) {
            self.kind = NodeKind::Sequence(Vec::new());
        }
        match &mut self.kind {
            NodeKind::Sequence(items) => items,
            _ => unreachable!("node was converted to a sequence"),
        }
    }

    /// The mapping at `path`, creating empty mappings along the way.
    pub fn ensure_path(&mut self, path: &[&str]) -> &mut Node {
        let Some((first, rest)) = path.split_first() else {
            return self;
        };
        let entries = self.entries_mut();
        let idx = match entries.iter().position(|e| e.key_text() == *first) {
            Some(idx) => idx,
            None => {
                entries.push(Entry::new(first, Node::mapping(Vec::new())));
                entries.len() - 1
            }
        };
        entries[idx].value.ensure_path(rest)
    }

    /// Replace the value under `key`, or append a new pair.
    pub fn set_child(&mut self, key: &str, value: &Value) {
        let entries = self.entries_mut();
        match entries.iter_mut().find(|e| e.key_text() == key) {
            Some(entry) => entry.value.assign(value),
            None => entries.push(Entry::new(key, Node::from_json(value))),
        }
    }

    /// Remove `key` from a mapping. Returns whether it was present.
    pub fn remove_child(&mut self, key: &str) -> bool {
        let NodeKind::Mapping(entries) = &mut self.kind else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.key_text() != key);
        entries.len() != before
    }

    /// Replace the first sequence item whose `key_field` equals `value`'s, or append.
    pub fn upsert_keyed(&mut self, key_field: &str, value: &Value) {
        let wanted = value.get(key_field);
        let items = self.items_mut();
        let existing = wanted.and_then(|wanted| {
            items.iter_mut().find(|item| {
                item.to_json()
                    .ok()
                    .is_some_and(|json| json.get(key_field) == Some(wanted))
            })
        });
        match existing {
            Some(item) => item.assign(value),
            None => items.push(Node::from_json(value)),
        }
    }
}

pub(crate) fn identity(value: &Value) -> Option<(&'static str, &Value)> {
    let obj = value.as_object()?;
    IDENTITY_FIELDS
        .iter()
        .find_map(|field| obj.get(*field).map(|id| (*field, id)))
}

fn reconcile_sequence(items: &mut Vec<Node>, values: &[Value]) {
    let mut old: Vec<Option<Node>> = std::mem::take(items).into_iter().map(Some).collect();
    let old_json: Vec<Option<Value>> = old
        .iter()
        .map(|n| n.as_ref().and_then(|n| n.to_json().ok()))
        .collect();
    let mut used = vec![false; old.len()];
    let mut slots: Vec<Option<usize>> = vec![None; values.len()];

    // Unchanged items, wherever they moved.
    for (i, value) in values.iter().enumerate() {
        if let Some(j) = (0..old.len()).find(|&j| !used[j] && old_json[j].as_ref() == Some(value)) {
            used[j] = true;
            slots[i] = Some(j);
        }
    }

    // Edited items that kept their identity.
    for (i, value) in values.iter().enumerate() {
        if slots[i].is_some() {
            continue;
        }
        let Some((field, id)) = identity(value) else {
            continue;
        };
        if let Some(j) = (0..old.len()).find(|&j| {
            !used[j]
                && old_json[j]
                    .as_ref()
                    .and_then(|o| o.get(field))
                    .is_some_and(|old_id| old_id == id)
        }) {
            used[j] = true;
            slots[i] = Some(j);
        }
    }

    // Anything else reuses the node at the same position.
    for i in 0..values.len() {
        if slots[i].is_none() && i < old.len() && !used[i] && identity(&values[i]).is_none() {
            used[i] = true;
            slots[i] = Some(i);
        }
    }

    for (i, value) in values.iter().enumerate() {
        let node = match slots[i].and_then(|j| old[j].take()) {
            Some(mut node) => {
                node.assign(value);
                node
            }
            None => Node::from_json(value),
        };
        items.push(node);
    }
}

/// Decode inline scalar text (plain, quoted or flow) through serde_yaml.
pub fn decode_scalar(raw: &str) -> std::result::Result<Value, String> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str::<Value>(raw).map_err(|e| format!("cannot decode {:?}: {}", raw, e))
}

fn decode_block(header: &str, lines: &[String]) -> std::result::Result<Value, String> {
    let mut snippet = format!("v: {}\n", header);
    for line in lines {
        if !line.is_empty() {
            snippet.push_str("  ");
            snippet.push_str(line);
        }
        snippet.push('\n');
    }
    let mut value: Value =
        serde_yaml::from_str(&snippet).map_err(|e| format!("cannot decode block scalar: {}", e))?;
    Ok(value.get_mut("v").map(Value::take).unwrap_or(Value::Null))
}

/// Decode a mapping key, unquoting it when needed.
pub fn decode_key(raw: &str) -> String {
    if raw.starts_with('"') || raw.starts_with('\'') {
        if let Ok(key) = serde_yaml::from_str::<String>(raw) {
            return key;
        }
    }
    raw.to_string()
}

fn encode_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => encode_string(s),
        other => other.to_string(),
    }
}

const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// Plain when serde_yaml reads it back as the same string, double-quoted otherwise.
pub fn encode_string(s: &str) -> String {
    let plain = !s.is_empty()
        && s.trim() == s
        && !s.starts_with(INDICATORS)
        && !s.contains(['\n', '\r', '\t'])
        && !s.contains(": ")
        && !s.contains(" #")
        && !s.ends_with(':')
        && serde_yaml::from_str::<Value>(s).ok() == Some(Value::String(s.to_string()));

    if plain {
        s.to_string()
    } else {
        Value::String(s.to_string()).to_string()
    }
}
