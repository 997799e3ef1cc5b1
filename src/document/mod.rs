//! Comment-preserving YAML documents.
//!
//! A [`Document`] keeps the parsed [`Node`] tree as the only source of truth.
//! Typed views are decoded from the tree on demand, and every write goes
//! back through the tree so comments and untouched formatting survive a
//! read-modify-write cycle.

mod emit;
pub mod node;
mod parser;

pub use node::{Entry, Node, NodeKind, Scalar};

use crate::error::{KegError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A parsed YAML document.
///
/// Deliberately not `Clone`: use [`Document::duplicate`] for an independent copy.
#[derive(Debug, PartialEq)]
pub struct Document {
    pub(crate) root: Option<Node>,
    /// Comment lines after the last node.
    pub(crate) foot_comment: Vec<String>,
    /// Whether the text started with `---`.
    pub(crate) explicit_start: bool,
}

impl Document {
    pub fn empty() -> Self {
        Self {
            root: None,
            foot_comment: Vec::new(),
            explicit_start: false,
        }
    }

    /// Parse UTF-8 YAML bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| KegError::invalid("document", format!("not valid UTF-8: {}", e)))?;
        Self::parse_str(text)
    }

    pub fn parse_str(text: &str) -> Result<Self> {
        let doc = parser::parse(text)?;
        // Surface undecodable scalars at read time rather than on first use.
        if let Some(root) = &doc.root {
            root.to_json()?;
        }
        Ok(doc)
    }

    /// True when the document has no content (comments do not count).
    pub fn is_empty(&self) -> bool {
        self.root.as_ref().is_none_or(Node::is_empty)
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// The root node, created as an empty mapping if the document has none.
    pub fn root_mut(&mut self) -> &mut Node {
        let root = self.root.get_or_insert_with(|| Node::mapping(Vec::new()));
        if root.is_null() {
            *root = Node::mapping(Vec::new());
        }
        root
    }

    /// The whole document as a JSON value (`null` when empty).
    pub fn to_value(&self) -> Result<Value> {
        match &self.root {
            Some(root) => root.to_json(),
            None => Ok(Value::Null),
        }
    }

    /// Decode the typed view. An empty document yields `T::default()`.
    pub fn decode<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let value = self.to_value()?;
        if value.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(value).map_err(|e| KegError::invalid("document", e))
    }

    /// Decode, let `f` edit the typed view, then write back what `f` changed.
    ///
    /// Only the parts of the typed view that differ before and after `f`
    /// reach the tree. Values the typed view merely normalizes on decode
    /// keep their original text.
    pub fn update<T, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let mut typed: T = self.decode()?;
        let before = to_json(&typed)?;
        let out = f(&mut typed);
        let after = to_json(&typed)?;
        self.assign_changes(&before, &after)?;
        Ok(out)
    }

    /// Apply the difference between two typed snapshots to the tree.
    ///
    /// `before` must be the typed view of this document as it is now.
    pub fn assign_changes(&mut self, before: &Value, after: &Value) -> Result<()> {
        if before == after {
            return Ok(());
        }
        let current = self.to_value()?;
        self.assign(&rebase(&current, before, after));
        Ok(())
    }

    /// Replace the whole tree's content with `value`, keeping what did not change.
    pub fn assign(&mut self, value: &Value) {
        let empty_object = value.as_object().is_some_and(|m| m.is_empty());
        if self.root.is_none() && (value.is_null() || empty_object) {
            return;
        }
        match &mut self.root {
            Some(root) => root.assign(value),
            None => self.root = Some(Node::from_json(value)),
        }
    }

    /// Set the value at `path`, creating intermediate mappings as needed.
    pub fn set(&mut self, path: &[&str], value: &impl Serialize) -> Result<()> {
        let value = to_json(value)?;
        match path.split_last() {
            Some((key, parents)) => self.root_mut().ensure_path(parents).set_child(key, &value),
            None => self.assign(&value),
        }
        Ok(())
    }

    /// Replace the item of the sequence at `path` whose `key_field` matches
    /// `value`'s, or append `value` to it.
    pub fn upsert_keyed(
        &mut self,
        path: &[&str],
        key_field: &str,
        value: &impl Serialize,
    ) -> Result<()> {
        let value = to_json(value)?;
        if value.get(key_field).is_none() {
            return Err(KegError::invalid(
                "document",
                format!("keyed value has no {:?} field", key_field),
            ));
        }
        self.root_mut().ensure_path(path).upsert_keyed(key_field, &value);
        Ok(())
    }

    /// Remove the key at `path`. Returns whether anything was removed.
    pub fn remove(&mut self, path: &[&str]) -> bool {
        let Some((key, parents)) = path.split_last() else {
            return false;
        };
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        let mut node = root;
        for parent in parents {
            let NodeKind::Mapping(entries) = &mut node.kind else {
                return false;
            };
            match entries.iter_mut().find(|e| e.key_text() == *parent) {
                Some(entry) => node = &mut entry.value,
                None => return false,
            }
        }
        node.remove_child(key)
    }

    pub fn get(&self, path: &[&str]) -> Option<&Node> {
        self.root.as_ref()?.get_path(path)
    }

    /// Decoded value at `path`, if present.
    pub fn get_value(&self, path: &[&str]) -> Result<Option<Value>> {
        self.get(path).map(Node::to_json).transpose()
    }

    pub fn to_yaml(&self) -> String {
        emit::emit(self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_yaml().into_bytes()
    }

    /// Independent copy made by serializing and parsing again.
    pub fn duplicate(&self) -> Result<Self> {
        Self::parse_str(&self.to_yaml())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

fn to_json(value: &impl Serialize) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| KegError::invalid("document", e))
}

/// Carry the edit from `before` to `after` over onto `current`, the tree's
/// own value. Wherever the snapshots agree, `current` is kept as is.
fn rebase(current: &Value, before: &Value, after: &Value) -> Value {
    if before == after {
        return current.clone();
    }

    match (current, before, after) {
        (Value::Object(cur), Value::Object(old), Value::Object(new)) => {
            let mut out = Map::new();
            // Keys the typed view never saw stay untouched.
            for (key, value) in cur {
                if !old.contains_key(key) && !new.contains_key(key) {
                    out.insert(key.clone(), value.clone());
                }
            }
            for (key, value) in new {
                let merged = match (cur.get(key), old.get(key)) {
                    (Some(c), Some(o)) => rebase(c, o, value),
                    (None, Some(o)) if o == value => continue,
                    _ => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(cur), Value::Array(old), Value::Array(new)) if cur.len() == old.len() => {
            let mut used = vec![false; old.len()];
            new.iter()
                .map(|value| {
                    if let Some(j) = (0..old.len()).find(|&j| !used[j] && old[j] == *value) {
                        used[j] = true;
                        return cur[j].clone();
                    }
                    let same_identity = node::identity(value).and_then(|(field, id)| {
                        (0..old.len()).find(|&j| !used[j] && old[j].get(field) == Some(id))
                    });
                    match same_identity {
                        Some(j) => {
                            used[j] = true;
                            rebase(&cur[j], &old[j], value)
                        }
                        None => value.clone(),
                    }
                })
                .collect()
        }
        _ => after.clone(),
    }
}
