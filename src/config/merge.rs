//! Layer merging.
//!
//! Precedence is fixed: later layers win. The known fields each have their
//! own rule:
//!
//! - `defaultKeg`, `logFile`, `logLevel`: last non-empty value wins
//! - `kegs`: destructive union, a later alias replaces the whole earlier target
//! - `kegMap`: concatenated, a later rule for an existing alias replaces that
//!   rule at its original position
//! - `registries`: replaced whole
//! - other top-level keys: deep-merged with [`deep_merge`]

use super::loader::{ConfigLayer, ConfigTier};
use super::types::Config;
use crate::document::Document;
use crate::error::{KegError, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// The effective configuration plus the tree it will be rendered into.
#[derive(Debug)]
pub struct MergedConfig {
    pub config: Config,
    /// Copy of the last non-empty layer's tree.
    document: Option<Document>,
    source: Option<ConfigTier>,
}

impl MergedConfig {
    /// Tier whose tree was retained.
    pub fn source(&self) -> Option<ConfigTier> {
        self.source
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Serialize the merged view onto the retained tree, keeping that
    /// layer's comments for everything the merge left unchanged.
    pub fn render(&self) -> Result<String> {
        let mut document = match &self.document {
            Some(doc) => doc.duplicate()?,
            None => Document::empty(),
        };
        let own: Config = document.decode()?;
        let to_json = |config: &Config| {
            serde_json::to_value(config).map_err(|e| KegError::invalid("merged config", e))
        };
        document.assign_changes(&to_json(&own)?, &to_json(&self.config)?)?;
        Ok(document.to_yaml())
    }
}

/// Merge layers given weakest first.
///
/// Never fails: a layer that cannot be decoded is logged and skipped.
pub fn merge_config(layers: &[ConfigLayer]) -> MergedConfig {
    let mut config = Config::default();
    let mut dominant: Option<&ConfigLayer> = None;

    for layer in layers {
        let overlay = match layer.config() {
            Ok(overlay) => overlay,
            Err(e) => {
                warn!(tier = %layer.tier, error = %e, "treating undecodable config layer as empty");
                continue;
            }
        };
        merge_into(&mut config, overlay);

        if !layer.is_empty() {
            dominant = Some(layer);
        }
    }

    let document = dominant.and_then(|layer| match layer.document.duplicate() {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(tier = %layer.tier, error = %e, "could not copy config tree");
            None
        }
    });
    let source = dominant.map(|layer| layer.tier);
    debug!(?source, kegs = config.kegs.len(), rules = config.keg_map.len(), "merged config");

    MergedConfig {
        config,
        document,
        source,
    }
}

/// Fold one layer's config over the accumulated result.
pub fn merge_into(base: &mut Config, overlay: Config) {
    if let Some(alias) = overlay.default_alias() {
        base.default_keg = Some(alias.to_string());
    }

    base.kegs.extend(overlay.kegs);

    for rule in overlay.keg_map {
        base.upsert_rule(rule);
    }

    if let Some(file) = overlay.log_file.filter(|s| !s.is_empty()) {
        base.log_file = Some(file);
    }
    if let Some(level) = overlay.log_level.filter(|s| !s.is_empty()) {
        base.log_level = Some(level);
    }
    if let Some(registries) = overlay.registries.filter(|v| !v.is_null()) {
        base.registries = Some(registries);
    }

    for (key, value) in overlay.extra {
        let merged = match base.extra.remove(&key) {
            Some(existing) => deep_merge(existing, value),
            None => value,
        };
        base.extra.insert(key, merged);
    }
}

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}
