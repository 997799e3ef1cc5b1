//! Typed projection of a configuration document.

use crate::locator::Target;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One configuration layer, or the merged result of several.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Alias used when no rule matches the project path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_keg: Option<String>,

    /// Path routing rules, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keg_map: Vec<KegMapRule>,

    /// Alias table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kegs: BTreeMap<String, Target>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Registry definitions, stored and written back but not interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registries: Option<Value>,

    /// Any other top-level keys, kept so they survive a rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Config {
    /// The non-empty default alias, if any.
    pub fn default_alias(&self) -> Option<&str> {
        self.default_keg.as_deref().filter(|s| !s.is_empty())
    }

    /// The rule for `alias`, if one is declared.
    pub fn rule(&self, alias: &str) -> Option<&KegMapRule> {
        self.keg_map.iter().find(|r| r.alias == alias)
    }

    /// Add `rule`, replacing an existing rule for the same alias in place.
    pub fn upsert_rule(&mut self, rule: KegMapRule) {
        match self.keg_map.iter_mut().find(|r| r.alias == rule.alias) {
            Some(existing) => *existing = rule,
            None => self.keg_map.push(rule),
        }
    }
}

/// Routes project paths under a prefix, or matching a regex, to an alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KegMapRule {
    pub alias: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_regex: Option<String>,
}

impl KegMapRule {
    pub fn prefix(alias: &str, prefix: &str) -> Self {
        Self {
            alias: alias.to_string(),
            path_prefix: Some(prefix.to_string()),
            path_regex: None,
        }
    }

    pub fn regex(alias: &str, pattern: &str) -> Self {
        Self {
            alias: alias.to_string(),
            path_prefix: None,
            path_regex: Some(pattern.to_string()),
        }
    }

    /// The regex pattern, if set and non-empty.
    pub fn regex_pattern(&self) -> Option<&str> {
        self.path_regex.as_deref().filter(|s| !s.is_empty())
    }

    /// The path prefix, if set and non-empty.
    pub fn prefix_str(&self) -> Option<&str> {
        self.path_prefix.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_config() {
        let value = json!({
            "defaultKeg": "notes",
            "kegMap": [{"alias": "work", "pathPrefix": "~/work"}],
            "kegs": {
                "notes": "~/notes",
                "work": {"url": "https://example.com/work", "readonly": true}
            },
            "logLevel": "debug",
            "registries": [{"name": "main", "url": "https://reg.example.com"}],
            "editor": "vim"
        });
        let config: Config = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(config.default_alias(), Some("notes"));
        assert_eq!(config.rule("work").unwrap().prefix_str(), Some("~/work"));
        assert!(config.kegs["work"].readonly());
        assert_eq!(config.extra["editor"], json!("vim"));

        assert_eq!(serde_json::to_value(&config).unwrap(), value);
    }

    #[test]
    fn test_empty_config_serializes_to_empty_object() {
        assert_eq!(serde_json::to_value(Config::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_upsert_rule_keeps_position() {
        let mut config = Config::default();
        config.upsert_rule(KegMapRule::prefix("a", "/a"));
        config.upsert_rule(KegMapRule::prefix("b", "/b"));
        config.upsert_rule(KegMapRule::regex("a", "^/x"));
        assert_eq!(config.keg_map[0], KegMapRule::regex("a", "^/x"));
        assert_eq!(config.keg_map[1].alias, "b");
    }

    #[test]
    fn test_empty_default_is_unset() {
        let config = Config {
            default_keg: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.default_alias(), None);
    }
}
