//! Keg locators.
//!
//! A [`Target`] says where a keg lives: a local directory, an HTTP(S)
//! endpoint, a `repo:user/keg` registry triple or an in-memory store. The
//! scheme is never stored; [`Target::scheme`] derives it from which address
//! field is populated.
//!
//! Raw strings are classified by the ordered rules in [`classify`]:
//!
//! | Input | Scheme |
//! |---|---|
//! | `registry:alice/notes` | `registry` |
//! | `https://host/path`, `file:///p`, `memory://name` | as written |
//! | `/p`, `./p`, `../p`, `~/p`, `C:\p` | `file` |
//! | `example.com/owner/repo` | `https` |
//! | anything else | `file` |

pub mod classify;

use crate::env::{self, Env};
use crate::error::{ExpansionErrors, KegError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub use classify::{CLASSIFIERS, Classifier, classify};

/// Addressing scheme of a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    File,
    Http,
    Https,
    Registry,
    Memory,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::File => write!(f, "file"),
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
            Scheme::Registry => write!(f, "registry"),
            Scheme::Memory => write!(f, "memory"),
        }
    }
}

/// Where a keg lives and how to reach it.
#[derive(Debug, Clone, Eq)]
pub struct Target {
    file: Option<String>,
    url: Option<String>,
    repo: Option<String>,
    user: Option<String>,
    keg: Option<String>,
    memory: Option<String>,
    password: Option<String>,
    token: Option<String>,
    token_env: Option<String>,
    readonly: bool,
    /// Set once [`Target::expand`] has run. Not part of equality.
    expanded: bool,
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file
            && self.url == other.url
            && self.repo == other.repo
            && self.user == other.user
            && self.keg == other.keg
            && self.memory == other.memory
            && self.password == other.password
            && self.token == other.token
            && self.token_env == other.token_env
            && self.readonly == other.readonly
    }
}

impl Target {
    fn empty() -> Self {
        Self {
            file: None,
            url: None,
            repo: None,
            user: None,
            keg: None,
            memory: None,
            password: None,
            token: None,
            token_env: None,
            readonly: false,
            expanded: false,
        }
    }

    /// A keg in a local directory.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::empty()
        }
    }

    /// A keg published in a registry as `repo:user/keg`.
    pub fn registry(repo: &str, user: &str, keg: &str) -> Self {
        Self {
            repo: Some(repo.to_string()),
            user: Some(user.to_string()),
            keg: Some(keg.to_string()),
            ..Self::empty()
        }
    }

    /// An in-memory keg, used by tests and scratch sessions.
    pub fn memory(name: &str) -> Self {
        Self {
            memory: Some(name.to_string()),
            ..Self::empty()
        }
    }

    /// A keg served over HTTP(S). The URL is validated and normalized.
    pub fn url(url: &str) -> Result<Self> {
        parse_url(url)
    }

    /// Parse a raw locator string.
    pub fn parse(raw: &str) -> Result<Self> {
        classify::parse_locator(raw)
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_token_env(mut self, name: &str) -> Self {
        self.token_env = Some(name.to_string());
        self
    }

    /// Basic-auth credentials for URL targets.
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_string());
        self.password = Some(password.to_string());
        self
    }

    /// The scheme implied by the populated address field.
    pub fn scheme(&self) -> Scheme {
        if self.memory.is_some() {
            Scheme::Memory
        } else if self.repo.is_some() {
            Scheme::Registry
        } else if let Some(url) = &self.url {
            if url.starts_with("http://") {
                Scheme::Http
            } else {
                Scheme::Https
            }
        } else {
            Scheme::File
        }
    }

    /// File path for `file` targets.
    pub fn path(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// URL for `http`/`https` targets, without locator query parameters.
    pub fn url_str(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    /// Registry owner, or the basic-auth user for URL targets.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn keg(&self) -> Option<&str> {
        self.keg.as_deref()
    }

    pub fn memory_name(&self) -> Option<&str> {
        self.memory.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn token_env(&self) -> Option<&str> {
        self.token_env.as_deref()
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// The literal token, else the value of the variable named by `tokenEnv`.
    pub fn resolve_token(&self, env: &dyn Env) -> Option<String> {
        self.token
            .clone()
            .or_else(|| self.token_env.as_deref().and_then(|name| env.get(name)))
    }

    /// Substitute variables and a leading `~` in address and credential fields.
    ///
    /// Every field is attempted. A field that fails keeps its previous value
    /// and the failures are returned together. Expansion happens once: a
    /// variable whose value itself contains `$` or `~` is not expanded again
    /// by a later call.
    pub fn expand(&mut self, env: &dyn Env) -> Result<()> {
        if self.expanded {
            return Ok(());
        }
        self.expanded = true;
        let mut errors = ExpansionErrors::default();

        expand_field("file", &mut self.file, &mut errors, |v| env::expand(v, env));
        expand_field("url", &mut self.url, &mut errors, |v| env::expand_env(v, env));
        expand_field("repo", &mut self.repo, &mut errors, |v| env::expand_env(v, env));
        expand_field("user", &mut self.user, &mut errors, |v| env::expand_env(v, env));
        expand_field("keg", &mut self.keg, &mut errors, |v| env::expand_env(v, env));
        expand_field("memory", &mut self.memory, &mut errors, |v| env::expand_env(v, env));
        expand_field("password", &mut self.password, &mut errors, |v| {
            env::expand_env(v, env)
        });
        expand_field("token", &mut self.token, &mut errors, |v| env::expand_env(v, env));

        errors.into_result()
    }

    /// Serialized as a plain string when nothing would be lost and the
    /// string parses back to the same target.
    fn is_compact(&self) -> bool {
        let url_user = self.url.is_some() && self.user.is_some();
        !self.readonly
            && !url_user
            && self.password.is_none()
            && self.token.is_none()
            && self.token_env.is_none()
            && Target::parse(&self.to_string()).is_ok_and(|back| back == *self)
    }

    /// Build from explicitly given fields. Exactly one address kind may be present.
    fn from_fields(fields: TargetFields) -> Result<Self> {
        let registry = fields.repo.is_some() || fields.keg.is_some();
        let kinds = [
            fields.file.is_some(),
            fields.url.is_some(),
            registry,
            fields.memory.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if kinds == 0 {
            return Err(KegError::invalid(
                "locator",
                "one of file, url, repo/user/keg or memory is required",
            ));
        }
        if kinds > 1 {
            return Err(KegError::invalid(
                "locator",
                "file, url, repo/user/keg and memory are mutually exclusive",
            ));
        }

        let mut target = if let Some(url) = &fields.url {
            parse_url(url)?
        } else if registry {
            match (&fields.repo, &fields.user, &fields.keg) {
                (Some(repo), Some(user), Some(keg)) => Target::registry(repo, user, keg),
                _ => {
                    return Err(KegError::invalid(
                        "locator",
                        "registry targets need repo, user and keg",
                    ));
                }
            }
        } else if let Some(file) = &fields.file {
            Target::file(collapse_separators(file))
        } else {
            Target::memory(fields.memory.as_deref().unwrap_or_default())
        };

        if fields.url.is_some() {
            target.user = fields.user;
        }
        target.password = fields.password;
        target.token = fields.token.or(target.token);
        target.token_env = fields.token_env.or(target.token_env);
        target.readonly = fields.readonly || target.readonly;
        Ok(target)
    }
}

fn expand_field(
    name: &str,
    slot: &mut Option<String>,
    errors: &mut ExpansionErrors,
    expand: impl Fn(&str) -> std::result::Result<String, String>,
) {
    if let Some(value) = slot {
        match expand(value) {
            Ok(expanded) => *value = expanded,
            Err(reason) => errors.push(name, reason),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme() {
            Scheme::File => write!(f, "{}", self.file.as_deref().unwrap_or_default()),
            Scheme::Memory => write!(f, "memory://{}", self.memory.as_deref().unwrap_or_default()),
            Scheme::Registry => write!(
                f,
                "{}:{}/{}",
                self.repo.as_deref().unwrap_or_default(),
                self.user.as_deref().unwrap_or_default(),
                self.keg.as_deref().unwrap_or_default()
            ),
            Scheme::Http | Scheme::Https => {
                let raw = self.url.as_deref().unwrap_or_default();
                let Ok(mut url) = Url::parse(raw) else {
                    return write!(f, "{}", raw);
                };
                if self.readonly || self.token.is_some() || self.token_env.is_some() {
                    let mut pairs = url.query_pairs_mut();
                    if self.readonly {
                        pairs.append_pair("readonly", "true");
                    }
                    if let Some(token) = &self.token {
                        pairs.append_pair("token", token);
                    }
                    if let Some(name) = &self.token_env {
                        pairs.append_pair("token-env", name);
                    }
                }
                write!(f, "{}", url)
            }
        }
    }
}

impl FromStr for Target {
    type Err = KegError;

    fn from_str(s: &str) -> Result<Self> {
        Target::parse(s)
    }
}

/// Mapping form of a locator as it appears in config documents.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TargetFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_env: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    readonly: bool,
}

impl From<&Target> for TargetFields {
    fn from(t: &Target) -> Self {
        Self {
            file: t.file.clone(),
            url: t.url.clone(),
            repo: t.repo.clone(),
            user: t.user.clone(),
            keg: t.keg.clone(),
            memory: t.memory.clone(),
            password: t.password.clone(),
            token: t.token.clone(),
            token_env: t.token_env.clone(),
            readonly: t.readonly,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Locator(String),
    Fields(TargetFields),
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_compact() {
            serializer.collect_str(self)
        } else {
            TargetFields::from(self).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;

        match TargetRepr::deserialize(deserializer)? {
            TargetRepr::Locator(raw) => Target::parse(&raw).map_err(D::Error::custom),
            TargetRepr::Fields(fields) => Target::from_fields(fields).map_err(D::Error::custom),
        }
    }
}

/// Collapse runs of `/` (and of `\`) into a single separator.
pub(crate) fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev: Option<char> = None;
    for c in path.chars() {
        if (c == '/' || c == '\\') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "" | "true" | "1" | "yes"
    )
}

/// Parse an HTTP(S) locator, lifting `readonly`, `token` and `token-env`
/// query parameters onto the target.
pub(crate) fn parse_url(raw: &str) -> Result<Target> {
    let mut url = Url::parse(raw)
        .map_err(|e| KegError::invalid("locator url", format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(KegError::invalid(
            "locator url",
            format!("unsupported scheme {:?}", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(KegError::invalid("locator url", format!("{} has no host", raw)));
    }

    let mut target = Target::empty();
    let mut kept = Vec::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "readonly" => target.readonly = truthy(&value),
            "token" => target.token = Some(value.into_owned()),
            "token-env" => target.token_env = Some(value.into_owned()),
            _ => kept.push((key.into_owned(), value.into_owned())),
        }
    }
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = collapse_separators(url.path());
    url.set_path(&path);

    target.url = Some(url.to_string());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    #[test]
    fn test_parse_file_path() {
        let t = Target::parse("/home/x/keg").unwrap();
        assert_eq!(t.scheme(), Scheme::File);
        assert_eq!(t.path(), Some("/home/x/keg"));
    }

    #[test]
    fn test_parse_host_like_defaults_to_https() {
        let t = Target::parse("example.com/owner/repo").unwrap();
        assert_eq!(t.scheme(), Scheme::Https);
        assert_eq!(t.url_str(), Some("https://example.com/owner/repo"));
    }

    #[test]
    fn test_parse_registry_shorthand() {
        let t = Target::parse("registry:alice/notes").unwrap();
        assert_eq!(t.scheme(), Scheme::Registry);
        assert_eq!(t.repo(), Some("registry"));
        assert_eq!(t.user(), Some("alice"));
        assert_eq!(t.keg(), Some("notes"));
    }

    #[test]
    fn test_parse_empty_fails() {
        let err = Target::parse("").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Invalid);
    }

    #[test]
    fn test_duplicate_separators_collapsed() {
        let t = Target::parse("/home//x///keg").unwrap();
        assert_eq!(t.path(), Some("/home/x/keg"));
        let t = Target::parse("https://example.com//a//b").unwrap();
        assert_eq!(t.url_str(), Some("https://example.com/a/b"));
    }

    #[test]
    fn test_tilde_kept_until_expand() {
        let mut t = Target::parse("~/kegs/notes").unwrap();
        assert_eq!(t.path(), Some("~/kegs/notes"));
        t.expand(&MapEnv::new().with_home("/home/alice")).unwrap();
        assert_eq!(t.path(), Some("/home/alice/kegs/notes"));
    }

    #[test]
    fn test_query_parameters_lifted() {
        let t = Target::parse("https://example.com/k?readonly=true&token-env=KEG_TOKEN&page=2")
            .unwrap();
        assert!(t.readonly());
        assert_eq!(t.token_env(), Some("KEG_TOKEN"));
        assert_eq!(t.url_str(), Some("https://example.com/k?page=2"));
    }

    #[test]
    fn test_plain_http_scheme() {
        let t = Target::parse("http://localhost:8080/keg").unwrap();
        assert_eq!(t.scheme(), Scheme::Http);

        let t = Target::parse("localhost:8080/keg").unwrap();
        assert_eq!(t.url_str(), Some("https://localhost:8080/keg"));
    }

    #[test]
    fn test_round_trip_every_scheme() {
        for raw in [
            "/home/x/keg",
            "./relative/keg",
            "registry:alice/notes",
            "https://example.com/owner/repo",
            "http://localhost:8080/keg",
            "https://example.com/k?readonly=true&token=abc",
            "memory://scratch",
        ] {
            let t = Target::parse(raw).unwrap();
            let again = Target::parse(&t.to_string()).unwrap();
            assert_eq!(again, t, "round trip of {}", raw);
        }
    }

    #[test]
    fn test_expand_is_idempotent() {
        let env = MapEnv::new()
            .with_home("/home/alice")
            .with_var("KEG_TOKEN", "t0k");
        let mut t = Target::file("~/notes/$USER_DIR");
        let _ = t.expand(&env);
        let once = t.clone();
        let _ = t.expand(&env);
        assert_eq!(t, once);

        let mut t = Target::url("https://example.com/k")
            .unwrap()
            .with_token("$KEG_TOKEN");
        t.expand(&env).unwrap();
        let once = t.clone();
        t.expand(&env).unwrap();
        assert_eq!(t, once);
        assert_eq!(t.token(), Some("t0k"));
    }

    #[test]
    fn test_expand_does_not_reexpand_substituted_values() {
        let env = MapEnv::new()
            .with_home("/home/alice")
            .with_var("A", "$B")
            .with_var("B", "final")
            .with_var("T", "~/x");
        let mut t = Target::file("/kegs/$A").with_token("$T");
        t.expand(&env).unwrap();
        assert_eq!(t.path(), Some("/kegs/$B"));
        assert_eq!(t.token(), Some("~/x"));

        let once = t.clone();
        t.expand(&env).unwrap();
        assert_eq!(t, once);
        assert_eq!(t.path(), Some("/kegs/$B"));
    }

    #[test]
    fn test_expand_collects_failures_and_keeps_values() {
        let env = MapEnv::new().with_var("PW", "secret");
        let mut t = Target::url("https://example.com/k")
            .unwrap()
            .with_credentials("$MISSING_USER", "$PW")
            .with_token("$MISSING_TOKEN");
        let err = t.expand(&env).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ExpansionFailure);
        assert!(err.to_string().contains("user"));
        assert!(err.to_string().contains("token"));
        assert_eq!(t.user(), Some("$MISSING_USER"));
        assert_eq!(t.password(), Some("secret"));
        assert_eq!(t.token(), Some("$MISSING_TOKEN"));
    }

    #[test]
    fn test_resolve_token_from_env() {
        let env = MapEnv::new().with_var("KEG_TOKEN", "t0k");
        let t = Target::url("https://example.com/k")
            .unwrap()
            .with_token_env("KEG_TOKEN");
        assert_eq!(t.resolve_token(&env).as_deref(), Some("t0k"));
    }

    #[test]
    fn test_deserialize_string_and_mapping() {
        let t: Target = serde_json::from_value(serde_json::json!("registry:alice/notes")).unwrap();
        assert_eq!(t.scheme(), Scheme::Registry);

        let t: Target = serde_json::from_value(serde_json::json!({
            "url": "https://example.com/k",
            "user": "bob",
            "password": "pw",
            "readonly": true
        }))
        .unwrap();
        assert_eq!(t.scheme(), Scheme::Https);
        assert_eq!(t.user(), Some("bob"));
        assert!(t.readonly());

        let t: Target = serde_json::from_value(serde_json::json!({
            "repo": "hub", "user": "alice", "keg": "notes"
        }))
        .unwrap();
        assert_eq!(t.to_string(), "hub:alice/notes");
    }

    #[test]
    fn test_deserialize_rejects_conflicting_fields() {
        let res: std::result::Result<Target, _> = serde_json::from_value(serde_json::json!({
            "file": "/a", "url": "https://example.com"
        }));
        assert!(res.is_err());

        let res: std::result::Result<Target, _> =
            serde_json::from_value(serde_json::json!({ "repo": "hub" }));
        assert!(res.is_err());
    }

    #[test]
    fn test_serialize_compact_and_full() {
        let t = Target::parse("/home/x/keg").unwrap();
        assert_eq!(serde_json::to_value(&t).unwrap(), serde_json::json!("/home/x/keg"));

        let t = Target::file("/home/x/keg").with_readonly(true);
        assert_eq!(
            serde_json::to_value(&t).unwrap(),
            serde_json::json!({ "file": "/home/x/keg", "readonly": true })
        );

        let t = Target::url("https://example.com/k")
            .unwrap()
            .with_token_env("KEG_TOKEN");
        let back: Target = serde_json::from_value(serde_json::to_value(&t).unwrap()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_ambiguous_file_path_serializes_as_mapping() {
        for target in [
            Target::file("kegs.d/notes"),
            Target::file("hub:alice/notes"),
            Target::file("example.com"),
        ] {
            let json = serde_json::to_value(&target).unwrap();
            assert_eq!(json["file"], serde_json::json!(target.path().unwrap()));
            let back: Target = serde_json::from_value(json).unwrap();
            assert_eq!(back.scheme(), Scheme::File);
            assert_eq!(back, target);
        }

        let t = Target::file("notes");
        assert_eq!(serde_json::to_value(&t).unwrap(), serde_json::json!("notes"));
    }
}
