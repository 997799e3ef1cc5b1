//! Ordered scheme-detection rules for raw locator strings.
//!
//! Each rule is a `(predicate, builder)` pair. [`classify`] walks the list
//! top to bottom and returns the first rule whose predicate accepts the
//! input, so the heuristics can be tested one by one.

use super::{Target, collapse_separators, parse_url};
use crate::error::{KegError, Result};

/// One scheme-detection rule.
pub struct Classifier {
    /// Stable rule name, shown by `kegtap parse`.
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub build: fn(&str) -> Result<Target>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier").field("name", &self.name).finish()
    }
}

/// Rules in evaluation order. The last one always matches.
pub const CLASSIFIERS: &[Classifier] = &[
    Classifier {
        name: "registry-shorthand",
        matches: is_registry_shorthand,
        build: build_registry,
    },
    Classifier {
        name: "explicit-scheme",
        matches: has_explicit_scheme,
        build: build_explicit,
    },
    Classifier {
        name: "filesystem-path",
        matches: is_path_like,
        build: build_file,
    },
    Classifier {
        name: "host-like",
        matches: is_host_like,
        build: build_host,
    },
    Classifier {
        name: "fallback-file",
        matches: always,
        build: build_file,
    },
];

const EXPLICIT_SCHEMES: &[&str] = &["file://", "http://", "https://", "memory://"];

/// The first rule that claims `raw`.
pub fn classify(raw: &str) -> &'static Classifier {
    CLASSIFIERS
        .iter()
        .find(|c| (c.matches)(raw))
        .unwrap_or(&CLASSIFIERS[CLASSIFIERS.len() - 1])
}

/// Parse a raw locator string into a [`Target`].
pub fn parse_locator(raw: &str) -> Result<Target> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(KegError::invalid("locator", "empty locator"));
    }
    (classify(raw).build)(raw)
}

fn always(_: &str) -> bool {
    true
}

/// `label:user/keg`, where the label is not a single drive letter and the
/// user is not a port number (`localhost:8080/keg` is a host).
pub fn is_registry_shorthand(raw: &str) -> bool {
    let Some((label, rest)) = raw.split_once(':') else {
        return false;
    };
    if label.len() < 2
        || !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return false;
    }
    split_user_keg(rest).is_some_and(|(user, _)| !is_port(user))
}

fn is_port(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn split_user_keg(rest: &str) -> Option<(&str, &str)> {
    let (user, keg) = rest.split_once('/')?;
    let valid = |s: &str| {
        !s.is_empty()
            && !s
                .chars()
                .any(|c| c == '/' || c == ':' || c == '\\' || c.is_whitespace())
    };
    (valid(user) && valid(keg)).then_some((user, keg))
}

fn build_registry(raw: &str) -> Result<Target> {
    let (label, rest) = raw
        .split_once(':')
        .ok_or_else(|| KegError::invalid("locator", format!("{:?} is not label:user/keg", raw)))?;
    let (user, keg) = split_user_keg(rest)
        .ok_or_else(|| KegError::invalid("locator", format!("{:?} is not label:user/keg", raw)))?;
    Ok(Target::registry(label, user, keg))
}

pub fn has_explicit_scheme(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    EXPLICIT_SCHEMES.iter().any(|s| lower.starts_with(s))
}

fn build_explicit(raw: &str) -> Result<Target> {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("file://") {
        let path = &raw["file://".len()..];
        if path.is_empty() {
            return Err(KegError::invalid("locator", "file:// without a path"));
        }
        return Ok(Target::file(collapse_separators(path)));
    }
    if lower.starts_with("memory://") {
        let name = &raw["memory://".len()..];
        if name.is_empty() {
            return Err(KegError::invalid("locator", "memory:// without a name"));
        }
        return Ok(Target::memory(name));
    }
    parse_url(raw)
}

/// Absolute, relative, home-relative or drive-letter paths.
pub fn is_path_like(raw: &str) -> bool {
    if raw == "." || raw == ".." {
        return true;
    }
    if ["/", "\\", "./", "../", ".\\", "..\\", "~"]
        .iter()
        .any(|p| raw.starts_with(p))
    {
        return true;
    }
    let bytes = raw.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\')
}

fn build_file(raw: &str) -> Result<Target> {
    Ok(Target::file(collapse_separators(raw)))
}

/// The segment before the first `/` looks like a host name, or is
/// `name:port`.
pub fn is_host_like(raw: &str) -> bool {
    let host = raw.split('/').next().unwrap_or_default();
    if host.is_empty() || host.starts_with('.') || host.chars().any(char::is_whitespace) {
        return false;
    }
    match host.rsplit_once(':') {
        Some((name, port)) => !name.is_empty() && !name.contains(':') && is_port(port),
        None => host.contains('.'),
    }
}

fn build_host(raw: &str) -> Result<Target> {
    parse_url(&format!("https://{}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(raw: &str) -> &'static str {
        classify(raw).name
    }

    #[test]
    fn test_registry_shorthand_predicate() {
        assert!(is_registry_shorthand("registry:alice/notes"));
        assert!(is_registry_shorthand("my-reg:bob/work_notes"));
        assert!(!is_registry_shorthand("c:alice/notes"));
        assert!(!is_registry_shorthand("https://example.com/a"));
        assert!(!is_registry_shorthand("reg:alice"));
        assert!(!is_registry_shorthand("reg:alice/notes/extra"));
        assert!(!is_registry_shorthand("example.com:alice/notes"));
        assert!(!is_registry_shorthand("localhost:8080/keg"));
    }

    #[test]
    fn test_path_predicate() {
        for raw in ["/home/x", "./keg", "../keg", "~/keg", "~", ".", "C:\\kegs", "d:/kegs"] {
            assert!(is_path_like(raw), "{} should be path-like", raw);
        }
        assert!(!is_path_like("keg"));
        assert!(!is_path_like("example.com/x"));
    }

    #[test]
    fn test_host_predicate() {
        assert!(is_host_like("example.com/owner/repo"));
        assert!(is_host_like("example.com"));
        assert!(!is_host_like("owner/repo"));
        assert!(!is_host_like(".hidden/x"));
        assert!(is_host_like("localhost:8080/keg"));
        assert!(!is_host_like("localhost:/keg"));
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(rule("registry:alice/notes"), "registry-shorthand");
        assert_eq!(rule("https://example.com/x"), "explicit-scheme");
        assert_eq!(rule("file:///tmp/keg"), "explicit-scheme");
        assert_eq!(rule("memory://scratch"), "explicit-scheme");
        assert_eq!(rule("/home/x/keg"), "filesystem-path");
        assert_eq!(rule("C:/kegs/notes"), "filesystem-path");
        assert_eq!(rule("example.com/owner/repo"), "host-like");
        assert_eq!(rule("localhost:8080/keg"), "host-like");
        assert_eq!(rule("reg:8080x/keg"), "registry-shorthand");
        assert_eq!(rule("notes"), "fallback-file");
    }

    #[test]
    fn test_parse_empty_is_invalid() {
        let err = parse_locator("   ").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Invalid);
    }

    #[test]
    fn test_explicit_file_without_path_is_invalid() {
        assert!(parse_locator("file://").is_err());
        assert!(parse_locator("memory://").is_err());
    }
}
