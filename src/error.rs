//! Structured error types for locator parsing, config layers and resolution.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Layer file absent (non-fatal during merge)
    NotFound,

    // Malformed locator, document or decode failure
    Invalid,

    // Resolution errors
    AliasNotFound,
    NoMatch,

    // Partial variable/tilde expansion failure
    ExpansionFailure,

    // Filesystem errors
    IoError,
}

/// A single field that could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionError {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every field that failed during one expansion pass, joined for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionErrors(pub Vec<ExpansionError>);

impl ExpansionErrors {
    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(ExpansionError {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Turn the collected failures into a result, `Ok` when nothing failed.
    pub fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(KegError::Expansion(self))
        }
    }
}

impl fmt::Display for ExpansionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors produced by the locator, document, config and resolver layers.
#[derive(Debug, Error)]
pub enum KegError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid {context}: {reason}")]
    Invalid { context: String, reason: String },

    #[error("alias not found: {alias}")]
    AliasNotFound { alias: String },

    #[error("no keg mapping matched {path} and no default keg is configured")]
    NoMatch { path: String },

    #[error("expansion failed: {0}")]
    Expansion(ExpansionErrors),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl KegError {
    /// Programmatic category of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            KegError::NotFound { .. } => ErrorCode::NotFound,
            KegError::Invalid { .. } => ErrorCode::Invalid,
            KegError::AliasNotFound { .. } => ErrorCode::AliasNotFound,
            KegError::NoMatch { .. } => ErrorCode::NoMatch,
            KegError::Expansion(_) => ErrorCode::ExpansionFailure,
            KegError::Io { .. } => ErrorCode::IoError,
        }
    }

    // Convenience constructors

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        KegError::NotFound { path: path.into() }
    }

    pub fn invalid(context: impl Into<String>, reason: impl fmt::Display) -> Self {
        KegError::Invalid {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub fn alias_not_found(alias: &str) -> Self {
        KegError::AliasNotFound {
            alias: alias.to_string(),
        }
    }

    pub fn no_match(path: &str) -> Self {
        KegError::NoMatch {
            path: path.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        KegError::Io {
            context: context.into(),
            source,
        }
    }

    /// Prefix the context of an `Invalid` error with the identity of a layer or field.
    pub fn within(self, outer: &str) -> Self {
        match self {
            KegError::Invalid { context, reason } => KegError::Invalid {
                context: format!("{}: {}", outer, context),
                reason,
            },
            KegError::Io { context, source } => KegError::Io {
                context: format!("{}: {}", outer, context),
                source,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }
}

/// Result type for keg operations.
pub type Result<T> = std::result::Result<T, KegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_variants() {
        assert_eq!(KegError::not_found("/x").code(), ErrorCode::NotFound);
        assert_eq!(KegError::invalid("locator", "empty").code(), ErrorCode::Invalid);
        assert_eq!(KegError::alias_not_found("k").code(), ErrorCode::AliasNotFound);
        assert_eq!(KegError::no_match("/p").code(), ErrorCode::NoMatch);
    }

    #[test]
    fn test_expansion_errors_are_joined() {
        let mut errs = ExpansionErrors::default();
        errs.push("file", "HOME is not set");
        errs.push("token", "TOKEN is not set");
        let err = errs.into_result().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExpansionFailure);
        assert_eq!(
            err.to_string(),
            "expansion failed: file: HOME is not set; token: TOKEN is not set"
        );
    }

    #[test]
    fn test_within_prefixes_context() {
        let err = KegError::invalid("kegs.foo", "bad url").within("user layer");
        assert_eq!(err.to_string(), "invalid user layer: kegs.foo: bad url");
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::AliasNotFound).unwrap();
        assert_eq!(json, "\"ALIAS_NOT_FOUND\"");
    }
}
