//! Environment capability and variable/tilde expansion.
//!
//! Nothing in the core reads process-global state directly. Callers pass an
//! [`Env`] explicitly: [`OsEnv`] for the real process, [`MapEnv`] for tests.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

/// Access to environment variables, the home and working directories and the user.
pub trait Env {
    /// Get a variable, `None` if unset.
    fn get(&self, key: &str) -> Option<String>;

    /// Set a variable.
    fn set(&mut self, key: &str, value: &str);

    /// The current user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// The working directory used to absolutize relative paths.
    fn current_dir(&self) -> io::Result<PathBuf>;

    /// The current user's login name.
    fn user(&self) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEnv;

impl Env for OsEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set(&mut self, key: &str, value: &str) {
        // SAFETY: the CLI only sets variables during single-threaded startup.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }

    fn user(&self) -> Option<String> {
        Some(whoami::username())
    }
}

/// In-memory environment for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
    home: Option<PathBuf>,
    cwd: Option<PathBuf>,
    user: Option<String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }
}

impl Env for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        self.cwd
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "working directory not set"))
    }

    fn user(&self) -> Option<String> {
        self.user.clone()
    }
}

/// Substitute `$NAME` and `${NAME}` references.
///
/// An unset variable is an error naming it. A `$` that does not start a
/// reference is kept as is.
pub fn expand_env(value: &str, env: &dyn Env) -> Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            let end = braced
                .find('}')
                .ok_or_else(|| format!("unterminated variable reference in {:?}", value))?;
            let name = &braced[..end];
            if name.is_empty() {
                return Err(format!("empty variable reference in {:?}", value));
            }
            out.push_str(&lookup(name, env)?);
            rest = &braced[end + 1..];
            continue;
        }

        let name_len = after
            .char_indices()
            .take_while(|(i, c)| {
                c.is_ascii_alphabetic() || *c == '_' || (*i > 0 && c.is_ascii_digit())
            })
            .count();
        if name_len == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        out.push_str(&lookup(&after[..name_len], env)?);
        rest = &after[name_len..];
    }

    out.push_str(rest);
    Ok(out)
}

fn lookup(name: &str, env: &dyn Env) -> Result<String, String> {
    env.get(name)
        .ok_or_else(|| format!("environment variable {} is not set", name))
}

/// Replace a leading `~` or `~/` with the home directory.
pub fn expand_tilde(value: &str, env: &dyn Env) -> Result<String, String> {
    let Some(rest) = value.strip_prefix('~') else {
        return Ok(value.to_string());
    };

    if !rest.is_empty() && !rest.starts_with('/') && !rest.starts_with('\\') {
        return Err(format!("cannot expand {:?}: ~user forms are not supported", value));
    }

    let home = env
        .home_dir()
        .ok_or_else(|| "home directory is unknown".to_string())?;
    let home = home.to_string_lossy();
    let home = home.trim_end_matches(['/', '\\']);

    Ok(format!("{}{}", home, rest))
}

/// Tilde expansion followed by variable expansion.
pub fn expand(value: &str, env: &dyn Env) -> Result<String, String> {
    let value = expand_tilde(value, env)?;
    expand_env(&value, env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> MapEnv {
        MapEnv::new()
            .with_var("KEG", "notes")
            .with_var("ROOT", "/srv")
            .with_home("/home/alice")
            .with_cwd("/work")
            .with_user("alice")
    }

    #[test]
    fn test_expand_env_plain_and_braced() {
        let env = env();
        assert_eq!(expand_env("$ROOT/${KEG}", &env).unwrap(), "/srv/notes");
        assert_eq!(expand_env("${ROOT}x", &env).unwrap(), "/srvx");
    }

    #[test]
    fn test_expand_env_missing_variable() {
        let err = expand_env("$NOPE/x", &env()).unwrap_err();
        assert!(err.contains("NOPE"));
    }

    #[test]
    fn test_expand_env_lone_dollar_kept() {
        assert_eq!(expand_env("cost $5 and $", &env()).unwrap(), "cost $5 and $");
    }

    #[test]
    fn test_expand_env_unterminated() {
        assert!(expand_env("${ROOT", &env()).is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let env = env();
        assert_eq!(expand_tilde("~", &env).unwrap(), "/home/alice");
        assert_eq!(expand_tilde("~/kegs", &env).unwrap(), "/home/alice/kegs");
        assert_eq!(expand_tilde("/abs", &env).unwrap(), "/abs");
        assert!(expand_tilde("~bob/kegs", &env).is_err());
    }

    #[test]
    fn test_expand_tilde_without_home() {
        assert!(expand_tilde("~/x", &MapEnv::new()).is_err());
    }

    #[test]
    fn test_expand_is_idempotent() {
        let env = env();
        let once = expand("~/$KEG", &env).unwrap();
        assert_eq!(expand(&once, &env).unwrap(), once);
    }

    #[test]
    fn test_map_env_set_and_current_dir() {
        let mut env = MapEnv::new();
        assert!(env.current_dir().is_err());
        env.set("A", "1");
        assert_eq!(env.get("A").as_deref(), Some("1"));
    }
}
