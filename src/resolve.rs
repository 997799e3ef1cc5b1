//! Alias and project-path resolution.
//!
//! Rule precedence for a project path:
//! 1. the first rule (in declaration order) whose `pathRegex` matches
//! 2. the rule with the longest `pathPrefix` that is a string prefix of the
//!    path; equal lengths go to the earlier rule
//! 3. `defaultKeg`
//!
//! Prefix matching is plain string matching, so `/projects` also claims
//! `/projectsxyz`.

use crate::config::{Config, KegMapRule};
use crate::env::Env;
use crate::error::{KegError, Result};
use crate::locator::Target;
use crate::paths::normalize_project_path;
use regex_lite::Regex;
use serde::Serialize;
use tracing::{debug, warn};

/// How an alias was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Regex,
    Prefix,
    Default,
}

/// A resolved project target and how it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub alias: String,
    pub target: Target,
    pub matched: MatchKind,
    /// The normalized project path that was matched.
    pub path: String,
}

/// Look up `alias` in the alias table.
pub fn resolve_alias(config: &Config, alias: &str) -> Result<Target> {
    config
        .kegs
        .get(alias)
        .cloned()
        .ok_or_else(|| KegError::alias_not_found(alias))
}

/// The target for `project_path`.
pub fn resolve_project_target(
    config: &Config,
    project_path: &str,
    env: &dyn Env,
) -> Result<Target> {
    resolve_project(config, project_path, env).map(|r| r.target)
}

/// The alias and target for `project_path`, with the rule kind that chose it.
pub fn resolve_project(config: &Config, project_path: &str, env: &dyn Env) -> Result<Resolution> {
    let path = normalize_project_path(project_path, env)?;

    let (alias, matched) = match match_rules(&config.keg_map, &path, env)? {
        Some(found) => found,
        None => match config.default_alias() {
            Some(alias) => (alias.to_string(), MatchKind::Default),
            None => return Err(KegError::no_match(&path)),
        },
    };
    debug!(%path, %alias, ?matched, "resolved project keg");

    let target = resolve_alias(config, &alias)?;
    Ok(Resolution {
        alias,
        target,
        matched,
        path,
    })
}

/// The alias chosen by the rules alone, if any rule matches `path`.
fn match_rules(
    rules: &[KegMapRule],
    path: &str,
    env: &dyn Env,
) -> Result<Option<(String, MatchKind)>> {
    for rule in rules {
        let Some(pattern) = rule.regex_pattern() else {
            continue;
        };
        let re = Regex::new(pattern).map_err(|e| {
            KegError::invalid(format!("kegMap rule for {:?}", rule.alias), e)
        })?;
        if re.is_match(path) {
            return Ok(Some((rule.alias.clone(), MatchKind::Regex)));
        }
    }

    let mut best: Option<(usize, &KegMapRule)> = None;
    for rule in rules {
        let Some(prefix) = rule.prefix_str() else {
            continue;
        };
        let prefix = match normalize_project_path(prefix, env) {
            Ok(prefix) => prefix,
            Err(e) => {
                warn!(alias = %rule.alias, error = %e, "skipping kegMap rule with unusable prefix");
                continue;
            }
        };
        if path.starts_with(&prefix) && best.is_none_or(|(len, _)| prefix.len() > len) {
            best = Some((prefix.len(), rule));
        }
    }

    Ok(best.map(|(_, rule)| (rule.alias.clone(), MatchKind::Prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    fn env() -> MapEnv {
        MapEnv::new().with_home("/home/alice").with_cwd("/projects/sub")
    }

    fn config(rules: Vec<KegMapRule>, default: Option<&str>) -> Config {
        let mut config = Config {
            keg_map: rules,
            default_keg: default.map(str::to_string),
            ..Default::default()
        };
        for alias in ["p", "q", "r", "home", "fallback"] {
            config
                .kegs
                .insert(alias.to_string(), Target::file(format!("/kegs/{}", alias)));
        }
        config
    }

    fn alias(config: &Config, path: &str) -> String {
        resolve_project(config, path, &env()).unwrap().alias
    }

    #[test]
    fn test_longest_prefix_wins() {
        let config = config(
            vec![
                KegMapRule::prefix("p", "/projects"),
                KegMapRule::prefix("q", "/projects/sub"),
            ],
            None,
        );
        assert_eq!(alias(&config, "/projects/sub/x"), "q");
        assert_eq!(alias(&config, "/projects/other"), "p");
        assert_eq!(
            resolve_project_target(&config, "/projects/sub/x", &env()).unwrap(),
            Target::file("/kegs/q")
        );
    }

    #[test]
    fn test_equal_prefixes_go_to_earliest() {
        let config = config(
            vec![
                KegMapRule::prefix("p", "/projects"),
                KegMapRule::prefix("q", "/projects/"),
            ],
            None,
        );
        assert_eq!(alias(&config, "/projects/x"), "p");
    }

    #[test]
    fn test_regex_beats_prefix_regardless_of_order() {
        let config = config(
            vec![
                KegMapRule::prefix("p", "/projects/sub"),
                KegMapRule::regex("r", "^/projects/.*/x$"),
            ],
            None,
        );
        let resolution = resolve_project(&config, "/projects/sub/x", &env()).unwrap();
        assert_eq!(resolution.alias, "r");
        assert_eq!(resolution.matched, MatchKind::Regex);
    }

    #[test]
    fn test_first_matching_regex_wins() {
        let config = config(
            vec![KegMapRule::regex("p", "sub"), KegMapRule::regex("q", "projects")],
            None,
        );
        assert_eq!(alias(&config, "/projects/sub"), "p");
    }

    #[test]
    fn test_prefix_is_normalized_and_path_is_relative() {
        let home = config(vec![KegMapRule::prefix("home", "~/code/")], None);
        assert_eq!(alias(&home, "~/code/app"), "home");

        // "." is the working directory, /projects/sub
        let cwd = config(vec![KegMapRule::prefix("q", "/projects/sub")], None);
        assert_eq!(alias(&cwd, "."), "q");
    }

    #[test]
    fn test_raw_string_prefix_admits_sibling_directories() {
        let config = config(vec![KegMapRule::prefix("p", "/projects")], None);
        assert_eq!(alias(&config, "/projectsxyz"), "p");
    }

    #[test]
    fn test_default_fallback() {
        let config = config(vec![KegMapRule::prefix("p", "/projects")], Some("fallback"));
        let resolution = resolve_project(&config, "/elsewhere", &env()).unwrap();
        assert_eq!(resolution.alias, "fallback");
        assert_eq!(resolution.matched, MatchKind::Default);
    }

    #[test]
    fn test_no_match_without_default() {
        let config = config(vec![KegMapRule::prefix("p", "/projects")], None);
        let err = resolve_project(&config, "/elsewhere", &env()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NoMatch);
    }

    #[test]
    fn test_missing_alias_is_error() {
        let config = config(vec![KegMapRule::prefix("ghost", "/projects")], None);
        let err = resolve_project(&config, "/projects/a", &env()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::AliasNotFound);
        assert!(resolve_alias(&config, "ghost").is_err());
        assert!(resolve_alias(&config, "p").is_ok());
    }

    #[test]
    fn test_rule_without_prefix_or_regex_never_matches() {
        let empty = KegMapRule {
            alias: "p".into(),
            ..Default::default()
        };
        let config = config(vec![empty], Some("q"));
        assert_eq!(alias(&config, "/anything"), "q");
    }

    #[test]
    fn test_invalid_regex_is_invalid() {
        let config = config(vec![KegMapRule::regex("p", "(unclosed")], Some("q"));
        let err = resolve_project(&config, "/a", &env()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Invalid);
        assert!(err.to_string().contains("\"p\""), "{}", err);
    }
}
