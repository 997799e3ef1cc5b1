//! Project path normalization.
//!
//! Paths are compared as plain strings by the resolver, so both the project
//! path and every rule prefix go through [`normalize_project_path`]: `~` and
//! `$VAR` are expanded, relative paths are made absolute against the
//! environment's working directory, `.`/`..` are folded and separators are
//! forward slashes. No filesystem I/O happens here.

use crate::env::{self, Env};
use crate::error::{KegError, Result};
use std::path::{Component, Path, PathBuf};

/// Expand, absolutize and clean `raw`.
pub fn normalize_project_path(raw: &str, env: &dyn Env) -> Result<String> {
    let expanded = env::expand(raw, env).map_err(|e| KegError::invalid("project path", e))?;

    let path = Path::new(&expanded);
    let absolute = if is_absolute(&expanded) {
        path.to_path_buf()
    } else {
        let cwd = env
            .current_dir()
            .map_err(|e| KegError::io("reading the working directory", e))?;
        cwd.join(path)
    };

    let mut normalized = path_to_forward_slashes(&normalize_path_components(&absolute));
    while normalized.len() > 1 && normalized.ends_with('/') && !is_drive_root(&normalized) {
        normalized.pop();
    }
    Ok(normalized)
}

/// Absolute on this platform, or written with a drive letter.
fn is_absolute(path: &str) -> bool {
    if Path::new(path).is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

fn is_drive_root(path: &str) -> bool {
    path.len() == 3 && path.as_bytes()[1] == b':'
}

/// Fold `.` and `..` without touching the filesystem.
fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => components.push(component),
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            Component::Normal(_) => components.push(component),
        }
    }

    components.iter().collect()
}

fn path_to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    fn env() -> MapEnv {
        MapEnv::new()
            .with_home("/home/alice")
            .with_cwd("/work/repo")
            .with_var("PROJECTS", "/srv/projects")
    }

    #[test]
    fn test_absolute_path_is_cleaned() {
        let env = env();
        assert_eq!(normalize_project_path("/a/./b/../c/", &env).unwrap(), "/a/c");
        assert_eq!(normalize_project_path("//a//b", &env).unwrap(), "/a/b");
        assert_eq!(normalize_project_path("/", &env).unwrap(), "/");
        assert_eq!(normalize_project_path("/..", &env).unwrap(), "/");
    }

    #[test]
    fn test_relative_path_uses_env_cwd() {
        let env = env();
        assert_eq!(normalize_project_path("sub/dir", &env).unwrap(), "/work/repo/sub/dir");
        assert_eq!(normalize_project_path(".", &env).unwrap(), "/work/repo");
        assert_eq!(normalize_project_path("../other", &env).unwrap(), "/work/other");
    }

    #[test]
    fn test_tilde_and_variables_expand() {
        let env = env();
        assert_eq!(normalize_project_path("~/notes", &env).unwrap(), "/home/alice/notes");
        assert_eq!(normalize_project_path("$PROJECTS/x", &env).unwrap(), "/srv/projects/x");
        assert_eq!(normalize_project_path("${PROJECTS}/y/", &env).unwrap(), "/srv/projects/y");
    }

    #[test]
    fn test_expansion_failure_is_invalid() {
        let err = normalize_project_path("$NOPE/x", &env()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Invalid);
    }

    #[test]
    fn test_missing_cwd_is_io_error() {
        let env = MapEnv::new();
        let err = normalize_project_path("relative", &env).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::IoError);
    }
}
