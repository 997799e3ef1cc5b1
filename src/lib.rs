//! kegtap library
//!
//! Locates keg stores and manages layered, comment-preserving configuration.
//! The binary in `main.rs` is a thin front end over these modules.

pub mod atomic;
pub mod cli;
pub mod config;
pub mod document;
pub mod env;
pub mod error;
pub mod locator;
pub mod paths;
pub mod resolve;

pub use config::{Config, ConfigLoader, ConfigTier, KegMapRule};
pub use env::{Env, MapEnv, OsEnv};
pub use error::{ErrorCode, KegError, Result};
pub use locator::{Scheme, Target};
pub use resolve::{MatchKind, Resolution, resolve_alias, resolve_project, resolve_project_target};
