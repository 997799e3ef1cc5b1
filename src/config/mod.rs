//! Layered configuration.
//!
//! Four tiers are read weakest to strongest and merged into one [`Config`]:
//! 1. **Defaults** - embedded at build time from `./config/defaults.yaml`
//! 2. **State** - `$KEGTAP_STATE_DIR` or the platform state dir (`kegtap/`)
//! 3. **User** - `$KEGTAP_CONFIG_DIR` or the platform config dir (`kegtap/`)
//! 4. **Local** - `<project>/.kegtap/`
//!
//! Each on-disk tier is a `config.yaml` (or `config.yml`). A missing file is
//! an empty layer. See [`merge`](merge_config) for the per-field rules.
//!
//! ## Environment Variables
//! - `KEGTAP_STATE_DIR` - State tier directory
//! - `KEGTAP_CONFIG_DIR` - User tier directory
//! - `KEGTAP_CONFIG` - Explicit user tier file

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLayer, ConfigLoader, ConfigPaths, ConfigTier, DEFAULTS_YAML, write_layer};
pub use merge::{MergedConfig, deep_merge, merge_config, merge_into};
pub use types::{Config, KegMapRule};
