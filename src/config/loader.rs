//! Configuration loader with tier-based merging.
//!
//! Reads every tier fresh from disk, merges them weakest to strongest and
//! writes single layers back through the comment-preserving document model.

use super::merge::{MergedConfig, merge_config};
use super::types::Config;
use crate::atomic::write_atomic;
use crate::document::Document;
use crate::env::Env;
use crate::error::{KegError, Result};
use crate::resolve::{Resolution, resolve_project};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Built-in defaults, the weakest layer.
pub const DEFAULTS_YAML: &str = include_str!("../../config/defaults.yaml");

/// Directory name used under the platform state/config dirs and in projects.
const APP_DIR: &str = "kegtap";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority, never written)
    Defaults = 0,
    /// Tool-managed state (`$KEGTAP_STATE_DIR` or the platform state dir)
    State = 1,
    /// User config (`$KEGTAP_CONFIG_DIR` or the platform config dir)
    User = 2,
    /// Per-project override (`<project>/.kegtap/`, highest priority)
    Local = 3,
}

impl ConfigTier {
    /// All tiers, weakest first.
    pub const ALL: [ConfigTier; 4] = [
        ConfigTier::Defaults,
        ConfigTier::State,
        ConfigTier::User,
        ConfigTier::Local,
    ];
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::State => write!(f, "state"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Local => write!(f, "local"),
        }
    }
}

impl FromStr for ConfigTier {
    type Err = KegError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "defaults" => Ok(ConfigTier::Defaults),
            "state" => Ok(ConfigTier::State),
            "user" => Ok(ConfigTier::User),
            "local" => Ok(ConfigTier::Local),
            other => Err(KegError::invalid(
                "tier",
                format!("{:?} (expected defaults, state, user or local)", other),
            )),
        }
    }
}

/// On-disk config file for each writable tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    pub state_file: Option<PathBuf>,
    pub user_file: Option<PathBuf>,
    pub local_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover configuration paths from the environment and platform dirs.
    ///
    /// `project_dir` defaults to the environment's working directory.
    pub fn discover(env: &dyn Env, project_dir: Option<&Path>) -> Self {
        // State dir: KEGTAP_STATE_DIR, else the platform state dir, else local data
        let state_dir = env
            .get("KEGTAP_STATE_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::state_dir().map(|d| d.join(APP_DIR)))
            .or_else(|| dirs::data_local_dir().map(|d| d.join(APP_DIR)));

        // User dir: KEGTAP_CONFIG_DIR, else the platform config dir
        let user_dir = env
            .get("KEGTAP_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR)));

        let local_dir = project_dir
            .map(Path::to_path_buf)
            .or_else(|| env.current_dir().ok())
            .map(|p| p.join(format!(".{}", APP_DIR)));

        let mut paths = Self::with_dirs(state_dir, user_dir, local_dir);

        // An explicit file replaces the user layer's location.
        if let Some(explicit) = env.get("KEGTAP_CONFIG").filter(|s| !s.is_empty()) {
            paths.user_file = Some(PathBuf::from(explicit));
        }
        paths
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(
        state_dir: Option<PathBuf>,
        user_dir: Option<PathBuf>,
        local_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            state_file: state_dir.as_deref().map(layer_file),
            user_file: user_dir.as_deref().map(layer_file),
            local_file: local_dir.as_deref().map(layer_file),
        }
    }

    /// Config file for `tier`; `None` for the embedded defaults.
    pub fn file(&self, tier: ConfigTier) -> Option<&Path> {
        match tier {
            ConfigTier::Defaults => None,
            ConfigTier::State => self.state_file.as_deref(),
            ConfigTier::User => self.user_file.as_deref(),
            ConfigTier::Local => self.local_file.as_deref(),
        }
    }
}

/// `config.yaml` in `dir`, or `config.yml` when only that one exists.
fn layer_file(dir: &Path) -> PathBuf {
    let yaml = dir.join("config.yaml");
    let yml = dir.join("config.yml");
    if !yaml.exists() && yml.exists() { yml } else { yaml }
}

/// One configuration document bound to a tier and a location.
#[derive(Debug)]
pub struct ConfigLayer {
    pub tier: ConfigTier,
    pub path: Option<PathBuf>,
    pub document: Document,
}

impl ConfigLayer {
    /// Read a layer file. A missing file is `NotFound`, distinct from parse errors.
    pub fn read(tier: ConfigTier, path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KegError::not_found(path));
            }
            Err(e) => return Err(KegError::io(format!("reading {}", path.display()), e)),
        };
        let document = Document::parse(&bytes)
            .map_err(|e| e.within(&format!("{} layer {}", tier, path.display())))?;
        debug!(%tier, path = %path.display(), "read config layer");

        Ok(Self {
            tier,
            path: Some(path.to_path_buf()),
            document,
        })
    }

    /// Read a layer, treating a missing file as an empty layer.
    pub fn read_or_empty(tier: ConfigTier, path: &Path) -> Result<Self> {
        match Self::read(tier, path) {
            Err(e) if e.is_not_found() => {
                debug!(%tier, path = %path.display(), "config layer missing, using empty layer");
                Ok(Self::empty(tier, Some(path.to_path_buf())))
            }
            other => other,
        }
    }

    pub fn empty(tier: ConfigTier, path: Option<PathBuf>) -> Self {
        Self {
            tier,
            path,
            document: Document::empty(),
        }
    }

    /// The embedded defaults layer.
    pub fn defaults() -> Result<Self> {
        let document = Document::parse_str(DEFAULTS_YAML).map_err(|e| e.within("defaults layer"))?;
        Ok(Self {
            tier: ConfigTier::Defaults,
            path: None,
            document,
        })
    }

    /// Typed view of this layer.
    pub fn config(&self) -> Result<Config> {
        self.document.decode().map_err(|e| e.within(&self.label()))
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Apply `update` to the typed view and write the result atomically.
    ///
    /// Nothing is written if decoding fails; if the write fails the file on
    /// disk is unchanged.
    pub fn write<R>(&mut self, update: impl FnOnce(&mut Config) -> R) -> Result<R> {
        let Some(path) = self.path.clone() else {
            return Err(KegError::invalid(self.label(), "layer has no file to write"));
        };
        let label = self.label();
        let out = self.document.update(update).map_err(|e| e.within(&label))?;
        write_atomic(&path, &self.document.to_bytes())?;
        info!(tier = %self.tier, path = %path.display(), "wrote config layer");
        Ok(out)
    }

    fn label(&self) -> String {
        match &self.path {
            Some(path) => format!("{} layer {}", self.tier, path.display()),
            None => format!("{} layer", self.tier),
        }
    }
}

/// Read (or start) the layer at `path`, apply `update` and write it back.
pub fn write_layer<R>(
    tier: ConfigTier,
    path: &Path,
    update: impl FnOnce(&mut Config) -> R,
) -> Result<R> {
    if tier == ConfigTier::Defaults {
        return Err(KegError::invalid("defaults layer", "the built-in defaults are read-only"));
    }
    let mut layer = ConfigLayer::read_or_empty(tier, path)?;
    layer.write(update)
}

/// Loads every tier, merges them and writes single tiers back.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    layers: Vec<ConfigLayer>,
    merged: MergedConfig,
}

impl ConfigLoader {
    /// Discover paths from `env` and load.
    pub fn load(env: &dyn Env, project_dir: Option<&Path>) -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover(env, project_dir))
    }

    /// Load configuration with explicit paths.
    ///
    /// Layers that are missing or unreadable count as empty.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let mut layers = vec![ConfigLayer::defaults()?];

        for tier in [ConfigTier::State, ConfigTier::User, ConfigTier::Local] {
            let Some(path) = paths.file(tier) else {
                layers.push(ConfigLayer::empty(tier, None));
                continue;
            };
            let layer = ConfigLayer::read_or_empty(tier, path).unwrap_or_else(|e| {
                warn!(%tier, error = %e, "ignoring unreadable config layer");
                ConfigLayer::empty(tier, Some(path.to_path_buf()))
            });
            layers.push(layer);
        }

        let merged = merge_config(&layers);
        Ok(Self {
            paths,
            layers,
            merged,
        })
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.merged.config
    }

    pub fn merged(&self) -> &MergedConfig {
        &self.merged
    }

    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    pub fn layer(&self, tier: ConfigTier) -> Option<&ConfigLayer> {
        self.layers.iter().find(|l| l.tier == tier)
    }

    /// File backing `tier`, if it has one.
    pub fn layer_path(&self, tier: ConfigTier) -> Option<&Path> {
        self.paths.file(tier)
    }

    /// Re-read `tier` from disk, apply `update`, write it and refresh the merge.
    ///
    /// The layer is read again rather than reused so edits made since
    /// loading (and their comments) are not lost. A layer that exists but
    /// cannot be parsed is an error here, never overwritten.
    pub fn update_layer<R>(
        &mut self,
        tier: ConfigTier,
        update: impl FnOnce(&mut Config) -> R,
    ) -> Result<R> {
        if tier == ConfigTier::Defaults {
            return Err(KegError::invalid("defaults layer", "the built-in defaults are read-only"));
        }
        let path = self
            .paths
            .file(tier)
            .ok_or_else(|| {
                KegError::invalid(format!("{} layer", tier), "no location is configured")
            })?
            .to_path_buf();

        let mut layer = ConfigLayer::read_or_empty(tier, &path)?;
        let out = layer.write(update)?;

        match self.layers.iter_mut().find(|l| l.tier == tier) {
            Some(slot) => *slot = layer,
            None => self.layers.push(layer),
        }
        self.merged = merge_config(&self.layers);
        Ok(out)
    }

    /// Resolve the keg for `project_path` and expand its fields.
    ///
    /// Expansion is best effort: failures are logged and the affected
    /// fields keep their unexpanded values.
    pub fn resolve(&self, env: &dyn Env, project_path: &str) -> Result<Resolution> {
        let mut resolution = resolve_project(self.config(), project_path, env)?;
        if let Err(e) = resolution.target.expand(env) {
            warn!(alias = %resolution.alias, error = %e, "target expansion incomplete");
        }
        Ok(resolution)
    }
}
