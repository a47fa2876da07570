//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/servicetree/config.toml` (XDG) or platform config dir
//! 2. Project config: `.servicetree.toml`
//! 3. Environment variables: `SERVICETREE_*`
//!
//! # Intended Usage
//!
//! ```toml
//! [raise]
//! safe = true
//!
//! [[nodes]]
//! name = "app"
//! services = { logger = "stderr" }
//!
//! [[nodes]]
//! name = "worker"
//! parent = "app"
//! services = { cache = "memory" }
//! ```
//!
//! Every node is declared once. `parent` names another node; a node without a
//! parent is a root. A node with `sentinel = true` caps the chain below it.
//! Service values are plain strings.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub raise: RaiseConfig,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// Defaults for promotion.
#[derive(Debug, Clone, Deserialize)]
pub struct RaiseConfig {
    /// Stop raising before overriding a service an ancestor already provides.
    #[serde(default = "default_safe")]
    pub safe: bool,
}

impl Default for RaiseConfig {
    fn default() -> Self {
        Self {
            safe: default_safe(),
        }
    }
}

fn default_safe() -> bool {
    true
}

/// A node declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Unique node name.
    pub name: String,
    /// Name of the parent node, if any.
    #[serde(default)]
    pub parent: Option<String>,
    /// Declares a non-resolving placeholder.
    #[serde(default)]
    pub sentinel: bool,
    /// Services registered on this node.
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

impl Config {
    /// Load config with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment(Self::user_config_path(), PathBuf::from(".servicetree.toml"))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Load config with `path` in place of the project config.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::figment(Self::user_config_path(), path.to_path_buf())
            .extract()
            .map_err(ConfigError::from)
    }

    /// Parse a single TOML document, without user config or env.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Figment::from(Toml::string(toml))
            .extract()
            .map_err(ConfigError::from)
    }

    fn figment(user_config: PathBuf, project_config: PathBuf) -> Figment {
        Figment::new()
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(user_config))
            // Layer 2: Project config
            .merge(Toml::file(project_config))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed("SERVICETREE_").split("_"))
    }

    /// Find a node declaration by name.
    pub fn node(&self, name: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// User config path: ~/.config/servicetree/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("servicetree").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("servicetree").join("config.toml"))
            .unwrap_or_default()
    }
}
