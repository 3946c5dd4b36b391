//! Dynbind Configuration
//!
//! Handles parsing and management of dynbind.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::binding::BindPolicy;
use crate::module::ModuleLocator;

/// File name searched for by [`DynbindConfig::find_and_load`]
pub const CONFIG_FILE: &str = "dynbind.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching dynbind.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DynbindConfig {
    /// Module search configuration
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Interface binding behaviour
    #[serde(default)]
    pub binding: BindingConfig,

    /// Symbol enumeration
    #[serde(default)]
    pub symbols: SymbolsConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl DynbindConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: DynbindConfig = toml::from_str(&content)?;

        // Relative search paths are relative to the config file.
        if let Some(base) = path.parent() {
            config.loader.anchor(base);
        }
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Module locator searching the configured paths before the platform
    /// defaults
    pub fn locator(&self) -> ModuleLocator {
        let mut locator = ModuleLocator::with_paths(self.loader.search_paths.clone());
        if self.loader.default_paths {
            for path in ModuleLocator::new().search_paths() {
                locator.add_search_path(path);
            }
        }
        locator
    }
}

/// Module search configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Extra directories searched for modules, in priority order
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Also search the platform's default library directories
    #[serde(default = "default_true")]
    pub default_paths: bool,
}

impl LoaderConfig {
    fn anchor(&mut self, base: &Path) {
        for path in &mut self.search_paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            default_paths: true,
        }
    }
}

/// Interface binding configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BindingConfig {
    /// What to do with absent symbols
    #[serde(default)]
    pub policy: BindPolicy,
}

/// Symbol enumeration configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolsConfig {
    /// Glob applied to symbol names
    #[serde(default = "default_mask")]
    pub mask: String,
}

fn default_mask() -> String {
    "*".to_string()
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            mask: default_mask(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `dynbind=debug`
    #[serde(default)]
    pub filter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DynbindConfig::default();
        assert!(config.loader.search_paths.is_empty());
        assert!(config.loader.default_paths);
        assert_eq!(config.binding.policy, BindPolicy::Lenient);
        assert_eq!(config.symbols.mask, "*");
        assert!(config.log.filter.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[loader]
search_paths = ["/opt/native/lib"]
default_paths = false

[binding]
policy = "strict"

[symbols]
mask = "fixture_*"

[log]
filter = "dynbind=trace"
"#;
        let config: DynbindConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.loader.search_paths, vec![PathBuf::from("/opt/native/lib")]);
        assert!(!config.loader.default_paths);
        assert_eq!(config.binding.policy, BindPolicy::Strict);
        assert_eq!(config.symbols.mask, "fixture_*");
        assert_eq!(config.log.filter.as_deref(), Some("dynbind=trace"));
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result: Result<DynbindConfig, _> = toml::from_str("[binding]\npolicy = \"loose\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_find_and_load_walks_up() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE),
            "[loader]\nsearch_paths = [\"lib\"]\ndefault_paths = false\n",
        )
        .unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = DynbindConfig::find_and_load(&nested).unwrap();
        assert_eq!(config.loader.search_paths, vec![root.path().join("lib")]);
        assert_eq!(config.locator().search_paths(), &[root.path().join("lib")]);
    }

    #[test]
    fn test_find_and_load_defaults_without_file() {
        let root = tempfile::tempdir().unwrap();
        let config = DynbindConfig::find_and_load(root.path()).unwrap();
        assert_eq!(config.symbols.mask, "*");
    }

    #[test]
    fn test_load_missing_file() {
        let root = tempfile::tempdir().unwrap();
        let err = DynbindConfig::load(&root.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join(CONFIG_FILE);

        let mut config = DynbindConfig::default();
        config.binding.policy = BindPolicy::Strict;
        config.loader.search_paths.push(root.path().join("native"));
        config.save(&path).unwrap();

        let reloaded = DynbindConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
