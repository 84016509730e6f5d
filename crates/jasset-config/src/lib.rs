//! # jasset-config
//!
//! Configuration management for the jasset asset database.
//!
//! Loads configuration from:
//! 1. `~/.jasset/config.toml` (global)
//! 2. `.jasset/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod path;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Default project-relative directory for `.resdb` caches
pub const DEFAULT_CACHE_DIR: &str = ".jasset/cache";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(|e| e.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(|e| e.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub scan: ScanConfig,
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut layers = Vec::new();

        // 1. Global config (~/.jasset/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                layers.push(global_path);
            }
        }

        // 2. Project config (.jasset/config.toml) - overrides global per key
        let project_path = PathBuf::from(".jasset/config.toml");
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            layers.push(project_path);
        }

        let mut config = Self::load_layered(&layers)?;

        // 3. Apply environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse a single config file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_layered(&[path])
    }

    /// Parse config files in order, later files overriding earlier ones key
    /// by key. Keys no file sets keep their defaults.
    pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for path in paths {
            let contents = std::fs::read_to_string(path)?;
            let layer: toml::Table = toml::from_str(&contents)?;
            merge_tables(&mut merged, layer);
        }
        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// Global config path: ~/.jasset/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".jasset/config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("JASSET_PROJECT_ROOT") {
            self.project.root = PathBuf::from(path);
        }
        if let Ok(editor) = std::env::var("JASSET_EDITOR") {
            self.project.editor = matches!(editor.as_str(), "1" | "true" | "yes");
        }
        if let Ok(depth) = std::env::var("JASSET_SCAN_DEPTH") {
            if let Ok(n) = depth.parse() {
                self.scan.max_depth = n;
            }
        }
    }

    /// Absolute (or project-relative) directory of a source root
    pub fn source_root(&self, source: &SourceConfig) -> PathBuf {
        path::resolve_under(&self.project.root, &source.root)
    }

    /// Directory holding `.resdb` caches
    pub fn cache_dir(&self) -> PathBuf {
        path::resolve_under(&self.project.root, &self.cache.dir)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Overlay `layer` onto `base`: nested tables merge, anything else replaces.
fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        match value {
            toml::Value::Table(inner) if base.get(&key).is_some_and(toml::Value::is_table) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, inner);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project root every relative path resolves against
    pub root: PathBuf,
    /// Editor mode: scan sources, validate `.meta` sidecars, watch for changes
    pub editor: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            editor: true,
        }
    }
}

/// One asset source (built-in, editor, game, runtime, override)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source root directory, relative to the project root
    pub root: PathBuf,
    /// Loaded from a prebuilt `.resdb` + `JPAK` package instead of scanning
    pub packed: bool,
    /// Files may be created/deleted through the asset database
    pub writable: bool,
}

impl SourceConfig {
    fn new(root: &str, writable: bool) -> Self {
        Self {
            root: PathBuf::from(root),
            packed: false,
            writable,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::new("assets", false)
    }
}

/// Per-source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub built_in: SourceConfig,
    pub editor: SourceConfig,
    pub game: SourceConfig,
    pub runtime: SourceConfig,
    #[serde(rename = "override")]
    pub override_: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            built_in: SourceConfig::new("builtin", false),
            editor: SourceConfig::new("editor", true),
            game: SourceConfig::new("assets", true),
            runtime: SourceConfig::new("runtime", false),
            override_: SourceConfig::new("override", true),
        }
    }
}

/// Metadata cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one `.resdb` per source
    pub dir: PathBuf,
    /// Write caches after every successful build
    pub write_on_build: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            write_on_build: true,
        }
    }
}

/// Directory scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File/dir names (or `*.ext` globs) skipped during scans
    pub ignore_patterns: Vec<String>,
    /// Maximum directory depth below a source root
    pub max_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: vec![
                ".git".to_string(),
                ".jasset".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "*.meta".to_string(),
                "*.tmp".to_string(),
            ],
            max_depth: 64,
        }
    }
}

/// Directory monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Watch editable sources for changes (editor only)
    pub enabled: bool,
    /// Poll interval for backends without native notifications
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.scan.ignore_patterns.is_empty());
        assert!(config.sources.game.writable);
        assert!(!config.sources.built_in.writable);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[project]"));
        assert!(toml_str.contains("[sources.override]"));
        assert!(toml_str.contains("*.meta"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            config.scan.ignore_patterns.len(),
            parsed.scan.ignore_patterns.len()
        );
        assert_eq!(parsed.sources.override_.root, PathBuf::from("override"));
    }

    #[test]
    fn test_merge_tables_keeps_unset_keys() {
        let mut base: toml::Table =
            toml::from_str("[project]\nroot = \"/g\"\neditor = false\n[scan]\nmax_depth = 9\n").unwrap();
        let layer: toml::Table = toml::from_str("[scan]\nmax_depth = 3\n").unwrap();
        merge_tables(&mut base, layer);

        let config: Config = toml::Value::Table(base).try_into().unwrap();
        assert_eq!(config.project.root, PathBuf::from("/g"));
        assert!(!config.project.editor);
        assert_eq!(config.scan.max_depth, 3);
    }

    #[test]
    fn test_source_root_resolution() {
        let mut config = Config::default();
        config.project.root = PathBuf::from("/proj");
        assert_eq!(
            config.source_root(&config.sources.game),
            PathBuf::from("/proj/assets")
        );
        assert_eq!(config.cache_dir(), PathBuf::from("/proj/.jasset/cache"));
    }
}
