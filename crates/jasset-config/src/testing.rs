//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - A temporary project root
//! - One directory per asset source
//! - An isolated cache directory
//!
//! # Usage
//!
//! ```ignore
//! use jasset_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new().unwrap();
//! env.create_file("assets/tex/hero.png", b"png")?;
//! let config = env.config();
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::Config;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated project tree with every source directory created
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Project root for the test
    pub project_root: PathBuf,
    /// Isolated cache directory
    pub cache_dir: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let project_root = temp_dir.path().join("project");
        let cache_dir = project_root.join(crate::DEFAULT_CACHE_DIR);

        let defaults = crate::SourcesConfig::default();
        for source in [
            &defaults.built_in,
            &defaults.editor,
            &defaults.game,
            &defaults.runtime,
            &defaults.override_,
        ] {
            std::fs::create_dir_all(project_root.join(&source.root))?;
        }
        std::fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            project_root,
            cache_dir,
            test_id,
        })
    }

    /// Config rooted at this environment's project, with monitoring off
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        cfg.project.root = self.project_root.clone();
        cfg.monitor.enabled = false;
        cfg
    }

    /// Create a test file (path relative to the project root)
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.project_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a test directory
    pub fn create_dir(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.project_root.join(relative_path);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Remove a file or directory tree (path relative to the project root)
    pub fn remove(&self, relative_path: &str) -> anyhow::Result<()> {
        let path = self.project_root.join(relative_path);
        if path.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
