//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated home directory (global config)
//! - An isolated project directory (project config)
//! - Placeholder shim libraries for discovery tests
//!
//! # Usage
//!
//! ```ignore
//! use nameguard_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     env.write_project_config("[log]\nlevel = \"debug\"\n").unwrap();
//!     let config = env.load(|_| None).unwrap();
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::{Config, ConfigError, LIBRARY_FILE_NAME};

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Stand-in for `$HOME`
    pub home: PathBuf,
    /// Project root for the test
    pub project_root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let home = root.join("home");
        let project_root = root.join(format!("project-{}", test_id));

        std::fs::create_dir_all(home.join(".nameguard"))?;
        std::fs::create_dir_all(project_root.join(".nameguard"))?;

        Ok(Self {
            _temp_dir: temp_dir,
            home,
            project_root,
            test_id,
        })
    }

    pub fn global_config_path(&self) -> PathBuf {
        self.home.join(".nameguard/config.toml")
    }

    pub fn project_config_path(&self) -> PathBuf {
        self.project_root.join(".nameguard/config.toml")
    }

    pub fn write_global_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.global_config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_project_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.project_config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Load config from this environment's files with the given env lookup.
    pub fn load(&self, env: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        Config::load_from(
            Some(&self.global_config_path()),
            &self.project_config_path(),
            env,
        )
    }

    /// Create an empty file named like the shim under `relative_dir`.
    ///
    /// Only good for discovery tests; it cannot be preloaded.
    pub fn create_placeholder_library(&self, relative_dir: &str) -> anyhow::Result<PathBuf> {
        let dir = self.project_root.join(relative_dir);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(LIBRARY_FILE_NAME);
        std::fs::write(&path, b"")?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.home.join(".nameguard").is_dir());
        assert!(env.project_root.join(".nameguard").is_dir());
    }

    #[test]
    fn test_environment_has_unique_project() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.test_id, env2.test_id);
        assert_ne!(env1.project_root, env2.project_root);
    }

    #[test]
    fn test_placeholder_library() {
        let env = TestEnvironment::new().unwrap();
        let lib = env.create_placeholder_library("target/debug").unwrap();
        assert!(lib.is_file());
        assert!(lib.ends_with("target/debug/libnameguard_shim.so"));
    }
}
