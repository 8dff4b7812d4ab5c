//! Integration tests for nameguard-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use nameguard_config::testing::TestEnvironment;
use nameguard_config::{Config, ConfigError, LogLevel, ENV_LIBRARY, ENV_LOG_LEVEL};
use std::path::PathBuf;

/// Test config loading from real global config file
#[test]
fn test_load_global_config_from_file() {
    let env = TestEnvironment::new().unwrap();
    env.write_global_config(
        r#"
[shim]
library = "/usr/local/lib/libnameguard_shim.so"

[log]
level = "info"
"#,
    )
    .unwrap();

    let config = env.load(|_| None).unwrap();
    assert_eq!(
        config.shim.library,
        Some(PathBuf::from("/usr/local/lib/libnameguard_shim.so"))
    );
    assert_eq!(config.log.level, LogLevel::Info);
}

/// Test config hierarchy: project config overrides global
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let env = TestEnvironment::new().unwrap();
    env.write_global_config(
        r#"
[shim]
library = "/global/libnameguard_shim.so"

[log]
level = "error"
"#,
    )
    .unwrap();
    env.write_project_config("[log]\nlevel = \"debug\"\n").unwrap();

    let config = env.load(|_| None).unwrap();

    // Verify: level replaced, library preserved from global
    assert_eq!(config.log.level, LogLevel::Debug);
    assert_eq!(
        config.shim.library,
        Some(PathBuf::from("/global/libnameguard_shim.so"))
    );
}

/// Environment beats both files
#[test]
fn test_env_overrides_files() {
    let env = TestEnvironment::new().unwrap();
    env.write_global_config("[shim]\nlibrary = \"/global.so\"\n")
        .unwrap();
    env.write_project_config("[shim]\nlibrary = \"/project.so\"\n")
        .unwrap();

    let config = env
        .load(|k| match k {
            ENV_LIBRARY => Some("/env.so".to_string()),
            ENV_LOG_LEVEL => Some("trace".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.shim.library, Some(PathBuf::from("/env.so")));
    assert_eq!(config.log.level, LogLevel::Trace);
}

#[test]
fn test_malformed_project_config_is_error() {
    let env = TestEnvironment::new().unwrap();
    env.write_project_config("[log\nlevel = ").unwrap();

    let err = env.load(|_| None).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn test_unknown_level_in_file_is_error() {
    let env = TestEnvironment::new().unwrap();
    env.write_global_config("[log]\nlevel = \"chatty\"\n").unwrap();

    assert!(env.load(|_| None).is_err());
}

#[test]
fn test_default_toml_parses_back() {
    let parsed: Config = toml::from_str(&toml::to_string_pretty(&Config::default()).unwrap()).unwrap();
    assert_eq!(parsed, Config::default());
}
