//! Integration tests for jasset-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use std::path::PathBuf;
use tempfile::tempdir;

/// Test config loading from a real config file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let jasset_dir = temp.path().join(".jasset");
    std::fs::create_dir_all(&jasset_dir).unwrap();

    let config_content = r#"
[project]
root = "/games/demo"
editor = false

[sources.game]
root = "content"
packed = true
writable = false

[sources.override]
root = "mods"

[scan]
ignore_patterns = [".svn", "*.bak"]
max_depth = 8
"#;
    std::fs::write(jasset_dir.join("config.toml"), config_content).unwrap();

    let config = jasset_config::Config::load_from(jasset_dir.join("config.toml")).unwrap();

    assert_eq!(config.project.root, PathBuf::from("/games/demo"));
    assert!(!config.project.editor);
    assert!(config.sources.game.packed);
    assert!(!config.sources.game.writable);
    assert_eq!(config.sources.override_.root, PathBuf::from("mods"));
    assert_eq!(config.scan.ignore_patterns, vec![".svn", "*.bak"]);
    assert_eq!(config.scan.max_depth, 8);
    assert_eq!(
        config.source_root(&config.sources.game),
        PathBuf::from("/games/demo/content")
    );
}

/// Test partial config with defaults filling in
#[test]
fn test_partial_config_defaults_applied() {
    let partial = r#"
[sources.runtime]
root = "generated"
"#;
    let config: jasset_config::Config = toml::from_str(partial).unwrap();

    // Specified values
    assert_eq!(config.sources.runtime.root, PathBuf::from("generated"));

    // Defaults applied
    assert_eq!(config.sources.built_in.root, PathBuf::from("builtin"));
    assert!(config.project.editor);
    assert!(config
        .scan
        .ignore_patterns
        .iter()
        .any(|p| p == "*.meta"));
    assert!(config.cache.write_on_build);
}

/// Test that malformed config surfaces a parse error rather than defaults
#[test]
fn test_malformed_config_is_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[scan\nmax_depth = ").unwrap();

    let result = jasset_config::Config::load_from(&path);
    assert!(matches!(result, Err(jasset_config::ConfigError::Toml(_))));
}

/// Test complete config serialization/deserialization cycle
#[test]
fn test_config_full_roundtrip_with_all_sections() {
    let original = jasset_config::Config::default();

    let temp = tempdir().unwrap();
    let config_path = temp.path().join("config.toml");
    std::fs::write(&config_path, jasset_config::Config::default_toml()).unwrap();

    let loaded = jasset_config::Config::load_from(&config_path).unwrap();

    assert_eq!(original.project.editor, loaded.project.editor);
    assert_eq!(original.sources.editor.root, loaded.sources.editor.root);
    assert_eq!(original.cache.dir, loaded.cache.dir);
    assert_eq!(
        original.scan.ignore_patterns.len(),
        loaded.scan.ignore_patterns.len()
    );
    assert_eq!(
        original.monitor.poll_interval_ms,
        loaded.monitor.poll_interval_ms
    );
}

/// A project file only overrides the keys it sets
#[test]
fn test_project_layer_keeps_global_settings() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("global.toml");
    let project = temp.path().join("project.toml");
    std::fs::write(
        &global,
        "[project]\nroot = \"/games/demo\"\neditor = false\n\n[monitor]\npoll_interval_ms = 250\n",
    )
    .unwrap();
    std::fs::write(&project, "[scan]\nmax_depth = 4\n\n[sources.game]\nroot = \"content\"\n").unwrap();

    let config = jasset_config::Config::load_layered(&[&global, &project]).unwrap();

    assert_eq!(config.project.root, PathBuf::from("/games/demo"));
    assert!(!config.project.editor);
    assert_eq!(config.monitor.poll_interval_ms, 250);
    assert_eq!(config.scan.max_depth, 4);
    assert_eq!(config.sources.game.root, PathBuf::from("content"));
    // Keys inside a partially set section keep their defaults
    assert!(config.sources.game.writable);
    assert!(config.scan.ignore_patterns.iter().any(|p| p == "*.meta"));
}
