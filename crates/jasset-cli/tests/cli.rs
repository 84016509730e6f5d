//! Runs the `jasset` binary against throwaway projects.

use std::process::{Command, Output};

use jasset_config::testing::TestEnvironment;
use jasset_hash::Uuid8;

fn jasset(env: &TestEnvironment, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jasset"))
        .args(args)
        .arg("--project")
        .arg(&env.project_root)
        .current_dir(&env.project_root)
        // Keep any user-level config out of the run
        .env("HOME", &env.project_root)
        .env("JASSET_LOG", "off")
        .env_remove("JASSET_PROJECT_ROOT")
        .env_remove("JASSET_EDITOR")
        .env_remove("JASSET_SCAN_DEPTH")
        .output()
        .expect("failed to run jasset")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_scan_reports_every_source() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/tex/hero.png", b"png").unwrap();

    let output = jasset(&env, &["scan"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for name in ["BuiltIn", "Editor", "Game", "Runtime", "Override"] {
        assert!(text.contains(name), "missing {name} in:\n{text}");
    }
    assert!(text.contains("ready"));
    assert!(env.project_root.join("assets/tex/hero.png.meta").exists());

    // SOURCE STATE ENTRIES META ROOT: tex/ and hero.png, one of them a file
    let game: Vec<&str> = text
        .lines()
        .find(|line| line.starts_with("Game"))
        .unwrap()
        .split_whitespace()
        .collect();
    assert_eq!(&game[1..4], ["ready", "2", "1"]);
}

#[test]
fn test_find_prefers_override() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/tex/hero.png", b"game").unwrap();
    env.create_file("override/tex/hero.png", b"override").unwrap();

    let output = jasset(&env, &["find", "tex/hero.png"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("Override tex/hero.png"));
    assert!(text.contains(&Uuid8::from_path("tex/hero.png").to_string()));
    assert!(text.trim_end().ends_with("texture"));
}

#[test]
fn test_find_missing_fails() {
    let env = TestEnvironment::new().unwrap();
    let output = jasset(&env, &["find", "nope.png"]);
    assert!(!output.status.success());
}

#[test]
fn test_pack_then_inspect() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/tex/hero.png", b"hero").unwrap();
    env.create_file("assets/data/level.json", b"{}").unwrap();
    let dist = env.project_root.join("dist");

    let output = jasset(&env, &["pack", dist.to_str().unwrap(), "-s", "game"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Packed 2 files"));

    let package = dist.join("game.jpak");
    let output = jasset(&env, &["inspect", package.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("tex/hero.png"));
    assert!(text.contains("data/level.json"));
}

#[test]
fn test_runtime_mode_refuses_packaging() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/a.txt", b"a").unwrap();
    let dist = env.project_root.join("dist");

    let output = jasset(&env, &["--runtime", "pack", dist.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(!dist.join("game.jpak").exists());
}

#[test]
fn test_cache_save_and_ls() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("builtin/ui/panel.png", b"png").unwrap();

    let output = jasset(&env, &["cache", "save", "-s", "builtin"]);
    assert!(output.status.success());
    assert!(env.cache_dir.join("builtin.resdb").exists());

    let output = jasset(&env, &["ls", "-s", "builtin", "-r"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("dir      ui/"));
    assert!(text.contains("file     ui/panel.png"));
}

#[test]
fn test_config_prints_toml() {
    let env = TestEnvironment::new().unwrap();
    let output = jasset(&env, &["config"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("[project]"));
    assert!(text.contains("[monitor]"));
}
