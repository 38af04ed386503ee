use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vocab_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vocab"))
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[workspace]
token_env = "VOCAB_SYNC_TEST_UNSET_TOKEN"

[collections]
contexts = "aaa18f4dfc56495e835e0289cbe25f3b"
words = "a9d64a44ea8844088612055786f85954"
expressions = "3670f8bab263462a8e60c6ae8ae88dd8"
{}
"#,
        extra
    );

    let config_path = config_dir.join("vocab.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_vocab(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = vocab_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("VOCAB_SYNC_TEST_UNSET_TOKEN")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vocab binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(vocab_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["sync", "reset", "contexts", "lookup"] {
        assert!(stdout.contains(cmd), "missing {} in help: {}", cmd, stdout);
    }
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_vocab(&tmp.path().join("absent.toml"), &["contexts"]);
    assert!(!success);
    assert!(stderr.contains("absent.toml"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env("[lexicon]\nprovider = \"oxford\"\n");
    let (_, stderr, success) = run_vocab(&config_path, &["contexts"]);
    assert!(!success);
    assert!(stderr.contains("oxford"), "stderr: {}", stderr);
}

#[test]
fn test_sync_requires_token() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_vocab(&config_path, &["sync", "--dry-run"]);
    assert!(!success);
    assert!(
        stderr.contains("VOCAB_SYNC_TEST_UNSET_TOKEN environment variable not set"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_lookup_without_dictionary_fails() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_vocab(&config_path, &["lookup", "enamor"]);
    assert!(!success);
    assert!(stderr.contains("No dictionary configured"), "stderr: {}", stderr);
}
