use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const AUTHOR_NAME: &str = "fake_user";
pub const AUTHOR_EMAIL: &str = "fake_email@email.com";

/// Host directory holding the store file of one test
#[fixture]
pub fn store_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

pub fn store_path(store_dir: &Path) -> PathBuf {
    store_dir.join("fs.db")
}

pub fn run_moonwalk_command(store_dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("moonwalk").expect("Failed to find moonwalk binary");
    cmd.current_dir(store_dir)
        .env("NO_PAGER", "1")
        .env("MOONWALK_STORE", store_path(store_dir))
        .env_remove("MOONWALK_DIR")
        .env_remove("MOONWALK_DISK")
        .env_remove("MOONWALK_LOG")
        .env_remove("GIT_AUTHOR_NAME")
        .env_remove("GIT_AUTHOR_EMAIL")
        .env_remove("GIT_AUTHOR_DATE");
    cmd.args(args);
    cmd
}

/// Run with `--json` and parse stdout, whatever the exit status
pub fn run_json(store_dir: &Path, args: &[&str]) -> Value {
    let output = run_moonwalk_command(store_dir, args)
        .arg("--json")
        .output()
        .expect("Failed to run moonwalk");
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

pub fn moonwalk_commit(store_dir: &Path, message: &str) -> Command {
    let mut cmd = run_moonwalk_command(store_dir, &["commit", "-m", message]);
    cmd.envs([
        ("GIT_AUTHOR_NAME", AUTHOR_NAME),
        ("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL),
        ("GIT_AUTHOR_DATE", "2023-01-01 12:00:00 +0000"), // %Y-%m-%d %H:%M:%S %z
    ]);
    cmd
}

/// A repository with `1.txt`, `a/2.txt` and `a/b/3.txt` committed once
#[fixture]
pub fn committed_store_dir(store_dir: TempDir) -> TempDir {
    let dir = store_dir.path();
    for (path, content) in [("1.txt", "one"), ("a/2.txt", "two"), ("a/b/3.txt", "three")] {
        run_moonwalk_command(dir, &["write", path, content])
            .assert()
            .success();
    }
    run_moonwalk_command(dir, &["add", "."]).assert().success();
    moonwalk_commit(dir, "Initial commit").assert().success();

    store_dir
}

pub fn random_words() -> String {
    use fake::Fake;
    use fake::faker::lorem::en::Words;

    Words(5..10).fake::<Vec<String>>().join(" ")
}
