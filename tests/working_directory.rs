use assert_fs::TempDir;
use common::command::{random_words, run_json, run_moonwalk_command, store_dir, store_path};
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

mod common;

#[rstest]
fn setup_creates_the_directory_once(store_dir: TempDir) {
    let dir = store_dir.path();

    assert_eq!(run_json(dir, &["setup"]), json!({ "created": true }));
    assert_eq!(run_json(dir, &["setup"]), json!({ "created": false }));
    assert!(store_path(dir).exists());
}

#[rstest]
fn files_persist_between_invocations(store_dir: TempDir) {
    let dir = store_dir.path();
    let content = random_words();

    run_moonwalk_command(dir, &["write", "README.md", &content])
        .assert()
        .success();

    run_moonwalk_command(dir, &["read", "README.md"])
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{content}\n")));
    assert_eq!(
        run_json(dir, &["read", "README.md"]),
        json!({ "contents": content })
    );
}

#[rstest]
fn listing_shows_files_and_directories(store_dir: TempDir) {
    let dir = store_dir.path();
    run_moonwalk_command(dir, &["write", "b.txt", "b"]).assert().success();
    run_moonwalk_command(dir, &["write", "docs/a.md", "a"]).assert().success();
    run_moonwalk_command(dir, &["init"]).assert().success();

    assert_eq!(run_json(dir, &["ls"]), json!([".git", "b.txt", "docs"]));
}

#[rstest]
fn clear_wipes_everything(store_dir: TempDir) {
    let dir = store_dir.path();
    run_moonwalk_command(dir, &["write", "README.md", "hello"])
        .assert()
        .success();

    assert_eq!(run_json(dir, &["clear"]), json!({ "cleared": true }));

    run_moonwalk_command(dir, &["read", "README.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("README.md"));
}

#[rstest]
fn reading_a_missing_file_reports_a_json_error(store_dir: TempDir) {
    let output = run_json(store_dir.path(), &["read", "missing.txt"]);

    assert!(output["error"].as_str().unwrap().contains("missing.txt"));
}

#[rstest]
fn writing_into_git_internals_is_refused(store_dir: TempDir) {
    run_moonwalk_command(store_dir.path(), &["write", ".git/HEAD", "oops"])
        .assert()
        .failure();
}

#[rstest]
fn repository_directory_is_configurable(store_dir: TempDir) {
    let dir = store_dir.path();

    run_moonwalk_command(dir, &["--dir", "/elsewhere", "write", "a.txt", "a"])
        .assert()
        .success();

    run_moonwalk_command(dir, &["--dir", "/elsewhere", "read", "a.txt"])
        .assert()
        .success()
        .stdout("a\n");
    run_moonwalk_command(dir, &["read", "a.txt"]).assert().failure();
}

#[rstest]
fn disk_mode_writes_to_the_host(store_dir: TempDir) {
    let dir = store_dir.path();
    let root = dir.join("root");
    let root_arg = root.display().to_string();

    run_moonwalk_command(dir, &["--disk", &root_arg, "write", "notes/todo.txt", "moon"])
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(root.join("moonwalk").join("notes").join("todo.txt")).unwrap(),
        "moon"
    );
    assert!(!store_path(dir).exists());
}
