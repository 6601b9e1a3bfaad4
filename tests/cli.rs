//! Integration tests for the cursor-rulegen CLI

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("cursor-rulegen").unwrap();
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("OPENAI_BASE_URL")
        .env_remove("OPENAI_MODEL");
    cmd
}

fn repo_with_sources() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    git2::Repository::init(temp.path()).unwrap();
    temp.child("src/main.rs").write_str("fn main() {}\n").unwrap();
    temp.child("README.md").write_str("# demo\n").unwrap();
    temp
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cursor"));
}

#[test]
fn test_cli_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cursor-rulegen"));
}

#[test]
fn test_missing_api_key_fails_before_writing() {
    let temp = repo_with_sources();

    cli()
        .arg("--dir")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OPENAI_API_KEY"));

    temp.child("request.txt").assert(predicate::path::missing());
    temp.child(".cursor").assert(predicate::path::missing());
}

#[test]
fn test_not_a_repository_fails_before_writing() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("a.txt").write_str("a").unwrap();

    cli()
        .env("OPENAI_API_KEY", "sk-test")
        .arg("--dir")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not a git repository"));

    temp.child("request.txt").assert(predicate::path::missing());
    temp.child(".cursor").assert(predicate::path::missing());
}

#[test]
fn test_dry_run_writes_request_only() {
    let temp = repo_with_sources();

    cli()
        .arg("--dir")
        .arg(temp.path())
        .arg("--dry-run")
        .assert()
        .success();

    temp.child("request.txt")
        .assert(predicate::str::contains("--- FILE: src/main.rs ---\nfn main() {}\n\n"))
        .assert(predicate::str::contains("--- FILE: README.md ---\n# demo\n\n"));
    temp.child(".cursor").assert(predicate::path::missing());
}

#[test]
fn test_dry_run_honours_extra_ignores() {
    let temp = repo_with_sources();

    cli()
        .arg("--dir")
        .arg(temp.path())
        .arg("--dry-run")
        .arg("--ignore")
        .arg("*.md")
        .assert()
        .success();

    temp.child("request.txt")
        .assert(predicate::str::contains("README.md").not());
}

#[test]
fn test_invalid_base_url_is_rejected() {
    let temp = repo_with_sources();

    cli()
        .env("OPENAI_API_KEY", "sk-test")
        .arg("--dir")
        .arg(temp.path())
        .arg("--base-url")
        .arg("ftp://example.com")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"));

    temp.child("request.txt").assert(predicate::path::missing());
}
