//! Command line behaviour of the two binaries
//! These tests run the actual binaries and verify exit codes and messages

use assert_fs::prelude::*;
use assert_fs::TempDir;
use tokio::process::Command;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const SETTINGS_ENV: &[&str] = &[
    "GITHUB_USER",
    "GITHUB_TOKEN",
    "GITHUB_ORGANIZATION",
    "GITLAB_TOKEN",
    "GITLAB_GROUPS",
    "CC_USER",
    "CC_PASSWORD",
    "RUST_LOG",
];

/// Binary invocation isolated from the caller's settings
fn command(bin: &str, home: &TempDir) -> Command {
    let mut cmd = Command::new(bin);
    for var in SETTINGS_ENV {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("AWS_EC2_METADATA_DISABLED", "true")
        .env("AWS_CONFIG_FILE", home.child("aws-config").path())
        .env("AWS_SHARED_CREDENTIALS_FILE", home.child("aws-credentials").path());
    cmd
}

#[tokio::test]
async fn test_help_lists_flags() {
    let home = TempDir::new().unwrap();
    let output = command(env!("CARGO_BIN_EXE_gh-cc-mirror"), &home)
        .arg("--help")
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--github-user", "--github-token", "--github-organization", "--cc-user", "--pushed-within"] {
        assert!(stdout.contains(flag), "help is missing {}", flag);
    }

    let output = command(env!("CARGO_BIN_EXE_gl-cc-mirror"), &home)
        .arg("--help")
        .output()
        .await
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--gitlab-groups"));
}

#[tokio::test]
async fn test_missing_required_setting_is_usage_error() {
    let home = TempDir::new().unwrap();
    let output = command(env!("CARGO_BIN_EXE_gh-cc-mirror"), &home)
        .args(["--github-user", "octo", "--cc-user", "svc", "--cc-password", "pw"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("github-token"), "unexpected stderr: {}", stderr);
    assert!(stderr.contains("Usage"), "unexpected stderr: {}", stderr);
}

#[tokio::test]
async fn test_gitlab_groups_required() {
    let home = TempDir::new().unwrap();
    let output = command(env!("CARGO_BIN_EXE_gl-cc-mirror"), &home)
        .env("GITLAB_TOKEN", "glpat")
        .env("CC_USER", "svc")
        .env("CC_PASSWORD", "pw")
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("gitlab-groups"));
}

#[tokio::test]
async fn test_listing_failure_exits_with_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let work = home.child("mirror");
    let config = home.child("cc-mirror.yml");
    config
        .write_str(&format!(
            "work_dir: {}\ngithub:\n  api_url: {}/graphql\n  host: {}\ncodecommit:\n  aws_access_key: AKIDEXAMPLE\n  aws_secret_access_key: secret\n",
            work.path().display(),
            server.uri(),
            server.uri()
        ))
        .unwrap();

    let output = command(env!("CARGO_BIN_EXE_gh-cc-mirror"), &home)
        .arg("--config")
        .arg(config.path())
        .env("GITHUB_USER", "octo")
        .env("GITHUB_TOKEN", "tok")
        .env("GITHUB_ORGANIZATION", "acme")
        .env("CC_USER", "svc")
        .env("CC_PASSWORD", "pw")
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(work.path().is_dir());
    let logs = String::from_utf8_lossy(&output.stdout);
    assert!(logs.contains("502"), "unexpected output: {}", logs);
    assert!(!logs.contains("tok@"), "credentials leaked: {}", logs);
}
