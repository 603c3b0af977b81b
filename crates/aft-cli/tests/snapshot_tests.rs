//! Snapshot tests for command output and error display

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_aft"));
        command
            .args(args)
            .env("AFT_CONFIG_DIR", self.dir.path().join("config"))
            .env("AFT_DATA_DIR", self.data_dir())
            .env("AFT_SECRETS_FILE", self.dir.path().join("secrets.json"))
            .env("CLICOLOR", "0")
            .env_remove("CLICOLOR_FORCE")
            .env_remove("RUST_LOG");
        command
    }

    /// Helper to run aft and capture output
    fn aft(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to execute aft")
    }

    /// Replace the temporary directory with a stable marker
    fn normalize(&self, output: &str) -> String {
        output.replace(&self.dir.path().display().to_string(), "[TMP]")
    }
}

fn create_test_package(dir: &Path, template: &str) {
    fs::write(dir.join("aft.yaml"), "name: broken\nversion: 0.1.0\n").unwrap();
    fs::write(dir.join("values.yaml"), "port: 8080\n").unwrap();
    fs::write(dir.join("compose.yaml.hbs"), template).unwrap();
}

#[test]
fn test_compose_path_display() {
    let env = Env::new();
    let package = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/demo");
    let output = env.aft(&["compose", "path", &package.display().to_string()]);

    assert!(output.status.success());
    insta::assert_snapshot!(
        env.normalize(&String::from_utf8_lossy(&output.stdout)),
        @"[TMP]/data/etc/aft/demo/compose.yaml"
    );
}

#[test]
fn test_tools_check_without_tools() {
    let env = Env::new();
    let empty_path = TempDir::new().unwrap();
    let output = env
        .command(&["tools", "check"])
        .env("PATH", empty_path.path())
        .output()
        .expect("Failed to execute aft");

    assert!(output.status.success());
    insta::assert_snapshot!(String::from_utf8_lossy(&output.stdout), @r"
    ✗ docker not installed
    ✗ mkcert not installed
    ✗ age-keygen not installed
    ✗ sops not installed
    ");
}

#[test]
fn test_template_error_exit_code() {
    let env = Env::new();
    let package = TempDir::new().unwrap();
    create_test_package(
        package.path(),
        "services:\n  app:\n    ports:\n      - \"{{ port | nosuchfilter }}:80\"\n",
    );

    let output = env.aft(&["compose", "unpack", &package.path().display().to_string()]);

    assert_eq!(output.status.code(), Some(3));
    assert!(
        !env.data_dir()
            .join("etc/aft/broken/compose.yaml")
            .exists()
    );
}

#[test]
fn test_syntax_error_exit_code() {
    let env = Env::new();
    let package = TempDir::new().unwrap();
    create_test_package(package.path(), "services:\n  {% if %}\n");

    let output = env.aft(&["compose", "unpack", &package.path().display().to_string()]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_missing_service_name_has_help() {
    let env = Env::new();
    let package = TempDir::new().unwrap();
    create_test_package(package.path(), "services: {}\n");

    let output = env.aft(&[
        "compose",
        "unpack",
        &package.path().display().to_string(),
        "--set",
        "service=",
        "--set",
        "name=",
    ]);

    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("service"));
}
