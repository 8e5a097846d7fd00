//! CLI subprocess integration tests.
//!
//! These tests invoke the `stratum` binary as a subprocess and verify exit
//! codes, stdout content, and JSON output. None of them reach AWS.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn stratum_bin(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stratum"));
    cmd.current_dir(cwd);
    // Host tools are not needed for the paths exercised here.
    cmd.env("STRATUM_SKIP_PREREQS", "1");
    cmd.env_remove("STRATUM_LOG");
    cmd
}

fn run(cwd: &Path, args: &[&str]) -> Output {
    stratum_bin(cwd).args(args).output().unwrap()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_uv_project(dir: &Path) {
    fs::write(dir.join("pyproject.toml"), "[project]\nname = \"app\"\n").unwrap();
    fs::write(dir.join("uv.lock"), "version = 1\n").unwrap();
}

#[test]
fn cli_version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--version"]);
    assert!(output.status.success(), "stratum --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stratum"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_pipeline_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["build", "package", "upload", "publish", "status", "run", "doctor"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}': {stdout}");
    }
}

#[test]
fn cli_init_writes_config_with_inferred_tool() {
    let dir = tempfile::tempdir().unwrap();
    write_uv_project(dir.path());

    let output = run(
        dir.path(),
        &["--json", "init", "--name", "app-deps", "--s3-dir", "s3://bucket/app/"],
    );
    assert!(output.status.success(), "init failed: {}", stderr_of(&output));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("init --json must produce valid JSON: {e}"));
    assert_eq!(parsed["status"], "written");
    assert_eq!(parsed["config"]["layer"]["tool"], "uv");

    let written = fs::read_to_string(dir.path().join("stratum.toml")).unwrap();
    let config = stratum_schema::parse_config_str(&written).unwrap();
    assert_eq!(config.layer.name.as_deref(), Some("app-deps"));
    assert_eq!(config.layer.s3_dir.as_deref(), Some("s3://bucket/app/"));
}

#[test]
fn cli_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stratum.toml"), "# keep\n").unwrap();

    let output = run(dir.path(), &["init", "--tool", "pip"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("--force"));
    assert_eq!(
        fs::read_to_string(dir.path().join("stratum.toml")).unwrap(),
        "# keep\n"
    );

    let forced = run(dir.path(), &["init", "--tool", "pip", "--force"]);
    assert!(forced.status.success(), "{}", stderr_of(&forced));
}

#[test]
fn cli_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("stratum"));
}

#[test]
fn cli_man_pages_per_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("man");
    let output = run(dir.path(), &["man-pages", &out.to_string_lossy()]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(out.join("stratum.1").is_file());
    assert!(out.join("stratum-publish.1").is_file());
}

#[test]
fn cli_invalid_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("stratum.toml"),
        "[layer]\ns3_dir = \"https://nope\"\n",
    )
    .unwrap();
    let output = run(dir.path(), &["package", "--tool", "uv"]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("configuration error"));
}

#[test]
fn cli_build_without_lock_file_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();

    let output = run(dir.path(), &["build", "--tool", "uv"]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("uv.lock"));
    assert!(!dir.path().join("build").exists());
}

#[test]
fn cli_build_declined_without_terminal_keeps_build_root() {
    let dir = tempfile::tempdir().unwrap();
    write_uv_project(dir.path());
    let marker = dir.path().join("build/lambda/layer/artifacts/python/keep.py");
    fs::create_dir_all(marker.parent().unwrap()).unwrap();
    fs::write(&marker, "# keep\n").unwrap();

    let output = run(dir.path(), &["build", "--tool", "uv"]);
    assert_eq!(output.status.code(), Some(3), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("aborted"));
    assert_eq!(fs::read_to_string(&marker).unwrap(), "# keep\n");
}

#[test]
fn cli_package_without_build_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_uv_project(dir.path());
    let output = run(dir.path(), &["package"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("missing artifact"));
}

#[test]
fn cli_package_json_reports_archive() {
    let dir = tempfile::tempdir().unwrap();
    write_uv_project(dir.path());
    let site = dir
        .path()
        .join("build/lambda/layer/repo/.venv/lib/python3.12/site-packages");
    for pkg in ["attrs", "boto3"] {
        fs::create_dir_all(site.join(pkg)).unwrap();
        fs::write(site.join(pkg).join("__init__.py"), "").unwrap();
    }

    let output = run(dir.path(), &["--json", "package"]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["files"], 1);
    assert_eq!(parsed["sha256"].as_str().map(str::len), Some(64));
    assert!(dir.path().join("build/lambda/layer/layer.zip").is_file());
}

#[test]
fn cli_upload_without_s3_dir_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    write_uv_project(dir.path());
    let output = run(dir.path(), &["upload"]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("--s3-dir"));
}

#[test]
fn cli_publish_without_layer_name_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    write_uv_project(dir.path());
    let output = run(dir.path(), &["publish", "--s3-dir", "s3://bucket/app/"]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("layer name"));
}

#[test]
fn cli_doctor_json_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--json", "doctor"]);
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("doctor --json must produce valid JSON: {e}"));
    assert!(parsed["checks"].as_array().is_some_and(|c| !c.is_empty()));
}
