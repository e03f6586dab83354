//! CLI smoke tests: `solve` and `update-cache` against a fixture manifest
//! with a pre-populated fixture cache, asserting the documented exit codes.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    manifest_path: std::path::PathBuf,
    cache_dir: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        fs::create_dir_all(cache_dir.join("cran")).unwrap();

        fs::write(
            cache_dir.join("cran").join("dplyr.json"),
            r#"{
                "candidates": [
                    {
                        "ref": {"source": "cran", "name": "dplyr", "locator": null},
                        "version": "1.1.4",
                        "r_floor": "3.5.0",
                        "depends": [],
                        "bioc_release": null
                    }
                ]
            }"#,
        )
        .unwrap();

        let manifest_path = dir.path().join("project.yaml");
        fs::write(
            &manifest_path,
            "project:\n  name: demo\ntargets:\n  - package: dplyr\n    source: cran\n    constraint: \">=1.0.0\"\n",
        )
        .unwrap();

        Self {
            _dir: dir,
            manifest_path,
            cache_dir,
        }
    }

    fn rverse_command(&self) -> Command {
        let mut cmd = Command::cargo_bin("rverse").unwrap();
        cmd.env("RVERSE_CACHE_DIR", &self.cache_dir);
        cmd
    }
}

#[test]
fn solve_succeeds_with_populated_cache() {
    let fixture = Fixture::new();

    fixture
        .rverse_command()
        .arg("solve")
        .arg(&fixture.manifest_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("dplyr"));
}

#[test]
fn solve_json_format_has_documented_shape() {
    let fixture = Fixture::new();

    let output = fixture
        .rverse_command()
        .arg("solve")
        .arg(&fixture.manifest_path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(value["packages"].as_array().unwrap().iter().any(|p| p["name"] == "dplyr"));
}

#[test]
fn solve_reports_manifest_error_with_exit_code_two() {
    let dir = TempDir::new().unwrap();
    let manifest_path = dir.path().join("project.yaml");
    fs::write(&manifest_path, "project: [not a mapping").unwrap();

    let mut cmd = Command::cargo_bin("rverse").unwrap();
    cmd.env("RVERSE_CACHE_DIR", dir.path().join("cache"))
        .arg("solve")
        .arg(&manifest_path)
        .assert()
        .code(2);
}

#[test]
fn solve_reports_unknown_package_with_exit_code_three() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    fs::create_dir_all(&cache_dir).unwrap();
    let manifest_path = dir.path().join("project.yaml");
    fs::write(
        &manifest_path,
        "project:\n  name: demo\ntargets:\n  - package: nonexistent\n    source: cran\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("rverse").unwrap();
    cmd.env("RVERSE_CACHE_DIR", &cache_dir)
        .arg("solve")
        .arg(&manifest_path)
        .assert()
        .code(3);
}
