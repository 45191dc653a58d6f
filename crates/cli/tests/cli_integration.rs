//! CLI integration tests for all implemented subcommands.
//!
//! Uses `assert_cmd` to spawn the `lanefile` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to the sample Fastfiles in `fixtures/` resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `lanefile` binary, rooted at workspace.
fn lanefile() -> Command {
    let mut cmd = cargo_bin_cmd!("lanefile");
    cmd.current_dir(workspace_root());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout must be valid JSON")
}

fn stderr_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().failure().code(1).get_output().stderr.clone();
    serde_json::from_slice(&output).expect("stderr must be valid JSON")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    lanefile()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fastfile parser"));
}

#[test]
fn version_exits_0() {
    lanefile()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lanefile"));
}

#[test]
fn unknown_subcommand_fails() {
    lanefile().arg("bogus").assert().failure();
}

// ──────────────────────────────────────────────
// 2. parse
// ──────────────────────────────────────────────

#[test]
fn parse_prints_document_json() {
    let doc = stdout_json(lanefile().args(["parse", "fixtures/Fastfile1"]));
    assert_eq!(doc[""]["beta"]["private"], serde_json::json!(false));
    assert_eq!(doc[""]["helper"]["private"], serde_json::json!(true));
    assert_eq!(
        doc[""][""]["actions"][0],
        serde_json::json!({"action": "fastlane_version", "parameters": "2.0.0"})
    );
}

#[test]
fn parse_reads_stdin() {
    let doc = stdout_json(
        lanefile()
            .args(["parse", "-"])
            .write_stdin("platform :ios do\n  lane :beta do\n    gym\n  end\nend\n"),
    );
    assert_eq!(
        doc["ios"]["beta"]["actions"][0],
        serde_json::json!({"action": "gym", "parameters": null})
    );
}

#[test]
fn parse_output_keeps_script_order() {
    let src = "platform :ios do\n  lane :zeta do\n  end\n  lane :alpha do\n  end\nend\n\
               platform :android do\n  lane :beta do\n  end\nend\n";
    let output = lanefile()
        .args(["parse", "-"])
        .write_stdin(src)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("stdout must be UTF-8");
    let at = |needle: &str| text.find(needle).unwrap_or_else(|| panic!("{} missing", needle));
    assert!(at("\"ios\"") < at("\"android\""), "{}", text);
    assert!(at("\"zeta\"") < at("\"alpha\""), "{}", text);
}

#[test]
fn parse_missing_file_exits_1() {
    lanefile()
        .args(["parse", "fixtures/DoesNotExist"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot read script"));
}

#[test]
fn parse_syntax_error_as_json() {
    let err = stderr_json(
        lanefile()
            .args(["--output", "json", "parse", "-"])
            .write_stdin("lane :beta do\n  gym(\nend\n"),
    );
    assert_eq!(err["kind"], "syntax");
    assert_eq!(err["file"], "<stdin>");
    assert!(err["line"].is_u64());
}

#[test]
fn quiet_suppresses_text_errors() {
    lanefile()
        .args(["--quiet", "parse", "fixtures/DoesNotExist"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 3. imports
// ──────────────────────────────────────────────

fn write_project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, text) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }
    dir
}

#[test]
fn parse_with_imports_includes_imported_documents() {
    let dir = write_project(&[
        ("fastlane/Fastfile", "import \"shared/Common\"\nlane :main do\nend\n"),
        ("fastlane/shared/Common", "lane :common do\n  scan\nend\n"),
    ]);
    let out = stdout_json(
        lanefile()
            .current_dir(dir.path())
            .args(["parse", "--imports", "fastlane/Fastfile"]),
    );
    assert!(out["document"][""]["main"].is_object());
    assert_eq!(out["imports"][0]["line"], 1);
    assert_eq!(
        out["imports"][0]["document"][""]["common"]["actions"][0]["action"],
        "scan"
    );
    assert!(out["imports"][0]["path"]
        .as_str()
        .unwrap()
        .ends_with("Common"));
}

#[test]
fn import_cycle_exits_1() {
    let dir = write_project(&[
        ("Fastfile", "import \"A\"\n"),
        ("A", "import \"B\"\n"),
        ("B", "import \"A\"\n"),
    ]);
    let err = stderr_json(
        lanefile()
            .current_dir(dir.path())
            .args(["--output", "json", "parse", "--imports", "Fastfile"]),
    );
    assert_eq!(err["kind"], "import");
    assert!(err["message"].as_str().unwrap().contains("cycle"));
}

#[test]
fn import_outside_sandbox_exits_1() {
    let dir = write_project(&[
        ("fastlane/Fastfile", "import \"../Shared\"\n"),
        ("Shared", "lane :shared do\nend\n"),
    ]);
    lanefile()
        .current_dir(dir.path())
        .args(["parse", "--imports", "fastlane/Fastfile"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("sandbox"));

    lanefile()
        .current_dir(dir.path())
        .args(["parse", "--imports", "--sandbox-root", ".", "fastlane/Fastfile"])
        .assert()
        .success();
}

#[test]
fn imports_are_plain_actions_without_flag() {
    let dir = write_project(&[("Fastfile", "import \"Missing\"\n")]);
    let doc = stdout_json(lanefile().current_dir(dir.path()).args(["parse", "Fastfile"]));
    assert_eq!(
        doc[""][""]["actions"][0],
        serde_json::json!({"action": "import", "parameters": "Missing"})
    );
}

// ──────────────────────────────────────────────
// 4. lanes and flat
// ──────────────────────────────────────────────

#[test]
fn lanes_text_lists_one_per_line() {
    lanefile()
        .args(["lanes", "fixtures/Fastfile2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ios beta\n"))
        .stdout(predicate::str::contains("android lane2\n"))
        .stdout(predicate::str::starts_with("something\n"));
}

#[test]
fn lanes_json_is_an_array() {
    let lanes = stdout_json(lanefile().args(["--output", "json", "lanes", "fixtures/Fastfile4"]));
    assert_eq!(lanes, serde_json::json!(["ios test"]));
}

#[test]
fn flat_keeps_top_level_by_default() {
    let flat = stdout_json(lanefile().args(["flat", "fixtures/Fastfile1"]));
    assert!(flat.get("").is_some());
    assert!(flat["beta"]["actions"].is_array());
}

#[test]
fn flat_ignore_top_level() {
    let flat = stdout_json(lanefile().args(["flat", "--ignore-top-level", "fixtures/Fastfile1"]));
    assert!(flat.get("").is_none());
    assert!(flat.get("_before_all_block_").is_some());
}

// ──────────────────────────────────────────────
// 5. config file
// ──────────────────────────────────────────────

#[test]
fn config_sets_output_format() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lanefile.toml");
    fs::write(&config, "[output]\nformat = \"json\"\nignore_top_level = true\n").unwrap();

    let lanes = stdout_json(lanefile().arg("--config").arg(&config).args(["lanes", "fixtures/Fastfile4"]));
    assert_eq!(lanes, serde_json::json!(["ios test"]));

    let flat = stdout_json(lanefile().arg("--config").arg(&config).args(["flat", "fixtures/Fastfile1"]));
    assert!(flat.get("").is_none());
}

#[test]
fn flag_overrides_config_format() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lanefile.toml");
    fs::write(&config, "[output]\nformat = \"json\"\n").unwrap();

    lanefile()
        .arg("--config")
        .arg(&config)
        .args(["--output", "text", "lanes", "fixtures/Fastfile4"])
        .assert()
        .success()
        .stdout("ios test\n");
}

#[test]
fn config_enables_imports() {
    let dir = write_project(&[
        ("Fastfile", "import \"Other\"\n"),
        ("Other", "lane :other do\nend\n"),
        ("lanefile.toml", "[parse]\nresolve_imports = true\n"),
    ]);
    let out = stdout_json(
        lanefile()
            .current_dir(dir.path())
            .args(["--config", "lanefile.toml", "parse", "Fastfile"]),
    );
    assert!(out["imports"][0]["document"][""]["other"].is_object());
}

#[test]
fn invalid_config_exits_1() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lanefile.toml");
    fs::write(&config, "[output]\nformat = 3\n").unwrap();
    lanefile()
        .arg("--config")
        .arg(&config)
        .args(["lanes", "fixtures/Fastfile4"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not parse"));
}
