//! End-to-end parses of the sample Fastfiles in `fixtures/`.

use indexmap::IndexMap;
use lanefile_core::{
    load_script, parse_file, parse_str, ActionEntry, Document, FileSystemProvider, LaneKey,
    ParseOptions, ScriptError, ScriptInput, Value,
};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/core -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn fixture(name: &str) -> Document {
    let path = workspace_root().join("fixtures").join(name);
    parse_file(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

fn call(name: &str, parameters: Value) -> ActionEntry {
    ActionEntry::Call {
        name: name.to_owned(),
        parameters,
    }
}

fn opaque(text: &str) -> ActionEntry {
    ActionEntry::Opaque {
        source_text: text.to_owned(),
    }
}

fn map(entries: &[(&str, Value)]) -> Value {
    let mut m = IndexMap::new();
    for (k, v) in entries {
        m.insert(k.to_string(), v.clone());
    }
    Value::Map(m)
}

fn lane_keys(doc: &Document, platform: Option<&str>) -> Vec<String> {
    doc.platforms()
        .find(|(p, _)| *p == platform)
        .map(|(_, group)| {
            group
                .keys()
                .map(|k| k.as_ref().map_or(String::new(), |k| k.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

// ──────────────────────────────────────────────
// Fastfile1
// ──────────────────────────────────────────────

#[test]
fn fastfile1_before_all_without_platform() {
    let doc = fixture("Fastfile1");
    let before_all = doc.get(None, Some(&LaneKey::BeforeAll)).unwrap();
    assert_eq!(
        before_all.actions,
        vec![
            call(
                "git_pull",
                map(&[
                    ("something", Value::Int(123)),
                    ("something2", Value::Str("value2".into())),
                ])
            ),
            call("cocoapods", Value::Absent),
        ]
    );
    assert_eq!(before_all.private, None);
}

#[test]
fn fastfile1_top_level_actions() {
    let doc = fixture("Fastfile1");
    let top = doc.get(None, None).unwrap();
    assert_eq!(
        top.actions,
        vec![call("fastlane_version", Value::Str("2.0.0".into()))]
    );
}

#[test]
fn fastfile1_beta_lane() {
    let doc = fixture("Fastfile1");
    let beta = doc.lane(None, "beta").unwrap();
    assert_eq!(
        beta.description,
        vec!["Automatic Beta Deployment", "Multiple lines"]
    );
    assert_eq!(beta.private, Some(false));
    assert_eq!(
        beta.actions,
        vec![
            call("sigh", Value::Absent),
            opaque("10.times do\n  yolo\nend"),
            opaque("if ((10 + 10) == 100)\n  while something\n    puts(\"hi\")\n  end\nend"),
            call(
                "gym",
                map(&[
                    ("scheme", Value::Str("Example".into())),
                    ("force", Value::Bool(true)),
                ])
            ),
            call("snapshot", map(&[("number_of_retries", Value::Int(25))])),
            call("snapshot", map(&[("number_of_retries", Value::Float(25.12))])),
        ]
    );
}

#[test]
fn fastfile1_private_lane() {
    let doc = fixture("Fastfile1");
    let helper = doc.lane(None, "helper").unwrap();
    assert_eq!(helper.private, Some(true));
    assert!(helper.description.is_empty());
}

#[test]
fn fastfile1_json_shape() {
    let value = fixture("Fastfile1").to_json_value();
    assert_eq!(
        value[""]["beta"]["actions"][3],
        json!({"action": "gym", "parameters": {"scheme": "Example", "force": true}})
    );
    assert_eq!(
        value[""]["beta"]["actions"][1],
        json!({"advancedCode": "10.times do\n  yolo\nend"})
    );
    assert_eq!(value[""]["beta"]["private"], json!(false));
    assert_eq!(
        value[""]["_before_all_block_"]["actions"][1],
        json!({"action": "cocoapods", "parameters": null})
    );
    assert!(value[""]["_before_all_block_"].get("private").is_none());
}

// ──────────────────────────────────────────────
// Fastfile2
// ──────────────────────────────────────────────

#[test]
fn fastfile2_platforms_and_lanes() {
    let doc = fixture("Fastfile2");
    let beta = doc.lane(Some("ios"), "beta").unwrap();
    assert_eq!(beta.description.len(), 2);
    assert_eq!(beta.actions.len(), 3);
    assert!(doc.lane(None, "something").is_some());
    assert_eq!(doc.lane(Some("android"), "lane1").unwrap().private, Some(false));
    assert_eq!(doc.lane(Some("android"), "lane2").unwrap().private, Some(true));
    assert!(doc.get(Some("ios"), Some(&LaneKey::AfterAll)).is_some());
}

#[test]
fn fastfile2_available_lanes() {
    let doc = fixture("Fastfile2");
    assert_eq!(
        doc.available_lanes(),
        vec![
            "something",
            "ios _before_all_block_",
            "ios beta",
            "ios _after_all_block_",
            "android lane1",
            "android lane2",
        ]
    );
}

#[test]
fn fastfile2_from_content_matches_path() {
    let path = workspace_root().join("fixtures/Fastfile2");
    let text = std::fs::read_to_string(&path).unwrap();
    let input = ScriptInput::from_options(None, Some(text)).unwrap();
    let from_content = load_script(&input, &ParseOptions::default(), &FileSystemProvider).unwrap();
    assert_eq!(from_content.name, "<content>");
    assert_eq!(from_content.document, parse_file(&path).unwrap());
}

#[test]
fn fastfile2_flatten() {
    let doc = fixture("Fastfile2");
    let all = doc.flatten(false);
    assert_eq!(all.keys().next().map(String::as_str), Some(""));
    let lanes_only = doc.flatten(true);
    assert!(!lanes_only.contains_key(""));
    assert_eq!(
        lanes_only.get("android lane1").unwrap().actions,
        vec![call("gradle", map(&[("task", Value::Str("test".into()))]))]
    );
}

// ──────────────────────────────────────────────
// Fastfile3 / Fastfile4
// ──────────────────────────────────────────────

#[test]
fn fastfile3_lanes_without_platform() {
    let value = fixture("Fastfile3").to_json_value();
    assert_eq!(
        value[""]["test"],
        json!({"description": [], "actions": [{"action": "no_u", "parameters": null}], "private": false})
    );
    assert_eq!(
        value[""]["test_arguments"],
        json!({
            "description": [],
            "actions": [{"action": "no_u_3", "parameters": {"argument": "hello"}}],
            "private": false
        })
    );
    assert_eq!(
        value[""]["test2"],
        json!({"description": [], "actions": [{"action": "no_u_2", "parameters": null}], "private": false})
    );
}

#[test]
fn fastfile4_platform_with_single_lane() {
    let doc = fixture("Fastfile4");
    assert_eq!(lane_keys(&doc, Some("ios")), vec!["test"]);
    assert_eq!(doc.available_lanes(), vec!["ios test"]);
}

// ──────────────────────────────────────────────
// Fastfile5
// ──────────────────────────────────────────────

#[test]
fn fastfile5_top_level_keys() {
    let doc = fixture("Fastfile5");
    assert_eq!(
        lane_keys(&doc, None),
        vec!["", "_before_all_block_", "ship_beta", "_error_block_"]
    );
}

#[test]
fn fastfile5_complex_lane() {
    let doc = fixture("Fastfile5");
    let lane = doc.lane(None, "ship_beta").unwrap();
    assert_eq!(
        lane.description,
        vec!["Ship a beta build", "Bumps the build number first"]
    );
    assert_eq!(lane.actions.len(), 10);
    assert_eq!(
        lane.actions[1],
        call(
            "increment_build_number",
            map(&[
                ("build_number", Value::Int(1)),
                ("xcodeproj", Value::Str("Example.xcodeproj".into())),
            ])
        )
    );
    let recognized: Vec<_> = lane
        .actions
        .iter()
        .filter_map(ActionEntry::action_name)
        .collect();
    assert_eq!(recognized, vec!["increment_build_number"]);
}

#[test]
fn fastfile5_error_block() {
    let doc = fixture("Fastfile5");
    let error = doc.get(None, Some(&LaneKey::Error)).unwrap();
    assert_eq!(
        error.actions,
        vec![call(
            "slack",
            map(&[
                ("message", Value::Symbol("message".into())),
                ("success", Value::Bool(false)),
            ])
        )]
    );
}

// ──────────────────────────────────────────────
// Cross-fixture properties
// ──────────────────────────────────────────────

const FIXTURES: &[&str] = &["Fastfile1", "Fastfile2", "Fastfile3", "Fastfile4", "Fastfile5"];

#[test]
fn parsing_is_deterministic() {
    for name in FIXTURES {
        assert_eq!(fixture(name), fixture(name), "{}", name);
    }
}

#[test]
fn advanced_code_reparses() {
    for name in FIXTURES {
        let doc = fixture(name);
        for (label, entry) in doc.flatten(false).iter() {
            for action in &entry.actions {
                if let ActionEntry::Opaque { source_text } = action {
                    if let Err(e) = parse_str(source_text, "advancedCode") {
                        panic!("{} '{}': {}\n{}", name, label, e, source_text);
                    }
                }
            }
        }
    }
}

#[test]
fn missing_fixture_is_input_error() {
    let err = parse_file(&workspace_root().join("fixtures/NoSuchFastfile")).unwrap_err();
    assert!(matches!(err, ScriptError::Input { .. }));
}
