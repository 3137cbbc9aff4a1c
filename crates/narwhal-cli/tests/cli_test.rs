use assert_cmd::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::process::Command;

const SCENE: &str = r#"{
  "cells": [
    { "id": "a", "vertex": true, "x": 0, "y": 0, "width": 40, "height": 40, "value": "A" },
    { "id": "e", "edge": true, "source": "a", "target": "b" },
    { "id": "b", "vertex": true, "x": 100, "y": 0, "width": 40, "height": 40, "style": "shape=ellipse" }
  ]
}"#;

fn state<'a>(out: &'a Value, id: &str) -> &'a Value {
    out["states"]
        .as_array()
        .expect("states array")
        .iter()
        .find(|s| s["id"] == id)
        .unwrap_or_else(|| panic!("no state for {id}"))
}

fn run_ok(args: &[&str], stdin: Option<&str>) -> Value {
    let exe = assert_cmd::cargo_bin!("narwhal-cli");
    let mut cmd = assert_cmd::Command::new(exe);
    cmd.args(args);
    if let Some(input) = stdin {
        cmd.write_stdin(input);
    }
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is JSON")
}

#[test]
fn cli_renders_states_from_a_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let scene = tmp.path().join("scene.json");
    fs::write(&scene, SCENE).expect("write scene");

    let out = run_ok(&["render", scene.to_string_lossy().as_ref()], None);
    assert_eq!(out["scale"], json!(1.0));
    assert_eq!(state(&out, "a")["label"], "A");
    assert_eq!(state(&out, "b")["style"]["shape"], "ellipse");
    assert_eq!(
        state(&out, "e")["absolutePoints"],
        json!([[40.0, 20.0], [100.0, 20.0]])
    );
}

#[test]
fn cli_applies_scale_and_translate() {
    let out = run_ok(
        &["--scale", "2", "--translate", "10,0", "--pretty", "-"],
        Some(SCENE),
    );
    assert_eq!(out["scale"], json!(2.0));
    assert_eq!(out["translate"], json!([10.0, 0.0]));
    assert_eq!(
        state(&out, "e")["absolutePoints"],
        json!([[100.0, 40.0], [220.0, 40.0]])
    );
}

#[test]
fn cli_prints_the_model_tree() {
    let out = run_ok(&["tree"], Some(SCENE));
    assert_eq!(out["id"], "0");
    let layer = &out["children"][0];
    assert_eq!(layer["id"], "1");
    let ids: Vec<&str> = layer["children"]
        .as_array()
        .expect("layer children")
        .iter()
        .filter_map(|c| c["id"].as_str())
        .collect();
    assert_eq!(ids, ["a", "e", "b"]);
    let edge = &layer["children"][1];
    assert_eq!(edge["kind"], "edge");
    assert_eq!(edge["source"], "a");
    assert_eq!(edge["target"], "b");
}

#[test]
fn cli_resolves_references_after_generated_ids_collide() {
    // The unnamed vertex is given id "2" before the explicit "2" is added.
    let scene = r#"{
      "cells": [
        { "vertex": true, "width": 10, "height": 10, "value": "first" },
        { "id": "2", "vertex": true, "x": 50, "width": 10, "height": 10, "value": "second" },
        { "id": "3", "vertex": true, "x": 100, "width": 10, "height": 10, "value": "third" },
        { "edge": true, "source": "3", "target": "2", "value": "link" }
      ]
    }"#;
    let out = run_ok(&["tree"], Some(scene));
    let children = out["children"][0]["children"]
        .as_array()
        .expect("layer children");
    let by_value = |value: &str| {
        children
            .iter()
            .find(|c| c["value"] == value)
            .unwrap_or_else(|| panic!("no cell {value}"))
    };
    let edge = by_value("link");
    assert_eq!(edge["source"], by_value("third")["id"]);
    assert_eq!(edge["target"], by_value("second")["id"]);
    assert_ne!(edge["target"], by_value("first")["id"]);
}

#[test]
fn cli_config_file_overrides_the_stylesheet() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("config.json");
    fs::write(
        &config,
        r##"{ "stylesheet": { "defaultVertex": { "fillColor": "#000000" } } }"##,
    )
    .expect("write config");

    let out = run_ok(
        &["render", "--config", config.to_string_lossy().as_ref()],
        Some(SCENE),
    );
    assert_eq!(state(&out, "a")["style"]["fillColor"], "#000000");
}

#[test]
fn cli_rejects_bad_usage_with_status_2() {
    let exe = assert_cmd::cargo_bin!("narwhal-cli");
    Command::new(&exe)
        .args(["render", "--scale", "0"])
        .assert()
        .code(2);
    Command::new(&exe).args(["--bogus"]).assert().code(2);
}

#[test]
fn cli_reports_scene_errors() {
    let exe = assert_cmd::cargo_bin!("narwhal-cli");
    let scene = r#"{ "cells": [ { "id": "c", "vertex": true, "parent": "g" } ] }"#;
    let output = assert_cmd::Command::new(exe)
        .write_stdin(scene)
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("invalid scene"), "stderr: {stderr}");
}
