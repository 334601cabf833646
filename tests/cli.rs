use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn mindflow(data_dir: &std::path::Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("mindflow")?;
    cmd.env("MINDFLOW_DATA_DIR", data_dir);
    Ok(cmd)
}

#[test]
fn new_creates_a_titled_map() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;

    mindflow(tmp.path())?
        .args(["new", "--yes", "--title", "Road Map"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created 'Road Map'"));

    let saved = fs::read_to_string(tmp.path().join("mindflow_last_map.json"))?;
    let json: serde_json::Value = serde_json::from_str(&saved)?;
    assert_eq!(json["title"], "Road Map");
    assert_eq!(json["nodes"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[test]
fn renders_saved_map_to_svg() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let output_path = tmp.path().join("map.svg");

    mindflow(tmp.path())?
        .args(["new", "--yes", "--title", "Render Me"])
        .assert()
        .success();

    mindflow(tmp.path())?
        .arg("render")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated mind map"));

    let svg_contents = fs::read_to_string(&output_path)?;
    assert!(
        svg_contents.contains("<svg"),
        "output should contain an <svg> element"
    );
    assert!(svg_contents.contains("Central Idea"));

    Ok(())
}

#[test]
fn exports_json_to_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;

    let output = mindflow(tmp.path())?
        .args(["export", "--format", "json", "--output", "-"])
        .output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["title"], "My First Mind Map");
    assert!(json["nodes"][0]["isRoot"].as_bool().unwrap_or(false));

    Ok(())
}

#[test]
fn png_export_is_reported_as_unavailable() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;

    mindflow(tmp.path())?
        .args(["export", "-f", "png", "-o", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not available"));

    Ok(())
}

#[test]
fn edit_session_adds_and_saves_a_child() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;

    mindflow(tmp.path())?
        .arg("edit")
        .write_stdin("select 1\nadd-child\nsave\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mind map saved"))
        .stdout(predicate::str::contains("New Node #2"));

    let saved = fs::read_to_string(tmp.path().join("mindflow_last_map.json"))?;
    assert!(saved.contains("New Node"));

    Ok(())
}
