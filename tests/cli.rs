mod common;

use std::fs;
use std::net::TcpListener;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// The binary with no backend settings inherited from the environment.
fn moonlabel() -> Command {
    let mut cmd = Command::cargo_bin("moonlabel").unwrap();
    for var in [
        "MOONLABEL_MODE",
        "MOONLABEL_API_KEY",
        "MOONLABEL_STATION_ENDPOINT",
        "MOONLABEL_TIMEOUT_SECS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// An endpoint nothing listens on.
fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/v1")
}

fn write_detection_manifest(dir: &Path) -> std::path::PathBuf {
    common::write_bmp(&dir.join("imgs/a.bmp"), 20, 10);
    common::write_bmp(&dir.join("imgs/b.bmp"), 8, 8);
    let manifest = dir.join("batch.json");
    fs::write(
        &manifest,
        r#"{
  "kind": "detections",
  "images": [
    { "file": "imgs/a.bmp",
      "detections": [
        { "label": "cat", "x_center": 0.5, "y_center": 0.5, "width": 0.2, "height": 0.4 },
        { "label": "dog", "x_center": 0.25, "y_center": 0.5, "width": 0.5, "height": 1.0 }
      ] },
    { "file": "imgs/b.bmp",
      "detections": [
        { "label": "dog", "x_center": 0.5, "y_center": 0.5, "width": 1.0, "height": 1.0 }
      ] }
  ]
}"#,
    )
    .expect("write manifest");
    manifest
}

fn write_caption_manifest(dir: &Path) -> std::path::PathBuf {
    common::write_bmp(&dir.join("a.bmp"), 4, 4);
    let manifest = dir.join("captions.json");
    fs::write(
        &manifest,
        r#"{ "kind": "captions", "images": [ { "file": "a.bmp", "caption": "A tiny square." } ] }"#,
    )
    .expect("write manifest");
    manifest
}

#[test]
fn runs() {
    moonlabel()
        .assert()
        .success()
        .stdout(predicate::str::contains("Run 'moonlabel --help'"));
}

#[test]
fn outputs_tool_name() {
    moonlabel()
        .arg("-V")
        .assert()
        .success()
        .stdout(format!("moonlabel {}\n", env!("CARGO_PKG_VERSION")));
}

// Export subcommand tests

#[test]
fn export_yolo_writes_archive() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_detection_manifest(temp.path());
    let output = temp.path().join("dataset.zip");

    moonlabel()
        .args(["export", "--format", "yolo", "--input"])
        .arg(&manifest)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 image(s) as yolo"))
        .stdout(predicate::str::contains("3 object(s), 2 label(s)"));

    let archive = fs::read(&output).expect("read archive");
    assert_eq!(
        common::entry_text(&archive, "labels/a.txt"),
        "0 0.5 0.5 0.2 0.4\n1 0.25 0.5 0.5 1\n"
    );
    assert_eq!(common::entry_text(&archive, "labels/b.txt"), "1 0.5 0.5 1 1\n");
}

#[test]
fn export_voc_and_coco_write_archives() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_detection_manifest(temp.path());

    for format in ["voc", "coco"] {
        let output = temp.path().join(format!("{format}.zip"));
        moonlabel()
            .args(["export", "--format", format, "--input"])
            .arg(&manifest)
            .arg("--output")
            .arg(&output)
            .assert()
            .success();
        assert!(output.is_file(), "{format} archive missing");
    }
}

#[test]
fn export_rejects_mismatched_format() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_caption_manifest(temp.path());

    moonlabel()
        .args(["export", "--format", "coco", "--input"])
        .arg(&manifest)
        .arg("--output")
        .arg(temp.path().join("out.zip"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be exported from a batch of captions"));
}

#[test]
fn export_captions_without_backend() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_caption_manifest(temp.path());
    let output = temp.path().join("captions.zip");

    moonlabel()
        .args(["export", "--format", "caption", "--input"])
        .arg(&manifest)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let archive = fs::read(&output).expect("read archive");
    assert_eq!(common::entry_text(&archive, "captions/a.txt"), "A tiny square.");
}

#[test]
fn regenerating_captions_in_local_mode_fails() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_caption_manifest(temp.path());

    moonlabel()
        .args(["export", "--format", "caption", "--regenerate-captions", "--mode", "local"])
        .arg("--input")
        .arg(&manifest)
        .arg("--output")
        .arg(temp.path().join("out.zip"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backend unavailable"));
}

#[test]
fn export_missing_manifest_fails() {
    moonlabel()
        .args([
            "export",
            "--format",
            "yolo",
            "--input",
            "nonexistent_manifest.json",
            "--output",
            "unused.zip",
        ])
        .assert()
        .failure();
}

// Lines subcommand tests

#[test]
fn lines_prints_every_yolo_line() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_detection_manifest(temp.path());

    moonlabel()
        .args(["lines", "--input"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout("0 0.5 0.5 0.2 0.4\n1 0.25 0.5 0.5 1\n1 0.5 0.5 1 1\n");
}

#[test]
fn lines_rejects_caption_manifest() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_caption_manifest(temp.path());

    moonlabel()
        .args(["lines", "--input"])
        .arg(&manifest)
        .assert()
        .failure();
}

// Inspect subcommand tests

#[test]
fn inspect_reports_exported_archive() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let manifest = write_detection_manifest(temp.path());
    let output = temp.path().join("dataset.zip");

    moonlabel()
        .args(["export", "--format", "voc", "--input"])
        .arg(&manifest)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    moonlabel()
        .arg("inspect")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format:           voc"))
        .stdout(predicate::str::contains("Labels (2):"));

    moonlabel()
        .arg("inspect")
        .arg(&output)
        .args(["--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"format\": \"voc\""))
        .stdout(predicate::str::contains("\"objects\": 3"));
}

#[test]
fn inspect_rejects_non_archives() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("not.zip");
    fs::write(&path, "plain text").expect("write file");

    moonlabel()
        .arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read archive"));
}

// Detect and caption subcommand tests

#[test]
fn detect_requires_label_terms() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_bmp(&temp.path().join("a.bmp"), 4, 4);

    moonlabel()
        .args(["detect", "--labels", " , ", "--output"])
        .arg(temp.path().join("out.json"))
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No label terms given"));
}

#[test]
fn detect_cloud_mode_requires_api_key() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_bmp(&temp.path().join("a.bmp"), 4, 4);

    moonlabel()
        .args(["detect", "--labels", "cat", "--output"])
        .arg(temp.path().join("out.json"))
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires an API key"));
}

#[test]
fn detect_finds_no_images_in_empty_directory() {
    let temp = tempfile::tempdir().expect("create temp dir");
    fs::write(temp.path().join("notes.txt"), "not an image").expect("write file");

    moonlabel()
        .args(["detect", "--labels", "cat", "--mode", "station", "--output"])
        .arg(temp.path().join("out.json"))
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No images found"));
}

#[test]
fn detect_against_unreachable_station_fails_every_image() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_bmp(&temp.path().join("imgs/a.bmp"), 4, 4);
    let output = temp.path().join("out.json");

    moonlabel()
        .args(["-q", "detect", "--labels", "cat", "--mode", "station"])
        .arg("--station-endpoint")
        .arg(closed_endpoint())
        .arg("--output")
        .arg(&output)
        .arg(temp.path().join("imgs"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Detection failed for all 1 image(s)"));

    assert!(!output.exists());
}

#[test]
fn caption_against_unreachable_station_keeps_empty_captions() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_bmp(&temp.path().join("a.bmp"), 4, 4);
    let output = temp.path().join("captions.json");

    moonlabel()
        .args(["-q", "caption", "--mode", "station"])
        .arg("--station-endpoint")
        .arg(closed_endpoint())
        .arg("--output")
        .arg(&output)
        .arg(temp.path().join("a.bmp"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Captioned 1 image(s) (1 empty)"));

    let manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(&output).expect("read manifest")).expect("parse");
    assert_eq!(manifest["kind"], "captions");
    assert_eq!(manifest["images"][0]["caption"], "");
}
