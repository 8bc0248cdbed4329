use std::path::Path;

use assert_cmd::Command;
use headtrack::synthetic::{blob_frame, corner_blob_centers};
use predicates::prelude::*;
use tempfile::tempdir;

const W: u32 = 120;
const H: u32 = 90;

fn write_frames(dir: &Path) {
    let blobs = corner_blob_centers(W, H, 14.0);
    blob_frame(W, H, &blobs, 3.0)
        .save(dir.join("frame_000.png"))
        .expect("write frame");
    blob_frame(W, H, &blobs[..3], 3.0)
        .save(dir.join("frame_001.png"))
        .expect("write frame");
}

fn headtrack() -> Command {
    Command::cargo_bin("headtrack").expect("binary")
}

#[test]
fn reports_every_frame_of_a_directory() {
    let tmp = tempdir().unwrap();
    let frames = tmp.path().join("frames");
    std::fs::create_dir(&frames).unwrap();
    write_frames(&frames);
    std::fs::write(frames.join("notes.txt"), "not a frame").unwrap();
    let report_path = tmp.path().join("report.json");

    headtrack()
        .arg(&frames)
        .arg("--output")
        .arg(&report_path)
        .arg("--log-level")
        .arg("off")
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["width"], W);
    assert_eq!(report["height"], H);
    let frames = report["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["marker_status"]["state"], "fresh");
    assert_eq!(frames[0]["transform_status"]["state"], "updated");
    assert_eq!(frames[1]["marker_status"]["state"], "reused");
    assert_eq!(frames[1]["marker_status"]["kind"], "too_few");
    assert_eq!(frames[1]["marker_status"]["found"], 3);
}

#[test]
fn saves_binary_masks_and_warps() {
    let tmp = tempdir().unwrap();
    write_frames(tmp.path());
    let out_dir = tmp.path().join("out");

    headtrack()
        .arg(tmp.path().join("frame_000.png"))
        .args(["--binary", "--warp", "--bijective", "--log-level", "off"])
        .arg("--save-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"bijective\""))
        .stdout(predicate::str::contains("warp_0000.png"));

    let mask = image::open(out_dir.join("frame_0000.png")).unwrap().to_luma8();
    assert_eq!(mask.dimensions(), (W, H));
    assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
    assert!(out_dir.join("warp_0000.png").is_file());
}

#[test]
fn config_file_is_applied_and_flags_override_it() {
    let tmp = tempdir().unwrap();
    write_frames(tmp.path());
    let config = tmp.path().join("params.json");
    std::fs::write(
        &config,
        r#"{ "binarize": { "threshold": 250 }, "output": "binary" }"#,
    )
    .unwrap();

    // Threshold 250 hides every blob.
    headtrack()
        .arg(tmp.path().join("frame_000.png"))
        .arg("--config")
        .arg(&config)
        .args(["--log-level", "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"threshold\": 250"))
        .stdout(predicate::str::contains("\"too_few\""));

    headtrack()
        .arg(tmp.path().join("frame_000.png"))
        .arg("--config")
        .arg(&config)
        .args(["--threshold", "40", "--log-level", "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dilate_iterations\": 8"))
        .stdout(predicate::str::contains("\"fresh\""));
}

#[test]
fn missing_frame_fails() {
    let tmp = tempdir().unwrap();
    headtrack()
        .arg(tmp.path().join("missing.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn empty_directory_has_no_frames() {
    let tmp = tempdir().unwrap();
    headtrack()
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no image files found"));
}

#[test]
fn unknown_log_level_falls_back_to_info() {
    let tmp = tempdir().unwrap();
    write_frames(tmp.path());
    headtrack()
        .arg(tmp.path().join("frame_001.png"))
        .args(["--log-level", "chatty"])
        .assert()
        .success()
        .stderr(predicate::str::contains("WARN"))
        .stdout(predicate::str::contains("\"too_few\""));
}

#[test]
fn warp_requires_save_dir() {
    headtrack().args(["frame.png", "--warp"]).assert().failure();
}
