use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pulse_monitor"))
}

fn recording_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("recordings")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn replay_args(expect: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "replay".to_string(),
        "--recording".to_string(),
        recording_file("resting_75bpm.txt"),
        "--profile".to_string(),
        recording_file("profile.json"),
        "--start".to_string(),
        "2025-03-01T07:30:00Z".to_string(),
    ];
    if let Some(expect) = expect {
        args.push("--expect-pulses".to_string());
        args.push(expect.to_string());
    }
    args
}

#[test]
fn replay_recording_prints_summary() {
    let output = cli()
        .args(replay_args(Some("38")))
        .output()
        .expect("failed to run pulse_monitor replay");
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("replay report JSON payload");
    assert_eq!(json["pulses"], 38);
    assert_eq!(json["counters"]["samples_rejected"], 2);

    let summary = &json["summary"];
    assert_eq!(summary["total_pulses"], 38);
    assert_eq!(summary["started_at"], "2025-03-01T07:30:00Z");
    let average = summary["average_rate"].as_f64().unwrap_or_default();
    assert!((70.0..80.0).contains(&average), "average rate {average}");
}

#[test]
fn replay_detects_pulse_count_mismatch() {
    let output = cli()
        .args(replay_args(Some("40")))
        .output()
        .expect("failed to run mismatch replay");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("expected 40, detected 38"),
        "expected mismatch in stderr, got {stderr}"
    );
}

#[test]
fn replay_missing_recording_fails() {
    let output = cli()
        .args([
            "replay",
            "--recording",
            "/nonexistent/recording.txt",
            "--profile",
            &recording_file("profile.json"),
        ])
        .output()
        .expect("failed to run replay");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn sessions_listing_on_empty_store() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = dir.path().join("sessions");
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        serde_json::json!({ "storage": { "directory": store } }).to_string(),
    )
    .expect("write config");

    let output = cli()
        .args(["sessions", "--config"])
        .arg(&config)
        .output()
        .expect("failed to run sessions");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(stdout.starts_with("No sessions under"), "got {stdout}");

    let output = cli()
        .args(["sessions", "--day", "2025-03-01", "--config"])
        .arg(&config)
        .output()
        .expect("failed to run sessions for a day");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}
