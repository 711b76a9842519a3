use std::fs;
use std::time::Duration;

use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn relay_cli() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("relay-cli");
    cmd.timeout(Duration::from_secs(5)).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn replay_captures_extracted_records() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let payloads = temp_dir.path().join("payloads.txt");
    let capture = temp_dir.path().join("out/capture.jsonl");
    fs::write(
        &payloads,
        concat!(
            r#"{"type":"PayloadS3Pointer","s3BucketName":"reports-bucket","s3Key":"out/123.pdf"}"#,
            "\n\n",
            r#"{"reportName":"Q3 Summary","reportResultXml":null}"#,
            "\n",
            "heartbeat\n",
        ),
    )
    .expect("write payloads");

    relay_cli()
        .args(["replay", "--payload-file"])
        .arg(&payloads)
        .arg("--capture")
        .arg(&capture)
        .assert()
        .success()
        .stdout(contains("Delivered 3 messages"));

    let raw = fs::read_to_string(&capture).expect("read capture");
    let records = raw
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("json line"))
        .collect::<Vec<_>>();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["type"], "s3Pointer");
    assert_eq!(records[0]["key"], "out/123.pdf");
    assert_eq!(records[1]["type"], "reportResponse");
    assert!(records[1]["reportResultXml"].is_null());
}

#[test]
fn extract_scrapes_relay_log_lines() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let relay_log = temp_dir.path().join("BlueprintRelay.log");
    let out = temp_dir.path().join("scraped/pointers.jsonl");
    fs::write(
        &relay_log,
        concat!(
            "12:00:01 onMessage args=[\"{\\\"type\\\":\\\"PayloadS3Pointer\\\",\\\"s3BucketName\\\":\\\"b\\\",\\\"s3Key\\\":\\\"k1\\\"}\"]\n",
            "12:00:02 unrelated line\n",
            "12:00:03 onMessage args=[\"{\\\"reportName\\\":\\\"Daily\\\"}\"]\n",
        ),
    )
    .expect("write log");

    relay_cli()
        .args(["extract", "--relay-log"])
        .arg(&relay_log)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Wrote 2 entries"));

    let raw = fs::read_to_string(&out).expect("read out");
    let lines = raw.lines().collect::<Vec<_>>();
    assert_eq!(
        lines,
        vec![
            r#"{"type":"s3Pointer","bucket":"b","key":"k1"}"#,
            r#"{"type":"reportResponse","reportName":"Daily","reportResultXml":null}"#,
        ]
    );
}

#[test]
fn extract_keeps_every_pointer_on_a_line() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let relay_log = temp_dir.path().join("BlueprintRelay.log");
    let out = temp_dir.path().join("pointers.jsonl");
    fs::write(
        &relay_log,
        concat!(
            r#"batch=[{"s3BucketName":"b","s3Key":"k1"},{"s3BucketName":"b","s3Key":"k2"}]"#,
            "\n",
        ),
    )
    .expect("write log");

    relay_cli()
        .args(["extract", "--relay-log"])
        .arg(&relay_log)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Wrote 2 entries"));

    let raw = fs::read_to_string(&out).expect("read out");
    assert_eq!(
        raw.lines().collect::<Vec<_>>(),
        vec![
            r#"{"type":"s3Pointer","bucket":"b","key":"k1"}"#,
            r#"{"type":"s3Pointer","bucket":"b","key":"k2"}"#,
        ]
    );
}

#[test]
fn uncreatable_capture_directory_falls_back_and_warns() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, "regular file").expect("write blocker");
    let payloads = temp_dir.path().join("payloads.txt");
    fs::write(&payloads, "{\"reportName\":\"Fallback\"}\n").expect("write payloads");

    relay_cli()
        .current_dir(temp_dir.path())
        .args(["replay", "--payload-file"])
        .arg(&payloads)
        .arg("--capture")
        .arg(blocker.join("sub/capture.jsonl"))
        .assert()
        .success()
        .stdout(contains("Delivered 1 messages"))
        .stderr(contains("using working directory"));

    let fallback = temp_dir.path().join("BlueprintRelayReports.jsonl");
    let raw = fs::read_to_string(&fallback).expect("read fallback capture");
    let lines = raw.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 1);
    let record: Value = serde_json::from_str(lines[0]).expect("json line");
    assert_eq!(record["reportName"], "Fallback");
}

#[test]
fn extract_missing_log_writes_nothing() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let out = temp_dir.path().join("empty.jsonl");

    relay_cli()
        .args(["extract", "--relay-log"])
        .arg(temp_dir.path().join("absent.log"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Wrote 0 entries"));
    assert_eq!(fs::read_to_string(&out).expect("read out"), "");
}

#[test]
fn pointers_lists_unique_s3_locations() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let capture = temp_dir.path().join("capture.jsonl");
    fs::write(
        &capture,
        concat!(
            r#"{"timestamp":"2026-10-15T09:41:07.123+0000","type":"s3Pointer","bucket":"b","key":"a.pdf"}"#,
            "\n",
            r#"{"timestamp":"2026-10-15T09:41:08.123+0000","type":"s3Pointer","bucket":"b","key":"a.pdf"}"#,
            "\n",
            "{broken\n",
            r#"{"timestamp":"2026-10-15T09:41:09.123+0000","type":"s3Pointer","bucket":"c","key":"b.pdf"}"#,
            "\n",
        ),
    )
    .expect("write capture");

    let output = relay_cli()
        .args(["pointers", "--capture-file"])
        .arg(&capture)
        .output()
        .expect("run pointers");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert_eq!(stdout, "s3://b/a.pdf\ns3://c/b.pdf\n");
}

#[test]
fn config_file_supplies_capture_path() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let capture = temp_dir.path().join("from-config.jsonl");
    let config = temp_dir.path().join("relay.yaml");
    fs::write(
        &config,
        format!("capture_path: {}\nlog_filter: warn\n", capture.display()),
    )
    .expect("write config");
    let payloads = temp_dir.path().join("payloads.txt");
    fs::write(&payloads, "{\"reportName\":\"From Config\"}\n").expect("write payloads");

    relay_cli()
        .args(["replay", "--config"])
        .arg(&config)
        .arg("--payload-file")
        .arg(&payloads)
        .assert()
        .success()
        .stdout(contains("Delivered 1 messages"))
        .stdout(contains("from-config.jsonl"));

    assert!(fs::read_to_string(&capture)
        .expect("read capture")
        .contains(r#""reportName":"From Config""#));
}

#[test]
fn missing_config_file_fails() {
    let temp_dir = TempDir::new().expect("create temp dir");
    relay_cli()
        .args(["pointers", "--config"])
        .arg(temp_dir.path().join("nope.yaml"))
        .assert()
        .failure();
}
