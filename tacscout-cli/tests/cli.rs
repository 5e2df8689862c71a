use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::process::Command;

use twox_hash::XxHash64;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "tacscout-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn write_series(root: &Path, id: &str, events: &[&str], end_state: &str) {
    let dir = root.join(id).join("events");
    fs::create_dir_all(&dir).expect("series dir");
    fs::write(dir.join("events.jsonl"), events.join("\n")).expect("write events");
    fs::write(root.join(id).join("end_state.json"), end_state).expect("write end state");
}

fn seeded_cache(label: &str) -> PathBuf {
    let root = temp_path(label);
    write_series(
        &root,
        "2801",
        &[
            r#"{"event_type": "kill", "round_number": 1, "timestamp": 1, "killer": "P1", "victim": "P2"}"#,
            r#"{"event_type": "kill", "round_number": 1, "timestamp": 2, "killer": "P2", "victim": "P3"}"#,
            r#"{"event_type": "plant", "round_number": 1, "site": "A"}"#,
            r#"{"event_type": "plant", "round_number": 2, "site": "B"}"#,
        ],
        r#"{"maps": [{"name": "Bind", "teams": [
            {"name": "Alpha", "players": [{"agent": "Jett"}, {"agent": "Sova"}]},
            {"name": "Bravo", "players": [{"agent": "Omen"}, {"agent": "Raze"}]}
        ]}]}"#,
    );
    fs::create_dir_all(root.join("2802")).expect("empty series dir");
    root
}

fn hash_file(path: &Path) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&fs::read(path).expect("read output"));
    hasher.finish()
}

#[test]
fn cli_writes_json_report_with_partial_results() {
    let exe = env!("CARGO_BIN_EXE_tacscout");
    let root = seeded_cache("json");
    let output_path = temp_path("json-out");
    let status = Command::new(exe)
        .args(["--series", "2801,2802", "--report", "json", "--data-dir"])
        .arg(&root)
        .arg("--output")
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());

    let content = fs::read_to_string(&output_path).expect("read output");
    let value: serde_json::Value = serde_json::from_str(&content).expect("json output");
    assert_eq!(value["series_analyzed"], serde_json::json!(["2801"]));
    assert_eq!(value["failures"][0]["series_id"], "2802");
    assert_eq!(value["maps_played"]["Bind"], 1);
    assert_eq!(value["opening_duels"]["P1"]["first_kills"], 1);
    assert_eq!(value["opening_duels"]["P2"]["net"], -1);
    assert_eq!(value["attack_site_preference"]["Bind"]["percentages"]["A"], 50.0);
    assert_eq!(value["comp_frequency"]["Bind"]["insufficient_data"], true);
}

#[test]
fn cli_assembles_series_with_a_single_artefact() {
    let exe = env!("CARGO_BIN_EXE_tacscout");
    let root = temp_path("single");
    let events_only = root.join("3001");
    fs::create_dir_all(&events_only).expect("events-only dir");
    fs::write(
        events_only.join("events.jsonl"),
        r#"{"event_type": "plant", "round_number": 1, "site": "B", "map": "Lotus"}"#,
    )
    .expect("write events");
    let end_only = root.join("3002");
    fs::create_dir_all(&end_only).expect("end-only dir");
    fs::write(end_only.join("end_state.json"), r#"{"maps": ["Split"]}"#).expect("write end");

    let output = Command::new(exe)
        .args(["--series", "3001,3002", "--report", "json", "--data-dir"])
        .arg(&root)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(value["series_analyzed"], serde_json::json!(["3001", "3002"]));
    assert_eq!(value["failures"], serde_json::json!([]));
    assert_eq!(value["maps_played"]["Lotus"], 1);
    assert_eq!(value["maps_played"]["Split"], 1);
}

#[test]
fn cli_markdown_report_is_deterministic() {
    let exe = env!("CARGO_BIN_EXE_tacscout");
    let root = seeded_cache("markdown");
    let first = temp_path("md-first");
    let second = temp_path("md-second");
    for path in [&first, &second] {
        let status = Command::new(exe)
            .args(["--series", "2801", "--report", "markdown", "--data-dir"])
            .arg(&root)
            .arg("--output")
            .arg(path)
            .status()
            .expect("run cli");
        assert!(status.success());
    }
    assert_eq!(hash_file(&first), hash_file(&second));
    let content = fs::read_to_string(&first).expect("read output");
    assert!(content.starts_with("# Tactical Scouting Report"));
    assert!(content.contains("| P1 | 1 | 0 | +1 |"));
}

#[test]
fn cli_fails_when_no_series_can_be_assembled() {
    let exe = env!("CARGO_BIN_EXE_tacscout");
    let root = temp_path("nothing");
    fs::create_dir_all(&root).expect("root");
    let output = Command::new(exe)
        .args(["--series", "9999", "--report", "json", "--data-dir"])
        .arg(&root)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"series_id\": \"9999\""));
}

#[test]
fn cli_lists_cached_series() {
    let exe = env!("CARGO_BIN_EXE_tacscout");
    let root = seeded_cache("list");
    let output_path = temp_path("list-out");
    let status = Command::new(exe)
        .arg("--list-series")
        .arg("--data-dir")
        .arg(&root)
        .arg("--output")
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = fs::read_to_string(output_path).expect("read output");
    assert_eq!(content, "Cached series:\n  2801\n  2802\n");
}

#[test]
fn cli_rejects_invalid_config() {
    let exe = env!("CARGO_BIN_EXE_tacscout");
    let config = temp_path("config");
    fs::write(&config, r#"{"report": {"duel_rows": 0}}"#).expect("write config");
    let output = Command::new(exe)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid config"));
}
