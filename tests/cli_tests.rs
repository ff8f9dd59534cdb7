//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn takelog_bin(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("takelog").expect("binary under test");
    cmd.env("TAKELOG_DATA_DIR", data_dir.path());
    // Keep the config file out of the real home directory
    cmd.env("XDG_CONFIG_HOME", data_dir.path().join("config"));
    cmd
}

/// Id of the only session in the listing
fn sole_session_id(dir: &TempDir) -> String {
    let output = takelog_bin(dir).arg("sessions").output().expect("sessions");
    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .next()
        .expect("empty listing")
        .to_string()
}

#[test]
fn help_output() {
    let dir = TempDir::new().expect("temp dir");
    takelog_bin(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("record")
                .and(predicate::str::contains("sessions"))
                .and(predicate::str::contains("retranscribe"))
                .and(predicate::str::contains("export")),
        );
}

#[test]
fn version_output() {
    let dir = TempDir::new().expect("temp dir");
    takelog_bin(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("takelog")
                .and(predicate::str::contains(env!("CARGO_PKG_VERSION"))),
        );
}

#[test]
fn add_then_sessions_then_show() {
    let dir = TempDir::new().expect("temp dir");

    takelog_bin(&dir)
        .args(["add", "hello", "from", "the", "first", "take"])
        .assert()
        .success();

    takelog_bin(&dir)
        .arg("sessions")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 takes"));

    let session_id = sole_session_id(&dir);
    takelog_bin(&dir)
        .args(["show", &session_id])
        .assert()
        .success()
        .stdout(predicate::str::diff("hello from the first take\n"));
}

#[test]
fn add_to_named_session_keeps_order() {
    let dir = TempDir::new().expect("temp dir");

    takelog_bin(&dir).args(["add", "first"]).assert().success();
    let session_id = sole_session_id(&dir);

    takelog_bin(&dir)
        .args(["add", "--session", &session_id, "second"])
        .assert()
        .success();

    takelog_bin(&dir)
        .args(["show", &session_id])
        .assert()
        .success()
        .stdout(predicate::str::diff("first\n\nsecond\n"));
}

#[test]
fn show_unknown_session_fails() {
    let dir = TempDir::new().expect("temp dir");
    takelog_bin(&dir)
        .args(["show", "20200101_000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown session"));
}

#[test]
fn rename_shows_in_listing() {
    let dir = TempDir::new().expect("temp dir");

    takelog_bin(&dir).args(["add", "note"]).assert().success();
    let session_id = sole_session_id(&dir);

    takelog_bin(&dir)
        .args(["rename", &session_id, "standup notes"])
        .assert()
        .success();

    takelog_bin(&dir)
        .arg("sessions")
        .assert()
        .success()
        .stdout(predicate::str::contains("standup notes"));

    // Filtering by the new name finds it, a miss finds nothing
    takelog_bin(&dir)
        .args(["sessions", "--filter", "standup"])
        .assert()
        .success()
        .stdout(predicate::str::contains(session_id.clone()));
    takelog_bin(&dir)
        .args(["sessions", "--filter", "nonexistent"])
        .assert()
        .success()
        .stdout(predicate::str::contains(session_id).not());
}

#[test]
fn export_writes_transcript_file() {
    let dir = TempDir::new().expect("temp dir");

    takelog_bin(&dir)
        .args(["add", "exported", "text"])
        .assert()
        .success();
    let session_id = sole_session_id(&dir);

    let out_path = dir.path().join("export.txt");
    takelog_bin(&dir)
        .args(["export", &session_id])
        .arg(&out_path)
        .assert()
        .success();

    let content = std::fs::read_to_string(&out_path).expect("export file missing");
    assert_eq!(content, "exported text\n");
}

#[test]
fn retranscribe_without_sessions_fails() {
    let dir = TempDir::new().expect("temp dir");
    takelog_bin(&dir)
        .args(["retranscribe", "--transcribe-command", "cat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no sessions"));
}

#[test]
fn config_rejects_unknown_key() {
    let dir = TempDir::new().expect("temp dir");
    takelog_bin(&dir)
        .args(["config", "set", "bogus_key", "value"])
        .assert()
        .failure();
}

#[test]
fn config_set_then_get_roundtrip() {
    let dir = TempDir::new().expect("temp dir");

    takelog_bin(&dir)
        .args(["config", "set", "transcribe_command", "whisper-cli"])
        .assert()
        .success();

    takelog_bin(&dir)
        .args(["config", "get", "transcribe_command"])
        .assert()
        .success()
        .stdout(predicate::str::contains("whisper-cli"));
}
