use std::process::Command;

use tempfile::TempDir;

fn inplacer() -> Command {
    Command::new(env!("CARGO_BIN_EXE_inplacer"))
}

#[test]
fn test_missing_root_exits_with_fatal_code() {
    let temp = TempDir::new().unwrap();
    let output = inplacer()
        .arg(temp.path().join("does-not-exist"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_file_root_exits_with_fatal_code() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("photo.jpg");
    std::fs::write(&file, b"x").unwrap();

    let output = inplacer().arg(&file).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_json_summary_for_unreadable_images() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("broken.png"), b"not a png").unwrap();
    std::fs::write(temp.path().join("notes.txt"), b"ignored").unwrap();

    let output = inplacer()
        .arg(temp.path())
        .args(["--mode", "webp", "--format", "json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mode"], "webp");
    assert_eq!(report["statistics"]["error_count"], 1);
    assert_eq!(report["statistics"]["processed_count"], 0);
    assert_eq!(report["ledger_file_name"], ".inplacer_webp_done.txt");
    // The original is untouched after a failed transform.
    assert_eq!(std::fs::read(temp.path().join("broken.png")).unwrap(), b"not a png");
}

#[test]
fn test_global_log_is_written_and_reported() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("photos");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(root.join("broken.png"), b"not a png").unwrap();
    let log_dir = temp.path().join("logs");

    let output = inplacer()
        .arg(&root)
        .arg("--log-dir")
        .arg(&log_dir)
        .args(["--format", "json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let global_log = std::path::PathBuf::from(report["global_log"].as_str().unwrap());
    assert!(global_log.starts_with(&log_dir));

    let content = std::fs::read_to_string(&global_log).unwrap();
    assert!(content.contains("DEBUG"), "{content}");
    assert!(content.contains("Starting worker pool"), "{content}");

    let text = inplacer()
        .arg(&root)
        .arg("--log-dir")
        .arg(&log_dir)
        .output()
        .unwrap();
    let stdout = String::from_utf8(text.stdout).unwrap();
    assert!(stdout.contains(" Global log:"), "{stdout}");
}
