use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;

use inplacer_core::{EngineConfig, EngineError, TEMP_SUFFIX, TransformParams};
use inplacer_scan::{DirectoryLedger, EligibilityRules, TaskCollector};
use tempfile::TempDir;

const LEDGER: &str = ".inplacer_webp_done.txt";
const DIR_LOG: &str = ".inplacer_webp.log";

fn webp_rules() -> EligibilityRules {
    EligibilityRules {
        extensions: ["jpg", "jpeg", "png", "bmp", "webp"]
            .iter()
            .map(|e| e.to_string())
            .collect(),
        output_extension: Some("webp".into()),
        ledger_file_name: LEDGER.into(),
        dir_log_file_name: DIR_LOG.into(),
    }
}

fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::create_dir(root.join("empty")).unwrap();
    fs::create_dir(root.join("docs")).unwrap();

    fs::write(root.join("top.jpg"), "x").unwrap();
    fs::write(root.join("a/one.png"), "x").unwrap();
    fs::write(root.join("a/two.BMP"), "x").unwrap();
    fs::write(root.join("a/already.webp"), "x").unwrap();
    fs::write(root.join(format!("a/one.png{TEMP_SUFFIX}")), "x").unwrap();
    fs::write(root.join("a/b/deep.jpeg"), "x").unwrap();
    fs::write(root.join("a/b").join(LEDGER), "other.jpg\n").unwrap();
    fs::write(root.join("a/b").join(DIR_LOG), "log").unwrap();
    fs::write(root.join("docs/readme.txt"), "x").unwrap();

    temp
}

#[test]
fn test_collects_only_eligible_files() {
    let temp = create_test_tree();
    let config = EngineConfig::new(temp.path());
    let collector = TaskCollector::new(&config, webp_rules(), TransformParams::default()).unwrap();

    let names: HashSet<String> = collector
        .tasks()
        .map(|t| t.file_name().to_string())
        .collect();

    let expected: HashSet<String> = ["top.jpg", "one.png", "two.BMP", "deep.jpeg"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, expected);
}

#[test]
fn test_one_ledger_per_directory() {
    let temp = create_test_tree();
    let config = EngineConfig::new(temp.path());
    let collector = TaskCollector::new(&config, webp_rules(), TransformParams::default()).unwrap();

    let collected: Vec<_> = collector.tasks().collect();

    // root, a and a/b hold eligible files; docs and empty do not
    assert_eq!(collector.walk_stats().directories(), 3);

    let in_a: Vec<_> = collected
        .iter()
        .filter(|t| t.directory().ends_with("a"))
        .collect();
    assert_eq!(in_a.len(), 2);
    assert!(Arc::ptr_eq(in_a[0].ledger_handle(), in_a[1].ledger_handle()));

    let deep = collected
        .iter()
        .find(|t| t.file_name() == "deep.jpeg")
        .unwrap();
    assert!(deep.ledger().contains("other.jpg"));
    assert!(deep.source().is_absolute());
}

#[test]
fn test_root_must_be_directory() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("file.jpg");
    fs::write(&file, "x").unwrap();

    let err = TaskCollector::new(&EngineConfig::new(&file), webp_rules(), TransformParams::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::NotADirectory { .. }));

    let err = TaskCollector::new(
        &EngineConfig::new(temp.path().join("missing")),
        webp_rules(),
        TransformParams::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[cfg(unix)]
#[test]
fn test_unreadable_ledger_fails_open() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.jpg"), "x").unwrap();
    // A directory in place of the ledger file cannot be read as a file.
    fs::create_dir(temp.path().join(LEDGER)).unwrap();

    let config = EngineConfig::new(temp.path());
    let collector = TaskCollector::new(&config, webp_rules(), TransformParams::default()).unwrap();
    let collected: Vec<_> = collector.tasks().collect();

    assert_eq!(collected.len(), 1);
    assert!(collected[0].ledger().is_empty());
    assert_eq!(collector.walk_stats().ledger_warnings(), 1);
    assert_eq!(collector.walk_stats().walk_errors(), 0);
}

#[test]
fn test_concurrent_records_produce_whole_lines() {
    const WORKERS: usize = 16;
    const PER_WORKER: usize = 50;

    let temp = TempDir::new().unwrap();
    let ledger = Arc::new(DirectoryLedger::load(temp.path(), LEDGER).unwrap());

    let handles: Vec<_> = (0..WORKERS)
        .map(|w| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for i in 0..PER_WORKER {
                    ledger.record(&format!("worker{w}_file{i}.jpg")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let content = fs::read_to_string(temp.path().join(LEDGER)).unwrap();
    assert!(content.ends_with('\n'));
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), WORKERS * PER_WORKER);

    let unique: HashSet<&str> = lines.iter().copied().collect();
    assert_eq!(unique.len(), WORKERS * PER_WORKER);
    for line in &lines {
        assert!(line.starts_with("worker") && line.ends_with(".jpg"), "partial line: {line}");
    }
    assert_eq!(ledger.len(), WORKERS * PER_WORKER);
}
