use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

const SCENARIO: &str = "--- quiz\nid=Q1\nreward=T7\n\n--- treasure\nid=T7\nname=Gold\n";
const LINKED: &str = "--- quiz\nid=Q1\nreward=T7\nreward_target=T7\nall_links=treasure:T7\n\n--- treasure\nid=T7\nname=Gold\n";

const CYCLIC_CATALOG: &str = r#"
[[kind]]
name = "a"
delimiter = "--- a"

[[kind]]
name = "b"
delimiter = "--- b"

[[relation]]
name = "to_b"
from = "a"
field = "b"
to = "b"

[[relation]]
name = "to_a"
from = "b"
field = "a"
to = "a"
"#;

#[allow(deprecated)]
fn linker() -> Command {
    let mut cmd = Command::cargo_bin("linker").expect("linker binary");
    cmd.env_remove("RUST_LOG").env_remove("LINKER_CATALOG");
    cmd
}

fn write(path: &Path, text: &str) {
    fs::write(path, text).expect("write fixture");
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read back")
}

#[test]
fn links_data_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(&data, SCENARIO);

    linker()
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 sections, 2 records, 1 links"));

    assert_eq!(read(&data), LINKED);
    assert!(!dir.path().join("data.txt.tmp").exists());
}

#[test]
fn default_data_path_is_relative_to_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("data.txt"), SCENARIO);

    linker().current_dir(dir.path()).assert().success();

    assert_eq!(read(&dir.path().join("data.txt")), LINKED);
}

#[test]
fn second_run_leaves_linked_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(&data, LINKED);

    linker()
        .arg("-d")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("(unchanged)"));

    assert_eq!(read(&data), LINKED);
}

#[test]
fn fast_and_naive_write_identical_files() {
    let text = "--- hub\nid=H\nentry=Q1, q2\n\n--- quiz\nid=Q1\nquest=Q2\n\nid=Q2\nreward=T1\n\n--- treasure\nid=T1\ndestination=M1\n\n--- map\nid=M1\n";
    let dir = tempfile::tempdir().unwrap();
    let naive = dir.path().join("naive.txt");
    let fast = dir.path().join("fast.txt");
    write(&naive, text);
    write(&fast, text);

    linker().arg("-d").arg(&naive).arg("--debug").assert().success();
    linker()
        .arg("-d")
        .arg(&fast)
        .arg("--debug")
        .arg("--fast")
        .assert()
        .success();

    let linked = read(&naive);
    assert_eq!(read(&fast), linked);
    assert!(linked.contains("entry_target=Q1,Q2\n"));
    assert!(linked.contains("debug_links="));
}

#[test]
fn dangling_reference_warns_and_succeeds() {
    let text = "--- quiz\nid=Q1\nreward=T9\n\n--- treasure\nid=T7\n";
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(&data, text);

    linker()
        .arg("-d")
        .arg(&data)
        .assert()
        .success()
        .stderr(predicate::str::contains("quiz:Q1 reward -> 'T9' not found"));

    assert_eq!(read(&data), text);
}

#[test]
fn dry_run_does_not_write() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(&data, SCENARIO);

    linker()
        .arg("-d")
        .arg(&data)
        .arg("--dry")
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    assert_eq!(read(&data), SCENARIO);
}

#[test]
fn output_flag_keeps_source_intact() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    let out = dir.path().join("linked.txt");
    write(&data, SCENARIO);

    linker()
        .arg("-d")
        .arg(&data)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    assert_eq!(read(&data), SCENARIO);
    assert_eq!(read(&out), LINKED);
}

#[test]
fn malformed_input_fails_without_writing() {
    let text = "--- quiz\nid=Q1\nreward=T7\nnot a field\n";
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(&data, text);

    linker()
        .arg("-d")
        .arg(&data)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[malformed_input]"))
        .stderr(predicate::str::contains("line 4"));

    assert_eq!(read(&data), text);
}

#[test]
fn duplicate_ids_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(&data, "--- quiz\nid=Q1\n\nid=Q1\n");

    linker()
        .arg("-d")
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[duplicate_key]"));
}

#[test]
fn cyclic_catalog_fails_in_both_modes() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("catalog.toml");
    let data = dir.path().join("data.txt");
    write(&catalog, CYCLIC_CATALOG);
    let text = "--- a\nid=A1\nb=B1\n\n--- b\nid=B1\na=A1\n";
    write(&data, text);

    for mode in ["naive", "fast"] {
        linker()
            .arg("-d")
            .arg(&data)
            .arg("--catalog")
            .arg(&catalog)
            .arg("--mode")
            .arg(mode)
            .assert()
            .failure()
            .stderr(predicate::str::contains("error[dependency_cycle]"));
    }

    assert_eq!(read(&data), text);
}

#[test]
fn catalog_can_come_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("catalog.toml");
    let data = dir.path().join("data.txt");
    write(&catalog, "[[kind]]\nname = \"a\"\ndelimiter = \"a\"\n");
    write(&data, SCENARIO);

    linker()
        .env("LINKER_CATALOG", &catalog)
        .arg("-d")
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[catalog]"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    linker()
        .arg("-d")
        .arg(dir.path().join("absent.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[io]"));
}

#[test]
fn json_report_lists_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(
        &data,
        "--- quiz\nid=Q1\nreward=T7\nquest=Q9\n\n--- treasure\nid=T7\n",
    );

    let output = linker()
        .arg("-d")
        .arg(&data)
        .arg("--json")
        .arg("--fast")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mode"], "fast");
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["links"], 1);
    assert_eq!(report["warnings"][0]["relation"], "quest");
    assert_eq!(report["warnings"][0]["value"], "Q9");
    assert_eq!(report["output"], data.display().to_string());
}

#[test]
fn json_errors_use_the_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    write(&data, "id=Q1\n--- quiz\n");

    let output = linker()
        .arg("-d")
        .arg(&data)
        .arg("--json")
        .output()
        .unwrap();
    assert!(!output.status.success());

    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(envelope["code"], "orphan_data");
    assert!(envelope["hint"].is_string());
}

#[test]
fn preview_writes_dot_or_json() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    let dot = dir.path().join("graph.dot");
    let json = dir.path().join("graph.json");
    write(&data, SCENARIO);

    linker()
        .arg("-d")
        .arg(&data)
        .arg("--dry")
        .arg("--preview")
        .arg(&dot)
        .assert()
        .success();
    linker()
        .arg("-d")
        .arg(&data)
        .arg("--dry")
        .arg("--preview")
        .arg(&json)
        .assert()
        .success();

    let dot = read(&dot);
    assert!(dot.starts_with("digraph {"));
    assert!(dot.contains("quiz:Q1"));

    let preview: serde_json::Value = serde_json::from_str(&read(&json)).unwrap();
    assert_eq!(preview["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(preview["edges"][0]["relation"], "reward");
    assert_eq!(read(&data), SCENARIO);
}
