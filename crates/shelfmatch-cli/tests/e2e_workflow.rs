//! E2E workflow tests: `prepare` → `build` → `search` / `batch` / `status`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RAW_CATALOG: &str = r#"{"product_id": 101, "title": "Red Leather Dog Leash", "vendor": "Pawsome", "category": "Animals & Pet Supplies", "tags": "['Dog', 'Leash', 'Leather']"}
{"product_id": 102, "title": "Blue Nylon Cat Collar", "vendor": "Whisker Co", "category": "Animals & Pet Supplies", "tags": "['Cat', 'Collar']"}
{"product_id": 103, "title": "Orthopedic Memory Foam Dog Bed", "vendor": "Pawsome", "category": "Animals & Pet Supplies", "tags": ["Dog", "Bed"]}
{"product_id": 104, "title": "Puppy Dry Food 12kg", "vendor": "Royal Canin", "category": "Animals & Pet Supplies", "tags": "['Dog', 'Food', 'Puppy']"}
{"product_id": 105, "title": "Kitten Wet Food Salmon Pouches", "vendor": "Whisker Co", "category": "Animals & Pet Supplies", "tags": "['Cat', 'Food']"}
{"product_id": 106, "title": "Aquarium Gravel Vacuum", "vendor": "AquaPro", "category": "Animals & Pet Supplies", "tags": "['Fish'"}
{"product_id": 107, "title": "Bird Cage Seed Feeder", "vendor": "Tweet", "category": "Animals & Pet Supplies", "tags": null}

{"product_id": 108}
{"product_id": 109, "title": "Red Leather Dog Leash", "vendor": "Pawsome", "category": "Animals & Pet Supplies", "tags": "['Dog', 'Leash', 'Leather']"}
"#;

fn shelfmatch_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("shelfmatch"));
    cmd.current_dir(dir);
    cmd.env("SHELFMATCH_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd.env_remove("SHELFMATCH_TIMING");
    cmd
}

fn project_with_raw_catalog() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir_all(dir.path().join("data")).expect("data dir");
    fs::write(dir.path().join("data/product_catalogue.jsonl"), RAW_CATALOG).expect("raw catalog");
    dir
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = shelfmatch_cmd(dir)
        .args(args)
        .args(["--format", "json"])
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

fn built_project() -> TempDir {
    let dir = project_with_raw_catalog();
    run_json(dir.path(), &["prepare"]);
    run_json(dir.path(), &["build"]);
    dir
}

#[test]
fn prepare_drops_blank_and_duplicate_records() {
    let dir = project_with_raw_catalog();
    let prepared = run_json(dir.path(), &["prepare"]);

    assert_eq!(prepared["report"]["input_records"], 9);
    assert_eq!(prepared["report"]["removed_empty"], 1);
    assert_eq!(prepared["report"]["removed_duplicates"], 1);
    assert_eq!(prepared["report"]["output_records"], 7);
    assert_eq!(prepared["stats"]["unique_vendors"], 5);

    let catalog = fs::read_to_string(dir.path().join("data/product_catalogue_processed.jsonl"))
        .expect("processed catalog");
    let first: Value =
        serde_json::from_str(catalog.lines().next().expect("first line")).expect("json line");
    assert_eq!(first["product_id"], 101);
    assert_eq!(first["tags"], serde_json::json!(["dog", "leash", "leather"]));
    assert!(
        first["searchable_text"]
            .as_str()
            .expect("searchable_text")
            .starts_with("Red Leather Dog Leash Pawsome")
    );

    let stats: Value = serde_json::from_slice(
        &fs::read(dir.path().join("data/product_catalogue_processed_stats.json")).expect("stats"),
    )
    .expect("stats json");
    assert_eq!(stats["total_records"], 7);
    assert_eq!(stats["sample_records"].as_array().map(Vec::len), Some(5));
}

#[test]
fn build_then_hybrid_search_ranks_the_leash_first() {
    let dir = project_with_raw_catalog();
    run_json(dir.path(), &["prepare"]);

    let built = run_json(dir.path(), &["build"]);
    assert_eq!(built["products"], 7);
    assert_eq!(built["dimension"], 384);
    assert!(dir.path().join("models/vectors.bin").is_file());
    assert!(dir.path().join("models/mapping.json").is_file());

    let found = run_json(dir.path(), &["search", "leather dog leash", "-n", "3"]);
    assert_eq!(found["mode"], "hybrid");
    assert_eq!(found["count"], 3);
    let results = found["results"].as_array().expect("results");
    assert_eq!(results[0]["product_id"], 101);
    for result in results {
        assert!(result["semantic_score"].is_number());
        assert!(result["lexical_score"].is_number());
        assert!(result["match_quality"].is_string());
        assert!(result["explanation"].is_string());
    }
    let scores: Vec<f64> = results
        .iter()
        .map(|r| r["final_score"].as_f64().expect("score"))
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn single_index_modes_report_one_component() {
    let dir = built_project();

    let lexical = run_json(dir.path(), &["search", "salmon", "--lexical"]);
    assert_eq!(lexical["mode"], "lexical");
    assert_eq!(lexical["results"][0]["product_id"], 105);
    assert!(lexical["results"][0].get("semantic_score").is_none());
    assert_eq!(lexical["count"], 1);

    let semantic = run_json(dir.path(), &["search", "kitten food", "--semantic", "-n", "2"]);
    assert_eq!(semantic["mode"], "semantic");
    assert_eq!(semantic["count"], 2);
    assert!(semantic["results"][0].get("lexical_score").is_none());
}

#[test]
fn blank_query_returns_no_results() {
    let dir = built_project();
    let found = run_json(dir.path(), &["search", "   "]);
    assert_eq!(found["count"], 0);

    shelfmatch_cmd(dir.path())
        .args(["search", "   "])
        .assert()
        .success()
        .stdout(predicate::str::contains("advice  no-results"));
}

#[test]
fn batch_keeps_input_order() {
    let dir = built_project();
    fs::write(dir.path().join("queries.txt"), "dog bed\n\ncat collar\nbird seed\n").expect("queries");

    let batch = run_json(dir.path(), &["batch", "queries.txt", "-n", "2"]);
    assert_eq!(batch["queries"], 3);
    let entries = batch["entries"].as_array().expect("entries");
    let queries: Vec<&str> = entries
        .iter()
        .map(|e| e["query"].as_str().expect("query"))
        .collect();
    assert_eq!(queries, ["dog bed", "cat collar", "bird seed"]);
    assert_eq!(entries[0]["results"][0]["product_id"], 103);
    assert_eq!(entries[1]["results"][0]["product_id"], 102);
    assert!(entries.iter().all(|e| e["count"].as_u64() <= Some(2)));
}

#[test]
fn status_reports_readiness() {
    let dir = project_with_raw_catalog();
    let before = run_json(dir.path(), &["status"]);
    assert_eq!(before["ready"], false);
    assert!(before["total_products"].is_null());
    assert!(before["index"].is_null());

    run_json(dir.path(), &["prepare"]);
    run_json(dir.path(), &["build"]);
    let after = run_json(dir.path(), &["status"]);
    assert_eq!(after["ready"], true);
    assert_eq!(after["total_products"], 7);
    assert_eq!(after["index"]["products"], 7);
    assert_eq!(after["index"]["model_id"], "hashing-blake3-384");
}

#[test]
fn config_overrides_paths_and_dimension() {
    let dir = project_with_raw_catalog();
    fs::create_dir_all(dir.path().join(".shelfmatch")).expect("config dir");
    fs::write(
        dir.path().join(".shelfmatch/config.toml"),
        "[paths]\nindex_dir = \"idx\"\n\n[embedding]\ndimension = 64\n\n[search]\ndefault_limit = 2\n",
    )
    .expect("config");

    run_json(dir.path(), &["prepare"]);
    let built = run_json(dir.path(), &["build"]);
    assert_eq!(built["dimension"], 64);
    assert!(dir.path().join("idx/mapping.json").is_file());

    let found = run_json(dir.path(), &["search", "dog"]);
    assert_eq!(found["count"], 2);
}

#[test]
fn project_root_flag_replaces_working_directory() {
    let dir = built_project();
    let elsewhere = TempDir::new().expect("tempdir");
    let root = dir.path().to_str().expect("utf8 path");

    let found = run_json(elsewhere.path(), &["--project-root", root, "search", "leash"]);
    assert_eq!(found["results"][0]["product_id"], 101);
}

#[test]
fn text_output_is_one_line_per_result() {
    let dir = built_project();
    shelfmatch_cmd(dir.path())
        .args(["search", "leash", "-n", "1", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("101  score="))
        .stdout(predicate::str::contains("Red Leather Dog Leash"));
}

#[test]
fn timing_flag_reports_phases_on_stderr() {
    let dir = built_project();
    shelfmatch_cmd(dir.path())
        .args(["--timing", "search", "leash"])
        .assert()
        .success()
        .stderr(predicate::str::contains("timing report"))
        .stderr(predicate::str::contains("load_index"))
        .stderr(predicate::str::contains("cmd.search"));
}

#[test]
fn completions_name_the_binary() {
    let dir = TempDir::new().expect("tempdir");
    shelfmatch_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shelfmatch"));
}
