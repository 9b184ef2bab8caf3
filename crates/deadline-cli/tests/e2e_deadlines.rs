//! E2E tests for the `dl` binary.
//!
//! Each test builds a throwaway collection and settings file in a temp
//! directory and runs `dl` as a subprocess with a pinned date.

use assert_cmd::Command;
use chrono::{Local, NaiveDate, TimeZone};
use deadline_core::collection::schema;
use predicates::prelude::*;
use rusqlite::{Connection, params};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

const TODAY: &str = "2026-10-19";

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = Self { dir };
        env.write_collection();
        std::fs::write(
            env.settings_path(),
            format!(
                "profile = \"alice\"\ncollection = {:?}\nregistry = {:?}\n",
                env.collection_path().display().to_string(),
                env.registry_path().display().to_string(),
            ),
        )
        .expect("write settings");
        env
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn collection_path(&self) -> PathBuf {
        self.dir.path().join("collection.db")
    }

    fn registry_path(&self) -> PathBuf {
        self.dir.path().join("deadlines.json")
    }

    /// `Spanish` has 23 unseen cards and 2 first studied today;
    /// `Lang::French` and `Lang::German` have 10 unseen each.
    fn write_collection(&self) {
        let conn = Connection::open(self.collection_path()).expect("open collection");
        schema::initialize(&conn).expect("schema");
        for (id, name) in [(1, "Spanish"), (2, "Lang"), (3, "Lang::French"), (4, "Lang::German")] {
            conn.execute("INSERT INTO decks (id, name) VALUES (?1, ?2)", params![id, name])
                .expect("deck");
        }
        add_unseen(&conn, 1, 23);
        add_unseen(&conn, 3, 10);
        add_unseen(&conn, 4, 10);

        let today = NaiveDate::parse_from_str(TODAY, "%Y-%m-%d").expect("date");
        let morning = Local
            .from_local_datetime(&today.and_hms_opt(9, 0, 0).expect("time"))
            .earliest()
            .expect("local time")
            .timestamp_millis();
        for offset in 0..2 {
            conn.execute("INSERT INTO cards (did, type, queue) VALUES (1, 1, 1)", [])
                .expect("card");
            conn.execute(
                "INSERT INTO revlog (id, cid, type) VALUES (?1, ?2, 0)",
                params![morning + offset, conn.last_insert_rowid()],
            )
            .expect("revlog");
        }
    }

    fn dl(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dl"));
        cmd.current_dir(self.dir.path());
        cmd.env("DEADLINE_CONFIG", self.settings_path());
        cmd.env("DEADLINE_TODAY", TODAY);
        // Suppress tracing output that goes to stderr
        cmd.env("DEADLINE_LOG", "error");
        cmd.env_remove("DEADLINE_PROFILE");
        cmd.env_remove("FORMAT");
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self
            .dl()
            .args(args)
            .arg("--json")
            .output()
            .expect("dl should not crash");
        assert!(
            output.status.success(),
            "dl {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("valid JSON")
    }
}

fn add_unseen(conn: &Connection, did: i64, n: usize) {
    for _ in 0..n {
        conn.execute("INSERT INTO cards (did, type, queue) VALUES (?1, 0, 0)", [did])
            .expect("card");
    }
}

fn new_per_day(collection: &Path, deck: &str) -> i64 {
    let conn = Connection::open(collection).expect("open collection");
    conn.query_row(
        "SELECT c.new_per_day FROM decks d JOIN deck_config c ON c.id = d.conf_id WHERE d.name = ?1",
        [deck],
        |row| row.get(0),
    )
    .expect("limit")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn add_list_process_remove() {
    let env = Env::new();

    env.dl()
        .args(["add", "Spanish", "2026-10-23", "--format", "text"])
        .assert()
        .success()
        .stdout("Spanish\t2026-10-23\n");

    let listing = env.json(&["list"]);
    assert_eq!(listing["profile"], "alice");
    assert_eq!(listing["deadlines"][0]["group"], "Spanish");
    assert_eq!(listing["deadlines"][0]["days_left"], 5);

    let processed = env.json(&["process"]);
    assert_eq!(processed["processed"][0]["total"], 25);
    assert_eq!(processed["processed"][0]["quota"], 5);
    assert_eq!(new_per_day(&env.collection_path(), "Spanish"), 5);

    env.dl()
        .args(["remove", "Spanish", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed deadline for Spanish"));
    assert_eq!(new_per_day(&env.collection_path(), "Spanish"), 20);
    let listing = env.json(&["list"]);
    assert!(listing["deadlines"].as_array().is_some_and(Vec::is_empty));
}

#[test]
fn process_text_report_uses_group_summary() {
    let env = Env::new();
    env.dl().args(["add", "Spanish", "2026-10-23"]).assert().success();

    env.dl()
        .args(["process", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New items seen today: 2"))
        .stdout(predicate::str::contains("New items per day: 5"));

    env.dl()
        .args(["process", "--silent", "--format", "text"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn add_parent_needs_recursive() {
    let env = Env::new();

    let skipped = env.json(&["add", "Lang", "2026-10-28"]);
    assert!(skipped["assigned"].as_array().is_some_and(Vec::is_empty));

    let assigned = env.json(&["add", "Lang", "2026-10-28", "--recursive"]);
    assert_eq!(assigned["assigned"], serde_json::json!(["Lang::French", "Lang::German"]));

    let processed = env.json(&["process"]);
    assert_eq!(processed["processed"].as_array().map(Vec::len), Some(2));
    assert_eq!(new_per_day(&env.collection_path(), "Lang::French"), 1);
    assert_eq!(new_per_day(&env.collection_path(), "Lang"), 20);
}

#[test]
fn profile_flag_isolates_deadlines() {
    let env = Env::new();
    env.dl()
        .args(["add", "Spanish", "2026-10-23", "--profile", "bob"])
        .assert()
        .success();

    let alice = env.json(&["list"]);
    assert!(alice["deadlines"].as_array().is_some_and(Vec::is_empty));
    let bob = env.json(&["list", "--profile", "bob"]);
    assert_eq!(bob["deadlines"][0]["group"], "Spanish");
}

#[test]
fn invalid_date_is_reported_with_code() {
    let env = Env::new();
    env.dl()
        .args(["add", "Spanish", "2026-02-30", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error_code\": \"E1001\""));
    assert!(!env.registry_path().exists());
}

#[test]
fn removing_unknown_deadline_fails() {
    let env = Env::new();
    env.dl()
        .args(["remove", "Spanish", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: no deadline for group"))
        .stderr(predicate::str::contains("dl list"));
}

#[test]
fn unknown_deck_is_rejected_on_add() {
    let env = Env::new();
    env.dl()
        .args(["add", "Nope", "2026-10-23", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E4001"));
}

#[test]
fn config_set_mode_round_trips() {
    let env = Env::new();
    env.dl().args(["config", "set-mode", "many"]).assert().success();

    let shown = env.json(&["config", "show"]);
    assert_eq!(shown["report_mode"], "Many");
    assert_eq!(shown["profile"], "alice");
    assert_eq!(shown["today"], TODAY);

    let raw: Value = serde_json::from_str(
        &std::fs::read_to_string(env.registry_path()).expect("registry file"),
    )
    .expect("registry JSON");
    assert_eq!(raw["oneOrMany"], "Many");
}

#[test]
fn legacy_registry_is_migrated() {
    let env = Env::new();
    std::fs::write(
        env.registry_path(),
        r#"{ "alice": { "Spanish": "2026-10-23" }, "test": 0 }"#,
    )
    .expect("write legacy registry");

    let listing = env.json(&["list"]);
    assert_eq!(listing["deadlines"][0]["group"], "Spanish");

    let raw: Value = serde_json::from_str(
        &std::fs::read_to_string(env.registry_path()).expect("registry file"),
    )
    .expect("registry JSON");
    assert_eq!(raw["deadlines"]["alice"]["Spanish"], "2026-10-23");
    assert!(raw.get("test").is_none());
}

#[test]
fn missing_collection_is_explained() {
    let env = Env::new();
    env.dl()
        .args(["process", "--collection", "/nonexistent/dir/collection.db", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E4002"));
}

#[test]
fn completions_are_generated() {
    let env = Env::new();
    env.dl()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dl"));
}
