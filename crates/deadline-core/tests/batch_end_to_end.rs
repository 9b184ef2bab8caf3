//! Batch runs against a JSON registry on disk and a SQLite collection.

use chrono::{Local, NaiveDate, TimeZone};
use deadline_core::batch::{BatchOptions, assign, run_batch, unassign};
use deadline_core::clock::{Clock, FixedClock};
use deadline_core::collection::Collection;
use deadline_core::host::{CollectingNotifier, Host};
use deadline_core::store::{ConfigStore, JsonFileStore};
use deadline_core::{ErrorCode, Registry};
use rusqlite::params;
use std::path::Path;
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
}

fn options(profile: &str) -> BatchOptions {
    BatchOptions {
        profile: profile.to_string(),
        silent: true,
        include_today: true,
        today: today(),
    }
}

/// Collection with a `Spanish` deck: 23 unseen cards and 2 first studied this
/// morning, plus an unrelated `Kanji` deck on the default config.
fn spanish_collection(path: &Path) -> Collection {
    let col = Collection::create(path, FixedClock::at_noon(today()).now()).expect("create");
    let conn = col.connection();
    conn.execute("INSERT INTO decks (id, name) VALUES (1, 'Spanish')", [])
        .expect("deck");
    conn.execute("INSERT INTO decks (id, name) VALUES (2, 'Kanji')", [])
        .expect("deck");
    for _ in 0..23 {
        conn.execute("INSERT INTO cards (did, type, queue) VALUES (1, 0, 0)", [])
            .expect("card");
    }
    for _ in 0..40 {
        conn.execute("INSERT INTO cards (did, type, queue) VALUES (2, 0, 0)", [])
            .expect("card");
    }

    let morning = Local
        .from_local_datetime(&today().and_hms_opt(9, 0, 0).expect("time"))
        .earliest()
        .expect("local time")
        .timestamp_millis();
    for offset in 0..2 {
        conn.execute("INSERT INTO cards (did, type, queue) VALUES (1, 1, 1)", [])
            .expect("card");
        let cid = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO revlog (id, cid, type) VALUES (?1, ?2, 0)",
            params![morning + offset, cid],
        )
        .expect("revlog");
    }
    col
}

fn deck_limits(col: &Collection, deck: &str) -> (i64, i64, i64) {
    col.connection()
        .query_row(
            "SELECT c.id, c.new_per_day, c.review_per_day
             FROM decks d JOIN deck_config c ON c.id = d.conf_id
             WHERE d.name = ?1",
            [deck],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("deck limits")
}

struct Fixture {
    _dir: TempDir,
    registry: Registry<JsonFileStore>,
    collection: Collection,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let registry = Registry::new(JsonFileStore::new(dir.path().join("deadlines.json")));
    let collection = spanish_collection(&dir.path().join("collection.db"));
    Fixture {
        _dir: dir,
        registry,
        collection,
    }
}

#[test]
fn five_days_inclusive_spreads_backlog_evenly() {
    let mut fx = fixture();
    let deadline = NaiveDate::from_ymd_opt(2026, 10, 23);
    assign(&fx.registry, &mut fx.collection, "alice", "Spanish", deadline, false).expect("assign");

    let report = run_batch(
        &fx.registry,
        &mut fx.collection,
        &mut CollectingNotifier::default(),
        &options("alice"),
    )
    .expect("batch");

    let spanish = &report.processed[0];
    assert_eq!(spanish.seen_today, 2);
    assert_eq!(spanish.remaining, 23);
    assert_eq!(spanish.total, 25);
    assert_eq!(spanish.days_left, 5);
    assert_eq!(spanish.quota, 5);

    let (conf_id, new_per_day, review_per_day) = deck_limits(&fx.collection, "Spanish");
    assert_ne!(conf_id, 1);
    assert_eq!((new_per_day, review_per_day), (5, 50));
    assert_eq!(deck_limits(&fx.collection, "Kanji"), (1, 20, 200));
}

#[test]
fn deadline_reached_releases_whole_backlog() {
    let mut fx = fixture();
    let deadline = NaiveDate::from_ymd_opt(2026, 10, 1);
    assign(&fx.registry, &mut fx.collection, "alice", "Spanish", deadline, false).expect("assign");

    let report = run_batch(
        &fx.registry,
        &mut fx.collection,
        &mut CollectingNotifier::default(),
        &options("alice"),
    )
    .expect("batch");
    assert_eq!(report.processed[0].days_left, 0);
    assert_eq!(report.processed[0].quota, 25);
}

#[test]
fn rerunning_the_same_day_is_idempotent() {
    let mut fx = fixture();
    let deadline = NaiveDate::from_ymd_opt(2026, 10, 23);
    assign(&fx.registry, &mut fx.collection, "alice", "Spanish", deadline, false).expect("assign");

    let mut notifier = CollectingNotifier::default();
    let first = run_batch(&fx.registry, &mut fx.collection, &mut notifier, &options("alice"))
        .expect("first");
    let second = run_batch(&fx.registry, &mut fx.collection, &mut notifier, &options("alice"))
        .expect("second");
    assert_eq!(first, second);
}

#[test]
fn profiles_do_not_see_each_other() {
    let mut fx = fixture();
    assign(
        &fx.registry,
        &mut fx.collection,
        "alice",
        "Spanish",
        NaiveDate::from_ymd_opt(2026, 10, 23),
        false,
    )
    .expect("assign");
    assign(
        &fx.registry,
        &mut fx.collection,
        "bob",
        "Kanji",
        NaiveDate::from_ymd_opt(2026, 10, 28),
        false,
    )
    .expect("assign");

    let report = run_batch(
        &fx.registry,
        &mut fx.collection,
        &mut CollectingNotifier::default(),
        &options("bob"),
    )
    .expect("batch");
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].group, "Kanji");
    assert_eq!(report.processed[0].quota, 4);

    let (_, spanish_new, _) = deck_limits(&fx.collection, "Spanish");
    assert_eq!(spanish_new, 20);

    unassign(&fx.registry, &mut fx.collection, "bob", "Kanji").expect("unassign");
    assert_eq!(fx.registry.list_for_profile("alice").expect("list").len(), 1);
    assert_eq!(deck_limits(&fx.collection, "Kanji").0, 1);
}

#[test]
fn legacy_registry_is_migrated_on_disk() {
    let mut fx = fixture();
    std::fs::write(
        fx.registry.store().path(),
        r#"{ "alice": { "Spanish": "2026-10-23", "Gone": "not-a-date" }, "oneOrMany": "Many", "test": 1 }"#,
    )
    .expect("write legacy");

    let report = run_batch(
        &fx.registry,
        &mut fx.collection,
        &mut CollectingNotifier::default(),
        &options("alice"),
    )
    .expect("batch");
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].code, ErrorCode::InvalidDate.code());

    let on_disk = fx.registry.store().load().expect("reload");
    assert_eq!(on_disk["deadlines"]["alice"]["Spanish"], "2026-10-23");
    assert_eq!(on_disk["oneOrMany"], "Many");
    assert!(on_disk.get("test").is_none());
    assert!(on_disk.get("alice").is_none());
}

#[test]
fn unknown_deck_in_registry_is_recorded_not_fatal() {
    let mut fx = fixture();
    fx.registry
        .add("alice", "Deleted deck", NaiveDate::from_ymd_opt(2026, 11, 1))
        .expect("add");
    fx.registry
        .add("alice", "Spanish", NaiveDate::from_ymd_opt(2026, 10, 23))
        .expect("add");

    let report = run_batch(
        &fx.registry,
        &mut fx.collection,
        &mut CollectingNotifier::default(),
        &options("alice"),
    )
    .expect("batch");
    assert_eq!(report.failures[0].group, "Deleted deck");
    assert_eq!(report.failures[0].code, ErrorCode::GroupNotFound.code());
    assert_eq!(report.processed[0].group, "Spanish");
    assert!(fx.collection.count_unseen("Spanish").is_ok());
}

#[test]
fn quota_never_leaks_into_decks_sharing_a_user_config() {
    let mut fx = fixture();
    let conn = fx.collection.connection();
    conn.execute(
        "INSERT INTO deck_config (id, name, new_per_day, review_per_day)
         VALUES (7, 'Languages', 20, 200)",
        [],
    )
    .expect("config");
    conn.execute("UPDATE decks SET conf_id = 7", []).expect("share config");

    assign(
        &fx.registry,
        &mut fx.collection,
        "alice",
        "Spanish",
        NaiveDate::from_ymd_opt(2026, 10, 20),
        false,
    )
    .expect("assign");
    let report = run_batch(
        &fx.registry,
        &mut fx.collection,
        &mut CollectingNotifier::default(),
        &options("alice"),
    )
    .expect("batch");

    assert_eq!(report.processed[0].quota, 13);
    let (spanish_conf, new_per_day, review_per_day) = deck_limits(&fx.collection, "Spanish");
    assert_ne!(spanish_conf, 7);
    assert_eq!((new_per_day, review_per_day), (13, 130));
    assert_eq!(deck_limits(&fx.collection, "Kanji"), (7, 20, 200));
}

#[test]
fn removing_deadline_of_deleted_deck_succeeds() {
    let mut fx = fixture();
    assign(
        &fx.registry,
        &mut fx.collection,
        "alice",
        "Spanish",
        NaiveDate::from_ymd_opt(2026, 10, 23),
        false,
    )
    .expect("assign");
    fx.collection
        .connection()
        .execute("DELETE FROM decks WHERE name = 'Spanish'", [])
        .expect("delete deck");

    unassign(&fx.registry, &mut fx.collection, "alice", "Spanish").expect("unassign");
    assert!(fx.registry.list_for_profile("alice").expect("list").is_empty());
}
