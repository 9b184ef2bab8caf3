//! SQLite layout of a review collection, as far as deadline needs it.
//!
//! - `col` holds collection-wide settings, including the day rollover hour
//! - `deck_config` holds the per-day caps shared by the decks that point at it;
//!   row 1 is the default and always exists
//! - `decks` are the groups; `Parent::Child` names form the hierarchy
//! - `cards.type = 0` marks a card never studied, `queue = -1` a suspended one
//! - `revlog` rows are keyed by their millisecond timestamp; `type = 0` is a
//!   learning step

use rusqlite::Connection;

/// Id of the shared default deck config.
pub const DEFAULT_CONFIG_ID: i64 = 1;

/// Rollover hour used when a collection does not set one.
pub const DEFAULT_ROLLOVER_HOUR: u32 = 4;

pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS col (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    rollover INTEGER NOT NULL DEFAULT 4 CHECK (rollover BETWEEN 0 AND 23)
);

CREATE TABLE IF NOT EXISTS deck_config (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    new_per_day INTEGER NOT NULL DEFAULT 20 CHECK (new_per_day >= 0),
    review_per_day INTEGER NOT NULL DEFAULT 200 CHECK (review_per_day >= 0)
);

CREATE TABLE IF NOT EXISTS decks (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    conf_id INTEGER NOT NULL DEFAULT 1 REFERENCES deck_config(id)
);

CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY,
    did INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
    type INTEGER NOT NULL DEFAULT 0,
    queue INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS revlog (
    id INTEGER PRIMARY KEY,
    cid INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
    type INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cards_did_type ON cards(did, type);
CREATE INDEX IF NOT EXISTS idx_revlog_cid ON revlog(cid);

INSERT OR IGNORE INTO col (id) VALUES (1);
INSERT OR IGNORE INTO deck_config (id, name) VALUES (1, 'Default');
";

/// Create the collection tables if they do not exist yet.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
