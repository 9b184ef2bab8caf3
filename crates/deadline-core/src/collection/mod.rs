//! [`Host`] implementation over a review collection stored in SQLite.
//!
//! Groups are decks, addressed by full name. The collection's day starts at
//! its rollover hour in local time, not at midnight.

pub mod schema;

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::{path::Path, time::Duration};
use tracing::{debug, info};

use crate::error::{DeadlineError, ErrorCode};
use crate::host::{Host, review_cap};
use schema::{DEFAULT_CONFIG_ID, DEFAULT_ROLLOVER_HOUR};

/// Busy timeout used for collection connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Separator between parent and child deck names.
pub const DECK_SEPARATOR: &str = "::";

/// A review collection opened for one run.
///
/// `now` is sampled once when the collection is opened so every group in a
/// batch shares the same day boundary.
#[derive(Debug)]
pub struct Collection {
    conn: Connection,
    now: DateTime<Local>,
}

#[derive(Debug, Clone, Copy)]
struct DeckRow {
    id: i64,
    conf_id: i64,
}

impl Collection {
    /// Open an existing collection file.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] if the file does not exist or
    /// cannot be opened.
    pub fn open(path: &Path, now: DateTime<Local>) -> Result<Self, DeadlineError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| DeadlineError::persistence(path, ErrorCode::CollectionQueryFailed, err))?;
        configure_connection(&conn)
            .map_err(|err| DeadlineError::persistence(path, ErrorCode::CollectionQueryFailed, err))?;
        Ok(Self { conn, now })
    }

    /// Create (or open) a collection file and make sure its tables exist.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] if the file cannot be created or
    /// initialized.
    pub fn create(path: &Path, now: DateTime<Local>) -> Result<Self, DeadlineError> {
        let conn = Connection::open(path)
            .map_err(|err| DeadlineError::persistence(path, ErrorCode::CollectionQueryFailed, err))?;
        configure_connection(&conn)
            .and_then(|()| schema::initialize(&conn))
            .map_err(|err| DeadlineError::persistence(path, ErrorCode::CollectionQueryFailed, err))?;
        info!(path = %path.display(), "initialized collection");
        Ok(Self { conn, now })
    }

    /// Wrap an already-open connection.
    #[must_use]
    pub fn from_connection(conn: Connection, now: DateTime<Local>) -> Self {
        Self { conn, now }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Hour of the day at which this collection's day rolls over.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] if the query fails.
    pub fn rollover_hour(&self) -> Result<u32, DeadlineError> {
        self.conn
            .query_row("SELECT rollover FROM col WHERE id = 1", [], |row| row.get(0))
            .optional()
            .map(|hour| hour.unwrap_or(DEFAULT_ROLLOVER_HOUR))
            .map_err(query_error(""))
    }

    /// Start of the collection's current day, as a millisecond timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] if the rollover hour cannot be read.
    pub fn day_start_millis(&self) -> Result<i64, DeadlineError> {
        Ok(day_start(self.now, self.rollover_hour()?).timestamp_millis())
    }

    /// Every deck name in the collection, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] if the query fails.
    pub fn group_names(&self) -> Result<Vec<String>, DeadlineError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM decks ORDER BY name")
            .map_err(query_error(""))?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .and_then(Iterator::collect)
            .map_err(query_error(""))?;
        Ok(names)
    }

    fn deck(&self, group: &str) -> Result<DeckRow, DeadlineError> {
        self.conn
            .query_row(
                "SELECT id, conf_id FROM decks WHERE name = ?1",
                [group],
                |row| {
                    Ok(DeckRow {
                        id: row.get(0)?,
                        conf_id: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(query_error(group))?
            .ok_or_else(|| DeadlineError::Host {
                group: group.to_string(),
                reason: "no deck with this name".to_string(),
                code: ErrorCode::GroupNotFound,
            })
    }
}

impl Host for Collection {
    fn count_unseen(&self, group: &str) -> Result<u64, DeadlineError> {
        let deck = self.deck(group)?;
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM cards WHERE did = ?1 AND type = 0 AND queue != -1",
                [deck.id],
                |row| row.get(0),
            )
            .map_err(query_error(group))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn count_first_seen_today(&self, group: &str) -> Result<u64, DeadlineError> {
        let deck = self.deck(group)?;
        let day_start = self.day_start_millis()?;
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM (
                     SELECT r.cid
                     FROM revlog AS r
                     JOIN cards AS c ON c.id = r.cid
                     WHERE c.did = ?1 AND r.type = 0
                     GROUP BY r.cid
                     HAVING MIN(r.id) >= ?2
                 )",
                params![deck.id, day_start],
                |row| row.get(0),
            )
            .map_err(query_error(group))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn set_daily_quota(&mut self, group: &str, quota: u64) -> Result<(), DeadlineError> {
        let deck = self.deck(group)?;
        let new_per_day = i64::try_from(quota).unwrap_or(i64::MAX);
        let review_per_day = i64::try_from(review_cap(quota)).unwrap_or(i64::MAX);
        self.conn
            .execute(
                "UPDATE deck_config SET new_per_day = ?1, review_per_day = ?2 WHERE id = ?3",
                params![new_per_day, review_per_day, deck.conf_id],
            )
            .map_err(query_error(group))?;
        debug!(group, quota, conf_id = deck.conf_id, "wrote daily quota");
        Ok(())
    }

    fn child_groups(&self, group: &str) -> Result<Vec<String>, DeadlineError> {
        self.deck(group)?;
        let prefix = format!("{group}{DECK_SEPARATOR}");
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM decks
                 WHERE substr(name, 1, length(?1)) = ?1
                 ORDER BY name",
            )
            .map_err(query_error(group))?;
        let names = stmt
            .query_map([prefix.as_str()], |row| row.get(0))
            .and_then(Iterator::collect)
            .map_err(query_error(group))?;
        Ok(names)
    }

    fn ensure_dedicated_config(&mut self, group: &str) -> Result<(), DeadlineError> {
        let deck = self.deck(group)?;
        let tx = self.conn.transaction().map_err(query_error(group))?;
        let (config_name, users): (Option<String>, i64) = tx
            .query_row(
                "SELECT (SELECT name FROM deck_config WHERE id = ?1),
                        (SELECT COUNT(*) FROM decks WHERE conf_id = ?1)",
                [deck.conf_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(query_error(group))?;
        if is_dedicated(deck.conf_id, config_name.as_deref(), users, group) {
            return Ok(());
        }

        // The copy starts from the deck's current caps; a dangling conf_id
        // falls back to the default row.
        tx.execute(
            "INSERT INTO deck_config (name, new_per_day, review_per_day)
             SELECT ?1, new_per_day, review_per_day FROM deck_config
             WHERE id IN (?2, ?3)
             ORDER BY id = ?2 DESC
             LIMIT 1",
            params![group, deck.conf_id, DEFAULT_CONFIG_ID],
        )
        .map_err(query_error(group))?;
        let conf_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE decks SET conf_id = ?1 WHERE id = ?2",
            params![conf_id, deck.id],
        )
        .map_err(query_error(group))?;
        tx.commit().map_err(query_error(group))?;
        info!(
            group,
            conf_id,
            previous = deck.conf_id,
            shared_by = users,
            "created dedicated deck config"
        );
        Ok(())
    }

    fn release_dedicated_config(&mut self, group: &str) -> Result<(), DeadlineError> {
        let deck = self.deck(group)?;
        if deck.conf_id == DEFAULT_CONFIG_ID {
            return Ok(());
        }

        let tx = self.conn.transaction().map_err(query_error(group))?;
        let config_name: Option<String> = tx
            .query_row(
                "SELECT name FROM deck_config WHERE id = ?1",
                [deck.conf_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error(group))?;
        if config_name.as_deref() != Some(group) {
            debug!(group, conf_id = deck.conf_id, "deck config not dedicated, leaving it");
            return Ok(());
        }
        tx.execute(
            "UPDATE decks SET conf_id = ?1 WHERE id = ?2",
            params![DEFAULT_CONFIG_ID, deck.id],
        )
        .map_err(query_error(group))?;
        let deleted = tx
            .execute(
                "DELETE FROM deck_config
                 WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM decks WHERE conf_id = ?1)",
                [deck.conf_id],
            )
            .map_err(query_error(group))?;
        tx.commit().map_err(query_error(group))?;
        info!(
            group,
            conf_id = deck.conf_id,
            deleted = deleted > 0,
            "released dedicated deck config"
        );
        Ok(())
    }
}

/// A config belongs to `group` alone when it is not the default, carries the
/// deck's name, and no other deck points at it.
fn is_dedicated(conf_id: i64, config_name: Option<&str>, users: i64, group: &str) -> bool {
    conf_id != DEFAULT_CONFIG_ID && config_name == Some(group) && users == 1
}

/// Start of the collection day containing `now`: today at `rollover_hour`
/// local time, or yesterday's if `now` is earlier than that.
#[must_use]
pub fn day_start(now: DateTime<Local>, rollover_hour: u32) -> DateTime<Local> {
    let today = now.date_naive();
    let start = at_hour(today, rollover_hour).unwrap_or(now);
    if now >= start {
        return start;
    }
    today
        .checked_sub_days(Days::new(1))
        .and_then(|yesterday| at_hour(yesterday, rollover_hour))
        .unwrap_or(start)
}

fn at_hour(date: NaiveDate, hour: u32) -> Option<DateTime<Local>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    Local.from_local_datetime(&naive).earliest()
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn query_error(group: &str) -> impl FnOnce(rusqlite::Error) -> DeadlineError + '_ {
    move |err| DeadlineError::Host {
        group: group.to_string(),
        reason: err.to_string(),
        code: ErrorCode::CollectionQueryFailed,
    }
}
