use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, SeedwatchError};
use crate::domain::{Item, ItemKey};
use crate::store::{Store, StoreCounts, UpsertOutcome};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ITEM_COLUMNS: &str = "pattern_id, condition_value, price, inspect_link, image_url, \
                            first_seen, last_seen, is_available";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| SeedwatchError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            SeedwatchError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Fixed-width UTC timestamps so that string order is time order.
    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            pattern_id: row.get(0)?,
            condition_value: row.get(1)?,
            price: row.get(2)?,
            inspect_link: row.get(3)?,
            image_url: row.get(4)?,
            first_seen: row
                .get::<_, String>(5)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            last_seen: row
                .get::<_, String>(6)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            is_available: row.get::<_, i32>(7)? != 0,
        })
    }

    fn query_items(&self, sql: &str, limit: Option<usize>) -> Result<Vec<Item>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;

        let items = match limit {
            Some(limit) => stmt
                .query_map(params![limit as i64], Self::row_to_item)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], Self::row_to_item)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        Ok(items)
    }
}

impl Store for SqliteStore {
    fn upsert_item(&self, item: &Item) -> Result<UpsertOutcome> {
        if !item.has_valid_condition() {
            return Err(SeedwatchError::InvalidItem(format!(
                "condition value {} outside [0, 1]",
                item.condition_value
            )));
        }

        let key = item.key();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE pattern_id = ?1 AND condition_value = ?2)",
            params![key.pattern_id(), key.condition_value()],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO items (pattern_id, condition_value, price, inspect_link, image_url,
                                first_seen, last_seen, is_available)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
             ON CONFLICT(pattern_id, condition_value) DO UPDATE SET
                price = excluded.price,
                last_seen = MAX(last_seen, excluded.last_seen),
                is_available = 1",
            params![
                key.pattern_id(),
                key.condition_value(),
                item.price,
                item.inspect_link,
                item.image_url,
                Self::format_datetime(&item.first_seen),
                Self::format_datetime(&item.last_seen),
            ],
        )?;

        tx.commit()?;

        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn mark_unavailable(&self, key: &ItemKey) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE items SET is_available = 0
             WHERE pattern_id = ?1 AND condition_value = ?2 AND is_available = 1",
            params![key.pattern_id(), key.condition_value()],
        )?;
        Ok(changed > 0)
    }

    fn mark_stale_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE items SET is_available = 0 WHERE is_available = 1 AND last_seen < ?1",
            params![Self::format_datetime(&cutoff)],
        )?;
        Ok(changed)
    }

    fn get_item(&self, key: &ItemKey) -> Result<Option<Item>> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE pattern_id = ?1 AND condition_value = ?2"
                ),
                params![key.pattern_id(), key.condition_value()],
                Self::row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn list_available(&self, limit: usize) -> Result<Vec<Item>> {
        self.query_items(
            &format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE is_available = 1
                 ORDER BY first_seen DESC, id DESC LIMIT ?1"
            ),
            Some(limit),
        )
    }

    fn available_items(&self) -> Result<Vec<Item>> {
        self.query_items(
            &format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE is_available = 1
                 ORDER BY first_seen DESC, id DESC"
            ),
            None,
        )
    }

    fn all_items(&self) -> Result<Vec<Item>> {
        self.query_items(
            &format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY last_seen DESC, id DESC"),
            None,
        )
    }

    fn counts(&self) -> Result<StoreCounts> {
        let conn = self.lock()?;
        let (available, total): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(is_available), 0), COUNT(*) FROM items",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreCounts {
            available: available as usize,
            total: total as usize,
        })
    }
}
