//! SQLite-based storage for live and parked work items.
//!
//! Both partitions share one schema; an item's partition is the table it
//! lives in. Timestamps are stored as fixed-width RFC3339 (nanoseconds, `Z`)
//! so lexicographic order equals chronological order.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, ItemStore, Partition};
use crate::error::{DatabaseError, StoreError};
use crate::timeline::{AttentionType, ItemStatus, WorkItem};

const SCHEMA_VERSION: i64 = 1;

const COLUMNS: &str = "id, owner, title, start_time, planned_duration_minutes, attention_type,
     layer_id, is_meeting, status, completed_at, non_negotiable, version,
     parked_at, unparked_at, created_at, updated_at";

// === Helper Functions ===

fn table(partition: Partition) -> &'static str {
    match partition {
        Partition::Live => "live_items",
        Partition::Parked => "parked_items",
    }
}

/// Format a timestamp for storage
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp
fn parse_datetime(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            message: format!("bad timestamp '{value}': {e}"),
        })
}

fn parse_optional_datetime(
    id: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|v| parse_datetime(id, &v)).transpose()
}

/// Row as stored, before decoding enums and timestamps.
struct RawItem {
    id: String,
    owner: String,
    title: String,
    start_time: String,
    planned_duration_minutes: i64,
    attention_type: String,
    layer_id: String,
    is_meeting: bool,
    status: String,
    completed_at: Option<String>,
    non_negotiable: bool,
    version: i64,
    parked_at: Option<String>,
    unparked_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawItem {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            title: row.get(2)?,
            start_time: row.get(3)?,
            planned_duration_minutes: row.get(4)?,
            attention_type: row.get(5)?,
            layer_id: row.get(6)?,
            is_meeting: row.get(7)?,
            status: row.get(8)?,
            completed_at: row.get(9)?,
            non_negotiable: row.get(10)?,
            version: row.get(11)?,
            parked_at: row.get(12)?,
            unparked_at: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }

    fn decode(self) -> Result<WorkItem, StoreError> {
        let corrupt = |message: String| StoreError::Corrupt {
            id: self.id.clone(),
            message,
        };
        let attention_type: AttentionType = self
            .attention_type
            .parse()
            .map_err(|e: crate::error::ValidationError| corrupt(e.to_string()))?;
        let status: ItemStatus = self
            .status
            .parse()
            .map_err(|e: crate::error::ValidationError| corrupt(e.to_string()))?;
        let planned_duration_minutes = u32::try_from(self.planned_duration_minutes)
            .map_err(|_| corrupt(format!("bad duration {}", self.planned_duration_minutes)))?;
        let version = u64::try_from(self.version)
            .map_err(|_| corrupt(format!("bad version {}", self.version)))?;

        Ok(WorkItem {
            start_time: parse_datetime(&self.id, &self.start_time)?,
            completed_at: parse_optional_datetime(&self.id, self.completed_at)?,
            parked_at: parse_optional_datetime(&self.id, self.parked_at)?,
            unparked_at: parse_optional_datetime(&self.id, self.unparked_at)?,
            created_at: parse_datetime(&self.id, &self.created_at)?,
            updated_at: parse_datetime(&self.id, &self.updated_at)?,
            id: self.id,
            owner: self.owner,
            title: self.title,
            planned_duration_minutes,
            attention_type,
            layer_id: self.layer_id,
            is_meeting: self.is_meeting,
            status,
            non_negotiable: self.non_negotiable,
            version,
        })
    }
}

/// SQLite-backed [`ItemStore`].
///
/// The connection sits behind a mutex; every call runs synchronously while
/// holding it and never awaits.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

impl SqliteItemStore {
    /// Open the item database at `<data_dir>/focusline.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open_at(&dir.join("focusline.db"))
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(Duration::from_millis(250))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        for partition in [Partition::Live, Partition::Parked] {
            let table = table(partition);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id                       TEXT PRIMARY KEY,
                    owner                    TEXT NOT NULL,
                    title                    TEXT NOT NULL,
                    start_time               TEXT NOT NULL,
                    planned_duration_minutes INTEGER NOT NULL,
                    attention_type           TEXT NOT NULL,
                    layer_id                 TEXT NOT NULL DEFAULT '',
                    is_meeting               INTEGER NOT NULL DEFAULT 0,
                    status                   TEXT NOT NULL,
                    completed_at             TEXT,
                    non_negotiable           INTEGER NOT NULL DEFAULT 0,
                    version                  INTEGER NOT NULL DEFAULT 0,
                    parked_at                TEXT,
                    unparked_at              TEXT,
                    created_at               TEXT NOT NULL,
                    updated_at               TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_owner_start
                    ON {table}(owner, start_time);"
            ))?;
        }

        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        Ok(())
    }

    fn get(&self, partition: Partition, id: &str) -> Result<Option<WorkItem>, StoreError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM {} WHERE id = ?1", table(partition)),
                params![id],
                RawItem::from_row,
            )
            .optional()?;
        raw.map(RawItem::decode).transpose()
    }

    fn upsert(&self, partition: Partition, item: &WorkItem) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                table(partition)
            ),
            params![
                item.id,
                item.owner,
                item.title,
                format_datetime(&item.start_time),
                item.planned_duration_minutes as i64,
                item.attention_type.as_str(),
                item.layer_id,
                item.is_meeting,
                item.status.as_str(),
                item.completed_at.as_ref().map(format_datetime),
                item.non_negotiable,
                item.version as i64,
                item.parked_at.as_ref().map(format_datetime),
                item.unparked_at.as_ref().map(format_datetime),
                format_datetime(&item.created_at),
                format_datetime(&item.updated_at),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, partition: Partition, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn();
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", table(partition)),
            params![id],
        )?;
        Ok(removed > 0)
    }

    fn list(
        &self,
        partition: Partition,
        owner: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WorkItem>, StoreError> {
        let conn = self.conn();
        let table = table(partition);
        let raws: Vec<RawItem> = match range {
            Some((from, to)) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM {table}
                     WHERE owner = ?1 AND start_time >= ?2 AND start_time < ?3
                     ORDER BY start_time, id"
                ))?;
                let rows = stmt.query_map(
                    params![owner, format_datetime(&from), format_datetime(&to)],
                    RawItem::from_row,
                )?;
                rows.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM {table} WHERE owner = ?1 ORDER BY start_time, id"
                ))?;
                let rows = stmt.query_map(params![owner], RawItem::from_row)?;
                rows.collect::<Result<_, _>>()?
            }
        };
        raws.into_iter().map(RawItem::decode).collect()
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn get_live(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        self.get(Partition::Live, id)
    }

    async fn get_parked(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        self.get(Partition::Parked, id)
    }

    async fn upsert_live(&self, item: &WorkItem) -> Result<(), StoreError> {
        self.upsert(Partition::Live, item)
    }

    async fn update_live_if(
        &self,
        item: &WorkItem,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE live_items SET
                title = ?2, start_time = ?3, planned_duration_minutes = ?4,
                attention_type = ?5, layer_id = ?6, is_meeting = ?7, status = ?8,
                completed_at = ?9, non_negotiable = ?10, version = ?11,
                parked_at = ?12, unparked_at = ?13, updated_at = ?14
             WHERE id = ?1 AND version = ?15",
            params![
                item.id,
                item.title,
                format_datetime(&item.start_time),
                item.planned_duration_minutes as i64,
                item.attention_type.as_str(),
                item.layer_id,
                item.is_meeting,
                item.status.as_str(),
                item.completed_at.as_ref().map(format_datetime),
                item.non_negotiable,
                item.version as i64,
                item.parked_at.as_ref().map(format_datetime),
                item.unparked_at.as_ref().map(format_datetime),
                format_datetime(&item.updated_at),
                expected_version as i64,
            ],
        )?;
        Ok(changed == 1)
    }

    async fn upsert_parked(&self, item: &WorkItem) -> Result<(), StoreError> {
        self.upsert(Partition::Parked, item)
    }

    async fn delete_live(&self, id: &str) -> Result<bool, StoreError> {
        self.delete(Partition::Live, id)
    }

    async fn delete_parked(&self, id: &str) -> Result<bool, StoreError> {
        self.delete(Partition::Parked, id)
    }

    async fn list_live(
        &self,
        owner: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WorkItem>, StoreError> {
        self.list(Partition::Live, owner, range)
    }

    async fn list_parked(&self, owner: &str) -> Result<Vec<WorkItem>, StoreError> {
        self.list(Partition::Parked, owner, None)
    }

    async fn owners(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT owner FROM live_items UNION SELECT owner FROM parked_items ORDER BY owner",
        )?;
        let owners = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }
}
