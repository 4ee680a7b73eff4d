//! SQLite backend implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::schema;
use super::{StoreError, StoreLocation};
use crate::photo::Photo;

const PHOTO_COLUMNS: &str = "id, image_data, created_at, expires_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: StoreLocation,
}

impl SqliteStore {
    /// Open the store, creating it on first use and migrating older schemas
    /// forward. Opening an existing store never discards its rows.
    pub fn open(location: &StoreLocation, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = match location {
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)
            }
            StoreLocation::Memory => Connection::open_in_memory(),
        };
        let mut conn = conn.map_err(|source| StoreError::Open {
            location: location.to_string(),
            source,
        })?;

        conn.busy_timeout(busy_timeout)?;
        let version = schema::migrate(&mut conn)?;
        if let StoreLocation::File(_) = location {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "photo store journal mode set");
        }

        debug!(%location, version, "photo store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            location: location.clone(),
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a photo, replacing any existing row with the same id.
    pub fn put(&self, photo: &Photo) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO photos (id, image_data, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                image_data = excluded.image_data,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
            params![
                photo.id,
                photo.image_data,
                photo.created_at.timestamp_millis(),
                photo.expires_at.timestamp_millis(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a photo by id. Returns whether a row was removed; a missing id
    /// is not an error.
    pub fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM photos WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_by_id(&self, id: &str) -> Result<Option<Photo>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                [id],
                PhotoRow::from_row,
            )
            .optional()?;
        row.map(PhotoRow::into_photo).transpose()
    }

    /// Every photo, oldest first.
    pub fn get_all(&self) -> Result<Vec<Photo>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos ORDER BY created_at, id"
        ))?;
        let rows = stmt
            .query_map([], PhotoRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(PhotoRow::into_photo).collect()
    }

    /// Photos whose capture time lies in `[start, end]`, oldest first.
    pub fn get_by_created_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Photo>, StoreError> {
        if start > end {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {PHOTO_COLUMNS}
            FROM photos
            WHERE created_at BETWEEN ?1 AND ?2
            ORDER BY created_at, id
            "#
        ))?;
        let rows = stmt
            .query_map(
                params![start.timestamp_millis(), end.timestamp_millis()],
                PhotoRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(PhotoRow::into_photo).collect()
    }

    /// Ids of photos whose expiry is at or before `threshold`.
    pub fn get_ids_with_expiry_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM photos WHERE expires_at <= ?1 ORDER BY expires_at, id",
        )?;
        let ids = stmt
            .query_map([threshold.timestamp_millis()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

struct PhotoRow {
    id: String,
    image_data: String,
    created_at: i64,
    expires_at: i64,
}

impl PhotoRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            image_data: row.get(1)?,
            created_at: row.get(2)?,
            expires_at: row.get(3)?,
        })
    }

    fn into_photo(self) -> Result<Photo, StoreError> {
        let created_at = from_millis(&self.id, "created_at", self.created_at)?;
        let expires_at = from_millis(&self.id, "expires_at", self.expires_at)?;
        Ok(Photo {
            id: self.id,
            image_data: self.image_data,
            created_at,
            expires_at,
        })
    }
}

fn from_millis(id: &str, field: &'static str, value: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| StoreError::CorruptRecord {
        id: id.to_string(),
        field,
        value,
    })
}
