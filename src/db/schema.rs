use rusqlite::Connection;

use super::StoreError;

/// Highest schema version this build understands.
pub const SCHEMA_VERSION: i64 = 2;

pub(crate) struct Migration {
    pub version: i64,
    pub sql: &'static str,
}

/// Applied in order; each entry moves the database to `version`.
pub(crate) const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
-- Photos table: one row per captured image
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY NOT NULL,
    image_data TEXT NOT NULL,
    created_at INTEGER NOT NULL,  -- unix epoch milliseconds
    expires_at INTEGER NOT NULL,  -- unix epoch milliseconds
    CHECK (expires_at > created_at)
);

CREATE INDEX IF NOT EXISTS idx_photos_created_at ON photos(created_at);
"#,
    },
    Migration {
        version: 2,
        sql: r#"
-- Expiry index for the retention sweep
CREATE INDEX IF NOT EXISTS idx_photos_expires_at ON photos(expires_at);
"#,
    },
];

/// Bring the database up to [`SCHEMA_VERSION`], returning the version it ends at.
/// All pending migrations commit together or not at all.
pub(crate) fn migrate(conn: &mut Connection) -> Result<i64, StoreError> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }
    if current == SCHEMA_VERSION {
        return Ok(current);
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)
            .map_err(|source| StoreError::Migration {
                version: migration.version,
                source,
            })?;
        tracing::debug!(version = migration.version, "applied photo store migration");
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(SCHEMA_VERSION)
}
