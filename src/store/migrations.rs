//! Version-tracked database migrations for the libSQL identity store.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::StoreError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                profile_kind TEXT NOT NULL,
                given_name TEXT NOT NULL,
                surname TEXT NOT NULL,
                national_id INTEGER NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                photo_address TEXT NOT NULL DEFAULT '',
                status TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_account ON profiles(account_id);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                StoreError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::debug!(
        version = get_current_version(conn).await?,
        "Database migrations complete"
    );
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, StoreError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            StoreError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
