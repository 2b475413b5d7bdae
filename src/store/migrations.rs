//! Version-tracked database migrations for the libSQL backend.
//!
//! Applied versions are recorded in `schema_migrations`; each pending step
//! runs in its own transaction together with its version row.

use libsql::Connection;

use crate::error::DatabaseError;

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
        name: "users",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                display_name TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'new',
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                status_set_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "users_status_check",
        sql: r#"
            CREATE TRIGGER IF NOT EXISTS users_status_insert_check
            BEFORE INSERT ON users
            WHEN NEW.status NOT IN ('new', 'registered', 'rejected')
            BEGIN
                SELECT RAISE(ABORT, 'invalid user status');
            END;
            CREATE TRIGGER IF NOT EXISTS users_status_update_check
            BEFORE UPDATE OF status ON users
            WHEN NEW.status NOT IN ('new', 'registered', 'rejected')
            BEGIN
                SELECT RAISE(ABORT, 'invalid user status');
            END;
        "#,
    },
];

impl Migration {
    /// Apply this step and record it, atomically.
    async fn apply(&self, conn: &Connection) -> Result<(), DatabaseError> {
        let fail = |stage: &str, e: libsql::Error| {
            DatabaseError::Migration(format!("V{} {} {stage}: {e}", self.version, self.name))
        };

        let tx = conn.transaction().await.map_err(|e| fail("begin", e))?;
        tx.execute_batch(self.sql)
            .await
            .map_err(|e| fail("apply", e))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            libsql::params![self.version, self.name],
        )
        .await
        .map_err(|e| fail("record", e))?;
        tx.commit().await.map_err(|e| fail("commit", e))
    }
}

/// Bring the schema up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("schema_migrations table: {e}")))?;

    let applied = schema_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        tracing::debug!(version = applied, "Schema up to date");
        return Ok(());
    }

    for migration in pending {
        tracing::info!(version = migration.version, name = migration.name, "Applying migration");
        migration.apply(conn).await?;
    }

    tracing::info!(version = schema_version(conn).await?, "Schema migrated");
    Ok(())
}

/// Highest applied version; 0 on a fresh database.
async fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Migration(format!("schema version: {e}"));

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", ())
        .await
        .map_err(read)?;
    match rows.next().await.map_err(read)? {
        Some(row) => row.get::<i64>(0).map_err(read),
        None => Ok(0),
    }
}
