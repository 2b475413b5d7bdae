//! libSQL backend — async `UserStore` implementation.
//!
//! Supports local file and in-memory databases. Each user record is a
//! single row in the `users` table keyed by sender id.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::identity::SenderId;
use crate::store::migrations;
use crate::store::traits::UserStore;
use crate::users::{UserPatch, UserRecord, UserStatus};

/// libSQL user store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlUserStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlUserStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "User store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn fetch(&self, id: &SenderId, op: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let record = row_to_user(&row)
                    .map_err(|e| DatabaseError::Serialization(format!("{op} row parse: {e}")))?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, display_name, status, is_admin, created_at, status_set_at";

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a UserRecord. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<UserRecord, String> {
    let id: String = row.get(0).map_err(|e| e.to_string())?;
    let username: Option<String> = row.get(1).ok();
    let first_name: Option<String> = row.get(2).ok();
    let last_name: Option<String> = row.get(3).ok();
    let display_name: String = row.get::<String>(4).unwrap_or_default();
    let status_str: String = row.get(5).map_err(|e| e.to_string())?;
    let is_admin: i64 = row.get(6).unwrap_or(0);
    let created_str: String = row.get(7).map_err(|e| e.to_string())?;
    let status_set_str: String = row.get(8).map_err(|e| e.to_string())?;

    let status: UserStatus = status_str.parse()?;

    Ok(UserRecord {
        id: SenderId::new(id),
        username,
        first_name,
        last_name,
        display_name,
        status,
        is_admin: is_admin != 0,
        created_at: parse_datetime(&created_str),
        status_set_at: parse_datetime(&status_set_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl UserStore for LibSqlUserStore {
    async fn get(&self, id: &SenderId) -> Result<Option<UserRecord>, DatabaseError> {
        self.fetch(id, "get_user").await
    }

    async fn create(&self, record: &UserRecord) -> Result<Option<UserRecord>, DatabaseError> {
        let inserted = self
            .conn()
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    record.id.as_str(),
                    opt_text(record.username.as_deref()),
                    opt_text(record.first_name.as_deref()),
                    opt_text(record.last_name.as_deref()),
                    record.display_name.as_str(),
                    record.status.as_str(),
                    i64::from(record.is_admin),
                    record.created_at.to_rfc3339(),
                    record.status_set_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_user: {e}")))?;

        if inserted == 0 {
            debug!(sender = %record.id, "create_user skipped, record exists");
            return Ok(None);
        }

        debug!(sender = %record.id, status = %record.status, "User record inserted");
        Ok(Some(record.clone()))
    }

    async fn update(
        &self,
        id: &SenderId,
        patch: &UserPatch,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();

        if let Some(status) = patch.status {
            values.push(libsql::Value::Text(status.as_str().to_string()));
            sets.push(format!("status = ?{}", values.len()));
            values.push(libsql::Value::Text(Utc::now().to_rfc3339()));
            sets.push(format!("status_set_at = ?{}", values.len()));
        }
        if let Some(is_admin) = patch.is_admin {
            values.push(libsql::Value::Integer(i64::from(is_admin)));
            sets.push(format!("is_admin = ?{}", values.len()));
        }

        if sets.is_empty() {
            return self.fetch(id, "update_user").await;
        }

        values.push(libsql::Value::Text(id.as_str().to_string()));
        let sql = format!(
            "UPDATE users SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );

        let updated = self
            .conn()
            .execute(&sql, values)
            .await
            .map_err(|e| DatabaseError::Query(format!("update_user: {e}")))?;

        if updated == 0 {
            return Ok(None);
        }

        debug!(sender = %id, status = ?patch.status, "User record updated");
        self.fetch(id, "update_user").await
    }
}
