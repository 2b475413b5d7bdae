//! `UserStore` trait — the single async interface for user persistence.
//!
//! The store is a key-value document store addressed by sender id. There
//! are no collection scans; contention is always per id.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::identity::SenderId;
use crate::users::{UserPatch, UserRecord};

/// Backend-agnostic user record store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch the record for `id`, if any.
    async fn get(&self, id: &SenderId) -> Result<Option<UserRecord>, DatabaseError>;

    /// Insert a new record.
    ///
    /// Not an upsert: returns `Ok(None)` when a record with the same id
    /// already exists, leaving the stored record untouched.
    async fn create(&self, record: &UserRecord) -> Result<Option<UserRecord>, DatabaseError>;

    /// Apply `patch` to an existing record and return the updated document.
    /// Returns `Ok(None)` when no record exists for `id`.
    async fn update(
        &self,
        id: &SenderId,
        patch: &UserPatch,
    ) -> Result<Option<UserRecord>, DatabaseError>;
}
