//! In-memory user store — used for `:memory:` runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DatabaseError;
use crate::identity::SenderId;
use crate::store::traits::UserStore;
use crate::users::{UserPatch, UserRecord};

/// `UserStore` backed by a `HashMap` behind a tokio `RwLock`.
#[derive(Default)]
pub struct MemoryUserStore {
    records: RwLock<HashMap<SenderId, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, id: &SenderId) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn create(&self, record: &UserRecord) -> Result<Option<UserRecord>, DatabaseError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            debug!(sender = %record.id, "create skipped, record exists");
            return Ok(None);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(Some(record.clone()))
    }

    async fn update(
        &self,
        id: &SenderId,
        patch: &UserPatch,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };
        record.apply(patch, Utc::now());
        Ok(Some(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{SenderProfile, UserStatus};

    #[tokio::test]
    async fn create_then_get() {
        let store = MemoryUserStore::new();
        let record = UserRecord::from_profile(&SenderProfile::bare(42));

        let created = store.create(&record).await.unwrap();
        assert_eq!(created, Some(record.clone()));

        let fetched = store.get(&SenderId::from(42)).await.unwrap();
        assert_eq!(fetched, Some(record));
    }

    #[tokio::test]
    async fn create_is_not_upsert() {
        let store = MemoryUserStore::new();
        let first = UserRecord::from_profile(&SenderProfile::bare(42).with_username("first"));
        let second = UserRecord::from_profile(&SenderProfile::bare(42).with_username("second"));

        assert!(store.create(&first).await.unwrap().is_some());
        assert!(store.create(&second).await.unwrap().is_none());

        let stored = store.get(&SenderId::from(42)).await.unwrap().unwrap();
        assert_eq!(stored.username.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn update_missing_returns_none() {
        let store = MemoryUserStore::new();
        let updated = store
            .update(&SenderId::from(7), &UserPatch::status(UserStatus::Registered))
            .await
            .unwrap();
        assert!(updated.is_none());
        assert!(store.get(&SenderId::from(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_applies_patch() {
        let store = MemoryUserStore::new();
        store
            .create(&UserRecord::from_profile(&SenderProfile::bare(42)))
            .await
            .unwrap();

        let updated = store
            .update(&SenderId::from(42), &UserPatch::status(UserStatus::Rejected))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, UserStatus::Rejected);

        let stored = store.get(&SenderId::from(42)).await.unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Rejected);
    }
}
