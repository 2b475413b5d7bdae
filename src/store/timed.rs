//! Timeout decorator for any `UserStore`.
//!
//! An elapsed deadline surfaces as `DatabaseError::Timeout`, which callers
//! handle exactly like any other store failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::identity::SenderId;
use crate::store::traits::UserStore;
use crate::users::{UserPatch, UserRecord};

/// Wraps a store and bounds every call by `timeout`.
pub struct TimedUserStore {
    inner: Arc<dyn UserStore>,
    timeout: Duration,
}

impl TimedUserStore {
    pub fn new(inner: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, DatabaseError>>,
    ) -> Result<T, DatabaseError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DatabaseError::Timeout {
                operation,
                timeout: self.timeout,
            })?
    }
}

#[async_trait]
impl UserStore for TimedUserStore {
    async fn get(&self, id: &SenderId) -> Result<Option<UserRecord>, DatabaseError> {
        self.bounded("get", self.inner.get(id)).await
    }

    async fn create(&self, record: &UserRecord) -> Result<Option<UserRecord>, DatabaseError> {
        self.bounded("create", self.inner.create(record)).await
    }

    async fn update(
        &self,
        id: &SenderId,
        patch: &UserPatch,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        self.bounded("update", self.inner.update(id, patch)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;
    use crate::users::SenderProfile;

    /// A store whose `get` never completes.
    struct StalledStore;

    #[async_trait]
    impl UserStore for StalledStore {
        async fn get(&self, _id: &SenderId) -> Result<Option<UserRecord>, DatabaseError> {
            std::future::pending().await
        }
        async fn create(&self, record: &UserRecord) -> Result<Option<UserRecord>, DatabaseError> {
            Ok(Some(record.clone()))
        }
        async fn update(
            &self,
            _id: &SenderId,
            _patch: &UserPatch,
        ) -> Result<Option<UserRecord>, DatabaseError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn stalled_call_times_out() {
        let store = TimedUserStore::new(Arc::new(StalledStore), Duration::from_millis(20));
        let err = store.get(&SenderId::from(1)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Timeout { operation: "get", .. }));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let store = TimedUserStore::new(Arc::new(MemoryUserStore::new()), Duration::from_secs(1));
        let record = UserRecord::from_profile(&SenderProfile::bare(5));
        assert!(store.create(&record).await.unwrap().is_some());
        assert_eq!(store.get(&SenderId::from(5)).await.unwrap(), Some(record));
    }
}
