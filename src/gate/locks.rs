//! Per-sender serialization of read-modify-write sequences.
//!
//! Each sender id maps to its own async mutex. Map entries hold only weak
//! references, so a sender with no in-flight event costs nothing beyond a
//! stale map slot that the next `lock` call sweeps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::identity::SenderId;

/// Held while a sender's record is being read and written.
pub struct SenderGuard {
    sender: SenderId,
    _guard: OwnedMutexGuard<()>,
}

impl SenderGuard {
    pub fn sender(&self) -> &SenderId {
        &self.sender
    }
}

/// Keyed async locks, one per sender id.
#[derive(Default)]
pub struct SenderLocks {
    slots: Mutex<HashMap<SenderId, Weak<AsyncMutex<()>>>>,
}

impl SenderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `sender`.
    pub async fn lock(&self, sender: &SenderId) -> SenderGuard {
        let slot = self.slot(sender);
        let guard = slot.lock_owned().await;
        SenderGuard {
            sender: sender.clone(),
            _guard: guard,
        }
    }

    fn slot(&self, sender: &SenderId) -> Arc<AsyncMutex<()>> {
        // The std mutex is never held across an await.
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(existing) = slots.get(sender).and_then(Weak::upgrade) {
            return existing;
        }

        slots.retain(|_, w| w.strong_count() > 0);
        let fresh = Arc::new(AsyncMutex::new(()));
        slots.insert(sender.clone(), Arc::downgrade(&fresh));
        fresh
    }
}
