//! Test doubles shared by the gate's unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::channels::{Choice, Outbound};
use crate::error::{ChannelError, DatabaseError};
use crate::gate::admission::AdmissionGate;
use crate::gate::approval::ApprovalProtocol;
use crate::gate::locks::SenderLocks;
use crate::gate::notify::Notifier;
use crate::identity::{AdminIdentity, SenderId};
use crate::store::{MemoryUserStore, UserStore};
use crate::users::{UserPatch, UserRecord};

/// One outbound call captured by [`RecordingOutbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        target: String,
        text: String,
    },
    Choice {
        target: String,
        text: String,
        tags: Vec<String>,
    },
    Ack {
        action_id: String,
        text: String,
    },
}

impl Sent {
    pub fn text(target: &str, text: &str) -> Self {
        Self::Text {
            target: target.into(),
            text: text.into(),
        }
    }

    pub fn ack(action_id: &str, text: &str) -> Self {
        Self::Ack {
            action_id: action_id.into(),
            text: text.into(),
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Text { target, .. } | Self::Choice { target, .. } => Some(target),
            Self::Ack { .. } => None,
        }
    }
}

#[derive(Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<Sent>>,
    fail_sends: bool,
}

impl RecordingOutbound {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: true,
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, target: &str) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.target() == Some(target))
            .collect()
    }

    fn record(&self, sent: Sent) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(sent);
        if self.fail_sends {
            return Err(ChannelError::SendFailed {
                name: "recording".into(),
                reason: "configured to fail".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        self.record(Sent::text(target, text))
    }

    async fn send_choice(
        &self,
        target: &str,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), ChannelError> {
        self.record(Sent::Choice {
            target: target.into(),
            text: text.into(),
            tags: choices.iter().map(|c| c.action_tag.clone()).collect(),
        })
    }

    async fn acknowledge_action(&self, action_id: &str, text: &str) -> Result<(), ChannelError> {
        self.record(Sent::ack(action_id, text))
    }
}

/// A store where every call fails.
pub struct FailingStore;

#[async_trait]
impl UserStore for FailingStore {
    async fn get(&self, _id: &SenderId) -> Result<Option<UserRecord>, DatabaseError> {
        Err(DatabaseError::Pool("store offline".into()))
    }
    async fn create(&self, _record: &UserRecord) -> Result<Option<UserRecord>, DatabaseError> {
        Err(DatabaseError::Pool("store offline".into()))
    }
    async fn update(
        &self,
        _id: &SenderId,
        _patch: &UserPatch,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        Err(DatabaseError::Pool("store offline".into()))
    }
}

/// Gate and protocol wired to an in-memory store and a recording transport.
pub struct Harness {
    pub store: Arc<dyn UserStore>,
    pub outbound: Arc<RecordingOutbound>,
    pub protocol: Arc<ApprovalProtocol>,
    pub gate: AdmissionGate,
}

impl Harness {
    pub fn new(admin: &str) -> Self {
        Self::build(admin, Arc::new(MemoryUserStore::new()), RecordingOutbound::default())
    }

    pub fn failing(admin: &str) -> Self {
        Self::build(admin, Arc::new(FailingStore), RecordingOutbound::default())
    }

    pub fn with_failing_sends(admin: &str) -> Self {
        Self::build(admin, Arc::new(MemoryUserStore::new()), RecordingOutbound::failing())
    }

    fn build(admin: &str, store: Arc<dyn UserStore>, outbound: RecordingOutbound) -> Self {
        let outbound = Arc::new(outbound);
        let admin = AdminIdentity::new(Some(admin));
        let locks = Arc::new(SenderLocks::new());
        let notifier = Notifier::new(outbound.clone(), Duration::from_secs(1));
        let protocol = Arc::new(ApprovalProtocol::new(
            Arc::clone(&store),
            admin.clone(),
            Arc::clone(&locks),
            notifier.clone(),
        ));
        let gate = AdmissionGate::new(
            Arc::clone(&store),
            admin,
            locks,
            Arc::clone(&protocol),
            notifier,
        );
        Self {
            store,
            outbound,
            protocol,
            gate,
        }
    }
}
