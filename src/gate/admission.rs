//! Admission state machine — decides whether an event reaches the handler.
//!
//! The decision is an ordered pipeline of guards over (is-admin, record).
//! Each guard either passes or settles the outcome; the first guard that
//! settles wins:
//!
//! 1. `AdminRegistration` — the configured admin without a registered admin
//!    record gets one; the triggering event is consumed by the welcome.
//! 2. `KnownSender` — an existing record admits admins (configured, or
//!    recorded as a registered admin) and registered senders, holds `new`
//!    ones and silently drops `rejected` ones.
//! 3. `UnknownSender` — no record: start the approval request path.
//!
//! Admin status is derived per event from the stored record or the
//! classifier, never cached.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::gate::approval::{ApprovalProtocol, InitiateOutcome, InitiateSource};
use crate::gate::locks::SenderLocks;
use crate::gate::notify::Notifier;
use crate::gate::prompts;
use crate::identity::AdminIdentity;
use crate::store::UserStore;
use crate::users::{SenderProfile, UserPatch, UserRecord, UserStatus};

/// Why an event was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitReason {
    /// The sender is the configured admin.
    AdminBypass,
    /// The sender's record is `registered`.
    Registered,
}

/// What the state machine decided for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    RegisterAdmin,
    Admit(AdmitReason),
    HoldPending,
    DenySilently,
    StartRegistration,
}

/// Why an event stopped at the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Admin's first contact, consumed by registration.
    AdminRegistered,
    /// Sender's request is still pending.
    PendingApproval,
    /// Sender is rejected; nothing was sent.
    Denied(UserStatus),
    /// Unknown sender; the approval request path ran.
    RequestPath(InitiateOutcome),
}

/// Result of running an event through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed(AdmitReason),
    Terminate(Termination),
}

#[derive(Debug, Clone, Copy)]
enum Guard {
    AdminRegistration,
    KnownSender,
    UnknownSender,
}

const PIPELINE: [Guard; 3] = [
    Guard::AdminRegistration,
    Guard::KnownSender,
    Guard::UnknownSender,
];

impl Guard {
    /// `None` passes the event to the next guard.
    fn check(self, is_admin: bool, record: Option<&UserRecord>) -> Option<Admission> {
        match self {
            Self::AdminRegistration => {
                let registered = record.is_some_and(UserRecord::is_registered_admin);
                (is_admin && !registered).then_some(Admission::RegisterAdmin)
            }
            Self::KnownSender => {
                let record = record?;
                if is_admin || record.is_registered_admin() {
                    return Some(Admission::Admit(AdmitReason::AdminBypass));
                }
                Some(match record.status {
                    UserStatus::Registered => Admission::Admit(AdmitReason::Registered),
                    UserStatus::New => Admission::HoldPending,
                    UserStatus::Rejected => Admission::DenySilently,
                })
            }
            Self::UnknownSender => record.is_none().then_some(Admission::StartRegistration),
        }
    }
}

/// Pure transition function of the admission state machine.
pub fn decide(is_admin: bool, record: Option<&UserRecord>) -> Admission {
    PIPELINE
        .iter()
        .find_map(|guard| guard.check(is_admin, record))
        .unwrap_or(Admission::DenySilently)
}

/// Runs `decide` against the store and applies its effects.
pub struct AdmissionGate {
    store: Arc<dyn UserStore>,
    admin: AdminIdentity,
    locks: Arc<SenderLocks>,
    protocol: Arc<ApprovalProtocol>,
    notifier: Notifier,
}

impl AdmissionGate {
    pub fn new(
        store: Arc<dyn UserStore>,
        admin: AdminIdentity,
        locks: Arc<SenderLocks>,
        protocol: Arc<ApprovalProtocol>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            admin,
            locks,
            protocol,
            notifier,
        }
    }

    /// Decide admission for one event from `profile`, replying to `chat_id`.
    ///
    /// Store failures are returned to the caller, which drops the event.
    pub async fn admit(
        &self,
        profile: &SenderProfile,
        chat_id: &str,
    ) -> Result<Verdict, DatabaseError> {
        let is_admin = self.admin.is_admin(&profile.id);
        let guard = self.locks.lock(&profile.id).await;
        let record = self.store.get(&profile.id).await?;
        let admission = decide(is_admin, record.as_ref());
        debug!(sender = %profile.id, is_admin, ?admission, "Admission decided");

        let verdict = match admission {
            Admission::Admit(reason) => Verdict::Proceed(reason),
            Admission::RegisterAdmin => {
                let registered = self.register_admin(profile, record).await?;
                drop(guard);
                info!(sender = %registered.id, "Admin registered");
                self.notifier.text(chat_id, prompts::ADMIN_WELCOME).await;
                Verdict::Terminate(Termination::AdminRegistered)
            }
            Admission::HoldPending => {
                drop(guard);
                self.notifier.text(chat_id, prompts::STILL_PENDING).await;
                Verdict::Terminate(Termination::PendingApproval)
            }
            Admission::DenySilently => {
                let status = record.map(|r| r.status).unwrap_or(UserStatus::Rejected);
                warn!(sender = %profile.id, %status, "Rejected sender is still using the bot");
                Verdict::Terminate(Termination::Denied(status))
            }
            Admission::StartRegistration => {
                let outcome = self
                    .protocol
                    .initiate_locked(&guard, profile, chat_id, record, InitiateSource::FirstContact)
                    .await?;
                Verdict::Terminate(Termination::RequestPath(outcome))
            }
        };

        Ok(verdict)
    }

    /// Create or upgrade the admin's record to registered + admin.
    async fn register_admin(
        &self,
        profile: &SenderProfile,
        existing: Option<UserRecord>,
    ) -> Result<UserRecord, DatabaseError> {
        if existing.is_none()
            && let Some(created) = self
                .store
                .create(&UserRecord::admin_from_profile(profile))
                .await?
        {
            return Ok(created);
        }

        if let Some(upgraded) = self
            .store
            .update(&profile.id, &UserPatch::promote_admin())
            .await?
        {
            return Ok(upgraded);
        }

        // The record vanished between read and update; create it afresh.
        self.store
            .create(&UserRecord::admin_from_profile(profile))
            .await?
            .ok_or_else(|| {
                DatabaseError::Query(format!("could not register admin record for {}", profile.id))
            })
    }
}
