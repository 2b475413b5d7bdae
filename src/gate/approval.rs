//! Approval handshake — request, notify the admin, decide, inform both sides.
//!
//! A pending request is nothing more than a record in status `new`; there is
//! no separate request entity. Every read-modify-write on a record runs under
//! that sender's lock from [`SenderLocks`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::gate::action::Decision;
use crate::gate::locks::{SenderGuard, SenderLocks};
use crate::gate::notify::Notifier;
use crate::gate::prompts;
use crate::identity::{AdminIdentity, SenderId};
use crate::store::UserStore;
use crate::users::{SenderProfile, UserPatch, UserRecord, UserStatus};

/// How the request path was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiateSource {
    /// An unknown sender's first event.
    FirstContact,
    /// The sender pressed "Request Access".
    RequestAction,
}

/// Result of [`ApprovalProtocol::initiate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiateOutcome {
    /// Record created, sender prompted, admin notified.
    RequestCreated,
    /// A request is already pending; the sender was asked to be patient.
    StillPending,
    /// The handshake already finished for this sender; nothing was sent.
    AlreadyResolved(UserStatus),
}

/// Result of [`ApprovalProtocol::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Status written; `previous` is the status before this decision.
    Applied {
        record: UserRecord,
        previous: UserStatus,
    },
    /// No record exists for the target id.
    UnknownSender,
    /// The target is the configured admin or holds an admin record, which is
    /// not decidable.
    AdminProtected,
}

/// The two-party approval protocol.
pub struct ApprovalProtocol {
    store: Arc<dyn UserStore>,
    admin: AdminIdentity,
    locks: Arc<SenderLocks>,
    notifier: Notifier,
}

impl ApprovalProtocol {
    pub fn new(
        store: Arc<dyn UserStore>,
        admin: AdminIdentity,
        locks: Arc<SenderLocks>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            admin,
            locks,
            notifier,
        }
    }

    /// Start (or re-trigger) an access request for `profile`.
    pub async fn initiate(
        &self,
        profile: &SenderProfile,
        chat_id: &str,
        source: InitiateSource,
    ) -> Result<InitiateOutcome, DatabaseError> {
        let guard = self.locks.lock(&profile.id).await;
        let existing = self.store.get(&profile.id).await?;
        self.initiate_locked(&guard, profile, chat_id, existing, source)
            .await
    }

    /// Request path for a caller that already holds the sender's lock and
    /// has read its record.
    pub(crate) async fn initiate_locked(
        &self,
        guard: &SenderGuard,
        profile: &SenderProfile,
        chat_id: &str,
        existing: Option<UserRecord>,
        source: InitiateSource,
    ) -> Result<InitiateOutcome, DatabaseError> {
        debug_assert_eq!(guard.sender(), &profile.id);

        let record = match existing {
            Some(record) => record,
            None => match self.store.create(&UserRecord::from_profile(profile)).await? {
                Some(created) => {
                    info!(sender = %created.id, ?source, "Access request created");
                    self.announce(profile, chat_id, source).await;
                    return Ok(InitiateOutcome::RequestCreated);
                }
                None => {
                    // Another writer created the record first; it owns the
                    // admin notification.
                    debug!(sender = %profile.id, "Record appeared during create, re-fetching");
                    self.store.get(&profile.id).await?.ok_or_else(|| {
                        DatabaseError::Query(format!(
                            "record for {} reported as existing but not found",
                            profile.id
                        ))
                    })?
                }
            },
        };

        if record.status.is_terminal() {
            debug!(sender = %record.id, status = %record.status, "Access request ignored, already resolved");
            return Ok(InitiateOutcome::AlreadyResolved(record.status));
        }

        debug!(sender = %record.id, "Duplicate access request");
        self.notifier
            .text(chat_id, prompts::STILL_PENDING_BE_PATIENT)
            .await;
        Ok(InitiateOutcome::StillPending)
    }

    /// Tell the sender their request exists and put the decision to the admin.
    async fn announce(&self, profile: &SenderProfile, chat_id: &str, source: InitiateSource) {
        let admin_notice = match source {
            InitiateSource::FirstContact => {
                self.notifier
                    .choice(
                        chat_id,
                        prompts::NOT_AUTHORIZED,
                        &prompts::request_access_choice(&profile.id),
                    )
                    .await;
                prompts::unknown_sender_notice(profile)
            }
            InitiateSource::RequestAction => {
                self.notifier.text(chat_id, prompts::REQUEST_SENT).await;
                prompts::access_request_notice(profile)
            }
        };

        let Some(admin) = self.admin.admin_id() else {
            warn!(sender = %profile.id, "No admin configured; access request cannot be decided");
            return;
        };

        self.notifier
            .choice(
                admin.as_str(),
                &admin_notice,
                &prompts::decision_choices(&profile.id),
            )
            .await;
    }

    /// Apply the admin's decision for `target`.
    ///
    /// The admin's action is acknowledged before anything else. The last
    /// decision wins: resolving an already-resolved sender overrides it, and
    /// every call re-sends both notifications.
    pub async fn resolve(
        &self,
        decision: Decision,
        target: &SenderId,
        action_id: Option<&str>,
    ) -> Result<ResolveOutcome, DatabaseError> {
        if let Some(action_id) = action_id {
            self.notifier
                .acknowledge(action_id, prompts::RESOLVE_ACK)
                .await;
        }

        let admin_chat = self
            .admin
            .admin_id()
            .map(|id| id.to_string())
            .unwrap_or_default();

        if self.admin.is_admin(target) {
            return self.admin_protected(decision, target, &admin_chat).await;
        }

        let status = match decision {
            Decision::Allow => UserStatus::Registered,
            Decision::Reject => UserStatus::Rejected,
        };

        let (record, previous) = {
            let _guard = self.locks.lock(target).await;

            let Some(current) = self.store.get(target).await? else {
                return self.unknown_sender(target, &admin_chat).await;
            };
            if current.is_admin {
                return self.admin_protected(decision, target, &admin_chat).await;
            }
            let Some(record) = self.store.update(target, &UserPatch::status(status)).await? else {
                return self.unknown_sender(target, &admin_chat).await;
            };
            (record, current.status)
        };

        if previous.can_transition_to(status) {
            info!(sender = %target, %status, "Access request resolved");
        } else {
            info!(sender = %target, from = %previous, to = %status, "Access decision re-applied");
        }

        self.notifier
            .text(target.as_str(), prompts::outcome_for_user(decision))
            .await;
        self.notifier
            .text(&admin_chat, &prompts::outcome_for_admin(decision, &record))
            .await;

        Ok(ResolveOutcome::Applied { record, previous })
    }

    async fn admin_protected(
        &self,
        decision: Decision,
        target: &SenderId,
        admin_chat: &str,
    ) -> Result<ResolveOutcome, DatabaseError> {
        warn!(sender = %target, %decision, "Refusing to resolve an admin record");
        self.notifier
            .text(admin_chat, &prompts::cannot_resolve_admin_notice(target))
            .await;
        Ok(ResolveOutcome::AdminProtected)
    }

    async fn unknown_sender(
        &self,
        target: &SenderId,
        admin_chat: &str,
    ) -> Result<ResolveOutcome, DatabaseError> {
        warn!(sender = %target, "Decision for a sender with no record");
        self.notifier
            .text(admin_chat, &prompts::unknown_record_notice(target))
            .await;
        Ok(ResolveOutcome::UnknownSender)
    }
}
