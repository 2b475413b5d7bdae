//! Event dispatcher — routes every inbound event through the gate.
//!
//! Messages pass the admission state machine and reach the business handler
//! only when admitted. Inline actions are routed by their tag: `requestAccess`
//! re-enters the approval request path for the acting sender, `allow` and
//! `reject` are honoured only from the configured admin.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::channels::{EventKind, EventStream, InboundEvent, Outbound};
use crate::error::ChannelError;
use crate::gate::{
    ActionTag, AdmissionGate, AdmitReason, ApprovalProtocol, InitiateOutcome, InitiateSource,
    Notifier, ResolveOutcome, SenderLocks, Termination, Verdict, prompts,
};
use crate::identity::AdminIdentity;
use crate::store::UserStore;

/// Business logic for admitted messages.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, event: &InboundEvent, text: &str) -> Result<(), ChannelError>;
}

/// Replies with a wave to every admitted text message.
pub struct EchoHandler {
    outbound: Arc<dyn Outbound>,
}

impl EchoHandler {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, event: &InboundEvent, text: &str) -> Result<(), ChannelError> {
        if text.is_empty() {
            return Ok(());
        }
        self.outbound
            .send_text(&event.chat_id, prompts::ECHO_REPLY)
            .await
    }
}

/// Why an action was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    MalformedAction,
    NotAdmin,
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Admitted and passed to the business handler.
    Handled(AdmitReason),
    /// Stopped by the admission gate.
    Stopped(Termination),
    /// A `requestAccess` action ran the request path.
    AccessRequested(InitiateOutcome),
    /// An admin decision was applied (or refused).
    Resolved(ResolveOutcome),
    /// The action was not acted on.
    Ignored(IgnoreReason),
    /// The store failed; the event was dropped.
    Dropped,
}

pub struct Dispatcher {
    admin: AdminIdentity,
    gate: AdmissionGate,
    protocol: Arc<ApprovalProtocol>,
    handler: Arc<dyn MessageHandler>,
    notifier: Notifier,
}

impl Dispatcher {
    pub fn new(
        admin: AdminIdentity,
        gate: AdmissionGate,
        protocol: Arc<ApprovalProtocol>,
        handler: Arc<dyn MessageHandler>,
        notifier: Notifier,
    ) -> Self {
        Self {
            admin,
            gate,
            protocol,
            handler,
            notifier,
        }
    }

    /// Wire gate, protocol and handler around one store and one transport.
    pub fn assemble(
        store: Arc<dyn UserStore>,
        outbound: Arc<dyn Outbound>,
        admin: AdminIdentity,
        send_timeout: Duration,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let locks = Arc::new(SenderLocks::new());
        let notifier = Notifier::new(outbound, send_timeout);
        let protocol = Arc::new(ApprovalProtocol::new(
            Arc::clone(&store),
            admin.clone(),
            Arc::clone(&locks),
            notifier.clone(),
        ));
        let gate = AdmissionGate::new(
            store,
            admin.clone(),
            locks,
            Arc::clone(&protocol),
            notifier.clone(),
        );
        Self::new(admin, gate, protocol, handler, notifier)
    }

    /// Consume an event stream, dispatching each event on its own task.
    pub async fn run(self: Arc<Self>, mut events: EventStream) {
        info!("Dispatcher running");
        while let Some(event) = events.next().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                dispatcher.dispatch(event).await;
            });
        }
        info!("Event stream ended");
    }

    /// Route one event.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        debug!(sender = %event.sender.id, chat = %event.chat_id, "Event received");
        match &event.kind {
            EventKind::Message { text } => self.dispatch_message(&event, text).await,
            EventKind::Action { action_id, payload } => {
                self.dispatch_action(&event, action_id, payload).await
            }
        }
    }

    async fn dispatch_message(&self, event: &InboundEvent, text: &str) -> DispatchOutcome {
        let verdict = match self.gate.admit(&event.sender, &event.chat_id).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(sender = %event.sender.id, error = %e, "Admission failed, dropping event");
                return DispatchOutcome::Dropped;
            }
        };

        match verdict {
            Verdict::Proceed(reason) => {
                if let Err(e) = self.handler.handle(event, text).await {
                    warn!(sender = %event.sender.id, error = %e, "Message handler failed");
                }
                DispatchOutcome::Handled(reason)
            }
            Verdict::Terminate(termination) => DispatchOutcome::Stopped(termination),
        }
    }

    async fn dispatch_action(
        &self,
        event: &InboundEvent,
        action_id: &str,
        payload: &str,
    ) -> DispatchOutcome {
        let tag = match payload.parse::<ActionTag>() {
            Ok(tag) => tag,
            Err(e) => {
                debug!(sender = %event.sender.id, error = %e, "Ignoring action");
                self.notifier.acknowledge(action_id, "").await;
                return DispatchOutcome::Ignored(IgnoreReason::MalformedAction);
            }
        };

        match tag {
            ActionTag::RequestAccess(subject) => {
                if subject != event.sender.id {
                    warn!(
                        sender = %event.sender.id,
                        %subject,
                        "requestAccess for another id, treating as the sender's own request"
                    );
                }
                match self
                    .protocol
                    .initiate(&event.sender, &event.chat_id, InitiateSource::RequestAction)
                    .await
                {
                    Ok(outcome) => {
                        let ack = match outcome {
                            InitiateOutcome::RequestCreated => prompts::REQUEST_SENT_ACK,
                            _ => "",
                        };
                        self.notifier.acknowledge(action_id, ack).await;
                        DispatchOutcome::AccessRequested(outcome)
                    }
                    Err(e) => {
                        error!(sender = %event.sender.id, error = %e, "Access request failed, dropping event");
                        DispatchOutcome::Dropped
                    }
                }
            }
            ActionTag::Resolve(decision, target) => {
                if !self.admin.is_admin(&event.sender.id) {
                    warn!(sender = %event.sender.id, %decision, %target, "Decision from non-admin ignored");
                    self.notifier.acknowledge(action_id, "").await;
                    return DispatchOutcome::Ignored(IgnoreReason::NotAdmin);
                }
                match self
                    .protocol
                    .resolve(decision, &target, Some(action_id))
                    .await
                {
                    Ok(outcome) => DispatchOutcome::Resolved(outcome),
                    Err(e) => {
                        error!(%target, %decision, error = %e, "Decision failed, dropping event");
                        DispatchOutcome::Dropped
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testing::{RecordingOutbound, Sent};
    use crate::identity::SenderId;
    use crate::store::MemoryUserStore;
    use crate::users::{SenderProfile, UserStatus};

    fn dispatcher() -> (Arc<Dispatcher>, Arc<RecordingOutbound>, Arc<dyn UserStore>) {
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let outbound = Arc::new(RecordingOutbound::default());
        let dyn_outbound: Arc<dyn Outbound> = outbound.clone();
        let dispatcher = Dispatcher::assemble(
            Arc::clone(&store),
            Arc::clone(&dyn_outbound),
            AdminIdentity::new(Some("1")),
            Duration::from_secs(1),
            Arc::new(EchoHandler::new(dyn_outbound)),
        );
        (Arc::new(dispatcher), outbound, store)
    }

    #[tokio::test]
    async fn request_access_acknowledged_when_created() {
        let (d, out, _) = dispatcher();
        let event = InboundEvent::action(SenderProfile::bare(42), "cb", "requestAccess|42");

        let outcome = d.dispatch(event).await;
        assert_eq!(
            outcome,
            DispatchOutcome::AccessRequested(InitiateOutcome::RequestCreated)
        );
        assert!(out.sent().contains(&Sent::ack("cb", prompts::REQUEST_SENT_ACK)));
        assert!(out.sent_to("42").contains(&Sent::text("42", prompts::REQUEST_SENT)));
    }

    #[tokio::test]
    async fn request_access_uses_acting_sender() {
        let (d, _, store) = dispatcher();
        let event = InboundEvent::action(SenderProfile::bare(42), "cb", "requestAccess|77");

        d.dispatch(event).await;
        assert!(store.get(&SenderId::from(42)).await.unwrap().is_some());
        assert!(store.get(&SenderId::from(77)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn echo_skips_empty_text() {
        let (d, out, _) = dispatcher();
        d.dispatch(InboundEvent::message(SenderProfile::bare(1), "hi"))
            .await;
        let before = out.sent().len();

        let outcome = d
            .dispatch(InboundEvent::message(SenderProfile::bare(1), ""))
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled(AdmitReason::AdminBypass));
        assert_eq!(out.sent().len(), before);
    }

    #[tokio::test]
    async fn replies_go_to_event_chat() {
        let (d, out, _) = dispatcher();
        d.dispatch(InboundEvent::message(SenderProfile::bare(1), "hi"))
            .await;
        d.dispatch(InboundEvent::message(SenderProfile::bare(1), "hi").in_chat("-100"))
            .await;
        assert_eq!(out.sent_to("-100"), vec![Sent::text("-100", prompts::ECHO_REPLY)]);
    }

    #[tokio::test]
    async fn run_drains_stream() {
        let (d, _, store) = dispatcher();
        let events = futures::stream::iter(vec![
            InboundEvent::message(SenderProfile::bare(42), "a"),
            InboundEvent::message(SenderProfile::bare(43), "b"),
        ]);

        Arc::clone(&d).run(Box::pin(events)).await;

        // Dispatch tasks are detached; give them a moment.
        for _ in 0..50 {
            let a = store.get(&SenderId::from(42)).await.unwrap();
            let b = store.get(&SenderId::from(43)).await.unwrap();
            if let (Some(a), Some(b)) = (a, b) {
                assert_eq!(a.status, UserStatus::New);
                assert_eq!(b.status, UserStatus::New);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("events were not dispatched");
    }
}
