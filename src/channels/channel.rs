//! Transport abstraction — inbound events and outbound operations.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::users::SenderProfile;

/// What kind of update the sender produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A plain chat message.
    Message { text: String },
    /// An inline-button press. `action_id` is the transport's handle used to
    /// acknowledge it; `payload` is the tagged string bound to the button.
    Action { action_id: String, payload: String },
}

/// An inbound update from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: SenderProfile,
    /// Where replies to this event go. For private chats this equals the
    /// sender id.
    pub chat_id: String,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn message(sender: SenderProfile, text: impl Into<String>) -> Self {
        let chat_id = sender.id.to_string();
        Self {
            sender,
            chat_id,
            kind: EventKind::Message { text: text.into() },
        }
    }

    pub fn action(
        sender: SenderProfile,
        action_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let chat_id = sender.id.to_string();
        Self {
            sender,
            chat_id,
            kind: EventKind::Action {
                action_id: action_id.into(),
                payload: payload.into(),
            },
        }
    }

    /// Builder: reply to a chat other than the sender's private chat.
    pub fn in_chat(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = chat_id.into();
        self
    }
}

/// One inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub action_tag: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, action_tag: impl ToString) -> Self {
        Self {
            label: label.into(),
            action_tag: action_tag.to_string(),
        }
    }
}

/// Stream of inbound events produced by a transport.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// Outbound operations the gatekeeper needs from a transport.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Transport name for logs.
    fn name(&self) -> &str;

    /// Send a plain text message.
    async fn send_text(&self, target: &str, text: &str) -> Result<(), ChannelError>;

    /// Send a message with a row of inline choices.
    async fn send_choice(
        &self,
        target: &str,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), ChannelError>;

    /// Acknowledge an inline action so the client stops waiting.
    async fn acknowledge_action(&self, action_id: &str, text: &str) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SenderId;

    #[test]
    fn message_defaults_chat_to_sender() {
        let event = InboundEvent::message(SenderProfile::bare(42), "hi");
        assert_eq!(event.chat_id, "42");
        assert_eq!(event.sender.id, SenderId::from(42));
        assert_eq!(
            event.kind,
            EventKind::Message {
                text: "hi".into()
            }
        );
    }

    #[test]
    fn in_chat_overrides_target() {
        let event = InboundEvent::action(SenderProfile::bare(42), "cb1", "allow|7").in_chat("-100");
        assert_eq!(event.chat_id, "-100");
    }
}
