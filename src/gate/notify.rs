//! Best-effort outbound notifications.
//!
//! State changes are committed before anything is sent, so a failed or
//! timed-out send is logged and otherwise ignored.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::channels::{Choice, Outbound};
use crate::error::ChannelError;

/// Wraps an `Outbound` transport with a per-send deadline.
#[derive(Clone)]
pub struct Notifier {
    outbound: Arc<dyn Outbound>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(outbound: Arc<dyn Outbound>, timeout: Duration) -> Self {
        Self { outbound, timeout }
    }

    /// Send text; returns whether it was delivered.
    pub async fn text(&self, target: &str, text: &str) -> bool {
        self.deliver("send_text", target, self.outbound.send_text(target, text))
            .await
    }

    /// Send text with inline choices; returns whether it was delivered.
    pub async fn choice(&self, target: &str, text: &str, choices: &[Choice]) -> bool {
        self.deliver(
            "send_choice",
            target,
            self.outbound.send_choice(target, text, choices),
        )
        .await
    }

    /// Acknowledge an inline action; returns whether it was delivered.
    pub async fn acknowledge(&self, action_id: &str, text: &str) -> bool {
        self.deliver(
            "acknowledge_action",
            action_id,
            self.outbound.acknowledge_action(action_id, text),
        )
        .await
    }

    async fn deliver(
        &self,
        operation: &'static str,
        target: &str,
        fut: impl Future<Output = Result<(), ChannelError>>,
    ) -> bool {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout {
                name: self.outbound.name().to_string(),
                timeout: self.timeout,
            }),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(operation, target, error = %e, "Outbound notification failed");
                false
            }
        }
    }
}
