//! Operator side channel.
//!
//! Notifications are best-effort: a failure is logged and never reaches the
//! user. [`BestEffort`] makes the caller acknowledge the outcome.

use async_trait::async_trait;
use glyphsmith_core::channel::Channel;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a best-effort delivery.
#[must_use = "acknowledge the outcome with `discard()`"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestEffort {
    failure: Option<String>,
}

impl BestEffort {
    pub fn delivered() -> Self {
        Self { failure: None }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.failure.is_none()
    }

    /// Log a failure and move on. Returns whether the delivery went through.
    pub fn discard(self) -> bool {
        match self.failure {
            None => true,
            Some(reason) => {
                warn!(%reason, "Operator notification failed");
                false
            }
        }
    }
}

impl<E: std::fmt::Display> From<Result<(), E>> for BestEffort {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::delivered(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Something that can reach the bot's operator.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> BestEffort;
}

/// Sends operator notes through a chat channel.
pub struct ChannelOperator {
    channel: Arc<dyn Channel>,
    chat_id: Option<String>,
}

impl ChannelOperator {
    pub fn new(channel: Arc<dyn Channel>, chat_id: Option<String>) -> Self {
        Self { channel, chat_id }
    }
}

#[async_trait]
impl OperatorNotifier for ChannelOperator {
    async fn notify(&self, text: &str) -> BestEffort {
        let Some(chat_id) = self.chat_id.as_deref() else {
            return BestEffort::failed("no operator chat configured");
        };
        debug!(channel = %self.channel.name(), "Notifying operator");
        self.channel.send_text(chat_id, text, &[]).await.into()
    }
}

/// Drops every notification.
pub struct NullOperator;

#[async_trait]
impl OperatorNotifier for NullOperator {
    async fn notify(&self, _text: &str) -> BestEffort {
        BestEffort::failed("operator notifications disabled")
    }
}
