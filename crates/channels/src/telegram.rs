//! Telegram channel adapter (stub).
//!
//! Implements the Channel trait for the Telegram Bot API.
//! In production, this would use `teloxide` for long-polling or webhook mode.
//! Currently a stub: inbound messages are injected in-process and outbound
//! replies are recorded in an outbox.

use async_trait::async_trait;
use glyphsmith_core::channel::{Button, Channel, ChannelId, ChannelMessage, Inbound, MenuChoice, Outbound};
use glyphsmith_core::error::ChannelError;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::info;

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Allowed user IDs or usernames. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

/// One reply the stub would have sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub chat_id: String,
    pub message: Outbound,
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    channel_id: ChannelId,
    /// Sender for injecting messages.
    inject_tx: Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    outbox: Mutex<Vec<Delivery>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("telegram".into()),
            inject_tx: Mutex::new(None),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Inject a message as if it came from Telegram.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    /// Build a message from a private chat, where chat id equals user id.
    pub fn private_message(&self, user_id: &str, payload: Inbound) -> ChannelMessage {
        ChannelMessage::new(self.channel_id.clone(), user_id, user_id, payload)
    }

    /// Map inline-keyboard callback data to a button press.
    pub fn callback_payload(data: &str) -> Result<Inbound, ChannelError> {
        MenuChoice::from_callback(data)
            .map(|choice| Inbound::Choice { choice })
            .ok_or_else(|| ChannelError::InvalidPayload(format!("unknown callback data: {data}")))
    }

    /// Everything sent so far.
    pub async fn outbox(&self) -> Vec<Delivery> {
        self.outbox.lock().await.clone()
    }

    /// Drain the outbox.
    pub async fn take_outbox(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.outbox.lock().await)
    }

    async fn record(&self, chat_id: &str, message: Outbound) {
        self.outbox.lock().await.push(Delivery {
            chat_id: chat_id.to_string(),
            message,
        });
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!("Telegram channel starting (stub mode)");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        // In production: spawn teloxide long-polling loop here
        Ok(rx)
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<(), ChannelError> {
        info!(
            chat_id = %chat_id,
            text_len = text.len(),
            button_rows = buttons.len(),
            "Telegram send (stub)"
        );
        // In production: Bot::send_message with an InlineKeyboardMarkup whose
        // callback data is MenuChoice::callback_data
        self.record(chat_id, Outbound::with_buttons(text, buttons.to_vec()))
            .await;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: &str,
        bytes: &[u8],
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        info!(
            chat_id = %chat_id,
            filename = %filename,
            size = bytes.len(),
            "Telegram document (stub)"
        );
        // In production: Bot::send_document with InputFile::memory
        self.record(
            chat_id,
            Outbound::Document {
                filename: filename.to_string(),
                caption: caption.map(str::to_string),
                bytes: bytes.to_vec(),
            },
        )
        .await;
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.config.allowed_users.is_empty() {
            return false;
        }
        if self.config.allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        self.config.allowed_users.iter().any(|u| u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        // In production: call getMe API
        Ok(!self.config.bot_token.is_empty())
    }
}
