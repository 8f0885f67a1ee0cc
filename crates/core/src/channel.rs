//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects Glyphsmith to a messaging platform (Telegram, CLI, ...).
//! It turns platform updates into typed [`Inbound`] payloads and renders
//! [`Outbound`] replies (text with button rows, or a document) back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The chat/DM identifier replies go to
    pub chat_id: String,

    /// What the user sent
    pub payload: Inbound,

    /// Platform-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChannelMessage {
    /// Build a message with no sender name and no metadata.
    pub fn new(
        channel_id: ChannelId,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        payload: Inbound,
    ) -> Self {
        Self {
            channel_id,
            sender_id: sender_id.into(),
            sender_name: None,
            chat_id: chat_id.into(),
            payload,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach a display name for the sender.
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}

/// Inbound payload, already classified by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inbound {
    /// A slash command (`/start`, `/cancel`)
    Command { command: Command },
    /// A button press
    Choice { choice: MenuChoice },
    /// Free text
    Text { text: String },
    /// An uploaded file
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default)]
        bytes: Vec<u8>,
    },
}

impl Inbound {
    /// Classify a line of user text: recognized commands become
    /// [`Inbound::Command`], everything else stays text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        match Command::parse(&text) {
            Some(command) => Inbound::Command { command },
            None => Inbound::Text { text },
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::Command { .. } => "command",
            Inbound::Choice { .. } => "choice",
            Inbound::Text { .. } => "text",
            Inbound::File { .. } => "file",
        }
    }
}

/// Slash commands understood in every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Cancel,
}

impl Command {
    /// Parse `/start` or `/cancel`, with an optional `@botname` suffix.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

/// Discrete button events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuChoice {
    BuildFont,
    AddGlyph,
    Finish,
    BackToMain,
    CancelAdd,
}

impl MenuChoice {
    /// Every choice, in menu order.
    pub const ALL: [MenuChoice; 5] = [
        MenuChoice::BuildFont,
        MenuChoice::AddGlyph,
        MenuChoice::Finish,
        MenuChoice::BackToMain,
        MenuChoice::CancelAdd,
    ];

    /// Callback identifier carried by the platform button.
    pub fn callback_data(self) -> &'static str {
        match self {
            MenuChoice::BuildFont => "build_font",
            MenuChoice::AddGlyph => "add_glyph",
            MenuChoice::Finish => "finish_font",
            MenuChoice::BackToMain => "back_to_main",
            MenuChoice::CancelAdd => "cancel_add",
        }
    }

    /// Inverse of [`MenuChoice::callback_data`].
    pub fn from_callback(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.callback_data() == data)
    }
}

/// A button shown under a text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub choice: MenuChoice,
}

impl Button {
    pub fn new(label: impl Into<String>, choice: MenuChoice) -> Self {
        Self {
            label: label.into(),
            choice,
        }
    }
}

/// A reply produced by the session layer, ready for a channel to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    Text {
        text: String,
        /// Button rows; empty means no keyboard
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Vec<Button>>,
    },
    Document {
        filename: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        bytes: Vec<u8>,
    },
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Text {
            text: text.into(),
            buttons: vec![],
        }
    }

    pub fn with_buttons(text: impl Into<String>, buttons: Vec<Vec<Button>>) -> Self {
        Outbound::Text {
            text: text.into(),
            buttons,
        }
    }

    /// The text body, if this is a text reply.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Outbound::Text { text, .. } => Some(text),
            Outbound::Document { .. } => None,
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, file download,
/// keyboard rendering, and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields incoming messages. File payloads arrive
    /// with their bytes already downloaded.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a text message, optionally with rows of buttons.
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> std::result::Result<(), ChannelError>;

    /// Send a binary document.
    async fn send_document(
        &self,
        chat_id: &str,
        bytes: &[u8],
        filename: &str,
        caption: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;

    /// Render one [`Outbound`] reply.
    async fn deliver(&self, chat_id: &str, message: &Outbound) -> std::result::Result<(), ChannelError> {
        match message {
            Outbound::Text { text, buttons } => self.send_text(chat_id, text, buttons).await,
            Outbound::Document {
                filename,
                caption,
                bytes,
            } => {
                self.send_document(chat_id, bytes, filename, caption.as_deref())
                    .await
            }
        }
    }

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
