//! Chat channel adapters for Glyphsmith.
//!
//! Each channel turns platform events into [`Inbound`] payloads and renders
//! [`Outbound`] replies. The session layer never sees platform types.
//!
//! Available channels:
//! - **Telegram**: Telegram Bot API (stub with in-process injection and an
//!   inspectable outbox)
//! - **CLI**: interactive terminal (stdin/stdout)
//!
//! [`Inbound`]: glyphsmith_core::channel::Inbound
//! [`Outbound`]: glyphsmith_core::channel::Outbound

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::{Delivery, TelegramChannel, TelegramConfig};
