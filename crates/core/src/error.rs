//! Error types for the Glyphsmith domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Glyphsmith operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Outline store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Glyph collection errors ---
    #[error("Glyph error: {0}")]
    Glyph(#[from] GlyphError),

    // --- Outline ingestion errors ---
    #[error("Outline error: {0}")]
    Outline(#[from] OutlineError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Unauthorized sender: {sender_id} on {channel}")]
    Unauthorized { channel: String, sender_id: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid inbound payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Outline not found: {0}")]
    NotFound(String),
}

/// Rejections raised by [`GlyphCollection`](crate::glyph::GlyphCollection).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlyphError {
    #[error("Glyph collection is full ({capacity} glyphs)")]
    CapacityExceeded { capacity: usize },

    #[error("Glyph mapping is empty")]
    EmptyMapping,

    #[error("Glyph mapping is longer than {limit} bytes")]
    MappingTooLong { limit: usize },
}

/// Rejections raised while inspecting an uploaded outline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutlineError {
    #[error("Unsupported outline format: {filename}")]
    UnsupportedFormat { filename: String },

    #[error("File has no outline signature: {filename}")]
    MissingSignature { filename: String },

    #[error("Outline too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("Outline is not valid UTF-8: {filename}")]
    NotUtf8 { filename: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_error_displays_correctly() {
        let err = Error::Glyph(GlyphError::CapacityExceeded { capacity: 400 });
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("full"));
    }

    #[test]
    fn outline_error_displays_correctly() {
        let err = Error::Outline(OutlineError::UnsupportedFormat {
            filename: "photo.png".into(),
        });
        assert!(err.to_string().contains("photo.png"));

        let err = Error::from(OutlineError::TooLarge { size: 10, limit: 5 });
        assert!(err.to_string().contains("limit 5"));
    }

    #[test]
    fn channel_error_converts() {
        let err: Error = ChannelError::ConnectionLost("socket closed".into()).into();
        assert!(matches!(err, Error::Channel(_)));
        assert!(err.to_string().contains("socket closed"));
    }
}
