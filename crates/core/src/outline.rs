//! Outline assets: uploaded glyph shapes and the store that owns them.
//!
//! An [`OutlineAsset`] is the raw uploaded bytes plus a declared format. It
//! is validated by filename and content signature at ingestion, never parsed
//! here. Assets live in an [`OutlineStore`] under an opaque [`OutlineRef`] and
//! are owned by the session that uploaded them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OutlineError, StoreError};

/// Bytes inspected when looking for the format signature.
const SIGNATURE_WINDOW: usize = 4096;

/// Identifier of the user owning a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to an asset in an [`OutlineStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutlineRef(pub Uuid);

impl OutlineRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OutlineRef {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutlineRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recognized outline formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineFormat {
    Svg,
}

impl OutlineFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutlineFormat::Svg => "svg",
        }
    }

    fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        ext.eq_ignore_ascii_case("svg").then_some(OutlineFormat::Svg)
    }
}

/// An uploaded outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineAsset {
    pub format: OutlineFormat,

    /// Filename declared by the uploader
    pub filename: String,

    #[serde(default)]
    pub bytes: Vec<u8>,

    pub received_at: DateTime<Utc>,
}

impl OutlineAsset {
    /// Validate an upload by filename and content signature.
    ///
    /// This is a shallow check: the extension must be `.svg`, the bytes must
    /// be UTF-8 and an `<svg` tag must appear near the start.
    pub fn inspect(
        filename: &str,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> std::result::Result<Self, OutlineError> {
        let format = OutlineFormat::from_filename(filename).ok_or_else(|| {
            OutlineError::UnsupportedFormat {
                filename: filename.to_string(),
            }
        })?;

        if bytes.len() > max_bytes {
            return Err(OutlineError::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        let text = std::str::from_utf8(&bytes).map_err(|_| OutlineError::NotUtf8 {
            filename: filename.to_string(),
        })?;

        let mut end = text.len().min(SIGNATURE_WINDOW);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if !text[..end].to_ascii_lowercase().contains("<svg") {
            return Err(OutlineError::MissingSignature {
                filename: filename.to_string(),
            });
        }

        Ok(Self {
            format,
            filename: filename.to_string(),
            bytes,
            received_at: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Storage for outline assets, keyed by [`OutlineRef`] and grouped by owner.
///
/// Implementations: in-memory (tests, ephemeral bots) and file-backed
/// (one temp directory per session).
#[async_trait]
pub trait OutlineStore: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Store an asset on behalf of `owner`.
    async fn put(
        &self,
        owner: &SessionId,
        asset: OutlineAsset,
    ) -> std::result::Result<OutlineRef, StoreError>;

    /// Fetch an asset. `Ok(None)` when the reference is unknown.
    async fn get(
        &self,
        outline: &OutlineRef,
    ) -> std::result::Result<Option<Arc<OutlineAsset>>, StoreError>;

    /// Release one asset. Returns whether it existed.
    async fn discard(&self, outline: &OutlineRef) -> std::result::Result<bool, StoreError>;

    /// Release every asset owned by `owner`. Returns how many were released.
    async fn purge_owner(&self, owner: &SessionId) -> std::result::Result<usize, StoreError>;

    /// Total number of stored assets.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}
