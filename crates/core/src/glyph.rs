//! Glyph collection: the ordered (outline, mapping) pairs of one session.

use serde::{Deserialize, Serialize};

use crate::error::GlyphError;
use crate::outline::OutlineRef;

/// Hard ceiling on glyphs per session.
pub const MAX_GLYPHS: usize = 400;

/// Longest mapping accepted, in UTF-8 bytes. Ligature glyph names carry the
/// full mapping and font glyph names are limited to 255 bytes.
pub const MAX_MAPPING_BYTES: usize = 255;

/// The character or character sequence a glyph is bound to.
///
/// Always non-empty. Surrounding whitespace is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mapping(String);

impl Mapping {
    pub fn new(text: &str) -> Result<Self, GlyphError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GlyphError::EmptyMapping);
        }
        if trimmed.len() > MAX_MAPPING_BYTES {
            return Err(GlyphError::MappingTooLong {
                limit: MAX_MAPPING_BYTES,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The Unicode slot this mapping occupies.
    pub fn primary_codepoint(&self) -> char {
        // Non-empty by construction.
        self.0.chars().next().unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// Multi-character mappings also name a ligature glyph.
    pub fn is_ligature(&self) -> bool {
        self.0.chars().nth(1).is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Mapping {
    type Error = GlyphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Mapping::new(&value)
    }
}

impl From<Mapping> for String {
    fn from(mapping: Mapping) -> Self {
        mapping.0
    }
}

impl std::fmt::Display for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One committed glyph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphEntry {
    pub outline: OutlineRef,
    pub mapping: Mapping,
}

/// Ordered, bounded list of glyph entries.
///
/// Order is significant: later entries win codepoint ties at assembly time.
/// Entries are never removed one by one, only all at once via [`clear`].
///
/// [`clear`]: GlyphCollection::clear
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlyphCollection {
    entries: Vec<GlyphEntry>,
    capacity: usize,
}

impl GlyphCollection {
    /// An empty collection holding up to [`MAX_GLYPHS`] entries.
    pub fn new() -> Self {
        Self::with_capacity(MAX_GLYPHS)
    }

    /// An empty collection with a lower limit. Clamped to `1..=MAX_GLYPHS`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.clamp(1, MAX_GLYPHS),
        }
    }

    /// Append an entry.
    ///
    /// The capacity check runs first, so a full collection reports
    /// `CapacityExceeded` even for an empty mapping.
    pub fn add(&mut self, outline: OutlineRef, mapping: &str) -> Result<&GlyphEntry, GlyphError> {
        if self.is_full() {
            return Err(GlyphError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let mapping = Mapping::new(mapping)?;
        self.entries.push(GlyphEntry { outline, mapping });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Empty the collection. The released references are returned so the
    /// caller can free the underlying assets.
    #[must_use = "released outline references must be discarded from the store"]
    pub fn clear(&mut self) -> Vec<OutlineRef> {
        self.entries.drain(..).map(|e| e.outline).collect()
    }

    pub fn entries(&self) -> &[GlyphEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlyphEntry> {
        self.entries.iter()
    }
}

impl Default for GlyphCollection {
    fn default() -> Self {
        Self::new()
    }
}
