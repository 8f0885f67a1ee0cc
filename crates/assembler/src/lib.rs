//! # Glyphsmith Assembler
//!
//! Compiles a session's glyph entries into a TrueType font.
//!
//! Outlines are SVG documents scaled into the font's em frame. Unreadable
//! outlines are skipped with a warning; the build only fails when nothing
//! could be placed or the font cannot be serialized.

pub mod assemble;
mod sfnt;
pub mod svg;

pub use assemble::{AssembledFont, FontAssembler, LigatureGlyph};
pub use svg::{OutlineParseError, SvgOutline, ViewBox};

/// Fatal assembly failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("No valid glyphs: {skipped} outline(s) could not be read")]
    NoValidGlyphs { skipped: usize },

    #[error("Font serialization failed: {0}")]
    Serialization(String),
}

/// Non-fatal problems reported alongside a finished font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyWarning {
    /// Entry `index` was skipped.
    OutlineUnreadable {
        index: usize,
        mapping: String,
        reason: String,
    },
}

impl std::fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutlineUnreadable {
                index,
                mapping,
                reason,
            } => write!(f, "glyph #{} ({mapping}) skipped: {reason}", index + 1),
        }
    }
}
