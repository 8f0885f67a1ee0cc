//! # Glyphsmith Core
//!
//! Domain types, traits, and error definitions for the Glyphsmith font builder.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Layout
//!
//! - [`channel`]: the transport boundary (inbound payloads, buttons, outbound
//!   messages and the [`Channel`] trait)
//! - [`outline`]: uploaded outline assets and the [`OutlineStore`] trait
//! - [`glyph`]: mappings, glyph entries and the bounded [`GlyphCollection`]
//! - [`font`]: the metric profile a font is assembled with
//! - [`event`]: domain events published on the [`EventBus`]

pub mod error;
pub mod channel;
pub mod outline;
pub mod glyph;
pub mod font;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use channel::{Button, Channel, ChannelId, ChannelMessage, Command, Inbound, MenuChoice, Outbound};
pub use outline::{OutlineAsset, OutlineFormat, OutlineRef, OutlineStore, SessionId};
pub use glyph::{GlyphCollection, GlyphEntry, MAX_GLYPHS, MAX_MAPPING_BYTES, Mapping};
pub use font::FontProfile;
pub use event::{DomainEvent, EventBus};
