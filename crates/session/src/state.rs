//! Session record and conversation states.

use chrono::{DateTime, Utc};
use glyphsmith_core::glyph::GlyphCollection;
use glyphsmith_core::outline::{OutlineRef, SessionId};

/// Where a conversation currently is.
///
/// The pending outline lives inside [`SessionState::AwaitingMapping`], so it
/// cannot outlive that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingMenuChoice,
    CollectingGlyphs,
    AwaitingOutline,
    AwaitingMapping { pending: OutlineRef },
    Assembling,
    AwaitingThanks,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// The outline waiting for its mapping, if any.
    pub fn pending_outline(&self) -> Option<OutlineRef> {
        match self {
            SessionState::AwaitingMapping { pending } => Some(*pending),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingMenuChoice => "awaiting_menu_choice",
            SessionState::CollectingGlyphs => "collecting_glyphs",
            SessionState::AwaitingOutline => "awaiting_outline",
            SessionState::AwaitingMapping { .. } => "awaiting_mapping",
            SessionState::Assembling => "assembling",
            SessionState::AwaitingThanks => "awaiting_thanks",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One user's conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub glyphs: GlyphCollection,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// A fresh, idle session.
    pub fn new(id: SessionId, max_glyphs: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: SessionState::Idle,
            glyphs: GlyphCollection::with_capacity(max_glyphs),
            created_at: now,
            last_activity: now,
        }
    }

    /// Replace this session with a new instance in the main menu.
    ///
    /// Glyphs must already have been released.
    pub(crate) fn restart(&mut self) {
        let now = Utc::now();
        self.state = SessionState::AwaitingMenuChoice;
        self.glyphs = GlyphCollection::with_capacity(self.glyphs.capacity());
        self.created_at = now;
        self.last_activity = now;
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
