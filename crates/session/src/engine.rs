//! The conversation state machine.
//!
//! [`SessionEngine::handle`] applies one inbound event to a locked session and
//! returns the replies to send. Nothing here talks to the transport directly
//! and no error escapes: every failure becomes a user-facing message plus the
//! next state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use glyphsmith_assembler::{AssembledFont, AssemblyError, FontAssembler};
use glyphsmith_core::channel::{ChannelMessage, Command, Inbound, MenuChoice, Outbound};
use glyphsmith_core::error::GlyphError;
use glyphsmith_core::event::{DomainEvent, EventBus};
use glyphsmith_core::glyph::{GlyphCollection, MAX_GLYPHS};
use glyphsmith_core::outline::{OutlineAsset, OutlineRef, OutlineStore};
use tracing::{debug, error, info, warn};

use crate::lifecycle::release_assets;
use crate::messages;
use crate::notify::OperatorNotifier;
use crate::state::{Session, SessionState};

/// Default upload limit.
pub const DEFAULT_MAX_OUTLINE_BYTES: usize = 1024 * 1024;

pub struct SessionEngine {
    store: Arc<dyn OutlineStore>,
    assembler: FontAssembler,
    notifier: Arc<dyn OperatorNotifier>,
    events: Arc<EventBus>,
    max_outline_bytes: usize,
    max_glyphs: usize,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn OutlineStore>,
        assembler: FontAssembler,
        notifier: Arc<dyn OperatorNotifier>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            assembler,
            notifier,
            events,
            max_outline_bytes: DEFAULT_MAX_OUTLINE_BYTES,
            max_glyphs: MAX_GLYPHS,
        }
    }

    /// Reject uploads larger than `limit` bytes.
    pub fn with_max_outline_bytes(mut self, limit: usize) -> Self {
        self.max_outline_bytes = limit;
        self
    }

    /// Cap the collection size of sessions this engine restarts.
    pub fn with_max_glyphs(mut self, max_glyphs: usize) -> Self {
        self.max_glyphs = max_glyphs;
        self
    }

    pub fn store(&self) -> &Arc<dyn OutlineStore> {
        &self.store
    }

    /// Apply one event.
    pub async fn handle(&self, session: &mut Session, message: &ChannelMessage) -> Vec<Outbound> {
        session.touch();
        let before = session.state;

        let replies = match (session.state, &message.payload) {
            (_, Inbound::Command { command: Command::Start }) => self.start(session).await,
            (_, Inbound::Command { command: Command::Cancel }) => self.cancel(session).await,

            (SessionState::Idle, _) => vec![Outbound::text(messages::SEND_START)],

            (SessionState::AwaitingMenuChoice, Inbound::Choice { choice: MenuChoice::BuildFont }) => {
                self.build_font(session).await
            }
            (SessionState::AwaitingMenuChoice, _) => vec![messages::welcome()],

            (SessionState::CollectingGlyphs, Inbound::Choice { choice: MenuChoice::AddGlyph }) => {
                self.request_outline(session)
            }
            (SessionState::CollectingGlyphs, Inbound::Choice { choice: MenuChoice::Finish }) => {
                self.finish(session).await
            }
            (SessionState::CollectingGlyphs, Inbound::Choice { choice: MenuChoice::BackToMain }) => {
                session.state = SessionState::AwaitingMenuChoice;
                vec![messages::welcome()]
            }
            (SessionState::CollectingGlyphs, _) => vec![messages::builder(session.glyphs.count())],

            (SessionState::AwaitingOutline, Inbound::Choice { choice: MenuChoice::CancelAdd }) => {
                session.state = SessionState::CollectingGlyphs;
                vec![messages::builder(session.glyphs.count())]
            }
            (SessionState::AwaitingOutline, Inbound::File { filename, bytes }) => {
                self.receive_outline(session, filename.as_deref(), bytes.clone())
                    .await
            }
            (SessionState::AwaitingOutline, _) => vec![Outbound::with_buttons(
                messages::NOT_A_FILE,
                messages::cancel_keyboard(),
            )],

            (SessionState::AwaitingMapping { pending }, Inbound::Text { text }) => {
                self.receive_mapping(session, pending, text).await
            }
            (SessionState::AwaitingMapping { pending }, Inbound::Choice { choice: MenuChoice::CancelAdd }) => {
                self.cancel_pending(session, pending).await
            }
            (SessionState::AwaitingMapping { .. }, _) => vec![Outbound::with_buttons(
                messages::SEND_MAPPING_AS_TEXT,
                messages::cancel_keyboard(),
            )],

            (SessionState::Assembling, _) => vec![Outbound::text(messages::STILL_BUILDING)],

            (SessionState::AwaitingThanks, Inbound::Text { text }) => {
                self.forward_thanks(session, message, text).await
            }
            (SessionState::AwaitingThanks, _) => vec![Outbound::text(messages::ASK_THANKS)],
        };

        debug!(
            session = %session.id,
            event = message.payload.kind(),
            from = %before,
            to = %session.state,
            "Handled event"
        );
        replies
    }

    async fn start(&self, session: &mut Session) -> Vec<Outbound> {
        let released = release_assets(self.store.as_ref(), session).await;
        session.glyphs = GlyphCollection::with_capacity(self.max_glyphs);
        session.restart();

        info!(session = %session.id, released, "Session started");
        self.events.publish(DomainEvent::SessionStarted {
            session_id: session.id.to_string(),
            timestamp: Utc::now(),
        });
        vec![messages::welcome()]
    }

    async fn cancel(&self, session: &mut Session) -> Vec<Outbound> {
        let released = release_assets(self.store.as_ref(), session).await;
        session.state = SessionState::Idle;

        info!(session = %session.id, released, "Session cancelled");
        self.events.publish(DomainEvent::SessionPurged {
            session_id: session.id.to_string(),
            assets_released: released,
            timestamp: Utc::now(),
        });
        vec![Outbound::text(messages::CANCELLED)]
    }

    async fn build_font(&self, session: &mut Session) -> Vec<Outbound> {
        for outline in session.glyphs.clear() {
            self.discard(session, &outline).await;
        }
        session.state = SessionState::CollectingGlyphs;
        vec![messages::builder(0)]
    }

    fn request_outline(&self, session: &mut Session) -> Vec<Outbound> {
        if session.glyphs.is_full() {
            return vec![
                Outbound::text(messages::capacity_reached(session.glyphs.capacity())),
                messages::builder(session.glyphs.count()),
            ];
        }
        session.state = SessionState::AwaitingOutline;
        vec![Outbound::with_buttons(
            messages::SEND_OUTLINE,
            messages::cancel_keyboard(),
        )]
    }

    async fn receive_outline(
        &self,
        session: &mut Session,
        filename: Option<&str>,
        bytes: Vec<u8>,
    ) -> Vec<Outbound> {
        let asset = match OutlineAsset::inspect(filename.unwrap_or_default(), bytes, self.max_outline_bytes) {
            Ok(asset) => asset,
            Err(e) => {
                debug!(session = %session.id, error = %e, "Rejected upload");
                return vec![Outbound::with_buttons(
                    messages::outline_rejected(&e),
                    messages::cancel_keyboard(),
                )];
            }
        };

        match self.store.put(&session.id, asset).await {
            Ok(pending) => {
                session.state = SessionState::AwaitingMapping { pending };
                vec![Outbound::with_buttons(
                    messages::SEND_MAPPING,
                    messages::cancel_keyboard(),
                )]
            }
            Err(e) => {
                warn!(session = %session.id, error = %e, "Failed to store outline");
                vec![Outbound::with_buttons(
                    messages::UPLOAD_FAILED,
                    messages::cancel_keyboard(),
                )]
            }
        }
    }

    async fn receive_mapping(&self, session: &mut Session, pending: OutlineRef, text: &str) -> Vec<Outbound> {
        match session.glyphs.add(pending, text) {
            Ok(entry) => {
                let mapping = entry.mapping.to_string();
                let count = session.glyphs.count();
                session.state = SessionState::CollectingGlyphs;

                debug!(session = %session.id, %mapping, count, "Glyph committed");
                self.events.publish(DomainEvent::GlyphCommitted {
                    session_id: session.id.to_string(),
                    mapping: mapping.clone(),
                    count,
                    timestamp: Utc::now(),
                });
                vec![Outbound::with_buttons(
                    messages::glyph_added(count, &mapping),
                    messages::builder_menu(count),
                )]
            }
            Err(GlyphError::EmptyMapping) => vec![Outbound::with_buttons(
                messages::EMPTY_MAPPING,
                messages::cancel_keyboard(),
            )],
            Err(GlyphError::MappingTooLong { limit }) => vec![Outbound::with_buttons(
                messages::mapping_too_long(limit),
                messages::cancel_keyboard(),
            )],
            Err(GlyphError::CapacityExceeded { capacity }) => {
                self.discard(session, &pending).await;
                session.state = SessionState::CollectingGlyphs;
                vec![
                    Outbound::text(messages::capacity_reached(capacity)),
                    messages::builder(session.glyphs.count()),
                ]
            }
        }
    }

    async fn cancel_pending(&self, session: &mut Session, pending: OutlineRef) -> Vec<Outbound> {
        self.discard(session, &pending).await;
        session.state = SessionState::CollectingGlyphs;
        vec![messages::builder(session.glyphs.count())]
    }

    async fn finish(&self, session: &mut Session) -> Vec<Outbound> {
        if session.glyphs.is_empty() {
            return vec![
                Outbound::text(messages::NEED_ONE_GLYPH),
                messages::builder(0),
            ];
        }

        session.state = SessionState::Assembling;
        let mut replies = vec![Outbound::text(messages::BUILDING)];

        match self.assemble(session).await {
            Ok(font) => {
                let released = release_assets(self.store.as_ref(), session).await;
                session.state = SessionState::AwaitingThanks;

                self.events.publish(DomainEvent::FontAssembled {
                    session_id: session.id.to_string(),
                    glyphs_placed: font.placed,
                    warnings: font.warnings.len(),
                    size_bytes: font.bytes.len(),
                    timestamp: Utc::now(),
                });
                self.events.publish(DomainEvent::SessionPurged {
                    session_id: session.id.to_string(),
                    assets_released: released,
                    timestamp: Utc::now(),
                });

                replies.push(Outbound::text(messages::FONT_READY));
                if !font.warnings.is_empty() {
                    replies.push(Outbound::text(messages::skipped_glyphs(&font.warnings)));
                }
                replies.push(Outbound::Document {
                    filename: font.file_name,
                    caption: Some(messages::FONT_CAPTION.to_string()),
                    bytes: font.bytes,
                });
                replies.push(Outbound::text(messages::ASK_THANKS));
            }
            Err(e) => {
                error!(session = %session.id, error = %e, "Font assembly failed");
                session.state = SessionState::AwaitingMenuChoice;
                self.events.publish(DomainEvent::AssemblyFailed {
                    session_id: session.id.to_string(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                replies.push(Outbound::with_buttons(
                    messages::assembly_failed(&e),
                    messages::main_menu(),
                ));
            }
        }
        replies
    }

    /// Resolve every outline, then build the font on the blocking pool.
    async fn assemble(&self, session: &Session) -> Result<AssembledFont, AssemblyError> {
        let entries = session.glyphs.entries().to_vec();
        let mut assets = HashMap::with_capacity(entries.len());
        for entry in &entries {
            match self.store.get(&entry.outline).await {
                Ok(Some(asset)) => {
                    assets.insert(entry.outline, asset);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(session = %session.id, outline = %entry.outline, error = %e, "Failed to load outline");
                }
            }
        }

        let assembler = self.assembler.clone();
        tokio::task::spawn_blocking(move || {
            assembler.assemble(&entries, |outline| assets.get(outline).cloned())
        })
        .await
        .map_err(|e| AssemblyError::Serialization(format!("assembly task failed: {e}")))?
    }

    async fn forward_thanks(&self, session: &mut Session, message: &ChannelMessage, text: &str) -> Vec<Outbound> {
        let note = messages::operator_thanks(message.sender_name.as_deref(), &message.sender_id, text);
        let delivered = self.notifier.notify(&note).await.discard();
        session.state = SessionState::AwaitingMenuChoice;

        self.events.publish(DomainEvent::OperatorNotified {
            session_id: session.id.to_string(),
            delivered,
            timestamp: Utc::now(),
        });
        vec![Outbound::text(messages::THANKS_RECEIVED), messages::welcome()]
    }

    async fn discard(&self, session: &Session, outline: &OutlineRef) {
        if let Err(e) = self.store.discard(outline).await {
            warn!(session = %session.id, outline = %outline, error = %e, "Failed to discard outline");
        }
    }
}
