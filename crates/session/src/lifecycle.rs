//! Session lifecycle: one record per user id, created on demand and torn
//! down together with the outline assets it owns.
//!
//! Each record sits behind its own `tokio::sync::Mutex`. Holding that lock is
//! what serializes events for one user; different users never contend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use glyphsmith_core::event::{DomainEvent, EventBus};
use glyphsmith_core::glyph::MAX_GLYPHS;
use glyphsmith_core::outline::{OutlineStore, SessionId};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::state::{Session, SessionState};

/// Shared handle to one session record.
pub type SessionSlot = Arc<Mutex<Session>>;

/// Release every asset a session owns: its collected glyphs, its pending
/// outline and anything else filed under its id.
///
/// The session is left with an empty collection. Its state is not touched.
pub async fn release_assets(store: &dyn OutlineStore, session: &mut Session) -> usize {
    let mut released = 0;
    let mut refs = session.glyphs.clear();
    refs.extend(session.state.pending_outline());

    for outline in refs {
        match store.discard(&outline).await {
            Ok(true) => released += 1,
            Ok(false) => {}
            Err(e) => warn!(session = %session.id, outline = %outline, error = %e, "Failed to discard outline"),
        }
    }

    match store.purge_owner(&session.id).await {
        Ok(swept) => released += swept,
        Err(e) => warn!(session = %session.id, error = %e, "Failed to purge session assets"),
    }

    released
}

/// Owns the session table.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
    store: Arc<dyn OutlineStore>,
    events: Arc<EventBus>,
    max_glyphs: usize,
}

impl SessionManager {
    pub fn new(store: Arc<dyn OutlineStore>, events: Arc<EventBus>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            events,
            max_glyphs: MAX_GLYPHS,
        }
    }

    /// Cap the collection size of new sessions.
    pub fn with_max_glyphs(mut self, max_glyphs: usize) -> Self {
        self.max_glyphs = max_glyphs;
        self
    }

    pub fn store(&self) -> &Arc<dyn OutlineStore> {
        &self.store
    }

    /// Get the record for `id`, creating an idle one if needed.
    pub async fn slot(&self, id: &SessionId) -> SessionSlot {
        if let Some(slot) = self.sessions.read().await.get(id) {
            return Arc::clone(slot);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(id.clone(), self.max_glyphs)))),
        )
    }

    /// Start a fresh session for `id`, purging whatever came before.
    ///
    /// Returns the number of assets released from the previous session.
    pub async fn start(&self, id: &SessionId) -> usize {
        let slot = self.slot(id).await;
        let mut session = slot.lock().await;
        let released = release_assets(self.store.as_ref(), &mut session).await;
        session.restart();

        info!(session = %id, released, "Session started");
        self.events.publish(DomainEvent::SessionStarted {
            session_id: id.to_string(),
            timestamp: Utc::now(),
        });
        released
    }

    /// Release the session's assets and drop its record.
    ///
    /// Calling this for an unknown or already purged id is a no-op.
    pub async fn purge(&self, id: &SessionId) -> usize {
        let slot = self.sessions.read().await.get(id).cloned();
        let Some(slot) = slot else {
            return 0;
        };

        let released = {
            let mut session = slot.lock().await;
            let released = release_assets(self.store.as_ref(), &mut session).await;
            session.state = SessionState::Idle;
            released
        };
        drop(slot);

        self.evict_if_idle(id).await;
        debug!(session = %id, released, "Session purged");
        self.events.publish(DomainEvent::SessionPurged {
            session_id: id.to_string(),
            assets_released: released,
            timestamp: Utc::now(),
        });
        released
    }

    /// Drop the record for `id` if it is idle and nobody else holds it.
    pub async fn evict_if_idle(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let evictable = match sessions.get(id) {
            Some(slot) if Arc::strong_count(slot) == 1 => {
                slot.try_lock().map(|s| s.state.is_idle()).unwrap_or(false)
            }
            _ => false,
        };
        if evictable {
            sessions.remove(id);
        }
        evictable
    }

    /// Purge every session inactive for longer than `max_idle`. Sessions
    /// that are busy handling an event are skipped.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let slots: Vec<(SessionId, SessionSlot)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut expired = 0;
        for (id, slot) in slots {
            let released = {
                let Ok(mut session) = slot.try_lock() else {
                    continue;
                };
                if session.state.is_idle() || session.last_activity > cutoff {
                    None
                } else {
                    let released = release_assets(self.store.as_ref(), &mut session).await;
                    session.state = SessionState::Idle;
                    Some(released)
                }
            };
            drop(slot);

            if let Some(released) = released {
                expired += 1;
                info!(session = %id, released, "Expired idle session");
                self.events.publish(DomainEvent::SessionPurged {
                    session_id: id.to_string(),
                    assets_released: released,
                    timestamp: Utc::now(),
                });
            }
            self.evict_if_idle(&id).await;
        }
        expired
    }

    /// Number of sessions that are not idle. Busy sessions count as active.
    pub async fn active_sessions(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|slot| slot.try_lock().map(|s| !s.state.is_idle()).unwrap_or(true))
            .count()
    }

    /// Number of records held, idle or not.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
