//! Routes inbound channel messages to their sessions.
//!
//! Each sender gets a FIFO queue drained by at most one worker task, so a
//! user's events are handled in arrival order while different users are
//! served side by side.

use std::collections::HashMap;
use std::sync::Arc;

use glyphsmith_core::channel::{Channel, ChannelMessage};
use glyphsmith_core::error::ChannelError;
use glyphsmith_core::outline::SessionId;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::engine::SessionEngine;
use crate::lifecycle::SessionManager;

/// A sender's pending messages.
type Queue = mpsc::UnboundedReceiver<ChannelMessage>;

/// Feeds one channel's messages through the engine.
pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    engine: Arc<SessionEngine>,
    sessions: Arc<SessionManager>,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn Channel>, engine: Arc<SessionEngine>, sessions: Arc<SessionManager>) -> Self {
        Self {
            channel,
            engine,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Handle one message to completion.
    ///
    /// The session lock is held until every reply has been handed to the
    /// channel, so replies to consecutive events never interleave.
    pub async fn dispatch(&self, message: ChannelMessage) {
        if !self.channel.is_allowed(&message.sender_id) {
            warn!(
                channel = %self.channel.name(),
                sender = %message.sender_id,
                "Ignoring message from unauthorized sender"
            );
            return;
        }

        let id = SessionId::new(message.sender_id.clone());
        let slot = self.sessions.slot(&id).await;
        {
            let mut session = slot.lock().await;
            let replies = self.engine.handle(&mut session, &message).await;
            for reply in &replies {
                if let Err(e) = self.channel.deliver(&message.chat_id, reply).await {
                    warn!(session = %id, error = %e, "Failed to deliver reply");
                }
            }
        }
        drop(slot);

        if self.sessions.evict_if_idle(&id).await {
            debug!(session = %id, "Dropped idle session");
        }
    }

    /// Process messages until the receiver closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Result<ChannelMessage, ChannelError>>) {
        let mut queues: HashMap<String, mpsc::UnboundedSender<ChannelMessage>> = HashMap::new();
        let mut workers: JoinSet<(String, Queue)> = JoinSet::new();
        info!(channel = %self.channel.name(), "Dispatcher running");

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(Ok(message)) => Self::enqueue(&self, message, &mut queues, &mut workers),
                    Some(Err(e)) => warn!(channel = %self.channel.name(), error = %e, "Channel error"),
                    None => break,
                },
                Some(done) = workers.join_next(), if !workers.is_empty() => {
                    Self::worker_done(&self, done, &mut queues, &mut workers);
                }
            }
        }

        while let Some(done) = workers.join_next().await {
            Self::worker_done(&self, done, &mut queues, &mut workers);
        }
        info!(channel = %self.channel.name(), "Dispatcher stopped");
    }

    /// Append to the sender's queue, starting a worker if none is attached.
    fn enqueue(
        this: &Arc<Self>,
        message: ChannelMessage,
        queues: &mut HashMap<String, mpsc::UnboundedSender<ChannelMessage>>,
        workers: &mut JoinSet<(String, Queue)>,
    ) {
        let sender = message.sender_id.clone();
        let message = match queues.get(&sender) {
            Some(queue) => match queue.send(message) {
                Ok(()) => return,
                // The worker panicked and dropped the queue.
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let (tx, queue) = mpsc::unbounded_channel();
        if tx.send(message).is_err() {
            return;
        }
        queues.insert(sender.clone(), tx);
        workers.spawn(Arc::clone(this).drain(sender, queue));
    }

    /// Handle whatever is queued, in order, then hand the queue back.
    async fn drain(self: Arc<Self>, sender: String, mut queue: Queue) -> (String, Queue) {
        while let Ok(message) = queue.try_recv() {
            self.dispatch(message).await;
        }
        (sender, queue)
    }

    /// Queues only change hands on this task, so a queue that comes back
    /// empty can be dropped without losing a message.
    fn worker_done(
        this: &Arc<Self>,
        done: Result<(String, Queue), JoinError>,
        queues: &mut HashMap<String, mpsc::UnboundedSender<ChannelMessage>>,
        workers: &mut JoinSet<(String, Queue)>,
    ) {
        match done {
            Ok((sender, queue)) if !queue.is_empty() => {
                workers.spawn(Arc::clone(this).drain(sender, queue));
            }
            Ok((sender, _)) => {
                queues.remove(&sender);
            }
            Err(e) => error!(error = %e, "Session worker panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullOperator;
    use crate::state::SessionState;
    use async_trait::async_trait;
    use glyphsmith_assembler::FontAssembler;
    use glyphsmith_core::channel::{Button, ChannelId, Command, Inbound, MenuChoice, Outbound};
    use glyphsmith_core::event::EventBus;
    use glyphsmith_core::font::FontProfile;
    use glyphsmith_store::InMemoryOutlineStore;
    use std::time::Duration;
    use tokio::sync::Mutex;

    const SVG: &[u8] = br#"<svg viewBox="0 0 100 100"><path d="M10 10 H90 V90 H10 Z"/></svg>"#;

    /// Records replies; sending text can be slowed down to widen race windows.
    struct MockChannel {
        id: ChannelId,
        allowed: Vec<String>,
        delay: Duration,
        sent: Mutex<Vec<(String, Outbound)>>,
    }

    impl MockChannel {
        fn new(allowed: &[&str]) -> Self {
            Self {
                id: ChannelId("mock".into()),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
                delay: Duration::ZERO,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn name(&self) -> &str {
            "mock"
        }
        fn id(&self) -> &ChannelId {
            &self.id
        }
        async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
        async fn send_text(&self, chat_id: &str, text: &str, buttons: &[Vec<Button>]) -> Result<(), ChannelError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.sent
                .lock()
                .await
                .push((chat_id.into(), Outbound::with_buttons(text, buttons.to_vec())));
            Ok(())
        }
        async fn send_document(
            &self,
            chat_id: &str,
            bytes: &[u8],
            filename: &str,
            caption: Option<&str>,
        ) -> Result<(), ChannelError> {
            self.sent.lock().await.push((
                chat_id.into(),
                Outbound::Document {
                    filename: filename.into(),
                    caption: caption.map(str::to_string),
                    bytes: bytes.to_vec(),
                },
            ));
            Ok(())
        }
        fn is_allowed(&self, sender_id: &str) -> bool {
            self.allowed.iter().any(|a| a == "*" || a == sender_id)
        }
    }

    fn dispatcher(channel: Arc<MockChannel>) -> (Arc<Dispatcher>, Arc<InMemoryOutlineStore>) {
        let store = Arc::new(InMemoryOutlineStore::new());
        let events = Arc::new(EventBus::default());
        let engine = SessionEngine::new(
            store.clone(),
            FontAssembler::new(FontProfile::default()),
            Arc::new(NullOperator),
            events.clone(),
        );
        let sessions = SessionManager::new(store.clone(), events);
        (
            Arc::new(Dispatcher::new(channel, Arc::new(engine), Arc::new(sessions))),
            store,
        )
    }

    fn msg(sender: &str, payload: Inbound) -> ChannelMessage {
        ChannelMessage::new(ChannelId("mock".into()), sender, sender, payload)
    }

    async fn state_of(d: &Dispatcher, sender: &str) -> SessionState {
        let slot = d.sessions().slot(&SessionId::new(sender)).await;
        let state = slot.lock().await.state;
        state
    }

    #[tokio::test]
    async fn unauthorized_sender_is_ignored() {
        let channel = Arc::new(MockChannel::new(&["alice"]));
        let (d, _) = dispatcher(channel.clone());
        d.dispatch(msg("mallory", Inbound::Command { command: Command::Start }))
            .await;
        assert!(channel.sent.lock().await.is_empty());
        assert!(d.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn replies_go_to_the_chat() {
        let channel = Arc::new(MockChannel::new(&["*"]));
        let (d, _) = dispatcher(channel.clone());
        d.dispatch(msg("alice", Inbound::Command { command: Command::Start }))
            .await;
        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alice");
    }

    #[tokio::test]
    async fn idle_sessions_are_not_retained() {
        let channel = Arc::new(MockChannel::new(&["*"]));
        let (d, _) = dispatcher(channel);
        d.dispatch(msg("bob", Inbound::from_text("hello"))).await;
        assert!(d.sessions().is_empty().await);

        d.dispatch(msg("bob", Inbound::Command { command: Command::Start }))
            .await;
        assert_eq!(d.sessions().len().await, 1);
        d.dispatch(msg("bob", Inbound::Command { command: Command::Cancel }))
            .await;
        assert!(d.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_events_for_one_session_are_serialized() {
        let mut channel = MockChannel::new(&["*"]);
        channel.delay = Duration::from_millis(20);
        let channel = Arc::new(channel);
        let (d, _) = dispatcher(channel.clone());

        for payload in [
            Inbound::Command { command: Command::Start },
            Inbound::Choice { choice: MenuChoice::BuildFont },
        ] {
            d.dispatch(msg("u", payload)).await;
        }

        // Double tap on "add glyph" while an upload races in.
        let add_a = tokio::spawn({
            let d = Arc::clone(&d);
            async move { d.dispatch(msg("u", Inbound::Choice { choice: MenuChoice::AddGlyph })).await }
        });
        let add_b = tokio::spawn({
            let d = Arc::clone(&d);
            async move {
                d.dispatch(msg(
                    "u",
                    Inbound::File {
                        filename: Some("a.svg".into()),
                        bytes: SVG.to_vec(),
                    },
                ))
                .await
            }
        });
        add_a.await.unwrap();
        add_b.await.unwrap();

        // Either the upload landed after "add glyph" or it was rejected before it.
        let state = state_of(&d, "u").await;
        assert!(
            matches!(state, SessionState::AwaitingMapping { .. } | SessionState::AwaitingOutline),
            "unexpected state {state}"
        );

        // One reply per event, none lost.
        assert_eq!(channel.sent.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn sessions_for_different_users_are_independent() {
        let channel = Arc::new(MockChannel::new(&["*"]));
        let (d, store) = dispatcher(channel);

        let mut handles = Vec::new();
        for user in ["a", "b", "c"] {
            let d = Arc::clone(&d);
            handles.push(tokio::spawn(async move {
                for payload in [
                    Inbound::Command { command: Command::Start },
                    Inbound::Choice { choice: MenuChoice::BuildFont },
                    Inbound::Choice { choice: MenuChoice::AddGlyph },
                    Inbound::File {
                        filename: Some("g.svg".into()),
                        bytes: SVG.to_vec(),
                    },
                    Inbound::Text { text: user.into() },
                ] {
                    d.dispatch(msg(user, payload)).await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        for user in ["a", "b", "c"] {
            assert_eq!(state_of(&d, user).await, SessionState::CollectingGlyphs);
            assert_eq!(store.count_for(&SessionId::new(user)).await, 1);
        }
        assert_eq!(d.sessions().active_sessions().await, 3);
    }

    #[tokio::test]
    async fn run_drains_until_channel_closes() {
        let channel = Arc::new(MockChannel::new(&["*"]));
        let (d, _) = dispatcher(channel.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.send(Ok(msg("alice", Inbound::Command { command: Command::Start })))
            .await
            .unwrap();
        tx.send(Err(ChannelError::ConnectionLost("blip".into())))
            .await
            .unwrap();
        drop(tx);

        Arc::clone(&d).run(rx).await;
        assert_eq!(channel.sent.lock().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_applies_each_users_events_in_arrival_order() {
        for _ in 0..100 {
            let channel = Arc::new(MockChannel::new(&["*"]));
            let (d, store) = dispatcher(channel.clone());
            let (tx, rx) = mpsc::channel(16);
            let running = tokio::spawn(Arc::clone(&d).run(rx));

            for payload in [
                Inbound::Command { command: Command::Start },
                Inbound::Choice { choice: MenuChoice::BuildFont },
                Inbound::Choice { choice: MenuChoice::AddGlyph },
                Inbound::File {
                    filename: Some("a.svg".into()),
                    bytes: SVG.to_vec(),
                },
                Inbound::Text { text: "a".into() },
            ] {
                tx.send(Ok(msg("u", payload))).await.unwrap();
            }
            drop(tx);
            running.await.unwrap();

            assert_eq!(state_of(&d, "u").await, SessionState::CollectingGlyphs);
            assert_eq!(store.count_for(&SessionId::new("u")).await, 1);
            assert_eq!(channel.sent.lock().await.len(), 5);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_keeps_users_apart_while_ordering_each() {
        let channel = Arc::new(MockChannel::new(&["*"]));
        let (d, store) = dispatcher(channel.clone());
        let (tx, rx) = mpsc::channel(64);
        let running = tokio::spawn(Arc::clone(&d).run(rx));

        let users = ["a", "b", "c"];
        for payload in [
            Inbound::Command { command: Command::Start },
            Inbound::Choice { choice: MenuChoice::BuildFont },
            Inbound::Choice { choice: MenuChoice::AddGlyph },
            Inbound::File {
                filename: Some("g.svg".into()),
                bytes: SVG.to_vec(),
            },
        ] {
            for user in users {
                tx.send(Ok(msg(user, payload.clone()))).await.unwrap();
            }
        }
        for user in users {
            tx.send(Ok(msg(user, Inbound::Text { text: user.into() }))).await.unwrap();
        }
        drop(tx);
        running.await.unwrap();

        for user in users {
            assert_eq!(state_of(&d, user).await, SessionState::CollectingGlyphs);
            assert_eq!(store.count_for(&SessionId::new(user)).await, 1);
        }
        assert_eq!(channel.sent.lock().await.len(), 15);
    }
}
