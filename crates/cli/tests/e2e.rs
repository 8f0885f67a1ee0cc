//! End-to-end tests: Telegram stub ➜ dispatcher ➜ session engine ➜ store ➜
//! assembler, and back out through the stub's outbox.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use glyphsmith_assembler::FontAssembler;
use glyphsmith_channels::{Delivery, TelegramChannel, TelegramConfig};
use glyphsmith_core::channel::{Channel, Command, Inbound, MenuChoice, Outbound};
use glyphsmith_core::event::{DomainEvent, EventBus};
use glyphsmith_core::font::FontProfile;
use glyphsmith_core::outline::OutlineStore;
use glyphsmith_session::{ChannelOperator, Dispatcher, SessionEngine, SessionManager, messages};
use glyphsmith_store::FileOutlineStore;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const OPERATOR: &str = "999";

const SQUARE: &[u8] = br#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><path d="M10 10 H90 V90 H10 Z"/></svg>"#;
const RING: &[u8] = br#"<svg viewBox="0 0 100 100"><circle cx="50" cy="50" r="40"/></svg>"#;

struct Harness {
    channel: Arc<TelegramChannel>,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Receiver<Arc<DomainEvent>>,
    storage: TempDir,
    task: JoinHandle<()>,
}

impl Harness {
    async fn new(allowed: &[&str]) -> Self {
        let storage = tempfile::tempdir().unwrap();
        let channel = Arc::new(TelegramChannel::new(TelegramConfig {
            bot_token: "test-token".into(),
            allowed_users: allowed.iter().map(|s| s.to_string()).collect(),
        }));

        let store: Arc<dyn OutlineStore> = Arc::new(FileOutlineStore::new(storage.path().to_path_buf()));
        let bus = Arc::new(EventBus::default());
        let events = bus.subscribe();
        let notifier = Arc::new(ChannelOperator::new(channel.clone(), Some(OPERATOR.into())));
        let engine = SessionEngine::new(
            store.clone(),
            FontAssembler::new(FontProfile::default()),
            notifier,
            bus.clone(),
        );
        let sessions = SessionManager::new(store, bus);

        let rx = channel.start().await.unwrap();
        let dispatcher = Arc::new(Dispatcher::new(channel.clone(), Arc::new(engine), Arc::new(sessions)));
        let task = tokio::spawn(Arc::clone(&dispatcher).run(rx));

        Self {
            channel,
            dispatcher,
            events,
            storage,
            task,
        }
    }

    async fn inject(&self, user: &str, payload: Inbound) {
        let message = self.channel.private_message(user, payload).with_sender_name("Alice");
        self.channel.inject_message(message).await.unwrap();
    }

    /// Send one event and wait for `expected` deliveries.
    async fn send(&self, user: &str, payload: Inbound, expected: usize) -> Vec<Delivery> {
        self.inject(user, payload).await;
        self.drain(expected).await
    }

    async fn drain(&self, expected: usize) -> Vec<Delivery> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if self.channel.outbox().await.len() >= expected {
                return self.channel.take_outbox().await;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {expected} deliveries"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn upload(&self, user: &str, name: &str, bytes: &[u8], mapping: &str) {
        self.send(user, choice(MenuChoice::AddGlyph), 1).await;
        let replies = self.send(user, file(name, bytes), 1).await;
        assert_eq!(text_of(&replies[0]), messages::SEND_MAPPING);
        let replies = self.send(user, Inbound::from_text(mapping), 1).await;
        assert!(text_of(&replies[0]).starts_with("✅"), "{:?}", replies[0]);
    }

    async fn shutdown(self) {
        self.channel.stop().await.unwrap();
        self.task.await.unwrap();
    }
}

fn command(command: Command) -> Inbound {
    Inbound::Command { command }
}

fn choice(choice: MenuChoice) -> Inbound {
    Inbound::Choice { choice }
}

fn file(name: &str, bytes: &[u8]) -> Inbound {
    Inbound::File {
        filename: Some(name.into()),
        bytes: bytes.to_vec(),
    }
}

fn text_of(delivery: &Delivery) -> &str {
    delivery.message.as_text().unwrap_or("")
}

fn stored_outlines(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                stored_outlines(&path)
            } else {
                1
            }
        })
        .sum()
}

#[tokio::test]
async fn builds_a_font_over_telegram() {
    let h = Harness::new(&["*"]).await;
    let user = "1001";

    let replies = h.send(user, Inbound::from_text("/start@glyph_bot"), 1).await;
    assert_eq!(replies[0].chat_id, user);
    assert!(matches!(&replies[0].message, Outbound::Text { buttons, .. } if !buttons.is_empty()));

    h.send(user, choice(MenuChoice::BuildFont), 1).await;
    h.upload(user, "a.svg", SQUARE, "a").await;
    h.upload(user, "ff.svg", RING, "ff").await;
    assert_eq!(stored_outlines(h.storage.path()), 2);

    let replies = h.send(user, choice(MenuChoice::Finish), 4).await;
    assert_eq!(text_of(&replies[0]), messages::BUILDING);
    assert_eq!(text_of(&replies[1]), messages::FONT_READY);
    let Outbound::Document { filename, bytes, caption } = &replies[2].message else {
        panic!("expected a document, got {:?}", replies[2]);
    };
    assert_eq!(filename, "TM_FONT.ttf");
    assert_eq!(&bytes[..4], &[0, 1, 0, 0]);
    assert_eq!(caption.as_deref(), Some(messages::FONT_CAPTION));
    assert_eq!(text_of(&replies[3]), messages::ASK_THANKS);

    // Assets go as soon as the font is out.
    assert_eq!(stored_outlines(h.storage.path()), 0);

    let replies = h.send(user, Inbound::from_text("Lovely font, thanks!"), 3).await;
    let operator: Vec<_> = replies.iter().filter(|d| d.chat_id == OPERATOR).collect();
    assert_eq!(operator.len(), 1);
    assert!(text_of(operator[0]).contains("Lovely font, thanks!"));
    assert!(text_of(operator[0]).contains("Alice"));
    let to_user: Vec<_> = replies.iter().filter(|d| d.chat_id == user).collect();
    assert_eq!(text_of(to_user[0]), messages::THANKS_RECEIVED);

    h.shutdown().await;
}

#[tokio::test]
async fn cancel_mid_upload_releases_files() {
    let h = Harness::new(&["*"]).await;
    let user = "1001";

    h.send(user, command(Command::Start), 1).await;
    h.send(user, choice(MenuChoice::BuildFont), 1).await;
    h.upload(user, "a.svg", SQUARE, "a").await;
    h.send(user, choice(MenuChoice::AddGlyph), 1).await;
    h.send(user, file("b.svg", RING), 1).await;
    assert_eq!(stored_outlines(h.storage.path()), 2);

    let replies = h.send(user, command(Command::Cancel), 1).await;
    assert_eq!(text_of(&replies[0]), messages::CANCELLED);
    assert_eq!(stored_outlines(h.storage.path()), 0);
    // The record is evicted right after the reply goes out.
    let mut evicted = false;
    for _ in 0..200 {
        if h.dispatcher.sessions().is_empty().await {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(evicted, "cancelled session should be dropped");

    // Nothing left to continue: the bot asks for /start.
    let replies = h.send(user, choice(MenuChoice::Finish), 1).await;
    assert_eq!(text_of(&replies[0]), messages::SEND_START);

    h.shutdown().await;
}

#[tokio::test]
async fn rejected_upload_keeps_waiting_for_an_outline() {
    let h = Harness::new(&["*"]).await;
    let user = "1001";

    h.send(user, command(Command::Start), 1).await;
    h.send(user, choice(MenuChoice::BuildFont), 1).await;
    h.send(user, choice(MenuChoice::AddGlyph), 1).await;

    let replies = h.send(user, file("photo.png", b"\x89PNG\r\n"), 1).await;
    assert!(text_of(&replies[0]).contains("SVG"));
    let replies = h.send(user, Inbound::from_text("a"), 1).await;
    assert_eq!(text_of(&replies[0]), messages::NOT_A_FILE);

    let replies = h.send(user, file("a.svg", SQUARE), 1).await;
    assert_eq!(text_of(&replies[0]), messages::SEND_MAPPING);

    h.shutdown().await;
}

#[tokio::test]
async fn unauthorized_users_get_no_reply() {
    let h = Harness::new(&["1001"]).await;

    h.inject("666", command(Command::Start)).await;
    let replies = h.send("1001", command(Command::Start), 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let late = h.channel.take_outbox().await;

    assert!(replies.iter().chain(late.iter()).all(|d| d.chat_id == "1001"));
    assert_eq!(h.dispatcher.sessions().len().await, 1);

    h.shutdown().await;
}

#[tokio::test]
async fn users_build_fonts_side_by_side() {
    let mut h = Harness::new(&["*"]).await;
    let users = ["alice", "bob"];

    // Events for different users are injected back to back; each step
    // waits for both replies before the next one.
    for (payload, replies) in [
        (command(Command::Start), 1),
        (choice(MenuChoice::BuildFont), 1),
        (choice(MenuChoice::AddGlyph), 1),
        (file("a.svg", SQUARE), 1),
    ] {
        for user in users {
            h.inject(user, payload.clone()).await;
        }
        h.drain(users.len() * replies).await;
    }
    for user in users {
        h.inject(user, Inbound::from_text(user)).await;
    }
    h.drain(users.len()).await;
    assert_eq!(stored_outlines(h.storage.path()), 2);

    for user in users {
        h.inject(user, choice(MenuChoice::Finish)).await;
    }
    let replies = h.drain(users.len() * 4).await;
    for user in users {
        let documents = replies
            .iter()
            .filter(|d| d.chat_id == user && matches!(d.message, Outbound::Document { .. }))
            .count();
        assert_eq!(documents, 1, "{user} should get exactly one font");
    }
    assert_eq!(stored_outlines(h.storage.path()), 0);

    let mut assembled = 0;
    while let Ok(event) = h.events.try_recv() {
        if matches!(*event, DomainEvent::FontAssembled { .. }) {
            assembled += 1;
        }
    }
    assert_eq!(assembled, 2);

    h.shutdown().await;
}
