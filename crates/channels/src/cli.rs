//! CLI channel: interactive terminal-based font building.
//!
//! Reads lines from stdin and writes replies to stdout. Input forms:
//! - `/start`, `/cancel`: commands
//! - `!build`, `!add`, `!finish`, `!back`, `!cancel` (or the callback
//!   identifier, e.g. `!finish_font`): button presses
//! - `@path/to/glyph.svg`: upload a file
//! - anything else: text
//!
//! Delivered fonts are written to the output directory.

use async_trait::async_trait;
use glyphsmith_core::channel::{Button, Channel, ChannelId, ChannelMessage, Inbound, MenuChoice};
use glyphsmith_core::error::ChannelError;
use std::path::{Path, PathBuf};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const LOCAL_USER: &str = "local_user";

/// What one line of terminal input means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    Exit,
    Upload(PathBuf),
    Payload(Inbound),
}

/// Short alias typed after `!` for each button.
pub fn shortcut(choice: MenuChoice) -> &'static str {
    match choice {
        MenuChoice::BuildFont => "build",
        MenuChoice::AddGlyph => "add",
        MenuChoice::Finish => "finish",
        MenuChoice::BackToMain => "back",
        MenuChoice::CancelAdd => "cancel",
    }
}

/// Classify one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<LineInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return Some(LineInput::Exit);
    }
    if let Some(path) = line.strip_prefix('@') {
        return Some(LineInput::Upload(PathBuf::from(path.trim())));
    }
    if let Some(name) = line.strip_prefix('!') {
        let choice = MenuChoice::ALL
            .into_iter()
            .find(|c| shortcut(*c) == name)
            .or_else(|| MenuChoice::from_callback(name));
        if let Some(choice) = choice {
            return Some(LineInput::Payload(Inbound::Choice { choice }));
        }
    }
    Some(LineInput::Payload(Inbound::from_text(line)))
}

/// Interactive CLI channel.
pub struct CliChannel {
    id: ChannelId,
    output_dir: PathBuf,
}

impl CliChannel {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            id: ChannelId("cli".into()),
            output_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

async fn read_upload(path: &Path) -> Result<Inbound, std::io::Error> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok(Inbound::File { filename, bytes })
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let payload = match parse_line(&line) {
                            None => continue,
                            Some(LineInput::Exit) => break,
                            Some(LineInput::Payload(payload)) => payload,
                            Some(LineInput::Upload(path)) => match read_upload(&path).await {
                                Ok(payload) => payload,
                                Err(e) => {
                                    eprintln!("❌ Cannot read {}: {e}", path.display());
                                    continue;
                                }
                            },
                        };

                        let msg = ChannelMessage::new(channel_id.clone(), LOCAL_USER, "cli_session", payload)
                            .with_sender_name("User");
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send_text(
        &self,
        _chat_id: &str,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<(), ChannelError> {
        println!("{text}");
        for row in buttons {
            let rendered: Vec<String> = row
                .iter()
                .map(|b| format!("[!{}] {}", shortcut(b.choice), b.label))
                .collect();
            println!("  {}", rendered.join("   "));
        }
        println!();
        Ok(())
    }

    async fn send_document(
        &self,
        _chat_id: &str,
        bytes: &[u8],
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "font.ttf".into());
        let path = self.output_dir.join(name);

        let written = async {
            tokio::fs::create_dir_all(&self.output_dir).await?;
            tokio::fs::write(&path, bytes).await
        }
        .await;
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "Failed to write document");
            return Err(ChannelError::DeliveryFailed {
                channel: "cli".into(),
                reason: e.to_string(),
            });
        }

        info!(path = %path.display(), size = bytes.len(), "Document written");
        if let Some(caption) = caption {
            println!("{caption}");
        }
        println!("📄 Saved {} ({} bytes)\n", path.display(), bytes.len());
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // CLI is always allowed (local user)
    }
}
