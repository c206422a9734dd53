// Meibo console chat
// Local stand-in for a chat platform: stdin lines are chat messages, bot replies go to stdout

use async_trait::async_trait;
use meibo_chat::{ChatChannel, ChatError, ChatEvent};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Prints the bot's messages to stdout.
pub struct ConsoleChannel {
    nick: String,
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleChannel {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl ChatChannel for ConsoleChannel {
    async fn send(&self, text: &str) -> meibo_chat::Result<()> {
        let line = format!("{}: {}\n", self.nick, text);
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ChatError::Send(e.to_string()))?;
        stdout.flush().await.map_err(|e| ChatError::Send(e.to_string()))
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// One parsed console line
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput {
    /// `name: message`, or a bare message from the default speaker
    Message { speaker: Option<String>, text: String },
    /// `/mod` flips the moderator flag for following messages
    ToggleModerator,
    Quit,
    Blank,
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    match line {
        "" => return ConsoleInput::Blank,
        "/quit" | "/exit" => return ConsoleInput::Quit,
        "/mod" => return ConsoleInput::ToggleModerator,
        _ => {}
    }

    // "name: text" where name is a single chat-style word
    if let Some((name, text)) = line.split_once(": ") {
        let is_nick = !name.is_empty()
            && name.len() <= 25
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if is_nick {
            return ConsoleInput::Message {
                speaker: Some(name.to_string()),
                text: text.trim().to_string(),
            };
        }
    }

    ConsoleInput::Message {
        speaker: None,
        text: line.to_string(),
    }
}

/// Read chat lines from stdin until EOF or `/quit`, forwarding them as events.
pub async fn read_events(
    channel: Arc<ConsoleChannel>,
    default_speaker: String,
    mut moderator: bool,
    events: mpsc::Sender<ChatEvent>,
) -> std::io::Result<()> {
    info!("Console chat ready. Type messages, 'name: message' to speak as someone else, /mod, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ConsoleInput::Blank => continue,
            ConsoleInput::Quit => break,
            ConsoleInput::ToggleModerator => {
                moderator = !moderator;
                info!("Moderator mode {}", if moderator { "on" } else { "off" });
            }
            ConsoleInput::Message { speaker, text } => {
                let speaker = speaker.unwrap_or_else(|| default_speaker.clone());
                let mut event = ChatEvent::new(speaker, text, channel.clone());
                event.is_moderator = moderator;
                if events.send(event).await.is_err() {
                    debug!("Pipeline stopped, closing console input");
                    break;
                }
            }
        }
    }

    Ok(())
}
