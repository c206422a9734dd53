//! Chat commands (`!mei`, `!clear`, `!tts`, `!help`)

use crate::event::ChatEvent;
use meibo_llm::ReplyGenerator;
use meibo_spk::SpeechOutput;
use std::sync::Arc;
use tracing::info;

pub const COMMAND_PREFIX: char = '!';

pub const HELP_TEXT: &str = "Commands: !mei [message] - talk to me | \
     !clear - clear memory (mods) | \
     !tts - toggle TTS (mods) | \
     Just mention 'mei' or 'meibo' in chat to talk!";

/// A recognized chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Talk to the bot directly, triggers or not
    Mei(String),
    Clear,
    Tts,
    Help,
}

impl Command {
    /// Parse `text` as a command. Unknown commands are not commands.
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.trim_start().strip_prefix(COMMAND_PREFIX)?;
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body.trim_end(), ""),
        };

        match name.to_lowercase().as_str() {
            "mei" => Some(Command::Mei(rest.to_string())),
            "clear" => Some(Command::Clear),
            "tts" => Some(Command::Tts),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// What to do with a command message
#[derive(Debug)]
pub enum CommandAction {
    /// Answer in chat right away, no turn
    Reply(String),
    /// Run a full turn for this event
    Queue(ChatEvent),
}

/// Executes chat commands against the generator and speech output.
pub struct CommandRouter {
    generator: Arc<dyn ReplyGenerator>,
    speech: Arc<dyn SpeechOutput>,
}

impl CommandRouter {
    pub fn new(generator: Arc<dyn ReplyGenerator>, speech: Arc<dyn SpeechOutput>) -> Self {
        Self { generator, speech }
    }

    /// Handle `event` if it is a command; `None` means it is ordinary chat.
    pub fn route(&self, event: &ChatEvent) -> Option<CommandAction> {
        let command = Command::parse(&event.text)?;
        info!("[COMMAND] {:?} from {}", command, event.speaker);

        let action = match command {
            Command::Mei(text) if text.is_empty() => {
                CommandAction::Reply("You called? What do you need?".to_string())
            }
            Command::Mei(text) => CommandAction::Queue(event.with_text(text)),
            Command::Clear if event.is_moderator => {
                self.generator.clear_history();
                CommandAction::Reply("Memory cleared! Starting fresh.".to_string())
            }
            Command::Clear => CommandAction::Reply("Only mods can clear my memory, sorry!".to_string()),
            Command::Tts if event.is_moderator => {
                let state = if self.speech.toggle() { "enabled" } else { "disabled" };
                CommandAction::Reply(format!("TTS {}", state))
            }
            Command::Tts => CommandAction::Reply("Only mods can toggle TTS!".to_string()),
            Command::Help => CommandAction::Reply(HELP_TEXT.to_string()),
        };

        Some(action)
    }
}
