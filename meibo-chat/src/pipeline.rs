//! Inbound chat handling: commands, trigger filter, then the turn queue

use crate::commands::{CommandAction, CommandRouter};
use crate::event::ChatEvent;
use crate::orchestrator::Orchestrator;
use crate::trigger::TriggerFilter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Routes every inbound chat event to a command, a queued turn or nowhere.
pub struct ChatPipeline {
    bot_nick: String,
    filter: TriggerFilter,
    commands: CommandRouter,
    orchestrator: Arc<Orchestrator>,
    send_timeout: Duration,
}

impl ChatPipeline {
    pub fn new(
        bot_nick: impl Into<String>,
        filter: TriggerFilter,
        commands: CommandRouter,
        orchestrator: Arc<Orchestrator>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            bot_nick: bot_nick.into(),
            filter,
            commands,
            orchestrator,
            send_timeout,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Handle one inbound event. Returns a drain handle if a turn loop started.
    pub async fn handle_event(&self, event: ChatEvent) -> Option<JoinHandle<()>> {
        debug!("Received message: {}: {}", event.speaker, event.text);

        if event.speaker.eq_ignore_ascii_case(&self.bot_nick) {
            debug!("Ignoring own message");
            return None;
        }

        match self.commands.route(&event) {
            Some(CommandAction::Reply(text)) => {
                self.reply(&event, &text).await;
                None
            }
            Some(CommandAction::Queue(event)) => self.orchestrator.submit(event),
            None if self.filter.should_respond(&event.text) => {
                debug!("Message triggered a reply");
                self.orchestrator.submit(event)
            }
            None => {
                debug!("Message did not trigger a reply");
                None
            }
        }
    }

    async fn reply(&self, event: &ChatEvent, text: &str) {
        match tokio::time::timeout(self.send_timeout, event.channel.send(text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to answer command from {}: {}", event.speaker, e),
            Err(_) => warn!("Answering command from {} timed out", event.speaker),
        }
    }

    /// Consume events until the sender side closes, then let queued turns finish.
    pub async fn run(&self, mut events: mpsc::Receiver<ChatEvent>) {
        info!("Chat pipeline running");
        let mut drains: Vec<JoinHandle<()>> = Vec::new();

        while let Some(event) = events.recv().await {
            drains.retain(|handle| !handle.is_finished());
            if let Some(handle) = self.handle_event(event).await {
                drains.push(handle);
            }
        }

        info!("Chat input closed, finishing queued turns");
        for handle in drains {
            if let Err(e) = handle.await {
                warn!("Turn loop ended abnormally: {}", e);
            }
        }
    }
}
