//! Single-consumer turn orchestrator
//!
//! Triggering chat events are queued and handled strictly one at a time:
//! generate a reply, post it to chat, speak it, animate the avatar, wait out
//! the estimated speech and the cooldown, then move to the next event. Every
//! step failure stays inside its turn; it is logged, recorded in the
//! `TurnReport` and the turn carries on.
//!
//! Only the submitter that flips the processing flag from idle starts a drain
//! task. A drain task that finds the queue empty clears the flag and then
//! looks again, so an event pushed in between is never left behind.

use crate::config::PipelineConfig;
use crate::cooldown::Cooldown;
use crate::dispatcher::{chunk_reply, Dispatcher};
use crate::error::{ChatError, DispatchError};
use crate::event::ChatEvent;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use meibo_llm::ReplyGenerator;
use meibo_me::{AvatarError, AvatarLink};
use meibo_spk::{SpeechError, SpeechOutput};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// A failed step of a turn. None of these abort the turn.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Reply generation failed: {0}")]
    Generation(String),

    #[error("Chat dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Speech failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("Avatar animation failed: {0}")]
    Avatar(#[from] AvatarError),

    #[error("Turn panicked: {0}")]
    Panicked(String),
}

/// Outcome of one conversational turn
#[derive(Debug)]
pub struct TurnReport {
    pub speaker: String,
    pub prompt: String,
    pub started_at: DateTime<Utc>,
    /// Wall time of the whole turn, cooldown included
    pub duration: Duration,
    /// Text actually used: the generated reply or the fallback
    pub reply: String,
    pub chunks_sent: usize,
    pub chunks_total: usize,
    pub errors: Vec<TurnError>,
}

impl TurnReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn used_fallback(&self) -> bool {
        self.errors.iter().any(|e| matches!(e, TurnError::Generation(_)))
    }
}

/// Clears the processing flag when a drain pass ends, unwinding included.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    generator: Arc<dyn ReplyGenerator>,
    speech: Arc<dyn SpeechOutput>,
    avatar: Option<Arc<AvatarLink>>,
    dispatcher: Dispatcher,
    cooldown: Cooldown,
    queue: Mutex<VecDeque<ChatEvent>>,
    processing: AtomicBool,
    turns_completed: AtomicU64,
    report_sink: Option<mpsc::UnboundedSender<TurnReport>>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn ReplyGenerator>,
        speech: Arc<dyn SpeechOutput>,
    ) -> Result<Self, ChatError> {
        config.validate().map_err(ChatError::Config)?;
        let dispatcher = Dispatcher::new(config.max_chunk_len, config.chunk_pacing(), config.step_timeout());
        let cooldown = Cooldown::new(config.cooldown());
        Ok(Self {
            config: Arc::new(config),
            generator,
            speech,
            avatar: None,
            dispatcher,
            cooldown,
            queue: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            turns_completed: AtomicU64::new(0),
            report_sink: None,
        })
    }

    /// Animate `avatar` while replies are spoken
    pub fn with_avatar(mut self, avatar: Arc<AvatarLink>) -> Self {
        self.avatar = Some(avatar);
        self
    }

    /// Publish every finished turn's report on `sink`
    pub fn with_report_sink(mut self, sink: mpsc::UnboundedSender<TurnReport>) -> Self {
        self.report_sink = Some(sink);
        self
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn turns_completed(&self) -> u64 {
        self.turns_completed.load(Ordering::Relaxed)
    }

    /// Queue `event` and start draining if no turn is running.
    ///
    /// Returns the handle of the drain task when this call started one.
    pub fn submit(self: &Arc<Self>, event: ChatEvent) -> Option<JoinHandle<()>> {
        let queued = {
            let mut queue = self.queue.lock();
            queue.push_back(event);
            queue.len()
        };
        info!("[QUEUE] Added message to queue. Queue size: {}", queued);

        if !self.try_begin_processing() {
            return None;
        }
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.drain().await }))
    }

    fn try_begin_processing(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn next_event(&self) -> Option<ChatEvent> {
        self.queue.lock().pop_front()
    }

    fn has_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    async fn drain(&self) {
        loop {
            let active = ProcessingGuard(&self.processing);
            while let Some(event) = self.next_event() {
                let report = self.run_turn_contained(event).await;
                self.finish_turn(report);
            }

            if !self.release(active) {
                break;
            }
            debug!("[QUEUE] Event arrived while going idle, resuming");
        }
        info!("[QUEUE] Queue empty, waiting for new messages");
    }

    /// End a drain pass by clearing the processing flag. Returns true when an
    /// event was queued before the flag went down and this pass took it back.
    fn release(&self, active: ProcessingGuard<'_>) -> bool {
        drop(active);
        self.has_pending() && self.try_begin_processing()
    }

    /// Run a turn, turning a panic in any step into a failed turn so the
    /// queue keeps draining.
    async fn run_turn_contained(&self, event: ChatEvent) -> TurnReport {
        let speaker = event.speaker.clone();
        let prompt = event.text.clone();
        let started_at = Utc::now();
        let clock = Instant::now();

        match AssertUnwindSafe(self.run_turn(event)).catch_unwind().await {
            Ok(report) => report,
            Err(payload) => {
                self.cooldown.begin();
                self.cooldown.wait_ready().await;
                TurnReport {
                    speaker,
                    prompt,
                    started_at,
                    duration: clock.elapsed(),
                    reply: String::new(),
                    chunks_sent: 0,
                    chunks_total: 0,
                    errors: vec![TurnError::Panicked(panic_message(payload.as_ref()))],
                }
            }
        }
    }

    fn finish_turn(&self, report: TurnReport) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
        for e in &report.errors {
            error!("Turn for {} had a failed step: {}", report.speaker, e);
        }
        info!(
            "[QUEUE] Finished processing. Remaining: {}",
            self.queue_len()
        );
        if let Some(sink) = &self.report_sink {
            // Nobody listening is fine
            let _ = sink.send(report);
        }
    }

    /// Run one full turn for `event`.
    pub async fn run_turn(&self, event: ChatEvent) -> TurnReport {
        info!("[PROCESSING] Message from {}: {}", event.speaker, event.text);
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut errors = Vec::new();

        let reply = match self.generate(&event).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Using fallback reply for {}: {}", event.speaker, e);
                errors.push(e);
                self.config.fallback_reply.clone()
            }
        };

        let chunks_total = chunk_reply(&reply, self.config.max_chunk_len).len();
        let chunks_sent = match self.dispatcher.dispatch(event.channel.as_ref(), &reply).await {
            Ok(sent) => sent,
            Err(e) => {
                let sent = e.sent;
                errors.push(TurnError::Dispatch(e));
                sent
            }
        };

        info!("[TTS] Speaking response...");
        if let Err(e) = self.speech.speak(&reply) {
            errors.push(TurnError::Speech(e));
        }

        if let Some(avatar) = &self.avatar {
            info!("[VTUBER] Animating mouth...");
            if let Err(e) = avatar.animate_talking(&reply).await {
                errors.push(TurnError::Avatar(e));
            }
        }

        tokio::time::sleep(self.config.post_speech_buffer()).await;
        let speech_estimate = self
            .config
            .speech_pacing()
            .estimate(&reply)
            .saturating_add(self.config.speech_tail());
        debug!("Waiting {:?} for speech to finish", speech_estimate);
        tokio::time::sleep(speech_estimate).await;

        self.cooldown.begin();
        self.cooldown.wait_ready().await;

        TurnReport {
            speaker: event.speaker,
            prompt: event.text,
            started_at,
            duration: clock.elapsed(),
            reply,
            chunks_sent,
            chunks_total,
            errors,
        }
    }

    async fn generate(&self, event: &ChatEvent) -> Result<String, TurnError> {
        let timeout = self.config.step_timeout();
        let result = tokio::time::timeout(
            timeout,
            self.generator.generate_reply(&event.speaker, &event.text),
        )
        .await;

        match result {
            Ok(Ok(reply)) if !reply.trim().is_empty() => Ok(reply),
            Ok(Ok(_)) => Err(TurnError::Generation("empty reply".to_string())),
            Ok(Err(e)) => Err(TurnError::Generation(e.to_string())),
            Err(_) => Err(TurnError::Generation(format!("timed out after {:?}", timeout))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
