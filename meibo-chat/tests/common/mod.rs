//! Fakes shared by the pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use meibo_chat::{ChatChannel, ChatError, ChatEvent};
use meibo_llm::{LLMError, ReplyGenerator};
use meibo_spk::{SpeechError, SpeechOutput};
use mockall::mock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mock! {
    pub Speech {}

    impl SpeechOutput for Speech {
        fn speak(&self, text: &str) -> Result<(), SpeechError>;
        fn toggle(&self) -> bool;
        fn is_enabled(&self) -> bool;
    }
}

/// Speech mock that accepts any number of utterances
pub fn quiet_speech() -> Arc<MockSpeech> {
    let mut speech = MockSpeech::new();
    speech.expect_speak().returning(|_| Ok(()));
    speech.expect_is_enabled().return_const(true);
    Arc::new(speech)
}

/// Chat channel that records what was posted and when
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(Instant, String)>>,
    /// 1-based send number that fails
    fail_on: Option<usize>,
    attempts: AtomicUsize,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(send_number: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(send_number),
            ..Self::default()
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.sent.lock().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    async fn send(&self, text: &str) -> meibo_chat::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(attempt) {
            return Err(ChatError::Send("rate limited".to_string()));
        }
        self.sent.lock().push((Instant::now(), text.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "#test"
    }
}

pub enum Step {
    Reply(String),
    Fail,
    /// Never answers
    Hang,
    Panic,
}

/// Reply generator that plays back a script, then echoes
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Step>>,
    latency: Duration,
    calls: Mutex<Vec<(String, String)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    clears: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Self::with_latency(script, Duration::from_millis(500))
    }

    pub fn with_latency(script: Vec<Step>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            latency,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate_reply(&self, speaker: &str, text: &str) -> meibo_llm::Result<String> {
        self.calls.lock().push((speaker.to_string(), text.to_string()));
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let step = self.script.lock().pop_front();
        tokio::time::sleep(self.latency).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail) => Err(LLMError::Provider("overloaded".to_string())),
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(Step::Panic) => panic!("generator blew up"),
            None => Ok(format!("Caw! {} said: {}", speaker, text)),
        }
    }

    fn clear_history(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn event(channel: &Arc<RecordingChannel>, speaker: &str, text: &str) -> ChatEvent {
    ChatEvent::new(speaker, text, channel.clone())
}
