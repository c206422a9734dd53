//! Turn orchestration tests (virtual time)

mod common;

use async_trait::async_trait;
use common::{event, quiet_speech, MockSpeech, RecordingChannel, ScriptedGenerator, Step};
use meibo_chat::{Orchestrator, PipelineConfig, TurnError, TurnReport};
use meibo_me::{AvatarBackend, AvatarConfig, AvatarError, AvatarLink};
use meibo_spk::SpeechError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn orchestrator(
    generator: Arc<ScriptedGenerator>,
    speech: Arc<MockSpeech>,
) -> (Arc<Orchestrator>, mpsc::UnboundedReceiver<TurnReport>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(PipelineConfig::default(), generator, speech)
        .unwrap()
        .with_report_sink(tx);
    (Arc::new(orchestrator), rx)
}

#[tokio::test(start_paused = true)]
async fn test_turn_timeline() {
    let generator = ScriptedGenerator::new(vec![Step::Reply("one two three four five".to_string())]);
    let (orchestrator, _rx) = orchestrator(generator, quiet_speech());
    let channel = RecordingChannel::new();

    let start = Instant::now();
    let report = orchestrator.run_turn(event(&channel, "viewer", "hi mei")).await;

    // 0.5s generation + 1s buffer + (5 words / 2.5 + 1s tail) + 3s cooldown
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(7500));
    assert!(elapsed < Duration::from_millis(7600));
    assert_eq!(report.duration, elapsed);
    assert!(report.is_clean());
    assert_eq!(report.chunks_sent, 1);
    assert_eq!(channel.messages(), vec!["one two three four five"]);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_submits_run_sequentially() {
    let generator = ScriptedGenerator::new(vec![]);
    let (orchestrator, mut rx) = orchestrator(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    let first = orchestrator.submit(event(&channel, "a", "mei 1"));
    let second = orchestrator.submit(event(&channel, "b", "mei 2"));
    let third = orchestrator.submit(event(&channel, "c", "mei 3"));
    assert!(first.is_some());
    assert!(second.is_none());
    assert!(third.is_none());

    first.unwrap().await.unwrap();

    let speakers: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|r| r.speaker)
        .collect();
    assert_eq!(speakers, vec!["a", "b", "c"]);
    assert_eq!(generator.max_active(), 1);
    assert_eq!(orchestrator.turns_completed(), 3);
    assert!(!orchestrator.is_processing());
    assert_eq!(orchestrator.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submitters_start_one_drain() {
    let generator = ScriptedGenerator::new(vec![]);
    let (orchestrator, _rx) = orchestrator(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    let mut submitters = vec![];
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        let message = event(&channel, &format!("viewer{}", i), "hey mei");
        submitters.push(tokio::spawn(async move { orchestrator.submit(message) }));
    }

    let mut drains = vec![];
    for submitter in submitters {
        if let Some(drain) = submitter.await.unwrap() {
            drains.push(drain);
        }
    }
    assert_eq!(drains.len(), 1);

    for drain in drains {
        drain.await.unwrap();
    }
    assert_eq!(generator.calls().len(), 8);
    assert_eq!(generator.max_active(), 1);
    assert_eq!(channel.messages().len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_submit_after_idle_starts_new_drain() {
    let generator = ScriptedGenerator::new(vec![]);
    let (orchestrator, _rx) = orchestrator(generator, quiet_speech());
    let channel = RecordingChannel::new();

    orchestrator.submit(event(&channel, "a", "mei")).unwrap().await.unwrap();
    assert!(!orchestrator.is_processing());

    let again = orchestrator.submit(event(&channel, "b", "mei"));
    assert!(again.is_some());
    again.unwrap().await.unwrap();
    assert_eq!(orchestrator.turns_completed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_generation_failure_uses_fallback() {
    let generator = ScriptedGenerator::new(vec![Step::Fail, Step::Reply("Back to normal.".to_string())]);
    let (orchestrator, mut rx) = orchestrator(generator, quiet_speech());
    let channel = RecordingChannel::new();

    let _ = orchestrator.submit(event(&channel, "a", "mei?"));
    let _ = orchestrator.submit(event(&channel, "b", "mei!"));

    let failed = rx.recv().await.unwrap();
    assert!(failed.used_fallback());
    assert_eq!(failed.reply, PipelineConfig::default().fallback_reply);
    assert!(matches!(failed.errors.as_slice(), [TurnError::Generation(_)]));

    let recovered = rx.recv().await.unwrap();
    assert!(recovered.is_clean());
    assert_eq!(recovered.reply, "Back to normal.");
    assert_eq!(
        channel.messages(),
        vec![PipelineConfig::default().fallback_reply, "Back to normal.".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_panicking_turn_does_not_strand_queue() {
    let generator = ScriptedGenerator::new(vec![Step::Panic, Step::Reply("Still here!".to_string())]);
    let (orchestrator, mut rx) = orchestrator(generator, quiet_speech());
    let channel = RecordingChannel::new();

    let drain = orchestrator.submit(event(&channel, "a", "mei?")).unwrap();
    assert!(orchestrator.submit(event(&channel, "b", "mei!")).is_none());
    drain.await.unwrap();

    let panicked = rx.recv().await.unwrap();
    assert_eq!(panicked.speaker, "a");
    assert_eq!(panicked.chunks_sent, 0);
    assert!(matches!(panicked.errors.as_slice(), [TurnError::Panicked(msg)] if msg == "generator blew up"));

    let next = rx.recv().await.unwrap();
    assert!(next.is_clean());
    assert_eq!(channel.messages(), vec!["Still here!"]);
    assert_eq!(orchestrator.turns_completed(), 2);
    assert_eq!(orchestrator.queue_len(), 0);
    assert!(!orchestrator.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_generation_timeout_uses_fallback() {
    let generator = ScriptedGenerator::new(vec![Step::Hang]);
    let (orchestrator, _rx) = orchestrator(generator, quiet_speech());
    let channel = RecordingChannel::new();

    let start = Instant::now();
    let report = orchestrator.run_turn(event(&channel, "a", "mei")).await;
    assert!(report.used_fallback());
    assert!(start.elapsed() >= PipelineConfig::default().step_timeout());
    assert_eq!(channel.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_reply_uses_fallback() {
    let generator = ScriptedGenerator::new(vec![Step::Reply("   ".to_string())]);
    let (orchestrator, _rx) = orchestrator(generator, quiet_speech());
    let channel = RecordingChannel::new();

    let report = orchestrator.run_turn(event(&channel, "a", "mei")).await;
    assert!(report.used_fallback());
    assert_eq!(channel.messages(), vec![PipelineConfig::default().fallback_reply]);
}

#[tokio::test(start_paused = true)]
async fn test_long_reply_chunked_with_pacing() {
    let sentence = "The crow-tengu collects shiny things from every town she visits. ";
    let reply = sentence.repeat(12);
    let generator = ScriptedGenerator::new(vec![Step::Reply(reply.clone())]);
    let (orchestrator, _rx) = orchestrator(generator, quiet_speech());
    let channel = RecordingChannel::new();

    let report = orchestrator.run_turn(event(&channel, "a", "mei story")).await;
    let messages = channel.messages();
    assert!(messages.len() > 1);
    assert_eq!(report.chunks_sent, messages.len());
    assert_eq!(report.chunks_total, messages.len());
    assert!(messages.iter().all(|m| m.chars().count() <= 450));
    assert_eq!(messages.join(" "), reply.trim());

    let stamps = channel.timestamps();
    for pair in stamps.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_failure_stops_chunks_but_not_turn() {
    let reply = "Snacks are the answer. ".repeat(40);
    let generator = ScriptedGenerator::new(vec![Step::Reply(reply.clone())]);

    let mut speech = MockSpeech::new();
    speech
        .expect_speak()
        .withf(move |text: &str| text == reply)
        .times(1)
        .returning(|_| Ok(()));
    let (orchestrator, _rx) = orchestrator(generator, Arc::new(speech));
    let channel = RecordingChannel::failing_on(2);

    let report = orchestrator.run_turn(event(&channel, "a", "mei")).await;
    assert_eq!(report.chunks_sent, 1);
    assert!(report.chunks_total > 2);
    assert!(matches!(report.errors.as_slice(), [TurnError::Dispatch(e)] if e.sent == 1));
    assert_eq!(channel.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_speech_failure_recorded_and_next_turn_runs() {
    let generator = ScriptedGenerator::new(vec![]);
    let mut speech = MockSpeech::new();
    let mut seq = mockall::Sequence::new();
    speech
        .expect_speak()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(SpeechError::Playback("no audio device".to_string())));
    speech
        .expect_speak()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    let (orchestrator, mut rx) = orchestrator(generator, Arc::new(speech));
    let channel = RecordingChannel::new();

    let _ = orchestrator.submit(event(&channel, "a", "mei"));
    let _ = orchestrator.submit(event(&channel, "b", "mei"));

    let first = rx.recv().await.unwrap();
    assert!(matches!(first.errors.as_slice(), [TurnError::Speech(_)]));
    let second = rx.recv().await.unwrap();
    assert!(second.is_clean());
}

/// Backend that connects but rejects every parameter write.
struct BrokenRig;

#[async_trait]
impl AvatarBackend for BrokenRig {
    async fn connect(&self) -> Result<(), AvatarError> {
        Ok(())
    }

    async fn set_parameter(&self, _name: &str, _value: f64) -> Result<(), AvatarError> {
        Err(AvatarError::Api("Parameter not found".to_string()))
    }

    async fn close(&self) -> Result<(), AvatarError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "broken"
    }
}

#[tokio::test(start_paused = true)]
async fn test_avatar_failure_recorded() {
    let link = Arc::new(AvatarLink::new(Arc::new(BrokenRig), AvatarConfig::default()).unwrap());
    link.connect().await.unwrap();

    let generator = ScriptedGenerator::new(vec![Step::Reply("a few words for chat".to_string())]);
    let orchestrator = Orchestrator::new(PipelineConfig::default(), generator, quiet_speech())
        .unwrap()
        .with_avatar(link);
    let channel = RecordingChannel::new();

    let report = orchestrator.run_turn(event(&channel, "a", "mei")).await;
    assert!(matches!(report.errors.as_slice(), [TurnError::Avatar(_)]));
    assert_eq!(report.chunks_sent, 1);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = PipelineConfig::default();
    config.max_chunk_len = 900;
    let result = Orchestrator::new(config, ScriptedGenerator::new(vec![]), quiet_speech());
    assert!(result.is_err());
}
