//! Inbound routing: own messages, commands and the trigger filter

mod common;

use common::{event, quiet_speech, MockSpeech, RecordingChannel, ScriptedGenerator};
use meibo_chat::commands::HELP_TEXT;
use meibo_chat::{ChatPipeline, CommandRouter, Orchestrator, PipelineConfig, TriggerFilter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn pipeline(generator: Arc<ScriptedGenerator>, speech: Arc<MockSpeech>) -> ChatPipeline {
    let config = PipelineConfig::default();
    let filter = TriggerFilter::new(&config.trigger_tokens);
    let commands = CommandRouter::new(generator.clone(), speech.clone());
    let bot_nick = config.bot_nick.clone();
    let timeout = config.step_timeout();
    let orchestrator = Arc::new(Orchestrator::new(config, generator, speech).unwrap());
    ChatPipeline::new(bot_nick, filter, commands, orchestrator, timeout)
}

#[tokio::test(start_paused = true)]
async fn test_trigger_queues_turn() {
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = pipeline(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    let drain = pipeline.handle_event(event(&channel, "viewer", "Hey MEIBO, snacks?")).await;
    drain.unwrap().await.unwrap();

    assert_eq!(generator.calls(), vec![("viewer".to_string(), "Hey MEIBO, snacks?".to_string())]);
    assert_eq!(channel.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_untriggered_message_ignored() {
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = pipeline(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    assert!(pipeline.handle_event(event(&channel, "viewer", "hi there")).await.is_none());
    assert!(generator.calls().is_empty());
    assert!(channel.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_own_messages_ignored() {
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = pipeline(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    let result = pipeline.handle_event(event(&channel, "Muei_Bot", "mei says hi")).await;
    assert!(result.is_none());
    assert!(generator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_mei_command_queues_stripped_text() {
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = pipeline(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    let drain = pipeline.handle_event(event(&channel, "viewer", "!mei what's your favorite snack")).await;
    drain.unwrap().await.unwrap();

    assert_eq!(generator.calls(), vec![("viewer".to_string(), "what's your favorite snack".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_bare_mei_command_answers_directly() {
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = pipeline(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    assert!(pipeline.handle_event(event(&channel, "viewer", "!mei")).await.is_none());
    assert_eq!(channel.messages(), vec!["You called? What do you need?"]);
    assert!(generator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clear_requires_moderator() {
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = pipeline(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();

    pipeline.handle_event(event(&channel, "viewer", "!clear")).await;
    assert_eq!(generator.clears(), 0);

    pipeline.handle_event(event(&channel, "mod", "!clear").moderator()).await;
    assert_eq!(generator.clears(), 1);

    assert_eq!(
        channel.messages(),
        vec!["Only mods can clear my memory, sorry!", "Memory cleared! Starting fresh."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_tts_toggle_for_moderators() {
    let generator = ScriptedGenerator::new(vec![]);
    let mut speech = MockSpeech::new();
    speech.expect_toggle().times(1).return_const(false);
    let pipeline = pipeline(generator, Arc::new(speech));
    let channel = RecordingChannel::new();

    pipeline.handle_event(event(&channel, "viewer", "!tts")).await;
    pipeline.handle_event(event(&channel, "streamer", "!TTS").moderator()).await;

    assert_eq!(channel.messages(), vec!["Only mods can toggle TTS!", "TTS disabled"]);
}

#[tokio::test(start_paused = true)]
async fn test_help_lists_commands() {
    let pipeline = pipeline(ScriptedGenerator::new(vec![]), quiet_speech());
    let channel = RecordingChannel::new();

    pipeline.handle_event(event(&channel, "viewer", "!help")).await;
    assert_eq!(channel.messages(), vec![HELP_TEXT]);
}

#[tokio::test(start_paused = true)]
async fn test_run_drains_until_input_closes() {
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = pipeline(generator.clone(), quiet_speech());
    let channel = RecordingChannel::new();
    let (tx, rx) = mpsc::channel(16);

    tx.send(event(&channel, "a", "mei one")).await.unwrap();
    tx.send(event(&channel, "b", "nothing to see")).await.unwrap();
    tx.send(event(&channel, "c", "mei two")).await.unwrap();
    drop(tx);

    tokio::time::timeout(Duration::from_secs(120), pipeline.run(rx))
        .await
        .unwrap();

    let speakers: Vec<String> = generator.calls().into_iter().map(|(s, _)| s).collect();
    assert_eq!(speakers, vec!["a", "c"]);
    assert_eq!(pipeline.orchestrator().turns_completed(), 2);
}
