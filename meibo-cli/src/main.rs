// Meibo Command Line Interface
// Runs the live-chat bot and its smoke tests for speech and avatar

mod console;
mod settings;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use console::ConsoleChannel;
use meibo_chat::{ChatPipeline, CommandRouter, Orchestrator, TriggerFilter, TurnReport};
use meibo_llm::ReplyBrain;
use meibo_me::{AvatarLink, VtsBackend};
use meibo_spk::{SpeechOutput, SpeechPlayer};
use settings::MeiboSettings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meibo")]
#[command(about = "Meibo - AI live-chat companion with speech and VTube Studio lip sync", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to ./meibo.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot against console chat (stdin/stdout)
    Run {
        /// Name used for plain console lines
        #[arg(long, default_value = "viewer")]
        speaker: String,

        /// Treat console messages as coming from a moderator
        #[arg(long)]
        moderator: bool,

        /// Do not speak replies
        #[arg(long)]
        no_speech: bool,

        /// Do not drive VTube Studio
        #[arg(long)]
        no_avatar: bool,
    },

    /// Print the effective settings
    Config {
        #[arg(long, value_enum, default_value = "toml")]
        format: OutputFormat,
    },

    /// Speak a line through the configured TTS engine
    Speak {
        text: String,
    },

    /// Connect to VTube Studio and animate a line of speech
    Avatar {
        #[arg(default_value = "Caw caw! Testing the mouth, one two three.")]
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Toml,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is normal; keys may come from the real environment
    let _ = dotenvy::dotenv();
    init_logging(cli.verbose, cli.log_json);

    let settings = MeiboSettings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Run {
            speaker,
            moderator,
            no_speech,
            no_avatar,
        } => run_bot(settings, speaker, moderator, no_speech, no_avatar).await?,
        Commands::Config { format } => {
            let text = match format {
                OutputFormat::Toml => settings.to_toml()?,
                OutputFormat::Json => serde_json::to_string_pretty(&settings)?,
            };
            println!("{}", text);
        }
        Commands::Speak { text } => {
            let player = SpeechPlayer::new(settings.speech)?;
            player.speak_and_wait(&text).await?;
        }
        Commands::Avatar { text } => animate_once(settings, &text).await?,
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout belongs to console chat
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_bot(
    mut settings: MeiboSettings,
    speaker: String,
    moderator: bool,
    no_speech: bool,
    no_avatar: bool,
) -> anyhow::Result<()> {
    info!("Starting Meibo...");
    if no_speech {
        settings.speech.enabled = false;
    }

    let brain = Arc::new(ReplyBrain::from_env(settings.llm.clone()).context("Reply generator unavailable")?);
    let speech = Arc::new(SpeechPlayer::new(settings.speech.clone())?);

    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let mut orchestrator = Orchestrator::new(settings.pipeline.clone(), brain.clone(), speech.clone())?
        .with_report_sink(report_tx);
    let reports = tokio::spawn(log_reports(report_rx));

    let avatar = if settings.avatar.enabled && !no_avatar {
        let backend = Arc::new(VtsBackend::new(settings.avatar.clone())?);
        let link = Arc::new(
            AvatarLink::new(backend, settings.avatar.clone())?.with_pacing(settings.pipeline.speech_pacing()),
        );
        info!("Connecting to VTube Studio...");
        if let Err(e) = link.connect().await {
            warn!("VTube Studio unavailable, continuing without animation ({}). Is the API enabled?", e);
        }
        orchestrator = orchestrator.with_avatar(link.clone());
        Some(link)
    } else {
        info!("Avatar disabled");
        None
    };

    let orchestrator = Arc::new(orchestrator);
    let pipeline = ChatPipeline::new(
        settings.pipeline.bot_nick.clone(),
        TriggerFilter::new(&settings.pipeline.trigger_tokens),
        CommandRouter::new(brain, speech.clone()),
        orchestrator,
        settings.pipeline.step_timeout(),
    );

    let channel = Arc::new(ConsoleChannel::new(settings.pipeline.bot_nick.clone()));
    let (tx, rx) = mpsc::channel(64);
    let reader = tokio::spawn(console::read_events(channel, speaker, moderator, tx));

    info!(
        "Meibo is online as {} (speech {})",
        settings.pipeline.bot_nick,
        if speech.is_enabled() { "on" } else { "off" }
    );

    tokio::select! {
        _ = pipeline.run(rx) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    reader.abort();
    reports.abort();
    if let Some(link) = avatar {
        link.disconnect().await;
    }
    info!("Meibo stopped");
    Ok(())
}

async fn log_reports(mut reports: mpsc::UnboundedReceiver<TurnReport>) {
    while let Some(report) = reports.recv().await {
        info!(
            speaker = %report.speaker,
            started_at = %report.started_at.to_rfc3339(),
            duration_ms = report.duration.as_millis() as u64,
            chunks = report.chunks_sent,
            fallback = report.used_fallback(),
            errors = report.errors.len(),
            "Turn complete"
        );
    }
}

async fn animate_once(settings: MeiboSettings, text: &str) -> anyhow::Result<()> {
    let backend = Arc::new(VtsBackend::new(settings.avatar.clone())?);
    let link = AvatarLink::new(backend, settings.avatar)?.with_pacing(settings.pipeline.speech_pacing());

    link.connect().await.context("Failed to connect to VTube Studio")?;
    let cycles = link.animate_talking(text).await?;
    println!("Animated {} mouth cycles", cycles);
    link.disconnect().await;
    Ok(())
}
