use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::Select;
use tracing_subscriber::EnvFilter;

use lumen_voice::config::ConfigOverrides;
use lumen_voice::preferences::{VoiceOption, find_voice, stored_voice};
use lumen_voice::presentation::TerminalSession;
use lumen_voice::voice::{Microphone, Speaker, SpeakerSink, rms, sine_tone};
use lumen_voice::{
    Config, ControllerRuntime, EmotionSignal, FilePreferenceStore, HttpConversationClient,
    PlaybackSink, PreferenceStore, SilentSink, TurnController, TurnState, VOICES,
};

/// How long to wait for the backend to open a session
const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Lumen - talk with the Lumen assistant
#[derive(Parser)]
#[command(name = "lumen", version, about)]
struct Cli {
    /// Lumen backend URL
    #[arg(long, env = "LUMEN_API_URL")]
    api_url: Option<String>,

    /// Don't play assistant speech
    #[arg(long)]
    mute: bool,

    /// Don't resume listening automatically after each turn
    #[arg(long)]
    no_auto_listen: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start a voice conversation (default)
    Chat,
    /// List available assistant voices
    Voices,
    /// Choose the assistant voice
    SelectVoice {
        /// Voice id; prompts when omitted
        voice: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,lumen_voice=info",
        1 => "info,lumen_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = ConfigOverrides {
        api_url: cli.api_url,
        mute: cli.mute,
        no_auto_listen: cli.no_auto_listen,
    };
    let config = Config::load(&overrides)?;
    tracing::debug!(?config, "loaded configuration");

    let preferences = FilePreferenceStore::in_dir(&config.data_dir);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&config, &preferences).await,
        Command::Voices => {
            list_voices(&preferences);
            Ok(())
        }
        Command::SelectVoice { voice } => select_voice(&preferences, voice.as_deref()),
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
    }
}

/// Run the turn-taking loop against the backend
#[allow(clippy::future_not_send)]
async fn chat(config: &Config, preferences: &dyn PreferenceStore) -> anyhow::Result<()> {
    // Read once; first run (or an unreadable file) asks, like the voice picker
    let voice = match stored_voice(preferences) {
        Some(voice) => voice,
        None => prompt_voice(preferences, None)?,
    };

    let microphone = Microphone::open().context("microphone required for voice chat")?;

    let service = Arc::new(HttpConversationClient::new(
        &config.api_url,
        config.request_timeout,
    )?);
    let sink: Arc<dyn PlaybackSink> = if config.playback_enabled {
        Arc::new(SpeakerSink)
    } else {
        Arc::new(SilentSink)
    };

    let (runtime, handle) =
        ControllerRuntime::new(TurnController::new(config.auto_listen), service, sink);
    let runtime_task = tokio::spawn(runtime.run());

    tracing::info!(url = %config.api_url, "connecting to Lumen backend");
    handle.initialize().await?;
    let view = tokio::time::timeout(
        SESSION_TIMEOUT,
        handle.wait_until(|v| v.state != TurnState::Uninitialized || v.latest_error.is_some()),
    )
    .await
    .context("timed out waiting for a session")??;

    if view.state == TurnState::Uninitialized {
        anyhow::bail!(
            "{}",
            view.latest_error.unwrap_or_else(|| "no session".to_string())
        );
    }

    TerminalSession::greet(Some(voice));
    handle.start_listening().await?;

    let emotion = config.default_emotion.as_deref().map(EmotionSignal::dominant);
    TerminalSession::new(handle, microphone)
        .with_emotion(emotion)
        .run()
        .await?;

    runtime_task.abort();
    Ok(())
}

fn list_voices(preferences: &dyn PreferenceStore) {
    let selected = preferences.selected_voice().ok().flatten();
    for voice in VOICES {
        let marker = if selected.as_deref() == Some(voice.id) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<8} {:<8} {}", voice.id, voice.name, voice.description);
    }
}

fn select_voice(preferences: &dyn PreferenceStore, voice: Option<&str>) -> anyhow::Result<()> {
    let chosen = match voice {
        Some(id) => {
            preferences.set_selected_voice(id)?;
            find_voice(id).context("unknown voice")?
        }
        None => {
            let current = preferences.selected_voice().ok().flatten();
            prompt_voice(preferences, current.as_deref())?
        }
    };
    println!("Voice set to {}.", chosen.name);
    Ok(())
}

/// Ask the user to pick a voice and persist it
fn prompt_voice(
    preferences: &dyn PreferenceStore,
    current: Option<&str>,
) -> anyhow::Result<&'static VoiceOption> {
    let labels: Vec<String> = VOICES
        .iter()
        .map(|v| format!("{} - {}", v.name, v.description))
        .collect();
    let default = current
        .and_then(|id| VOICES.iter().position(|v| v.id == id))
        .unwrap_or(0);

    let idx = Select::new()
        .with_prompt("Choose your companion's voice")
        .items(&labels)
        .default(default)
        .interact()?;

    let voice = &VOICES[idx];
    preferences.set_selected_voice(voice.id)?;
    Ok(voice)
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut microphone = Microphone::open()?;
    microphone.begin()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = microphone.drain();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    microphone.abandon();
    println!("\nMicrophone test complete.");
    Ok(())
}

/// Test speaker output
async fn test_speaker() -> anyhow::Result<()> {
    println!("Playing a test tone...");

    tokio::task::spawn_blocking(|| {
        Speaker::open()?.play_pcm(sine_tone(440.0, Duration::from_secs(1), 0.3))
    })
    .await??;

    println!("Speaker test complete.");
    Ok(())
}
