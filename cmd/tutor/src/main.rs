//! Voice tutoring session driver.
//!
//! Connects one session against the live service and runs it until ctrl-c.
//! Without a platform audio integration the microphone is a realtime-paced
//! silence source, which still exercises the full capture → transport →
//! playback → transcript path.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tutorlive_audio::CaptureSource;
use tutorlive_context::CONTEXT_MARKER;
use tutorlive_live::{LiveConfig, Tool, MODEL_GEMINI_20_FLASH_EXP, VOICE_AOEDE};
use tutorlive_session::{Session, SessionOptions};

const DEFAULT_WS_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Voice tutoring session CLI.
#[derive(Parser)]
#[command(name = "tutor")]
#[command(about = "Realtime voice tutoring session driver")]
#[command(version)]
struct Cli {
    /// Template WebSocket endpoint (no credentials)
    #[arg(long, default_value = DEFAULT_WS_URL)]
    ws_url: String,

    /// Credential proxy endpoint; exchanges the template URL for a
    /// credentialed one so the key never lands in this process
    #[arg(long)]
    proxy: Option<String>,

    /// User-context source endpoint
    #[arg(long)]
    context_endpoint: Option<String>,

    /// Conversation-log sink endpoint
    #[arg(long)]
    sink_endpoint: Option<String>,

    /// Display name of the student
    #[arg(long, default_value = "student")]
    username: String,

    /// Stable user identifier
    #[arg(long, default_value = "anonymous")]
    user_id: String,

    /// Model identifier
    #[arg(long, default_value = MODEL_GEMINI_20_FLASH_EXP)]
    model: String,

    /// Prebuilt voice name
    #[arg(long, default_value = VOICE_AOEDE)]
    voice: String,

    /// File containing the system instruction; may include the
    /// {{user_context}} marker
    #[arg(long)]
    instruction_file: Option<PathBuf>,

    /// Skip the scripted opening line
    #[arg(long)]
    no_greeting: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Microphone stand-in producing silence at realtime pace.
struct SilenceSource {
    started: Option<Instant>,
    emitted: u64,
    sample_rate: u64,
}

impl SilenceSource {
    fn new(sample_rate: u32) -> Self {
        Self {
            started: None,
            emitted: 0,
            sample_rate: sample_rate as u64,
        }
    }
}

impl CaptureSource for SilenceSource {
    fn label(&self) -> &str {
        "silence"
    }

    fn start(&mut self) -> tutorlive_audio::Result<()> {
        self.started = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self, buf: &mut [f32]) -> tutorlive_audio::Result<usize> {
        let Some(started) = self.started else {
            return Ok(0);
        };
        let due = started.elapsed().as_micros() as u64 * self.sample_rate / 1_000_000;
        let available = due.saturating_sub(self.emitted) as usize;
        let n = available.min(buf.len());
        buf[..n].fill(0.0);
        self.emitted += n as u64;
        Ok(n)
    }
}

fn default_instruction(username: &str) -> String {
    format!(
        "You are an AI tutor specializing in electronic music production and \
creative direction. Provide expert guidance to aspiring musicians in any \
language, helping them develop their production skills while finding their \
unique artistic voice. Be concise, clear, and engaging.\n\n\
The current user's name is {username}. Be friendly and supportive of their \
musical journey, and do not repeat their name after greeting them.\n\n\
{CONTEXT_MARKER}"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let instruction = match &cli.instruction_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => default_instruction(&cli.username),
    };

    let config = LiveConfig::new(&cli.model)
        .with_identity(&cli.user_id, &cli.username)
        .with_voice(&cli.voice)
        .with_instruction_text(instruction)
        .with_tool(Tool::google_search());

    let mut opts = SessionOptions::new(&cli.ws_url);
    opts.proxy_endpoint = cli.proxy.clone();
    opts.context_endpoint = cli.context_endpoint.clone();
    opts.sink_endpoint = cli.sink_endpoint.clone();
    if !cli.no_greeting {
        opts.opening_line = Some(format!(
            "Hi {}, how's it going with your music today?",
            cli.username
        ));
    }

    let session = Session::new(config, opts);
    session
        .connect(Box::new(SilenceSource::new(
            tutorlive_audio::CAPTURE_SAMPLE_RATE,
        )))
        .await?;
    info!("session connected; press ctrl-c to end");

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                // Drain due playback in place of a real output device.
                if let Some(playback) = session.playback().await {
                    let due = playback.take_due();
                    if !due.is_empty() {
                        debug!(chunks = due.len(), volume = playback.volume(), "playback");
                    }
                }
                if !session.is_connected().await {
                    info!("connection closed by the service");
                    break;
                }
            }
        }
    }

    session.disconnect().await;
    info!("session ended");
    Ok(())
}
