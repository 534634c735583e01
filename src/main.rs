use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use base64::prelude::*;
use clap::Parser;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gemini_live_client::{
    BaseRealtime, LiveConfig, LiveEvent, create_realtime_provider,
    core::realtime::ToolResponseInput,
};

/// Gemini Live - terminal client for the Gemini Multimodal Live API
#[derive(Parser, Debug)]
#[command(name = "gemini-live")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Append received PCM audio to this file
    #[arg(long = "audio-out", value_name = "FILE")]
    audio_out: Option<PathBuf>,

    /// Send this JPEG image once connected
    #[arg(long = "image", value_name = "FILE")]
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        LiveConfig::from_file(&config_path)?
    } else {
        LiveConfig::from_env()?
    };

    let provider: Arc<dyn BaseRealtime> =
        Arc::from(create_realtime_provider(&config.provider, config.session)?);
    let events = provider
        .take_events()
        .ok_or_else(|| anyhow!("event stream already taken"))?;

    provider.connect().await?;

    let audio_out = match cli.audio_out {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| anyhow!("Failed to open {}: {e}", path.display()))?,
        ),
        None => None,
    };
    let (stop, stopped) = oneshot::channel();
    let printer = tokio::spawn(print_events(
        events,
        Arc::clone(&provider),
        audio_out,
        stopped,
    ));

    if let Some(image_path) = cli.image {
        let image = tokio::fs::read(&image_path)
            .await
            .map_err(|e| anyhow!("Failed to read {}: {e}", image_path.display()))?;
        provider.send_image(&BASE64_STANDARD.encode(image)).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = provider.send_text(text).await {
                    warn!("Failed to send text: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    provider.disconnect();
    let _ = stop.send(());
    if let Err(e) = printer.await {
        warn!("Event printer failed: {e}");
    }
    // Let the close frame go out before the runtime shuts down
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

/// Print model output until the session gives up or `stopped` fires, then
/// flush the audio file.
async fn print_events(
    mut events: gemini_live_client::core::realtime::EventReceiver,
    provider: Arc<dyn BaseRealtime>,
    mut audio_out: Option<File>,
    mut stopped: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = &mut stopped => break,
        };
        match event {
            LiveEvent::Audio(pcm) => {
                if let Some(file) = audio_out.as_mut()
                    && let Err(e) = file.write_all(&pcm).await
                {
                    warn!("Failed to write audio: {e}");
                }
            }
            LiveEvent::Content(turn) => {
                print!("{}", turn.text());
                let _ = std::io::stdout().flush();
            }
            LiveEvent::TurnComplete => println!(),
            LiveEvent::Interrupted => println!("\n[interrupted]"),
            LiveEvent::ToolCall(call) => {
                // No tools are registered here, so every call is answered with an error.
                for function_call in call.function_calls {
                    let response = ToolResponseInput::error(
                        function_call.id,
                        format!("tool '{}' is not available", function_call.name),
                    );
                    if let Err(e) = provider.send_tool_response(response).await {
                        warn!("Failed to send tool response: {e}");
                    }
                }
            }
            LiveEvent::ToolCallCancellation(cancellation) => {
                info!("Tool calls cancelled: {:?}", cancellation.ids);
            }
            LiveEvent::Reconnecting { attempt, delay } => {
                warn!("Connection lost, retry {attempt} in {}ms", delay.as_millis());
            }
            LiveEvent::Disconnected => {
                eprintln!("Disconnected: reconnection attempts exhausted");
                break;
            }
        }
    }

    if let Some(file) = audio_out.as_mut()
        && let Err(e) = file.flush().await
    {
        warn!("Failed to flush audio output: {e}");
    }
}
