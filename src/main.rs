use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use voxnote::capture::CpalBackend;
use voxnote::config::Config;
use voxnote::session::{SessionController, SessionPhase, SessionPolicy};
use voxnote::transcribe::HttpProvider;

#[derive(Debug, Parser)]
#[command(
    name = "voxnote",
    version,
    about = "Microphone capture and transcription session controller"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to an alternate config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let api_key = config
        .transcription
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let Some(api_key) = api_key else {
        bail!("No transcription API key configured. Set transcription.api_key in the config file or the OPENAI_API_KEY environment variable.");
    };

    let transcriber = Arc::new(HttpProvider::new(
        api_key,
        config.transcription.api_endpoint.clone(),
        config.transcription.model.clone(),
        config.transcription.language.clone(),
    )?);
    let backend = Arc::new(CpalBackend::new());
    let controller =
        SessionController::new(backend, transcriber, SessionPolicy::from(&config.recording));

    if !controller.is_supported() {
        bail!("Audio recording is not supported on this device");
    }

    info!("voxnote is ready");
    println!("Press Enter to start/stop recording, 'status' for the session snapshot, 'q' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "q" | "quit" => break,
            "status" => {
                let status = controller.status().await;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            _ => match controller.state().await {
                SessionPhase::Idle => {
                    controller.start_recording().await;
                    match controller.error().await {
                        Some(error) => println!("Could not start recording: {error}"),
                        None => println!("Recording... press Enter to stop."),
                    }
                }
                SessionPhase::Recording => {
                    controller.stop_recording().await;
                    wait_for_idle(&controller).await;
                    if let Some(transcript) = controller.transcript().await {
                        println!("{transcript}");
                    } else if let Some(error) = controller.error().await {
                        println!("Error: {error}");
                    }
                }
                SessionPhase::Transcribing => println!("Still transcribing, hold on..."),
            },
        }
    }

    controller.shutdown().await;
    Ok(())
}

async fn wait_for_idle(controller: &SessionController) {
    while controller.state().await != SessionPhase::Idle {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
