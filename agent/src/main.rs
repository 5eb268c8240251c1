mod capture;
mod client;
mod controller;
mod readiness;
#[cfg(test)]
mod testing;
mod upload;

use capture::{CommandFrameSource, FrameSource, StubFrameSource};
use controller::LoopController;
use frame_courier_common::config::Config;
use readiness::HttpReadinessChecker;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use upload::HttpUploader;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
    #[error("failed to build HTTP request: {0}")]
    BuildRequest(reqwest::Error),
    #[error("HTTP request failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("failed to read HTTP response body: {0}")]
    HttpBody(reqwest::Error),
    #[error("empty response body")]
    EmptyBody,
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to read frame artifact: {0}")]
    ReadFrame(std::io::Error),
    #[error("frame I/O error: {0}")]
    CaptureIo(std::io::Error),
    #[error("capture command is empty")]
    CaptureCommandEmpty,
    #[error("failed to start capture program {0}: {1}")]
    CaptureSpawn(String, std::io::Error),
    #[error("capture program exited with code {code:?}: {stderr}")]
    CaptureExit { code: Option<i32>, stderr: String },
    #[error("capture program did not finish within {0:?}")]
    CaptureTimeout(Duration),
    #[error("capture produced no image at {0}")]
    CaptureEmpty(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        backend = config.backend.base_url,
        poll_interval_secs = config.agent.poll_interval_secs,
        max_consecutive_failures = config.agent.max_consecutive_failures,
        capture_mode = config.capture.mode,
        frame_path = %config.capture.frame_path.display(),
        "starting frame-courier agent"
    );

    let client = match client::build_http_client(&config.backend) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create HTTP client");
            std::process::exit(1);
        }
    };
    let readiness = HttpReadinessChecker::new(client.clone(), config.backend.ready_url());
    let uploader = HttpUploader::new(client, config.backend.ingest_url());

    match config.capture.mode.as_str() {
        "stub" => {
            let source = StubFrameSource::new(config.capture.frame_path.clone());
            run_agent(readiness, source, uploader, &config).await;
        }
        "command" => {
            let source = match CommandFrameSource::new(
                config.capture.frame_path.clone(),
                &config.capture.command,
                config.capture.timeout(),
            ) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to set up capture command");
                    std::process::exit(1);
                }
            };
            run_agent(readiness, source, uploader, &config).await;
        }
        other => {
            error!(mode = other, "unknown capture mode, expected 'stub' or 'command'");
            std::process::exit(1);
        }
    }
}

/// Drive the loop until the failure threshold stops it, then exit non-zero.
async fn run_agent<S: FrameSource>(
    readiness: HttpReadinessChecker,
    source: S,
    uploader: HttpUploader,
    config: &Config,
) {
    info!(source = source.name(), "entering poll loop");
    let mut controller = LoopController::new(
        readiness,
        source,
        uploader,
        config.agent.poll_interval(),
        config.agent.max_consecutive_failures,
    );
    let termination = controller.run().await;
    info!(
        consecutive_failures = termination.consecutive_failures,
        frames_sent = termination.stats.frames_sent,
        "agent stopped, exiting"
    );
    std::process::exit(1);
}
