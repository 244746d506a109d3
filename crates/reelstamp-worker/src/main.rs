//! Drive overlay pipeline binary.

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelstamp_drive::DriveClient;
use reelstamp_media::{check_ffmpeg, check_ffprobe};
use reelstamp_models::RunSummary;
use reelstamp_worker::{Pipeline, PipelineConfig, WorkerResult};

/// At least one pair failed or a subtree could not be listed.
const EXIT_PARTIAL_FAILURE: u8 = 2;
/// The run could not start or its root could not be read.
const EXIT_FATAL: u8 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting reelstamp");

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("reelstamp=info,reelstamp_worker=info,reelstamp_drive=info,reelstamp_media=info")
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> WorkerResult<ExitCode> {
    let cli_root = std::env::args().nth(1);
    let config = PipelineConfig::from_env(cli_root.as_deref())?;
    info!("Pipeline config: {:?}", config);

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    info!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "Found FFmpeg");

    let client = DriveClient::from_env()?;
    let transformer = config.transformer();
    let pipeline = Pipeline::new(&client, &transformer, &config);

    let Some(interval) = config.watch_interval else {
        let summary = pipeline.run().await?;
        println!("{}", summary.render());
        return Ok(exit_code(&summary));
    };

    info!(interval_secs = interval.as_secs(), "Watching for new pairs");
    loop {
        match pipeline.run().await {
            Ok(summary) => println!("{}", summary.render()),
            // The root may come back; keep watching
            Err(e) => error!("Cycle failed: {}", e),
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                return Ok(ExitCode::SUCCESS);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL_FAILURE)
    }
}
