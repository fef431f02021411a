//! Generation poll worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adreel_media::check_ffmpeg;
use adreel_worker::{JobExecutor, Services, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("adreel=info".parse().unwrap());

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

    info!("Starting adreel-worker");

    if let Err(e) = check_ffmpeg() {
        warn!("FFmpeg unavailable, generation results cannot be normalized: {}", e);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let services = match Services::from_env(config.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize worker services: {}", e);
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(
        config,
        services.queue.clone(),
        services.engine.clone(),
    ));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
