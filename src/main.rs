use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emotion_stream::{
    create_router, AppState, CaptureDeviceFactory, CaptureSource, Config, EmotionSession,
    SessionConfig, WebSocketConnector,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "emotion-stream", version, about = "Live emotion detection streaming client")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/emotion-stream")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control API
    Serve,

    /// Stream one headless session and log each classification
    Stream {
        /// Image file or directory to use as the camera (overrides config)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Stop after this many seconds (runs until Ctrl-C if omitted)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level)),
        )
        .init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Inference endpoint: {}", cfg.stream.endpoint);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Stream { source, seconds } => stream(cfg, source, seconds).await,
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let source = PathBuf::from(&cfg.capture.source);
    let devices: emotion_stream::http::DeviceProvider = Arc::new(move || {
        CaptureDeviceFactory::create(CaptureSource::ImagePath(source.clone()))
    });

    let state = AppState::new(cfg.stream.clone(), Arc::new(WebSocketConnector::new()), devices);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    state.shutdown_all().await;
    Ok(())
}

async fn stream(cfg: Config, source: Option<PathBuf>, seconds: Option<u64>) -> Result<()> {
    let source = source.unwrap_or_else(|| PathBuf::from(&cfg.capture.source));
    let device = CaptureDeviceFactory::create(CaptureSource::ImagePath(source))?;

    let config = SessionConfig::from_stream_config("cli", &cfg.stream);
    let session = EmotionSession::new(config, Arc::new(WebSocketConnector::new()), device);

    if !session.ensure_permission().await {
        warn!("Capture device unavailable; frames will not be sent");
    }

    session.set_recording(true).await;

    match seconds {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
        }
    }

    session.shutdown().await;

    let history = session.history().await;
    let stats = session.stats().await;
    info!(
        "Session finished: {} frames sent, {} dropped, {} results",
        stats.frames_sent, stats.frames_dropped, stats.results_received
    );
    for (i, reading) in history.entries().enumerate() {
        info!("  {}. {} ({:?})", i + 1, reading.label, reading.class_index);
    }
    if let Some(error) = stats.last_error {
        warn!("Last error: {}", error);
    }

    Ok(())
}
