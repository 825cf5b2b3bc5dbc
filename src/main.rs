use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rustls::crypto::{ring, CryptoProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synthcam::config::PipelineConfig;
use synthcam::web::injection_script;
use synthcam::MediaPipeline;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// synthcam command line arguments
#[derive(Parser, Debug)]
#[command(name = "synthcam")]
#[command(version, about = "Synthetic camera/microphone source for browser-automated conferencing clients", long_about = None)]
struct CliArgs {
    /// Looping video file (.mjpeg or .y4m) used as the camera source
    #[arg(short = 'i', long, value_name = "FILE")]
    video: Option<PathBuf>,

    /// Audio file served verbatim as the microphone source
    #[arg(short = 'a', long, value_name = "FILE")]
    audio: Option<PathBuf>,

    /// HTTPS port (overrides config file)
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Frame rate used when the video container carries none
    #[arg(long, value_name = "FPS")]
    fps: Option<f64>,

    /// JPEG quality for the stream encoders (1-100)
    #[arg(short = 'q', long, value_name = "QUALITY")]
    quality: Option<u32>,

    /// Path to SSL certificate file (generates self-signed if not provided)
    #[arg(long, value_name = "FILE", requires = "ssl_key")]
    ssl_cert: Option<PathBuf>,

    /// Path to SSL private key file
    #[arg(long, value_name = "FILE", requires = "ssl_cert")]
    ssl_key: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the device injection script to stdout and exit
    #[arg(long)]
    print_script: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    // Load configuration file, then apply CLI overrides
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(video) = args.video {
        config.video.path = Some(video);
    }
    if let Some(audio) = args.audio {
        config.audio.path = Some(audio);
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(fps) = args.fps {
        config.video.fps = fps;
    }
    if let Some(quality) = args.quality {
        config.video.quality = quality;
    }
    if let Some(cert_path) = args.ssl_cert {
        config.web.ssl_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = args.ssl_key {
        config.web.ssl_key_path = Some(key_path.to_string_lossy().to_string());
    }

    if args.print_script {
        print!("{}", injection_script(config.web.port));
        return Ok(());
    }

    // Install default crypto provider (required by rustls 0.23+)
    CryptoProvider::install_default(ring::default_provider())
        .expect("Failed to install rustls crypto provider");

    tracing::info!("Starting synthcam v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = MediaPipeline::new(config);
    pipeline.start().await?;

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
    pipeline.shutdown();

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "synthcam=error,tower_http=error",
        LogLevel::Warn => "synthcam=warn,tower_http=warn",
        LogLevel::Info => "synthcam=info,tower_http=info",
        LogLevel::Debug => "synthcam=debug,tower_http=debug",
        LogLevel::Trace => "synthcam=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
