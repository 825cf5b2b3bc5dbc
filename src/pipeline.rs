//! Pipeline orchestrator
//!
//! Owns the lifecycle of the media pipeline: reads the first frame to
//! learn the stream geometry, then starts the frame pacer and the HTTPS
//! server as independent background activities. Neither is joined or
//! supervised; a crash in either leaves the video endpoint silent, which
//! is the failure signal external consumers observe.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::config::{PipelineConfig, WebConfig};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream::FrameRegister;
use crate::video::{source, FramePacer};
use crate::web;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed but not started
    Created,
    /// Pacer and server running for the remainder of the process
    Running,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Created => write!(f, "created"),
            PipelineState::Running => write!(f, "running"),
        }
    }
}

/// Media pipeline orchestrator
///
/// Collaborator interface for the automation layer: [`MediaPipeline::start`],
/// [`MediaPipeline::injection_script`] and [`MediaPipeline::set_audio_path`]
/// (before start).
pub struct MediaPipeline {
    config: PipelineConfig,
    state: Arc<AppState>,
    pipeline_state: Mutex<PipelineState>,
    pacer: Mutex<Option<FramePacer>>,
}

impl MediaPipeline {
    /// Create a pipeline in the `Created` state
    pub fn new(config: PipelineConfig) -> Arc<Self> {
        let register = Arc::new(FrameRegister::new());
        let state = AppState::new(register, config.video.quality);
        if let Some(path) = &config.audio.path {
            state.set_audio_path(path.clone());
        }

        Arc::new(Self {
            config,
            state,
            pipeline_state: Mutex::new(PipelineState::Created),
            pacer: Mutex::new(None),
        })
    }

    /// Configure the audio payload path; call before [`MediaPipeline::start`]
    pub fn set_audio_path(&self, path: PathBuf) {
        self.state.set_audio_path(path);
    }

    /// Render the device injection script for the configured port
    pub fn injection_script(&self) -> String {
        web::injection_script(self.config.web.port)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        *self.pipeline_state.lock()
    }

    /// Shared frame register (exposed for embedding and tests)
    pub fn register(&self) -> Arc<FrameRegister> {
        self.state.register.clone()
    }

    /// Start the pacer and the HTTPS server
    ///
    /// Blocks on the first source read so the stream geometry is known and
    /// the register is seeded before any client can connect.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut st = self.pipeline_state.lock();
            if *st != PipelineState::Created {
                return Err(AppError::BadRequest("Pipeline already started".to_string()));
            }
            *st = PipelineState::Running;
        }

        let result = self.start_inner().await;
        if result.is_err() {
            *self.pipeline_state.lock() = PipelineState::Created;
        }
        result
    }

    async fn start_inner(self: &Arc<Self>) -> Result<()> {
        let video_path = self
            .config
            .video
            .path
            .clone()
            .ok_or_else(|| AppError::Config("No video source configured".to_string()))?;
        let fallback_fps = self.config.video.fps;

        // Source open and first decode are blocking file I/O
        let (source, first) = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut source = source::open(&video_path, fallback_fps)?;
            let first = source.next_frame()?;
            Ok((source, first))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Source open task failed: {}", e)))??;

        info!(
            resolution = %source.resolution(),
            fps = source.frame_rate(),
            "Video source ready"
        );
        self.state.register.publish(first);

        // Bind and load TLS up front so startup failures surface to the
        // caller instead of dying inside the server task
        let listener = bind_listener(&self.config.web)?;
        let local_addr = listener.local_addr()?;
        let tls_config = load_tls_config(&self.config.web).await?;
        let app = web::create_router(self.state.clone());

        info!("Starting HTTPS server on {}", local_addr);
        let server =
            axum_server::from_tcp_rustls(listener, tls_config).serve(app.into_make_service());

        tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("HTTPS server error: {}", e);
            }
        });

        *self.pacer.lock() = Some(FramePacer::spawn(source, self.state.register.clone()));

        Ok(())
    }

    /// Stop the pacer and wake all stream handlers so they exit
    ///
    /// Stop latency is bounded by one frame interval (pacer) and one
    /// handler iteration (connections).
    pub fn shutdown(&self) {
        if let Some(pacer) = self.pacer.lock().as_ref() {
            pacer.stop();
        }
        self.state.register.set_offline();
        info!("Pipeline shutdown requested");
    }
}

fn bind_listener(web: &WebConfig) -> Result<std::net::TcpListener> {
    let ip: IpAddr = web
        .bind_address
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid bind address: {}", web.bind_address)))?;
    let addr = SocketAddr::new(ip, web.port);
    let listener = std::net::TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

async fn load_tls_config(web: &WebConfig) -> Result<RustlsConfig> {
    if let (Some(cert_path), Some(key_path)) = (&web.ssl_cert_path, &web.ssl_key_path) {
        Ok(RustlsConfig::from_pem_file(cert_path, key_path).await?)
    } else {
        let cert = generate_self_signed_cert()?;
        Ok(RustlsConfig::from_pem(
            cert.cert.pem().into_bytes(),
            cert.key_pair.serialize_pem().into_bytes(),
        )
        .await?)
    }
}

/// Generate a self-signed TLS certificate for the local endpoints
fn generate_self_signed_cert() -> Result<rcgen::CertifiedKey> {
    let subject_alt_names = vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ];

    rcgen::generate_simple_self_signed(subject_alt_names)
        .map_err(|e| AppError::Internal(format!("Certificate generation failed: {}", e)))
}
