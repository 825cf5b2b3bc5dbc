//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Video source settings
    pub video: VideoConfig,
    /// Audio source settings
    pub audio: AudioConfig,
    /// Web server settings
    pub web: WebConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Video source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    /// Looping video file (.mjpeg or .y4m)
    pub path: Option<PathBuf>,
    /// Frame rate used when the container carries none
    pub fps: f64,
    /// JPEG quality for the stream encoders (1-100)
    pub quality: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            path: None,
            fps: 30.0,
            quality: 80,
        }
    }
}

/// Audio source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AudioConfig {
    /// Audio file served verbatim by the audio endpoint
    pub path: Option<PathBuf>,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTPS port
    pub port: u16,
    /// Path to SSL certificate file (self-signed is generated when unset)
    pub ssl_cert_path: Option<String>,
    /// Path to SSL private key file
    pub ssl_key_path: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            ssl_cert_path: None,
            ssl_key_path: None,
        }
    }
}
