//! synthcam - synthetic camera/microphone source
//!
//! This crate provides the media pipeline behind a fake capture device for
//! browser-automated conferencing clients: a looping video file source, a
//! frame pacer, a latest-frame register, an HTTPS server streaming frames
//! as multipart JPEG plus a static audio resource, and a browser injection
//! script that composes both into a virtual camera/microphone stream.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod stream;
pub mod utils;
pub mod video;
pub mod web;

pub use error::{AppError, Result};
pub use pipeline::{MediaPipeline, PipelineState};
