//! HTTP request handlers
//!
//! The video stream handler serves an unbounded multipart response; each
//! connection gets an independent loop, JPEG encoder, and frame cursor.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream::ClientGuard;
use crate::video::{JpegEncoder, VideoFrame};

/// How long a handler waits for a publish notification before re-checking
/// the cooperative shutdown condition
const NOTIFY_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Video stream
// ============================================================================

/// Query parameters for the video stream
#[derive(Deserialize, Default)]
pub struct VideoStreamQuery {
    /// Optional client ID (a random UUID is generated when absent)
    pub client_id: Option<String>,
}

/// Multipart video stream endpoint
///
/// Holds the connection open indefinitely, emitting one part per publish.
/// Connecting before the first frame is published is valid: the handler
/// waits for the register instead of failing the client.
pub async fn video_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoStreamQuery>,
) -> impl IntoResponse {
    let register = state.register.clone();

    let client_id = query
        .client_id
        .filter(|id| !id.is_empty() && id.len() <= 64)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // RAII guard registers the client and unregisters it when the
    // connection (and with it the feeding task) goes away
    let guard = Arc::new(ClientGuard::new(client_id, register.clone()));

    // Bounded channel (capacity 1) for backpressure: a slow client throttles
    // only its own loop, never the pacer or other connections
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Bytes>(1);

    let guard_clone = guard.clone();
    let quality = state.jpeg_quality;
    tokio::spawn(async move {
        let _guard = guard_clone;
        let mut notify_rx = register.subscribe();

        let mut encoder = match JpegEncoder::new(quality) {
            Ok(encoder) => encoder,
            Err(e) => {
                error!("Failed to create stream encoder: {}", e);
                return;
            }
        };

        let mut last_seq: Option<u64> = None;

        // Serve the current frame immediately if one exists
        if let Some(frame) = register.snapshot() {
            if !send_frame(&mut encoder, &frame, &tx).await {
                return;
            }
            last_seq = Some(frame.sequence);
        }

        loop {
            // Cooperative shutdown check, once per iteration. A register
            // that has never published (client connected before the first
            // frame) stays in the wait loop instead of failing the client.
            if !register.is_online() && register.sequence() > 0 {
                break;
            }

            match tokio::time::timeout(NOTIFY_TIMEOUT, notify_rx.recv()).await {
                Ok(Ok(())) => {
                    // set_offline also notifies, so re-check before emitting
                    if !register.is_online() {
                        break;
                    }
                    if let Some(frame) = register.snapshot() {
                        if last_seq != Some(frame.sequence) {
                            if !send_frame(&mut encoder, &frame, &tx).await {
                                break;
                            }
                            last_seq = Some(frame.sequence);
                        }
                    }
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => break,
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(_))) => {
                    // Fell behind the publisher: jump straight to the latest
                    if !register.is_online() {
                        break;
                    }
                    if let Some(frame) = register.snapshot() {
                        if !send_frame(&mut encoder, &frame, &tx).await {
                            break;
                        }
                        last_seq = Some(frame.sequence);
                    }
                }
                Err(_) => {
                    // Timeout: loop back for the shutdown check. Waiting for
                    // the first frame stays in this arm until a publish lands.
                }
            }
        }
    });

    // The body stream drives the backpressure; per-client accounting is
    // recorded after the part is handed to hyper
    let register_for_stream = state.register.clone();
    let body_stream = async_stream::stream! {
        while let Some(part) = rx.recv().await {
            yield Ok::<Bytes, std::io::Error>(part);
            register_for_stream.record_frame_sent(guard.id());
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body_stream))
        .unwrap()
}

/// Encode a frame and push the multipart part; returns false when the
/// client is gone (or encoding is persistently broken for this stream)
async fn send_frame(
    encoder: &mut JpegEncoder,
    frame: &VideoFrame,
    tx: &tokio::sync::mpsc::Sender<Bytes>,
) -> bool {
    match encoder.encode(frame) {
        Ok(jpeg) => tx.send(multipart_part(&jpeg)).await.is_ok(),
        Err(e) => {
            warn!("Frame encode failed: {}", e);
            true
        }
    }
}

/// Build one multipart part: boundary, timestamp and content headers,
/// then the JPEG payload
fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(jpeg.len() + 128);

    buf.put_slice(b"--frame\r\n");
    buf.put_slice(format!("X-Timestamp: {:.6}\r\n", unix_timestamp()).as_bytes());
    buf.put_slice(b"Content-Type: image/jpeg\r\n");
    buf.put_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");

    buf.freeze()
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ============================================================================
// Snapshot
// ============================================================================

/// Single JPEG of the current frame
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Response {
    let Some(frame) = state.register.snapshot() else {
        return Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Body::from("No frame available"))
            .unwrap();
    };

    let encoded = JpegEncoder::new(state.jpeg_quality).and_then(|mut e| e.encode(&frame));
    match encoded {
        Ok(jpeg) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(jpeg))
            .unwrap(),
        Err(e) => AppError::Internal(format!("Snapshot encode failed: {}", e)).into_response(),
    }
}

// ============================================================================
// Audio
// ============================================================================

/// Audio file endpoint
///
/// Serves the configured audio payload byte-for-byte; 404 when the path is
/// unset or the file is missing. No range support.
pub async fn audio_file(State(state): State<Arc<AppState>>) -> Result<Response> {
    let path = state
        .audio_path()
        .ok_or_else(|| AppError::NotFound("Audio file not configured".to_string()))?;

    let data = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(format!("Audio file missing: {}", path.display()))
        } else {
            AppError::Io(e)
        }
    })?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(data))
        .unwrap())
}
