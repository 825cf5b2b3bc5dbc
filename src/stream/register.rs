//! Latest-frame register
//!
//! Single-slot, overwrite-on-write holder for the most recently produced
//! frame. One writer (the pacer), many readers (stream handlers). Readers
//! observe either the previous frame or the fully-written new one, never a
//! torn value; there is no queue and no delivery guarantee beyond
//! "freshest available".

use arc_swap::ArcSwap;
use parking_lot::RwLock as ParkingRwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::video::VideoFrame;

/// Client ID type (UUID string)
pub type ClientId = String;

/// Per-client session information
#[derive(Debug, Clone)]
struct ClientSession {
    /// Connection timestamp
    connected_at: Instant,
    /// Frames sent to this client
    frames_sent: u64,
}

/// Latest-frame register
pub struct FrameRegister {
    /// Current frame (latest) - ArcSwap for lock-free reads
    latest: ArcSwap<Option<VideoFrame>>,
    /// Publish notification, so readers wait instead of busy-looping
    frame_notify: broadcast::Sender<()>,
    /// Whether the pipeline is online; cleared on shutdown so stream
    /// handlers exit their loops cooperatively
    online: AtomicBool,
    /// Publish counter
    sequence: AtomicU64,
    /// Per-client sessions
    clients: ParkingRwLock<HashMap<ClientId, ClientSession>>,
}

impl FrameRegister {
    pub fn new() -> Self {
        let (frame_notify, _) = broadcast::channel(16);
        Self {
            latest: ArcSwap::from_pointee(None),
            frame_notify,
            online: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            clients: ParkingRwLock::new(HashMap::new()),
        }
    }

    /// Publish a frame, overwriting any previously held one
    ///
    /// Cheap and non-blocking from the writer's perspective; waiting
    /// readers are notified.
    pub fn publish(&self, frame: VideoFrame) {
        self.sequence.fetch_add(1, Ordering::Relaxed);
        self.online.store(true, Ordering::SeqCst);
        self.latest.store(Arc::new(Some(frame)));
        let _ = self.frame_notify.send(());
    }

    /// Current frame, if any has been published yet
    pub fn snapshot(&self) -> Option<VideoFrame> {
        (**self.latest.load()).clone()
    }

    /// Number of publishes so far
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Subscribe to publish notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.frame_notify.subscribe()
    }

    /// Mark the register offline and wake waiting handlers so they can exit
    pub fn set_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
        let _ = self.frame_notify.send(());
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Current client count
    pub fn client_count(&self) -> u64 {
        self.clients.read().len() as u64
    }

    fn register_client(&self, client_id: ClientId) {
        let session = ClientSession {
            connected_at: Instant::now(),
            frames_sent: 0,
        };
        self.clients.write().insert(client_id.clone(), session);
        tracing::info!(
            "Client {} connected (total: {})",
            client_id,
            self.client_count()
        );
    }

    fn unregister_client(&self, client_id: &str) {
        if let Some(session) = self.clients.write().remove(client_id) {
            let duration_secs = session.connected_at.elapsed().as_secs_f32();
            let avg_fps = if duration_secs > 0.1 {
                session.frames_sent as f32 / duration_secs
            } else {
                0.0
            };
            tracing::info!(
                "Client {} disconnected after {:.1}s ({} frames, {:.1} avg FPS)",
                client_id,
                duration_secs,
                session.frames_sent,
                avg_fps
            );
        }
    }

    /// Record a frame sent to a specific client
    pub fn record_frame_sent(&self, client_id: &str) {
        if let Some(session) = self.clients.write().get_mut(client_id) {
            session.frames_sent += 1;
        }
    }
}

impl Default for FrameRegister {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for client lifecycle management
///
/// Ensures cleanup even on panic or abrupt disconnection.
pub struct ClientGuard {
    client_id: ClientId,
    register: Arc<FrameRegister>,
}

impl ClientGuard {
    pub fn new(client_id: ClientId, register: Arc<FrameRegister>) -> Self {
        register.register_client(client_id.clone());
        Self {
            client_id,
            register,
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.client_id
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.register.unregister_client(&self.client_id);
    }
}
