use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::stream::FrameRegister;

/// Application-wide state shared across handlers
///
/// The register is the only shared mutable resource of the pipeline: one
/// writer (the pacer), many readers (stream handlers). The audio path is
/// set once before the server starts and is read-only afterwards.
pub struct AppState {
    /// Latest-frame register
    pub register: Arc<FrameRegister>,
    /// Path of the audio payload served verbatim by `/audio_file`
    audio_path: RwLock<Option<PathBuf>>,
    /// JPEG quality used by the stream handlers (1-100)
    pub jpeg_quality: u32,
}

impl AppState {
    /// Create new application state
    pub fn new(register: Arc<FrameRegister>, jpeg_quality: u32) -> Arc<Self> {
        Arc::new(Self {
            register,
            audio_path: RwLock::new(None),
            jpeg_quality,
        })
    }

    /// Configure the audio payload path (before the server starts)
    pub fn set_audio_path(&self, path: PathBuf) {
        *self.audio_path.write() = Some(path);
    }

    /// Currently configured audio path, if any
    pub fn audio_path(&self) -> Option<PathBuf> {
        self.audio_path.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_path_starts_unset() {
        let state = AppState::new(Arc::new(FrameRegister::new()), 80);
        assert!(state.audio_path().is_none());
        state.set_audio_path(PathBuf::from("/tmp/a.wav"));
        assert_eq!(state.audio_path(), Some(PathBuf::from("/tmp/a.wav")));
    }
}
