//! Video frame data structure

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

use super::format::{PixelFormat, Resolution};

/// A raw video frame with metadata
///
/// Frames are ephemeral: the pacer publishes each one into the register,
/// where it is superseded (and dropped) by the next publish. Cloning is
/// cheap (the pixel data is shared).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw pixel data
    data: Arc<Bytes>,
    /// Frame resolution
    pub resolution: Resolution,
    /// Pixel format
    pub format: PixelFormat,
    /// Stride (bytes per line of the first plane)
    pub stride: u32,
    /// Frame sequence number
    pub sequence: u64,
    /// Timestamp when the frame was read from the source
    pub capture_ts: Instant,
}

impl VideoFrame {
    /// Create a new video frame
    pub fn new(
        data: Bytes,
        resolution: Resolution,
        format: PixelFormat,
        stride: u32,
        sequence: u64,
    ) -> Self {
        Self {
            data: Arc::new(data),
            resolution,
            format,
            stride,
            sequence,
            capture_ts: Instant::now(),
        }
    }

    /// Create a frame from a `Vec<u8>`
    pub fn from_vec(
        data: Vec<u8>,
        resolution: Resolution,
        format: PixelFormat,
        stride: u32,
        sequence: u64,
    ) -> Self {
        Self::new(Bytes::from(data), resolution, format, stride, sequence)
    }

    /// Get frame data as a byte slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get data length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    /// Get age of this frame (time since source read)
    pub fn age(&self) -> std::time::Duration {
        self.capture_ts.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let frame = VideoFrame::from_vec(
            vec![0u8; 24],
            Resolution::new(4, 4),
            PixelFormat::I420,
            4,
            7,
        );
        assert_eq!(frame.len(), 24);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.sequence, 7);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_clone_shares_data() {
        let frame = VideoFrame::from_vec(
            vec![1u8; 12],
            Resolution::new(2, 2),
            PixelFormat::Rgb24,
            6,
            0,
        );
        let copy = frame.clone();
        assert_eq!(copy.data(), frame.data());
        assert_eq!(copy.sequence, frame.sequence);
    }
}
