//! Video source, frame, and encoding types

pub mod encoder;
pub mod format;
pub mod frame;
pub mod pacer;
pub mod source;

pub use encoder::JpegEncoder;
pub use format::{PixelFormat, Resolution};
pub use frame::VideoFrame;
pub use pacer::FramePacer;
pub use source::FrameSource;
