//! JPEG encoder implementation
//!
//! Encodes raw video frames (RGB24, I420) to JPEG using turbojpeg.
//! I420 input takes the direct YUV path, skipping color space conversion.
//!
//! Note: this encoder is NOT thread-safe due to turbojpeg limitations.
//! Every stream connection owns its own instance.

use bytes::Bytes;

use super::format::PixelFormat;
use super::frame::VideoFrame;
use crate::error::{AppError, Result};

/// Default JPEG quality when none is configured
pub const DEFAULT_QUALITY: u32 = 80;

/// JPEG encoder using turbojpeg
pub struct JpegEncoder {
    quality: u32,
    compressor: turbojpeg::Compressor,
}

impl JpegEncoder {
    /// Create a new JPEG encoder with the given quality (1-100)
    pub fn new(quality: u32) -> Result<Self> {
        let mut compressor = turbojpeg::Compressor::new().map_err(|e| {
            AppError::VideoError(format!("Failed to create turbojpeg compressor: {}", e))
        })?;

        compressor
            .set_quality(quality.clamp(1, 100) as i32)
            .map_err(|e| AppError::VideoError(format!("Failed to set JPEG quality: {}", e)))?;
        compressor
            .set_subsamp(turbojpeg::Subsamp::Sub2x2)
            .map_err(|e| AppError::VideoError(format!("Failed to set JPEG subsampling: {}", e)))?;

        Ok(Self {
            quality,
            compressor,
        })
    }

    /// Configured quality
    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Encode a raw frame to JPEG bytes
    pub fn encode(&mut self, frame: &VideoFrame) -> Result<Bytes> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;

        let expected = frame.format.frame_size(frame.resolution);
        if frame.len() < expected {
            return Err(AppError::VideoError(format!(
                "{} frame too small: {} < {}",
                frame.format,
                frame.len(),
                expected
            )));
        }

        let jpeg = match frame.format {
            PixelFormat::Rgb24 => {
                let image = turbojpeg::Image {
                    pixels: frame.data(),
                    width,
                    pitch: frame.stride as usize,
                    height,
                    format: turbojpeg::PixelFormat::RGB,
                };
                self.compressor
                    .compress_to_vec(image)
                    .map_err(|e| AppError::VideoError(format!("RGB encode failed: {}", e)))?
            }
            PixelFormat::I420 => {
                let yuv = turbojpeg::YuvImage {
                    pixels: frame.data(),
                    width,
                    align: 1,
                    height,
                    subsamp: turbojpeg::Subsamp::Sub2x2,
                };
                self.compressor
                    .compress_yuv_to_vec(yuv)
                    .map_err(|e| AppError::VideoError(format!("I420 encode failed: {}", e)))?
            }
        };

        Ok(Bytes::from(jpeg))
    }
}

/// Decode a JPEG image to an RGB24 raster
///
/// Used by the MJPEG file source to turn container frames into raw frames.
pub fn decode_jpeg_to_rgb(jpeg: &[u8]) -> Result<(Vec<u8>, u32, u32, u32)> {
    let image = turbojpeg::decompress(jpeg, turbojpeg::PixelFormat::RGB)
        .map_err(|e| AppError::VideoError(format!("JPEG decode failed: {}", e)))?;
    Ok((
        image.pixels,
        image.width as u32,
        image.height as u32,
        image.pitch as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::Resolution;

    fn rgb_frame(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        let data: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        VideoFrame::from_vec(
            data,
            Resolution::new(width, height),
            PixelFormat::Rgb24,
            width * 3,
            0,
        )
    }

    #[test]
    fn test_encode_rgb_roundtrip() {
        let mut encoder = JpegEncoder::new(90).unwrap();
        let frame = rgb_frame(16, 16, [255, 0, 0]);
        let jpeg = encoder.encode(&frame).unwrap();

        // SOI / EOI markers
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

        let (pixels, width, height, _pitch) = decode_jpeg_to_rgb(&jpeg).unwrap();
        assert_eq!(width, 16);
        assert_eq!(height, 16);
        // Solid red survives lossy compression within tolerance
        assert!(pixels[0] > 200 && pixels[1] < 60 && pixels[2] < 60);
    }

    #[test]
    fn test_encode_i420() {
        let mut encoder = JpegEncoder::new(85).unwrap();
        let res = Resolution::new(16, 16);
        // Mid-gray: Y=128, U=V=128
        let frame = VideoFrame::from_vec(
            vec![128u8; PixelFormat::I420.frame_size(res)],
            res,
            PixelFormat::I420,
            16,
            0,
        );
        let jpeg = encoder.encode(&frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_rejects_short_frame() {
        let mut encoder = JpegEncoder::new(80).unwrap();
        let frame = VideoFrame::from_vec(
            vec![0u8; 10],
            Resolution::new(16, 16),
            PixelFormat::Rgb24,
            48,
            0,
        );
        assert!(encoder.encode(&frame).is_err());
    }
}
