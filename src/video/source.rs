//! Looping video file sources
//!
//! A [`FrameSource`] yields raw frames forever: on reaching the end of the
//! underlying file it rewinds and yields the first frame again instead of
//! signalling end-of-stream. Two container formats are supported, matching
//! what fake-capture tooling commonly produces: raw MJPEG (a concatenation
//! of JPEG images) and YUV4MPEG2 (`.y4m`).

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use super::encoder::decode_jpeg_to_rgb;
use super::format::{PixelFormat, Resolution};
use super::frame::VideoFrame;
use crate::error::{AppError, Result};

/// A perpetual source of raw video frames
pub trait FrameSource: Send {
    /// Read the next frame
    ///
    /// Returns an error only on a read/decode failure; end-of-stream is
    /// handled internally by rewinding to the first frame.
    fn next_frame(&mut self) -> Result<VideoFrame>;

    /// Nominal frame rate in frames per second, used for pacing
    fn frame_rate(&self) -> f64;

    /// Frame geometry
    fn resolution(&self) -> Resolution;
}

/// Open a video file, selecting the source implementation by extension
/// (falling back to content sniffing)
pub fn open(path: &Path, fallback_fps: f64) -> Result<Box<dyn FrameSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("y4m") => Ok(Box::new(Y4mFileSource::open(path, fallback_fps)?)),
        Some("mjpeg") | Some("mjpg") => Ok(Box::new(MjpegFileSource::open(path, fallback_fps)?)),
        _ => {
            let mut header = [0u8; 9];
            let n = File::open(path)?.read(&mut header)?;
            if header[..n].starts_with(b"YUV4MPEG2") {
                Ok(Box::new(Y4mFileSource::open(path, fallback_fps)?))
            } else if header[..n].starts_with(&[0xFF, 0xD8]) {
                Ok(Box::new(MjpegFileSource::open(path, fallback_fps)?))
            } else {
                Err(AppError::Config(format!(
                    "Unrecognized video container: {}",
                    path.display()
                )))
            }
        }
    }
}

// ============================================================================
// MJPEG
// ============================================================================

/// Raw MJPEG file source
///
/// The container carries no timing information, so the nominal rate is the
/// caller-supplied fallback. The file is indexed once at open; looping is a
/// cursor reset over the index.
pub struct MjpegFileSource {
    data: Bytes,
    /// Byte ranges of the individual JPEG images
    spans: Vec<(usize, usize)>,
    cursor: usize,
    fps: f64,
    resolution: Resolution,
    sequence: u64,
}

impl MjpegFileSource {
    pub fn open(path: &Path, fps: f64) -> Result<Self> {
        let data = Bytes::from(std::fs::read(path)?);
        let spans = index_jpeg_spans(&data);
        if spans.is_empty() {
            return Err(AppError::Config(format!(
                "No JPEG images found in {}",
                path.display()
            )));
        }

        // Decode the first image to learn the geometry
        let (first_start, first_end) = spans[0];
        let (_, width, height, _) = decode_jpeg_to_rgb(&data[first_start..first_end])?;
        let resolution = Resolution::new(width, height);

        info!(
            path = %path.display(),
            frames = spans.len(),
            %resolution,
            fps,
            "Opened MJPEG source"
        );

        Ok(Self {
            data,
            spans,
            cursor: 0,
            fps,
            resolution,
            sequence: 0,
        })
    }

    /// Number of images in the container
    pub fn frame_count(&self) -> usize {
        self.spans.len()
    }
}

impl FrameSource for MjpegFileSource {
    fn next_frame(&mut self) -> Result<VideoFrame> {
        let (start, end) = self.spans[self.cursor];
        let (pixels, width, height, pitch) = decode_jpeg_to_rgb(&self.data[start..end])?;

        if width != self.resolution.width || height != self.resolution.height {
            // Skip the inconsistent image so the source can make progress
            self.cursor = (self.cursor + 1) % self.spans.len();
            return Err(AppError::VideoError(format!(
                "Frame geometry changed mid-stream: {}x{} != {}",
                width, height, self.resolution
            )));
        }

        self.cursor = (self.cursor + 1) % self.spans.len();
        if self.cursor == 0 {
            debug!("MJPEG source rewound to start");
        }

        let frame = VideoFrame::from_vec(
            pixels,
            self.resolution,
            PixelFormat::Rgb24,
            pitch,
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Find `(start, end)` byte ranges of SOI..EOI delimited JPEG images
fn index_jpeg_spans(data: &[u8]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(soi) = find_marker(data, pos, 0xD8) {
        match find_marker(data, soi + 2, 0xD9) {
            Some(eoi) => {
                spans.push((soi, eoi + 2));
                pos = eoi + 2;
            }
            None => break,
        }
    }
    spans
}

fn find_marker(data: &[u8], from: usize, code: u8) -> Option<usize> {
    if data.len() < 2 || from >= data.len() - 1 {
        return None;
    }
    (from..data.len() - 1).find(|&i| data[i] == 0xFF && data[i + 1] == code)
}

// ============================================================================
// YUV4MPEG2
// ============================================================================

/// YUV4MPEG2 (`.y4m`) file source
///
/// The stream header carries geometry and frame rate; payloads are raw I420
/// planes. Frames are read from disk on demand, and end-of-stream seeks
/// back to the first `FRAME` record.
pub struct Y4mFileSource {
    reader: BufReader<File>,
    /// File offset of the first FRAME record
    data_start: u64,
    fps: f64,
    resolution: Resolution,
    frame_size: usize,
    sequence: u64,
}

impl Y4mFileSource {
    pub fn open(path: &Path, fallback_fps: f64) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = Vec::new();
        reader.read_until(b'\n', &mut header)?;
        let header = std::str::from_utf8(&header)
            .map_err(|_| AppError::Config("Y4M header is not valid UTF-8".to_string()))?
            .trim_end();

        if !header.starts_with("YUV4MPEG2") {
            return Err(AppError::Config(format!(
                "Not a YUV4MPEG2 stream: {}",
                path.display()
            )));
        }

        let mut width = 0u32;
        let mut height = 0u32;
        let mut fps = fallback_fps;
        for param in header.split_ascii_whitespace().skip(1) {
            let (tag, value) = param.split_at(1);
            match tag {
                "W" => width = parse_header_num(value, "width")?,
                "H" => height = parse_header_num(value, "height")?,
                "F" => fps = parse_frame_rate(value)?,
                "C" => {
                    if !value.starts_with("420") {
                        return Err(AppError::Config(format!(
                            "Unsupported Y4M colourspace C{} (only 4:2:0 is supported)",
                            value
                        )));
                    }
                }
                _ => {}
            }
        }

        if width == 0 || height == 0 {
            return Err(AppError::Config(
                "Y4M header is missing geometry".to_string(),
            ));
        }

        let resolution = Resolution::new(width, height);
        let frame_size = PixelFormat::I420.frame_size(resolution);
        let data_start = reader.stream_position()?;

        info!(
            path = %path.display(),
            %resolution,
            fps,
            "Opened Y4M source"
        );

        Ok(Self {
            reader,
            data_start,
            fps,
            resolution,
            frame_size,
            sequence: 0,
        })
    }

    /// Read one FRAME record, returning None on clean end-of-stream
    fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        if !line.starts_with(b"FRAME") {
            return Err(AppError::VideoError(
                "Corrupt Y4M stream: expected FRAME record".to_string(),
            ));
        }

        let mut payload = vec![0u8; self.frame_size];
        self.reader.read_exact(&mut payload)?;
        Ok(Some(payload))
    }
}

impl FrameSource for Y4mFileSource {
    fn next_frame(&mut self) -> Result<VideoFrame> {
        let payload = match self.read_record()? {
            Some(payload) => payload,
            None => {
                // End-of-stream: rewind and read the first frame. A failed
                // seek surfaces as an error and is retried next tick.
                debug!("Y4M source rewound to start");
                self.reader.seek(SeekFrom::Start(self.data_start))?;
                self.read_record()?.ok_or_else(|| {
                    AppError::VideoError("Y4M stream contains no frames".to_string())
                })?
            }
        };

        let frame = VideoFrame::from_vec(
            payload,
            self.resolution,
            PixelFormat::I420,
            self.resolution.width,
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

fn parse_header_num(value: &str, what: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid Y4M {}: {}", what, value)))
}

/// Parse an `F<num>:<den>` frame rate parameter
fn parse_frame_rate(value: &str) -> Result<f64> {
    let (num, den) = value
        .split_once(':')
        .ok_or_else(|| AppError::Config(format!("Invalid Y4M frame rate: {}", value)))?;
    let num: f64 = parse_header_num(num, "frame rate")? as f64;
    let den: f64 = parse_header_num(den, "frame rate")? as f64;
    if den == 0.0 {
        return Err(AppError::Config("Y4M frame rate denominator is zero".to_string()));
    }
    Ok(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::encoder::JpegEncoder;
    use std::io::Write;

    fn solid_rgb_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let data: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        let frame = VideoFrame::from_vec(
            data,
            Resolution::new(width, height),
            PixelFormat::Rgb24,
            width * 3,
            0,
        );
        JpegEncoder::new(95).unwrap().encode(&frame).unwrap().to_vec()
    }

    fn write_temp(bytes: &[u8], suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_mjpeg_source_loops() {
        let mut container = solid_rgb_jpeg(8, 8, [255, 0, 0]);
        container.extend_from_slice(&solid_rgb_jpeg(8, 8, [0, 255, 0]));
        let file = write_temp(&container, ".mjpeg");

        let mut source = MjpegFileSource::open(file.path(), 15.0).unwrap();
        assert_eq!(source.frame_count(), 2);
        assert_eq!(source.resolution(), Resolution::new(8, 8));
        assert_eq!(source.frame_rate(), 15.0);

        // Five reads over a two-image container: red, green, red, green, red
        for i in 0..5u64 {
            let frame = source.next_frame().unwrap();
            assert_eq!(frame.sequence, i);
            assert_eq!(frame.resolution, Resolution::new(8, 8));
            let red = i % 2 == 0;
            let px = frame.data();
            if red {
                assert!(px[0] > 200 && px[1] < 60, "frame {} should be red", i);
            } else {
                assert!(px[1] > 200 && px[0] < 60, "frame {} should be green", i);
            }
        }
    }

    #[test]
    fn test_mjpeg_rejects_empty_container() {
        let file = write_temp(b"not a jpeg at all", ".mjpeg");
        assert!(MjpegFileSource::open(file.path(), 30.0).is_err());
    }

    #[test]
    fn test_y4m_source_loops() {
        let res = Resolution::new(4, 4);
        let frame_size = PixelFormat::I420.frame_size(res);
        let mut container = b"YUV4MPEG2 W4 H4 F25:1 Ip A1:1 C420\n".to_vec();
        container.extend_from_slice(b"FRAME\n");
        container.extend(std::iter::repeat(16u8).take(frame_size));
        container.extend_from_slice(b"FRAME\n");
        container.extend(std::iter::repeat(200u8).take(frame_size));
        let file = write_temp(&container, ".y4m");

        let mut source = Y4mFileSource::open(file.path(), 30.0).unwrap();
        assert_eq!(source.resolution(), res);
        assert_eq!(source.frame_rate(), 25.0);

        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        let third = source.next_frame().unwrap();
        assert_eq!(first.data()[0], 16);
        assert_eq!(second.data()[0], 200);
        // Third read wraps back to the first frame
        assert_eq!(third.data(), first.data());
        assert_eq!(third.sequence, 2);
    }

    #[test]
    fn test_y4m_rejects_unsupported_colourspace() {
        let file = write_temp(b"YUV4MPEG2 W4 H4 F25:1 C444\n", ".y4m");
        assert!(Y4mFileSource::open(file.path(), 30.0).is_err());
    }

    #[test]
    fn test_open_sniffs_format_without_extension() {
        let jpeg = solid_rgb_jpeg(8, 8, [0, 0, 255]);
        let file = write_temp(&jpeg, "");
        let source = open(file.path(), 10.0).unwrap();
        assert_eq!(source.resolution(), Resolution::new(8, 8));

        let y4m = write_temp(b"YUV4MPEG2 W2 H2 F30:1 C420\nFRAME\n\0\0\0\0\0\0", "");
        let source = open(y4m.path(), 10.0).unwrap();
        assert_eq!(source.resolution(), Resolution::new(2, 2));
    }

    #[test]
    fn test_open_rejects_unknown_container() {
        let file = write_temp(b"\x00\x01\x02\x03garbage", "");
        assert!(open(file.path(), 30.0).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(open(Path::new("/nonexistent/video.mjpeg"), 30.0).is_err());
    }
}
