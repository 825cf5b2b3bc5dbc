//! Frame pacer
//!
//! Drives a [`FrameSource`] at its nominal frame interval on a dedicated
//! blocking task, publishing each frame into the shared register. When a
//! read takes longer than the interval no sleep occurs; there is no
//! backlog to catch up on, since only the latest frame matters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::source::FrameSource;
use crate::stream::FrameRegister;
use crate::utils::LogThrottler;

/// Minimum accepted frame rate; anything lower is clamped to avoid a
/// degenerate multi-second interval from a corrupt header
const MIN_FPS: f64 = 1.0;

/// Frame pacer handle
///
/// The pacing loop runs until [`FramePacer::stop`] is called; the stop flag
/// is checked once per iteration, so stop latency is bounded by one frame
/// interval plus one source read.
pub struct FramePacer {
    stop_flag: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl FramePacer {
    /// Spawn the pacing loop, taking ownership of the source
    pub fn spawn(mut source: Box<dyn FrameSource>, register: Arc<FrameRegister>) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = stop_flag.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let fps = source.frame_rate().max(MIN_FPS);
            let interval = Duration::from_secs_f64(1.0 / fps);
            let throttler = LogThrottler::default();

            info!(fps, interval_ms = interval.as_millis() as u64, "Frame pacer started");

            while !stop.load(Ordering::Relaxed) {
                let started = Instant::now();

                match source.next_frame() {
                    Ok(frame) => {
                        throttler.clear("source_read");
                        register.publish(frame);
                    }
                    Err(e) => {
                        // Transient: skip this tick and keep pacing
                        if throttler.should_log("source_read") {
                            warn!("Frame read failed: {}", e);
                        }
                    }
                }

                let elapsed = started.elapsed();
                if elapsed < interval {
                    std::thread::sleep(interval - elapsed);
                }
            }

            info!("Frame pacer stopped");
        });

        Self { stop_flag, handle }
    }

    /// Request a cooperative stop
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Whether the pacing loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::{PixelFormat, Resolution};
    use crate::video::frame::VideoFrame;
    use crate::error::{AppError, Result};

    /// Synthetic source yielding numbered frames at a fixed nominal rate
    struct CountingSource {
        fps: f64,
        sequence: u64,
        fail_every: Option<u64>,
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> Result<VideoFrame> {
            let seq = self.sequence;
            self.sequence += 1;
            if let Some(n) = self.fail_every {
                if seq % n == n - 1 {
                    return Err(AppError::VideoError("synthetic read failure".into()));
                }
            }
            Ok(VideoFrame::from_vec(
                vec![(seq % 256) as u8; 12],
                Resolution::new(2, 2),
                PixelFormat::Rgb24,
                6,
                seq,
            ))
        }

        fn frame_rate(&self) -> f64 {
            self.fps
        }

        fn resolution(&self) -> Resolution {
            Resolution::new(2, 2)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_paces_at_nominal_rate() {
        let register = Arc::new(FrameRegister::new());
        let source = Box::new(CountingSource {
            fps: 100.0,
            sequence: 0,
            fail_every: None,
        });

        let started = Instant::now();
        let pacer = FramePacer::spawn(source, register.clone());

        // Wait for ~20 publishes at 100 fps
        while register.sequence() < 20 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let elapsed = started.elapsed();
        pacer.stop();

        // 20 frames at 10ms each need at least ~190ms; allow generous
        // upper slack for scheduling noise
        assert!(elapsed >= Duration::from_millis(150), "ran too fast: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "ran too slow: {:?}", elapsed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_failures_do_not_stop_the_loop() {
        let register = Arc::new(FrameRegister::new());
        let source = Box::new(CountingSource {
            fps: 200.0,
            sequence: 0,
            fail_every: Some(3),
        });

        let pacer = FramePacer::spawn(source, register.clone());
        while register.sequence() < 10 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pacer.stop();
        assert!(register.snapshot().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_is_cooperative() {
        let register = Arc::new(FrameRegister::new());
        let source = Box::new(CountingSource {
            fps: 50.0,
            sequence: 0,
            fail_every: None,
        });

        let pacer = FramePacer::spawn(source, register.clone());
        while register.sequence() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pacer.stop();

        // Stop latency is bounded by one frame interval (20ms at 50 fps)
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(pacer.is_finished());
        let settled = register.sequence();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(register.sequence(), settled);
    }
}
