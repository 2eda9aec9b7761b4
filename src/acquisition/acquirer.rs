//! Bounded frame acquisition.

use super::{AcquisitionError, FrameNamer, FrameSink};
use crate::capture::Camera;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Flag raised from a signal handler to end acquisition early.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the acquisition loop to stop after the current grab.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`StopSignal::raise`] has been called.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the acquisition loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The requested number of frames was written.
    FrameBudget,
    /// The device stopped streaming.
    StreamEnded,
    /// The stop signal was raised.
    Interrupted,
}

/// Result of one acquisition run.
#[derive(Debug, Clone)]
pub struct AcquisitionReport {
    /// Frames persisted by the sink.
    pub frames_written: u32,
    /// Grabs that timed out.
    pub timeouts: u64,
    /// Paths returned by the sink, in write order.
    pub files: Vec<PathBuf>,
    /// Wall time spent in the loop.
    pub elapsed: Duration,
    /// Why the loop ended.
    pub stop_reason: StopReason,
}

/// Pulls frames from a streaming camera and persists each one.
#[derive(Debug, Clone)]
pub struct Acquisition {
    namer: FrameNamer,
    stop: StopSignal,
}

impl Acquisition {
    /// Creates a loop that names files with `namer`.
    pub fn new(namer: FrameNamer) -> Self {
        Self {
            namer,
            stop: StopSignal::new(),
        }
    }

    /// Ends the loop early once `stop` is raised.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// File namer in use.
    pub fn namer(&self) -> &FrameNamer {
        &self.namer
    }

    /// Grabs until `max_frames` are written or the device stops streaming.
    ///
    /// Timeouts are retried without limit or backoff. File indices start
    /// at 0 and increase by one per written frame.
    pub fn acquire<C, S>(
        &self,
        camera: &mut C,
        sink: &mut S,
        max_frames: u32,
        timeout: Duration,
    ) -> Result<AcquisitionReport, AcquisitionError>
    where
        C: Camera + ?Sized,
        S: FrameSink + ?Sized,
    {
        let started = Instant::now();
        let mut written = 0u32;
        let mut timeouts = 0u64;
        let mut files = Vec::new();

        tracing::info!(max_frames, date = self.namer.date_stamp(), "Starting acquisition");

        let stop_reason = loop {
            if written >= max_frames {
                break StopReason::FrameBudget;
            }
            if self.stop.is_raised() {
                break StopReason::Interrupted;
            }
            if !camera.is_streaming() {
                break StopReason::StreamEnded;
            }

            let Some(frame) = camera.try_grab(timeout)? else {
                timeouts += 1;
                continue;
            };

            let name = self.namer.name(written);
            let path = sink.write(&name, &frame)?;
            tracing::debug!(index = written, path = %path.display(), "Frame acquired");
            files.push(path);
            written += 1;
        };

        let elapsed = started.elapsed();
        tracing::info!(
            frames = written,
            timeouts,
            elapsed_s = elapsed.as_secs_f64(),
            reason = ?stop_reason,
            "Acquisition finished"
        );

        Ok(AcquisitionReport {
            frames_written: written,
            timeouts,
            files,
            elapsed,
            stop_reason,
        })
    }
}
