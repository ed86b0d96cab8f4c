#![forbid(unsafe_code)]

//! Per-frame tick bookkeeping on top of the host's animation-frame
//! primitive.
//!
//! The host is responsible for actually delivering frames: it implements
//! [`FrameSource`], and on every animation frame calls back into the
//! coordinator, which feeds [`FrameTimer::on_frame`]. Timer-based ticking is
//! deliberately unsupported: timers are throttled during scroll on some
//! hosts, which is exactly when the pipeline most needs frames.

use std::collections::VecDeque;
use web_time::{Duration, Instant};

/// Frames averaged for the smoothed duration.
const AVERAGE_WINDOW: usize = 5;

/// Assumed duration of the first frame after a start, before any
/// inter-tick measurement exists.
const NOMINAL_FRAME: Duration = Duration::from_millis(16);

/// Handle to one outstanding animation-frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// The host's animation-frame primitive.
pub trait FrameSource {
    /// Ask the host to deliver one frame callback.
    fn request_frame(&mut self) -> FrameRequest;

    /// Retract a not-yet-delivered request.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Timing sample for one delivered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSample {
    /// Time since the previous tick.
    pub last: Duration,
    /// Moving average over the last five ticks.
    pub average: Duration,
}

/// Tracks tick-to-tick durations and keeps exactly one frame request in
/// flight while running.
#[derive(Debug)]
pub struct FrameTimer {
    running: bool,
    pending: Option<FrameRequest>,
    last_tick: Option<Instant>,
    last: Duration,
    recent: VecDeque<Duration>,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a stopped timer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: false,
            pending: None,
            last_tick: None,
            last: NOMINAL_FRAME,
            recent: VecDeque::with_capacity(AVERAGE_WINDOW),
        }
    }

    /// Start ticking. Idempotent; at most one request is ever in flight.
    pub fn start(&mut self, source: &mut dyn FrameSource) {
        if self.running {
            return;
        }
        self.running = true;
        if self.pending.is_none() {
            self.pending = Some(source.request_frame());
        }
    }

    /// Stop ticking and retract the pending request. Idempotent.
    pub fn stop(&mut self, source: &mut dyn FrameSource) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(request) = self.pending.take() {
            source.cancel_frame(request);
        }
        // A later restart must not measure the stopped gap as a frame.
        self.last_tick = None;
    }

    /// Whether the timer is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Record a delivered frame and request the next one (while running).
    pub fn on_frame(&mut self, now: Instant, source: &mut dyn FrameSource) -> FrameSample {
        self.pending = None;
        self.last = match self.last_tick {
            Some(prev) => now.saturating_duration_since(prev),
            None => NOMINAL_FRAME,
        };
        self.last_tick = Some(now);
        if self.recent.len() == AVERAGE_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(self.last);

        if self.running {
            self.pending = Some(source.request_frame());
        }
        FrameSample {
            last: self.last,
            average: self.average_frame_time(),
        }
    }

    /// Duration of the most recent tick.
    #[must_use]
    pub fn last_frame_time(&self) -> Duration {
        self.last
    }

    /// Average duration over the most recent ticks.
    #[must_use]
    pub fn average_frame_time(&self) -> Duration {
        if self.recent.is_empty() {
            return NOMINAL_FRAME;
        }
        let total: Duration = self.recent.iter().sum();
        total / self.recent.len() as u32
    }
}
