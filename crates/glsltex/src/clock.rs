//! Tick delivery and the time values handed to shaders.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use tracing::debug;

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed time in seconds, in the domain of the time source.
    pub seconds: f32,
    /// Monotonic tick counter for the running clock.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces the time sample for the next tick.
    fn sample(&mut self) -> TimeSample;
}

/// Animation time derived from a frame counter: `frame / fps`.
///
/// Every tick advances one frame, so a source edit and a time change can be
/// told apart from the sample alone.
#[derive(Debug, Clone, Copy)]
pub struct FrameTimeSource {
    fps: f32,
    frame: u64,
}

impl FrameTimeSource {
    pub fn new(fps: f32) -> Self {
        Self { fps, frame: 0 }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl TimeSource for FrameTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let seconds = if self.fps > 0.0 {
            self.frame as f32 / self.fps
        } else {
            0.0
        };
        let sample = TimeSample::new(seconds, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
    frame: u64,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time, frame: 0 }
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.time, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource>;

/// How a run derives shader time from its ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeMode {
    Frames { fps: f32 },
    System,
    Still { time: f32 },
}

impl Default for TimeMode {
    fn default() -> Self {
        Self::Frames { fps: 24.0 }
    }
}

impl fmt::Display for TimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeMode::Frames { fps } => write!(f, "frames@{fps}"),
            TimeMode::System => f.write_str("system"),
            TimeMode::Still { time } => write!(f, "still:{time}"),
        }
    }
}

pub fn time_source(mode: TimeMode) -> BoxedTimeSource {
    match mode {
        TimeMode::Frames { fps } => Box::new(FrameTimeSource::new(fps)),
        TimeMode::System => Box::new(SystemTimeSource::new()),
        TimeMode::Still { time } => Box::new(FixedTimeSource::new(time)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockEvent {
    Tick(TimeSample),
    Cancel,
}

/// Source of the discrete events that drive a run.
pub trait Clock {
    /// Blocks until the next event. Once `Cancel` is returned the clock is
    /// finished and keeps returning `Cancel`.
    fn next_event(&mut self) -> ClockEvent;
}

/// Requests cancellation of an [`IntervalClock`] from anywhere.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // The clock owns a sender too, so the channel outlives every handle.
        let _ = self.sender.send(());
    }
}

/// Clock ticking at a fixed interval until cancelled or a frame limit is hit.
pub struct IntervalClock {
    ticker: Receiver<Instant>,
    cancel_rx: Receiver<()>,
    cancel_tx: Sender<()>,
    source: BoxedTimeSource,
    frame_limit: Option<u64>,
    delivered: u64,
    cancelled: bool,
}

impl IntervalClock {
    pub fn new(interval: Duration, source: BoxedTimeSource) -> Self {
        let (cancel_tx, cancel_rx) = unbounded();
        Self {
            ticker: tick(interval),
            cancel_rx,
            cancel_tx,
            source,
            frame_limit: None,
            delivered: 0,
            cancelled: false,
        }
    }

    /// Cancels after `frames` ticks have been delivered.
    pub fn with_frame_limit(mut self, frames: Option<u64>) -> Self {
        self.frame_limit = frames;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: self.cancel_tx.clone(),
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl Clock for IntervalClock {
    fn next_event(&mut self) -> ClockEvent {
        if self.cancelled {
            return ClockEvent::Cancel;
        }
        if self.frame_limit.is_some_and(|limit| self.delivered >= limit) {
            debug!(frames = self.delivered, "frame limit reached");
            self.cancelled = true;
            return ClockEvent::Cancel;
        }

        select! {
            recv(self.cancel_rx) -> _ => {
                debug!("clock cancelled");
                self.cancelled = true;
                ClockEvent::Cancel
            }
            recv(self.ticker) -> _ => {
                self.delivered += 1;
                ClockEvent::Tick(self.source.sample())
            }
        }
    }
}

/// Clock replaying a fixed list of events, then cancelling.
#[derive(Debug, Default)]
pub struct ScriptedClock {
    events: VecDeque<ClockEvent>,
}

impl ScriptedClock {
    pub fn new(events: impl IntoIterator<Item = ClockEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// One tick per time value, frame indices counting from zero.
    pub fn from_times(times: impl IntoIterator<Item = f32>) -> Self {
        Self::new(
            times
                .into_iter()
                .enumerate()
                .map(|(frame, seconds)| ClockEvent::Tick(TimeSample::new(seconds, frame as u64))),
        )
    }
}

impl Clock for ScriptedClock {
    fn next_event(&mut self) -> ClockEvent {
        self.events.pop_front().unwrap_or(ClockEvent::Cancel)
    }
}
