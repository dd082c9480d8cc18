//! Playback-position clock for note scheduling.
//!
//! Position is derived from the audio device's own sample clock rather
//! than wall-clock deltas, so it stays accurate under frame-rate variance
//! and OS scheduling jitter. If the device clock drops out the clock
//! degrades to software accumulation and flags itself; the session
//! continues with reduced timing precision.

mod timer;

pub use timer::{ClockTimer, TaskId};

use std::cell::Cell;
use std::time::Instant;

use tracing::warn;

use crate::traits::time::DeviceClock;

/// Which source produced a clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// The audio device's sample clock.
    Device,
    /// Software accumulation fallback (degraded precision).
    Software,
}

/// Read-only snapshot of the clock; never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSample {
    /// Elapsed seconds since session start.
    pub position: f64,
    pub source: ClockSource,
}

/// Monotonic, drift-resistant playback clock.
///
/// The device is only ever read, never mutated, so reads need no locking;
/// interior mutability here only maintains the monotonic clamp and the
/// degradation anchor.
pub struct AudioClock<C: DeviceClock> {
    device: C,
    started: Cell<bool>,
    /// Device position captured at `start()`.
    origin_secs: Cell<f64>,
    /// Last position handed out; reads never go backwards.
    last_position: Cell<f64>,
    degraded: Cell<bool>,
    /// Wall-clock anchor for the software fallback: (instant, position).
    fallback_anchor: Cell<Option<(Instant, f64)>>,
}

impl<C: DeviceClock> AudioClock<C> {
    pub fn new(device: C) -> Self {
        Self {
            device,
            started: Cell::new(false),
            origin_secs: Cell::new(0.0),
            last_position: Cell::new(0.0),
            degraded: Cell::new(false),
            fallback_anchor: Cell::new(None),
        }
    }

    /// Mark session start, capturing the device clock's current position
    /// as origin. If the device clock is unavailable the clock starts
    /// degraded immediately.
    pub fn start(&self) {
        self.started.set(true);
        self.last_position.set(0.0);
        match self.device.position_secs() {
            Some(pos) => {
                self.origin_secs.set(pos);
                self.degraded.set(false);
                self.fallback_anchor.set(None);
            }
            None => self.degrade_at(0.0),
        }
    }

    /// Elapsed seconds since `start()`. Returns 0.0 before `start()`.
    pub fn position(&self) -> f64 {
        if !self.started.get() {
            return 0.0;
        }
        if self.degraded.get() {
            let (anchor, at) = self
                .fallback_anchor
                .get()
                .unwrap_or((Instant::now(), self.last_position.get()));
            let pos = at + anchor.elapsed().as_secs_f64();
            self.last_position.set(pos);
            return pos;
        }
        match self.device.position_secs() {
            Some(pos) => {
                // Clamp so concurrent device-side adjustments never make
                // the session position run backwards.
                let elapsed = (pos - self.origin_secs.get()).max(self.last_position.get());
                self.last_position.set(elapsed);
                elapsed
            }
            None => {
                let at = self.last_position.get();
                self.degrade_at(at);
                at
            }
        }
    }

    /// Position expressed in beats at the given tempo.
    pub fn position_in_beats(&self, bpm: f64) -> f64 {
        self.position() * bpm / 60.0
    }

    /// Immutable snapshot of the current reading.
    pub fn sample(&self) -> ClockSample {
        let position = self.position();
        let source = if self.degraded.get() {
            ClockSource::Software
        } else {
            ClockSource::Device
        };
        ClockSample { position, source }
    }

    /// Persistent warning flag: the device clock dropped out at some point
    /// and timing precision is no longer guaranteed to stay within tight
    /// tolerance tiers.
    pub fn is_degraded(&self) -> bool {
        self.degraded.get()
    }

    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    fn degrade_at(&self, position: f64) {
        if !self.degraded.get() {
            warn!(
                position_secs = position,
                "device clock unavailable, degrading to software time accumulation"
            );
        }
        self.degraded.set(true);
        self.fallback_anchor.set(Some((Instant::now(), position)));
    }
}
