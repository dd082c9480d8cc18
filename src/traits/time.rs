/// Abstraction over the audio device's sample clock.
/// Implementations: a driver-backed clock (production), MockDeviceClock (testing).
pub trait DeviceClock {
    /// Current playback position of the device in seconds, from an
    /// arbitrary epoch. Returns `None` when the device clock is
    /// unavailable (e.g. no output device); callers are expected to fall
    /// back to software time accumulation.
    fn position_secs(&self) -> Option<f64>;
}

/// Device clock that is never available. Forces the audio clock into its
/// degraded software-accumulation path; useful on headless machines.
pub struct UnavailableDeviceClock;

impl DeviceClock for UnavailableDeviceClock {
    fn position_secs(&self) -> Option<f64> {
        None
    }
}

/// Mock device clock for deterministic testing. Clones share the same
/// underlying position, so a test can hand one clone to the clock under
/// test and keep another to drive it.
#[derive(Clone)]
pub struct MockDeviceClock {
    inner: std::rc::Rc<MockDeviceClockState>,
}

struct MockDeviceClockState {
    current_secs: std::cell::Cell<f64>,
    available: std::cell::Cell<bool>,
}

impl MockDeviceClock {
    pub fn new() -> Self {
        Self {
            inner: std::rc::Rc::new(MockDeviceClockState {
                current_secs: std::cell::Cell::new(0.0),
                available: std::cell::Cell::new(true),
            }),
        }
    }

    pub fn set_position(&self, secs: f64) {
        self.inner.current_secs.set(secs);
    }

    pub fn advance(&self, delta_secs: f64) {
        self.inner
            .current_secs
            .set(self.inner.current_secs.get() + delta_secs);
    }

    /// Simulate the device clock dropping out.
    pub fn set_available(&self, available: bool) {
        self.inner.available.set(available);
    }
}

impl Default for MockDeviceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceClock for MockDeviceClock {
    fn position_secs(&self) -> Option<f64> {
        if self.inner.available.get() {
            Some(self.inner.current_secs.get())
        } else {
            None
        }
    }
}
