use serde::{Deserialize, Serialize};

/// Audio subsystem configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Maximum number of concurrently playing channels.
    pub channel_capacity: usize,
    /// Volume multiplier applied to every keysound (0.0 - 1.0).
    pub keysound_volume: f64,
    /// Reclaim finished channels every this many ticks.
    pub reclaim_interval_ticks: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
            keysound_volume: 1.0,
            reclaim_interval_ticks: 30,
        }
    }
}
