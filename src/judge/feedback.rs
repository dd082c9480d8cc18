//! Pitch/volume modulation derived from timing accuracy.
//!
//! A sloppy hit plays its keysound slightly detuned and quieter; an exact
//! hit plays it clean. Both clamps are configuration inputs so different
//! tunings can supply their own bounds.

use serde::{Deserialize, Serialize};

/// Bounds for timing-derived modulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackBounds {
    /// Pitch shift per millisecond of signed error.
    pub pitch_sensitivity: f64,
    /// Maximum deviation of the pitch factor from 1.0 in either direction.
    pub max_pitch_delta: f64,
    /// Attenuation accumulated per 100 ms of absolute error.
    pub attenuation_rate: f64,
    /// Lower clamp on attenuation once it applies at all.
    pub min_attenuation: f64,
    /// Upper clamp on attenuation.
    pub max_attenuation: f64,
}

impl Default for FeedbackBounds {
    fn default() -> Self {
        Self {
            pitch_sensitivity: 0.002,
            max_pitch_delta: 0.12,
            attenuation_rate: 0.5,
            min_attenuation: 0.05,
            max_attenuation: 0.6,
        }
    }
}

/// Playback parameters for one keysound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulation {
    /// Playback rate factor, 1.0 = unshifted.
    pub pitch: f64,
    /// Volume factor, 1.0 = full.
    pub volume: f64,
}

impl Modulation {
    pub const NEUTRAL: Modulation = Modulation {
        pitch: 1.0,
        volume: 1.0,
    };
}

/// Compute playback modulation for a hit with signed error `error_ms`.
///
/// Pitch shifts proportionally to the signed error (early = flat, late =
/// sharp), clamped to `1.0 ± max_pitch_delta`. Volume attenuates only once
/// the absolute error exceeds `threshold_ms` (the mode's Great boundary);
/// within it the sound plays at full volume.
pub fn modulate(error_ms: f64, threshold_ms: f64, bounds: &FeedbackBounds) -> Modulation {
    let pitch = (1.0 + error_ms * bounds.pitch_sensitivity).clamp(
        1.0 - bounds.max_pitch_delta,
        1.0 + bounds.max_pitch_delta,
    );

    let abs_error = error_ms.abs();
    let volume = if abs_error > threshold_ms {
        let attenuation = (abs_error / 100.0 * bounds.attenuation_rate)
            .clamp(bounds.min_attenuation, bounds.max_attenuation);
        1.0 - attenuation
    } else {
        1.0
    };

    Modulation { pitch, volume }
}
