//! Timing and judgment core for a rhythm game.
//!
//! Converts the audio playback clock into note events, judges player
//! input against mode-dependent tolerance windows, drives long-note
//! holds, and plays per-note keysounds with timing-derived pitch and
//! volume through a bounded channel pool.

pub mod audio;
pub mod clock;
pub mod config;
pub mod judge;
pub mod note;
pub mod session;
pub mod traits;
pub mod util;
