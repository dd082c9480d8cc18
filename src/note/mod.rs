//! Chart note model.
//!
//! Descriptors are supplied by the chart collaborator at load time and
//! are immutable for the life of a play session; all mutable per-note
//! state lives in [`lifecycle`].

mod lifecycle;

pub use lifecycle::{JudgmentEvent, NoteEndpoint, NoteField, NoteRuntimeState, PlaybackRequest};

use thiserror::Error;

use crate::traits::audio::KeySoundId;

/// Identifies a note by its descriptor insertion order. Stable for the
/// session; also the tie-break key for equal-timed notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(pub usize);

/// Malformed chart data, rejected before a session starts.
#[derive(Debug, Error, PartialEq)]
pub enum ChartError {
    #[error("note {index}: track {track} out of range (track count {track_count})")]
    TrackOutOfRange {
        index: usize,
        track: usize,
        track_count: usize,
    },

    #[error("note {index}: long note end {end_secs} not after start {timing_secs}")]
    InvertedLongNote {
        index: usize,
        timing_secs: f64,
        end_secs: f64,
    },

    #[error("note {index}: long note without an end timing")]
    MissingLongEnd { index: usize },

    #[error("note {index}: non-finite timing")]
    NonFiniteTiming { index: usize },
}

/// A single note in the chart. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDescriptor {
    /// Head timing in seconds, audio-clock domain.
    pub timing_secs: f64,
    /// Lane the note belongs to.
    pub track: usize,
    /// Keysound to play when the note is hit.
    pub key_sound: KeySoundId,
    pub is_long: bool,
    /// Tail timing; only meaningful when `is_long`.
    pub long_end_secs: Option<f64>,
}

impl NoteDescriptor {
    /// Create a tap note.
    pub fn tap(track: usize, timing_secs: f64, key_sound: KeySoundId) -> Self {
        Self {
            timing_secs,
            track,
            key_sound,
            is_long: false,
            long_end_secs: None,
        }
    }

    /// Create a long (hold) note.
    pub fn long(track: usize, timing_secs: f64, end_secs: f64, key_sound: KeySoundId) -> Self {
        Self {
            timing_secs,
            track,
            key_sound,
            is_long: true,
            long_end_secs: Some(end_secs),
        }
    }

    /// Tail timing for long notes, head timing otherwise.
    pub fn end_timing_secs(&self) -> f64 {
        if self.is_long {
            self.long_end_secs.unwrap_or(self.timing_secs)
        } else {
            self.timing_secs
        }
    }

    /// Scroll progress in `[0, 1]` for a note that spawned `lead_secs`
    /// before its head timing: 0 at spawn, 1 at the judgment line.
    /// Elapsed time is `now - spawn_time` over `timing - spawn_time`.
    pub fn progress_at(&self, now_secs: f64, lead_secs: f64) -> f64 {
        if lead_secs <= 0.0 {
            return 1.0;
        }
        let spawn_secs = self.timing_secs - lead_secs;
        ((now_secs - spawn_secs) / lead_secs).clamp(0.0, 1.0)
    }

    fn validate(&self, index: usize, track_count: usize) -> Result<(), ChartError> {
        if !self.timing_secs.is_finite()
            || self.long_end_secs.is_some_and(|end| !end.is_finite())
        {
            return Err(ChartError::NonFiniteTiming { index });
        }
        if self.track >= track_count {
            return Err(ChartError::TrackOutOfRange {
                index,
                track: self.track,
                track_count,
            });
        }
        if self.is_long {
            match self.long_end_secs {
                None => return Err(ChartError::MissingLongEnd { index }),
                Some(end_secs) if end_secs <= self.timing_secs => {
                    return Err(ChartError::InvertedLongNote {
                        index,
                        timing_secs: self.timing_secs,
                        end_secs,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Validate a chart before a session starts. Returns the first defect;
/// nothing after load may reject a descriptor.
pub fn validate_chart(notes: &[NoteDescriptor], track_count: usize) -> Result<(), ChartError> {
    for (index, note) in notes.iter().enumerate() {
        note.validate(index, track_count)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_and_long_constructors() {
        let tap = NoteDescriptor::tap(2, 1.5, KeySoundId(7));
        assert!(!tap.is_long);
        assert_eq!(tap.end_timing_secs(), 1.5);

        let long = NoteDescriptor::long(0, 1.0, 4.0, KeySoundId(8));
        assert!(long.is_long);
        assert_eq!(long.end_timing_secs(), 4.0);
    }

    #[test]
    fn validate_accepts_well_formed_chart() {
        let notes = vec![
            NoteDescriptor::tap(0, 1.0, KeySoundId(1)),
            NoteDescriptor::long(3, 2.0, 3.5, KeySoundId(2)),
        ];
        assert_eq!(validate_chart(&notes, 4), Ok(()));
    }

    #[test]
    fn validate_rejects_track_out_of_range() {
        let notes = vec![NoteDescriptor::tap(4, 1.0, KeySoundId(1))];
        assert_eq!(
            validate_chart(&notes, 4),
            Err(ChartError::TrackOutOfRange {
                index: 0,
                track: 4,
                track_count: 4,
            })
        );
    }

    #[test]
    fn validate_rejects_inverted_long_note() {
        let notes = vec![NoteDescriptor::long(0, 4.0, 1.0, KeySoundId(1))];
        assert!(matches!(
            validate_chart(&notes, 4),
            Err(ChartError::InvertedLongNote { index: 0, .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_length_long_note() {
        let notes = vec![NoteDescriptor::long(0, 2.0, 2.0, KeySoundId(1))];
        assert!(matches!(
            validate_chart(&notes, 4),
            Err(ChartError::InvertedLongNote { .. })
        ));
    }

    #[test]
    fn validate_rejects_missing_long_end() {
        let mut note = NoteDescriptor::tap(0, 1.0, KeySoundId(1));
        note.is_long = true;
        assert_eq!(
            validate_chart(&[note], 4),
            Err(ChartError::MissingLongEnd { index: 0 })
        );
    }

    #[test]
    fn progress_runs_from_spawn_to_judgment_line() {
        let note = NoteDescriptor::tap(0, 2.0, KeySoundId(1));
        // Spawn lead of 1 s: spawns at t=1.0, arrives at t=2.0.
        assert_eq!(note.progress_at(1.0, 1.0), 0.0);
        assert!((note.progress_at(1.5, 1.0) - 0.5).abs() < 1e-9);
        assert_eq!(note.progress_at(2.0, 1.0), 1.0);
        // Clamped outside the window.
        assert_eq!(note.progress_at(0.0, 1.0), 0.0);
        assert_eq!(note.progress_at(3.0, 1.0), 1.0);
    }
}
