//! Per-note state machine driven by the audio clock.
//!
//! The field owns every note's runtime state exclusively; rendering and
//! UI collaborators only ever read. Input events resolve notes through
//! the judgment engine; keysound playback is surfaced as requests for the
//! session to route through timing feedback and the channel pool.

use tracing::debug;

use crate::judge::{JudgmentEngine, JudgmentTier, TimingDirection};
use crate::traits::audio::KeySoundId;

use super::{ChartError, NoteDescriptor, NoteId, validate_chart};

/// Runtime state of a single note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteRuntimeState {
    /// Not yet inside the visible window.
    Scheduled,
    /// Visible and accepting input.
    Active,
    /// Long note head was hit; waiting for the release.
    Held { press_tier: JudgmentTier },
    /// Judged; carries the final tier (worse of press and release for
    /// long notes).
    Resolved { tier: JudgmentTier },
    /// Timed out without the required input.
    Missed,
    /// Garbage-collected; no longer visible or judgeable.
    Destroyed,
}

impl NoteRuntimeState {
    /// Whether the note still awaits input or spawning.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Active | Self::Held { .. })
    }

    /// Whether the note has reached a terminal judgment.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved { .. } | Self::Missed | Self::Destroyed)
    }
}

/// Which endpoint of a note an event describes. Tap notes only ever
/// report `Press`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEndpoint {
    Press,
    Release,
}

/// One judgment, as delivered to the scoring/UI collaborator.
/// Long notes produce two: press and release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgmentEvent {
    pub note: NoteId,
    pub endpoint: NoteEndpoint,
    pub tier: JudgmentTier,
    pub error_ms: f64,
    /// FAST/SLOW indicator for the accuracy display.
    pub direction: TimingDirection,
}

/// A keysound the session should play, with the timing error that drives
/// its modulation. Misses produce no request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRequest {
    pub key_sound: KeySoundId,
    pub error_ms: f64,
}

/// All notes of one play session plus their runtime state.
pub struct NoteField {
    notes: Vec<NoteDescriptor>,
    states: Vec<NoteRuntimeState>,
    /// Note indices per track, sorted by (timing, insertion order); the
    /// sort is stable so equal-timed notes keep chart order.
    track_index: Vec<Vec<usize>>,
    /// Currently held long note per track.
    held: Vec<Option<usize>>,
    engine: JudgmentEngine,
    spawn_lead_secs: f64,
    events: Vec<JudgmentEvent>,
    playback: Vec<PlaybackRequest>,
}

impl NoteField {
    /// Build a field from validated chart data. Rejects malformed
    /// descriptors before the session starts; nothing after this returns
    /// an error.
    pub fn new(
        notes: Vec<NoteDescriptor>,
        track_count: usize,
        engine: JudgmentEngine,
        spawn_lead_secs: f64,
    ) -> Result<Self, ChartError> {
        validate_chart(&notes, track_count)?;

        let mut track_index: Vec<Vec<usize>> = vec![Vec::new(); track_count];
        for (i, note) in notes.iter().enumerate() {
            track_index[note.track].push(i);
        }
        for lane in &mut track_index {
            lane.sort_by(|&a, &b| {
                notes[a]
                    .timing_secs
                    .partial_cmp(&notes[b].timing_secs)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
        }

        let states = vec![NoteRuntimeState::Scheduled; notes.len()];
        Ok(Self {
            notes,
            states,
            track_index,
            held: vec![None; track_count],
            engine,
            spawn_lead_secs,
            events: Vec::new(),
            playback: Vec::new(),
        })
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn track_count(&self) -> usize {
        self.track_index.len()
    }

    pub fn state(&self, note: NoteId) -> Option<NoteRuntimeState> {
        self.states.get(note.0).copied()
    }

    pub fn descriptor(&self, note: NoteId) -> Option<&NoteDescriptor> {
        self.notes.get(note.0)
    }

    /// Notes a renderer should draw: inside the visible window and not
    /// yet settled.
    pub fn visible_notes(&self) -> impl Iterator<Item = (NoteId, &NoteDescriptor)> {
        self.notes
            .iter()
            .enumerate()
            .filter(|&(i, _)| {
                matches!(
                    self.states[i],
                    NoteRuntimeState::Active | NoteRuntimeState::Held { .. }
                )
            })
            .map(|(i, note)| (NoteId(i), note))
    }

    /// Whether every note has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.states.iter().all(|s| s.is_settled())
    }

    /// Advance clock-driven transitions to `now_secs`: spawn, then sweep.
    /// Callers that judge input mid-frame run the two phases separately so
    /// an input queued inside a note's window is never pre-empted by the
    /// sweep when the frame itself lands past the window.
    pub fn tick(&mut self, now_secs: f64) {
        self.spawn(now_secs);
        self.sweep_misses(now_secs);
    }

    /// Activate scheduled notes whose visible window has begun.
    pub fn spawn(&mut self, now_secs: f64) {
        for i in 0..self.notes.len() {
            if self.states[i] == NoteRuntimeState::Scheduled
                && now_secs >= self.notes[i].timing_secs - self.spawn_lead_secs
            {
                self.states[i] = NoteRuntimeState::Active;
            }
        }
    }

    /// Time out notes whose judgment window has passed without input.
    pub fn sweep_misses(&mut self, now_secs: f64) {
        for i in 0..self.notes.len() {
            match self.states[i] {
                NoteRuntimeState::Active => {
                    if self.engine.is_missed(self.notes[i].timing_secs, now_secs) {
                        self.miss_head(i, now_secs);
                    }
                }
                NoteRuntimeState::Held { .. } => {
                    let end_secs = self.notes[i].end_timing_secs();
                    if self.engine.is_release_missed(end_secs, now_secs) {
                        self.miss_tail(i, now_secs);
                    }
                }
                _ => {}
            }
        }
    }

    /// Handle a press on `track` at audio-clock time `time_secs`.
    /// Resolves the earliest-timed active note within tolerance; ties in
    /// timing fall to ascending insertion order. A press with no
    /// candidate is ignored (no empty-input penalty in this core).
    pub fn on_press(&mut self, track: usize, time_secs: f64) {
        let Some(idx) = self.select_press_target(track, time_secs) else {
            return;
        };

        let note = &self.notes[idx];
        let error_ms = (time_secs - note.timing_secs) * 1000.0;
        let tier = self.engine.judge(error_ms);
        let key_sound = note.key_sound;
        let is_long = note.is_long;

        self.push_event(NoteId(idx), NoteEndpoint::Press, tier, error_ms);
        if !tier.is_miss() {
            self.playback.push(PlaybackRequest {
                key_sound,
                error_ms,
            });
        }

        if is_long && !tier.is_miss() {
            // Open hold: no permanent judgment yet.
            self.states[idx] = NoteRuntimeState::Held { press_tier: tier };
            self.held[track] = Some(idx);
        } else if is_long {
            // A missed head forfeits the tail as well.
            self.states[idx] = NoteRuntimeState::Missed;
            self.push_event(
                NoteId(idx),
                NoteEndpoint::Release,
                JudgmentTier::Miss,
                error_ms,
            );
        } else {
            self.states[idx] = NoteRuntimeState::Resolved { tier };
        }
    }

    /// Handle a release on `track` at audio-clock time `time_secs`.
    /// Only meaningful while a long note is held there.
    pub fn on_release(&mut self, track: usize, time_secs: f64) {
        let Some(idx) = self.held[track].take() else {
            return;
        };
        let NoteRuntimeState::Held { press_tier } = self.states[idx] else {
            return;
        };

        let note = &self.notes[idx];
        let error_ms = (time_secs - note.end_timing_secs()) * 1000.0;
        let release_tier = self.engine.judge_release(error_ms);
        let key_sound = note.key_sound;

        self.push_event(NoteId(idx), NoteEndpoint::Release, release_tier, error_ms);
        if !release_tier.is_miss() {
            self.playback.push(PlaybackRequest {
                key_sound,
                error_ms,
            });
        }

        // Final judgment is the worse of the two endpoints; both were
        // reported individually above.
        let final_tier = press_tier.worse(release_tier);
        self.states[idx] = if final_tier.is_miss() {
            NoteRuntimeState::Missed
        } else {
            NoteRuntimeState::Resolved { tier: final_tier }
        };
    }

    /// Garbage-collect settled notes to `Destroyed`. Returns how many
    /// were collected. Batched by the session rather than per event.
    pub fn destroy_settled(&mut self) -> usize {
        let mut collected = 0;
        for state in &mut self.states {
            if matches!(
                state,
                NoteRuntimeState::Resolved { .. } | NoteRuntimeState::Missed
            ) {
                *state = NoteRuntimeState::Destroyed;
                collected += 1;
            }
        }
        collected
    }

    /// Session teardown: every live note goes straight to `Destroyed`,
    /// with no judgment events. All-or-nothing.
    pub fn destroy_all(&mut self) {
        for state in &mut self.states {
            *state = NoteRuntimeState::Destroyed;
        }
        self.held.fill(None);
    }

    /// Judgments produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<JudgmentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Playback requests produced since the last drain.
    pub fn drain_playback(&mut self) -> Vec<PlaybackRequest> {
        std::mem::take(&mut self.playback)
    }

    /// Earliest-timed active note on `track` within press tolerance of
    /// `time_secs`. The lane index is sorted by (timing, insertion order)
    /// so the first in-window hit is the correct pick.
    fn select_press_target(&self, track: usize, time_secs: f64) -> Option<usize> {
        let max_window_secs = self.engine.max_window() / 1000.0;
        let lane = self.track_index.get(track)?;
        for &idx in lane {
            if self.states[idx] != NoteRuntimeState::Active {
                continue;
            }
            let offset = self.notes[idx].timing_secs - time_secs;
            if offset > max_window_secs {
                // Lane is time-sorted; everything further is out of reach.
                break;
            }
            if offset >= -max_window_secs {
                return Some(idx);
            }
        }
        None
    }

    fn miss_head(&mut self, idx: usize, now_secs: f64) {
        let note = &self.notes[idx];
        let error_ms = (now_secs - note.timing_secs) * 1000.0;
        let is_long = note.is_long;
        debug!(note = idx, track = note.track, "note timed out");

        self.states[idx] = NoteRuntimeState::Missed;
        self.push_event(NoteId(idx), NoteEndpoint::Press, JudgmentTier::Miss, error_ms);
        if is_long {
            // The tail can never be hit once the head has expired.
            self.push_event(
                NoteId(idx),
                NoteEndpoint::Release,
                JudgmentTier::Miss,
                error_ms,
            );
        }
    }

    fn miss_tail(&mut self, idx: usize, now_secs: f64) {
        let note = &self.notes[idx];
        let error_ms = (now_secs - note.end_timing_secs()) * 1000.0;
        let track = note.track;
        debug!(note = idx, track, "held note released too late");

        // Release tier is forced to Miss; the press tier stands as
        // reported when the hold opened.
        self.states[idx] = NoteRuntimeState::Missed;
        self.held[track] = None;
        self.push_event(
            NoteId(idx),
            NoteEndpoint::Release,
            JudgmentTier::Miss,
            error_ms,
        );
    }

    fn push_event(&mut self, note: NoteId, endpoint: NoteEndpoint, tier: JudgmentTier, error_ms: f64) {
        self.events.push(JudgmentEvent {
            note,
            endpoint,
            tier,
            error_ms,
            direction: TimingDirection::from_error(error_ms),
        });
    }
}
