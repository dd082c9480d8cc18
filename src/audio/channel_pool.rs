//! Fixed-capacity manager for concurrently playing sound channels.
//!
//! Keysound playback is best-effort: a full pool rejects the request and
//! a missing resource skips it, but nothing here blocks, fails, or
//! panics on the gameplay path. Finished channels are swept back into
//! capacity on a batched schedule rather than per event.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::traits::audio::{AudioBackend, ChannelId, KeySoundId};

/// Result of a playback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Playback started on the given channel.
    Started(ChannelId),
    /// No free capacity; the sound was skipped.
    Rejected,
    /// No resource loaded for the sound id; the sound was skipped.
    MissingSound,
}

impl PlayOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Wraps an [`AudioBackend`] and bounds how many channels play at once.
pub struct ChannelPool<A: AudioBackend> {
    backend: A,
    /// Outstanding channels, in start order. Never exceeds `capacity`.
    live: Vec<ChannelId>,
    capacity: usize,
    reclaim_interval_ticks: u32,
    ticks_since_reclaim: u32,
    /// Sound ids already reported missing; each is logged once.
    missing_reported: HashSet<KeySoundId>,
}

impl<A: AudioBackend> ChannelPool<A> {
    pub fn new(backend: A, capacity: usize, reclaim_interval_ticks: u32) -> Self {
        Self {
            backend,
            live: Vec::with_capacity(capacity),
            capacity,
            reclaim_interval_ticks: reclaim_interval_ticks.max(1),
            ticks_since_reclaim: 0,
            missing_reported: HashSet::new(),
        }
    }

    /// Start a sound at the given volume (0.0..=1.0) and pitch factor.
    ///
    /// Full pool: reject, do not evict. Missing resource: skip, judgment
    /// elsewhere is unaffected. Backend failure: skip and log.
    pub fn play(&mut self, sound: KeySoundId, volume: f64, pitch: f64) -> PlayOutcome {
        if !self.backend.has_sound(sound) {
            if self.missing_reported.insert(sound) {
                warn!(sound = sound.0, "no resource for keysound, skipping playback");
            }
            return PlayOutcome::MissingSound;
        }
        if self.live.len() >= self.capacity {
            debug!(sound = sound.0, capacity = self.capacity, "channel pool full");
            return PlayOutcome::Rejected;
        }
        match self.backend.start(sound, volume, pitch) {
            Ok(channel) => {
                self.live.push(channel);
                PlayOutcome::Started(channel)
            }
            Err(err) => {
                warn!(sound = sound.0, error = %err, "backend refused playback");
                PlayOutcome::Rejected
            }
        }
    }

    /// Advance the reclamation schedule by one tick. Every
    /// `reclaim_interval_ticks` ticks, sweeps all outstanding channels
    /// and returns the finished ones to the free set.
    pub fn tick(&mut self) {
        self.ticks_since_reclaim += 1;
        if self.ticks_since_reclaim >= self.reclaim_interval_ticks {
            self.ticks_since_reclaim = 0;
            self.reclaim();
        }
    }

    /// Sweep now, regardless of the batch schedule. A channel is only
    /// freed once its playback has actually finished.
    pub fn reclaim(&mut self) -> usize {
        let before = self.live.len();
        let backend = &self.backend;
        self.live.retain(|&channel| !backend.is_finished(channel));
        before - self.live.len()
    }

    /// Force-stop every live channel (session teardown).
    pub fn stop_all(&mut self) {
        for channel in self.live.drain(..) {
            self.backend.stop(channel);
        }
    }

    /// Number of outstanding channels.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a reference to the underlying backend.
    pub fn backend(&self) -> &A {
        &self.backend
    }

    /// Get a mutable reference to the underlying backend.
    pub fn backend_mut(&mut self) -> &mut A {
        &mut self.backend
    }
}
