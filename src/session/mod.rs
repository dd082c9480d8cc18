//! Caller-owned tick loop for one play session.
//!
//! The session owns one instance of every component and passes references
//! between them; there is no ambient global state. The caller's scheduler
//! invokes `init()` once, `tick()` once per frame, and `shutdown()` at the
//! end (or lets [`SessionGuard`] do it). Input events are queued into the
//! session before `tick()` and judged synchronously inside it; nothing on
//! this path blocks or returns an error.

use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::info;

use crate::clock::{AudioClock, ClockTimer, TaskId};
use crate::config::{ConfigError, EngineConfig};
use crate::judge::{FeedbackBounds, modulate};
use crate::note::{ChartError, JudgmentEvent, NoteDescriptor, NoteField};
use crate::audio::ChannelPool;
use crate::traits::audio::AudioBackend;
use crate::traits::time::DeviceClock;

/// Load-time failure building a session. Nothing after a successful
/// build returns an error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chart(#[from] ChartError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Press,
    Release,
}

/// One key event, timestamped in the audio-clock domain by the input
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub track: usize,
    pub kind: InputKind,
    pub time_secs: f64,
}

pub struct Session<C: DeviceClock, A: AudioBackend> {
    clock: AudioClock<C>,
    field: NoteField,
    pool: ChannelPool<A>,
    timer: ClockTimer,
    feedback: FeedbackBounds,
    /// Great boundary of the active mode; errors inside it play at full
    /// volume.
    attenuation_threshold_ms: f64,
    keysound_volume: f64,
    input_queue: Vec<InputEvent>,
    events: Vec<JudgmentEvent>,
    fired_tasks: Vec<TaskId>,
    running: bool,
}

impl<C: DeviceClock, A: AudioBackend> Session<C, A> {
    /// Validate configuration and chart, then assemble a session.
    pub fn new(
        config: &EngineConfig,
        notes: Vec<NoteDescriptor>,
        track_count: usize,
        device: C,
        backend: A,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let engine = config.judgment_engine();
        let attenuation_threshold_ms = engine.table().attenuation_threshold();
        let field = NoteField::new(notes, track_count, engine, config.spawn_lead_secs)?;
        let pool = ChannelPool::new(
            backend,
            config.audio.channel_capacity,
            config.audio.reclaim_interval_ticks,
        );

        Ok(Self {
            clock: AudioClock::new(device),
            field,
            pool,
            timer: ClockTimer::new(),
            feedback: config.feedback.clone(),
            attenuation_threshold_ms,
            keysound_volume: config.audio.keysound_volume,
            input_queue: Vec::new(),
            events: Vec::new(),
            fired_tasks: Vec::new(),
            running: false,
        })
    }

    /// Start the session clock. Idempotent only in the sense that a
    /// second call restarts the clock; callers invoke it once.
    pub fn init(&mut self) {
        self.clock.start();
        self.running = true;
        info!(
            notes = self.field.note_count(),
            tracks = self.field.track_count(),
            degraded = self.clock.is_degraded(),
            "session started"
        );
    }

    /// Queue an input event for the next tick.
    pub fn push_input(&mut self, event: InputEvent) {
        self.input_queue.push(event);
    }

    /// One frame of the session: clock-driven note transitions, queued
    /// input judgment, keysound routing, timers, channel reclamation.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        let now_secs = self.clock.position();

        // Spawn first so notes entering the window this frame are
        // pressable; sweep timeouts only after input, so an in-window
        // input queued this frame is never pre-empted by a tick that
        // lands past the window.
        self.field.spawn(now_secs);

        for event in std::mem::take(&mut self.input_queue) {
            match event.kind {
                InputKind::Press => self.field.on_press(event.track, event.time_secs),
                InputKind::Release => self.field.on_release(event.track, event.time_secs),
            }
        }

        self.field.sweep_misses(now_secs);

        // Route keysounds through timing feedback into the pool.
        for request in self.field.drain_playback() {
            let m = modulate(request.error_ms, self.attenuation_threshold_ms, &self.feedback);
            self.pool
                .play(request.key_sound, m.volume * self.keysound_volume, m.pitch);
        }

        self.events.extend(self.field.drain_events());
        self.fired_tasks.extend(self.timer.poll(now_secs));
        self.field.destroy_settled();
        self.pool.tick();
    }

    /// Tear down the session: all live notes to `Destroyed`, all live
    /// channels force-stopped. All-or-nothing; safe to call twice.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.field.destroy_all();
        self.pool.stop_all();
        self.timer.clear();
        self.input_queue.clear();
        info!("session shut down");
    }

    /// Judgment stream for the scoring/UI collaborator: one event per
    /// resolved/missed note, two for long notes.
    pub fn drain_events(&mut self) -> Vec<JudgmentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Scheduled tasks that fired since the last drain.
    pub fn drain_fired_tasks(&mut self) -> Vec<TaskId> {
        std::mem::take(&mut self.fired_tasks)
    }

    /// Schedule a one-shot task against the audio clock.
    pub fn schedule_at(&mut self, at_secs: f64) -> TaskId {
        self.timer.schedule_at(at_secs)
    }

    /// Schedule a repeating task (e.g. a metronome at the beat interval).
    pub fn schedule_repeating(&mut self, at_secs: f64, interval_secs: f64) -> TaskId {
        self.timer.schedule_repeating(at_secs, interval_secs)
    }

    pub fn cancel_task(&mut self, id: TaskId) -> bool {
        self.timer.cancel(id)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_complete(&self) -> bool {
        self.field.is_complete()
    }

    pub fn clock(&self) -> &AudioClock<C> {
        &self.clock
    }

    pub fn field(&self) -> &NoteField {
        &self.field
    }

    pub fn pool(&self) -> &ChannelPool<A> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ChannelPool<A> {
        &mut self.pool
    }
}

/// Guaranteed-release wrapper: shuts the session down on drop so channels
/// and note state never outlive the caller's scope.
pub struct SessionGuard<C: DeviceClock, A: AudioBackend> {
    session: Session<C, A>,
}

impl<C: DeviceClock, A: AudioBackend> SessionGuard<C, A> {
    pub fn new(mut session: Session<C, A>) -> Self {
        session.init();
        Self { session }
    }
}

impl<C: DeviceClock, A: AudioBackend> Deref for SessionGuard<C, A> {
    type Target = Session<C, A>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<C: DeviceClock, A: AudioBackend> DerefMut for SessionGuard<C, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl<C: DeviceClock, A: AudioBackend> Drop for SessionGuard<C, A> {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}
