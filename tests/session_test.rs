//! End-to-end tests driving a session tick loop with a mock device
//! clock and a scripted audio backend.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use anyhow::Result;
use rhythm_core::config::EngineConfig;
use rhythm_core::judge::{JudgmentMode, JudgmentTier};
use rhythm_core::note::{NoteDescriptor, NoteEndpoint};
use rhythm_core::session::{InputEvent, InputKind, Session, SessionError, SessionGuard};
use rhythm_core::traits::audio::{AudioBackend, ChannelId, KeySoundId};
use rhythm_core::traits::time::MockDeviceClock;

/// One playback the mock backend observed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Played {
    sound: KeySoundId,
    volume: f64,
    pitch: f64,
}

#[derive(Default)]
struct BackendState {
    loaded: HashSet<KeySoundId>,
    played: Vec<Played>,
    live: HashSet<u64>,
    stopped: Vec<u64>,
    next_id: u64,
}

/// Mock backend whose state the test can keep a handle to after the
/// session takes ownership.
#[derive(Clone, Default)]
struct MockBackend {
    state: Rc<RefCell<BackendState>>,
}

impl MockBackend {
    fn with_sounds(ids: &[u32]) -> Self {
        let backend = Self::default();
        backend.state.borrow_mut().loaded = ids.iter().map(|&id| KeySoundId(id)).collect();
        backend.state.borrow_mut().next_id = 1;
        backend
    }

    fn played(&self) -> Vec<Played> {
        self.state.borrow().played.clone()
    }

    fn stopped_count(&self) -> usize {
        self.state.borrow().stopped.len()
    }

    fn finish_all(&self) {
        self.state.borrow_mut().live.clear();
    }
}

impl AudioBackend for MockBackend {
    fn has_sound(&self, sound: KeySoundId) -> bool {
        self.state.borrow().loaded.contains(&sound)
    }

    fn start(&mut self, sound: KeySoundId, volume: f64, pitch: f64) -> Result<ChannelId> {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(id);
        state.played.push(Played {
            sound,
            volume,
            pitch,
        });
        Ok(ChannelId(id))
    }

    fn is_finished(&self, channel: ChannelId) -> bool {
        !self.state.borrow().live.contains(&channel.0)
    }

    fn stop(&mut self, channel: ChannelId) {
        let mut state = self.state.borrow_mut();
        state.live.remove(&channel.0);
        state.stopped.push(channel.0);
    }
}

fn session(
    config: EngineConfig,
    notes: Vec<NoteDescriptor>,
) -> (Session<MockDeviceClock, MockBackend>, MockDeviceClock, MockBackend) {
    let device = MockDeviceClock::new();
    let backend = MockBackend::with_sounds(&[1, 2, 3, 4, 5]);
    let session = Session::new(&config, notes, 8, device.clone(), backend.clone()).unwrap();
    (session, device, backend)
}

fn press(track: usize, time_secs: f64) -> InputEvent {
    InputEvent {
        track,
        kind: InputKind::Press,
        time_secs,
    }
}

fn release(track: usize, time_secs: f64) -> InputEvent {
    InputEvent {
        track,
        kind: InputKind::Release,
        time_secs,
    }
}

/// Long note held from press to release: press at +20 ms is Perfect and
/// opens the hold, release at +90 ms judges Good on the Normal table,
/// and both endpoints reach the scoring stream.
#[test]
fn long_note_press_and_release_judged_at_both_endpoints() {
    let notes = vec![NoteDescriptor::long(1, 1.0, 4.0, KeySoundId(3))];
    let (mut s, device, _backend) = session(EngineConfig::default(), notes);
    s.init();

    device.set_position(1.02);
    s.push_input(press(1, 1.02));
    s.tick();
    let events = s.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].endpoint, NoteEndpoint::Press);
    assert_eq!(events[0].tier, JudgmentTier::Perfect);
    assert!((events[0].error_ms - 20.0).abs() < 1e-6);

    device.set_position(4.09);
    s.push_input(release(1, 4.09));
    s.tick();
    let events = s.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].endpoint, NoteEndpoint::Release);
    assert_eq!(events[0].tier, JudgmentTier::Good);
    assert!((events[0].error_ms - 90.0).abs() < 1e-6);

    assert!(s.is_complete());
}

/// Keysound modulation: an accurate hit plays clean, a sloppy release is
/// detuned and attenuated.
#[test]
fn keysound_modulation_follows_timing_error() {
    let notes = vec![NoteDescriptor::long(1, 1.0, 4.0, KeySoundId(3))];
    let (mut s, device, backend) = session(EngineConfig::default(), notes);
    s.init();

    device.set_position(1.02);
    s.push_input(press(1, 1.02));
    s.tick();
    device.set_position(4.09);
    s.push_input(release(1, 4.09));
    s.tick();

    let played = backend.played();
    assert_eq!(played.len(), 2);

    // +20 ms press: slightly sharp, no attenuation (inside Great).
    assert!((played[0].pitch - 1.04).abs() < 1e-9);
    assert!((played[0].volume - 1.0).abs() < 1e-9);

    // +90 ms release: pitch clamps at +0.12, volume attenuated by
    // clamp(90/100 * 0.5) = 0.45.
    assert!((played[1].pitch - 1.12).abs() < 1e-9);
    assert!((played[1].volume - 0.55).abs() < 1e-9);
}

/// Five simultaneous keysounds against four channels: exactly four play
/// and the fifth is rejected without disturbing judgment.
#[test]
fn channel_pool_rejects_beyond_capacity() {
    let mut config = EngineConfig::default();
    config.audio.channel_capacity = 4;
    let notes = (0..5)
        .map(|track| NoteDescriptor::tap(track, 1.0, KeySoundId(track as u32 + 1)))
        .collect();
    let (mut s, device, backend) = session(config, notes);
    s.init();

    device.set_position(1.0);
    for track in 0..5 {
        s.push_input(press(track, 1.0));
    }
    s.tick();

    assert_eq!(backend.played().len(), 4);
    assert_eq!(s.pool().live_count(), 4);
    // All five notes were still judged.
    assert_eq!(s.drain_events().len(), 5);
}

/// Freed capacity is reusable once playback finishes and the batched
/// sweep runs.
#[test]
fn pool_capacity_recovers_after_reclamation() {
    let mut config = EngineConfig::default();
    config.audio.channel_capacity = 2;
    config.audio.reclaim_interval_ticks = 1;
    let notes = vec![
        NoteDescriptor::tap(0, 1.0, KeySoundId(1)),
        NoteDescriptor::tap(1, 1.0, KeySoundId(2)),
        NoteDescriptor::tap(2, 1.1, KeySoundId(3)),
    ];
    let (mut s, device, backend) = session(config, notes);
    s.init();

    device.set_position(1.0);
    s.push_input(press(0, 1.0));
    s.push_input(press(1, 1.0));
    s.tick();
    assert_eq!(s.pool().live_count(), 2);

    // Playback finishes; the next tick's sweep reclaims both channels.
    backend.finish_all();
    device.set_position(1.05);
    s.tick();
    assert_eq!(s.pool().live_count(), 0);

    device.set_position(1.1);
    s.push_input(press(2, 1.1));
    s.tick();
    assert_eq!(backend.played().len(), 3);
}

/// A press timestamped inside the judgment window is honored even when
/// the tick that processes it lands past the window.
#[test]
fn late_tick_still_honors_in_window_press() {
    let notes = vec![NoteDescriptor::tap(0, 1.0, KeySoundId(1))];
    let (mut s, device, backend) = session(EngineConfig::default(), notes);
    s.init();
    s.tick(); // spawns

    // 120 ms late is inside Normal's Bad window (133.33); the tick runs
    // at 1.20, past the window.
    device.set_position(1.2);
    s.push_input(press(0, 1.12));
    s.tick();

    let events = s.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tier, JudgmentTier::Bad);
    assert_eq!(backend.played().len(), 1);
}

/// Same for a held long note: a release queued inside the tail window is
/// judged, not force-missed, when the tick lands past the window.
#[test]
fn late_tick_still_honors_in_window_release() {
    let notes = vec![NoteDescriptor::long(1, 1.0, 4.0, KeySoundId(3))];
    let (mut s, device, _backend) = session(EngineConfig::default(), notes);
    s.init();

    device.set_position(1.0);
    s.push_input(press(1, 1.0));
    s.tick();
    s.drain_events();

    device.set_position(4.2);
    s.push_input(release(1, 4.12));
    s.tick();

    let events = s.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].endpoint, NoteEndpoint::Release);
    assert_eq!(events[0].tier, JudgmentTier::Bad);
}

/// A note with no input times out to a Miss and produces no audio.
#[test]
fn missed_note_emits_miss_without_playback() {
    let notes = vec![NoteDescriptor::tap(0, 1.0, KeySoundId(1))];
    let (mut s, device, backend) = session(EngineConfig::default(), notes);
    s.init();

    s.tick(); // spawns the note
    device.set_position(2.0);
    s.tick(); // window long gone: times out

    let events = s.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tier, JudgmentTier::Miss);
    assert!(backend.played().is_empty());
    assert!(s.is_complete());
}

/// A keysound with no loaded resource is skipped; the judgment still
/// stands.
#[test]
fn missing_keysound_does_not_affect_judgment() {
    let notes = vec![NoteDescriptor::tap(0, 1.0, KeySoundId(99))];
    let (mut s, device, backend) = session(EngineConfig::default(), notes);
    s.init();

    device.set_position(1.0);
    s.push_input(press(0, 1.0));
    s.tick();

    assert!(backend.played().is_empty());
    let events = s.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tier, JudgmentTier::Perfect);
}

/// Stopping a session force-stops every live channel and destroys every
/// live note; the guard does it on drop.
#[test]
fn guard_drop_tears_down_channels_and_notes() {
    let notes = vec![
        NoteDescriptor::tap(0, 1.0, KeySoundId(1)),
        NoteDescriptor::tap(1, 50.0, KeySoundId(2)),
    ];
    let (s, device, backend) = session(EngineConfig::default(), notes);
    {
        let mut guard = SessionGuard::new(s);
        device.set_position(1.0);
        guard.push_input(press(0, 1.0));
        guard.tick();
        assert_eq!(guard.pool().live_count(), 1);
    }
    assert_eq!(backend.stopped_count(), 1);
}

/// With the device clock unavailable the session degrades but keeps
/// running.
#[test]
fn degraded_clock_session_continues() {
    let notes = vec![NoteDescriptor::tap(0, 1.0, KeySoundId(1))];
    let (mut s, device, _backend) = session(EngineConfig::default(), notes);
    device.set_available(false);
    s.init();

    assert!(s.clock().is_degraded());
    s.tick();
    assert!(s.is_running());
}

/// A repeating scheduled task fires once per elapsed interval, judged
/// against the audio clock rather than wall time.
#[test]
fn metronome_task_fires_on_the_beat() {
    let notes = vec![NoteDescriptor::tap(0, 10.0, KeySoundId(1))];
    let (mut s, device, _backend) = session(EngineConfig::default(), notes);
    s.init();
    let beat = s.schedule_repeating(0.5, 0.5);

    device.set_position(1.6);
    s.tick();
    let fired = s.drain_fired_tasks();
    assert_eq!(fired, vec![beat, beat, beat]); // 0.5, 1.0, 1.5
}

/// Chart defects are rejected when the session is built, not during
/// play.
#[test]
fn inverted_long_note_rejected_at_load() {
    let notes = vec![NoteDescriptor::long(0, 4.0, 1.0, KeySoundId(1))];
    let result = Session::new(
        &EngineConfig::default(),
        notes,
        8,
        MockDeviceClock::new(),
        MockBackend::default(),
    );
    assert!(matches!(result, Err(SessionError::Chart(_))));
}

/// Config defects are likewise load-time failures.
#[test]
fn malformed_tolerance_table_rejected_at_load() {
    let mut config = EngineConfig::default();
    config.tables.normal.perfect = -5.0;
    let result = Session::new(
        &config,
        vec![],
        8,
        MockDeviceClock::new(),
        MockBackend::default(),
    );
    assert!(matches!(result, Err(SessionError::Config(_))));
}

/// Super mode end to end: Super has no Bad tier, so a press 70 ms off is
/// outside every window. It hits nothing, and the untouched note times
/// out to a Miss in the same tick's sweep.
#[test]
fn super_mode_press_beyond_good_is_miss() {
    let config = EngineConfig {
        mode: JudgmentMode::Super,
        ..Default::default()
    };
    let notes = vec![NoteDescriptor::tap(0, 1.0, KeySoundId(1))];
    let (mut s, device, backend) = session(config, notes);
    s.init();

    device.set_position(1.07);
    s.push_input(press(0, 1.07));
    s.tick();

    let events = s.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tier, JudgmentTier::Miss);
    assert!(backend.played().is_empty());
    assert!(s.is_complete());
}
