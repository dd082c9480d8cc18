use anyhow::Result;

/// Handle for referencing a loaded keysound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySoundId(pub u32);

/// Handle for a single playback instance started on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

/// Abstraction over audio backends.
/// Implementations: KiraDriver (kira), MockBackend (testing).
///
/// `start` is the only fallible operation; everything the channel pool
/// calls per tick (`is_finished`, `stop`) must not fail.
pub trait AudioBackend {
    /// Whether a sound resource is loaded for the given id.
    fn has_sound(&self, sound: KeySoundId) -> bool;

    /// Start playback of a loaded sound with the given volume (0.0..=1.0
    /// amplitude) and pitch (playback rate factor, 1.0 = unshifted).
    fn start(&mut self, sound: KeySoundId, volume: f64, pitch: f64) -> Result<ChannelId>;

    /// Whether the playback instance has finished (or was stopped).
    /// Unknown channel ids are reported as finished.
    fn is_finished(&self, channel: ChannelId) -> bool;

    /// Force-stop a playback instance. Stopping an unknown or already
    /// finished channel is a no-op.
    fn stop(&mut self, channel: ChannelId);
}
