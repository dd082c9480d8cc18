//! Production audio backend backed by kira for low-latency playback.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use kira::backend::DefaultBackend;
use kira::sound::PlaybackState;
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::{AudioManager, AudioManagerSettings, Decibels, Tween};
use tracing::info;

use crate::traits::audio::{AudioBackend, ChannelId, KeySoundId};

/// Convert an amplitude factor (0.0..=1.0) to kira's decibel scale.
fn amplitude_to_db(volume: f64) -> Decibels {
    if volume <= 0.0 {
        Decibels::SILENCE
    } else {
        Decibels(20.0 * (volume as f32).log10())
    }
}

pub struct KiraDriver {
    manager: AudioManager,
    /// Loaded sound data keyed by keysound id.
    sounds: HashMap<KeySoundId, StaticSoundData>,
    /// Outstanding playback handles keyed by channel id.
    handles: HashMap<u64, StaticSoundHandle>,
    next_channel: u64,
}

impl KiraDriver {
    pub fn new() -> Result<Self> {
        let manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .map_err(|e| anyhow!("Failed to create audio manager: {e}"))?;
        Ok(Self {
            manager,
            sounds: HashMap::new(),
            handles: HashMap::new(),
            next_channel: 1,
        })
    }

    /// Load one keysound from a file.
    pub fn load_keysound<P: AsRef<Path>>(&mut self, id: KeySoundId, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = StaticSoundData::from_file(path)
            .with_context(|| format!("Failed to load sound: {}", path.display()))?;
        self.sounds.insert(id, data);
        Ok(())
    }

    /// Load keysounds from a map of id to filename relative to
    /// `base_path`. Files that are missing or fail to decode are skipped;
    /// a lowercase filename is tried as a fallback. Returns how many
    /// loaded.
    pub fn load_keysounds<P: AsRef<Path>>(
        &mut self,
        base_path: P,
        files: &HashMap<KeySoundId, String>,
    ) -> usize {
        let base_path = base_path.as_ref();
        let mut loaded = 0;

        for (&id, filename) in files {
            let mut file_path = base_path.join(filename);
            if !file_path.exists() {
                file_path = base_path.join(filename.to_lowercase());
                if !file_path.exists() {
                    continue;
                }
            }
            if self.load_keysound(id, &file_path).is_ok() {
                loaded += 1;
            }
        }

        info!(loaded, requested = files.len(), "keysounds loaded");
        loaded
    }

    /// Number of loaded keysounds.
    pub fn keysound_count(&self) -> usize {
        self.sounds.len()
    }

    fn alloc_channel(&mut self) -> u64 {
        let id = self.next_channel;
        self.next_channel += 1;
        id
    }
}

impl AudioBackend for KiraDriver {
    fn has_sound(&self, sound: KeySoundId) -> bool {
        self.sounds.contains_key(&sound)
    }

    fn start(&mut self, sound: KeySoundId, volume: f64, pitch: f64) -> Result<ChannelId> {
        // Drop handles whose playback already ended so the map stays
        // bounded by actual concurrency.
        self.handles
            .retain(|_, h| h.state() != PlaybackState::Stopped);

        let data = self
            .sounds
            .get(&sound)
            .ok_or_else(|| anyhow!("Sound not loaded: {:?}", sound))?
            .clone()
            .volume(amplitude_to_db(volume))
            .playback_rate(pitch);
        let handle = self
            .manager
            .play(data)
            .map_err(|e| anyhow!("Failed to play sound: {e}"))?;
        let id = self.alloc_channel();
        self.handles.insert(id, handle);
        Ok(ChannelId(id))
    }

    fn is_finished(&self, channel: ChannelId) -> bool {
        self.handles
            .get(&channel.0)
            .is_none_or(|h| h.state() == PlaybackState::Stopped)
    }

    fn stop(&mut self, channel: ChannelId) {
        if let Some(mut handle) = self.handles.remove(&channel.0) {
            handle.stop(Tween::default());
        }
    }
}
