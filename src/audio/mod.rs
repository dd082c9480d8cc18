//! Audio subsystem using kira.
//!
//! This module provides:
//! - [`ChannelPool`]: bounded concurrent playback with batched reclamation
//! - [`KiraDriver`]: production [`AudioBackend`] backed by kira
//! - [`AudioConfig`]: configuration for the audio subsystem
//!
//! [`AudioBackend`]: crate::traits::audio::AudioBackend

mod backend;
mod channel_pool;
mod config;

pub use backend::KiraDriver;
pub use channel_pool::{ChannelPool, PlayOutcome};
pub use config::AudioConfig;
