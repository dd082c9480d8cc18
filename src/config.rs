//! Session configuration: judgment mode tables, feedback bounds, audio
//! settings. All of it is data; every table is validated before a
//! session starts and nothing is rejected after load.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioConfig;
use crate::judge::{FeedbackBounds, JudgmentEngine, JudgmentMode, ToleranceError, ToleranceTable};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tolerance table for {mode:?}: {source}")]
    Tolerance {
        mode: JudgmentMode,
        #[source]
        source: ToleranceError,
    },

    #[error("invalid release tolerance table: {0}")]
    ReleaseTolerance(#[source] ToleranceError),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One tolerance table per judgment mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTables {
    pub normal: ToleranceTable,
    pub hard: ToleranceTable,
    #[serde(rename = "super")]
    pub superhard: ToleranceTable,
}

impl ModeTables {
    pub fn table_for(&self, mode: JudgmentMode) -> &ToleranceTable {
        match mode {
            JudgmentMode::Normal => &self.normal,
            JudgmentMode::Hard => &self.hard,
            JudgmentMode::Super => &self.superhard,
        }
    }
}

impl Default for ModeTables {
    fn default() -> Self {
        Self {
            normal: ToleranceTable::normal(),
            hard: ToleranceTable::hard(),
            superhard: ToleranceTable::superhard(),
        }
    }
}

/// Everything a session needs besides the chart itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Active judgment mode.
    pub mode: JudgmentMode,
    pub tables: ModeTables,
    /// Windows for long-note release endpoints; the active mode's press
    /// table is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_table: Option<ToleranceTable>,
    pub feedback: FeedbackBounds,
    pub audio: AudioConfig,
    /// How many seconds before its timing a note becomes visible.
    pub spawn_lead_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: JudgmentMode::Normal,
            tables: ModeTables::default(),
            release_table: None,
            feedback: FeedbackBounds::default(),
            audio: AudioConfig::default(),
            spawn_lead_secs: 2.0,
        }
    }
}

impl EngineConfig {
    /// Reject malformed configuration before a session starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for mode in [JudgmentMode::Normal, JudgmentMode::Hard, JudgmentMode::Super] {
            self.tables
                .table_for(mode)
                .validate()
                .map_err(|source| ConfigError::Tolerance { mode, source })?;
        }
        if let Some(release) = &self.release_table {
            release.validate().map_err(ConfigError::ReleaseTolerance)?;
        }
        if self.spawn_lead_secs <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "spawn_lead_secs",
                value: self.spawn_lead_secs,
            });
        }
        if self.audio.channel_capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "audio.channel_capacity",
                value: 0.0,
            });
        }
        if !(0.0..=1.0).contains(&self.audio.keysound_volume) {
            return Err(ConfigError::OutOfRange {
                field: "audio.keysound_volume",
                min: 0.0,
                max: 1.0,
                value: self.audio.keysound_volume,
            });
        }
        Ok(())
    }

    /// Build the judgment engine for the active mode.
    pub fn judgment_engine(&self) -> JudgmentEngine {
        let engine =
            JudgmentEngine::with_table(self.mode, self.tables.table_for(self.mode).clone());
        match &self.release_table {
            Some(release) => engine.with_release_table(release.clone()),
            None => engine,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
