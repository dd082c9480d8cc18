//! Tiered judgment: maps a signed timing error to a discrete accuracy
//! grade using mode-dependent tolerance windows.

mod feedback;

pub use feedback::{FeedbackBounds, Modulation, modulate};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timing direction for FAST/SLOW display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingDirection {
    Fast,
    Exact,
    Slow,
}

impl TimingDirection {
    const EXACT_THRESHOLD_MS: f64 = 1.0;

    pub fn from_error(error_ms: f64) -> Self {
        if error_ms < -Self::EXACT_THRESHOLD_MS {
            TimingDirection::Fast
        } else if error_ms > Self::EXACT_THRESHOLD_MS {
            TimingDirection::Slow
        } else {
            TimingDirection::Exact
        }
    }
}

/// Judgment mode (affects timing window size and which tiers exist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JudgmentMode {
    #[default]
    Normal,
    Hard,
    Super,
}

/// Discrete accuracy grade, ordered worst to best so that `Ord` reads
/// naturally: `Perfect > Great`, `max` picks the better tier.
/// Used for comparison and reporting only, never arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JudgmentTier {
    Miss,
    Bad,
    Good,
    Great,
    Perfect,
    SPerfect,
}

impl JudgmentTier {
    /// The worse of two tiers (long-note final policy).
    pub fn worse(self, other: Self) -> Self {
        self.min(other)
    }

    pub fn is_miss(self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// Malformed tolerance table, rejected at load time.
#[derive(Debug, Error, PartialEq)]
pub enum ToleranceError {
    #[error("tolerance boundary for {tier:?} is not positive: {value}")]
    NonPositive { tier: JudgmentTier, value: f64 },

    #[error("tolerance boundaries not strictly ascending: {outer:?} ({outer_ms}) <= {inner:?} ({inner_ms})")]
    NotAscending {
        inner: JudgmentTier,
        inner_ms: f64,
        outer: JudgmentTier,
        outer_ms: f64,
    },
}

/// Ordered tier boundaries in milliseconds, inclusive upper bounds.
///
/// `s_perfect` is absent for Normal (the tier is unreachable there);
/// `bad` is absent for Super (anything beyond `good` is immediately Miss).
/// Tables are configuration data; the presets below are representative
/// defaults derived from 60 fps frame multiples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_perfect: Option<f64>,
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad: Option<f64>,
}

impl ToleranceTable {
    /// Default Normal windows. No S-Perfect tier.
    pub fn normal() -> Self {
        Self {
            s_perfect: None,
            perfect: 41.66,
            great: 83.33,
            good: 108.33,
            bad: Some(133.33),
        }
    }

    /// Default Hard windows.
    pub fn hard() -> Self {
        Self {
            s_perfect: Some(16.67),
            perfect: 33.33,
            great: 62.49,
            good: 83.33,
            bad: Some(104.16),
        }
    }

    /// Default Super windows. No Bad tier: beyond Good is Miss.
    pub fn superhard() -> Self {
        Self {
            s_perfect: Some(8.33),
            perfect: 20.83,
            great: 41.66,
            good: 62.49,
            bad: None,
        }
    }

    /// Default table for a mode.
    pub fn for_mode(mode: JudgmentMode) -> Self {
        match mode {
            JudgmentMode::Normal => Self::normal(),
            JudgmentMode::Hard => Self::hard(),
            JudgmentMode::Super => Self::superhard(),
        }
    }

    /// Walk the table tightest to loosest and return the first tier whose
    /// boundary is `>= |error_ms|`. Boundaries are inclusive: an error
    /// exactly on a boundary belongs to that tier, not the next worse one.
    pub fn judge(&self, error_ms: f64) -> JudgmentTier {
        let abs_error = error_ms.abs();
        if let Some(sp) = self.s_perfect
            && abs_error <= sp
        {
            return JudgmentTier::SPerfect;
        }
        if abs_error <= self.perfect {
            JudgmentTier::Perfect
        } else if abs_error <= self.great {
            JudgmentTier::Great
        } else if abs_error <= self.good {
            JudgmentTier::Good
        } else if self.bad.is_some_and(|bad| abs_error <= bad) {
            JudgmentTier::Bad
        } else {
            JudgmentTier::Miss
        }
    }

    /// Loosest boundary present; beyond this an input can no longer hit
    /// the note and an un-input note becomes a Miss.
    pub fn max_window(&self) -> f64 {
        self.bad.unwrap_or(self.good)
    }

    /// Boundary below which timing feedback applies no volume attenuation.
    pub fn attenuation_threshold(&self) -> f64 {
        self.great
    }

    /// Reject malformed tables before a session starts: every present
    /// boundary positive, and strictly ascending from tightest to loosest.
    pub fn validate(&self) -> Result<(), ToleranceError> {
        let mut chain: Vec<(JudgmentTier, f64)> = Vec::with_capacity(5);
        if let Some(sp) = self.s_perfect {
            chain.push((JudgmentTier::SPerfect, sp));
        }
        chain.push((JudgmentTier::Perfect, self.perfect));
        chain.push((JudgmentTier::Great, self.great));
        chain.push((JudgmentTier::Good, self.good));
        if let Some(bad) = self.bad {
            chain.push((JudgmentTier::Bad, bad));
        }

        for &(tier, value) in &chain {
            if value <= 0.0 {
                return Err(ToleranceError::NonPositive { tier, value });
            }
        }
        for pair in chain.windows(2) {
            let (inner, inner_ms) = pair[0];
            let (outer, outer_ms) = pair[1];
            if outer_ms <= inner_ms {
                return Err(ToleranceError::NotAscending {
                    inner,
                    inner_ms,
                    outer,
                    outer_ms,
                });
            }
        }
        Ok(())
    }
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self::normal()
    }
}

/// Judgment calculator for one play session: a mode plus its press table
/// and the table used for long-note release endpoints.
///
/// Pure: `judge`/`judge_release` have no side effects and no hidden state.
#[derive(Debug, Clone)]
pub struct JudgmentEngine {
    mode: JudgmentMode,
    table: ToleranceTable,
    release_table: ToleranceTable,
}

impl JudgmentEngine {
    /// Engine with the default preset for a mode. Release endpoints use
    /// the same table unless overridden with [`with_release_table`].
    ///
    /// [`with_release_table`]: Self::with_release_table
    pub fn new(mode: JudgmentMode) -> Self {
        let table = ToleranceTable::for_mode(mode);
        Self {
            mode,
            release_table: table.clone(),
            table,
        }
    }

    /// Engine with a caller-supplied table (configuration data).
    pub fn with_table(mode: JudgmentMode, table: ToleranceTable) -> Self {
        Self {
            mode,
            release_table: table.clone(),
            table,
        }
    }

    /// Override the long-note release windows (typically wider).
    pub fn with_release_table(mut self, table: ToleranceTable) -> Self {
        self.release_table = table;
        self
    }

    pub fn mode(&self) -> JudgmentMode {
        self.mode
    }

    pub fn table(&self) -> &ToleranceTable {
        &self.table
    }

    /// Judge a press against the note's head timing.
    pub fn judge(&self, error_ms: f64) -> JudgmentTier {
        self.table.judge(error_ms)
    }

    /// Judge a release against a long note's tail timing.
    pub fn judge_release(&self, error_ms: f64) -> JudgmentTier {
        self.release_table.judge(error_ms)
    }

    /// Loosest press window in ms.
    pub fn max_window(&self) -> f64 {
        self.table.max_window()
    }

    /// Loosest release window in ms.
    pub fn release_max_window(&self) -> f64 {
        self.release_table.max_window()
    }

    /// Whether a note timed at `note_secs` can no longer be hit at `now`.
    pub fn is_missed(&self, note_secs: f64, now_secs: f64) -> bool {
        (now_secs - note_secs) * 1000.0 > self.max_window()
    }

    /// Whether a held note's tail at `end_secs` has timed out at `now`.
    pub fn is_release_missed(&self, end_secs: f64, now_secs: f64) -> bool {
        (now_secs - end_secs) * 1000.0 > self.release_max_window()
    }
}

impl Default for JudgmentEngine {
    fn default() -> Self {
        Self::new(JudgmentMode::Normal)
    }
}
