//! Timing configuration

use crate::ease::{Ease, EaseKind};
use serde::{Deserialize, Serialize};

/// Timing for one scheduled record
///
/// `time` is the reference time on the queue clock; the record starts at
/// `time + delay` and runs for `duration` milliseconds.
#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub time: f64,
    pub delay: f64,
    pub duration: f64,
    pub ease: Ease,
}

impl TimingConfig {
    pub fn new(time: f64, delay: f64, duration: f64, ease: Ease) -> Self {
        Self {
            time,
            delay,
            duration,
            ease,
        }
    }

    /// Timing for a follow-on transition that starts exactly when this one ends
    pub fn following(&self) -> Self {
        Self {
            time: self.end_time(),
            delay: 0.0,
            duration: self.duration,
            ease: self.ease.clone(),
        }
    }

    pub fn start_time(&self) -> f64 {
        self.time + self.delay
    }

    pub fn end_time(&self) -> f64 {
        self.time + self.delay + self.duration
    }
}

/// Defaults applied by [`Transitions::transition`](crate::Transitions::transition)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDefaults {
    /// Delay before starting (ms)
    pub delay_ms: f64,
    /// Running time (ms)
    pub duration_ms: f64,
    /// Easing curve
    pub ease: EaseKind,
}

impl Default for TransitionDefaults {
    fn default() -> Self {
        Self::standard()
    }
}

impl TransitionDefaults {
    /// No delay, 250 ms, cubic in-out
    pub fn standard() -> Self {
        Self {
            delay_ms: 0.0,
            duration_ms: 250.0,
            ease: EaseKind::CubicInOut,
        }
    }

    /// Zero-length transitions that jump straight to their end state
    pub fn instant() -> Self {
        Self {
            delay_ms: 0.0,
            duration_ms: 0.0,
            ease: EaseKind::Linear,
        }
    }

    pub fn with_delay(mut self, ms: f64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn with_duration(mut self, ms: f64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn with_ease(mut self, ease: EaseKind) -> Self {
        self.ease = ease;
        self
    }

    /// Timing for a record created at `time`
    pub fn timing_at(&self, time: f64) -> TimingConfig {
        TimingConfig::new(time, self.delay_ms, self.duration_ms, self.ease.into())
    }
}
