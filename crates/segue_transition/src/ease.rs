//! Easing functions
//!
//! An [`Ease`] maps normalized elapsed time in `[0, 1]` to a progress
//! fraction handed to every tween. Only a handful of polynomial curves are
//! built in; anything else can be supplied as a closure.

use crate::error::{Result, TransitionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// A shared easing curve
#[derive(Clone)]
pub struct Ease(Rc<dyn Fn(f64) -> f64>);

impl Ease {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn linear() -> Self {
        Self::new(|t| t)
    }

    pub fn quad_in() -> Self {
        Self::new(|t| t * t)
    }

    pub fn quad_out() -> Self {
        Self::new(|t| t * (2.0 - t))
    }

    pub fn quad_in_out() -> Self {
        Self::new(|t| {
            let t = t * 2.0;
            if t <= 1.0 {
                t * t / 2.0
            } else {
                let t = t - 1.0;
                (t * (2.0 - t) + 1.0) / 2.0
            }
        })
    }

    pub fn cubic_in() -> Self {
        Self::new(|t| t * t * t)
    }

    pub fn cubic_out() -> Self {
        Self::new(|t| {
            let t = t - 1.0;
            t * t * t + 1.0
        })
    }

    pub fn cubic_in_out() -> Self {
        Self::new(|t| {
            let t = t * 2.0;
            if t <= 1.0 {
                t * t * t / 2.0
            } else {
                let t = t - 2.0;
                (t * t * t + 2.0) / 2.0
            }
        })
    }

    pub fn apply(&self, t: f64) -> f64 {
        (self.0)(t)
    }

    /// Reject curves that do not produce finite values at both ends
    pub fn validate(&self) -> Result<()> {
        let (start, end) = (self.apply(0.0), self.apply(1.0));
        if start.is_finite() && end.is_finite() {
            Ok(())
        } else {
            Err(TransitionError::InvalidCallback(format!(
                "ease maps [0, 1] to [{}, {}]",
                start, end
            )))
        }
    }

    pub fn ptr_eq(&self, other: &Ease) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Ease {
    fn default() -> Self {
        EaseKind::default().into()
    }
}

impl fmt::Debug for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ease").field(&"<fn>").finish()
    }
}

/// Built-in curves, nameable from configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EaseKind {
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    #[default]
    CubicInOut,
}

impl From<EaseKind> for Ease {
    fn from(kind: EaseKind) -> Self {
        match kind {
            EaseKind::Linear => Ease::linear(),
            EaseKind::QuadIn => Ease::quad_in(),
            EaseKind::QuadOut => Ease::quad_out(),
            EaseKind::QuadInOut => Ease::quad_in_out(),
            EaseKind::CubicIn => Ease::cubic_in(),
            EaseKind::CubicOut => Ease::cubic_out(),
            EaseKind::CubicInOut => Ease::cubic_in_out(),
        }
    }
}
