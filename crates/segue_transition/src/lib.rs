//! Segue Transitions
//!
//! Per-target transition scheduling on top of [`segue_timer`].
//!
//! # Features
//!
//! - **Schedule Registry**: per-target records keyed by transition id
//! - **Conflict Resolution**: a starting transition interrupts running
//!   same-name siblings and cancels older pending ones
//! - **Tweens**: named factories bound once per target at start, then fed the
//!   eased progress on every frame
//! - **Lifecycle Events**: `start`, `interrupt` and `end`, with namespaced
//!   listeners (`end.cleanup`)
//! - **Group Builder**: [`Transition`] configures one id across many targets
//!   and chains follow-ups with [`Transition::transition`]
//!
//! # Example
//!
//! ```
//! use segue_timer::{ManualClock, TimerQueue};
//! use segue_transition::{Ease, Transitions, Tween};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let clock = ManualClock::new();
//! let transitions: Transitions<&str> = Transitions::new(TimerQueue::with_clock(clock.clone()));
//!
//! let opacity = Rc::new(Cell::new(0.0));
//! let sink = Rc::clone(&opacity);
//! let fade = transitions.transition(["panel"], Some("fade"));
//! fade.duration(100.0)?
//!     .ease(Ease::linear())?
//!     .tween("opacity", move |_target, _index, _group| {
//!         let sink = Rc::clone(&sink);
//!         Some(Box::new(move |t: f64| sink.set(t)) as Tween)
//!     })?;
//!
//! transitions.queue().wake();
//! clock.set(50.0);
//! transitions.queue().wake();
//! assert_eq!(opacity.get(), 0.5);
//!
//! clock.set(100.0);
//! transitions.queue().wake();
//! assert_eq!(opacity.get(), 1.0);
//! assert!(!transitions.has_transitions(&"panel"));
//! # Ok::<(), segue_transition::TransitionError>(())
//! ```

pub mod config;
pub mod ease;
pub mod error;
pub mod events;
mod lifecycle;
pub mod record;
pub mod scheduler;
pub mod state;
pub mod transition;
pub mod tween;

pub use config::{TimingConfig, TransitionDefaults};
pub use ease::{Ease, EaseKind};
pub use error::{Result, TransitionError};
pub use events::{EventContext, EventType, Listener, Listeners};
pub use record::{Group, ScheduleRecord, Target};
pub use scheduler::Transitions;
pub use state::{TransitionId, TransitionState};
pub use transition::Transition;
pub use tween::{ActiveTweens, Tween, TweenFactory, TweenList};
