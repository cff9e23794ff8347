//! Schedule records
//!
//! One [`ScheduleRecord`] exists per `(target, transition id)` pair. It owns
//! the timing, the easing curve, the tween factories and listeners, and the
//! timer that drives it through its lifecycle.

use crate::config::TimingConfig;
use crate::ease::Ease;
use crate::events::Listeners;
use crate::state::{TransitionId, TransitionState};
use crate::tween::{ActiveTweens, TweenList};
use segue_timer::Timer;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// Anything a transition can be scheduled on
///
/// Targets are compared by value, so a cheap handle type (an entity id, a
/// node key) is the usual choice.
pub trait Target: Clone + Eq + Hash + fmt::Debug + 'static {}

impl<T> Target for T where T: Clone + Eq + Hash + fmt::Debug + 'static {}

/// The targets that were scheduled together under one transition id
pub type Group<T> = Rc<[T]>;

/// Lifecycle record for one target under one transition id
pub struct ScheduleRecord<T: Target> {
    target: T,
    name: Option<Rc<str>>,
    id: TransitionId,
    index: usize,
    group: Group<T>,
    state: Cell<TransitionState>,
    /// Bumped on every state change; lets a step notice reentrant changes
    epoch: Cell<u64>,
    time: Cell<f64>,
    delay: Cell<f64>,
    duration: Cell<f64>,
    ease: RefCell<Ease>,
    tweens: RefCell<TweenList<T>>,
    listeners: RefCell<Listeners<T>>,
    active: RefCell<ActiveTweens>,
    pub(crate) timer: Timer,
}

impl<T: Target> ScheduleRecord<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        target: T,
        name: Option<Rc<str>>,
        id: TransitionId,
        index: usize,
        group: Group<T>,
        timing: TimingConfig,
        lists: (TweenList<T>, Listeners<T>),
        timer: Timer,
    ) -> Self {
        let (tweens, listeners) = lists;
        Self {
            target,
            name,
            id,
            index,
            group,
            state: Cell::new(TransitionState::Created),
            epoch: Cell::new(0),
            time: Cell::new(timing.time),
            delay: Cell::new(timing.delay),
            duration: Cell::new(timing.duration),
            ease: RefCell::new(timing.ease),
            tweens: RefCell::new(tweens),
            listeners: RefCell::new(listeners),
            active: RefCell::new(ActiveTweens::new()),
            timer,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn group(&self) -> &[T] {
        &self.group
    }

    pub fn state(&self) -> TransitionState {
        self.state.get()
    }

    pub fn time(&self) -> f64 {
        self.time.get()
    }

    pub fn delay(&self) -> f64 {
        self.delay.get()
    }

    pub fn duration(&self) -> f64 {
        self.duration.get()
    }

    pub fn ease(&self) -> Ease {
        self.ease.borrow().clone()
    }

    /// Snapshot of the current timing
    pub fn timing(&self) -> TimingConfig {
        TimingConfig::new(self.time(), self.delay(), self.duration(), self.ease())
    }

    pub fn tweens(&self) -> TweenList<T> {
        self.tweens.borrow().clone()
    }

    pub fn listeners(&self) -> Listeners<T> {
        self.listeners.borrow().clone()
    }

    pub(crate) fn set_state(&self, state: TransitionState) {
        self.state.set(state);
        self.epoch.set(self.epoch.get() + 1);
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub(crate) fn set_delay(&self, ms: f64) {
        self.delay.set(ms);
    }

    pub(crate) fn set_duration(&self, ms: f64) {
        self.duration.set(ms);
    }

    pub(crate) fn replace_ease(&self, ease: Ease) {
        let previous = self.ease.replace(ease);
        drop(previous);
    }

    pub(crate) fn replace_tweens(&self, tweens: TweenList<T>) {
        let previous = self.tweens.replace(tweens);
        drop(previous);
    }

    pub(crate) fn replace_listeners(&self, listeners: Listeners<T>) {
        let previous = self.listeners.replace(listeners);
        drop(previous);
    }

    /// Bind every tween factory for this target
    pub(crate) fn materialize(&self) {
        let bound = self
            .tweens()
            .materialize(&self.target, self.index, &self.group);
        let previous = self.active.replace(bound);
        drop(previous);
    }

    /// Feed the eased fraction to every bound tween
    ///
    /// A tween that ends its own record leaves the bound list released.
    pub(crate) fn run_tweens(&self, t: f64) {
        let mut active = self.active.take();
        for tween in active.iter_mut() {
            tween(t);
        }
        if self.state().is_ended() {
            drop(active);
            return;
        }
        let displaced = self.active.replace(active);
        drop(displaced);
    }

    /// Drop the bound tweens once the record is done with them
    pub(crate) fn release(&self) {
        let bound = self.active.take();
        drop(bound);
    }
}

impl<T: Target> fmt::Debug for ScheduleRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleRecord")
            .field("target", &self.target)
            .field("name", &self.name)
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("time", &self.time.get())
            .field("delay", &self.delay.get())
            .field("duration", &self.duration.get())
            .field("tweens", &*self.tweens.borrow())
            .field("listeners", &*self.listeners.borrow())
            .finish()
    }
}
