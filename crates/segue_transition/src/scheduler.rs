//! Schedule registry
//!
//! [`Transitions`] owns, per target, the map from transition id to
//! [`ScheduleRecord`]. A target's entry exists only while it has at least
//! one live record. Every record is driven by a timer on the shared
//! [`TimerQueue`]; the lifecycle steps live in the private `lifecycle` module.

use crate::config::{TimingConfig, TransitionDefaults};
use crate::ease::Ease;
use crate::error::{Result, TransitionError};
use crate::events::{Listener, Listeners};
use crate::lifecycle;
use crate::record::{Group, ScheduleRecord, Target};
use crate::state::{TransitionId, TransitionState};
use crate::transition::Transition;
use crate::tween::{TweenFactory, TweenList};
use rustc_hash::FxHashMap;
use segue_timer::TimerQueue;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Records for one target, ordered by id
type Schedules<T> = BTreeMap<TransitionId, Rc<ScheduleRecord<T>>>;

/// Snapshot of a target's records
pub(crate) type RecordSnapshot<T> = SmallVec<[Rc<ScheduleRecord<T>>; 4]>;

pub(crate) struct Inner<T: Target> {
    pub(crate) queue: TimerQueue,
    registry: RefCell<FxHashMap<T, Schedules<T>>>,
    next_id: Cell<u64>,
    defaults: RefCell<TransitionDefaults>,
}

impl<T: Target> Inner<T> {
    /// Records on `target` in ascending id order
    pub(crate) fn records(&self, target: &T) -> RecordSnapshot<T> {
        self.registry
            .borrow()
            .get(target)
            .map(|schedules| schedules.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn lookup(&self, target: &T, id: TransitionId) -> Option<Rc<ScheduleRecord<T>>> {
        self.registry
            .borrow()
            .get(target)
            .and_then(|schedules| schedules.get(&id))
            .cloned()
    }

    /// Drop `id` from `target`, and the target's entry once it is empty
    pub(crate) fn remove(&self, target: &T, id: TransitionId) {
        let removed = {
            let mut registry = self.registry.borrow_mut();
            let Some(schedules) = registry.get_mut(target) else {
                return;
            };
            let removed = schedules.remove(&id);
            if schedules.is_empty() {
                registry.remove(target);
            }
            removed
        };
        // Records own user closures; release them outside the borrow.
        drop(removed);
    }
}

/// Transition scheduler for targets of type `T`
///
/// Cloning yields another handle to the same registry.
pub struct Transitions<T: Target> {
    inner: Rc<Inner<T>>,
}

impl<T: Target> Clone for Transitions<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Target> Transitions<T> {
    pub fn new(queue: TimerQueue) -> Self {
        Self::with_defaults(queue, TransitionDefaults::default())
    }

    pub fn with_defaults(queue: TimerQueue, defaults: TransitionDefaults) -> Self {
        Self {
            inner: Rc::new(Inner {
                queue,
                registry: RefCell::new(FxHashMap::default()),
                next_id: Cell::new(0),
                defaults: RefCell::new(defaults),
            }),
        }
    }

    pub fn queue(&self) -> &TimerQueue {
        &self.inner.queue
    }

    pub fn defaults(&self) -> TransitionDefaults {
        self.inner.defaults.borrow().clone()
    }

    pub fn set_defaults(&self, defaults: TransitionDefaults) {
        *self.inner.defaults.borrow_mut() = defaults;
    }

    /// Allocate the next transition id; ids strictly increase
    pub fn new_id(&self) -> TransitionId {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        TransitionId::from_raw(id)
    }

    /// Register a record for `(target, id)` and arm it on the queue
    ///
    /// Returns `false` and changes nothing when the target already has a
    /// record with this id.
    pub fn schedule(
        &self,
        target: T,
        name: Option<&str>,
        id: TransitionId,
        index: usize,
        group: Group<T>,
        timing: TimingConfig,
    ) -> bool {
        self.schedule_named(
            target,
            name.map(Rc::from),
            id,
            index,
            group,
            timing,
            Default::default(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn schedule_named(
        &self,
        target: T,
        name: Option<Rc<str>>,
        id: TransitionId,
        index: usize,
        group: Group<T>,
        timing: TimingConfig,
        lists: (TweenList<T>, Listeners<T>),
    ) -> bool {
        let record = {
            let mut registry = self.inner.registry.borrow_mut();
            let schedules = registry.entry(target.clone()).or_default();
            if schedules.contains_key(&id) {
                return false;
            }
            let timer = self.inner.queue.create_timer();
            let record = Rc::new(ScheduleRecord::new(
                target, name, id, index, group, timing, lists, timer,
            ));
            schedules.insert(id, Rc::clone(&record));
            record
        };
        tracing::trace!(
            subject = ?record.target(),
            id = %id,
            name = record.name().unwrap_or(""),
            "transition scheduled"
        );
        lifecycle::arm(&self.inner, &record);
        true
    }

    /// The record for `(target, id)`
    pub fn get(&self, target: &T, id: TransitionId) -> Result<Rc<ScheduleRecord<T>>> {
        self.inner
            .lookup(target, id)
            .ok_or(TransitionError::NotFound { id })
    }

    /// The record, provided it has not been scheduled yet
    pub fn init_window(&self, target: &T, id: TransitionId) -> Result<Rc<ScheduleRecord<T>>> {
        self.window(target, id, TransitionState::Created)
    }

    /// The record, provided it has not started yet
    pub fn set_window(&self, target: &T, id: TransitionId) -> Result<Rc<ScheduleRecord<T>>> {
        self.window(target, id, TransitionState::Starting)
    }

    fn window(
        &self,
        target: &T,
        id: TransitionId,
        latest: TransitionState,
    ) -> Result<Rc<ScheduleRecord<T>>> {
        let record = self.get(target, id)?;
        let state = record.state();
        if state > latest {
            return Err(TransitionError::ConfigurationTooLate { id, state });
        }
        Ok(record)
    }

    /// The tween factory registered under `name`
    pub fn tween(
        &self,
        target: &T,
        id: TransitionId,
        name: &str,
    ) -> Result<Option<TweenFactory<T>>> {
        Ok(self.get(target, id)?.tweens().get(name))
    }

    /// Set (`Some`) or remove (`None`) the tween factory under `name`
    pub fn set_tween(
        &self,
        target: &T,
        id: TransitionId,
        name: &str,
        factory: Option<TweenFactory<T>>,
    ) -> Result<()> {
        let record = self.set_window(target, id)?;
        let tweens = record.tweens().with(name, factory);
        record.replace_tweens(tweens);
        Ok(())
    }

    /// The first listener registered under any of `typenames`
    pub fn on(&self, target: &T, id: TransitionId, typenames: &str) -> Result<Option<Listener<T>>> {
        self.get(target, id)?.listeners().get(typenames)
    }

    /// Set (`Some`) or remove (`None`) the listener for `typenames`
    ///
    /// Start-only registrations must happen before the record is
    /// scheduled; anything else is accepted until the record starts.
    pub fn set_on(
        &self,
        target: &T,
        id: TransitionId,
        typenames: &str,
        listener: Option<Listener<T>>,
    ) -> Result<()> {
        let record = if Listeners::<T>::is_start_only(typenames) {
            self.init_window(target, id)?
        } else {
            self.set_window(target, id)?
        };
        let listeners = record.listeners().with(typenames, listener)?;
        record.replace_listeners(listeners);
        Ok(())
    }

    pub fn delay(&self, target: &T, id: TransitionId) -> Result<f64> {
        Ok(self.get(target, id)?.delay())
    }

    /// Change the delay; only before the record is scheduled
    pub fn set_delay(&self, target: &T, id: TransitionId, ms: f64) -> Result<()> {
        self.init_window(target, id)?.set_delay(ms);
        Ok(())
    }

    pub fn duration(&self, target: &T, id: TransitionId) -> Result<f64> {
        Ok(self.get(target, id)?.duration())
    }

    pub fn set_duration(&self, target: &T, id: TransitionId, ms: f64) -> Result<()> {
        self.set_window(target, id)?.set_duration(ms);
        Ok(())
    }

    pub fn ease(&self, target: &T, id: TransitionId) -> Result<Ease> {
        Ok(self.get(target, id)?.ease())
    }

    pub fn set_ease(&self, target: &T, id: TransitionId, ease: Ease) -> Result<()> {
        let record = self.set_window(target, id)?;
        ease.validate()?;
        record.replace_ease(ease);
        Ok(())
    }

    /// Stop every live record on `target`, or only those named `name`
    ///
    /// Started and running records receive `interrupt`; records that have
    /// not started yet are dropped silently. Returns how many were stopped.
    pub fn interrupt(&self, target: &T, name: Option<&str>) -> usize {
        lifecycle::interrupt(&self.inner, target, |record| {
            name.map_or(true, |name| record.name() == Some(name))
        })
    }

    /// Stop the record `(target, id)` if it is still live
    pub fn interrupt_id(&self, target: &T, id: TransitionId) -> bool {
        lifecycle::interrupt(&self.inner, target, |record| record.id() == id) > 0
    }

    /// The id of the record named `name` on `target` that is past
    /// `Scheduled` and not yet `Ended`
    ///
    /// This includes a record whose start or end listeners are running.
    /// `None` matches only unnamed records.
    pub fn active(&self, target: &T, name: Option<&str>) -> Option<TransitionId> {
        self.inner
            .records(target)
            .iter()
            .find(|record| {
                let state = record.state();
                record.name() == name && state > TransitionState::Scheduled && !state.is_ended()
            })
            .map(|record| record.id())
    }

    /// The state of `(target, id)`, or `None` once the record is gone
    pub fn state(&self, target: &T, id: TransitionId) -> Option<TransitionState> {
        self.inner.lookup(target, id).map(|record| record.state())
    }

    pub fn has_transitions(&self, target: &T) -> bool {
        self.inner.registry.borrow().contains_key(target)
    }

    /// Number of live records on `target`
    pub fn count(&self, target: &T) -> usize {
        self.inner
            .registry
            .borrow()
            .get(target)
            .map_or(0, |schedules| schedules.len())
    }

    /// Number of targets with at least one live record
    pub fn target_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Schedule a new transition on every target, using the defaults
    pub fn transition<I>(&self, targets: I, name: Option<&str>) -> Transition<T>
    where
        I: IntoIterator<Item = T>,
    {
        let group: Group<T> = targets.into_iter().collect();
        let name: Option<Rc<str>> = name.map(Rc::from);
        let id = self.new_id();
        let timing = self.defaults().timing_at(self.inner.queue.now());
        let lists: (TweenList<T>, Listeners<T>) = Default::default();

        for (index, target) in group.iter().enumerate() {
            self.schedule_named(
                target.clone(),
                name.clone(),
                id,
                index,
                Rc::clone(&group),
                timing.clone(),
                lists.clone(),
            );
        }
        Transition::new(self.clone(), group, name, id)
    }
}

impl<T: Target> fmt::Debug for Transitions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transitions")
            .field("targets", &self.target_count())
            .field("next_id", &self.inner.next_id.get())
            .finish()
    }
}
