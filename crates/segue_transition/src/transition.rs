//! Group builder
//!
//! A [`Transition`] is the handle returned by
//! [`Transitions::transition`]: one id scheduled on every target of a
//! group. Its setters apply to each target's record in turn. Tween and
//! listener edits share one copy-on-write list across the group as long
//! as the targets started out sharing one.

use crate::ease::Ease;
use crate::error::Result;
use crate::events::{EventContext, Listener, Listeners};
use crate::record::{Group, Target};
use crate::scheduler::Transitions;
use crate::state::{TransitionId, TransitionState};
use crate::tween::{Tween, TweenFactory, TweenList};
use std::fmt;
use std::rc::Rc;

/// One transition id across a group of targets
pub struct Transition<T: Target> {
    transitions: Transitions<T>,
    group: Group<T>,
    name: Option<Rc<str>>,
    id: TransitionId,
}

impl<T: Target> Clone for Transition<T> {
    fn clone(&self) -> Self {
        Self {
            transitions: self.transitions.clone(),
            group: Rc::clone(&self.group),
            name: self.name.clone(),
            id: self.id,
        }
    }
}

impl<T: Target> Transition<T> {
    pub(crate) fn new(
        transitions: Transitions<T>,
        group: Group<T>,
        name: Option<Rc<str>>,
        id: TransitionId,
    ) -> Self {
        Self {
            transitions,
            group,
            name,
            id,
        }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn targets(&self) -> &[T] {
        &self.group
    }

    pub fn len(&self) -> usize {
        self.group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_empty()
    }

    /// The state of this transition on `target`, or `None` once it is gone
    pub fn state(&self, target: &T) -> Option<TransitionState> {
        self.transitions.state(target, self.id)
    }

    pub fn delay(&self, ms: f64) -> Result<&Self> {
        self.delay_with(|_, _| ms)
    }

    /// Per-target delay computed from `(target, index)`
    pub fn delay_with<F>(&self, f: F) -> Result<&Self>
    where
        F: Fn(&T, usize) -> f64,
    {
        for (index, target) in self.group.iter().enumerate() {
            self.transitions.set_delay(target, self.id, f(target, index))?;
        }
        Ok(self)
    }

    pub fn duration(&self, ms: f64) -> Result<&Self> {
        self.duration_with(|_, _| ms)
    }

    /// Per-target duration computed from `(target, index)`
    pub fn duration_with<F>(&self, f: F) -> Result<&Self>
    where
        F: Fn(&T, usize) -> f64,
    {
        for (index, target) in self.group.iter().enumerate() {
            self.transitions
                .set_duration(target, self.id, f(target, index))?;
        }
        Ok(self)
    }

    pub fn ease(&self, ease: Ease) -> Result<&Self> {
        ease.validate()?;
        for target in self.group.iter() {
            self.transitions.set_window(target, self.id)?.replace_ease(ease.clone());
        }
        Ok(self)
    }

    /// Register a tween factory under `name` on every target
    pub fn tween<F>(&self, name: &str, factory: F) -> Result<&Self>
    where
        F: Fn(&T, usize, &[T]) -> Option<Tween> + 'static,
    {
        self.update_tweens(name, Some(Rc::new(factory)))
    }

    pub fn remove_tween(&self, name: &str) -> Result<&Self> {
        self.update_tweens(name, None)
    }

    /// The factory registered under `name` on the first target
    pub fn tween_factory(&self, name: &str) -> Result<Option<TweenFactory<T>>> {
        match self.group.first() {
            Some(target) => self.transitions.tween(target, self.id, name),
            None => Ok(None),
        }
    }

    fn update_tweens(&self, name: &str, factory: Option<TweenFactory<T>>) -> Result<&Self> {
        let mut cache: Option<(TweenList<T>, TweenList<T>)> = None;
        for target in self.group.iter() {
            let record = self.transitions.set_window(target, self.id)?;
            let current = record.tweens();
            let shared = cache
                .as_ref()
                .filter(|(before, _)| before.ptr_eq(&current))
                .map(|(_, after)| after.clone());
            let next = match shared {
                Some(next) => next,
                None => {
                    let next = current.with(name, factory.clone());
                    cache = Some((current, next.clone()));
                    next
                }
            };
            record.replace_tweens(next);
        }
        Ok(self)
    }

    /// Register `listener` for `typenames` on every target
    pub fn on<F>(&self, typenames: &str, listener: F) -> Result<&Self>
    where
        F: Fn(&EventContext<'_, T>) + 'static,
    {
        self.update_listeners(typenames, Some(Rc::new(listener)))
    }

    pub fn remove_on(&self, typenames: &str) -> Result<&Self> {
        self.update_listeners(typenames, None)
    }

    /// The first listener for `typenames` on the first target
    pub fn listener(&self, typenames: &str) -> Result<Option<Listener<T>>> {
        match self.group.first() {
            Some(target) => self.transitions.on(target, self.id, typenames),
            None => Ok(None),
        }
    }

    fn update_listeners(&self, typenames: &str, listener: Option<Listener<T>>) -> Result<&Self> {
        let start_only = Listeners::<T>::is_start_only(typenames);
        let mut cache: Option<(Listeners<T>, Listeners<T>)> = None;
        for target in self.group.iter() {
            let record = if start_only {
                self.transitions.init_window(target, self.id)?
            } else {
                self.transitions.set_window(target, self.id)?
            };
            let current = record.listeners();
            let shared = cache
                .as_ref()
                .filter(|(before, _)| before.ptr_eq(&current))
                .map(|(_, after)| after.clone());
            let next = match shared {
                Some(next) => next,
                None => {
                    let next = current.with(typenames, listener.clone())?;
                    cache = Some((current, next.clone()));
                    next
                }
            };
            record.replace_listeners(next);
        }
        Ok(self)
    }

    /// Schedule a follow-on transition that starts when this one ends
    ///
    /// Each target's new record inherits the duration and ease and starts
    /// at the end time of its record under this transition.
    pub fn transition(&self) -> Result<Transition<T>> {
        let timings = self
            .group
            .iter()
            .map(|target| Ok(self.transitions.get(target, self.id)?.timing().following()))
            .collect::<Result<Vec<_>>>()?;

        let id = self.transitions.new_id();
        let lists: (TweenList<T>, Listeners<T>) = Default::default();
        for ((index, target), timing) in self.group.iter().enumerate().zip(timings) {
            self.transitions.schedule_named(
                target.clone(),
                self.name.clone(),
                id,
                index,
                Rc::clone(&self.group),
                timing,
                lists.clone(),
            );
        }
        Ok(Transition::new(
            self.transitions.clone(),
            Rc::clone(&self.group),
            self.name.clone(),
            id,
        ))
    }

    /// Stop this transition on every target; returns how many records stopped
    pub fn interrupt(&self) -> usize {
        self.group
            .iter()
            .filter(|target| self.transitions.interrupt_id(target, self.id))
            .count()
    }
}

impl<T: Target> fmt::Debug for Transition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("targets", &self.group)
            .finish()
    }
}
