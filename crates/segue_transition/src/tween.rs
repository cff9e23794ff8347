//! Tween runner
//!
//! Each record carries an ordered list of named tween factories. When the
//! record starts, every factory is invoked once for the record's target and
//! may hand back a per-frame mutator; factories that return `None` opt the
//! target out for this run. The surviving mutators are then called on every
//! tick with the eased progress fraction.
//!
//! The factory list is copy-on-write: every mutation produces a new list,
//! so records that were handed the same list keep seeing the old one.

use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

/// A bound per-frame mutator, called with the eased progress fraction
pub type Tween = Box<dyn FnMut(f64)>;

/// Builds a [`Tween`] for `(target, index, group)` when a record starts
pub type TweenFactory<T> = Rc<dyn Fn(&T, usize, &[T]) -> Option<Tween>>;

/// Mutators bound at start
pub type ActiveTweens = SmallVec<[Tween; 4]>;

/// One named factory
pub struct TweenEntry<T> {
    name: Rc<str>,
    factory: TweenFactory<T>,
}

impl<T> TweenEntry<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factory(&self) -> &TweenFactory<T> {
        &self.factory
    }
}

impl<T> Clone for TweenEntry<T> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            factory: Rc::clone(&self.factory),
        }
    }
}

/// Ordered, name-unique list of tween factories
pub struct TweenList<T> {
    entries: Rc<Vec<TweenEntry<T>>>,
}

impl<T> TweenList<T> {
    pub fn new() -> Self {
        Self {
            entries: Rc::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<TweenFactory<T>> {
        self.entries
            .iter()
            .find(|entry| &*entry.name == name)
            .map(|entry| Rc::clone(&entry.factory))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name())
    }

    /// A new list with `name` replaced in place, appended, or removed
    ///
    /// `None` removes the entry. `self` is left untouched.
    pub fn with(&self, name: &str, factory: Option<TweenFactory<T>>) -> Self {
        let mut entries: Vec<TweenEntry<T>> = self.entries.as_ref().clone();
        let position = entries.iter().position(|entry| &*entry.name == name);

        match (position, factory) {
            (Some(i), Some(factory)) => {
                entries[i] = TweenEntry {
                    name: Rc::clone(&entries[i].name),
                    factory,
                };
            }
            (Some(i), None) => {
                entries.remove(i);
            }
            (None, Some(factory)) => entries.push(TweenEntry {
                name: Rc::from(name),
                factory,
            }),
            (None, None) => {}
        }

        Self {
            entries: Rc::new(entries),
        }
    }

    /// Invoke every factory once and keep the mutators that were produced
    pub fn materialize(&self, target: &T, index: usize, group: &[T]) -> ActiveTweens {
        // The list is a snapshot: factories may edit the record's tweens
        // without affecting this run.
        let entries = Rc::clone(&self.entries);
        entries
            .iter()
            .filter_map(|entry| (entry.factory)(target, index, group))
            .collect()
    }

    pub fn ptr_eq(&self, other: &TweenList<T>) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<T> Clone for TweenList<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<T> Default for TweenList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TweenList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recording(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> TweenFactory<u32> {
        let log = Rc::clone(log);
        Rc::new(move |target: &u32, _index, _group| {
            let log = Rc::clone(&log);
            let target = *target;
            Some(Box::new(move |t: f64| {
                log.borrow_mut().push(format!("{}:{}:{}", label, target, t))
            }) as Tween)
        })
    }

    #[test]
    fn test_with_replaces_in_place_and_appends() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let list = TweenList::new()
            .with("opacity", Some(recording(&log, "a")))
            .with("width", Some(recording(&log, "b")));

        let replacement = recording(&log, "c");
        let updated = list.with("opacity", Some(Rc::clone(&replacement)));

        assert_eq!(updated.names().collect::<Vec<_>>(), vec!["opacity", "width"]);
        assert!(Rc::ptr_eq(&updated.get("opacity").unwrap(), &replacement));
        assert!(updated.get("missing").is_none());
    }

    #[test]
    fn test_with_never_mutates_shared_list() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let shared = TweenList::new().with("opacity", Some(recording(&log, "a")));
        let sibling = shared.clone();
        assert!(sibling.ptr_eq(&shared));

        let removed = shared.with("opacity", None);
        assert!(removed.is_empty());
        assert_eq!(shared.len(), 1);
        assert_eq!(sibling.len(), 1);
        assert!(!removed.ptr_eq(&shared));

        // Removing an unknown name still yields a fresh copy
        let untouched = shared.with("nope", None);
        assert_eq!(untouched.len(), 1);
        assert!(!untouched.ptr_eq(&shared));
    }

    #[test]
    fn test_materialize_drops_opted_out_targets() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let only_even: TweenFactory<u32> = Rc::new(|target: &u32, _, _| {
            if target % 2 == 0 {
                Some(Box::new(|_t: f64| {}) as Tween)
            } else {
                None
            }
        });
        let list = TweenList::new()
            .with("even", Some(only_even))
            .with("all", Some(recording(&log, "all")));

        let group = [1u32, 2];
        let mut odd = list.materialize(&group[0], 0, &group);
        let even = list.materialize(&group[1], 1, &group);
        assert_eq!(odd.len(), 1);
        assert_eq!(even.len(), 2);

        for tween in odd.iter_mut() {
            tween(0.5);
        }
        assert_eq!(*log.borrow(), vec!["all:1:0.5".to_string()]);
    }
}
