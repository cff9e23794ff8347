//! Lifecycle events and listener registration
//!
//! Listeners are registered with typenames of the form `type[.name]`,
//! several separated by whitespace: `"start end.cleanup"`. The optional
//! name lets several listeners share one event type; registering again
//! with the same type and name replaces the earlier listener.

use crate::error::{Result, TransitionError};
use crate::state::TransitionId;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Events emitted over a record's lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The record has won the start race and is about to run
    Start,
    /// A started or running record was stopped by another
    Interrupt,
    /// The record reached its final tick
    End,
}

impl EventType {
    pub const ALL: [EventType; 3] = [EventType::Start, EventType::Interrupt, EventType::End];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Start => "start",
            EventType::Interrupt => "interrupt",
            EventType::End => "end",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(EventType::Start),
            "interrupt" => Ok(EventType::Interrupt),
            "end" => Ok(EventType::End),
            other => Err(TransitionError::UnknownEventType(other.to_string())),
        }
    }
}

/// What a listener is told about the record that fired
pub struct EventContext<'a, T> {
    pub target: &'a T,
    pub index: usize,
    pub group: &'a [T],
    pub id: TransitionId,
    pub name: Option<&'a str>,
}

/// A lifecycle listener
pub type Listener<T> = Rc<dyn Fn(&EventContext<'_, T>)>;

/// One parsed `type[.name]` token; `event` is `None` for a bare `.name`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Typename<'a> {
    event: Option<EventType>,
    name: &'a str,
}

fn parse_typenames(typenames: &str) -> Result<SmallVec<[Typename<'_>; 2]>> {
    typenames
        .split_whitespace()
        .map(|token| {
            let (kind, name) = token.split_once('.').unwrap_or((token, ""));
            let event = if kind.is_empty() {
                None
            } else {
                Some(kind.parse::<EventType>()?)
            };
            Ok(Typename { event, name })
        })
        .collect()
}

struct ListenerEntry<T> {
    event: EventType,
    name: Rc<str>,
    listener: Listener<T>,
}

impl<T> Clone for ListenerEntry<T> {
    fn clone(&self) -> Self {
        Self {
            event: self.event,
            name: Rc::clone(&self.name),
            listener: Rc::clone(&self.listener),
        }
    }
}

/// Copy-on-write listener registry for one record
pub struct Listeners<T> {
    entries: Rc<Vec<ListenerEntry<T>>>,
}

impl<T> Listeners<T> {
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

    /// Whether every token in `typenames` is a `start` listener (or a bare name)
    ///
    /// Start-only registrations must be made before the record is
    /// scheduled, since the start event may fire in the same pass.
    pub fn is_start_only(typenames: &str) -> bool {
        typenames.split_whitespace().all(|token| {
            let kind = token.split_once('.').map_or(token, |(kind, _)| kind);
            kind.is_empty() || kind == "start"
        })
    }

    /// The first listener registered under any of `typenames`
    pub fn get(&self, typenames: &str) -> Result<Option<Listener<T>>> {
        let parsed = parse_typenames(typenames)?;
        Ok(parsed.iter().find_map(|typename| {
            let event = typename.event?;
            self.entries
                .iter()
                .find(|entry| entry.event == event && &*entry.name == typename.name)
                .map(|entry| Rc::clone(&entry.listener))
        }))
    }

    /// A new registry with `listener` set for every token in `typenames`
    ///
    /// `None` removes; a bare `.name` with `None` removes that name from
    /// every event type.
    pub fn with(&self, typenames: &str, listener: Option<Listener<T>>) -> Result<Self> {
        let parsed = parse_typenames(typenames)?;
        let mut entries: Vec<ListenerEntry<T>> = self.entries.as_ref().clone();

        for typename in parsed {
            match (typename.event, &listener) {
                (Some(event), listener) => {
                    let existing = entries
                        .iter()
                        .position(|entry| entry.event == event && &*entry.name == typename.name);
                    match (existing, listener) {
                        (Some(i), Some(listener)) => entries[i].listener = Rc::clone(listener),
                        (Some(i), None) => {
                            entries.remove(i);
                        }
                        (None, Some(listener)) => entries.push(ListenerEntry {
                            event,
                            name: Rc::from(typename.name),
                            listener: Rc::clone(listener),
                        }),
                        (None, None) => {}
                    }
                }
                (None, None) => entries.retain(|entry| &*entry.name != typename.name),
                (None, Some(_)) => {
                    return Err(TransitionError::InvalidCallback(format!(
                        "listener for \".{}\" has no event type",
                        typename.name
                    )))
                }
            }
        }

        Ok(Self {
            entries: Rc::new(entries),
        })
    }

    /// Snapshot of the listeners for `event`, in registration order
    pub fn for_event(&self, event: EventType) -> SmallVec<[Listener<T>; 2]> {
        self.entries
            .iter()
            .filter(|entry| entry.event == event)
            .map(|entry| Rc::clone(&entry.listener))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Listeners<T>) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| {
                if entry.name.is_empty() {
                    entry.event.as_str().to_string()
                } else {
                    format!("{}.{}", entry.event, entry.name)
                }
            }))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Listener<u32> {
        Rc::new(|_ctx: &EventContext<'_, u32>| {})
    }

    #[test]
    fn test_parse_typenames() {
        let parsed = parse_typenames("  start end.cleanup .fade ").unwrap();
        assert_eq!(
            parsed.as_slice(),
            &[
                Typename {
                    event: Some(EventType::Start),
                    name: ""
                },
                Typename {
                    event: Some(EventType::End),
                    name: "cleanup"
                },
                Typename {
                    event: None,
                    name: "fade"
                },
            ]
        );
        assert_eq!(
            parse_typenames("start tick").unwrap_err(),
            TransitionError::UnknownEventType("tick".into())
        );
    }

    #[test]
    fn test_same_type_and_name_replaces() {
        let first = noop();
        let second = noop();
        let listeners = Listeners::new()
            .with("end", Some(Rc::clone(&first)))
            .unwrap()
            .with("end.log", Some(noop()))
            .unwrap()
            .with("end", Some(Rc::clone(&second)))
            .unwrap();

        assert_eq!(listeners.len(), 2);
        assert!(Rc::ptr_eq(&listeners.get("end").unwrap().unwrap(), &second));
        assert_eq!(listeners.for_event(EventType::End).len(), 2);
        assert!(listeners.for_event(EventType::Start).is_empty());
    }

    #[test]
    fn test_bare_name_removes_across_types() {
        let listeners = Listeners::new()
            .with("start.log end.log interrupt", Some(noop()))
            .unwrap();
        assert_eq!(listeners.len(), 3);

        let trimmed = listeners.with(".log", None).unwrap();
        assert_eq!(trimmed.len(), 1);
        assert!(trimmed.get("interrupt").unwrap().is_some());
        assert_eq!(listeners.len(), 3);

        assert!(matches!(
            listeners.with(".log", Some(noop())),
            Err(TransitionError::InvalidCallback(_))
        ));
    }

    #[test]
    fn test_get_returns_first_match() {
        let end = noop();
        let listeners = Listeners::new()
            .with("end", Some(Rc::clone(&end)))
            .unwrap();
        assert!(Rc::ptr_eq(
            &listeners.get("start end").unwrap().unwrap(),
            &end
        ));
        assert!(listeners.get("").unwrap().is_none());
        assert!(listeners.get("bogus").is_err());
    }

    #[test]
    fn test_start_only() {
        assert!(Listeners::<u32>::is_start_only("start"));
        assert!(Listeners::<u32>::is_start_only("start.a start.b .c"));
        assert!(!Listeners::<u32>::is_start_only("start end"));
        assert!(!Listeners::<u32>::is_start_only("interrupt"));
    }
}
