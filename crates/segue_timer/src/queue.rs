//! Shared timer queue
//!
//! One queue drives any number of [`Timer`]s through a single external wake.
//! Timers live in a slotmap and are threaded into a singly-linked pending
//! list in the order they were first armed. Each wake walks that list once,
//! calls every due timer, then unlinks stopped timers and asks the host for
//! exactly one new wake: a frame if the next due time is close, a timeout
//! otherwise, or nothing when the queue is idle.
//!
//! The queue is single-threaded (`Rc`-based). Callbacks may freely create,
//! restart and stop timers while a wake pass is running; a timer appended
//! during the pass is visited by the same pass if it is already due.
//!
//! # Example
//!
//! ```
//! use segue_timer::{ManualClock, TimerQueue, Wake};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let clock = ManualClock::new();
//! let queue = TimerQueue::with_clock(clock.clone());
//!
//! let fired = Rc::new(Cell::new(false));
//! let flag = Rc::clone(&fired);
//! queue.timeout(move |_| flag.set(true), 10.0, None);
//! assert_eq!(queue.pending_wake(), Some(Wake::Frame));
//!
//! clock.advance(16.0);
//! queue.wake();
//! assert!(fired.get());
//! assert!(queue.is_idle());
//! ```

use crate::clock::{Clock, SystemClock};
use slotmap::{new_key_type, SlotMap};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

new_key_type! {
    /// Handle to a timer node inside a [`TimerQueue`]
    pub struct TimerId;
}

/// Callback invoked with the milliseconds elapsed since the timer was due
pub type TimerCallback = Rc<dyn Fn(f64)>;

/// Due times closer than this are served by frame wakes instead of a timeout.
const FRAME_THRESHOLD_MS: f64 = 24.0;

/// A wake gap longer than this while frames are pending is treated as a stall
/// and subtracted from the clock by [`TimerQueue::poke`].
pub const POKE_INTERVAL_MS: f64 = 1000.0;

/// The single external wake the queue currently wants from its host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wake {
    /// Wake on the next display frame
    Frame,
    /// Wake once after roughly this many milliseconds
    Timeout { delay_ms: f64 },
}

struct TimerNode {
    callback: Option<TimerCallback>,
    time: f64,
    next: Option<TimerId>,
    linked: bool,
    /// No [`Timer`] handle refers to this node anymore
    orphaned: bool,
}

struct QueueState {
    timers: SlotMap<TimerId, TimerNode>,
    head: Option<TimerId>,
    tail: Option<TimerId>,
    /// Nesting depth of wake/flush passes
    flushing: u32,
    wake: Option<Wake>,
    /// Queue time the pending `Wake::Timeout` targets
    wake_at: f64,
    /// A cached `now` was taken outside a pass and must be cleared next frame
    clear_pending: bool,
    /// The coarse stall-detection poll is running
    polling: bool,
    clock_last: f64,
    clock_now: Option<f64>,
    clock_skew: f64,
}

impl QueueState {
    fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
            head: None,
            tail: None,
            flushing: 0,
            wake: None,
            wake_at: f64::INFINITY,
            clear_pending: false,
            polling: false,
            clock_last: 0.0,
            clock_now: None,
            clock_skew: 0.0,
        }
    }

    /// Append to the pending list unless already linked.
    fn link(&mut self, id: TimerId) -> bool {
        let tail = self.tail;
        let Some(node) = self.timers.get_mut(id) else {
            return false;
        };
        if node.linked {
            return true;
        }
        node.linked = true;
        node.next = None;

        match tail.and_then(|t| self.timers.get_mut(t)) {
            Some(tail_node) => tail_node.next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        true
    }
}

pub(crate) struct Shared {
    clock: Box<dyn Clock>,
    state: RefCell<QueueState>,
}

impl Shared {
    fn now(&self) -> f64 {
        let mut state = self.state.borrow_mut();
        if let Some(now) = state.clock_now {
            return now;
        }
        if state.flushing == 0 {
            state.clear_pending = true;
        }
        let now = self.clock.now() + state.clock_skew;
        state.clock_now = Some(now);
        now
    }

    /// Arrange the single external wake for a timer due at `time`.
    ///
    /// `None` means "re-evaluate on the next frame". A pending timeout that
    /// is due no later than `time` is kept.
    fn sleep(&self, time: Option<f64>) {
        let mut state = self.state.borrow_mut();
        if state.flushing > 0 || state.wake == Some(Wake::Frame) {
            return;
        }
        if let (Some(time), Some(Wake::Timeout { .. })) = (time, state.wake) {
            if state.wake_at <= time {
                return;
            }
        }
        state.wake = None;
        state.wake_at = f64::INFINITY;

        let real_now = self.clock.now();
        let reference = state.clock_now.unwrap_or(real_now + state.clock_skew);
        match time {
            Some(time) if time - reference > FRAME_THRESHOLD_MS => {
                if time.is_finite() {
                    state.wake = Some(Wake::Timeout {
                        delay_ms: time - real_now - state.clock_skew,
                    });
                    state.wake_at = time;
                }
                state.polling = false;
            }
            _ => {
                if !state.polling {
                    state.clock_last = real_now;
                    state.polling = true;
                }
                state.wake = Some(Wake::Frame);
            }
        }
    }

    /// Unlink stopped timers and sleep until the earliest remaining one.
    fn nap(&self) {
        let earliest = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let mut prev: Option<TimerId> = None;
            let mut cursor = state.head;
            let mut earliest = f64::INFINITY;

            while let Some(id) = cursor {
                let Some(node) = state.timers.get_mut(id) else {
                    break;
                };
                let next = node.next;
                if node.callback.is_some() {
                    earliest = earliest.min(node.time);
                    prev = Some(id);
                } else {
                    node.linked = false;
                    node.next = None;
                    let orphaned = node.orphaned;
                    match prev.and_then(|p| state.timers.get_mut(p)) {
                        Some(prev_node) => prev_node.next = next,
                        None => state.head = next,
                    }
                    if orphaned {
                        state.timers.remove(id);
                    }
                }
                cursor = next;
            }
            state.tail = prev;
            // The walk found the true earliest; drop whatever wake was pending.
            state.wake = None;
            state.wake_at = f64::INFINITY;
            earliest
        };
        self.sleep(Some(earliest));
    }

    /// Call every due timer once, in list order.
    fn walk(&self) {
        let now = self.now();
        let mut cursor = self.state.borrow().head;
        let mut fired = 0usize;

        while let Some(id) = cursor {
            let due = {
                let state = self.state.borrow();
                state.timers.get(id).and_then(|node| match &node.callback {
                    Some(callback) if now - node.time >= 0.0 => {
                        Some((Rc::clone(callback), now - node.time))
                    }
                    _ => None,
                })
            };
            if let Some((callback, elapsed)) = due {
                fired += 1;
                callback(elapsed);
            }
            cursor = self
                .state
                .borrow()
                .timers
                .get(id)
                .and_then(|node| node.next);
        }

        tracing::trace!(now, fired, "timer pass");
    }
}

/// Marks a wake or flush pass; cleanup runs even if a callback panics.
struct Pass<'a> {
    shared: &'a Shared,
    external: bool,
}

impl<'a> Pass<'a> {
    fn enter(shared: &'a Shared, external: bool) -> Self {
        shared.state.borrow_mut().flushing += 1;
        Self { shared, external }
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        let outermost = match self.shared.state.try_borrow_mut() {
            Ok(mut state) => {
                state.flushing = state.flushing.saturating_sub(1);
                state.flushing == 0
            }
            Err(_) => {
                tracing::warn!("timer queue state busy while leaving a pass");
                return;
            }
        };
        if !outermost {
            return;
        }
        self.shared.nap();
        if self.external {
            self.shared.state.borrow_mut().clock_now = None;
        }
    }
}

/// The shared timer queue
///
/// Cheap to clone; clones drive the same set of timers.
#[derive(Clone)]
pub struct TimerQueue {
    shared: Rc<Shared>,
}

impl TimerQueue {
    /// Create a queue on the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }

    /// Create a queue on an injected clock
    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            shared: Rc::new(Shared {
                clock: Box::new(clock),
                state: RefCell::new(QueueState::new()),
            }),
        }
    }

    /// The queue's notion of "now"
    ///
    /// Inside a pass every caller sees the same value. Outside a pass the
    /// first call samples the clock and the value is held until the next
    /// wake clears it.
    pub fn now(&self) -> f64 {
        self.shared.now()
    }

    /// Create an unarmed timer
    pub fn create_timer(&self) -> Timer {
        let id = self.shared.state.borrow_mut().timers.insert(TimerNode {
            callback: None,
            time: f64::INFINITY,
            next: None,
            linked: false,
            orphaned: false,
        });
        Timer {
            handle: Rc::new(TimerHandle {
                id,
                queue: Rc::downgrade(&self.shared),
            }),
        }
    }

    /// Create a timer and arm it for `time + delay` (`time` defaults to now)
    pub fn timer<F>(&self, callback: F, delay: f64, time: Option<f64>) -> Timer
    where
        F: Fn(f64) + 'static,
    {
        let timer = self.create_timer();
        timer.restart(callback, delay, time);
        timer
    }

    /// A one-shot timer
    ///
    /// The timer stops itself before the callback runs; the callback
    /// receives the time elapsed since `time`, i.e. `elapsed + delay`.
    pub fn timeout<F>(&self, callback: F, delay: f64, time: Option<f64>) -> Timer
    where
        F: FnOnce(f64) + 'static,
    {
        let timer = self.create_timer();
        let handle = timer.clone();
        let callback = RefCell::new(Some(callback));
        timer.restart(
            move |elapsed| {
                handle.stop();
                let callback = callback.borrow_mut().take();
                if let Some(callback) = callback {
                    callback(elapsed + delay);
                }
            },
            delay,
            time,
        );
        timer
    }

    /// A repeating timer, fired every `delay` ms measured from `time`
    ///
    /// The callback receives the total time elapsed since `time`. A
    /// non-positive delay degrades to a timer that fires on every pass.
    pub fn interval<F>(&self, callback: F, delay: f64, time: Option<f64>) -> Timer
    where
        F: Fn(f64) + 'static,
    {
        let timer = self.create_timer();
        if delay <= 0.0 {
            timer.restart(callback, 0.0, time);
            return timer;
        }

        let start = time.unwrap_or_else(|| self.now());
        let total = Cell::new(delay);
        let handle = timer.clone();
        timer.restart(
            move |elapsed| {
                let reported = elapsed + total.get();
                total.set(total.get() + delay);
                handle.reschedule(start + total.get());
                callback(reported);
            },
            delay,
            Some(start),
        );
        timer
    }

    /// Run one external wake
    ///
    /// Samples the clock, calls every due timer, then arranges the next
    /// wake. The cached time is cleared on the way out, also when a
    /// callback panics.
    pub fn wake(&self) {
        {
            let mut state = self.shared.state.borrow_mut();
            let now = self.shared.clock.now();
            state.clock_last = now;
            state.clock_now = Some(now + state.clock_skew);
            state.wake = None;
            state.wake_at = f64::INFINITY;
            state.clear_pending = false;
        }
        let _pass = Pass::enter(&self.shared, true);
        self.shared.walk();
    }

    /// Call every due timer now, outside of an external wake
    pub fn flush(&self) {
        self.shared.now();
        let _pass = Pass::enter(&self.shared, false);
        self.shared.walk();
    }

    /// Coarse stall detection
    ///
    /// Hosts call this about every [`POKE_INTERVAL_MS`]. If frames are
    /// pending but none arrived for longer than that, the gap is removed
    /// from the queue's clock so running timers resume where they paused.
    pub fn poke(&self) {
        let mut state = self.shared.state.borrow_mut();
        if !state.polling {
            return;
        }
        let now = self.shared.clock.now();
        let gap = now - state.clock_last;
        if gap > POKE_INTERVAL_MS {
            state.clock_skew -= gap;
            state.clock_last = now;
            tracing::debug!(gap, skew = state.clock_skew, "timer queue stalled; correcting clock");
        }
    }

    /// The wake the host should arrange next, if any
    pub fn pending_wake(&self) -> Option<Wake> {
        let state = self.shared.state.borrow();
        if state.clear_pending {
            Some(Wake::Frame)
        } else {
            state.wake
        }
    }

    /// True if no wake is wanted
    pub fn is_idle(&self) -> bool {
        self.pending_wake().is_none()
    }

    /// Number of armed timers still in the pending list
    pub fn active_count(&self) -> usize {
        let state = self.shared.state.borrow();
        state
            .timers
            .values()
            .filter(|node| node.linked && node.callback.is_some())
            .count()
    }

    /// Total drift correction applied so far, in milliseconds (non-positive)
    pub fn clock_skew(&self) -> f64 {
        self.shared.state.borrow().clock_skew
    }

    /// True if both handles drive the same queue
    pub fn ptr_eq(&self, other: &TimerQueue) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("active", &self.active_count())
            .field("pending_wake", &self.pending_wake())
            .finish()
    }
}

struct TimerHandle {
    id: TimerId,
    queue: Weak<Shared>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        let Some(shared) = self.queue.upgrade() else {
            return;
        };
        let Ok(mut state) = shared.state.try_borrow_mut() else {
            tracing::warn!("timer dropped while its queue was busy; node kept until queue drop");
            return;
        };
        let unlinked = match state.timers.get_mut(self.id) {
            Some(node) => {
                node.orphaned = true;
                !node.linked
            }
            None => false,
        };
        if unlinked {
            state.timers.remove(self.id);
        }
    }
}

/// A restartable countdown
///
/// Clones refer to the same timer. Dropping every handle does not stop an
/// armed timer; it keeps firing until stopped, and its node is reclaimed
/// once it has been stopped and unlinked.
#[derive(Clone)]
pub struct Timer {
    handle: Rc<TimerHandle>,
}

impl Timer {
    pub fn id(&self) -> TimerId {
        self.handle.id
    }

    /// Arm (or re-arm) the timer for `time + delay`
    ///
    /// `time` defaults to the queue's now. Re-arming a timer that is already
    /// pending replaces its callback and due time in place; it is never
    /// linked twice.
    pub fn restart<F>(&self, callback: F, delay: f64, time: Option<f64>)
    where
        F: Fn(f64) + 'static,
    {
        self.restart_with(Rc::new(callback), delay, time);
    }

    /// [`restart`](Self::restart) with an already shared callback
    pub fn restart_with(&self, callback: TimerCallback, delay: f64, time: Option<f64>) {
        let Some(shared) = self.handle.queue.upgrade() else {
            return;
        };
        let time = time.unwrap_or_else(|| shared.now()) + delay;
        let previous = {
            let mut state = shared.state.borrow_mut();
            if !state.link(self.handle.id) {
                return;
            }
            match state.timers.get_mut(self.handle.id) {
                Some(node) => {
                    node.time = time;
                    node.callback.replace(callback)
                }
                None => return,
            }
        };
        // The old callback may own timer handles; drop it outside the borrow.
        drop(previous);
        shared.sleep(Some(time));
    }

    /// Move the due time without touching the callback
    pub(crate) fn reschedule(&self, time: f64) {
        let Some(shared) = self.handle.queue.upgrade() else {
            return;
        };
        {
            let mut state = shared.state.borrow_mut();
            if !state.link(self.handle.id) {
                return;
            }
            match state.timers.get_mut(self.handle.id) {
                Some(node) if node.callback.is_some() => node.time = time,
                _ => return,
            }
        }
        shared.sleep(Some(time));
    }

    /// Stop the timer
    ///
    /// The callback is released immediately; the node is unlinked lazily by
    /// the next pass. Stopping a stopped timer does nothing.
    pub fn stop(&self) {
        let Some(shared) = self.handle.queue.upgrade() else {
            return;
        };
        let previous = {
            let mut state = shared.state.borrow_mut();
            match state.timers.get_mut(self.handle.id) {
                Some(node) if node.callback.is_some() => {
                    node.time = f64::INFINITY;
                    node.callback.take()
                }
                _ => return,
            }
        };
        drop(previous);
        shared.sleep(None);
    }

    /// True while the timer holds a callback
    pub fn is_active(&self) -> bool {
        self.with_node(|node| node.callback.is_some())
            .unwrap_or(false)
    }

    /// Absolute due time, if armed
    pub fn due(&self) -> Option<f64> {
        self.with_node(|node| node.callback.as_ref().map(|_| node.time))
            .flatten()
    }

    fn with_node<R>(&self, f: impl FnOnce(&TimerNode) -> R) -> Option<R> {
        let shared = self.handle.queue.upgrade()?;
        let state = shared.state.borrow();
        state.timers.get(self.handle.id).map(f)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.handle.id)
            .field("due", &self.due())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::panic::{self, AssertUnwindSafe};

    fn manual_queue() -> (ManualClock, TimerQueue) {
        let clock = ManualClock::new();
        let queue = TimerQueue::with_clock(clock.clone());
        (clock, queue)
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        (Rc::clone(&count), count)
    }

    #[test]
    fn test_timer_fires_when_due() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();
        let elapsed_seen = Rc::new(Cell::new(-1.0));
        let elapsed = Rc::clone(&elapsed_seen);

        let timer = queue.timer(
            move |e| {
                seen.set(seen.get() + 1);
                elapsed.set(e);
            },
            10.0,
            Some(0.0),
        );

        clock.set(5.0);
        queue.wake();
        assert_eq!(count.get(), 0);

        clock.set(16.0);
        queue.wake();
        assert_eq!(count.get(), 1);
        assert_eq!(elapsed_seen.get(), 6.0);

        // A plain timer keeps firing until stopped
        clock.set(32.0);
        queue.wake();
        assert_eq!(count.get(), 2);

        timer.stop();
        clock.set(48.0);
        queue.wake();
        assert_eq!(count.get(), 2);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_restart_then_stop_never_fires() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();

        let timer = queue.create_timer();
        timer.restart(move |_| seen.set(seen.get() + 1), 0.0, None);
        timer.stop();

        clock.advance(16.0);
        queue.wake();
        clock.advance(16.0);
        queue.wake();

        assert_eq!(count.get(), 0);
        assert!(!timer.is_active());
        assert!(queue.is_idle());
    }

    #[test]
    fn test_restart_does_not_link_twice() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();
        let seen2 = Rc::clone(&seen);

        let timer = queue.timer(move |_| seen.set(seen.get() + 1), 0.0, Some(0.0));
        timer.restart(move |_| seen2.set(seen2.get() + 10), 0.0, Some(0.0));
        timer.restart(|_| {}, 0.0, Some(0.0));
        assert_eq!(queue.active_count(), 1);

        let (count2, seen3) = counter();
        timer.restart(move |_| seen3.set(seen3.get() + 1), 0.0, Some(0.0));

        clock.set(1.0);
        queue.wake();
        assert_eq!(count.get(), 0);
        assert_eq!(count2.get(), 1);
        assert_eq!(queue.active_count(), 1);
    }

    #[test]
    fn test_timeout_fires_once_with_total_elapsed() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();
        let elapsed_seen = Rc::new(Cell::new(0.0));
        let elapsed = Rc::clone(&elapsed_seen);

        queue.timeout(
            move |e| {
                seen.set(seen.get() + 1);
                elapsed.set(e);
            },
            50.0,
            Some(0.0),
        );
        assert!(matches!(queue.pending_wake(), Some(Wake::Timeout { .. })));

        clock.set(60.0);
        queue.wake();
        clock.set(120.0);
        queue.wake();

        assert_eq!(count.get(), 1);
        assert_eq!(elapsed_seen.get(), 60.0);
        assert!(queue.is_idle());
        assert_eq!(queue.active_count(), 0);
    }

    #[test]
    fn test_interval_reports_accumulated_time() {
        let (clock, queue) = manual_queue();
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&ticks);

        let timer = queue.interval(move |e| sink.borrow_mut().push(e), 100.0, Some(0.0));

        for t in [50.0, 100.0, 150.0, 210.0, 300.0] {
            clock.set(t);
            queue.wake();
        }
        timer.stop();
        clock.set(400.0);
        queue.wake();

        assert_eq!(*ticks.borrow(), vec![100.0, 210.0, 300.0]);
    }

    #[test]
    fn test_timer_appended_during_pass_runs_same_pass() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();
        let inner_queue = queue.clone();

        queue.timeout(
            move |_| {
                let seen = Rc::clone(&seen);
                inner_queue.timeout(move |_| seen.set(seen.get() + 1), 0.0, None);
            },
            0.0,
            Some(0.0),
        );

        clock.set(1.0);
        queue.wake();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_now_is_frozen_within_a_pass() {
        let (clock, queue) = manual_queue();
        let samples = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..2 {
            let sink = Rc::clone(&samples);
            let q = queue.clone();
            let c = clock.clone();
            queue.timeout(
                move |_| {
                    sink.borrow_mut().push(q.now());
                    c.advance(5.0);
                },
                0.0,
                Some(0.0),
            );
        }

        clock.set(10.0);
        queue.wake();
        assert_eq!(*samples.borrow(), vec![10.0, 10.0]);

        // The cache is gone after the pass
        assert_eq!(queue.now(), 20.0);
    }

    #[test]
    fn test_now_outside_pass_requests_clearing_frame() {
        let (clock, queue) = manual_queue();
        clock.set(7.0);
        assert!(queue.is_idle());
        assert_eq!(queue.now(), 7.0);
        clock.set(9.0);
        assert_eq!(queue.now(), 7.0);
        assert_eq!(queue.pending_wake(), Some(Wake::Frame));

        queue.wake();
        assert!(queue.is_idle());
        assert_eq!(queue.now(), 9.0);
    }

    #[test]
    fn test_wake_kind_follows_next_due_time() {
        let (clock, queue) = manual_queue();
        clock.set(0.0);

        let far = queue.timer(|_| {}, 500.0, Some(0.0));
        match queue.pending_wake() {
            Some(Wake::Timeout { delay_ms }) => assert_eq!(delay_ms, 500.0),
            other => panic!("expected a timeout, got {:?}", other),
        }

        let _near = queue.timer(|_| {}, 10.0, Some(0.0));
        assert_eq!(queue.pending_wake(), Some(Wake::Frame));

        far.stop();
        clock.set(16.0);
        queue.wake();
        assert_eq!(queue.pending_wake(), Some(Wake::Frame));
    }

    #[test]
    fn test_later_restart_keeps_nearer_timeout() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();

        let _near = queue.timer(move |_| seen.set(seen.get() + 1), 500.0, Some(0.0));
        let _far = queue.timer(|_| {}, 2000.0, Some(0.0));
        assert_eq!(queue.pending_wake(), Some(Wake::Timeout { delay_ms: 500.0 }));

        clock.set(500.0);
        queue.wake();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_host_loop_fires_each_timer_at_its_due_time() {
        let (clock, queue) = manual_queue();
        let fired = Rc::new(RefCell::new(Vec::new()));

        for due in [500.0, 2000.0, 1200.0] {
            let sink = Rc::clone(&fired);
            let q = queue.clone();
            queue.timeout(move |_| sink.borrow_mut().push((due, q.now())), due, Some(0.0));
        }

        while let Some(wake) = queue.pending_wake() {
            match wake {
                Wake::Frame => clock.advance(16.0),
                Wake::Timeout { delay_ms } => clock.advance(delay_ms),
            }
            queue.wake();
        }

        assert_eq!(
            *fired.borrow(),
            vec![(500.0, 500.0), (1200.0, 1200.0), (2000.0, 2000.0)]
        );
    }

    #[test]
    fn test_panicking_callback_still_clears_cached_now() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();

        queue.timeout(|_| panic!("tween blew up"), 0.0, Some(0.0));
        queue.timeout(move |_| seen.set(seen.get() + 1), 0.0, Some(0.0));

        clock.set(5.0);
        let result = panic::catch_unwind(AssertUnwindSafe(|| queue.wake()));
        assert!(result.is_err());
        // The panic aborted the rest of the pass
        assert_eq!(count.get(), 0);

        clock.set(8.0);
        assert_eq!(queue.now(), 8.0);

        // The surviving timer runs on the next wake
        queue.wake();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_poke_corrects_for_stalls() {
        let (clock, queue) = manual_queue();
        let elapsed_seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&elapsed_seen);

        let timer = queue.timer(move |e| sink.borrow_mut().push(e), 0.0, Some(0.0));
        clock.set(16.0);
        queue.wake();

        // Host stops delivering frames for five seconds
        clock.set(5016.0);
        queue.poke();
        assert_eq!(queue.clock_skew(), -5000.0);

        clock.set(5032.0);
        queue.wake();
        timer.stop();

        assert_eq!(*elapsed_seen.borrow(), vec![16.0, 32.0]);
    }

    #[test]
    fn test_poke_ignored_without_frames() {
        let (clock, queue) = manual_queue();
        queue.timer(|_| {}, 10_000.0, Some(0.0));
        clock.set(5000.0);
        queue.poke();
        assert_eq!(queue.clock_skew(), 0.0);
    }

    #[test]
    fn test_flush_runs_due_timers_and_rearms() {
        let (clock, queue) = manual_queue();
        let (count, seen) = counter();

        clock.set(3.0);
        queue.timeout(move |_| seen.set(seen.get() + 1), 0.0, Some(0.0));
        queue.flush();
        assert_eq!(count.get(), 1);

        // The cached time from flush is released by the next frame
        assert_eq!(queue.pending_wake(), Some(Wake::Frame));
        queue.wake();
        assert!(queue.is_idle());
    }

    #[test]
    fn test_dropped_handles_reclaim_nodes() {
        let (clock, queue) = manual_queue();
        {
            let timer = queue.timer(|_| {}, 0.0, Some(0.0));
            timer.stop();
        }
        clock.set(16.0);
        queue.wake();

        let state = queue.shared.state.borrow();
        assert!(state.timers.is_empty());
        assert!(state.head.is_none());
        assert!(state.tail.is_none());
    }

    #[test]
    fn test_unarmed_timer_is_reclaimed_on_drop() {
        let (_clock, queue) = manual_queue();
        let timer = queue.create_timer();
        assert!(!timer.is_active());
        assert_eq!(timer.due(), None);
        drop(timer);
        assert!(queue.shared.state.borrow().timers.is_empty());
    }
}
