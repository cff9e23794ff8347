//! Segue Timer Queue
//!
//! A cooperative, single-threaded timer system:
//!
//! - **Clock**: injectable time source ([`SystemClock`], [`ManualClock`])
//! - **TimerQueue**: one ordered pending list, one outstanding external wake
//! - **Timer**: restartable countdown handle, plus one-shot and repeating helpers
//! - **FrameDriver**: blocking driver that paces wakes on the current thread
//!
//! # Example
//!
//! ```
//! use segue_timer::{ManualClock, TimerQueue};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let clock = ManualClock::new();
//! let queue = TimerQueue::with_clock(clock.clone());
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let timer = queue.timer(move |elapsed| sink.borrow_mut().push(elapsed), 0.0, Some(0.0));
//!
//! for _ in 0..3 {
//!     clock.advance(16.0);
//!     queue.wake();
//! }
//! timer.stop();
//!
//! assert_eq!(*seen.borrow(), vec![16.0, 32.0, 48.0]);
//! ```

pub mod clock;
pub mod driver;
pub mod queue;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{DriverConfig, FrameDriver};
pub use queue::{Timer, TimerCallback, TimerId, TimerQueue, Wake, POKE_INTERVAL_MS};
