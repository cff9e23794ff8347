//! Blocking frame driver
//!
//! Stands in for a display link or event loop: it sleeps until the wake the
//! queue asked for, polls for stalls, and runs the wake pass. Everything
//! stays on the calling thread.

use crate::queue::{TimerQueue, Wake};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Pacing for [`FrameDriver`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Time between frame wakes (ms)
    pub frame_interval_ms: f64,
    /// How often to poll the queue for stalls (ms)
    pub poke_interval_ms: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl DriverConfig {
    /// 60 Hz frames, one stall poll per second
    pub fn standard() -> Self {
        Self {
            frame_interval_ms: 1000.0 / 60.0,
            poke_interval_ms: crate::queue::POKE_INTERVAL_MS,
        }
    }

    /// 120 Hz frames
    pub fn high_refresh() -> Self {
        Self {
            frame_interval_ms: 1000.0 / 120.0,
            ..Self::standard()
        }
    }

    pub fn with_frame_interval(mut self, ms: f64) -> Self {
        self.frame_interval_ms = ms;
        self
    }

    pub fn with_poke_interval(mut self, ms: f64) -> Self {
        self.poke_interval_ms = ms;
        self
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

/// Drives a [`TimerQueue`] in real time on the current thread
pub struct FrameDriver {
    queue: TimerQueue,
    config: DriverConfig,
    last_poke: Instant,
    wakes: u64,
}

impl FrameDriver {
    pub fn new(queue: TimerQueue, config: DriverConfig) -> Self {
        Self {
            queue,
            config,
            last_poke: Instant::now(),
            wakes: 0,
        }
    }

    pub fn queue(&self) -> &TimerQueue {
        &self.queue
    }

    /// Number of wake passes run so far
    pub fn wakes(&self) -> u64 {
        self.wakes
    }

    /// Wait for the pending wake and run it
    ///
    /// Returns `false` without blocking if the queue is idle.
    pub fn step(&mut self) -> bool {
        let Some(wake) = self.queue.pending_wake() else {
            return false;
        };
        let pause = match wake {
            Wake::Frame => millis(self.config.frame_interval_ms),
            Wake::Timeout { delay_ms } => millis(delay_ms),
        };
        thread::sleep(pause);

        if self.last_poke.elapsed() >= millis(self.config.poke_interval_ms) {
            self.queue.poke();
            self.last_poke = Instant::now();
        }

        self.queue.wake();
        self.wakes += 1;
        true
    }

    /// Run until no timer is pending; returns the number of wakes
    pub fn run_until_idle(&mut self) -> u64 {
        let start = self.wakes;
        while self.step() {}
        tracing::debug!(wakes = self.wakes - start, "frame driver idle");
        self.wakes - start
    }

    /// Run until idle or until `budget` has passed
    pub fn run_for(&mut self, budget: Duration) -> u64 {
        let start = self.wakes;
        let deadline = Instant::now() + budget;
        while Instant::now() < deadline && self.step() {}
        self.wakes - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_driver_runs_timeout_to_completion() {
        let queue = TimerQueue::new();
        let fired = Rc::new(Cell::new(0.0));
        let sink = Rc::clone(&fired);
        queue.timeout(move |elapsed| sink.set(elapsed), 5.0, None);

        let mut driver = FrameDriver::new(queue.clone(), DriverConfig::high_refresh());
        let wakes = driver.run_until_idle();

        assert!(wakes >= 1);
        assert!(fired.get() >= 5.0);
        assert!(queue.is_idle());
        assert!(!driver.step());
    }

    #[test]
    fn test_driver_does_not_delay_near_timer_behind_far_one() {
        let started = Instant::now();
        let queue = TimerQueue::new();
        let near_at = Rc::new(Cell::new(None));
        let sink = Rc::clone(&near_at);
        queue.timeout(move |_| sink.set(Some(started.elapsed())), 40.0, Some(0.0));
        queue.timeout(|_| {}, 400.0, Some(0.0));

        let mut driver = FrameDriver::new(queue.clone(), DriverConfig::standard());
        driver.run_until_idle();

        let near_at = near_at.get().unwrap();
        assert!(near_at >= Duration::from_millis(40));
        assert!(near_at < Duration::from_millis(300));
        assert!(queue.is_idle());
    }

    #[test]
    fn test_driver_config_from_toml() {
        let config: DriverConfig = toml::from_str("frame_interval_ms = 8.0").unwrap();
        assert_eq!(config.frame_interval_ms, 8.0);
        assert_eq!(config.poke_interval_ms, 1000.0);

        let built = DriverConfig::standard()
            .with_frame_interval(8.0)
            .with_poke_interval(1000.0);
        assert_eq!(config, built);
    }
}
