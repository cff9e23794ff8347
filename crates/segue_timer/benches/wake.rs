//! Wake pass throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use segue_timer::{ManualClock, Timer, TimerQueue};
use std::cell::Cell;
use std::rc::Rc;

fn bench_wake(c: &mut Criterion) {
    let mut group = c.benchmark_group("wake");

    for count in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("due_timers", count), &count, |b, &count| {
            let clock = ManualClock::new();
            let queue = TimerQueue::with_clock(clock.clone());
            let calls = Rc::new(Cell::new(0u64));
            let timers: Vec<Timer> = (0..count)
                .map(|_| {
                    let calls = Rc::clone(&calls);
                    queue.timer(move |_| calls.set(calls.get() + 1), 0.0, Some(0.0))
                })
                .collect();

            b.iter(|| {
                clock.advance(16.0);
                queue.wake();
            });

            black_box(calls.get());
            drop(timers);
        });

        group.bench_with_input(BenchmarkId::new("restart_churn", count), &count, |b, &count| {
            let clock = ManualClock::new();
            let queue = TimerQueue::with_clock(clock.clone());
            let timers: Vec<Timer> = (0..count).map(|_| queue.create_timer()).collect();

            b.iter(|| {
                for (i, timer) in timers.iter().enumerate() {
                    timer.restart(|_| {}, i as f64, None);
                }
                clock.advance(16.0);
                queue.wake();
                for timer in &timers {
                    timer.stop();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_wake);
criterion_main!(benches);
