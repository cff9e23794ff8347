//! Lifecycle state machine
//!
//! Every record is driven by its own timer through three steps:
//!
//! 1. `schedule_step` fires on the first pass after creation and arms the
//!    start step for `time + delay`.
//! 2. `start` resolves conflicts with same-name siblings on the target,
//!    emits `start` and binds the tweens. The first tick is deferred to a
//!    one-shot timeout appended to the same pass, so every record starting
//!    in a pass has finished its start step before any of them ticks.
//! 3. `tick` eases the elapsed fraction, runs the tweens and, once the
//!    duration is reached, emits `end` and removes the record.
//!
//! No registry or record borrow is held while user code runs; listeners and
//! tweens are free to call back into the scheduler.

use crate::events::{EventContext, EventType};
use crate::record::{ScheduleRecord, Target};
use crate::scheduler::Inner;
use crate::state::TransitionState;
use std::rc::Rc;

type Step<T> = fn(&Rc<Inner<T>>, &Rc<ScheduleRecord<T>>, f64);

/// Timer callback running `step` for `record` while the scheduler is alive
fn callback<T: Target>(
    inner: &Rc<Inner<T>>,
    record: &Rc<ScheduleRecord<T>>,
    step: Step<T>,
) -> impl Fn(f64) + 'static {
    let weak = Rc::downgrade(inner);
    let record = Rc::clone(record);
    move |elapsed| match weak.upgrade() {
        Some(inner) => step(&inner, &record, elapsed),
        None => record.timer.stop(),
    }
}

/// Arm a freshly created record for its first pass
pub(crate) fn arm<T: Target>(inner: &Rc<Inner<T>>, record: &Rc<ScheduleRecord<T>>) {
    record
        .timer
        .restart(callback(inner, record, schedule_step), 0.0, Some(record.time()));
}

fn schedule_step<T: Target>(inner: &Rc<Inner<T>>, record: &Rc<ScheduleRecord<T>>, elapsed: f64) {
    if record.state() != TransitionState::Created {
        return;
    }
    record.set_state(TransitionState::Scheduled);
    record.timer.restart(
        callback(inner, record, start),
        record.delay(),
        Some(record.time()),
    );

    // Already due: start in this pass rather than waiting for the next one.
    if record.delay() <= elapsed {
        start(inner, record, elapsed - record.delay());
    }
}

fn start<T: Target>(inner: &Rc<Inner<T>>, record: &Rc<ScheduleRecord<T>>, elapsed: f64) {
    if record.state() != TransitionState::Scheduled {
        return finish(inner, record);
    }

    if superseded(inner, record) {
        tracing::debug!(
            subject = ?record.target(),
            id = %record.id(),
            "transition superseded before starting"
        );
        record.set_state(TransitionState::Ended);
        record.timer.stop();
        inner.remove(record.target(), record.id());
        return;
    }

    for sibling in inner.records(record.target()) {
        if sibling.id() == record.id() || sibling.name() != record.name() {
            continue;
        }
        match sibling.state() {
            // Mid-start elsewhere: retry once that start step has unwound.
            // A zero-duration sibling due at the same instant lands here.
            TransitionState::Started => {
                let weak = Rc::downgrade(inner);
                let deferred = Rc::clone(record);
                inner.queue.timeout(
                    move |_| {
                        if let Some(inner) = weak.upgrade() {
                            start(&inner, &deferred, elapsed);
                        }
                    },
                    0.0,
                    None,
                );
                return;
            }
            TransitionState::Running => {
                tracing::debug!(
                    subject = ?sibling.target(),
                    interrupted = %sibling.id(),
                    by = %record.id(),
                    "interrupting running transition"
                );
                sibling.set_state(TransitionState::Ended);
                sibling.timer.stop();
                sibling.release();
                dispatch(&sibling, EventType::Interrupt);
                inner.remove(sibling.target(), sibling.id());
                if record.state() != TransitionState::Scheduled {
                    return;
                }
            }
            state if state.is_pending() && sibling.id() < record.id() => {
                tracing::debug!(
                    subject = ?sibling.target(),
                    cancelled = %sibling.id(),
                    by = %record.id(),
                    "cancelling pending transition"
                );
                sibling.set_state(TransitionState::Ended);
                sibling.timer.stop();
                inner.remove(sibling.target(), sibling.id());
            }
            _ => {}
        }
    }

    // The first tick runs after every start step of this pass.
    {
        let weak = Rc::downgrade(inner);
        let running = Rc::clone(record);
        inner.queue.timeout(
            move |_| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if running.state() == TransitionState::Started {
                    running.set_state(TransitionState::Running);
                    running.timer.restart(
                        callback(&inner, &running, tick),
                        running.delay(),
                        Some(running.time()),
                    );
                    tick(&inner, &running, elapsed);
                }
            },
            0.0,
            None,
        );
    }

    record.set_state(TransitionState::Starting);
    let epoch = record.epoch();
    tracing::trace!(subject = ?record.target(), id = %record.id(), "transition starting");
    dispatch(record, EventType::Start);
    if record.epoch() != epoch {
        return;
    }

    record.set_state(TransitionState::Started);
    record.materialize();
}

fn tick<T: Target>(inner: &Rc<Inner<T>>, record: &Rc<ScheduleRecord<T>>, elapsed: f64) {
    let duration = record.duration();
    let t = if elapsed < duration {
        record.ease().apply(elapsed / duration)
    } else {
        record
            .timer
            .restart(callback(inner, record, finish_step), 0.0, None);
        record.set_state(TransitionState::Ending);
        record.ease().apply(1.0)
    };

    record.run_tweens(t);

    if record.state() == TransitionState::Ending {
        tracing::trace!(subject = ?record.target(), id = %record.id(), "transition ended");
        dispatch(record, EventType::End);
        finish(inner, record);
    }
}

fn finish_step<T: Target>(inner: &Rc<Inner<T>>, record: &Rc<ScheduleRecord<T>>, _elapsed: f64) {
    finish(inner, record);
}

/// Retire a record: stop its timer and drop it from the registry
pub(crate) fn finish<T: Target>(inner: &Inner<T>, record: &ScheduleRecord<T>) {
    record.set_state(TransitionState::Ended);
    record.timer.stop();
    record.release();
    inner.remove(record.target(), record.id());
}

/// A later same-name sibling became due at the same instant, while this
/// record would still be running
///
/// Starting this record would only produce an immediate interruption, so
/// it is retired silently instead. A sibling due exactly at this record's
/// end (a chained follow-up) does not count.
fn superseded<T: Target>(inner: &Inner<T>, record: &ScheduleRecord<T>) -> bool {
    let now = inner.queue.now();
    let end = record.time() + record.delay() + record.duration();
    inner.records(record.target()).iter().any(|sibling| {
        let due = sibling.time() + sibling.delay();
        sibling.id() > record.id()
            && sibling.name() == record.name()
            && sibling.state() <= TransitionState::Scheduled
            && due <= now
            && due < end
    })
}

/// Stop every live record on `target` matching `filter`
///
/// Started and running records receive `interrupt`; pending ones are
/// cancelled silently.
pub(crate) fn interrupt<T, F>(inner: &Inner<T>, target: &T, filter: F) -> usize
where
    T: Target,
    F: Fn(&ScheduleRecord<T>) -> bool,
{
    let mut stopped = 0;
    for record in inner.records(target) {
        if record.state().is_ended() || !filter(&*record) {
            continue;
        }
        let active = record.state().is_active();
        record.set_state(TransitionState::Ended);
        record.timer.stop();
        record.release();
        tracing::debug!(subject = ?target, id = %record.id(), active, "transition interrupted");
        if active {
            dispatch(&record, EventType::Interrupt);
        }
        inner.remove(target, record.id());
        stopped += 1;
    }
    stopped
}

/// Call every `event` listener on `record`
pub(crate) fn dispatch<T: Target>(record: &ScheduleRecord<T>, event: EventType) {
    let listeners = record.listeners().for_event(event);
    if listeners.is_empty() {
        return;
    }
    let context = EventContext {
        target: record.target(),
        index: record.index(),
        group: record.group(),
        id: record.id(),
        name: record.name(),
    };
    for listener in listeners {
        listener(&context);
    }
}
