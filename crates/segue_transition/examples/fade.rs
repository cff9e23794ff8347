//! Fade Demo
//!
//! Fades three panels in with a stagger and chains a short settle after
//! each. When the body panel starts fading in, a competing fade-out is
//! scheduled on it: it interrupts the fade-in and cancels the body's
//! pending settle. Run with `RUST_LOG=segue_transition=debug` to watch the
//! scheduler's decisions.

use anyhow::Result;
use segue_timer::{DriverConfig, FrameDriver, TimerQueue};
use segue_transition::{EventContext, TransitionDefaults, Transitions, Tween};
use std::cell::RefCell;
use std::rc::Rc;

const PANELS: [&str; 3] = ["header", "body", "footer"];

const DEFAULTS: &str = r#"
duration_ms = 300.0
ease = "cubic-in-out"
"#;

type Levels = Rc<RefCell<Vec<f64>>>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let defaults: TransitionDefaults = toml::from_str(DEFAULTS)?;
    let queue = TimerQueue::new();
    let transitions = Transitions::with_defaults(queue.clone(), defaults);
    let opacity: Levels = Rc::new(RefCell::new(vec![0.0; PANELS.len()]));

    let fade_in = transitions.transition(PANELS, Some("fade"));
    fade_in
        .delay_with(|_, index| index as f64 * 100.0)?
        .tween("opacity", opacity_tween(&opacity, Some(0.0), 1.0))?
        .on("start end interrupt", log_event("fade in"))?;

    let settle = fade_in.transition()?;
    settle
        .duration(150.0)?
        .tween("opacity", opacity_tween(&opacity, None, 0.85))?
        .on("start end interrupt", log_event("settle"))?;

    // The competing fade is scheduled from inside the body's start event.
    let competitor = transitions.clone();
    let levels = Rc::clone(&opacity);
    fade_in.on("start.compete", move |ctx: &EventContext<'_, &'static str>| {
        if *ctx.target != "body" {
            return;
        }
        let fade_out = competitor.transition([*ctx.target], Some("fade"));
        let scheduled = fade_out
            .delay(150.0)
            .and_then(|t| t.tween("opacity", opacity_tween(&levels, None, 0.0)))
            .and_then(|t| t.on("start end interrupt", log_event("fade out")));
        if let Err(err) = scheduled {
            tracing::warn!(%err, "could not schedule fade out");
        }
    })?;

    let mut driver = FrameDriver::new(queue, DriverConfig::standard());
    let wakes = driver.run_until_idle();

    for (panel, level) in PANELS.iter().zip(opacity.borrow().iter()) {
        tracing::info!(panel, opacity = %format!("{:.2}", level), "settled");
    }
    tracing::info!(wakes, "all transitions finished");
    Ok(())
}

fn log_event(phase: &'static str) -> impl Fn(&EventContext<'_, &'static str>) + 'static {
    move |ctx| tracing::info!(panel = ctx.target, id = %ctx.id, phase, "event")
}

/// Interpolates a panel's opacity from `from` (or its level at start) to `to`
fn opacity_tween(
    levels: &Levels,
    from: Option<f64>,
    to: f64,
) -> impl Fn(&&'static str, usize, &[&'static str]) -> Option<Tween> + 'static {
    let levels = Rc::clone(levels);
    move |target, _index, _group| {
        let slot = PANELS.iter().position(|panel| panel == target)?;
        let start = from.unwrap_or_else(|| levels.borrow()[slot]);
        let levels = Rc::clone(&levels);
        Some(Box::new(move |t: f64| {
            levels.borrow_mut()[slot] = start + (to - start) * t;
        }) as Tween)
    }
}
