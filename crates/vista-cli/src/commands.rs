//! CLI command implementations

use crate::output::{print_value, EventPrinter, OutputFormat};
use anyhow::{bail, Context};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;
use vista_core::timer::earliest;
use vista_core::{
    EngineSignals, PlaybackState, Resource, Screen, ScreenConfig, SimController,
    SimulatedEngine, SourceDescriptor,
};

/// Upper bound on scheduler steps before a scenario is considered stuck
const MAX_STEPS: usize = 100_000;

/// Scripted timeline of a simulated session
#[derive(Debug, Clone)]
pub struct Scenario {
    pub locator: String,
    pub name: String,
    pub preview: Option<String>,
    /// Media length in seconds
    pub duration: f64,
    /// Seek issued before the source is ready
    pub seek_to: Option<f64>,
    /// Seconds until the engine reports ready
    pub load_latency: f64,
    pub stall_at: Option<f64>,
    pub stall_for: f64,
    pub fail_at: Option<f64>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Ready,
    Stall,
    Recover,
    Fail,
}

impl Scenario {
    /// Engine-side happenings, ordered by time
    fn timeline(&self) -> Vec<(f64, Step)> {
        let mut steps = vec![(self.load_latency, Step::Ready)];
        if let Some(at) = self.stall_at {
            steps.push((at, Step::Stall));
            steps.push((at + self.stall_for, Step::Recover));
        }
        if let Some(at) = self.fail_at {
            steps.push((at, Step::Fail));
        }
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));
        steps
    }
}

/// Run a scripted session against the simulated engine on a virtual clock
pub fn simulate(scenario: &Scenario, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &scenario.config {
        Some(path) => load_config(path)?,
        None => ScreenConfig::default(),
    };

    let locator = Url::parse(&scenario.locator)
        .with_context(|| format!("invalid locator {}", scenario.locator))?;
    let preview = match &scenario.preview {
        Some(preview) => Url::parse(preview).context("invalid preview image")?,
        None => locator.clone(),
    };
    let resource = Resource::single(locator, preview, scenario.name.clone());

    let (engine, controller) = SimulatedEngine::new();
    let (mut screen, mut signals) = Screen::new(engine, config)?;
    let start = Instant::now();
    let mut now = start;
    let mut printer = EventPrinter::new(format);

    info!(locator = %scenario.locator, duration = scenario.duration, "Starting scenario");

    screen.set_resource(resource, 0, now)?;
    controller.set_duration(scenario.duration);
    if let Some(to) = scenario.seek_to {
        screen.seek(to, None, now);
    }
    flush(&mut screen, &mut printer, 0.0)?;

    let mut timeline = scenario.timeline().into_iter().peekable();
    let mut steps = 0;

    loop {
        let next_step = timeline.peek().map(|(at, _)| offset(start, *at));
        let Some(next) = earliest(screen.next_deadline(), next_step) else {
            break;
        };

        steps += 1;
        if steps > MAX_STEPS {
            bail!("scenario did not settle after {MAX_STEPS} steps");
        }

        let next = next.max(now);
        controller.advance((next - now).as_secs_f64());
        now = next;
        let at = (now - start).as_secs_f64();

        while let Some((_, step)) = timeline.next_if(|(t, _)| offset(start, *t) <= now) {
            debug!(at, ?step, "Scenario step");
            apply_step(step, &controller);
            settle(&mut screen, &mut signals, &controller, now);
        }

        screen.on_timer(now);
        settle(&mut screen, &mut signals, &controller, now);
        flush(&mut screen, &mut printer, at)?;
    }

    let final_state = screen.layer().state();
    screen.close();
    flush(&mut screen, &mut printer, (now - start).as_secs_f64())?;

    info!(
        state = %final_state,
        events = printer.printed(),
        observer_errors = controller.observer_errors(),
        "Scenario finished"
    );
    if format == OutputFormat::Text {
        println!();
        println!("Final state: {final_state}");
        println!("Events:      {}", printer.printed());
    }
    if final_state == PlaybackState::Error {
        bail!("session ended in error");
    }
    Ok(())
}

fn offset(start: Instant, secs: f64) -> Instant {
    start + Duration::from_secs_f64(secs.max(0.0))
}

fn apply_step(step: Step, controller: &SimController) {
    match step {
        Step::Ready => {
            controller.ready();
            controller.set_likely_to_keep_up(true);
        }
        Step::Stall => controller.buffer_empty(),
        Step::Recover => controller.set_likely_to_keep_up(true),
        Step::Fail => controller.fail_item("simulated decode failure"),
    }
}

/// Handle queued signals; seeks land as soon as they are issued
fn settle(
    screen: &mut Screen<SimulatedEngine>,
    signals: &mut EngineSignals,
    controller: &SimController,
    now: Instant,
) {
    loop {
        screen.pump(signals, now);
        if !controller.complete_seek() {
            break;
        }
    }
}

fn flush(
    screen: &mut Screen<SimulatedEngine>,
    printer: &mut EventPrinter,
    at: f64,
) -> anyhow::Result<()> {
    for event in screen.drain_events() {
        printer.print(at, &event)?;
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ScreenConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = ScreenConfig::from_json(&json)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Print the default configuration, or validate one from disk
pub fn config(path: Option<PathBuf>, format: OutputFormat) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let config = load_config(&path)?;
            if format == OutputFormat::Text {
                println!("{} is valid", path.display());
            }
            println!("{}", config.to_json()?);
        }
        None => println!("{}", ScreenConfig::default().to_json()?),
    }
    Ok(())
}

/// Describe how a locator would be opened
pub fn inspect(locator: &str, format: OutputFormat) -> anyhow::Result<()> {
    let source = SourceDescriptor::parse(locator)?;
    let info = json!({
        "locator": source.locator.as_str(),
        "scheme": source.locator.scheme(),
        "host": source.locator.host_str(),
        "kind": source.kind(),
    });
    if format == OutputFormat::Text {
        println!("Inspecting source: {locator}");
    }
    print_value(&info, format)
}
