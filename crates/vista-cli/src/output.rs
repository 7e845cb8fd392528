//! Output formatting for CLI

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use vista_core::{PlayerEvent, ScreenEvent};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Print a serializable value, pretty JSON or debug-ish text
pub fn print_value<T: Serialize>(data: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => {
            let value = serde_json::to_value(data)?;
            if let serde_json::Value::Object(map) = value {
                for (key, value) in map {
                    println!("  {key}: {value}");
                }
            } else {
                println!("{value}");
            }
        }
    }
    Ok(())
}

/// Prints screen events as they come out of a simulation
pub struct EventPrinter {
    format: OutputFormat,
    printed: usize,
}

impl EventPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, printed: 0 }
    }

    pub fn printed(&self) -> usize {
        self.printed
    }

    /// `at` is the scenario clock in seconds
    pub fn print(&mut self, at: f64, event: &ScreenEvent) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let line = json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "at": at,
                    "event": event,
                });
                println!("{}", serde_json::to_string(&line)?);
            }
            OutputFormat::Text => println!("[{at:>8.3}s] {}", describe(event)),
        }
        self.printed += 1;
        Ok(())
    }
}

fn describe(event: &ScreenEvent) -> String {
    match event {
        ScreenEvent::Player { event } => match event {
            PlayerEvent::StateChanged { state } => format!("state       -> {state}"),
            PlayerEvent::PlayTimeChanged { current, total } => {
                format!("play time   {current:.2} / {total:.2}")
            }
            PlayerEvent::LoadedTimeChanged { loaded, total } => {
                format!("loaded      {loaded:.2} / {total:.2}")
            }
            PlayerEvent::IsPlayingChanged { playing } => format!("playing     {playing}"),
            PlayerEvent::BufferingRetry { attempt } => format!("retrying    attempt {attempt}"),
        },
        ScreenEvent::OverlayChanged { overlay } => format!(
            "overlay     showing={} loader={} preview={} rate={}",
            overlay.is_showing, overlay.loader_visible, overlay.preview_visible, overlay.rate
        ),
        ScreenEvent::PeriodSelected { index, length_secs } => {
            format!("period      #{index} ({length_secs}s)")
        }
        ScreenEvent::Favourite => "favourite".to_string(),
        ScreenEvent::Closed => "closed".to_string(),
        ScreenEvent::Failed { code, message } => format!("failed      [{code}] {message}"),
    }
}
