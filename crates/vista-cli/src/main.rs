//! Vista CLI - Headless driver for the player component
//!
//! Features:
//! - Scripted playback scenarios against the simulated engine
//! - Configuration printing and validation
//! - Source inspection

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::OutputFormat;

/// Vista CLI - Player component toolkit
#[derive(Parser)]
#[command(name = "vista")]
#[command(author = "Vista Contributors")]
#[command(version)]
#[command(about = "Drive and inspect the Vista player component", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scripted session on a virtual clock
    Simulate {
        /// Source locator (URL or file:// path)
        locator: String,

        /// Display name of the resource
        #[arg(short, long, default_value = "Camera")]
        name: String,

        /// Preview image URL (defaults to the locator)
        #[arg(long)]
        preview: Option<String>,

        /// Media length in seconds
        #[arg(short, long, default_value = "10")]
        duration: f64,

        /// Seek issued before the source is ready
        #[arg(short, long)]
        seek_to: Option<f64>,

        /// Seconds until the engine reports ready
        #[arg(long, default_value = "0.5")]
        load_latency: f64,

        /// Run the buffer dry at this time
        #[arg(long)]
        stall_at: Option<f64>,

        /// How long the stall lasts
        #[arg(long, default_value = "2")]
        stall_for: f64,

        /// Fail the item at this time
        #[arg(long)]
        fail_at: Option<f64>,

        /// Screen configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration or validate a file
    Config {
        /// Configuration JSON to validate
        path: Option<PathBuf>,
    },

    /// Show how a locator would be opened
    Inspect {
        /// Source locator
        locator: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
    vista_core::init();

    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Simulate {
            locator,
            name,
            preview,
            duration,
            seek_to,
            load_latency,
            stall_at,
            stall_for,
            fail_at,
            config,
        } => {
            let scenario = commands::Scenario {
                locator,
                name,
                preview,
                duration,
                seek_to,
                load_latency,
                stall_at,
                stall_for,
                fail_at,
                config,
            };
            commands::simulate(&scenario, format)?;
        }
        Commands::Config { path } => {
            commands::config(path, format)?;
        }
        Commands::Inspect { locator } => {
            commands::inspect(&locator, format)?;
        }
    }

    Ok(())
}
