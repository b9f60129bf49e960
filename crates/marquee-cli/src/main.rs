//! Marquee CLI - Headless Player QC and Replay Tool
//!
//! Features:
//! - Source classification
//! - Scripted scenario replay through a full player instance
//! - Shortcut binding inspection

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Marquee CLI - Playback state toolkit
#[derive(Parser)]
#[command(name = "marquee-cli")]
#[command(author = "Marquee Media")]
#[command(version)]
#[command(about = "Playback state analysis and replay toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify media sources
    Classify {
        /// URLs or paths to classify
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Replay a scripted scenario through a player instance
    Replay {
        /// Path to a JSON scenario file
        scenario: PathBuf,

        /// Forward collected analytics to a beacon URL after the run
        #[arg(long)]
        beacon: Option<String>,

        /// Print every captured player event after the timeline
        #[arg(short, long)]
        events: bool,
    },

    /// Show the built-in shortcut bindings
    Shortcuts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    match cli.command {
        Commands::Classify { inputs } => {
            commands::classify(&inputs, &cli.format)?;
        }
        Commands::Replay { scenario, beacon, events } => {
            commands::replay(&scenario, beacon, events, &cli.format).await?;
        }
        Commands::Shortcuts => {
            commands::shortcuts(&cli.format)?;
        }
    }

    Ok(())
}
