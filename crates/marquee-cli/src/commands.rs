//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};
use tracing::warn;

use marquee_core::analytics::AnalyticsEmitter;
use marquee_core::config::PlayerConfig;
use marquee_core::keyboard::KeyTarget;
use marquee_core::player::Player;
use marquee_core::source::Source;
use marquee_core::surface::{SimulatedSurface, SurfaceEvent};
use marquee_core::timecode::format_time;

use crate::output::OutputFormat;

// =============================================================================
// classify
// =============================================================================

#[derive(Tabled)]
struct ClassifyRow {
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Embedded")]
    embedded: bool,
}

/// Classify one or more source inputs
pub fn classify(inputs: &[String], format: &str) -> anyhow::Result<()> {
    let sources: Vec<Source> = inputs.iter().map(|input| Source::classify(input)).collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&sources)?);
        }
        OutputFormat::Table => {
            let rows: Vec<ClassifyRow> = inputs
                .iter()
                .zip(&sources)
                .map(|(input, source)| ClassifyRow {
                    input: input.clone(),
                    kind: source.kind.as_str(),
                    embedded: source.kind.is_embedded(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Text => {
            for (input, source) in inputs.iter().zip(&sources) {
                println!("{}: {}", input, source.kind.as_str());
            }
        }
    }

    Ok(())
}

// =============================================================================
// replay
// =============================================================================

/// Scripted run: a player config plus an ordered list of steps
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    config: PlayerConfig,
    steps: Vec<Step>,
}

/// One replay step
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    /// Player intent, dispatched as if a control invoked it
    Action(ActionStep),
    /// Raw surface event, reconciled through the bridge
    Event(SurfaceEvent),
    /// Simulated playback time passing, in milliseconds
    AdvanceMs(u64),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ActionStep {
    SetSource { src: String },
    Play,
    Pause,
    TogglePlay,
    Stop,
    Seek { position: f64 },
    SeekForward,
    SeekBackward,
    SetVolume { volume: f64 },
    Mute,
    Unmute,
    ToggleMute,
    SetRate { rate: f64 },
    Key { key: String },
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Step::Action(action) => action.describe(),
            Step::Event(event) => format!("event {}", event_label(event)),
            Step::AdvanceMs(ms) => format!("advance {}ms", ms),
        }
    }
}

impl ActionStep {
    fn describe(&self) -> String {
        match self {
            ActionStep::SetSource { src } => format!("set source {}", src),
            ActionStep::Play => "play".to_string(),
            ActionStep::Pause => "pause".to_string(),
            ActionStep::TogglePlay => "toggle play".to_string(),
            ActionStep::Stop => "stop".to_string(),
            ActionStep::Seek { position } => format!("seek to {}", format_time(*position)),
            ActionStep::SeekForward => "seek forward".to_string(),
            ActionStep::SeekBackward => "seek backward".to_string(),
            ActionStep::SetVolume { volume } => format!("set volume {:.2}", volume),
            ActionStep::Mute => "mute".to_string(),
            ActionStep::Unmute => "unmute".to_string(),
            ActionStep::ToggleMute => "toggle mute".to_string(),
            ActionStep::SetRate { rate } => format!("set rate {:.2}", rate),
            ActionStep::Key { key } => format!("key '{}'", key),
        }
    }
}

fn event_label(event: &SurfaceEvent) -> &'static str {
    match event {
        SurfaceEvent::LoadStart => "load_start",
        SurfaceEvent::LoadedMetadata { .. } => "loaded_metadata",
        SurfaceEvent::LoadedData => "loaded_data",
        SurfaceEvent::CanPlay => "can_play",
        SurfaceEvent::Play => "play",
        SurfaceEvent::Playing => "playing",
        SurfaceEvent::Pause => "pause",
        SurfaceEvent::Ended => "ended",
        SurfaceEvent::TimeUpdate { .. } => "time_update",
        SurfaceEvent::DurationChange { .. } => "duration_change",
        SurfaceEvent::Progress { .. } => "progress",
        SurfaceEvent::Waiting => "waiting",
        SurfaceEvent::Seeking => "seeking",
        SurfaceEvent::Seeked { .. } => "seeked",
        SurfaceEvent::VolumeChange { .. } => "volume_change",
        SurfaceEvent::RateChange { .. } => "rate_change",
        SurfaceEvent::Error { .. } => "error",
        SurfaceEvent::FullscreenChange { .. } => "fullscreen_change",
        SurfaceEvent::PipChange { .. } => "pip_change",
    }
}

#[derive(Serialize, Tabled)]
struct TimelineRow {
    #[tabled(rename = "#")]
    step: usize,
    #[tabled(rename = "Step")]
    description: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Volume")]
    volume: String,
}

/// Replay a scripted scenario through a full player instance
pub async fn replay(
    path: &Path,
    beacon: Option<String>,
    show_events: bool,
    format: &str,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("parsing scenario {}", path.display()))?;

    let surface = Arc::new(SimulatedSurface::new());
    let mut events = surface.events();
    let player = Player::new(surface.clone(), scenario.config);

    let emitter = Arc::new(match &beacon {
        Some(url) => AnalyticsEmitter::with_beacon(player.id(), url),
        None => AnalyticsEmitter::new(player.id()),
    });
    player.attach_analytics(emitter.clone());

    let mut timeline = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.into_iter().enumerate() {
        let description = step.describe();

        match step {
            Step::Action(action) => perform(&player, action).await,
            Step::Event(event) => player.bridge().process(event).await,
            Step::AdvanceMs(ms) => surface.advance(ms as f64 / 1000.0),
        }
        player.bridge().drain(&mut events).await;

        let snap = player.snapshot();
        timeline.push(TimelineRow {
            step: index + 1,
            description,
            phase: snap.phase.to_string(),
            position: format_time(snap.current_time),
            volume: if snap.muted {
                format!("{:.2} (muted)", snap.volume)
            } else {
                format!("{:.2}", snap.volume)
            },
        });
    }

    let records = emitter.records();

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "player_id": player.id(),
                "timeline": timeline,
                "events": records,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            println!("{}", Table::new(&timeline));
            if show_events {
                print_event_records(&records);
            }
        }
        OutputFormat::Text => {
            println!("Replay of {} ({} steps):", path.display(), timeline.len());
            for row in &timeline {
                println!(
                    "  {:>3}. {:32} {:>10} {:>9} {:>14}",
                    row.step, row.description, row.phase, row.position, row.volume
                );
            }
            if show_events {
                print_event_records(&records);
            }
            let snap = player.snapshot();
            println!("\nFinal phase: {}", snap.phase);
            println!("Events captured: {}", records.len());
        }
    }

    if beacon.is_some() {
        emitter.flush().await;
    }

    Ok(())
}

async fn perform(player: &Player, action: ActionStep) {
    let dispatcher = player.dispatcher();
    match action {
        ActionStep::SetSource { src } => dispatcher.set_source(Some(Source::classify(&src))),
        ActionStep::Play => {
            if let Err(error) = dispatcher.play().await {
                warn!(%error, "play rejected during replay");
            }
        }
        ActionStep::Pause => dispatcher.pause(),
        ActionStep::TogglePlay => {
            if let Err(error) = dispatcher.toggle_play().await {
                warn!(%error, "toggle rejected during replay");
            }
        }
        ActionStep::Stop => dispatcher.stop(),
        ActionStep::Seek { position } => dispatcher.seek(position),
        ActionStep::SeekForward => dispatcher.seek_forward(None),
        ActionStep::SeekBackward => dispatcher.seek_backward(None),
        ActionStep::SetVolume { volume } => dispatcher.set_volume(volume),
        ActionStep::Mute => dispatcher.mute(),
        ActionStep::Unmute => dispatcher.unmute(),
        ActionStep::ToggleMute => dispatcher.toggle_mute(),
        ActionStep::SetRate { rate } => dispatcher.set_rate(rate),
        ActionStep::Key { key } => {
            player.shortcuts().handle(&key, KeyTarget::Player).await;
        }
    }
}

fn print_event_records(records: &[marquee_core::analytics::PlayerEventRecord]) {
    println!("\nCaptured events:");
    for record in records {
        println!(
            "  [{}] {:>4}  {}",
            record.timestamp.format("%H:%M:%S%.3f"),
            record.sequence,
            record.event.kind()
        );
    }
}

// =============================================================================
// shortcuts
// =============================================================================

#[derive(Serialize, Tabled)]
struct BindingRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Action")]
    action: &'static str,
}

/// Print the built-in shortcut binding table
pub fn shortcuts(format: &str) -> anyhow::Result<()> {
    // A router only exists wired to a player, so build a throwaway one
    let surface = Arc::new(SimulatedSurface::new());
    let player = Player::new(surface, PlayerConfig::default());

    let rows: Vec<BindingRow> = player
        .shortcuts()
        .bindings()
        .into_iter()
        .map(|(key, action)| BindingRow {
            key: display_key(key),
            action: action.describe(),
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            println!("{}", Table::new(rows));
        }
        OutputFormat::Text => {
            for row in &rows {
                println!("  {:12} {}", row.key, row.action);
            }
        }
    }

    Ok(())
}

fn display_key(key: &str) -> String {
    if key == " " {
        "Space".to_string()
    } else {
        key.to_string()
    }
}
