//! Stemline Player - headless timeline playback
//!
//! Opens an audio output, optionally loads a timeline descriptor and then
//! reads control input from stdin (see [`console`]). Events are printed to
//! stdout as JSON, one per line; logs go to stderr.
//!
//! Set RUST_LOG=debug for verbose output.

mod config;
mod console;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};

use stemline_core::audio::{get_output_devices, AudioOutput, BufferSize};
use stemline_core::capability::NativeProvider;
use stemline_core::config::load_config;
use stemline_core::loader::{FileSource, RoutedSource};
use stemline_core::protocol::{ControlMessage, EventMessage, TimelineDescriptor, TransportAction, TransportMessage};
use stemline_core::{timeline_channels, Reclaimer, TimelineController};

use config::{player_config_path, PlayerConfig};
use console::{parse_line, Input};

/// How long the control loop waits for input before polling events
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "stemline-player")]
#[command(author, version, about = "Headless multi-track timeline player", long_about = None)]
struct Cli {
    /// Timeline descriptor (JSON) to load on startup
    timeline: Option<PathBuf>,

    /// Config file (default: ~/.config/stemline/player.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name
    #[arg(short, long)]
    device: Option<String>,

    /// Buffer size in frames
    #[arg(short, long)]
    buffer_size: Option<u32>,

    /// Base directory for relative asset paths
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Start playback as soon as the timeline is ready
    #[arg(long)]
    play: bool,

    /// Don't print cursor events
    #[arg(long)]
    quiet_cursor: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if cli.list_devices {
        for device in get_output_devices()? {
            println!("{} ({} channels)", device, device.max_channels);
        }
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(player_config_path);
    let mut config: PlayerConfig = load_config(&config_path);
    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(frames) = cli.buffer_size {
        config.audio.buffer_size = BufferSize::Fixed(frames);
    }
    if let Some(root) = &cli.asset_root {
        config.asset_root = Some(root.clone());
    }

    let output = AudioOutput::open(&config.audio)?;
    config.engine.sample_rate = output.sample_rate();

    let reclaimer = Reclaimer::start().context("failed to start collector thread")?;
    let (timeline, ports) = timeline_channels(&config.engine);

    let file = match &config.asset_root {
        Some(root) => FileSource::with_root(root),
        None => FileSource::new(),
    };
    #[allow(unused_mut)]
    let mut source = RoutedSource::new(file);
    #[cfg(feature = "http")]
    {
        source = source.with_http(stemline_core::loader::HttpSource::new(config.engine.asset_timeout())?);
    }

    let mut controller = TimelineController::new(
        config.engine.clone(),
        Arc::new(NativeProvider),
        Arc::new(source),
        reclaimer.handle(),
        ports,
    )
    .context("failed to start asset loader")?;

    let audio = output.start(timeline)?;
    if let Some(latency) = audio.latency_ms() {
        log::info!("output latency {:.1} ms", latency);
    }

    if let Some(path) = &cli.timeline {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read timeline {:?}", path))?;
        let descriptor: TimelineDescriptor = serde_json::from_str(&text)
            .with_context(|| format!("invalid timeline {:?}", path))?;
        let report = controller.load_timeline(&descriptor)?;
        log::info!(
            "loading timeline {:?}: {} assets, generation {}",
            path,
            report.assets,
            report.generation.0
        );
    }

    let lines = spawn_stdin_reader()?;
    run(&mut controller, &lines, &cli)?;

    // The stream owns the timeline; stop it before the collector goes away
    drop(audio);
    drop(controller);
    drop(reclaimer);
    log::info!("stemline-player stopped");
    Ok(())
}

fn run(controller: &mut TimelineController, lines: &Receiver<String>, cli: &Cli) -> Result<()> {
    loop {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                let result = match parse_line(&line) {
                    Ok(Input::Quit) => return Ok(()),
                    Ok(Input::Empty) => Ok(()),
                    Ok(Input::Json(text)) => controller.handle_json(&text),
                    Ok(Input::Message(message)) => controller.handle_message(message),
                    Err(e) => {
                        eprintln!("{}", e);
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    log::warn!("control message rejected: {}", e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }

        for event in controller.poll_events() {
            if cli.play && event == EventMessage::Ready {
                let play = ControlMessage::Command(TransportMessage {
                    command: TransportAction::Play,
                    cursor_sec: None,
                });
                if let Err(e) = controller.handle_message(play) {
                    log::warn!("autoplay failed: {}", e);
                }
            }
            if cli.quiet_cursor && matches!(event, EventMessage::TimelineFrameCursor { .. }) {
                continue;
            }
            println!("{}", serde_json::to_string(&event)?);
        }
    }
}

/// Forward stdin lines to a channel so the control loop can keep polling events
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("stemline-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}
