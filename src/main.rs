// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scoreseq::audio::{ClickTrack, LogClick};
use scoreseq::config::{ScoreEvent, ScoreWatcher, Settings};
use scoreseq::midi::{LogSink, NoteSink};
use scoreseq::sequencer::Sequencer;
use scoreseq::timing::Metronome;

fn print_usage() {
    println!("scoreseq - live-coding text score sequencer");
    println!();
    println!("Usage: scoreseq <SCORE> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <FILE>         Load settings from a .yaml or .toml file");
    println!("  --click                 Play a click on every quarter note");
    println!("  --latency <MS>          Delay clicks by MS milliseconds");
    println!("  --list-midi             List available MIDI outputs");
    println!("  --help                  Show this help message");
    println!();
    println!("The score is reloaded whenever it changes. Press Enter to stop.");
}

#[derive(Debug, Default)]
struct Args {
    score: Option<PathBuf>,
    config: Option<PathBuf>,
    click: bool,
    latency_ms: Option<u64>,
    list_midi: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let file = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file name"))?;
                parsed.config = Some(PathBuf::from(file));
            }
            "--click" => parsed.click = true,
            "--latency" => {
                let ms = iter
                    .next()
                    .ok_or_else(|| anyhow!("--latency requires a value in milliseconds"))?;
                parsed.latency_ms = Some(
                    ms.parse()
                        .map_err(|_| anyhow!("Invalid latency: {}", ms))?,
                );
            }
            "--list-midi" => parsed.list_midi = true,
            "--help" | "-h" => parsed.help = true,
            other if other.starts_with('-') => return Err(anyhow!("Unknown option: {}", other)),
            other => {
                if parsed.score.is_some() {
                    return Err(anyhow!("Only one score file may be given"));
                }
                parsed.score = Some(PathBuf::from(other));
            }
        }
    }
    Ok(parsed)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(feature = "midi")]
fn list_midi() -> Result<()> {
    let ports = scoreseq::midi::list_ports()?;
    if ports.is_empty() {
        println!("No MIDI outputs found");
    }
    for (i, name) in ports.iter().enumerate() {
        println!("{}: {}", i, name);
    }
    Ok(())
}

#[cfg(not(feature = "midi"))]
fn list_midi() -> Result<()> {
    println!("Built without MIDI support (enable the `midi` feature)");
    Ok(())
}

#[cfg(feature = "midi")]
fn open_sink(settings: &Settings) -> Result<Arc<dyn NoteSink>> {
    let sink = scoreseq::midi::MidiPortSink::open_all(settings.velocity)
        .context("Failed to open MIDI outputs")?;
    if sink.port_names().is_empty() {
        warn!("no MIDI outputs available, logging notes instead");
        return Ok(Arc::new(LogSink));
    }
    info!(ports = %sink.port_names().join(", "), "MIDI outputs open");
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "midi"))]
fn open_sink(_settings: &Settings) -> Result<Arc<dyn NoteSink>> {
    Ok(Arc::new(LogSink))
}

#[cfg(feature = "audio")]
fn open_click() -> Arc<dyn ClickTrack> {
    match scoreseq::audio::AudioClick::new() {
        Ok(click) => Arc::new(click),
        Err(e) => {
            warn!("audio click unavailable ({}), logging clicks instead", e);
            Arc::new(LogClick::new())
        }
    }
}

#[cfg(not(feature = "audio"))]
fn open_click() -> Arc<dyn ClickTrack> {
    Arc::new(LogClick::new())
}

fn run(score_path: PathBuf, settings: Settings) -> Result<()> {
    let sink = open_sink(&settings)?;
    let clock = Arc::new(Metronome::default());

    let mut builder = Sequencer::builder(clock, sink);
    if settings.click {
        builder = builder.with_click_track(open_click(), settings.latency());
    }
    let sequencer = builder.build();

    sequencer
        .load_file(&score_path)
        .with_context(|| format!("Failed to load score {:?}", score_path))?;
    let watcher = ScoreWatcher::new(&score_path, settings.debounce())?;

    sequencer.start();
    println!("Playing {:?}. Press Enter to stop.", score_path);

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        let _ = stop_tx.send(());
    });

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        match watcher.recv_timeout(Duration::from_millis(50)) {
            Some(ScoreEvent::Modified { path, source }) => match sequencer.load_source(&path, &source) {
                Ok(()) => info!(path = ?path, "score reloaded"),
                Err(e) => error!(path = ?path, "keeping previous score: {}", e),
            },
            Some(ScoreEvent::Removed(path)) => {
                warn!(path = ?path, "score removed, still playing the last version")
            }
            Some(ScoreEvent::Error(message)) => error!("{}", message),
            None => {}
        }
    }

    sequencer.stop();
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if args.help {
        print_usage();
        return Ok(());
    }

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.click |= args.click;
    if let Some(latency_ms) = args.latency_ms {
        settings.latency_ms = latency_ms;
    }
    init_logging(&settings.log_level);

    if args.list_midi {
        return list_midi();
    }

    match args.score {
        Some(score) => run(score, settings),
        None => {
            println!("scoreseq - live-coding text score sequencer");
            println!("Run with --help for usage information");
            Ok(())
        }
    }
}
