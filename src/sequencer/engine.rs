// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback engine.
//!
//! The [`Sequencer`] owns the live score and the playback cursor behind a
//! single lock. The pulse clock calls into it once per pulse; a reload
//! parses into a fresh [`Score`] and swaps it in under the same lock.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, trace, warn};

use super::model::{aggregate, Chord, Score};
use super::parser::{parse_score, ParseError};
use crate::audio::ClickTrack;
use crate::midi::NoteSink;
use crate::music::{PitchResolver, StandardResolver};
use crate::timing::{ClockState, PulseClock, PulseHandler, PULSES_PER_QUARTER_NOTE};

/// Tempo the click generator is started at
pub const CLICK_REFERENCE_TEMPO: f64 = 60.0;

/// Where playback currently is
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// Index into the chain
    pub chain_position: usize,
    /// Name of the section playing
    pub section: String,
    /// Measure within the section; `None` before the first downbeat
    pub measure: Option<usize>,
}

/// Cursor into the score, only moved by the pulse handler and `start`
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    chain_position: usize,
    section_index: usize,
    measure: Option<usize>,
}

/// State guarded by the engine lock
#[derive(Debug, Default)]
struct Playback {
    score: Arc<Score>,
    cursor: Cursor,
}

impl Playback {
    /// Re-resolve the section index after the chain position or the score
    /// changed
    fn sync_section(&mut self) {
        if self.score.chain.is_empty() {
            self.cursor = Cursor::default();
            return;
        }
        self.cursor.chain_position %= self.score.chain.len();
        if let Some((index, _)) = self.score.section_at(self.cursor.chain_position) {
            self.cursor.section_index = index;
        }
    }
}

struct Engine {
    playback: Mutex<Playback>,
    clock: Arc<dyn PulseClock>,
    sink: Arc<dyn NoteSink>,
    click: Option<Arc<dyn ClickTrack>>,
    latency: Duration,
    resolver: Box<dyn PitchResolver>,
}

impl Engine {
    fn lock(&self) -> MutexGuard<'_, Playback> {
        // A panicking sink must not wedge playback
        self.playback.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_tempo(&self, bpm: f64) {
        self.clock.set_tempo(bpm);
        if let Some(click) = &self.click {
            click.set_tempo(bpm);
        }
    }

    fn emit(&self, pulse: u32) {
        let mut playback = self.lock();
        if playback.score.is_empty() {
            return;
        }

        if pulse == 0 {
            let next = playback.cursor.measure.map_or(0, |m| m + 1);
            let num_measures = playback.score.sections[playback.cursor.section_index].num_measures;
            if next >= num_measures && playback.cursor.measure.is_some() {
                playback.cursor.chain_position += 1;
                playback.sync_section();
                playback.cursor.measure = Some(0);

                let section = &playback.score.sections[playback.cursor.section_index];
                debug!(
                    section = %section.name,
                    chain_position = playback.cursor.chain_position,
                    "next section"
                );
                if section.tempo != 0.0 {
                    self.update_tempo(section.tempo);
                }
            } else {
                playback.cursor.measure = Some(next);
            }
            trace!(
                chain_position = playback.cursor.chain_position,
                measure = ?playback.cursor.measure,
                "downbeat"
            );
        }

        if let Some(click) = &self.click {
            if pulse % PULSES_PER_QUARTER_NOTE == 0 {
                click.trigger(self.latency);
            }
        }

        let measure_index = playback.cursor.measure.unwrap_or(0);
        let section = &playback.score.sections[playback.cursor.section_index];
        for part in &section.parts {
            let Some(measure) = part.measure_for(measure_index) else {
                continue;
            };
            let Some(batch) = measure.events_at(pulse) else {
                continue;
            };

            let (off, on) = aggregate(batch);
            trace!(instruments = %part.instruments.join(", "), pulse, "emit");
            let off = Chord::off(off);
            let on = Chord::on(on);
            for instrument in &part.instruments {
                // Release before striking so a retrigger is not swallowed
                for chord in [&off, &on] {
                    if chord.notes.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.sink.deliver(instrument, chord) {
                        warn!(instrument = %instrument, "delivery failed: {:#}", e);
                    }
                }
            }
        }
    }
}

impl PulseHandler for Engine {
    fn on_pulse(&self, pulse: u32) {
        self.emit(pulse);
    }
}

/// Builder for a [`Sequencer`]
pub struct SequencerBuilder {
    clock: Arc<dyn PulseClock>,
    sink: Arc<dyn NoteSink>,
    click: Option<Arc<dyn ClickTrack>>,
    latency: Duration,
    resolver: Box<dyn PitchResolver>,
}

impl SequencerBuilder {
    /// Enable the click track, triggered `latency` after each quarter note
    pub fn with_click_track(mut self, click: Arc<dyn ClickTrack>, latency: Duration) -> Self {
        self.click = Some(click);
        self.latency = latency;
        self
    }

    /// Use a different note/chord resolver
    pub fn with_resolver(mut self, resolver: Box<dyn PitchResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn build(self) -> Sequencer {
        Sequencer {
            engine: Arc::new(Engine {
                playback: Mutex::new(Playback::default()),
                clock: self.clock,
                sink: self.sink,
                click: self.click,
                latency: self.latency,
                resolver: self.resolver,
            }),
        }
    }
}

/// Plays a parsed score against a pulse clock
pub struct Sequencer {
    engine: Arc<Engine>,
}

impl Sequencer {
    /// Start building a sequencer driven by `clock` and playing into `sink`
    pub fn builder(clock: Arc<dyn PulseClock>, sink: Arc<dyn NoteSink>) -> SequencerBuilder {
        SequencerBuilder {
            clock,
            sink,
            click: None,
            latency: Duration::ZERO,
            resolver: Box::new(StandardResolver),
        }
    }

    /// Sequencer with no click track and the standard resolver
    pub fn new(clock: Arc<dyn PulseClock>, sink: Arc<dyn NoteSink>) -> Self {
        Self::builder(clock, sink).build()
    }

    /// Rewind to the top of the chain and start the clock
    pub fn start(&self) {
        let tempo = {
            let mut playback = self.engine.lock();
            playback.cursor = Cursor::default();
            playback.sync_section();
            playback
                .score
                .section_at(0)
                .map(|(_, section)| section.tempo)
                .unwrap_or(0.0)
        };

        if let Some(click) = &self.engine.click {
            click.start(CLICK_REFERENCE_TEMPO);
        }
        if tempo != 0.0 {
            self.engine.update_tempo(tempo);
        }
        info!(tempo = self.engine.clock.tempo(), "sequencer started");
        self.engine.clock.start(self.engine.clone());
    }

    /// Stop the clock; no more pulses are processed
    pub fn stop(&self) {
        self.engine.clock.stop();
        info!("sequencer stopped");
    }

    /// Change tempo on the clock and click track
    pub fn set_tempo(&self, bpm: f64) {
        self.engine.update_tempo(bpm);
    }

    /// Whether the clock is running
    pub fn is_running(&self) -> bool {
        self.engine.clock.state() == ClockState::Running
    }

    /// Process one pulse. The clock normally calls this; it is public so
    /// callers with their own timing source can drive playback directly.
    pub fn emit(&self, pulse: u32) {
        self.engine.emit(pulse);
    }

    /// Parse `source` and, if it is valid, replace the playing score.
    ///
    /// On error the current score keeps playing untouched.
    pub fn parse(&self, source: &str) -> Result<(), ParseError> {
        let score = parse_score(source, self.engine.resolver.as_ref())?;

        let mut playback = self.engine.lock();
        playback.score = Arc::new(score);
        playback.sync_section();
        Ok(())
    }

    /// Parse `source`, read from `path`, and swap it in, logging how long
    /// the parse took. Used for the first load and every reload.
    pub fn load_source<P: AsRef<Path>>(&self, path: P, source: &str) -> Result<(), ParseError> {
        let started = Instant::now();
        self.parse(source)?;
        info!(
            "parsed sequence {:?} in {:.1} ms",
            path.as_ref(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Read and parse a score file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read score file: {:?}", path))?;
        self.load_source(path, &source)
            .with_context(|| format!("Failed to parse score file: {:?}", path))?;
        Ok(())
    }

    /// Snapshot of the score currently loaded
    pub fn score(&self) -> Arc<Score> {
        Arc::clone(&self.engine.lock().score)
    }

    /// Current playback position, `None` when nothing is loaded
    pub fn position(&self) -> Option<Position> {
        let playback = self.engine.lock();
        let section = playback.score.sections.get(playback.cursor.section_index)?;
        Some(Position {
            chain_position: playback.cursor.chain_position,
            section: section.name.clone(),
            measure: playback.cursor.measure,
        })
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        // The clock thread holds the engine, so it would otherwise play on
        self.engine.clock.stop();
    }
}
