// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Click track for the sequencer.
//!
//! This module provides:
//! - The [`ClickTrack`] interface the sequencer drives on every quarter note
//! - A trace-log click for running without an audio device
//! - A synthesized click rendered through cpal (feature `audio`)

#[cfg(feature = "audio")]
pub mod output;

#[cfg(feature = "audio")]
pub use output::AudioClick;

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::trace;

/// Click generator driven by the sequencer
pub trait ClickTrack: Send + Sync {
    /// Begin producing clicks at the given reference tempo
    fn start(&self, bpm: f64);

    /// Follow a tempo change
    fn set_tempo(&self, bpm: f64);

    /// Sound one click after `latency`
    fn trigger(&self, latency: Duration);
}

/// Click that only writes to the trace log
#[derive(Debug, Default)]
pub struct LogClick {
    bpm: AtomicU64,
}

impl LogClick {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tempo last handed to this click
    pub fn tempo(&self) -> f64 {
        f64::from_bits(self.bpm.load(Ordering::Relaxed))
    }
}

impl ClickTrack for LogClick {
    fn start(&self, bpm: f64) {
        self.set_tempo(bpm);
    }

    fn set_tempo(&self, bpm: f64) {
        self.bpm.store(bpm.to_bits(), Ordering::Relaxed);
    }

    fn trigger(&self, latency: Duration) {
        trace!(?latency, bpm = self.tempo(), "click");
    }
}

/// Frequency of the click tone
pub const CLICK_FREQUENCY: f32 = 1000.0;

/// Longest click, shortened at fast tempos
pub const MAX_CLICK_LENGTH: Duration = Duration::from_millis(30);

/// Click synthesis state, shared between the trigger side and the
/// audio callback
#[derive(Debug, Clone)]
pub struct ClickVoice {
    sample_rate: u32,
    /// Length of one click in frames
    length: usize,
    /// Frame within the current click, `None` when silent
    position: Option<usize>,
    /// Clicks waiting for their time to come
    pending: Vec<Instant>,
}

impl ClickVoice {
    pub fn new(sample_rate: u32) -> Self {
        let mut voice = Self {
            sample_rate,
            length: 0,
            position: None,
            pending: Vec::new(),
        };
        voice.set_tempo(60.0);
        voice
    }

    /// Clicks last at most an eighth of a beat
    pub fn set_tempo(&mut self, bpm: f64) {
        let eighth = Duration::from_secs_f64(60.0 / bpm.max(1.0) / 8.0);
        let length = eighth.min(MAX_CLICK_LENGTH);
        self.length = ((length.as_secs_f64() * self.sample_rate as f64) as usize).max(1);
    }

    /// Click length in frames
    pub fn length(&self) -> usize {
        self.length
    }

    /// Queue a click at `at`
    pub fn trigger_at(&mut self, at: Instant) {
        self.pending.push(at);
    }

    /// Whether a click is currently sounding
    pub fn is_sounding(&self) -> bool {
        self.position.is_some()
    }

    /// Mix the click into an interleaved buffer
    pub fn render(&mut self, now: Instant, data: &mut [f32], channels: usize) {
        let due = self.pending.len();
        self.pending.retain(|at| *at > now);
        if self.pending.len() < due {
            self.position = Some(0);
        }

        let Some(mut position) = self.position else {
            return;
        };
        for frame in data.chunks_mut(channels.max(1)) {
            if position >= self.length {
                self.position = None;
                return;
            }
            let t = position as f32 / self.sample_rate as f32;
            let envelope = 1.0 - position as f32 / self.length as f32;
            let sample = (TAU * CLICK_FREQUENCY * t).sin() * envelope * 0.5;
            for out in frame.iter_mut() {
                *out += sample;
            }
            position += 1;
        }
        self.position = Some(position);
    }
}

/// Audio error types
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("No audio device available")]
    NoDevice,
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
}
