// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audible click via cpal.
//!
//! The output stream lives on its own thread for the lifetime of the
//! click, since cpal streams are not `Send` on every platform.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use tracing::{debug, error};

use super::{AudioError, ClickTrack, ClickVoice};

/// Click rendered on the default output device
pub struct AudioClick {
    voice: Arc<Mutex<ClickVoice>>,
    stop_tx: Sender<()>,
}

impl AudioClick {
    /// Open the default output device and start the click stream
    pub fn new() -> Result<Self, AudioError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        thread::spawn(move || match open_stream() {
            Ok((stream, voice)) => {
                let _ = ready_tx.send(Ok(voice));
                // Hold the stream until the click is dropped
                let _ = stop_rx.recv();
                drop(stream);
                debug!("click stream closed");
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        let voice = ready_rx
            .recv()
            .map_err(|e| AudioError::StreamFailed(e.to_string()))??;

        Ok(Self { voice, stop_tx })
    }
}

fn open_stream() -> Result<(Stream, Arc<Mutex<ClickVoice>>), AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::StreamFailed(format!("Failed to get default config: {}", e)))?;
    if supported.sample_format() != SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(format!(
            "{:?}",
            supported.sample_format()
        )));
    }

    let config: StreamConfig = supported.into();
    let channels = config.channels as usize;
    let voice = Arc::new(Mutex::new(ClickVoice::new(config.sample_rate.0)));
    let render_voice = Arc::clone(&voice);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = 0.0;
                }
                // Never block the audio thread; skip a buffer instead
                if let Ok(mut voice) = render_voice.try_lock() {
                    voice.render(Instant::now(), data, channels);
                }
            },
            move |err| {
                error!("click stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamFailed(format!("Failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFailed(format!("Failed to start stream: {}", e)))?;

    Ok((stream, voice))
}

impl ClickTrack for AudioClick {
    fn start(&self, bpm: f64) {
        self.set_tempo(bpm);
    }

    fn set_tempo(&self, bpm: f64) {
        if let Ok(mut voice) = self.voice.lock() {
            voice.set_tempo(bpm);
        }
    }

    fn trigger(&self, latency: Duration) {
        if let Ok(mut voice) = self.voice.lock() {
            voice.trigger_at(Instant::now() + latency);
        }
    }
}

impl Drop for AudioClick {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
