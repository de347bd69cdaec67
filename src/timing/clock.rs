// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pulse clock implementation.
//!
//! This module provides a BPM-based clock that runs on its own thread and
//! hands every pulse of the measure grid (24 PPQN, four quarter notes per
//! measure) to a registered handler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Pulses Per Quarter Note - MIDI standard is 24
pub const PULSES_PER_QUARTER_NOTE: u32 = 24;

/// Quarter notes in one measure
pub const QUARTER_NOTES_PER_MEASURE: u32 = 4;

/// Pulses in one measure; pulse indices cycle through `0..PULSES_PER_MEASURE`
pub const PULSES_PER_MEASURE: u32 = PULSES_PER_QUARTER_NOTE * QUARTER_NOTES_PER_MEASURE;

/// Slowest accepted tempo
pub const MIN_TEMPO: f64 = 1.0;

/// Fastest accepted tempo
pub const MAX_TEMPO: f64 = 300.0;

/// Clock state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
}

/// Receives pulses from a [`PulseClock`]
pub trait PulseHandler: Send + Sync {
    /// Called once per pulse with the pulse index within the measure
    fn on_pulse(&self, pulse: u32);
}

/// A periodic pulse source.
///
/// Methods take `&self` so the clock can be shared with the handler it
/// drives (a tick may change the tempo).
pub trait PulseClock: Send + Sync {
    /// Begin delivering pulses to `handler`, starting at pulse 0
    fn start(&self, handler: Arc<dyn PulseHandler>);

    /// Stop delivering pulses
    fn stop(&self);

    /// Change the tempo; takes effect from the next pulse
    fn set_tempo(&self, bpm: f64);

    /// Current tempo in BPM
    fn tempo(&self) -> f64;

    /// Current clock state
    fn state(&self) -> ClockState;
}

/// Interval between pulses at `bpm`
pub fn pulse_interval(bpm: f64) -> Duration {
    // At 24 PPQN, interval = 60 / (BPM * 24) seconds
    Duration::from_secs_f64(60.0 / (bpm.clamp(MIN_TEMPO, MAX_TEMPO) * PULSES_PER_QUARTER_NOTE as f64))
}

/// One started run of the clock thread
#[derive(Debug)]
struct Run {
    /// Cleared to end this run only; a later start gets a fresh flag
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Thread-driven pulse clock
#[derive(Debug)]
pub struct Metronome {
    /// Tempo stored as `f64` bits so ticks can change it without locking
    bpm: Arc<AtomicU64>,
    run: Mutex<Option<Run>>,
}

impl Metronome {
    /// Create a new stopped clock at the specified tempo
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm: Arc::new(AtomicU64::new(bpm.clamp(MIN_TEMPO, MAX_TEMPO).to_bits())),
            run: Mutex::new(None),
        }
    }

    /// Calculate the interval between pulses at the current tempo
    pub fn pulse_interval(&self) -> Duration {
        pulse_interval(self.tempo())
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<Run>> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new(120.0) // Default to 120 BPM
    }
}

impl PulseClock for Metronome {
    fn start(&self, handler: Arc<dyn PulseHandler>) {
        // Restarting resets the pulse position
        self.stop();

        // Held until the run is recorded, so a handler calling stop() on
        // its first pulse still finds it
        let mut slot = self.lock_run();
        let bpm = Arc::clone(&self.bpm);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            let mut pulse = 0u32;
            let mut deadline = Instant::now();
            debug!("metronome started");

            while flag.load(Ordering::SeqCst) {
                handler.on_pulse(pulse);
                pulse = (pulse + 1) % PULSES_PER_MEASURE;

                deadline += pulse_interval(f64::from_bits(bpm.load(Ordering::Relaxed)));
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    // Fell behind: resync rather than bursting to catch up
                    trace!(behind = ?(now - deadline), "metronome late");
                    deadline = now;
                }
            }
            debug!("metronome stopped");
        });

        *slot = Some(Run { running, handle });
    }

    fn stop(&self) {
        let run = self.lock_run().take();
        if let Some(run) = run {
            run.running.store(false, Ordering::SeqCst);
            // A handler stopping its own clock cannot wait for itself
            if run.handle.thread().id() != thread::current().id() {
                let _ = run.handle.join();
            }
        }
    }

    fn set_tempo(&self, bpm: f64) {
        self.bpm
            .store(bpm.clamp(MIN_TEMPO, MAX_TEMPO).to_bits(), Ordering::Relaxed);
    }

    fn tempo(&self) -> f64 {
        f64::from_bits(self.bpm.load(Ordering::Relaxed))
    }

    fn state(&self) -> ClockState {
        let running = self
            .lock_run()
            .as_ref()
            .map_or(false, |run| run.running.load(Ordering::SeqCst));
        if running {
            ClockState::Running
        } else {
            ClockState::Stopped
        }
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    struct Collect {
        pulses: Mutex<Vec<u32>>,
    }

    impl PulseHandler for Collect {
        fn on_pulse(&self, pulse: u32) {
            self.pulses.lock().unwrap().push(pulse);
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(PULSES_PER_MEASURE, 96);
    }

    #[test]
    fn test_clock_creation() {
        let clock = Metronome::new(120.0);
        assert_eq!(clock.tempo(), 120.0);
        assert_eq!(clock.state(), ClockState::Stopped);
    }

    #[test]
    fn test_clock_bpm_clamping() {
        let clock = Metronome::new(0.0); // Below minimum
        assert_eq!(clock.tempo(), 1.0);

        let clock = Metronome::new(500.0); // Above maximum
        assert_eq!(clock.tempo(), 300.0);

        clock.set_tempo(90.0);
        assert_eq!(clock.tempo(), 90.0);
    }

    #[test]
    fn test_pulse_interval() {
        let clock = Metronome::new(120.0);
        // At 120 BPM, 24 PPQN: interval = 60 / (120 * 24) = 0.0208333... seconds
        let interval = clock.pulse_interval();
        let expected = 60.0 / (120.0 * 24.0);
        assert!((interval.as_secs_f64() - expected).abs() < 0.0001);
    }

    #[test]
    fn test_clock_delivers_pulses_in_order() {
        let clock = Metronome::new(300.0); // ~8.3ms per pulse
        let collect = Arc::new(Collect {
            pulses: Mutex::new(Vec::new()),
        });

        clock.start(collect.clone());
        assert_eq!(clock.state(), ClockState::Running);
        thread::sleep(Duration::from_millis(60));
        clock.stop();
        assert_eq!(clock.state(), ClockState::Stopped);

        let pulses = collect.pulses.lock().unwrap().clone();
        assert!(!pulses.is_empty());
        assert_eq!(pulses[0], 0);
        for (i, p) in pulses.iter().enumerate() {
            assert_eq!(*p, i as u32 % PULSES_PER_MEASURE);
        }

        // No further pulses after stop
        let count = pulses.len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(collect.pulses.lock().unwrap().len(), count);
    }

    /// Handler that restarts its own clock once, from the clock thread
    struct Restarter {
        clock: Arc<Metronome>,
        this: Mutex<Weak<Restarter>>,
        pulses: Mutex<Vec<u32>>,
        restarted: AtomicBool,
    }

    impl PulseHandler for Restarter {
        fn on_pulse(&self, pulse: u32) {
            self.pulses.lock().unwrap().push(pulse);
            if pulse == 3 && !self.restarted.swap(true, Ordering::SeqCst) {
                if let Some(me) = self.this.lock().unwrap().upgrade() {
                    self.clock.stop();
                    self.clock.start(me);
                }
            }
        }
    }

    #[test]
    fn test_restart_from_handler_runs_one_thread() {
        let clock = Arc::new(Metronome::new(300.0));
        let handler = Arc::new(Restarter {
            clock: clock.clone(),
            this: Mutex::new(Weak::new()),
            pulses: Mutex::new(Vec::new()),
            restarted: AtomicBool::new(false),
        });
        *handler.this.lock().unwrap() = Arc::downgrade(&handler);

        clock.start(handler.clone());
        thread::sleep(Duration::from_millis(120));
        clock.stop();
        assert_eq!(clock.state(), ClockState::Stopped);

        let pulses = handler.pulses.lock().unwrap().clone();
        assert!(pulses.len() > 6);
        assert_eq!(&pulses[..4], &[0, 1, 2, 3]);
        // The abandoned run exits; only the restarted sequence continues
        for (i, p) in pulses[4..].iter().enumerate() {
            assert_eq!(*p, i as u32 % PULSES_PER_MEASURE);
        }

        let count = pulses.len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(handler.pulses.lock().unwrap().len(), count);
    }
}
