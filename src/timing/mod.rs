// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and clock module.
//!
//! This module provides the pulse grid constants and the clock that drives
//! the sequencer, one pulse at a time.

pub mod clock;

pub use clock::{
    pulse_interval, ClockState, Metronome, PulseClock, PulseHandler, MAX_TEMPO, MIN_TEMPO,
    PULSES_PER_MEASURE, PULSES_PER_QUARTER_NOTE, QUARTER_NOTES_PER_MEASURE,
};
