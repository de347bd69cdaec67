// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! scoreseq - a live-coding text score sequencer.
//!
//! A plain-text score (sections of note clusters and chord references) is
//! parsed onto a 96-pulse-per-measure grid and played through a
//! [`midi::NoteSink`], driven by a [`timing::PulseClock`]. The score can be
//! replaced while playing.

pub mod audio;
pub mod config;
pub mod midi;
pub mod music;
pub mod sequencer;
pub mod timing;
