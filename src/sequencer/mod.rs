// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sequencer core for parsing scores and playing them.
//!
//! This module provides:
//! - The score model (sections, parts, measures, pulse-indexed events)
//! - The text score parser
//! - The playback engine driven by a pulse clock

pub mod engine;
pub mod model;
pub mod parser;

pub use engine::{Position, Sequencer, SequencerBuilder, CLICK_REFERENCE_TEMPO};
pub use model::{aggregate, quantize, Chord, Measure, Part, Score, Section, Slot, DEFAULT_LEGATO};
pub use parser::{parse_score, ParseError};
