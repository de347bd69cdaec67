// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Score model shared by the parser and the playback engine.
//!
//! A [`Score`] is a list of [`Section`]s plus the chain that orders them.
//! Each section holds [`Part`]s, each part a list of [`Measure`]s, and each
//! measure maps pulse indices to the note events scheduled there.

use std::collections::{BTreeMap, HashMap};

use crate::music::Note;
use crate::timing::PULSES_PER_MEASURE;

/// A batch of notes switched on or off together
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chord {
    pub notes: Vec<Note>,
    /// `true` for note-on, `false` for note-off
    pub on: bool,
}

impl Chord {
    pub fn on(notes: Vec<Note>) -> Self {
        Self { notes, on: true }
    }

    pub fn off(notes: Vec<Note>) -> Self {
        Self { notes, on: false }
    }
}

/// One measure of a part
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measure {
    /// Events keyed by pulse index, always within `0..PULSES_PER_MEASURE`
    pub emit: BTreeMap<u32, Vec<Chord>>,
    /// Resolved clusters in written order (rests excluded)
    pub chords: Vec<Chord>,
}

impl Measure {
    /// Events scheduled at `pulse`
    pub fn events_at(&self, pulse: u32) -> Option<&[Chord]> {
        self.emit.get(&pulse).map(Vec::as_slice)
    }

    /// Append an event at `pulse`; events at the same pulse accumulate
    pub fn schedule(&mut self, pulse: u32, chord: Chord) {
        self.emit.entry(pulse).or_default().push(chord);
    }
}

/// Default legato: notes sound for their whole slot
pub const DEFAULT_LEGATO: u8 = 100;

/// Instruments sharing a sequence of measures
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub instruments: Vec<String>,
    pub measures: Vec<Measure>,
    /// Percentage (0-100) of each slot a note sounds for
    pub legato: u8,
}

impl Part {
    pub fn new(instruments: Vec<String>) -> Self {
        Self {
            instruments,
            measures: Vec::new(),
            legato: DEFAULT_LEGATO,
        }
    }

    /// Measure to play during section measure `section_measure`; shorter
    /// parts loop
    pub fn measure_for(&self, section_measure: usize) -> Option<&Measure> {
        if self.measures.is_empty() {
            return None;
        }
        self.measures.get(section_measure % self.measures.len())
    }
}

impl Default for Part {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// A named group of parts played together
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub name: String,
    pub parts: Vec<Part>,
    /// Longest part, in measures
    pub num_measures: usize,
    /// Tempo in BPM; 0 keeps whatever tempo is playing
    pub tempo: f64,
}

impl Section {
    pub fn new(name: impl Into<String>, tempo: f64) -> Self {
        Self {
            name: name.into(),
            tempo,
            ..Default::default()
        }
    }

    /// Recompute `num_measures` from the parts
    pub fn update_num_measures(&mut self) {
        self.num_measures = self.parts.iter().map(|p| p.measures.len()).max().unwrap_or(0);
    }
}

/// A fully parsed score: sections, playback order and name lookup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Score {
    pub sections: Vec<Section>,
    /// Section names in playback order; may repeat
    pub chain: Vec<String>,
    /// Section name to index in `sections`
    pub chain_index: HashMap<String, usize>,
}

impl Score {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Section played at chain position `position` (wraps)
    pub fn section_at(&self, position: usize) -> Option<(usize, &Section)> {
        if self.chain.is_empty() {
            return None;
        }
        let name = &self.chain[position % self.chain.len()];
        let index = *self.chain_index.get(name)?;
        self.sections.get(index).map(|s| (index, s))
    }

    /// Look up a section by name
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.chain_index.get(name).and_then(|i| self.sections.get(*i))
    }
}

/// Pulse slot assigned to a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: u32,
    pub end: u32,
}

/// Place cluster `index` of `count` on the measure's pulse grid.
///
/// Clusters are spread evenly over `PULSES_PER_MEASURE - 1` pulses; the
/// note sounds for `legato` percent of its share. `start` stays in
/// `0..=PULSES_PER_MEASURE - 2` and `end` in `start + 1..=PULSES_PER_MEASURE - 1`.
pub fn quantize(index: usize, count: usize, legato: u8) -> Slot {
    let last = (PULSES_PER_MEASURE - 1) as f64;
    let count = count.max(1) as f64;

    let start = index as f64 / count * last;
    let end = start + legato.min(100) as f64 / 100.0 / count * last;

    let start = start.round().clamp(0.0, last - 1.0) as u32;
    let mut end = end.round().clamp(1.0, last) as u32;
    if end <= start {
        end = start + 1;
    }
    Slot { start, end }
}

/// Split a pulse's events into the notes to release and the notes to strike
pub fn aggregate(batch: &[Chord]) -> (Vec<Note>, Vec<Note>) {
    let mut off = Vec::new();
    let mut on = Vec::new();
    for chord in batch {
        if chord.on {
            on.extend_from_slice(&chord.notes);
        } else {
            off.extend_from_slice(&chord.notes);
        }
    }
    (off, on)
}
