// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Chord-name resolution.
//!
//! Turns symbols such as `Cmaj7`, `F#m`, `Am/E` into concrete notes with
//! the root voiced at octave 4.

use super::pitch::{Note, PitchClass};
use super::ResolveError;

/// Octave the chord root is voiced in
pub const ROOT_OCTAVE: i8 = 4;

/// Chord qualities supported in chord names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Sixth,
    MinorSixth,
    Dominant7,
    Major7,
    Minor7,
    Diminished7,
    HalfDiminished7,
    Dominant9,
    Major9,
    Minor9,
    Add9,
}

impl ChordQuality {
    /// Semitones above the root, lowest first
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::Sus2 => &[0, 2, 7],
            ChordQuality::Sus4 => &[0, 5, 7],
            ChordQuality::Sixth => &[0, 4, 7, 9],
            ChordQuality::MinorSixth => &[0, 3, 7, 9],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Diminished7 => &[0, 3, 6, 9],
            ChordQuality::HalfDiminished7 => &[0, 3, 6, 10],
            ChordQuality::Dominant9 => &[0, 4, 7, 10, 14],
            ChordQuality::Major9 => &[0, 4, 7, 11, 14],
            ChordQuality::Minor9 => &[0, 3, 7, 10, 14],
            ChordQuality::Add9 => &[0, 4, 7, 14],
        }
    }

    /// Parse a quality suffix. Case matters: `M7` is major, `m7` is minor.
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "" | "maj" | "M" => Some(ChordQuality::Major),
            "m" | "min" => Some(ChordQuality::Minor),
            "dim" => Some(ChordQuality::Diminished),
            "aug" | "+" => Some(ChordQuality::Augmented),
            "sus2" => Some(ChordQuality::Sus2),
            "sus4" | "sus" => Some(ChordQuality::Sus4),
            "6" => Some(ChordQuality::Sixth),
            "m6" => Some(ChordQuality::MinorSixth),
            "7" => Some(ChordQuality::Dominant7),
            "maj7" | "M7" => Some(ChordQuality::Major7),
            "m7" | "min7" => Some(ChordQuality::Minor7),
            "dim7" => Some(ChordQuality::Diminished7),
            "m7b5" => Some(ChordQuality::HalfDiminished7),
            "9" => Some(ChordQuality::Dominant9),
            "maj9" => Some(ChordQuality::Major9),
            "m9" => Some(ChordQuality::Minor9),
            "add9" => Some(ChordQuality::Add9),
            _ => None,
        }
    }
}

/// Split a chord name into its root spelling and the rest
fn split_root(name: &str) -> Option<(PitchClass, &str)> {
    let mut chars = name.char_indices();
    let (_, letter) = chars.next()?;
    let natural = PitchClass::from_letter(letter)?;
    match chars.next() {
        Some((i, '#')) => Some((natural.transpose(1), &name[i + 1..])),
        Some((i, 'b')) => Some((natural.transpose(-1), &name[i + 1..])),
        Some((i, _)) => Some((natural, &name[i..])),
        None => Some((natural, "")),
    }
}

/// Resolve a chord name into notes, root voiced at [`ROOT_OCTAVE`].
///
/// A slash bass (`C/E`) inverts the chord so the bass is lowest. A bass
/// that is not a chord tone is added below the root.
pub fn chord_to_notes(name: &str) -> Result<Vec<Note>, ResolveError> {
    let unknown = || ResolveError::UnknownChord(name.to_string());

    let (symbol, bass) = match name.split_once('/') {
        Some((symbol, bass)) => (symbol, Some(PitchClass::parse(bass).ok_or_else(unknown)?)),
        None => (name, None),
    };

    let (root, suffix) = split_root(symbol.trim()).ok_or_else(unknown)?;
    let quality = ChordQuality::from_suffix(suffix).ok_or_else(unknown)?;

    let base = Note::new(root, ROOT_OCTAVE);
    let base_midi = base.midi().ok_or_else(unknown)?;
    let mut notes: Vec<Note> = quality
        .intervals()
        .iter()
        .map(|interval| Note::from_midi(base_midi + interval))
        .collect();

    if let Some(bass) = bass {
        match notes.iter().position(|n| n.class == bass) {
            Some(0) => {}
            Some(index) => {
                // Lift everything under the bass by an octave
                let lifted: Vec<Note> = notes[..index].iter().map(|n| n.shift_octaves(1)).collect();
                notes.drain(..index);
                notes.extend(lifted);
            }
            None => {
                let below = Note::nearest(bass, base);
                let below = if below.midi() >= base.midi() {
                    below.shift_octaves(-1)
                } else {
                    below
                };
                notes.insert(0, below);
            }
        }
    }

    Ok(notes)
}
