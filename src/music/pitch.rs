// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pitch classes, concrete notes and note-cluster resolution.
//!
//! A cluster is a run of note names written without separators
//! (`ceg`, `c#4e`, `Bbdf`). Notes without an explicit octave are placed
//! at the octave nearest to the previous note.

use std::fmt;

use super::ResolveError;

/// MIDI note number type (0-127)
pub type MidiNote = u8;

/// Semitone offset type
pub type Semitones = i8;

/// Pitch classes (note names without octave)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    Cs, // C# / Db
    D,
    Ds, // D# / Eb
    E,
    F,
    Fs, // F# / Gb
    G,
    Gs, // G# / Ab
    A,
    As, // A# / Bb
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Semitones above C (0-11)
    pub fn index(self) -> u8 {
        match self {
            PitchClass::C => 0,
            PitchClass::Cs => 1,
            PitchClass::D => 2,
            PitchClass::Ds => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::Fs => 6,
            PitchClass::G => 7,
            PitchClass::Gs => 8,
            PitchClass::A => 9,
            PitchClass::As => 10,
            PitchClass::B => 11,
        }
    }

    /// Get pitch class from a semitone index (wraps)
    pub fn from_index(index: u8) -> Self {
        PitchClass::ALL[(index % 12) as usize]
    }

    /// Natural pitch class for a note letter (case-insensitive)
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'C' => Some(PitchClass::C),
            'D' => Some(PitchClass::D),
            'E' => Some(PitchClass::E),
            'F' => Some(PitchClass::F),
            'G' => Some(PitchClass::G),
            'A' => Some(PitchClass::A),
            'B' => Some(PitchClass::B),
            _ => None,
        }
    }

    /// Parse a pitch class name (e.g., "C", "C#", "Db", "f#")
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.trim().chars();
        let natural = Self::from_letter(chars.next()?)?;
        match (chars.next(), chars.next()) {
            (None, _) => Some(natural),
            (Some('#'), None) => Some(natural.transpose(1)),
            (Some('b'), None) => Some(natural.transpose(-1)),
            _ => None,
        }
    }

    /// Transpose by semitones
    pub fn transpose(self, semitones: Semitones) -> Self {
        let index = (self.index() as i16 + semitones as i16).rem_euclid(12) as u8;
        PitchClass::from_index(index)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        };
        f.write_str(name)
    }
}

/// A concrete pitch: pitch class plus octave (C4 = MIDI 60)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note {
    pub class: PitchClass,
    pub octave: i8,
}

impl Note {
    /// Reference used when a cluster has no preceding note
    pub const DEFAULT_REFERENCE: Note = Note {
        class: PitchClass::C,
        octave: 4,
    };

    pub fn new(class: PitchClass, octave: i8) -> Self {
        Self { class, octave }
    }

    /// Signed MIDI number, may fall outside 0-127
    fn pitch(self) -> i16 {
        (self.octave as i16 + 1) * 12 + self.class.index() as i16
    }

    /// MIDI note number, or `None` when outside 0-127
    pub fn midi(self) -> Option<MidiNote> {
        u8::try_from(self.pitch()).ok().filter(|n| *n <= 127)
    }

    /// Build a note from a MIDI note number
    pub fn from_midi(midi: MidiNote) -> Self {
        Self {
            class: PitchClass::from_index(midi % 12),
            octave: (midi / 12) as i8 - 1,
        }
    }

    /// Shift by whole octaves
    pub fn shift_octaves(self, octaves: i8) -> Self {
        Self {
            class: self.class,
            octave: self.octave.saturating_add(octaves),
        }
    }

    /// Place `class` at the octave closest to `reference`; ties go down
    pub fn nearest(class: PitchClass, reference: Note) -> Self {
        let target = reference.pitch();
        (reference.octave - 1..=reference.octave + 1)
            .map(|octave| Note::new(class, octave))
            .min_by_key(|note| ((note.pitch() - target).abs(), note.pitch()))
            .unwrap_or(Note::new(class, reference.octave))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.octave)
    }
}

/// Resolve a cluster token into concrete notes.
///
/// Each note without an explicit octave lands nearest to the note before
/// it; the first note is placed relative to `reference` (or C4).
pub fn parse_cluster(token: &str, reference: Option<Note>) -> Result<Vec<Note>, ResolveError> {
    let mut previous = reference.unwrap_or(Note::DEFAULT_REFERENCE);
    let mut notes = Vec::new();
    let mut chars = token.chars().peekable();

    while let Some(c) = chars.next() {
        let mut class =
            PitchClass::from_letter(c).ok_or_else(|| ResolveError::InvalidNote {
                found: c,
                token: token.to_string(),
            })?;

        match chars.peek() {
            Some('#') => {
                chars.next();
                class = class.transpose(1);
            }
            Some('b') => {
                chars.next();
                class = class.transpose(-1);
            }
            _ => {}
        }

        let mut digits = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(*d);
            chars.next();
        }

        let note = if digits.is_empty() {
            Note::nearest(class, previous)
        } else {
            let octave = digits
                .parse::<i8>()
                .map_err(|_| ResolveError::OutOfRange(token.to_string()))?;
            Note::new(class, octave)
        };
        if note.midi().is_none() {
            return Err(ResolveError::OutOfRange(token.to_string()));
        }
        notes.push(note);
        previous = note;
    }

    if notes.is_empty() {
        return Err(ResolveError::EmptyCluster);
    }
    Ok(notes)
}
