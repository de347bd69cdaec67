// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Score text parser.
//!
//! The score is line oriented. Directives (`pattern`, `instruments`,
//! `legato`, `tempo`, `chain`) shape the structure; every other non-empty,
//! non-comment line is a measure of whitespace-separated clusters:
//!
//! ```text
//! tempo 110
//! pattern verse
//! instruments op-1, volca
//! legato 80
//! ceg . :Am:3- bd
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tracing::{trace, warn};

use super::model::{quantize, Chord, Measure, Part, Score, Section};
use crate::music::{Note, PitchResolver, ResolveError};
use crate::timing::{MAX_TEMPO, MIN_TEMPO};

/// Errors produced while parsing a score
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("line {line}: problem parsing legato: {value}")]
    InvalidLegato { line: usize, value: String },
    #[error("line {line}: problem parsing tempo: {value}")]
    InvalidTempo { line: usize, value: String },
    #[error("line {line}: '{directive}' needs a value")]
    MissingValue { line: usize, directive: String },
    #[error("line {line}: cannot resolve '{token}': {source}")]
    Resolve {
        line: usize,
        token: String,
        source: ResolveError,
    },
    #[error("line {line}: pattern '{name}' is already defined")]
    DuplicateSection { line: usize, name: String },
    #[error("no such chain: {0}")]
    UndefinedChain(String),
    #[error("no sections found in score")]
    NoSections,
}

/// Parse score text into a [`Score`].
///
/// Nothing outside the returned value is touched, so a failed parse
/// leaves any previously loaded score alone.
pub fn parse_score(source: &str, resolver: &dyn PitchResolver) -> Result<Score, ParseError> {
    ScoreParser::new(resolver).parse(source)
}

/// Line-by-line builder holding the section and part in progress
struct ScoreParser<'r> {
    resolver: &'r dyn PitchResolver,
    sections: Vec<Section>,
    chain: Vec<String>,
    section: Section,
    part: Part,
    /// Line of the current `pattern` directive
    section_line: usize,
}

impl<'r> ScoreParser<'r> {
    fn new(resolver: &'r dyn PitchResolver) -> Self {
        Self {
            resolver,
            sections: Vec::new(),
            chain: Vec::new(),
            section: Section::default(),
            part: Part::default(),
            section_line: 0,
        }
    }

    fn parse(mut self, source: &str) -> Result<Score, ParseError> {
        for (number, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            trace!(line = number + 1, "parsing {}", line);
            self.parse_line(number + 1, line)?;
        }
        self.flush_section()?;
        self.finish()
    }

    fn parse_line(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        match keyword {
            "pattern" => {
                self.flush_section()?;
                // Tempo carries over until a section sets its own
                self.section = Section::new(rest, self.section.tempo);
                self.section_line = number;
            }
            "legato" => {
                let value = first_field(rest, number, keyword)?;
                let legato: i64 = value.parse().map_err(|_| ParseError::InvalidLegato {
                    line: number,
                    value: value.to_string(),
                })?;
                self.part.legato = legato.clamp(0, 100) as u8;
            }
            "tempo" => {
                let value = first_field(rest, number, keyword)?;
                let tempo: f64 = value
                    .parse()
                    .ok()
                    .filter(|t: &f64| t.is_finite())
                    .ok_or_else(|| ParseError::InvalidTempo {
                        line: number,
                        value: value.to_string(),
                    })?;
                self.section.tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
            }
            "chain" => {
                if !rest.is_empty() {
                    self.chain = rest.split_whitespace().map(str::to_string).collect();
                }
            }
            "instruments" | "instrument" => {
                self.flush_part();
                let instruments = rest
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                self.part = Part::new(instruments);
            }
            _ => {
                let measure = self.parse_measure(number, line)?;
                if self.part.instruments.is_empty() {
                    warn!(line = number, "measure outside any instruments block is ignored");
                }
                self.part.measures.push(measure);
            }
        }
        Ok(())
    }

    /// Resolve one measure line and place its clusters on the pulse grid
    fn parse_measure(&self, number: usize, line: &str) -> Result<Measure, ParseError> {
        let clusters: Vec<&str> = line.split_whitespace().collect();
        let mut measure = Measure::default();

        for (index, token) in clusters.iter().enumerate() {
            if *token == "." {
                continue;
            }
            let resolve_err = |source| ParseError::Resolve {
                line: number,
                token: token.to_string(),
                source,
            };

            let reference = measure
                .chords
                .last()
                .and_then(|chord| chord.notes.last())
                .copied();
            let (notes, held) = match token.strip_prefix(':') {
                Some(chord) => self.expand_chord(chord).map_err(resolve_err)?,
                None => {
                    let (cluster, held) = match token.strip_suffix('-') {
                        Some(cluster) => (cluster, true),
                        None => (*token, false),
                    };
                    let notes = self
                        .resolver
                        .resolve_cluster(cluster, reference)
                        .map_err(resolve_err)?;
                    (notes, held)
                }
            };

            let slot = quantize(index, clusters.len(), self.part.legato);
            measure.chords.push(Chord::on(notes.clone()));
            measure.schedule(slot.start, Chord::on(notes.clone()));
            if !held {
                measure.schedule(slot.end, Chord::off(notes));
            }
        }
        Ok(measure)
    }

    /// Resolve `name[:octave][-]` to the chord's notes, shifted so the
    /// first note sits in `octave`, and whether the chord is held
    fn expand_chord(&self, reference: &str) -> Result<(Vec<Note>, bool), ResolveError> {
        let (name, octave) = match reference.split_once(':') {
            Some((name, octave)) => (name, Some(octave)),
            None => (reference, None),
        };

        let mut held = false;
        let name = match name.strip_suffix('-') {
            Some(name) if octave.is_none() => {
                held = true;
                name
            }
            _ => name,
        };
        // "-1" is an octave, "1-" and "-1-" are held
        let octave = octave.map(|o| match o.strip_suffix('-') {
            Some(o) => {
                held = true;
                o
            }
            None => o,
        });

        let notes = self.resolver.resolve_chord(name)?;
        let first = notes.first().ok_or_else(|| ResolveError::UnknownChord(name.to_string()))?;
        let shift = match octave {
            Some("") | None => 0,
            Some(o) => o
                .parse::<i8>()
                .map_err(|_| ResolveError::OutOfRange(reference.to_string()))?
                .saturating_sub(first.octave),
        };

        let notes = notes
            .iter()
            .map(|n| n.shift_octaves(shift))
            .map(|n| match n.midi() {
                Some(_) => Ok(n),
                None => Err(ResolveError::OutOfRange(reference.to_string())),
            })
            .collect::<Result<Vec<Note>, _>>()?;
        Ok((notes, held))
    }

    fn flush_part(&mut self) {
        let part = std::mem::take(&mut self.part);
        if !part.instruments.is_empty() {
            self.section.parts.push(part);
        }
    }

    fn flush_section(&mut self) -> Result<(), ParseError> {
        self.flush_part();
        if self.section.parts.is_empty() {
            return Ok(());
        }
        if self.sections.iter().any(|s| s.name == self.section.name) {
            return Err(ParseError::DuplicateSection {
                line: self.section_line,
                name: self.section.name.clone(),
            });
        }

        let tempo = self.section.tempo;
        let mut section = std::mem::replace(&mut self.section, Section::new("", tempo));
        section.update_num_measures();
        self.sections.push(section);
        Ok(())
    }

    fn finish(self) -> Result<Score, ParseError> {
        if self.sections.is_empty() {
            return Err(ParseError::NoSections);
        }

        let chain_index: HashMap<String, usize> = self
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        let chain = if self.chain.is_empty() {
            self.sections.iter().map(|s| s.name.clone()).collect()
        } else {
            self.chain
        };
        if let Some(missing) = chain.iter().find(|name| !chain_index.contains_key(*name)) {
            return Err(ParseError::UndefinedChain(missing.clone()));
        }

        Ok(Score {
            sections: self.sections,
            chain,
            chain_index,
        })
    }
}

fn first_field<'a>(rest: &'a str, line: usize, directive: &str) -> Result<&'a str, ParseError> {
    rest.split_whitespace()
        .next()
        .ok_or_else(|| ParseError::MissingValue {
            line,
            directive: directive.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{PitchClass, StandardResolver};
    use crate::timing::PULSES_PER_MEASURE;

    fn parse(source: &str) -> Result<Score, ParseError> {
        parse_score(source, &StandardResolver)
    }

    fn notes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn names(chord: &Chord) -> Vec<String> {
        chord.notes.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_single_section() {
        let score = parse("pattern a\ninstruments X\nCEG\nFAC").unwrap();
        assert_eq!(score.sections.len(), 1);

        let section = &score.sections[0];
        assert_eq!(section.name, "a");
        assert_eq!(section.num_measures, 2);
        assert_eq!(section.parts.len(), 1);
        assert_eq!(section.parts[0].instruments, vec!["X".to_string()]);
        assert_eq!(section.parts[0].measures.len(), 2);
        assert_eq!(score.chain, notes(&["a"]));
    }

    #[test]
    fn test_measure_events() {
        let score = parse("pattern a\ninstruments X\nceg . f").unwrap();
        let measure = &score.sections[0].parts[0].measures[0];

        // Rest is skipped but still takes a slot
        assert_eq!(measure.chords.len(), 2);
        let start = measure.events_at(0).unwrap();
        assert_eq!(start.len(), 1);
        assert!(start[0].on);
        assert_eq!(names(&start[0]), notes(&["C4", "E4", "G4"]));

        // 95 / 3 = 31.67: first cluster ends at 32, third starts at 63
        let off = measure.events_at(32).unwrap();
        assert!(!off[0].on);
        let third = measure.events_at(63).unwrap();
        assert!(third[0].on);
        // F nearest to the previous cluster's G4
        assert_eq!(names(&third[0]), notes(&["F4"]));
        assert!(measure.events_at(PULSES_PER_MEASURE - 1).is_some());
    }

    #[test]
    fn test_events_share_a_pulse() {
        // At legato 100 each cluster ends where the next begins
        let score = parse("pattern a\ninstruments X\nc d e f").unwrap();
        let measure = &score.sections[0].parts[0].measures[0];
        let at_24 = measure.events_at(24).unwrap();
        assert_eq!(at_24.len(), 2);
        assert!(at_24.iter().any(|c| c.on));
        assert!(at_24.iter().any(|c| !c.on));
    }

    #[test]
    fn test_pulse_keys_in_range() {
        let line: Vec<&str> = std::iter::repeat("c").take(150).collect();
        let score = parse(&format!("pattern a\ninstruments X\n{}", line.join(" "))).unwrap();
        let measure = &score.sections[0].parts[0].measures[0];
        assert!(measure.emit.keys().all(|p| *p < PULSES_PER_MEASURE));
    }

    #[test]
    fn test_default_chain_and_explicit_chain() {
        let source = "pattern a\ninstruments X\nc\npattern b\ninstruments Y\nd";
        let score = parse(source).unwrap();
        assert_eq!(score.chain, notes(&["a", "b"]));
        assert_eq!(score.chain_index.get("b"), Some(&1));

        let score = parse(&format!("chain b a b\n{}", source)).unwrap();
        assert_eq!(score.chain, notes(&["b", "a", "b"]));
    }

    #[test]
    fn test_undefined_chain() {
        let err = parse("chain a z\npattern a\ninstruments X\nc").unwrap_err();
        assert_eq!(err, ParseError::UndefinedChain("z".to_string()));
        assert!(err.to_string().contains('z'));
    }

    #[test]
    fn test_clamping() {
        let score = parse("pattern a\ntempo 400\ninstruments X\nlegato 150\nc").unwrap();
        assert_eq!(score.sections[0].tempo, 300.0);
        assert_eq!(score.sections[0].parts[0].legato, 100);

        let score = parse("pattern a\ntempo 0\ninstruments X\nlegato -5\nc").unwrap();
        assert_eq!(score.sections[0].tempo, 1.0);
        assert_eq!(score.sections[0].parts[0].legato, 0);
    }

    #[test]
    fn test_invalid_numbers() {
        let err = parse("pattern a\ninstruments X\nlegato lots\nc").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidLegato {
                line: 3,
                value: "lots".to_string()
            }
        );

        let err = parse("pattern a\ntempo fast\ninstruments X\nc").unwrap_err();
        assert!(matches!(err, ParseError::InvalidTempo { line: 2, .. }));
        assert!(err.to_string().contains("fast"));

        let err = parse("pattern a\ntempo\ninstruments X\nc").unwrap_err();
        assert!(matches!(err, ParseError::MissingValue { line: 2, .. }));
    }

    #[test]
    fn test_tempo_is_sticky() {
        let source = "tempo 90\npattern a\ninstruments X\nc\npattern b\ninstruments X\nd\npattern c\ntempo 140\ninstruments X\ne";
        let score = parse(source).unwrap();
        let tempos: Vec<f64> = score.sections.iter().map(|s| s.tempo).collect();
        assert_eq!(tempos, vec![90.0, 90.0, 140.0]);

        let score = parse("pattern a\ninstruments X\nc").unwrap();
        assert_eq!(score.sections[0].tempo, 0.0);
    }

    #[test]
    fn test_legato_shortens_notes() {
        let score = parse("pattern a\ninstruments X\nlegato 50\nc").unwrap();
        let measure = &score.sections[0].parts[0].measures[0];
        assert!(!measure.events_at(48).unwrap()[0].on);
    }

    #[test]
    fn test_hold_suppresses_note_off() {
        let score = parse("pattern a\ninstruments X\nceg-\nceg").unwrap();
        let measures = &score.sections[0].parts[0].measures;

        let held = &measures[0];
        assert_eq!(held.emit.len(), 1);
        assert!(held.events_at(0).unwrap()[0].on);

        let next = &measures[1];
        assert!(next.events_at(0).unwrap()[0].on);
        assert!(!next.events_at(95).unwrap()[0].on);
    }

    #[test]
    fn test_chord_reference() {
        let score = parse("pattern a\ninstruments X\n:Am :C:3 :G7:5-").unwrap();
        let measure = &score.sections[0].parts[0].measures[0];
        let chords: Vec<Vec<String>> = measure.chords.iter().map(names).collect();
        assert_eq!(chords[0], notes(&["A4", "C5", "E5"]));
        assert_eq!(chords[1], notes(&["C3", "E3", "G3"]));
        assert_eq!(chords[2], notes(&["G5", "B5", "D6", "F6"]));

        // The held chord has an on event but no off event
        let offs: usize = measure
            .emit
            .values()
            .flatten()
            .filter(|c| !c.on)
            .count();
        assert_eq!(offs, 2);
    }

    #[test]
    fn test_chord_reference_hold_without_octave() {
        let score = parse("pattern a\ninstruments X\n:Am-").unwrap();
        let measure = &score.sections[0].parts[0].measures[0];
        assert_eq!(measure.emit.len(), 1);
    }

    #[test]
    fn test_chord_reference_negative_octave() {
        let score = parse("pattern a\ninstruments X\n:C:-1 :C:-1-").unwrap();
        let measure = &score.sections[0].parts[0].measures[0];
        let midi: Vec<Vec<u8>> = measure
            .chords
            .iter()
            .map(|c| c.notes.iter().filter_map(|n| n.midi()).collect())
            .collect();
        assert_eq!(midi, vec![vec![0, 4, 7], vec![0, 4, 7]]);
        // Only the first chord is released
        let offs = measure.emit.values().flatten().filter(|c| !c.on).count();
        assert_eq!(offs, 1);

        for bad in [":C:-2", ":C:x", ":G:9"] {
            let err = parse(&format!("pattern a\ninstruments X\n{}", bad)).unwrap_err();
            assert!(
                matches!(
                    err,
                    ParseError::Resolve {
                        source: ResolveError::OutOfRange(_),
                        ..
                    }
                ),
                "{}: {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_resolution_error() {
        let err = parse("pattern a\ninstruments X\nc xyz").unwrap_err();
        match err {
            ParseError::Resolve { line, token, .. } => {
                assert_eq!(line, 3);
                assert_eq!(token, "xyz");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = parse("pattern a\ninstruments X\n:Cwhat").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Resolve {
                source: ResolveError::UnknownChord(_),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(parse(""), Err(ParseError::NoSections));
        assert_eq!(parse("# only a comment\n\n"), Err(ParseError::NoSections));
        // Sections without instruments are not kept
        assert_eq!(parse("pattern a\nceg"), Err(ParseError::NoSections));
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let err = parse("pattern a\ninstruments X\nc\npattern a\ninstruments Y\nd").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateSection {
                line: 4,
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_multiple_parts_and_instruments() {
        let source = "pattern a\ninstruments X, Y\nc\nd\nd\ninstrument Z\ne\n# comment\n\nf";
        let score = parse(source).unwrap();
        let section = &score.sections[0];
        assert_eq!(section.parts.len(), 2);
        assert_eq!(section.parts[0].instruments, notes(&["X", "Y"]));
        assert_eq!(section.parts[1].instruments, notes(&["Z"]));
        assert_eq!(section.num_measures, 3);
    }

    #[test]
    fn test_nearest_pitch_follows_previous_cluster() {
        let score = parse("pattern a\ninstruments X\na3 c e").unwrap();
        let measure = &score.sections[0].parts[0].measures[0];
        let firsts: Vec<Note> = measure.chords.iter().map(|c| c.notes[0]).collect();
        assert_eq!(
            firsts,
            vec![
                Note::new(PitchClass::A, 3),
                Note::new(PitchClass::C, 4),
                Note::new(PitchClass::E, 4),
            ]
        );
    }
}
