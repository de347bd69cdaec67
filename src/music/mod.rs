// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Music theory utilities for the score parser.
//!
//! This module resolves note clusters and chord names into concrete
//! pitches. The parser only sees the [`PitchResolver`] trait, so a
//! different naming scheme can be plugged in without touching it.

pub mod chord;
pub mod pitch;

pub use chord::{chord_to_notes, ChordQuality};
pub use pitch::{parse_cluster, MidiNote, Note, PitchClass};

use thiserror::Error;

/// Errors raised while turning a token into pitches
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("empty note cluster")]
    EmptyCluster,
    #[error("invalid note '{found}' in cluster '{token}'")]
    InvalidNote { found: char, token: String },
    #[error("note out of MIDI range in '{0}'")]
    OutOfRange(String),
    #[error("unknown chord '{0}'")]
    UnknownChord(String),
}

/// Resolves score tokens into concrete notes.
pub trait PitchResolver: Send + Sync {
    /// Resolve a cluster token, placing unpinned notes near `reference`
    fn resolve_cluster(&self, token: &str, reference: Option<Note>) -> Result<Vec<Note>, ResolveError>;

    /// Resolve a chord name (without the leading `:`)
    fn resolve_chord(&self, name: &str) -> Result<Vec<Note>, ResolveError>;
}

/// Resolver for letter-name clusters and common chord symbols
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardResolver;

impl PitchResolver for StandardResolver {
    fn resolve_cluster(&self, token: &str, reference: Option<Note>) -> Result<Vec<Note>, ResolveError> {
        parse_cluster(token, reference)
    }

    fn resolve_chord(&self, name: &str) -> Result<Vec<Note>, ResolveError> {
        chord_to_notes(name)
    }
}
