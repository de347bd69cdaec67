// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI output abstraction layer.
//!
//! The sequencer hands note batches to a [`NoteSink`]; backends turn them
//! into whatever the destination understands. With the `midi` feature a
//! midir backend sends them to hardware or virtual ports.

#[cfg(feature = "midi")]
pub mod port;

#[cfg(feature = "midi")]
pub use port::{list_ports, MidiPortSink};

use anyhow::Result;
use tracing::info;

use crate::music::MidiNote;
use crate::sequencer::Chord;

/// Default note velocity
pub const DEFAULT_VELOCITY: u8 = 100;

/// Destination for note events.
///
/// Called from the clock thread on every pulse with events, so
/// implementations should return quickly. Errors stay with the sink: the
/// sequencer logs them and keeps going.
pub trait NoteSink: Send + Sync {
    /// Deliver a batch of notes to `instrument`. `chord.on` selects
    /// note-on or note-off.
    fn deliver(&self, instrument: &str, chord: &Chord) -> Result<()>;
}

/// Sink that logs every delivery
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NoteSink for LogSink {
    fn deliver(&self, instrument: &str, chord: &Chord) -> Result<()> {
        let notes: Vec<String> = chord.notes.iter().map(|n| n.to_string()).collect();
        info!(
            instrument,
            on = chord.on,
            notes = %notes.join(" "),
            "note {}",
            if chord.on { "on" } else { "off" }
        );
        Ok(())
    }
}

/// Raw MIDI messages for a chord on `channel` (0-15).
///
/// Notes outside the MIDI range are skipped.
pub fn chord_messages(chord: &Chord, channel: u8, velocity: u8) -> Vec<[u8; 3]> {
    let kind = if chord.on {
        messages::NOTE_ON
    } else {
        messages::NOTE_OFF
    };
    let status = kind | (channel & 0x0F);
    chord
        .notes
        .iter()
        .filter_map(|n| n.midi())
        .map(|midi: MidiNote| [status, midi & 0x7F, velocity & 0x7F])
        .collect()
}

/// MIDI message constants
pub mod messages {
    // Channel Voice Messages (upper nibble, lower nibble is channel 0-15)
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{Note, PitchClass};
    use std::sync::{Arc, Mutex};

    /// Mock sink for testing
    struct MockSink {
        deliveries: Arc<Mutex<Vec<(String, Chord)>>>,
    }

    impl NoteSink for MockSink {
        fn deliver(&self, instrument: &str, chord: &Chord) -> Result<()> {
            self.deliveries
                .lock()
                .unwrap()
                .push((instrument.to_string(), chord.clone()));
            Ok(())
        }
    }

    fn c_major(on: bool) -> Chord {
        Chord {
            notes: vec![
                Note::new(PitchClass::C, 4),
                Note::new(PitchClass::E, 4),
                Note::new(PitchClass::G, 4),
            ],
            on,
        }
    }

    #[test]
    fn test_mock_sink_deliver() {
        let sink = MockSink {
            deliveries: Arc::new(Mutex::new(Vec::new())),
        };
        sink.deliver("synth", &c_major(true)).unwrap();

        let deliveries = sink.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "synth");
        assert!(deliveries[0].1.on);
    }

    #[test]
    fn test_log_sink_accepts_everything() {
        assert!(LogSink.deliver("anything", &c_major(false)).is_ok());
    }

    #[test]
    fn test_chord_messages() {
        let on = chord_messages(&c_major(true), 0, DEFAULT_VELOCITY);
        assert_eq!(on, vec![[0x90, 60, 100], [0x90, 64, 100], [0x90, 67, 100]]);

        let off = chord_messages(&c_major(false), 2, DEFAULT_VELOCITY);
        assert_eq!(off[0], [0x82, 60, 100]);
    }

    #[test]
    fn test_chord_messages_skip_out_of_range() {
        let chord = Chord {
            notes: vec![Note::new(PitchClass::C, 10), Note::new(PitchClass::A, 4)],
            on: true,
        };
        assert_eq!(chord_messages(&chord, 0, 127), vec![[0x90, 69, 127]]);
    }

    #[test]
    fn test_midi_message_constants() {
        assert_eq!(messages::NOTE_ON, 0x90);
        assert_eq!(messages::NOTE_OFF, 0x80);
    }
}
