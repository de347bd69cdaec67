// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! midir output backend.
//!
//! Opens every available output port and routes each instrument to the
//! port whose name matches it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, warn};

use super::{chord_messages, NoteSink, DEFAULT_VELOCITY};
use crate::music::Note;
use crate::sequencer::Chord;

const CLIENT_NAME: &str = "scoreseq";

/// List available MIDI output ports
pub fn list_ports() -> Result<Vec<String>> {
    let output = MidiOutput::new(CLIENT_NAME)
        .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
    Ok(output
        .ports()
        .iter()
        .filter_map(|port| output.port_name(port).ok())
        .collect())
}

/// Sink that writes notes to MIDI output ports
pub struct MidiPortSink {
    connections: Mutex<HashMap<String, MidiOutputConnection>>,
    /// Every MIDI note sent so far, for the final all-notes-off
    encountered: Mutex<BTreeSet<u8>>,
    velocity: u8,
}

impl MidiPortSink {
    /// Connect to every available output port except the built-in
    /// Microsoft wavetable synth
    pub fn open_all(velocity: u8) -> Result<Self> {
        let mut connections = HashMap::new();
        for name in list_ports()? {
            if name.contains("Microsoft") {
                continue;
            }
            let output = MidiOutput::new(CLIENT_NAME)
                .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
            let port = output
                .ports()
                .into_iter()
                .find(|p| output.port_name(p).ok().as_deref() == Some(name.as_str()))
                .ok_or_else(|| anyhow!("MIDI port disappeared: '{}'", name))?;
            let connection = output
                .connect(&port, &format!("{}-out", CLIENT_NAME))
                .map_err(|e| anyhow!("could not get output from: '{}': {}", name, e))?;
            debug!(port = %name, "opened MIDI output");
            connections.insert(name, connection);
        }

        Ok(Self {
            connections: Mutex::new(connections),
            encountered: Mutex::new(BTreeSet::new()),
            velocity,
        })
    }

    /// Names of the connected ports
    pub fn port_names(&self) -> Vec<String> {
        self.connections
            .lock()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Send note-off for every note this sink has ever played, on every port
    pub fn all_notes_off(&self) -> Result<()> {
        let notes: Vec<Note> = self
            .encountered
            .lock()
            .map_err(|_| anyhow!("note registry poisoned"))?
            .iter()
            .map(|midi| Note::from_midi(*midi))
            .collect();
        let off = Chord { notes, on: false };

        let mut connections = self
            .connections
            .lock()
            .map_err(|_| anyhow!("MIDI connections poisoned"))?;
        for (name, connection) in connections.iter_mut() {
            for message in chord_messages(&off, 0, self.velocity) {
                connection
                    .send(&message)
                    .map_err(|e| anyhow!("send to '{}' failed: {}", name, e))?;
            }
        }
        Ok(())
    }
}

/// Exact port name first, then a case-insensitive substring match
fn find_port<'a>(names: impl Iterator<Item = &'a String>, instrument: &str) -> Option<String> {
    let names: Vec<&String> = names.collect();
    if let Some(exact) = names.iter().find(|n| n.as_str() == instrument) {
        return Some((*exact).clone());
    }
    let wanted = instrument.to_lowercase();
    names
        .into_iter()
        .find(|n| n.to_lowercase().contains(&wanted))
        .cloned()
}

impl NoteSink for MidiPortSink {
    fn deliver(&self, instrument: &str, chord: &Chord) -> Result<()> {
        if chord.notes.is_empty() {
            return Ok(());
        }

        let mut connections = self
            .connections
            .lock()
            .map_err(|_| anyhow!("MIDI connections poisoned"))?;
        let port = find_port(connections.keys(), instrument)
            .ok_or_else(|| anyhow!("no such device: {}", instrument))?;
        let connection = connections
            .get_mut(&port)
            .ok_or_else(|| anyhow!("no such device: {}", instrument))?;

        let sent = chord_messages(chord, 0, self.velocity);
        if let Ok(mut encountered) = self.encountered.lock() {
            encountered.extend(sent.iter().map(|m| m[1]));
        }
        for message in sent {
            connection
                .send(&message)
                .map_err(|e| anyhow!("send to '{}' failed: {}", port, e))?;
        }
        Ok(())
    }
}

impl Default for MidiPortSink {
    fn default() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            encountered: Mutex::new(BTreeSet::new()),
            velocity: DEFAULT_VELOCITY,
        }
    }
}

impl Drop for MidiPortSink {
    fn drop(&mut self) {
        if let Err(e) = self.all_notes_off() {
            warn!("failed to silence MIDI ports: {}", e);
        }
    }
}
