// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for scoreseq
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Score parsing (the hot-reload path)
//! - Per-pulse event processing (the clock-thread path)
//! - Cluster quantization and note resolution

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use anyhow::Result;
use scoreseq::midi::NoteSink;
use scoreseq::music::{parse_cluster, StandardResolver};
use scoreseq::sequencer::{parse_score, quantize, Chord, Sequencer};
use scoreseq::timing::{ClockState, PulseClock, PulseHandler, PULSES_PER_MEASURE};

struct NullSink;

impl NoteSink for NullSink {
    fn deliver(&self, instrument: &str, chord: &Chord) -> Result<()> {
        black_box((instrument, chord.notes.len()));
        Ok(())
    }
}

struct IdleClock;

impl PulseClock for IdleClock {
    fn start(&self, _handler: Arc<dyn PulseHandler>) {}
    fn stop(&self) {}
    fn set_tempo(&self, _bpm: f64) {}
    fn tempo(&self) -> f64 {
        120.0
    }
    fn state(&self) -> ClockState {
        ClockState::Stopped
    }
}

/// A score with `sections` sections of four parts and eight measures each
fn generate_score(sections: usize) -> String {
    let measures = [
        "c e g c5 . g e c",
        ":Am :F :C :G",
        "CEG- . FAC .",
        "c d e f g a b c",
        ":Dm7:3 . :G7:3 :Cmaj7:3-",
        "a . a . a . a .",
        "e g b d e g b d",
        "c",
    ];
    let mut source = String::from("# generated\n");
    for s in 0..sections {
        source.push_str(&format!("pattern s{}\ntempo {}\n", s, 90 + s % 60));
        for p in 0..4 {
            source.push_str(&format!("instruments synth{}, drum{}\nlegato {}\n", p, p, 50 + p * 10));
            for m in measures.iter() {
                source.push_str(m);
                source.push('\n');
            }
        }
    }
    source
}

/// Benchmark parsing scores of increasing size
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_score");

    for size in [1, 10, 50].iter() {
        let source = generate_score(*size);
        group.bench_with_input(BenchmarkId::new("sections", size), &source, |b, source| {
            b.iter(|| parse_score(black_box(source), &StandardResolver))
        });
    }

    group.finish();
}

/// Benchmark one full measure of pulses through the engine
fn bench_emit(c: &mut Criterion) {
    let sequencer = Sequencer::new(Arc::new(IdleClock), Arc::new(NullSink));
    if let Err(e) = sequencer.parse(&generate_score(4)) {
        panic!("benchmark score failed to parse: {}", e);
    }
    sequencer.start();

    c.bench_function("emit_measure", |b| {
        b.iter(|| {
            for pulse in 0..PULSES_PER_MEASURE {
                sequencer.emit(black_box(pulse));
            }
        })
    });
}

/// Benchmark slot placement for dense measures
fn bench_quantize(c: &mut Criterion) {
    c.bench_function("quantize_32", |b| {
        b.iter(|| {
            for i in 0..32 {
                black_box(quantize(black_box(i), 32, 80));
            }
        })
    });
}

/// Benchmark cluster resolution
fn bench_resolve(c: &mut Criterion) {
    c.bench_function("parse_cluster", |b| {
        b.iter(|| parse_cluster(black_box("C#3EbG#Bb4d"), None))
    });
}

criterion_group!(benches, bench_parse, bench_emit, bench_quantize, bench_resolve);
criterion_main!(benches);
