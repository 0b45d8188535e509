//! Allocation-free fill path tests.
//!
//! These tests verify that `Engine::fill()` does not allocate once the
//! engine is built. They run long enough to cross many beat boundaries so
//! note reassignment and weighted pitch draws are covered, plus a full
//! stop fade and halt.
//!
//! Just run `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use ch_engine::{CompositionMode, Engine, EngineConfig, FillStatus, Waveform};

const BUFFER: usize = 8192;

/// Fill `buffers` host-sized buffers, aborting on any heap allocation.
fn assert_fill_alloc_free(config: EngineConfig, buffers: usize) {
    let mut engine = Engine::with_seed(&config, 2024).unwrap();
    let mut out = vec![0u8; BUFFER];

    assert_no_alloc(|| {
        for _ in 0..buffers {
            engine.fill(&mut out).unwrap();
        }
    });
}

#[test]
fn ensemble_fill_alloc_free() {
    // 600 BPM: a beat every 4410 samples.
    let config = EngineConfig { tempo_bpm: 600.0, ..Default::default() };
    assert_fill_alloc_free(config, 200);
}

#[test]
fn max_voices_fill_alloc_free() {
    let config = EngineConfig {
        voices: ch_engine::config::MAX_VOICES,
        tempo_bpm: 900.0,
        waveform: Waveform::Sawtooth,
        ..Default::default()
    };
    assert_fill_alloc_free(config, 200);
}

#[test]
fn showcase_fill_alloc_free() {
    let config = EngineConfig {
        mode: CompositionMode::Showcase,
        tempo_bpm: 1200.0,
        ..Default::default()
    };
    assert_fill_alloc_free(config, 100);
}

#[test]
fn stop_and_halt_alloc_free() {
    let config = EngineConfig { tempo_bpm: 120.0, ..Default::default() };
    let mut engine = Engine::with_seed(&config, 5).unwrap();
    let transport = engine.transport();
    let mut out = vec![0i8; BUFFER];

    assert_no_alloc(|| {
        engine.fill(&mut out).unwrap();
        transport.request_stop();
        let mut halted = false;
        for _ in 0..10 {
            if let FillStatus::Halted { .. } = engine.fill(&mut out).unwrap() {
                halted = true;
            }
        }
        assert!(halted);
    });
}
