//! Integration tests for runtime mode switching
//!
//! These tests validate:
//! - Every mode pair leaves exactly the second mode's wiring in place
//! - Per-mode carrier offset, retuning and RSSI calibration
//! - Output collectors follow the active mode's family

mod common;

use common::builders::EngineBuilder;
use common::mock_helpers::{bpsk_front_end, fm_front_end};
use common::{wait_for, DESIRED_FREQUENCY};
use demod_engine::demod::{OutputFamily, ANALOG_RSSI_CALIBRATION, DIGITAL_RSSI_CALIBRATION};
use demod_engine::pipeline::{EngineEvent, TopologySnapshot};
use demod_engine::{DemodEngine, Mode};
use proptest::prelude::*;

/// Edges every graph carries regardless of mode (source, spectrum tap, power chain).
const FIXED_EDGES: usize = 10;

fn expected_edges(mode: Mode) -> usize {
    match mode.family() {
        OutputFamily::Frames => 3,
        OutputFamily::Raw => 4,
        OutputFamily::Audio => 2,
    }
}

fn assert_wired_for(topology: &TopologySnapshot, mode: Mode) {
    let name = mode.name();
    assert!(
        topology.contains("Mixer", "out", name, "in"),
        "{} should be fed by the mixer",
        name
    );

    let taps_constellation = topology.contains("ConstValve", "out", "Constellation", "in");
    match mode.family() {
        OutputFamily::Frames => {
            assert!(topology.contains(name, "const", "ConstValve", "in"));
            assert!(taps_constellation);
        }
        OutputFamily::Raw => {
            assert!(topology.contains(name, "const", "ConstValve", "in"));
            assert!(topology.contains(name, "data", "VectorSink", "in"));
            assert!(taps_constellation);
        }
        OutputFamily::Audio => {
            assert!(topology.contains(name, "audio", "AudioSink", "in"));
            assert!(!taps_constellation, "audio modes leave the constellation unwired");
        }
    }

    for other in Mode::ALL.into_iter().filter(|m| *m != mode) {
        assert_eq!(
            topology.edges_touching(other.name()).count(),
            0,
            "{} still wired while {} is active",
            other,
            mode
        );
    }
    assert_eq!(topology.edges.len(), FIXED_EDGES + expected_edges(mode));
}

#[test]
fn test_every_mode_pair_leaves_only_target_wiring() {
    for from in Mode::ALL {
        let (engine, _) = EngineBuilder::new().build();
        engine.set_mode(from).unwrap();
        assert_wired_for(&engine.topology(), from);

        for to in Mode::ALL {
            engine.set_mode(to).unwrap();
            assert_wired_for(&engine.topology(), to);
            // Back to the starting point for the next pair
            engine.set_mode(from).unwrap();
        }
        assert_eq!(engine.fault(), None);
    }
}

#[test]
fn test_reselecting_active_mode_is_idempotent() {
    let (engine, _) = EngineBuilder::new().build();
    engine.set_mode(Mode::Qpsk20000).unwrap();
    let before = engine.topology().edges.len();

    engine.set_mode(Mode::Qpsk20000).unwrap();
    engine.set_mode(Mode::Qpsk20000).unwrap();

    assert_eq!(engine.topology().edges.len(), before);
    assert_wired_for(&engine.topology(), Mode::Qpsk20000);
}

#[test]
fn test_wbfm_uses_wide_offset() {
    let (engine, settings) = EngineBuilder::new().build();
    let events = engine.events();

    engine.set_mode(Mode::Wbfm).unwrap();

    let state = engine.state();
    assert_eq!(state.active_mode, Some(Mode::Wbfm));
    assert_eq!(state.carrier_offset, 250_000);
    assert_eq!(state.desired_frequency, DESIRED_FREQUENCY);
    assert_eq!(state.device_frequency, 433_750_000);
    assert_eq!(state.rssi_calibration, ANALOG_RSSI_CALIBRATION);
    assert_eq!(engine.hardware_frequency(), 433_750_000.0);
    assert_eq!(settings.lock().unwrap().center_freq, 433_750_000.0);

    let event = events.try_recv().unwrap();
    assert_eq!(
        event,
        EngineEvent::ModeChanged {
            mode: Mode::Wbfm,
            carrier_offset: 250_000,
            device_frequency: 433_750_000,
        }
    );
}

#[test]
fn test_offset_change_retunes_hardware_once() {
    let (engine, settings) = EngineBuilder::new().build();
    engine.set_mode(Mode::Nbfm2500).unwrap();
    let retunes = settings.lock().unwrap().tune_history.len();

    // Same narrow offset: no retune
    engine.set_mode(Mode::Am5000).unwrap();
    assert_eq!(settings.lock().unwrap().tune_history.len(), retunes);

    // Wide offset: exactly one retune
    engine.set_mode(Mode::Qpsk250000).unwrap();
    let history = settings.lock().unwrap().tune_history.clone();
    assert_eq!(history.len(), retunes + 1);
    assert_eq!(history.last().copied(), Some(433_750_000.0));
    assert_eq!(engine.state().rssi_calibration, DIGITAL_RSSI_CALIBRATION);
}

#[test]
fn test_bpsk1000_collects_frames_only() {
    let (engine, _) = EngineBuilder::new()
        .front_end(bpsk_front_end(DESIRED_FREQUENCY as f64, 1_000.0))
        .build();
    engine.set_mode(Mode::Bpsk1000).unwrap();
    engine.start().unwrap();
    assert!(wait_for(|| engine.status().blocks_processed > 20));

    assert!(engine.get_frame1().is_some());
    assert!(engine.get_frame2().is_some());
    assert!(engine.get_data().is_empty());
    assert!(engine.get_audio().is_empty());

    engine.stop().unwrap();
    assert_eq!(engine.fault(), None);
}

#[test]
fn test_wbfm_collects_audio_only() {
    let (engine, _) = EngineBuilder::new()
        .front_end(fm_front_end(DESIRED_FREQUENCY as f64))
        .build();
    engine.set_mode(Mode::Wbfm).unwrap();
    engine.start().unwrap();

    let mut audio = Vec::new();
    assert!(wait_for(|| {
        audio.extend(engine.get_audio());
        !audio.is_empty()
    }));
    assert!(audio.iter().all(|s| s.is_finite()));
    assert_eq!(engine.get_frame1(), None);
    assert!(engine.get_data().is_empty());

    engine.stop().unwrap();
}

#[test]
fn test_switch_while_running_discards_previous_output() {
    let (engine, _) = EngineBuilder::new()
        .front_end(fm_front_end(DESIRED_FREQUENCY as f64))
        .build();
    engine.set_mode(Mode::Nbfm5000).unwrap();
    engine.start().unwrap();
    assert!(wait_for(|| engine.status().blocks_processed > 10));

    engine.set_mode(Mode::Qpsk2000).unwrap();
    assert!(engine.get_audio().is_empty());
    assert!(wait_for(|| !engine.get_data().is_empty()));
    assert_wired_for(&engine.topology(), Mode::Qpsk2000);

    engine.stop().unwrap();
    assert_eq!(engine.fault(), None);
}

#[test]
fn test_reselect_while_running_keeps_output_flowing() {
    let (engine, _) = EngineBuilder::new()
        .front_end(bpsk_front_end(DESIRED_FREQUENCY as f64, 1_000.0))
        .build();
    engine.set_mode(Mode::Bpsk1000).unwrap();
    engine.start().unwrap();
    assert!(wait_for(|| engine.get_frame1().is_some_and(|f| !f.is_empty())));

    engine.set_mode(Mode::Am5000).unwrap();
    engine.set_mode(Mode::Bpsk1000).unwrap();
    assert_wired_for(&engine.topology(), Mode::Bpsk1000);

    // Frames resume from the fresh demodulator
    assert!(wait_for(|| engine.get_frame1().is_some_and(|f| !f.is_empty())));
    assert!(engine.get_audio().is_empty());

    engine.stop().unwrap();
    assert_eq!(engine.fault(), None);
}

fn mode_strategy() -> impl Strategy<Value = Mode> {
    (0..Mode::COUNT).prop_map(|i| Mode::ALL[i])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_any_switch_sequence_ends_in_last_mode(modes in prop::collection::vec(mode_strategy(), 1..12)) {
        let (engine, _) = EngineBuilder::new().build();
        for mode in &modes {
            engine.set_mode(*mode).unwrap();
        }
        let last = *modes.last().unwrap();
        assert_wired_for(&engine.topology(), last);

        let state = engine.state();
        prop_assert_eq!(state.active_mode, Some(last));
        prop_assert_eq!(state.carrier_offset, last.params().carrier_offset);
        prop_assert_eq!(state.device_frequency, DESIRED_FREQUENCY - last.params().carrier_offset);
        prop_assert_eq!(state.rssi_calibration, last.params().rssi_calibration);
    }
}

#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_engine_is_shareable() {
    assert_send_sync::<DemodEngine>();
}
