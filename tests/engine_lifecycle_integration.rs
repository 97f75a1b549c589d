//! Integration tests for the engine lifecycle
//!
//! These tests validate:
//! - Start/stop/start keeps the graph and its wiring
//! - Front-end failures stop the flowgraph and are reported
//! - Replacement demodulators plug into the pool

mod common;

use common::builders::EngineBuilder;
use common::mock_helpers::{fm_front_end, BrokenDemod, CountingDemod};
use common::{wait_for, DESIRED_FREQUENCY};
use demod_engine::backend::SimulatedFrontEnd;
use demod_engine::pipeline::EngineEvent;
use demod_engine::{DemodError, Mode};
use std::sync::atomic::Ordering;

#[test]
fn test_start_stop_start_keeps_wiring() {
    let (engine, _) = EngineBuilder::new()
        .front_end(fm_front_end(DESIRED_FREQUENCY as f64))
        .build();
    engine.set_mode(Mode::Nbfm2500).unwrap();
    let wiring = engine.topology().edges;

    engine.start().unwrap();
    assert!(engine.is_running());
    assert!(wait_for(|| engine.status().blocks_processed > 5));
    engine.stop().unwrap();
    assert!(!engine.is_running());

    engine.start().unwrap();
    assert!(engine.is_running());
    assert_eq!(engine.topology().edges, wiring);
    assert_eq!(engine.active_mode(), Some(Mode::Nbfm2500));
    assert!(wait_for(|| !engine.get_audio().is_empty()));
    engine.stop().unwrap();
}

#[test]
fn test_lifecycle_events_are_published() {
    let (engine, _) = EngineBuilder::new().build();
    let events = engine.events();

    engine.start().unwrap();
    engine.start().unwrap(); // already running: no second event
    engine.stop().unwrap();
    engine.stop().unwrap(); // already stopped: no second event

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(received, vec![EngineEvent::Started, EngineEvent::Stopped]);
}

#[test]
fn test_stop_without_start_is_noop() {
    let (engine, _) = EngineBuilder::new().build();
    engine.stop().unwrap();
    assert!(!engine.is_running());
}

#[test]
fn test_front_end_failure_faults_pipeline() {
    let (engine, _) = EngineBuilder::new()
        .front_end(SimulatedFrontEnd::new().fail_after(20_000))
        .build();
    let events = engine.events();
    engine.set_mode(Mode::Am5000).unwrap();
    engine.start().unwrap();

    assert!(wait_for(|| !engine.is_running()));
    let fault = engine.fault().expect("fault should be recorded");
    assert!(fault.contains("simulated device lost"), "got: {}", fault);

    let received: Vec<_> = events.try_iter().collect();
    assert!(received
        .iter()
        .any(|e| matches!(e, EngineEvent::Fault(msg) if msg.contains("simulated device lost"))));

    // No further flow and no further reconfiguration
    assert!(matches!(
        engine.start(),
        Err(DemodError::ProcessingStopped(_))
    ));
    assert!(matches!(
        engine.set_mode(Mode::Wbfm),
        Err(DemodError::ProcessingStopped(_))
    ));
    assert_eq!(engine.active_mode(), Some(Mode::Am5000));
}

#[test]
fn test_demodulator_failure_faults_pipeline() {
    let (engine, _) = EngineBuilder::new()
        .demodulator(Mode::Ssb2500, Box::new(BrokenDemod))
        .build();
    engine.set_mode(Mode::Ssb2500).unwrap();
    engine.start().unwrap();

    assert!(wait_for(|| engine.fault().is_some()));
    assert!(wait_for(|| !engine.is_running()));
    assert!(engine.fault().unwrap().contains("synchronizer diverged"));
    engine.stop().unwrap();
}

#[test]
fn test_replacement_demodulator_receives_samples() {
    let (counting, received) = CountingDemod::new();
    let (engine, _) = EngineBuilder::new()
        .demodulator(Mode::Nbfm5000, counting)
        .build();

    // Unwired demodulators see nothing
    engine.set_mode(Mode::Am5000).unwrap();
    engine.start().unwrap();
    assert!(wait_for(|| engine.status().blocks_processed > 5));
    assert_eq!(received.load(Ordering::Relaxed), 0);

    engine.set_mode(Mode::Nbfm5000).unwrap();
    assert!(wait_for(|| received.load(Ordering::Relaxed) > 0));
    assert!(wait_for(|| !engine.get_audio().is_empty()));
    engine.stop().unwrap();
}

#[test]
fn test_replacement_with_wrong_shape_is_rejected() {
    let (counting, _) = CountingDemod::new();
    let builder = demod_engine::demod::PipelineBuilder::new(demod_engine::EngineConfig::default())
        .with_demodulator(Mode::Bpsk2000, counting);
    let result =
        demod_engine::DemodEngine::with_builder(builder, Box::new(SimulatedFrontEnd::new()));
    assert!(matches!(result, Err(DemodError::Configuration(_))));
}

#[test]
fn test_initial_mode_from_config() {
    let (engine, _) = EngineBuilder::new()
        .config(|c| c.initial_mode = Some(Mode::Qpsk250000))
        .build();
    assert_eq!(engine.active_mode(), Some(Mode::Qpsk250000));
    assert_eq!(engine.state().device_frequency, DESIRED_FREQUENCY - 250_000);
}

#[test]
fn test_drop_stops_worker() {
    let (engine, _) = EngineBuilder::new().build();
    engine.set_mode(Mode::Bpsk2000).unwrap();
    engine.start().unwrap();
    drop(engine);
}
