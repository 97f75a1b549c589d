//! Public control surface of the demodulator engine.
//!
//! `DemodEngine` owns the flowgraph, the mode switch coordinator and the
//! processing thread. All methods take `&self` so the engine can be shared
//! between a control thread and observers.
//!
//! # Example
//!
//! ```ignore
//! use demod_engine::{backend::SimulatedFrontEnd, config::EngineConfig, demod::Mode, DemodEngine};
//!
//! let engine = DemodEngine::new(EngineConfig::default(), Box::new(SimulatedFrontEnd::new()))?;
//! engine.set_mode(Mode::Wbfm)?;
//! engine.start()?;
//! let audio = engine.get_audio();
//! engine.stop()?;
//! ```

use crate::analysis::SpectrumFrame;
use crate::backend::{initialize, share, FrontEnd, SharedFrontEnd};
use crate::config::EngineConfig;
use crate::demod::{
    EngineHandles, Mode, ModeSwitchCoordinator, OutputFamily, PipelineBuilder, PipelineState,
    WiringTable,
};
use crate::error::{DemodError, Result};
use crate::pipeline::{
    EngineEvent, EventBus, Flowgraph, FrequencySelector, Pacer, PipelineError, TopologySnapshot,
};
use crate::sync::lock_or_recover;
use crate::types::{Complex32, EngineStatus, GainSetting};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Name of the processing thread.
const WORKER_THREAD: &str = "demod-pipeline";

pub struct DemodEngine {
    config: EngineConfig,
    coordinator: Mutex<ModeSwitchCoordinator>,
    graph: Arc<Mutex<Flowgraph>>,
    front_end: SharedFrontEnd,
    handles: EngineHandles,
    frequency_rx: Receiver<i64>,
    events: EventBus,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DemodEngine {
    /// Initialize the front end and build the graph with reference
    /// demodulators.
    pub fn new(config: EngineConfig, front_end: Box<dyn FrontEnd>) -> Result<Self> {
        Self::with_builder(PipelineBuilder::new(config), front_end)
    }

    /// Like `new`, but with a builder that may carry replacement demodulators.
    pub fn with_builder(builder: PipelineBuilder, front_end: Box<dyn FrontEnd>) -> Result<Self> {
        let config = builder.config().clone();
        config.pipeline.validate()?;

        let front_end = share(front_end);
        let mut state = PipelineState::new(config.front_end.frequency);
        state.gain = Some(initialize(
            &front_end,
            &config.front_end,
            state.device_frequency,
        )?);

        let built = builder.build(Arc::clone(&front_end))?;
        let coordinator = ModeSwitchCoordinator::new(
            WiringTable::standard(),
            built.ids,
            built.handles.clone(),
            Arc::clone(&front_end),
            state,
        );

        let engine = Self {
            config,
            coordinator: Mutex::new(coordinator),
            graph: Arc::new(Mutex::new(built.graph)),
            front_end,
            handles: built.handles,
            frequency_rx: built.frequency_rx,
            events: EventBus::new(),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        };

        if let Some(mode) = engine.config.initial_mode {
            engine.set_mode(mode)?;
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Lifecycle ──

    /// Begin sample flow on the processing thread.
    pub fn start(&self) -> Result<()> {
        let mut worker = lock_or_recover(&self.worker, "worker");
        if worker.is_some() && self.running.load(Ordering::Acquire) {
            return Ok(());
        }
        // A worker that stopped on its own (fault) is reaped first.
        if let Some(handle) = worker.take() {
            Self::join(handle);
        }

        {
            let mut graph = lock_or_recover(&self.graph, "flowgraph");
            if let Some(fault) = graph.fault() {
                return Err(DemodError::ProcessingStopped(fault.to_string()));
            }
            graph.activate();
        }

        self.running.store(true, Ordering::Release);
        let graph = Arc::clone(&self.graph);
        let running = Arc::clone(&self.running);
        let events = self.events.clone();
        let pacer = Pacer::new(
            self.config.pipeline.block_size,
            f64::from(self.config.front_end.sample_rate),
            self.config.pipeline.throttle,
        );

        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD.to_string())
            .spawn(move || run_worker(graph, running, events, pacer))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                DemodError::Io(e)
            })?;
        *worker = Some(handle);

        tracing::info!("Sample flow started");
        self.events.publish(EngineEvent::Started);
        Ok(())
    }

    /// Halt sample flow. Returns after the processing thread has exited.
    ///
    /// The worker slot stays locked until the thread is joined and the graph
    /// deactivated, so a concurrent `start` waits instead of racing the
    /// shutdown.
    pub fn stop(&self) -> Result<()> {
        let mut worker = lock_or_recover(&self.worker, "worker");
        let Some(handle) = worker.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::Release);
        Self::join(handle);

        lock_or_recover(&self.graph, "flowgraph").deactivate();
        drop(worker);
        tracing::info!("Sample flow stopped");
        self.events.publish(EngineEvent::Stopped);
        Ok(())
    }

    fn join(handle: JoinHandle<()>) {
        if handle.join().is_err() {
            tracing::error!("Processing thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // ── Mode and tuning ──

    pub fn set_mode(&self, mode: Mode) -> Result<()> {
        let mut coordinator = lock_or_recover(&self.coordinator, "coordinator");
        let result = {
            let mut graph = lock_or_recover(&self.graph, "flowgraph");
            coordinator.set_mode(&mut graph, mode)
        };

        match result {
            Ok(()) => {
                let state = coordinator.state();
                self.events.publish(EngineEvent::ModeChanged {
                    mode,
                    carrier_offset: state.carrier_offset,
                    device_frequency: state.device_frequency,
                });
                Ok(())
            }
            Err(e) => {
                if e.is_fatal() {
                    self.events.publish(EngineEvent::Fault(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Select a mode by numeric id. Unknown ids are rejected before any
    /// state changes.
    pub fn set_mode_id(&self, id: u32) -> Result<()> {
        self.set_mode(Mode::try_from(id)?)
    }

    pub fn active_mode(&self) -> Option<Mode> {
        lock_or_recover(&self.coordinator, "coordinator")
            .state()
            .active_mode
    }

    /// Tune to an absolute center frequency in Hz.
    pub fn tune(&self, center_frequency: i64) -> Result<()> {
        let device_frequency = {
            let mut coordinator = lock_or_recover(&self.coordinator, "coordinator");
            let graph = lock_or_recover(&self.graph, "flowgraph");
            coordinator.tune(&graph, center_frequency)?
        };
        self.events.publish(EngineEvent::Retuned { device_frequency });
        Ok(())
    }

    /// Logical receive gain in `[0, 1]`.
    pub fn set_rx_sensitivity(&self, value: f32) -> Result<GainSetting> {
        lock_or_recover(&self.coordinator, "coordinator").set_gain(value)
    }

    pub fn enable_gui_fft(&self, enabled: bool) {
        lock_or_recover(&self.coordinator, "coordinator").set_fft_enabled(enabled);
    }

    /// Toggles the constellation tap and the RSSI readout together.
    pub fn enable_gui_const(&self, enabled: bool) {
        lock_or_recover(&self.coordinator, "coordinator").set_const_enabled(enabled);
    }

    /// Squelch level in dB, `0` = off. Reaches AM/FM/SSB demodulators only.
    pub fn set_squelch(&self, level: i32) -> Result<()> {
        let mut coordinator = lock_or_recover(&self.coordinator, "coordinator");
        let mut graph = lock_or_recover(&self.graph, "flowgraph");
        coordinator.set_squelch(&mut graph, level).map(|_| ())
    }

    /// CTCSS tone in Hz, `0.0` = off. Reaches the NBFM demodulators only.
    pub fn set_ctcss(&self, tone_hz: f32) -> Result<()> {
        let mut coordinator = lock_or_recover(&self.coordinator, "coordinator");
        let mut graph = lock_or_recover(&self.graph, "flowgraph");
        coordinator.set_ctcss(&mut graph, tone_hz).map(|_| ())
    }

    // ── Output collectors ──

    fn active_family(&self) -> Option<OutputFamily> {
        self.active_mode().map(Mode::family)
    }

    /// Decoded bytes of frame channel 1; `None` outside frame modes.
    pub fn get_frame1(&self) -> Option<Vec<u8>> {
        (self.active_family() == Some(OutputFamily::Frames))
            .then(|| self.handles.frames.frame1.take())
    }

    /// Decoded bytes of frame channel 2; `None` outside frame modes.
    pub fn get_frame2(&self) -> Option<Vec<u8>> {
        (self.active_family() == Some(OutputFamily::Frames))
            .then(|| self.handles.frames.frame2.take())
    }

    /// Buffered raw symbol bits; empty outside raw modes.
    pub fn get_data(&self) -> Vec<u8> {
        match self.active_family() {
            Some(OutputFamily::Raw) => self.handles.data.take(),
            _ => Vec::new(),
        }
    }

    /// Buffered audio samples; empty outside audio modes.
    pub fn get_audio(&self) -> Vec<f32> {
        match self.active_family() {
            Some(OutputFamily::Audio) => self.handles.audio.take(),
            _ => Vec::new(),
        }
    }

    /// Newest frequency selected on the spectrum display, or 0 if nothing
    /// was selected since the previous call.
    pub fn get_freq(&self) -> i64 {
        self.frequency_rx.try_iter().last().unwrap_or(0)
    }

    // ── Monitoring ──

    pub fn rssi(&self) -> Option<f32> {
        self.handles.rssi.get()
    }

    pub fn spectrum(&self) -> Option<SpectrumFrame> {
        self.handles.spectrum.get()
    }

    pub fn constellation(&self) -> Option<Vec<Complex32>> {
        self.handles.constellation.get()
    }

    /// Handle a spectrum display uses to report selections.
    pub fn frequency_selector(&self) -> FrequencySelector {
        self.handles.selector.clone()
    }

    pub fn events(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        lock_or_recover(&self.coordinator, "coordinator")
            .state()
            .clone()
    }

    pub fn fault(&self) -> Option<String> {
        lock_or_recover(&self.graph, "flowgraph")
            .fault()
            .map(str::to_string)
    }

    pub fn topology(&self) -> TopologySnapshot {
        lock_or_recover(&self.graph, "flowgraph").topology()
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        let blocks_processed = lock_or_recover(&self.graph, "flowgraph").tick_count();
        EngineStatus {
            mode: state.active_mode,
            carrier_offset: state.carrier_offset,
            desired_frequency: state.desired_frequency,
            device_frequency: state.device_frequency,
            fft_enabled: state.fft_enabled,
            const_enabled: state.const_enabled,
            rssi: self.rssi(),
            running: self.is_running(),
            blocks_processed,
        }
    }

    /// Frequency the hardware reports, for diagnostics.
    pub fn hardware_frequency(&self) -> f64 {
        lock_or_recover(&self.front_end, "front end").center_freq()
    }
}

impl Drop for DemodEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Failed to stop engine on drop: {}", e);
        }
    }
}

/// Processing loop: one flowgraph tick per block until stopped or faulted.
fn run_worker(
    graph: Arc<Mutex<Flowgraph>>,
    running: Arc<AtomicBool>,
    events: EventBus,
    mut pacer: Pacer,
) {
    tracing::debug!("Processing thread up");
    while running.load(Ordering::Acquire) {
        let result = lock_or_recover(&graph, "flowgraph").tick();
        if let Err(e) = result {
            // A fault set by a failed reconfiguration was already reported.
            if !matches!(e, PipelineError::Faulted(_)) {
                events.publish(EngineEvent::Fault(e.to_string()));
            }
            tracing::error!("Processing stopped: {}", e);
            running.store(false, Ordering::Release);
            break;
        }
        pacer.wait();
    }
    tracing::debug!("Processing thread exiting");
}
