//! Test data builders for creating engines

use demod_engine::backend::{SimulatedFrontEnd, SimulatedSettings};
use demod_engine::config::EngineConfig;
use demod_engine::demod::PipelineBuilder;
use demod_engine::pipeline::NodePlugin;
use demod_engine::{DemodEngine, GainRange, Mode};
use std::sync::{Arc, Mutex};

/// Builder for engines backed by the simulated front end
pub struct EngineBuilder {
    config: EngineConfig,
    front_end: SimulatedFrontEnd,
    demods: Vec<(Mode, Box<dyn NodePlugin>)>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        let mut config = EngineConfig::default();
        // Keep tests fast
        config.pipeline.throttle = false;
        config.pipeline.block_size = 2_000;
        Self {
            config,
            front_end: SimulatedFrontEnd::new(),
            demods: Vec::new(),
        }
    }

    pub fn front_end(mut self, front_end: SimulatedFrontEnd) -> Self {
        self.front_end = front_end;
        self
    }

    pub fn gain_range(mut self, range: GainRange) -> Self {
        self.front_end = self.front_end.with_gain_range(range);
        self
    }

    pub fn frequency(mut self, hz: i64) -> Self {
        self.config.front_end.frequency = hz;
        self
    }

    pub fn demodulator(mut self, mode: Mode, demod: Box<dyn NodePlugin>) -> Self {
        self.demods.push((mode, demod));
        self
    }

    pub fn config(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the engine and return a handle to the simulated hardware settings
    pub fn build(self) -> (DemodEngine, Arc<Mutex<SimulatedSettings>>) {
        let settings = self.front_end.settings_handle();
        let mut builder = PipelineBuilder::new(self.config);
        for (mode, demod) in self.demods {
            builder = builder.with_demodulator(mode, demod);
        }
        let engine = DemodEngine::with_builder(builder, Box::new(self.front_end))
            .expect("engine should build");
        (engine, settings)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
