//! Simulated hardware and replacement nodes

use demod_engine::backend::{CarrierModulation, SimulatedCarrier, SimulatedFrontEnd};
use demod_engine::pipeline::{
    ItemType, NodeContext, NodePlugin, PipelineError, PipelineResult, PortDescriptor,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static AUDIO_SHAPE: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Complex),
    PortDescriptor::output("audio", ItemType::Float),
];

/// Front end seeing an FM carrier exactly at `center`
pub fn fm_front_end(center: f64) -> SimulatedFrontEnd {
    SimulatedFrontEnd::new()
        .with_carrier(
            SimulatedCarrier::tone(center, 0.5).with_modulation(CarrierModulation::Fm {
                deviation: 2_500.0,
                tone: 1_000.0,
            }),
        )
        .with_noise(0.001)
}

/// Front end seeing a BPSK carrier exactly at `center`
pub fn bpsk_front_end(center: f64, symbol_rate: f64) -> SimulatedFrontEnd {
    SimulatedFrontEnd::new().with_carrier(
        SimulatedCarrier::tone(center, 0.5)
            .with_modulation(CarrierModulation::Bpsk { symbol_rate }),
    )
}

/// Audio-shaped demodulator that counts the samples it receives
pub struct CountingDemod {
    pub received: Arc<AtomicU64>,
}

impl CountingDemod {
    pub fn new() -> (Box<dyn NodePlugin>, Arc<AtomicU64>) {
        let received = Arc::new(AtomicU64::new(0));
        (
            Box::new(Self {
                received: Arc::clone(&received),
            }),
            received,
        )
    }
}

impl NodePlugin for CountingDemod {
    fn name(&self) -> &str {
        "CountingDemod"
    }

    fn ports(&self) -> &[PortDescriptor] {
        AUDIO_SHAPE
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let n = ctx.complex_input(0)?.len();
        self.received.fetch_add(n as u64, Ordering::Relaxed);
        ctx.float_output(0)?.extend(std::iter::repeat(0.25).take(n / 125));
        Ok(())
    }
}

/// Audio-shaped demodulator that fails on its first block
pub struct BrokenDemod;

impl NodePlugin for BrokenDemod {
    fn name(&self) -> &str {
        "BrokenDemod"
    }

    fn ports(&self) -> &[PortDescriptor] {
        AUDIO_SHAPE
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        Err(PipelineError::Node {
            node_id: ctx.node_id,
            message: "synchronizer diverged".to_string(),
        })
    }
}
