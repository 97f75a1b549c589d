//! Demodulator pool and fixed graph construction.
//!
//! One demodulator per mode is built once and added to the flowgraph
//! unwired; the arena is addressed by `Mode::index()`. The fixed part of the
//! graph (source, mixer, monitoring taps, power chain, displays, collectors)
//! is wired here and never touched by the coordinator.
//!
//! ```text
//! FrontEndSource → Mixer ─┬─► FftValve → Spectrum
//!                         ├─► RssiValve → |x|² → MovingAverage → SinglePoleIir → Log10 → Calibration → RssiReadout
//!                         └─► (active demodulator, wired per mode)
//! ```

use crate::analysis::SpectrumFrame;
use crate::backend::SharedFrontEnd;
use crate::config::EngineConfig;
use crate::demod::descriptor::Endpoint;
use crate::demod::mode::{
    DemodKind, Mode, OutputFamily, DIGITAL_RSSI_CALIBRATION, NARROW_CARRIER_OFFSET,
};
use crate::error::{DemodError, Result};
use crate::pipeline::bridge::{frequency_channel, FrequencySelector};
use crate::pipeline::nodes::{
    AnalogDemodNode, AudioSinkNode, CollectorHandle, ConstellationDisplayNode, DigitalDemodNode,
    DigitalOutput, FrameOutputs, FrontEndSourceNode, Latest, Log10Node, MagSquaredNode, MixerNode,
    MovingAverageNode, NumberDisplayNode, ScaleOffsetNode, SinglePoleIirNode, SpectrumDisplayNode,
    ValveHandle, ValveNode, VectorSinkNode, AUDIO_PORTS, FRAME_PORTS, RAW_PORTS,
};
use crate::pipeline::{AnyNode, Flowgraph, ItemType, NodeId, NodePlugin, PortDescriptor};
use crate::types::Complex32;
use crossbeam_channel::Receiver;

/// Queue depth of pending frequency selections.
const FREQUENCY_QUEUE: usize = 16;

/// Node ids of everything the builder added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineNodeIds {
    pub source: NodeId,
    pub mixer: NodeId,
    pub fft_valve: NodeId,
    pub spectrum: NodeId,
    pub const_valve: NodeId,
    pub constellation: NodeId,
    pub rssi_valve: NodeId,
    pub mag_squared: NodeId,
    pub moving_average: NodeId,
    pub iir: NodeId,
    pub log10: NodeId,
    pub calibration: NodeId,
    pub rssi_readout: NodeId,
    pub vector_sink: NodeId,
    pub audio_sink: NodeId,
    /// Demodulator arena, indexed by `Mode::index()`
    pub demods: [NodeId; Mode::COUNT],
}

impl PipelineNodeIds {
    pub fn demod(&self, mode: Mode) -> NodeId {
        self.demods[mode.index()]
    }

    /// Node behind a wiring-table endpoint while `mode` is being wired.
    pub fn resolve(&self, endpoint: Endpoint, mode: Mode) -> NodeId {
        match endpoint {
            Endpoint::Mixer => self.mixer,
            Endpoint::Demod => self.demod(mode),
            Endpoint::ConstValve => self.const_valve,
            Endpoint::Constellation => self.constellation,
            Endpoint::VectorSink => self.vector_sink,
            Endpoint::AudioSink => self.audio_sink,
        }
    }
}

/// Shared handles the control surface reads without the flowgraph lock.
#[derive(Debug, Clone)]
pub struct EngineHandles {
    pub fft_valve: ValveHandle,
    pub const_valve: ValveHandle,
    pub rssi_valve: ValveHandle,
    pub spectrum: Latest<SpectrumFrame>,
    pub constellation: Latest<Vec<Complex32>>,
    pub rssi: Latest<f32>,
    pub data: CollectorHandle<u8>,
    pub audio: CollectorHandle<f32>,
    pub frames: FrameOutputs,
    pub selector: FrequencySelector,
}

impl EngineHandles {
    /// Drop everything buffered for the previous mode.
    pub fn clear_outputs(&self) {
        self.data.clear();
        self.audio.clear();
        self.frames.frame1.clear();
        self.frames.frame2.clear();
        self.constellation.clear();
    }
}

/// Everything `PipelineBuilder::build` produces.
pub struct BuiltPipeline {
    pub graph: Flowgraph,
    pub ids: PipelineNodeIds,
    pub handles: EngineHandles,
    pub frequency_rx: Receiver<i64>,
}

/// Port signature a demodulator must present for `family`.
pub fn port_contract(family: OutputFamily) -> &'static [PortDescriptor] {
    match family {
        OutputFamily::Frames => FRAME_PORTS,
        OutputFamily::Raw => RAW_PORTS,
        OutputFamily::Audio => AUDIO_PORTS,
    }
}

/// Same directions and item types in the same order. Names are free.
fn honors_contract(ports: &[PortDescriptor], contract: &[PortDescriptor]) -> bool {
    ports.len() == contract.len()
        && ports
            .iter()
            .zip(contract)
            .all(|(p, c)| p.direction == c.direction && p.item == c.item)
}

/// Builder for the demodulator graph.
pub struct PipelineBuilder {
    config: EngineConfig,
    overrides: Vec<(Mode, Box<dyn NodePlugin>)>,
}

impl PipelineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            overrides: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the reference demodulator of `mode`.
    ///
    /// The plugin must present the port signature of the mode's family;
    /// `build` rejects it otherwise.
    pub fn with_demodulator(mut self, mode: Mode, demod: Box<dyn NodePlugin>) -> Self {
        self.overrides.retain(|(m, _)| *m != mode);
        self.overrides.push((mode, demod));
        self
    }

    fn reference_demod(mode: Mode, frames: &FrameOutputs) -> AnyNode {
        let params = mode.params();
        match params.kind {
            DemodKind::Digital { scheme, sps } => {
                let output = match params.family {
                    OutputFamily::Frames => DigitalOutput::Frames(frames.clone()),
                    _ => DigitalOutput::Raw,
                };
                DigitalDemodNode::new(
                    mode.name(),
                    scheme,
                    sps,
                    params.sample_rate,
                    params.filter_width,
                    output,
                )
                .into()
            }
            DemodKind::Analog {
                scheme,
                if_decimation,
                audio_decimation,
            } => AnalogDemodNode::new(
                mode.name(),
                scheme,
                if_decimation,
                audio_decimation,
                params.sample_rate,
            )
            .with_squelch_support(params.supports_squelch, params.supports_ctcss)
            .into(),
        }
    }

    /// Build the graph with every fixed edge connected and every
    /// demodulator unwired.
    pub fn build(self, front_end: SharedFrontEnd) -> Result<BuiltPipeline> {
        let settings = &self.config.pipeline;
        settings.validate()?;
        let sample_rate = f64::from(self.config.front_end.sample_rate);

        let mut overrides: Vec<Option<Box<dyn NodePlugin>>> =
            (0..Mode::COUNT).map(|_| None).collect();
        for (mode, demod) in self.overrides {
            let contract = port_contract(mode.family());
            if !honors_contract(demod.ports(), contract) {
                return Err(DemodError::Configuration(format!(
                    "Demodulator '{}' does not match the {:?} port contract of {}",
                    demod.name(),
                    mode.family(),
                    mode
                )));
            }
            overrides[mode.index()] = Some(demod);
        }

        let mut graph = Flowgraph::new();

        let fft_valve = ValveNode::new("FftValve", ItemType::Complex, false);
        let const_valve = ValveNode::new("ConstValve", ItemType::Complex, false);
        let rssi_valve = ValveNode::new("RssiValve", ItemType::Complex, false);
        let spectrum = SpectrumDisplayNode::new(settings.fft_size, sample_rate);
        let constellation = ConstellationDisplayNode::new(settings.constellation_points);
        let readout = NumberDisplayNode::new("RssiReadout");
        let data = CollectorHandle::new(settings.max_data_bytes);
        let audio = CollectorHandle::new(settings.max_audio_samples);
        let frames = FrameOutputs {
            frame1: CollectorHandle::new(settings.max_frame_bytes),
            frame2: CollectorHandle::new(settings.max_frame_bytes),
        };
        let (selector, frequency_rx) = frequency_channel(FREQUENCY_QUEUE);

        let handles = EngineHandles {
            fft_valve: fft_valve.handle(),
            const_valve: const_valve.handle(),
            rssi_valve: rssi_valve.handle(),
            spectrum: spectrum.handle(),
            constellation: constellation.handle(),
            rssi: readout.handle(),
            data: data.clone(),
            audio: audio.clone(),
            frames: frames.clone(),
            selector,
        };

        let source = graph.add_node(FrontEndSourceNode::new(front_end, settings.block_size));
        let mixer = graph.add_node(MixerNode::new(
            -(NARROW_CARRIER_OFFSET as f64),
            sample_rate,
        ));
        let fft_valve = graph.add_node(fft_valve);
        let spectrum = graph.add_node(spectrum);
        let const_valve = graph.add_node(const_valve);
        let constellation = graph.add_node(constellation);
        let rssi_valve = graph.add_node(rssi_valve);
        let mag_squared = graph.add_node(MagSquaredNode);
        let moving_average = graph.add_node(MovingAverageNode::new(settings.rssi_window, 1.0));
        let iir = graph.add_node(SinglePoleIirNode::new(settings.rssi_alpha));
        let log10 = graph.add_node(Log10Node);
        let calibration = graph.add_node(ScaleOffsetNode::new(10.0, DIGITAL_RSSI_CALIBRATION));
        let rssi_readout = graph.add_node(readout);
        let vector_sink = graph.add_node(VectorSinkNode::new(data));
        let audio_sink = graph.add_node(AudioSinkNode::new(audio));

        let mut demods = [NodeId::INVALID; Mode::COUNT];
        for (mode, slot) in Mode::ALL.into_iter().zip(overrides) {
            demods[mode.index()] = match slot {
                Some(plugin) => {
                    tracing::info!("Using custom demodulator '{}' for {}", plugin.name(), mode);
                    graph.add_node(plugin)
                }
                None => graph.add_node(Self::reference_demod(mode, &frames)),
            };
        }

        let fixed = [
            (source, mixer),
            (mixer, fft_valve),
            (fft_valve, spectrum),
            (mixer, rssi_valve),
            (rssi_valve, mag_squared),
            (mag_squared, moving_average),
            (moving_average, iir),
            (iir, log10),
            (log10, calibration),
            (calibration, rssi_readout),
        ];
        for (from, to) in fixed {
            graph.connect(from.port(0), to.port(0))?;
        }

        let ids = PipelineNodeIds {
            source,
            mixer,
            fft_valve,
            spectrum,
            const_valve,
            constellation,
            rssi_valve,
            mag_squared,
            moving_average,
            iir,
            log10,
            calibration,
            rssi_readout,
            vector_sink,
            audio_sink,
            demods,
        };

        tracing::debug!(
            "Built flowgraph: {} nodes, {} fixed edges",
            graph.node_count(),
            graph.edges().len()
        );

        Ok(BuiltPipeline {
            graph,
            ids,
            handles,
            frequency_rx,
        })
    }
}
