//! Declarative wiring table.
//!
//! Every mode is a data record: the edges to add on activation (removed in
//! reverse on deactivation) and the parameter actions to apply afterwards.
//! The coordinator is generic over this table, so a connect can never be
//! paired with a mismatched disconnect.

use crate::demod::mode::{Mode, OutputFamily};
use crate::error::{DemodError, Result};
use std::collections::HashMap;

/// A node in the fixed part of the graph, or the mode's own demodulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Mixer,
    /// The demodulator of the mode being wired
    Demod,
    ConstValve,
    Constellation,
    VectorSink,
    AudioSink,
}

/// One edge: (endpoint, output index) → (endpoint, input index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireSpec {
    pub from: (Endpoint, u16),
    pub to: (Endpoint, u16),
}

impl WireSpec {
    pub const fn new(from: Endpoint, from_port: u16, to: Endpoint, to_port: u16) -> Self {
        Self {
            from: (from, from_port),
            to: (to, to_port),
        }
    }
}

/// Parameter changes applied after a mode's edges are connected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamAction {
    /// Reassert the operating sample rate on the oscillator and front end
    SetSampleRate(f64),
    /// Move the intermediate channel; retunes only when the offset changes
    SetCarrierOffset(i64),
    /// Additive dB constant of the power chain
    SetRssiCalibration(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemodulatorDescriptor {
    pub mode: Mode,
    /// Edges in insertion order
    pub edges: Vec<WireSpec>,
    pub actions: Vec<ParamAction>,
}

impl DemodulatorDescriptor {
    /// Standard descriptor derived from the mode's family and parameters.
    pub fn for_mode(mode: Mode) -> Self {
        use Endpoint::*;

        let params = mode.params();
        let mut edges = vec![WireSpec::new(Mixer, 0, Demod, 0)];
        match params.family {
            OutputFamily::Frames => {
                edges.push(WireSpec::new(Demod, 0, ConstValve, 0));
                edges.push(WireSpec::new(ConstValve, 0, Constellation, 0));
            }
            OutputFamily::Raw => {
                edges.push(WireSpec::new(Demod, 0, ConstValve, 0));
                edges.push(WireSpec::new(ConstValve, 0, Constellation, 0));
                edges.push(WireSpec::new(Demod, 1, VectorSink, 0));
            }
            OutputFamily::Audio => {
                edges.push(WireSpec::new(Demod, 0, AudioSink, 0));
            }
        }

        Self {
            mode,
            edges,
            actions: vec![
                ParamAction::SetSampleRate(params.sample_rate),
                ParamAction::SetCarrierOffset(params.carrier_offset),
                ParamAction::SetRssiCalibration(params.rssi_calibration),
            ],
        }
    }
}

/// Registry of descriptors, one per mode.
#[derive(Debug, Clone, Default)]
pub struct WiringTable {
    descriptors: HashMap<Mode, DemodulatorDescriptor>,
}

impl WiringTable {
    /// An empty table. Lookups fail until descriptors are inserted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering every mode.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for mode in Mode::ALL {
            table.insert(DemodulatorDescriptor::for_mode(mode));
        }
        table
    }

    pub fn insert(&mut self, descriptor: DemodulatorDescriptor) {
        self.descriptors.insert(descriptor.mode, descriptor);
    }

    pub fn descriptor(&self, mode: Mode) -> Result<&DemodulatorDescriptor> {
        self.descriptors.get(&mode).ok_or_else(|| {
            DemodError::Configuration(format!("No wiring descriptor for mode {}", mode))
        })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
