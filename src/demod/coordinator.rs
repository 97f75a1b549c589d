//! Mode switch coordinator.
//!
//! Owns the pipeline state record and funnels every mutation of it through
//! its operations. Rewiring runs with the flowgraph lock held by the caller,
//! so the processing thread never observes a half-wired graph: teardown of
//! the previous mode completes before the first edge of the next one is
//! added, and ticks resume only after the lock is released.
//!
//! Lock order: coordinator → flowgraph → front end.

use crate::backend::{apply_logical_gain, SharedFrontEnd};
use crate::demod::descriptor::{DemodulatorDescriptor, ParamAction, WiringTable};
use crate::demod::mode::{Mode, DIGITAL_RSSI_CALIBRATION, NARROW_CARRIER_OFFSET};
use crate::demod::pool::{EngineHandles, PipelineNodeIds};
use crate::error::{DemodError, Result, ResultExt};
use crate::pipeline::{ConfigValue, Flowgraph, PortId};
use crate::sync::lock_or_recover;
use crate::types::GainSetting;
use serde::Serialize;

/// Pipeline-wide mutable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState {
    /// `None` until the first successful `set_mode`
    pub active_mode: Option<Mode>,
    pub carrier_offset: i64,
    pub desired_frequency: i64,
    /// Always `desired_frequency - carrier_offset`
    pub device_frequency: i64,
    pub fft_enabled: bool,
    /// Drives both the constellation tap and the RSSI readout
    pub const_enabled: bool,
    pub rssi_calibration: f32,
    pub gain: Option<GainSetting>,
}

impl PipelineState {
    pub fn new(desired_frequency: i64) -> Self {
        Self {
            active_mode: None,
            carrier_offset: NARROW_CARRIER_OFFSET,
            desired_frequency,
            device_frequency: desired_frequency - NARROW_CARRIER_OFFSET,
            fft_enabled: false,
            const_enabled: false,
            rssi_calibration: DIGITAL_RSSI_CALIBRATION,
            gain: None,
        }
    }
}

pub struct ModeSwitchCoordinator {
    table: WiringTable,
    ids: PipelineNodeIds,
    handles: EngineHandles,
    front_end: SharedFrontEnd,
    state: PipelineState,
    /// Edges of the active mode, in insertion order
    active_edges: Vec<(PortId, PortId)>,
}

impl ModeSwitchCoordinator {
    pub fn new(
        table: WiringTable,
        ids: PipelineNodeIds,
        handles: EngineHandles,
        front_end: SharedFrontEnd,
        state: PipelineState,
    ) -> Self {
        Self {
            table,
            ids,
            handles,
            front_end,
            state,
            active_edges: Vec::new(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn ids(&self) -> &PipelineNodeIds {
        &self.ids
    }

    pub fn active_edges(&self) -> &[(PortId, PortId)] {
        &self.active_edges
    }

    /// Switch the graph to `mode`.
    ///
    /// Re-selecting the active mode still tears down and rebuilds so the
    /// per-mode parameters are reasserted. Any failure after the lookup
    /// faults the flowgraph.
    pub fn set_mode(&mut self, graph: &mut Flowgraph, mode: Mode) -> Result<()> {
        if let Some(fault) = graph.fault() {
            return Err(DemodError::ProcessingStopped(fault.to_string()));
        }
        let descriptor = self.table.descriptor(mode)?.clone();

        let previous = self.state.active_mode;
        match self.rewire(graph, &descriptor) {
            Ok(()) => {
                tracing::info!(
                    "Mode {} -> {}: offset {} Hz, device {} Hz, calibration {} dB",
                    previous.map_or("none", Mode::name),
                    mode,
                    self.state.carrier_offset,
                    self.state.device_frequency,
                    self.state.rssi_calibration
                );
                Ok(())
            }
            Err(e) => {
                let e = e.with_context(format!("Switching to {}", mode));
                graph.set_fault(e.to_string());
                Err(e)
            }
        }
    }

    fn rewire(&mut self, graph: &mut Flowgraph, descriptor: &DemodulatorDescriptor) -> Result<()> {
        let mode = descriptor.mode;

        if let Some(previous) = self.state.active_mode.take() {
            tracing::debug!("Tearing down {} ({} edges)", previous, self.active_edges.len());
        }
        while let Some((from, to)) = self.active_edges.pop() {
            graph.disconnect(from, to)?;
        }
        self.handles.clear_outputs();
        // No state from an earlier activation of this mode may reach the new output
        graph.reset_node(self.ids.demod(mode))?;

        for wire in &descriptor.edges {
            let from = self.ids.resolve(wire.from.0, mode).port(wire.from.1);
            let to = self.ids.resolve(wire.to.0, mode).port(wire.to.1);
            graph.connect(from, to)?;
            self.active_edges.push((from, to));
        }
        self.state.active_mode = Some(mode);

        for action in &descriptor.actions {
            self.apply(graph, *action)?;
        }
        Ok(())
    }

    fn apply(&mut self, graph: &mut Flowgraph, action: ParamAction) -> Result<()> {
        match action {
            ParamAction::SetSampleRate(rate) => {
                graph.configure(self.ids.mixer, "sample_rate", &ConfigValue::Float(rate))?;
                graph.configure(self.ids.spectrum, "sample_rate", &ConfigValue::Float(rate))?;
                lock_or_recover(&self.front_end, "front end")
                    .set_sample_rate(rate)
                    .context("Setting sample rate")?;
            }
            ParamAction::SetCarrierOffset(offset) => {
                if offset != self.state.carrier_offset {
                    graph.configure(
                        self.ids.mixer,
                        "frequency",
                        &ConfigValue::Float(-(offset as f64)),
                    )?;
                    self.retune(self.state.desired_frequency, offset)?;
                }
            }
            ParamAction::SetRssiCalibration(calibration) => {
                graph.configure(
                    self.ids.calibration,
                    "offset",
                    &ConfigValue::Float(f64::from(calibration)),
                )?;
                self.state.rssi_calibration = calibration;
            }
        }
        Ok(())
    }

    /// Apply `device = desired - offset` to the hardware. State is only
    /// committed once the hardware accepted the frequency.
    fn retune(&mut self, desired: i64, offset: i64) -> Result<i64> {
        let device = desired - offset;
        lock_or_recover(&self.front_end, "front end")
            .set_center_freq(device as f64)
            .with_context(|| format!("Tuning to {} Hz", device))?;
        self.state.desired_frequency = desired;
        self.state.carrier_offset = offset;
        self.state.device_frequency = device;
        tracing::info!(
            "Retuned: desired {} Hz, offset {} Hz, device {} Hz",
            desired,
            offset,
            device
        );
        Ok(device)
    }

    /// Set the desired center frequency. Returns the device frequency.
    ///
    /// The graph is only inspected for a fault; the new frequency lands
    /// between blocks.
    pub fn tune(&mut self, graph: &Flowgraph, desired_frequency: i64) -> Result<i64> {
        if let Some(fault) = graph.fault() {
            return Err(DemodError::ProcessingStopped(fault.to_string()));
        }
        self.retune(desired_frequency, self.state.carrier_offset)
    }

    pub fn set_gain(&mut self, value: f32) -> Result<GainSetting> {
        let setting = {
            let mut fe = lock_or_recover(&self.front_end, "front end");
            apply_logical_gain(fe.as_mut(), value)?
        };
        self.state.gain = Some(setting);
        Ok(setting)
    }

    pub fn set_fft_enabled(&mut self, enabled: bool) {
        self.handles.fft_valve.set_open(enabled);
        self.state.fft_enabled = enabled;
        tracing::debug!("Spectrum tap {}", if enabled { "on" } else { "off" });
    }

    /// One flag for both the constellation tap and the RSSI readout.
    pub fn set_const_enabled(&mut self, enabled: bool) {
        self.handles.const_valve.set_open(enabled);
        self.handles.rssi_valve.set_open(enabled);
        self.state.const_enabled = enabled;
        tracing::debug!("Constellation/RSSI tap {}", if enabled { "on" } else { "off" });
    }

    /// Forward a squelch level to every demodulator that supports one.
    /// Returns how many received it.
    pub fn set_squelch(&mut self, graph: &mut Flowgraph, level: i32) -> Result<usize> {
        let value = ConfigValue::Int(i64::from(level));
        self.forward(graph, "squelch", &value, |mode| mode.params().supports_squelch)
    }

    /// Forward a CTCSS tone to every demodulator that supports one.
    pub fn set_ctcss(&mut self, graph: &mut Flowgraph, tone_hz: f32) -> Result<usize> {
        let value = ConfigValue::Float(f64::from(tone_hz));
        self.forward(graph, "ctcss", &value, |mode| mode.params().supports_ctcss)
    }

    fn forward(
        &self,
        graph: &mut Flowgraph,
        key: &str,
        value: &ConfigValue,
        supports: impl Fn(Mode) -> bool,
    ) -> Result<usize> {
        let mut count = 0;
        for mode in Mode::ALL.into_iter().filter(|m| supports(*m)) {
            graph.configure(self.ids.demod(mode), key, value)?;
            count += 1;
        }
        tracing::debug!("Forwarded {} = {:?} to {} demodulators", key, value, count);
        Ok(count)
    }
}
