//! Demodulation modes and runtime mode switching.
//!
//! - [`Mode`] - the fixed registry of fourteen modes and their parameters
//! - [`WiringTable`] - per-mode edges and parameter actions
//! - [`PipelineBuilder`] - the demodulator pool and the fixed graph
//! - [`ModeSwitchCoordinator`] - teardown/rebuild under the flowgraph lock

pub mod coordinator;
pub mod descriptor;
pub mod mode;
pub mod pool;

pub use coordinator::{ModeSwitchCoordinator, PipelineState};
pub use descriptor::{DemodulatorDescriptor, Endpoint, ParamAction, WireSpec, WiringTable};
pub use mode::{
    AnalogScheme, DemodKind, DigitalScheme, Mode, ModeParams, OutputFamily,
    ANALOG_RSSI_CALIBRATION, DIGITAL_RSSI_CALIBRATION, MODE_SAMPLE_RATE, NARROW_CARRIER_OFFSET,
    WIDE_CARRIER_OFFSET,
};
pub use pool::{port_contract, BuiltPipeline, EngineHandles, PipelineBuilder, PipelineNodeIds};
