//! Receiver front-end layer
//!
//! - [`FrontEnd`] - trait every hardware driver implements
//! - [`SharedFrontEnd`] - the driver shared between the source node and the control surface
//! - [`SimulatedFrontEnd`] - synthetic receiver for tests and demos
//!
//! Gain normalization and one-time initialization live next to the trait so
//! every driver gets the same logical-gain mapping and automatic-gain fallback.

pub mod front_end;
pub mod simulated;

pub use front_end::{apply_logical_gain, initialize, share, FrontEnd, SharedFrontEnd};
pub use simulated::{CarrierModulation, SimulatedCarrier, SimulatedFrontEnd, SimulatedSettings};

#[cfg(test)]
pub use front_end::MockFrontEnd;
