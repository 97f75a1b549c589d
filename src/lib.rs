//! # demod-engine: SDR demodulator orchestration
//!
//! A live signal-processing pipeline that takes complex samples from a
//! tunable receiver, mixes them to a fixed intermediate channel and routes
//! them through one of fourteen demodulation modes. Monitoring taps (spectrum,
//! constellation, signal strength) can be toggled without touching the
//! active mode.
//!
//! ## Architecture
//!
//! - **Backend**: the `FrontEnd` hardware trait and a simulated receiver
//! - **Pipeline**: a typed flowgraph running on a dedicated thread
//! - **Demod**: the mode registry, the declarative wiring table and the
//!   mode switch coordinator that rewires the graph at runtime
//! - **Engine**: the public control surface
//!
//! ## Example
//!
//! ```ignore
//! use demod_engine::{backend::SimulatedFrontEnd, config::EngineConfig, demod::Mode, DemodEngine};
//!
//! let engine = DemodEngine::new(EngineConfig::load_or_default(), Box::new(SimulatedFrontEnd::new()))?;
//! engine.set_mode(Mode::Bpsk1000)?;
//! engine.enable_gui_const(true);
//! engine.start()?;
//! let frame = engine.get_frame1();
//! engine.stop()?;
//! ```

pub mod analysis;
pub mod backend;
pub mod config;
pub mod demod;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use demod::Mode;
pub use engine::DemodEngine;
pub use error::{DemodError, Result};
pub use types::{EngineStatus, GainRange, GainSetting};
