//! Built-in flowgraph node implementations.

pub mod collectors;
pub mod demodulators;
pub mod displays;
pub mod mixer;
pub mod power;
pub mod source;
pub mod valve;

pub use collectors::{AudioSinkNode, CollectorHandle, VectorSinkNode};
pub use demodulators::{
    AnalogDemodNode, DigitalDemodNode, DigitalOutput, FrameOutputs, ToneDetector, AUDIO_PORTS,
    FRAME_PORTS, RAW_PORTS,
};
pub use displays::{ConstellationDisplayNode, Latest, NumberDisplayNode, SpectrumDisplayNode};
pub use mixer::{LocalOscillator, MixerNode};
pub use power::{Log10Node, MagSquaredNode, MovingAverageNode, ScaleOffsetNode, SinglePoleIirNode};
pub use source::FrontEndSourceNode;
pub use valve::{ValveHandle, ValveNode};
