//! Reference demodulators.
//!
//! These honor each mode's port contract so the engine runs end to end. They
//! are intentionally simple (integrate-and-dump symbol decisions, boxcar
//! decimation); any of them can be replaced by a `NodePlugin` with the same
//! ports.
//!
//! Port contract:
//!
//! | family | inputs | outputs |
//! |---|---|---|
//! | frames | `in` (complex) | `const` (complex) |
//! | raw | `in` (complex) | `const` (complex), `data` (byte) |
//! | audio | `in` (complex) | `audio` (float) |

use crate::demod::{AnalogScheme, DigitalScheme};
use crate::pipeline::buffer::ConfigValue;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::nodes::collectors::CollectorHandle;
use crate::pipeline::port::{ItemType, PortDescriptor};
use crate::types::Complex32;
use std::f32::consts::TAU;

pub static FRAME_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Complex),
    PortDescriptor::output("const", ItemType::Complex),
];

pub static RAW_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Complex),
    PortDescriptor::output("const", ItemType::Complex),
    PortDescriptor::output("data", ItemType::Byte),
];

pub static AUDIO_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Complex),
    PortDescriptor::output("audio", ItemType::Float),
];

/// Goertzel block length in audio samples (100 ms at 8 kHz).
const CTCSS_BLOCK: usize = 800;
/// Share of block energy that must sit in the tone bin.
const CTCSS_THRESHOLD: f32 = 0.1;
/// Smoothing of the IF power estimate used by the squelch.
const SQUELCH_ALPHA: f32 = 0.01;

// ─── Digital ───

/// The two decoded frame channels.
#[derive(Debug, Clone)]
pub struct FrameOutputs {
    pub frame1: CollectorHandle<u8>,
    pub frame2: CollectorHandle<u8>,
}

/// Where a digital demodulator's decisions go.
pub enum DigitalOutput {
    /// Packed into bytes: `frame1` gets each byte, `frame2` its complement
    Frames(FrameOutputs),
    /// One byte per bit on the `data` port
    Raw,
}

pub struct DigitalDemodNode {
    name: &'static str,
    scheme: DigitalScheme,
    sps: u32,
    sample_rate: f64,
    filter_width: f64,
    output: DigitalOutput,
    acc: Complex32,
    phase_acc: f32,
    prev: Complex32,
    count: u32,
    byte: u8,
    bits_in_byte: u8,
}

impl DigitalDemodNode {
    pub fn new(
        name: &'static str,
        scheme: DigitalScheme,
        sps: u32,
        sample_rate: f64,
        filter_width: f64,
        output: DigitalOutput,
    ) -> Self {
        Self {
            name,
            scheme,
            sps: sps.max(1),
            sample_rate,
            filter_width,
            output,
            acc: Complex32::new(0.0, 0.0),
            phase_acc: 0.0,
            prev: Complex32::new(1.0, 0.0),
            count: 0,
            byte: 0,
            bits_in_byte: 0,
        }
    }

    fn reset(&mut self) {
        self.acc = Complex32::new(0.0, 0.0);
        self.phase_acc = 0.0;
        self.prev = Complex32::new(1.0, 0.0);
        self.count = 0;
        self.byte = 0;
        self.bits_in_byte = 0;
    }

    /// Decide one symbol. Returns the constellation point and writes the
    /// decided bits (MSB first) into `bits`, returning how many.
    fn decide(&self, bits: &mut [u8; 2]) -> (Complex32, usize) {
        let n = self.sps as f32;
        match self.scheme {
            DigitalScheme::Bpsk => {
                let point = self.acc / n;
                bits[0] = u8::from(point.re < 0.0);
                (point, 1)
            }
            DigitalScheme::Qpsk => {
                let point = self.acc / n;
                bits[0] = u8::from(point.re < 0.0);
                bits[1] = u8::from(point.im < 0.0);
                (point, 2)
            }
            DigitalScheme::Fsk { levels } => {
                let step = self.phase_acc / n;
                let freq = f64::from(step) * self.sample_rate / std::f64::consts::TAU;
                let half_width = (self.filter_width / 2.0).max(1.0);
                let point = Complex32::new((freq / half_width) as f32, 0.0);
                if levels <= 2 {
                    bits[0] = u8::from(freq > 0.0);
                    (point, 1)
                } else {
                    let t = half_width / 2.0;
                    let symbol: u8 = if freq < -t {
                        0
                    } else if freq < 0.0 {
                        1
                    } else if freq < t {
                        2
                    } else {
                        3
                    };
                    bits[0] = symbol >> 1;
                    bits[1] = symbol & 1;
                    (point, 2)
                }
            }
        }
    }

    fn push_frame_bit(&mut self, bit: u8) {
        self.byte = (self.byte << 1) | (bit & 1);
        self.bits_in_byte += 1;
        if self.bits_in_byte == 8 {
            if let DigitalOutput::Frames(frames) = &self.output {
                frames.frame1.push(self.byte);
                frames.frame2.push(!self.byte);
            }
            self.byte = 0;
            self.bits_in_byte = 0;
        }
    }
}

impl NodePlugin for DigitalDemodNode {
    fn name(&self) -> &str {
        self.name
    }

    fn ports(&self) -> &[PortDescriptor] {
        match self.output {
            DigitalOutput::Frames(_) => FRAME_PORTS,
            DigitalOutput::Raw => RAW_PORTS,
        }
    }

    fn on_activate(&mut self, _ctx: &mut NodeContext) {
        self.reset();
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.complex_input(0)?;
        let node_id = ctx.node_id;
        let (head, tail) = ctx
            .outputs
            .split_first_mut()
            .ok_or_else(|| PipelineError::Node {
                node_id,
                message: "const output is missing".to_string(),
            })?;
        let points = head.complex_mut().ok_or_else(|| PipelineError::Node {
            node_id,
            message: "const output is not complex".to_string(),
        })?;
        let mut data = match self.output {
            DigitalOutput::Raw => Some(
                tail.first_mut()
                    .and_then(|b| b.bytes_mut())
                    .ok_or_else(|| PipelineError::Node {
                        node_id,
                        message: "data output is missing".to_string(),
                    })?,
            ),
            DigitalOutput::Frames(_) => None,
        };

        for &x in input {
            match self.scheme {
                DigitalScheme::Fsk { .. } => {
                    self.phase_acc += (x * self.prev.conj()).arg();
                    self.prev = x;
                }
                _ => self.acc += x,
            }
            self.count += 1;
            if self.count < self.sps {
                continue;
            }

            let mut bits = [0u8; 2];
            let (point, n_bits) = self.decide(&mut bits);
            points.push(point);
            for &bit in &bits[..n_bits] {
                match data.as_mut() {
                    Some(data) => data.push(bit),
                    None => self.push_frame_bit(bit),
                }
            }
            self.acc = Complex32::new(0.0, 0.0);
            self.phase_acc = 0.0;
            self.count = 0;
        }
        Ok(())
    }
}

// ─── Analog ───

/// Goertzel detector for a single sub-audible tone.
#[derive(Debug, Clone)]
pub struct ToneDetector {
    tone_hz: f32,
    coeff: f32,
    s1: f32,
    s2: f32,
    energy: f32,
    n: usize,
    detected: bool,
}

impl ToneDetector {
    pub fn new(tone_hz: f32, sample_rate: f32) -> Self {
        let k = (CTCSS_BLOCK as f32 * tone_hz / sample_rate).round();
        let omega = TAU * k / CTCSS_BLOCK as f32;
        Self {
            tone_hz,
            coeff: 2.0 * omega.cos(),
            s1: 0.0,
            s2: 0.0,
            energy: 0.0,
            n: 0,
            detected: false,
        }
    }

    pub fn tone_hz(&self) -> f32 {
        self.tone_hz
    }

    /// Drop the partial block and the last decision.
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
        self.energy = 0.0;
        self.n = 0;
        self.detected = false;
    }

    /// Result of the last completed block.
    pub fn detected(&self) -> bool {
        self.detected
    }

    pub fn push(&mut self, x: f32) {
        let s0 = x + self.coeff * self.s1 - self.s2;
        self.s2 = self.s1;
        self.s1 = s0;
        self.energy += x * x;
        self.n += 1;

        if self.n == CTCSS_BLOCK {
            let power = self.s1 * self.s1 + self.s2 * self.s2 - self.coeff * self.s1 * self.s2;
            let reference = (CTCSS_BLOCK as f32 * self.energy / 2.0).max(f32::MIN_POSITIVE);
            self.detected = power / reference > CTCSS_THRESHOLD;
            self.s1 = 0.0;
            self.s2 = 0.0;
            self.energy = 0.0;
            self.n = 0;
        }
    }
}

pub struct AnalogDemodNode {
    name: &'static str,
    scheme: AnalogScheme,
    if_decimation: u32,
    audio_decimation: u32,
    sample_rate: f64,
    supports_squelch: bool,
    supports_ctcss: bool,
    /// Squelch threshold in dB, 0 = off
    squelch_db: f32,
    ctcss: Option<ToneDetector>,
    if_acc: Complex32,
    if_count: u32,
    prev_if: Complex32,
    power_avg: f32,
    dc: f32,
    audio_acc: f32,
    audio_count: u32,
}

impl AnalogDemodNode {
    pub fn new(
        name: &'static str,
        scheme: AnalogScheme,
        if_decimation: u32,
        audio_decimation: u32,
        sample_rate: f64,
    ) -> Self {
        Self {
            name,
            scheme,
            if_decimation: if_decimation.max(1),
            audio_decimation: audio_decimation.max(1),
            sample_rate,
            supports_squelch: false,
            supports_ctcss: false,
            squelch_db: 0.0,
            ctcss: None,
            if_acc: Complex32::new(0.0, 0.0),
            if_count: 0,
            prev_if: Complex32::new(1.0, 0.0),
            power_avg: 0.0,
            dc: 0.0,
            audio_acc: 0.0,
            audio_count: 0,
        }
    }

    pub fn with_squelch_support(mut self, squelch: bool, ctcss: bool) -> Self {
        self.supports_squelch = squelch;
        self.supports_ctcss = ctcss;
        self
    }

    pub fn if_rate(&self) -> f64 {
        self.sample_rate / f64::from(self.if_decimation)
    }

    pub fn audio_rate(&self) -> f64 {
        self.if_rate() / f64::from(self.audio_decimation)
    }

    pub fn squelch_db(&self) -> f32 {
        self.squelch_db
    }

    pub fn ctcss_tone(&self) -> Option<f32> {
        self.ctcss.as_ref().map(ToneDetector::tone_hz)
    }

    fn reset(&mut self) {
        self.if_acc = Complex32::new(0.0, 0.0);
        self.if_count = 0;
        self.prev_if = Complex32::new(1.0, 0.0);
        self.power_avg = 0.0;
        self.dc = 0.0;
        self.audio_acc = 0.0;
        self.audio_count = 0;
        if let Some(detector) = self.ctcss.as_mut() {
            detector.reset();
        }
    }

    fn detect(&mut self, s: Complex32) -> f32 {
        match self.scheme {
            AnalogScheme::Am => {
                let m = s.norm();
                self.dc += 0.001 * (m - self.dc);
                m - self.dc
            }
            AnalogScheme::Fm { deviation } => {
                let step = (s * self.prev_if.conj()).arg();
                self.prev_if = s;
                let gain = self.if_rate() / (std::f64::consts::TAU * deviation);
                step * gain as f32
            }
            AnalogScheme::Ssb => s.re,
        }
    }

    fn gate_open(&self) -> bool {
        let squelch_open = self.squelch_db == 0.0
            || 10.0 * self.power_avg.max(f32::MIN_POSITIVE).log10() >= self.squelch_db;
        let tone_open = self.ctcss.as_ref().map_or(true, ToneDetector::detected);
        squelch_open && tone_open
    }
}

impl NodePlugin for AnalogDemodNode {
    fn name(&self) -> &str {
        self.name
    }

    fn ports(&self) -> &[PortDescriptor] {
        AUDIO_PORTS
    }

    fn on_activate(&mut self, _ctx: &mut NodeContext) {
        self.reset();
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.complex_input(0)?;
        let audio = ctx.float_output(0)?;

        for &x in input {
            self.if_acc += x;
            self.if_count += 1;
            if self.if_count < self.if_decimation {
                continue;
            }
            let s = self.if_acc / self.if_decimation as f32;
            self.if_acc = Complex32::new(0.0, 0.0);
            self.if_count = 0;

            self.power_avg += SQUELCH_ALPHA * (s.norm_sqr() - self.power_avg);
            let det = self.detect(s);

            self.audio_acc += det;
            self.audio_count += 1;
            if self.audio_count < self.audio_decimation {
                continue;
            }
            let sample = self.audio_acc / self.audio_decimation as f32;
            self.audio_acc = 0.0;
            self.audio_count = 0;

            if let Some(detector) = self.ctcss.as_mut() {
                detector.push(sample);
            }
            if self.gate_open() {
                audio.push(sample);
            }
        }
        Ok(())
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        match (key, value.as_float()) {
            ("squelch", Some(db)) if self.supports_squelch => {
                self.squelch_db = db as f32;
            }
            ("ctcss", Some(hz)) if self.supports_ctcss => {
                self.ctcss = if hz > 0.0 {
                    Some(ToneDetector::new(hz as f32, self.audio_rate() as f32))
                } else {
                    None
                };
            }
            _ => tracing::debug!("{} ignoring config key '{}'", self.name, key),
        }
    }
}
