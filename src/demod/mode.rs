//! The fourteen demodulation modes and their fixed parameters.

use crate::error::DemodError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Carrier offset for modes that fit in the narrow intermediate channel.
pub const NARROW_CARRIER_OFFSET: i64 = 25_000;
/// Carrier offset for modes whose bandwidth needs the wide channel.
pub const WIDE_CARRIER_OFFSET: i64 = 250_000;

/// RSSI calibration for the analog (audio) modes.
pub const ANALOG_RSSI_CALIBRATION: f32 = -55.0;
/// RSSI calibration for the narrow digital modes.
pub const DIGITAL_RSSI_CALIBRATION: f32 = -110.0;

/// Operating sample rate shared by every mode.
pub const MODE_SAMPLE_RATE: f64 = 1_000_000.0;

/// A selectable demodulation configuration.
///
/// Numeric ids follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "BPSK2000")]
    Bpsk2000,
    #[serde(rename = "QPSK20000")]
    Qpsk20000,
    #[serde(rename = "QPSKVideo")]
    QpskVideo,
    #[serde(rename = "4FSK20000")]
    FourFsk20000,
    #[serde(rename = "4FSK2000")]
    FourFsk2000,
    #[serde(rename = "QPSK2000")]
    Qpsk2000,
    #[serde(rename = "NBFM2500")]
    Nbfm2500,
    #[serde(rename = "NBFM5000")]
    Nbfm5000,
    #[serde(rename = "WBFM")]
    Wbfm,
    #[serde(rename = "SSB2500")]
    Ssb2500,
    #[serde(rename = "AM5000")]
    Am5000,
    #[serde(rename = "2FSK2000")]
    TwoFsk2000,
    #[serde(rename = "BPSK1000")]
    Bpsk1000,
    #[serde(rename = "QPSK250000")]
    Qpsk250000,
}

/// What a mode's demodulator delivers to the collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputFamily {
    /// Decoded byte frames on two channels, plus constellation points
    Frames,
    /// Raw symbol bits, plus constellation points
    Raw,
    /// Demodulated audio
    Audio,
}

/// Symbol decision rule of a digital demodulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalScheme {
    Bpsk,
    Qpsk,
    /// Frequency shift keying with 2 or 4 tones
    Fsk { levels: u8 },
}

/// Detector of an analog demodulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalogScheme {
    Am,
    Fm { deviation: f64 },
    Ssb,
}

/// Which reference demodulator a mode uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DemodKind {
    Digital { scheme: DigitalScheme, sps: u32 },
    Analog { scheme: AnalogScheme, if_decimation: u32, audio_decimation: u32 },
}

/// Fixed per-mode parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeParams {
    pub sample_rate: f64,
    /// Intermediate channel offset the mixer shifts down to baseband
    pub carrier_offset: i64,
    /// Output filter width in Hz
    pub filter_width: f64,
    /// Additive dB constant of the power chain
    pub rssi_calibration: f32,
    pub family: OutputFamily,
    pub kind: DemodKind,
    pub supports_squelch: bool,
    pub supports_ctcss: bool,
}

impl ModeParams {
    /// Samples per symbol, for digital modes.
    pub fn sps(&self) -> Option<u32> {
        match self.kind {
            DemodKind::Digital { sps, .. } => Some(sps),
            DemodKind::Analog { .. } => None,
        }
    }
}

fn digital(
    scheme: DigitalScheme,
    sps: u32,
    filter_width: f64,
    carrier_offset: i64,
    family: OutputFamily,
) -> ModeParams {
    ModeParams {
        sample_rate: MODE_SAMPLE_RATE,
        carrier_offset,
        filter_width,
        rssi_calibration: DIGITAL_RSSI_CALIBRATION,
        family,
        kind: DemodKind::Digital { scheme, sps },
        supports_squelch: false,
        supports_ctcss: false,
    }
}

fn analog(
    scheme: AnalogScheme,
    filter_width: f64,
    carrier_offset: i64,
    supports_ctcss: bool,
) -> ModeParams {
    // 1 MS/s down to 8 kHz audio
    let (if_decimation, audio_decimation) = if carrier_offset == WIDE_CARRIER_OFFSET {
        (5, 25)
    } else {
        (25, 5)
    };
    ModeParams {
        sample_rate: MODE_SAMPLE_RATE,
        carrier_offset,
        filter_width,
        rssi_calibration: ANALOG_RSSI_CALIBRATION,
        family: OutputFamily::Audio,
        kind: DemodKind::Analog {
            scheme,
            if_decimation,
            audio_decimation,
        },
        supports_squelch: true,
        supports_ctcss,
    }
}

impl Mode {
    pub const COUNT: usize = 14;

    pub const ALL: [Mode; Mode::COUNT] = [
        Mode::Bpsk2000,
        Mode::Qpsk20000,
        Mode::QpskVideo,
        Mode::FourFsk20000,
        Mode::FourFsk2000,
        Mode::Qpsk2000,
        Mode::Nbfm2500,
        Mode::Nbfm5000,
        Mode::Wbfm,
        Mode::Ssb2500,
        Mode::Am5000,
        Mode::TwoFsk2000,
        Mode::Bpsk1000,
        Mode::Qpsk250000,
    ];

    /// Numeric id used by the control surface.
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Index into per-mode arenas.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Bpsk2000 => "BPSK2000",
            Mode::Qpsk20000 => "QPSK20000",
            Mode::QpskVideo => "QPSKVideo",
            Mode::FourFsk20000 => "4FSK20000",
            Mode::FourFsk2000 => "4FSK2000",
            Mode::Qpsk2000 => "QPSK2000",
            Mode::Nbfm2500 => "NBFM2500",
            Mode::Nbfm5000 => "NBFM5000",
            Mode::Wbfm => "WBFM",
            Mode::Ssb2500 => "SSB2500",
            Mode::Am5000 => "AM5000",
            Mode::TwoFsk2000 => "2FSK2000",
            Mode::Bpsk1000 => "BPSK1000",
            Mode::Qpsk250000 => "QPSK250000",
        }
    }

    pub fn params(self) -> ModeParams {
        use DigitalScheme::*;
        use OutputFamily::*;
        match self {
            Mode::Bpsk2000 => digital(Bpsk, 125, 2500.0, NARROW_CARRIER_OFFSET, Frames),
            Mode::Qpsk20000 => digital(Qpsk, 50, 4000.0, NARROW_CARRIER_OFFSET, Raw),
            Mode::QpskVideo => digital(Qpsk, 2, 65000.0, WIDE_CARRIER_OFFSET, Raw),
            Mode::FourFsk20000 => {
                digital(Fsk { levels: 4 }, 50, 10000.0, NARROW_CARRIER_OFFSET, Raw)
            }
            Mode::FourFsk2000 => digital(Fsk { levels: 4 }, 250, 2000.0, NARROW_CARRIER_OFFSET, Raw),
            Mode::Qpsk2000 => digital(Qpsk, 250, 800.0, NARROW_CARRIER_OFFSET, Raw),
            Mode::Nbfm2500 => analog(
                AnalogScheme::Fm { deviation: 2500.0 },
                2500.0,
                NARROW_CARRIER_OFFSET,
                true,
            ),
            Mode::Nbfm5000 => analog(
                AnalogScheme::Fm { deviation: 5000.0 },
                4000.0,
                NARROW_CARRIER_OFFSET,
                true,
            ),
            Mode::Wbfm => analog(
                AnalogScheme::Fm { deviation: 75000.0 },
                75000.0,
                WIDE_CARRIER_OFFSET,
                false,
            ),
            Mode::Ssb2500 => analog(AnalogScheme::Ssb, 2500.0, NARROW_CARRIER_OFFSET, false),
            Mode::Am5000 => analog(AnalogScheme::Am, 4000.0, NARROW_CARRIER_OFFSET, false),
            Mode::TwoFsk2000 => digital(Fsk { levels: 2 }, 125, 4000.0, NARROW_CARRIER_OFFSET, Frames),
            Mode::Bpsk1000 => digital(Bpsk, 250, 1300.0, NARROW_CARRIER_OFFSET, Frames),
            Mode::Qpsk250000 => digital(Qpsk, 2, 65000.0, WIDE_CARRIER_OFFSET, Raw),
        }
    }

    pub fn family(self) -> OutputFamily {
        self.params().family
    }
}

impl TryFrom<u32> for Mode {
    type Error = DemodError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Mode::ALL
            .get(id as usize)
            .copied()
            .ok_or(DemodError::UnknownMode(id))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = DemodError;

    /// Parses a mode name (case-insensitive) or a numeric id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u32>() {
            return Mode::try_from(id);
        }
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DemodError::Configuration(format!("unknown mode name '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_table_order() {
        for (i, mode) in Mode::ALL.iter().enumerate() {
            assert_eq!(mode.id() as usize, i);
            assert_eq!(Mode::try_from(i as u32).unwrap(), *mode);
        }
        assert!(matches!(Mode::try_from(14), Err(DemodError::UnknownMode(14))));
    }

    #[test]
    fn test_wide_offset_modes() {
        let wide: Vec<Mode> = Mode::ALL
            .iter()
            .copied()
            .filter(|m| m.params().carrier_offset == WIDE_CARRIER_OFFSET)
            .collect();
        assert_eq!(wide, vec![Mode::QpskVideo, Mode::Wbfm, Mode::Qpsk250000]);
    }

    #[test]
    fn test_calibration_by_family() {
        for mode in Mode::ALL {
            let p = mode.params();
            let expected = if p.family == OutputFamily::Audio { -55.0 } else { -110.0 };
            assert_eq!(p.rssi_calibration, expected, "{}", mode);
            assert_eq!(p.sample_rate, 1_000_000.0);
        }
    }

    #[test]
    fn test_squelch_and_ctcss_support() {
        let ctcss: Vec<Mode> = Mode::ALL
            .iter()
            .copied()
            .filter(|m| m.params().supports_ctcss)
            .collect();
        assert_eq!(ctcss, vec![Mode::Nbfm2500, Mode::Nbfm5000]);
        assert!(Mode::Am5000.params().supports_squelch);
        assert!(!Mode::Bpsk1000.params().supports_squelch);
    }

    #[test]
    fn test_analog_modes_reach_8khz_audio() {
        for mode in Mode::ALL {
            if let DemodKind::Analog {
                if_decimation,
                audio_decimation,
                ..
            } = mode.params().kind
            {
                let audio_rate = MODE_SAMPLE_RATE / (if_decimation * audio_decimation) as f64;
                assert_eq!(audio_rate, 8000.0, "{}", mode);
            }
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("wbfm".parse::<Mode>().unwrap(), Mode::Wbfm);
        assert_eq!("4FSK2000".parse::<Mode>().unwrap(), Mode::FourFsk2000);
        assert_eq!("12".parse::<Mode>().unwrap(), Mode::Bpsk1000);
        assert!("FM".parse::<Mode>().is_err());
        assert_eq!(Mode::QpskVideo.to_string(), "QPSKVideo");
    }

    #[test]
    fn test_serde_uses_mode_names() {
        let json = serde_json::to_string(&Mode::TwoFsk2000).unwrap();
        assert_eq!(json, "\"2FSK2000\"");
        let mode: Mode = serde_json::from_str("\"NBFM5000\"").unwrap();
        assert_eq!(mode, Mode::Nbfm5000);
    }
}
