//! Configuration module for the demodulator engine
//!
//! This module handles engine configuration including:
//! - Front-end settings applied once at construction (device, antenna, correction)
//! - Pipeline tuning knobs (block size, FFT size, RSSI smoothing, buffer caps)
//! - Logging destinations for the headless runner
//!
//! # Config Location
//!
//! The default config file lives in the platform-appropriate data directory
//! under `dev.hxyulin.demod-engine`:
//! - **Linux**: `~/.local/share/dev.hxyulin.demod-engine/engine.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.demod-engine/engine.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.demod-engine\engine.toml`
//!
//! # Example
//!
//! ```ignore
//! use demod_engine::config::EngineConfig;
//!
//! let mut config = EngineConfig::load_or_default();
//! config.front_end.frequency = 145_500_000;
//! config.save(EngineConfig::default_path().unwrap())?;
//! ```

use crate::demod::Mode;
use crate::error::{DemodError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.demod-engine";

/// Config filename
pub const CONFIG_FILE: &str = "engine.toml";

/// Default desired center frequency in Hz
pub const DEFAULT_DEVICE_FREQUENCY: i64 = 434_000_000;

/// Default device sample rate in samples per second
pub const DEFAULT_SAMPLE_RATE: u32 = 1_000_000;

/// Default analog bandwidth in Hz
pub const DEFAULT_BANDWIDTH: u32 = 2_000_000;

/// Default logical receive gain
pub const DEFAULT_RF_GAIN: f32 = 0.5;

/// Default moving-average window of the power estimator, in samples
pub const DEFAULT_RSSI_WINDOW: usize = 25_000;

/// Default single-pole IIR coefficient of the power estimator
pub const DEFAULT_RSSI_ALPHA: f32 = 0.04;

// ==================== Config Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        DemodError::Configuration("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            DemodError::Configuration(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

// ==================== Front End ====================

/// Hardware front-end settings.
///
/// Antenna and frequency correction are applied once at construction and
/// are not changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontEndConfig {
    /// Driver argument string (e.g. `"uhd"`, `"rtl=0"`)
    pub device_args: String,
    /// Antenna port name
    pub antenna: String,
    /// Desired center frequency in Hz
    pub frequency: i64,
    /// Logical receive gain in `[0, 1]`
    pub rf_gain: f32,
    /// Frequency correction in ppm
    pub freq_corr: i32,
    /// Device sample rate in samples per second
    pub sample_rate: u32,
    /// Analog bandwidth in Hz
    pub bandwidth: u32,
}

impl Default for FrontEndConfig {
    fn default() -> Self {
        Self {
            device_args: "uhd".to_string(),
            antenna: "RX2".to_string(),
            frequency: DEFAULT_DEVICE_FREQUENCY,
            rf_gain: DEFAULT_RF_GAIN,
            freq_corr: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bandwidth: DEFAULT_BANDWIDTH,
        }
    }
}

// ==================== Pipeline ====================

/// Flowgraph tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Samples pulled from the front end per processing tick
    pub block_size: usize,
    /// Pace ticks at the device sample rate (for sources that do not block)
    pub throttle: bool,
    /// Spectrum view FFT size
    pub fft_size: usize,
    /// Power estimator moving-average window in samples
    pub rssi_window: usize,
    /// Power estimator single-pole IIR coefficient
    pub rssi_alpha: f32,
    /// Maximum buffered audio samples before the oldest are dropped
    pub max_audio_samples: usize,
    /// Maximum buffered raw symbol bytes before the oldest are dropped
    pub max_data_bytes: usize,
    /// Maximum buffered bytes per frame channel
    pub max_frame_bytes: usize,
    /// Constellation points kept for the display
    pub constellation_points: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            block_size: 4096,
            throttle: true,
            fft_size: 2048,
            rssi_window: DEFAULT_RSSI_WINDOW,
            rssi_alpha: DEFAULT_RSSI_ALPHA,
            max_audio_samples: 8_000 * 10,
            max_data_bytes: 1 << 20,
            max_frame_bytes: 1 << 16,
            constellation_points: 1024,
        }
    }
}

impl PipelineSettings {
    /// Reject settings the flowgraph cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(DemodError::Configuration("block_size must be > 0".into()));
        }
        if self.fft_size < 16 {
            return Err(DemodError::Configuration("fft_size must be >= 16".into()));
        }
        if self.rssi_window == 0 {
            return Err(DemodError::Configuration("rssi_window must be > 0".into()));
        }
        if !(self.rssi_alpha > 0.0 && self.rssi_alpha <= 1.0) {
            return Err(DemodError::Configuration(format!(
                "rssi_alpha must be in (0, 1], got {}",
                self.rssi_alpha
            )));
        }
        Ok(())
    }
}

// ==================== Logging ====================

/// Logging destinations for the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Directory for daily rolling log files, if any
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,demod_engine=debug".to_string(),
            log_dir: None,
        }
    }
}

// ==================== Engine Config ====================

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Version for future migration support
    pub version: u32,
    /// Mode activated right after construction, if any
    pub initial_mode: Option<Mode>,
    pub front_end: FrontEndConfig,
    pub pipeline: PipelineSettings,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            initial_mode: None,
            front_end: FrontEndConfig::default(),
            pipeline: PipelineSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Path of the config file in the app data directory
    pub fn default_path() -> Option<PathBuf> {
        app_data_dir().map(|p| p.join(CONFIG_FILE))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DemodError::Configuration(format!("Failed to read config {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            DemodError::Serialization(format!("Failed to parse config {:?}: {}", path, e))
        })?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Load the config from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| {
            DemodError::Serialization(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content).map_err(|e| {
            DemodError::Configuration(format!("Failed to write config {:?}: {}", path, e))
        })
    }
}
