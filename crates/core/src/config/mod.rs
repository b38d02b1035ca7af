use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Result, TuneBridgeError};

/// Smallest transform size accepted by Web Audio analysers.
pub const MIN_FFT_SIZE: usize = 32;
/// Largest transform size accepted by Web Audio analysers.
pub const MAX_FFT_SIZE: usize = 32_768;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub media: MediaConfig,
    pub analysis: AnalysisConfig,
    pub resolver: ResolverConfig,
}

impl AppConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.media.validate()?;
        self.analysis.validate()
    }
}

/// How the media element is configured when the adapter mounts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Value for the element's `preload` attribute.
    pub preload: String,
    /// Value for the element's `crossorigin` attribute. The analyser outputs
    /// silence for cross-origin media unless this is set.
    pub cross_origin: Option<String>,
    /// Volume applied before the store has pushed one.
    pub initial_volume: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            preload: "auto".to_string(),
            cross_origin: Some("anonymous".to_string()),
            initial_volume: 1.0,
        }
    }
}

impl MediaConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(TuneBridgeError::InvalidInput(
                "media.initial_volume must be within 0.0..=1.0",
            ));
        }
        Ok(())
    }
}

/// Parameters of the frequency analyser built on first playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub fft_size: usize,
    pub min_decibels: f32,
    pub max_decibels: f32,
    pub smoothing_time_constant: f32,
    /// Sample rate used by the native analyser and the simulated element.
    pub sample_rate: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing_time_constant: 0.8,
            sample_rate: 48_000,
        }
    }
}

impl AnalysisConfig {
    /// Number of frequency bins the analyser exposes.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(TuneBridgeError::InvalidInput(
                "analysis.fft_size must be a power of two between 32 and 32768",
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(TuneBridgeError::InvalidInput(
                "analysis.min_decibels must be lower than analysis.max_decibels",
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(TuneBridgeError::InvalidInput(
                "analysis.smoothing_time_constant must be within 0.0..=1.0",
            ));
        }
        if self.sample_rate == 0 {
            return Err(TuneBridgeError::InvalidInput(
                "analysis.sample_rate must be positive",
            ));
        }
        Ok(())
    }
}

/// Settings for the HTTP song URL resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/song/url".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
