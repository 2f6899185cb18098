use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audio::{AnalyserConfig, DEFAULT_HOP_SIZE};
use crate::cw::threshold::{DEFAULT_ADAPTIVE_MULTIPLIER, DEFAULT_FLOOR_SMOOTHING, DEFAULT_STATIC_THRESHOLD};
use crate::cw::{AlphabetMode, EngineConfig, ThresholdMode};
use crate::error::{CwError, CwResult};

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Band
    pub center_freq_hz: f32,
    pub bandwidth_hz: f32,

    // Timing
    pub wpm: f32,
    pub dash_dot_ratio: f32,
    pub pause_multiplier: f32,
    pub min_tone_ms: f32,

    // Detection
    pub threshold_mode: ThresholdMode,
    pub static_threshold: f32,
    pub adaptive_multiplier: f32,
    pub floor_smoothing: f32,

    // Output
    pub alphabet_mode: AlphabetMode,
    pub surface_char_gaps: bool,

    // Capture
    pub input_device: Option<String>,
    pub fft_size: usize,
    pub analyser_smoothing: f32,
    pub highpass_hz: Option<f32>,
    pub min_db: f32,
    pub max_db: f32,
    pub hop_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        let analyser = AnalyserConfig::default();
        Self {
            center_freq_hz: engine.center_freq_hz,
            bandwidth_hz: engine.bandwidth_hz,
            wpm: engine.wpm,
            dash_dot_ratio: engine.dash_dot_ratio,
            pause_multiplier: engine.pause_multiplier,
            min_tone_ms: engine.min_tone_ms,
            threshold_mode: ThresholdMode::Static,
            static_threshold: DEFAULT_STATIC_THRESHOLD,
            adaptive_multiplier: DEFAULT_ADAPTIVE_MULTIPLIER,
            floor_smoothing: DEFAULT_FLOOR_SMOOTHING,
            alphabet_mode: AlphabetMode::Letters,
            surface_char_gaps: false,
            input_device: None,
            fft_size: analyser.fft_size,
            analyser_smoothing: analyser.smoothing,
            highpass_hz: analyser.highpass_hz,
            min_db: analyser.min_db,
            max_db: analyser.max_db,
            hop_size: DEFAULT_HOP_SIZE,
        }
    }
}

impl Settings {
    /// Get the path to the settings file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("cw-listen");
            path.push("settings.json");
            path
        })
    }

    /// Load settings from disk, or return defaults if missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("could not determine config path, using defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> CwResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CwError::Settings(format!("failed to read {}: {}", path.display(), e)))?;
        let settings = serde_json::from_str(&contents)
            .map_err(|e| CwError::Settings(format!("failed to parse {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Save settings to the platform config directory
    pub fn save(&self) -> CwResult<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| CwError::Settings("could not determine config directory".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to an explicit file, creating its directory
    pub fn save_to(&self, path: &Path) -> CwResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CwError::Settings(format!("failed to create config dir: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CwError::Settings(format!("failed to serialize settings: {}", e)))?;

        // Write with explicit sync to ensure data reaches disk
        let mut file = fs::File::create(path)
            .map_err(|e| CwError::Settings(format!("failed to create config file: {}", e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| CwError::Settings(format!("failed to write config file: {}", e)))?;
        file.sync_all()
            .map_err(|e| CwError::Settings(format!("failed to sync config file: {}", e)))?;

        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Runtime configuration for the decoding engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            center_freq_hz: self.center_freq_hz,
            bandwidth_hz: self.bandwidth_hz,
            wpm: self.wpm,
            dash_dot_ratio: self.dash_dot_ratio,
            pause_multiplier: self.pause_multiplier,
            threshold_mode: self.threshold_mode,
            static_threshold: self.static_threshold,
            adaptive_multiplier: self.adaptive_multiplier,
            floor_smoothing: self.floor_smoothing,
            min_tone_ms: self.min_tone_ms,
            alphabet_mode: self.alphabet_mode,
            surface_char_gaps: self.surface_char_gaps,
        }
    }

    /// Spectrum analyser parameters for capture and offline decoding
    pub fn analyser_config(&self) -> AnalyserConfig {
        AnalyserConfig {
            fft_size: self.fft_size,
            smoothing: self.analyser_smoothing,
            min_db: self.min_db,
            max_db: self.max_db,
            highpass_hz: self.highpass_hz,
        }
    }
}
