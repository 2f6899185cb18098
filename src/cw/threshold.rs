use serde::{Deserialize, Serialize};

pub const DEFAULT_STATIC_THRESHOLD: f32 = 15.0;
pub const DEFAULT_ADAPTIVE_MULTIPLIER: f32 = 2.0;
pub const DEFAULT_FLOOR_SMOOTHING: f32 = 0.95;

const MAX_LEVEL: f32 = 255.0;
const MIN_FLOOR_SMOOTHING: f32 = 0.5;
const MAX_FLOOR_SMOOTHING: f32 = 0.999;

/// Lowest floor the threshold is computed from; digital silence reads 0
pub const MIN_NOISE_FLOOR: f32 = 1.0;

/// Ticks after start during which the floor follows the level and nothing
/// counts as a tone (~170 ms at a 256-sample hop and 48 kHz)
pub const WARMUP_TICKS: u32 = 32;

/// Which detector the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    #[default]
    Static,
    Adaptive,
}

/// Decides from an activity level whether a tone is present.
///
/// `tone_active` is the tone state before this sample; detectors that learn
/// from the input must only learn while it is false.
pub trait ToneThreshold {
    fn is_tone_present(&mut self, level: f32, tone_active: bool) -> bool;

    /// Level a sample currently has to exceed
    fn threshold(&self) -> f32;
}

/// Fixed, operator-tuned threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticThreshold {
    threshold: f32,
}

impl StaticThreshold {
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_nan() {
            DEFAULT_STATIC_THRESHOLD
        } else {
            threshold.clamp(0.0, MAX_LEVEL)
        };
        Self { threshold }
    }
}

impl ToneThreshold for StaticThreshold {
    fn is_tone_present(&mut self, level: f32, _tone_active: bool) -> bool {
        level > self.threshold
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Threshold relative to a smoothed noise floor.
///
/// A fresh analyser ramps up from a zero-filled window, so the first levels
/// undershoot the real noise. For the first [`WARMUP_TICKS`] the floor just
/// tracks the level; detection starts once it has settled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveThreshold {
    noise_floor: f32,
    multiplier: f32,
    smoothing: f32,
    warmup_left: u32,
}

impl AdaptiveThreshold {
    pub fn new(multiplier: f32, smoothing: f32) -> Self {
        let multiplier = if multiplier.is_nan() {
            DEFAULT_ADAPTIVE_MULTIPLIER
        } else {
            multiplier.max(1.0)
        };
        let smoothing = if smoothing.is_nan() {
            DEFAULT_FLOOR_SMOOTHING
        } else {
            smoothing.clamp(MIN_FLOOR_SMOOTHING, MAX_FLOOR_SMOOTHING)
        };
        Self {
            noise_floor: 0.0,
            multiplier,
            smoothing,
            warmup_left: WARMUP_TICKS,
        }
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn is_warming_up(&self) -> bool {
        self.warmup_left > 0
    }

    fn learn(&mut self, level: f32) {
        self.noise_floor = self.noise_floor * self.smoothing + level * (1.0 - self.smoothing);
    }
}

impl ToneThreshold for AdaptiveThreshold {
    fn is_tone_present(&mut self, level: f32, tone_active: bool) -> bool {
        if self.warmup_left > 0 {
            self.warmup_left -= 1;
            self.noise_floor = level;
            return false;
        }

        if tone_active {
            // floor is frozen while a tone is on
            return level > self.threshold();
        }

        let present = level > self.threshold();
        if !present {
            self.learn(level);
        }
        present
    }

    fn threshold(&self) -> f32 {
        self.noise_floor.max(MIN_NOISE_FLOOR) * self.multiplier
    }
}

/// Strategy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdEngine {
    Static(StaticThreshold),
    Adaptive(AdaptiveThreshold),
}

impl ThresholdEngine {
    pub fn new(mode: ThresholdMode, static_threshold: f32, adaptive_multiplier: f32, smoothing: f32) -> Self {
        match mode {
            ThresholdMode::Static => ThresholdEngine::Static(StaticThreshold::new(static_threshold)),
            ThresholdMode::Adaptive => {
                ThresholdEngine::Adaptive(AdaptiveThreshold::new(adaptive_multiplier, smoothing))
            }
        }
    }

    pub fn mode(&self) -> ThresholdMode {
        match self {
            ThresholdEngine::Static(_) => ThresholdMode::Static,
            ThresholdEngine::Adaptive(_) => ThresholdMode::Adaptive,
        }
    }

    /// Current noise floor estimate, if the adaptive strategy is running
    pub fn noise_floor(&self) -> Option<f32> {
        match self {
            ThresholdEngine::Static(_) => None,
            ThresholdEngine::Adaptive(a) => Some(a.noise_floor()),
        }
    }
}

impl ToneThreshold for ThresholdEngine {
    fn is_tone_present(&mut self, level: f32, tone_active: bool) -> bool {
        match self {
            ThresholdEngine::Static(s) => s.is_tone_present(level, tone_active),
            ThresholdEngine::Adaptive(a) => a.is_tone_present(level, tone_active),
        }
    }

    fn threshold(&self) -> f32 {
        match self {
            ThresholdEngine::Static(s) => s.threshold(),
            ThresholdEngine::Adaptive(a) => a.threshold(),
        }
    }
}
