pub mod alphabet;
pub mod band;
pub mod classify;
pub mod events;
pub mod threshold;
pub mod timing;
pub mod tracker;

use std::time::Instant;

use tracing::{debug, info, trace};

use crate::error::CwResult;

pub use alphabet::{AlphabetMode, NOT_RECOGNIZED};
pub use band::{band_level, BandConfig, SpectrumFrame};
pub use classify::{classify_gap, classify_symbol, GapKind, Symbol};
pub use events::{DecodeEvent, DecodedOnly, EventSink, GapMarker};
pub use threshold::{ThresholdEngine, ThresholdMode, ToneThreshold};
pub use timing::{derive_timing_config, TimingConfig};
pub use tracker::{ToneTracker, TrackerEvent};

/// Runtime configuration surface of the receiver
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub center_freq_hz: f32,
    pub bandwidth_hz: f32,
    /// Words per minute (PARIS, dot = 1200 / wpm ms)
    pub wpm: f32,
    pub dash_dot_ratio: f32,
    pub pause_multiplier: f32,
    pub threshold_mode: ThresholdMode,
    pub static_threshold: f32,
    pub adaptive_multiplier: f32,
    /// Noise floor smoothing factor for the adaptive threshold
    pub floor_smoothing: f32,
    /// Noise gate
    pub min_tone_ms: f32,
    pub alphabet_mode: AlphabetMode,
    /// Emit a single-space marker after every character
    pub surface_char_gaps: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            center_freq_hz: 1600.0,
            bandwidth_hz: 100.0,
            wpm: 60.0,
            dash_dot_ratio: 4.5,
            pause_multiplier: 5.5,
            threshold_mode: ThresholdMode::Static,
            static_threshold: threshold::DEFAULT_STATIC_THRESHOLD,
            adaptive_multiplier: threshold::DEFAULT_ADAPTIVE_MULTIPLIER,
            floor_smoothing: threshold::DEFAULT_FLOOR_SMOOTHING,
            min_tone_ms: 20.0,
            alphabet_mode: AlphabetMode::Letters,
            surface_char_gaps: false,
        }
    }
}

impl EngineConfig {
    fn band(&self) -> CwResult<BandConfig> {
        BandConfig::new(self.center_freq_hz, self.bandwidth_hz)
    }

    fn timing(&self) -> TimingConfig {
        derive_timing_config(self.wpm, self.dash_dot_ratio, self.pause_multiplier)
    }

    fn threshold(&self) -> ThresholdEngine {
        ThresholdEngine::new(
            self.threshold_mode,
            self.static_threshold,
            self.adaptive_multiplier,
            self.floor_smoothing,
        )
    }
}

fn gate_ms(min_tone_ms: f32) -> f32 {
    if min_tone_ms.is_nan() {
        0.0
    } else {
        min_tone_ms.max(0.0)
    }
}

/// Spectrum-to-character pipeline.
///
/// Driven one tick per spectrum frame; owns all decoding state.
pub struct CwEngine {
    config: EngineConfig,
    band: BandConfig,
    timing: TimingConfig,
    /// Timing computed while a tone was on, applied once it ends
    pending_timing: Option<TimingConfig>,
    threshold: ThresholdEngine,
    tracker: ToneTracker,
    running: bool,
}

impl CwEngine {
    pub fn new(config: EngineConfig) -> CwResult<Self> {
        let band = config.band()?;
        let timing = config.timing();
        let threshold = config.threshold();

        Ok(Self {
            config,
            band,
            timing,
            pending_timing: None,
            threshold,
            tracker: ToneTracker::new(),
            running: false,
        })
    }

    /// Begin decoding; no-op if already running
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        info!(
            wpm = self.timing.wpm(),
            dot_ms = self.timing.dot_duration_ms,
            mode = ?self.config.alphabet_mode,
            "cw engine started"
        );
    }

    /// Stop decoding and discard everything in flight; no-op if stopped
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.tracker.reset();
        self.threshold = self.config.threshold();
        if let Some(timing) = self.pending_timing.take() {
            self.timing = timing;
        }
        info!("cw engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Timing snapshot currently used for classification
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn threshold(&self) -> &ThresholdEngine {
        &self.threshold
    }

    pub fn tracker(&self) -> &ToneTracker {
        &self.tracker
    }

    /// Set WPM and update timing
    pub fn set_speed(&mut self, wpm: f32) {
        self.config.wpm = wpm;
        self.recalculate_timing();
    }

    /// Set dash/dot ratio and inter-character pause multiplier
    pub fn set_shape(&mut self, dash_dot_ratio: f32, pause_multiplier: f32) {
        self.config.dash_dot_ratio = dash_dot_ratio;
        self.config.pause_multiplier = pause_multiplier;
        self.recalculate_timing();
    }

    pub fn set_alphabet_mode(&mut self, mode: AlphabetMode) {
        self.config.alphabet_mode = mode;
        debug!(?mode, "alphabet mode changed");
    }

    pub fn set_band(&mut self, center_freq_hz: f32, bandwidth_hz: f32) -> CwResult<()> {
        self.band = BandConfig::new(center_freq_hz, bandwidth_hz)?;
        self.config.center_freq_hz = center_freq_hz;
        self.config.bandwidth_hz = bandwidth_hz;
        Ok(())
    }

    /// Swap the detection strategy; an adaptive floor restarts from scratch
    pub fn set_threshold(&mut self, mode: ThresholdMode, static_threshold: f32, adaptive_multiplier: f32) {
        self.config.threshold_mode = mode;
        self.config.static_threshold = static_threshold;
        self.config.adaptive_multiplier = adaptive_multiplier;
        self.threshold = self.config.threshold();
        debug!(?mode, threshold = self.threshold.threshold(), "threshold changed");
    }

    pub fn set_min_tone_ms(&mut self, min_tone_ms: f32) {
        self.config.min_tone_ms = min_tone_ms;
    }

    pub fn set_surface_char_gaps(&mut self, enabled: bool) {
        self.config.surface_char_gaps = enabled;
    }

    /// Apply a whole new configuration
    pub fn reconfigure(&mut self, config: EngineConfig) -> CwResult<()> {
        self.band = config.band()?;
        let threshold_changed = config.threshold_mode != self.config.threshold_mode
            || config.static_threshold != self.config.static_threshold
            || config.adaptive_multiplier != self.config.adaptive_multiplier
            || config.floor_smoothing != self.config.floor_smoothing;
        self.config = config;
        if threshold_changed {
            self.threshold = self.config.threshold();
        }
        self.recalculate_timing();
        Ok(())
    }

    fn recalculate_timing(&mut self) {
        let timing = self.config.timing();
        debug!(
            dot_ms = timing.dot_duration_ms,
            dash_ms = timing.dash_duration_ms,
            boundary_ms = timing.symbol_boundary_ms,
            char_gap_ms = timing.inter_char_gap_ms,
            word_gap_ms = timing.inter_word_gap_ms,
            "timing recalculated"
        );
        if self.tracker.is_tone_active() {
            self.pending_timing = Some(timing);
        } else {
            self.timing = timing;
            self.pending_timing = None;
        }
    }

    /// Process one spectrum frame captured at `now`.
    ///
    /// Returns whether a tone is on after this tick. Does nothing while
    /// stopped. Fails only if the frame cannot be read against the band.
    pub fn tick<S: EventSink>(&mut self, frame: &SpectrumFrame, now: Instant, sink: &mut S) -> CwResult<bool> {
        if !self.running {
            return Ok(false);
        }
        let level = band_level(frame, &self.band)?;
        Ok(self.process_level(level, now, sink))
    }

    /// Process an already extracted activity level
    pub fn process_level<S: EventSink>(&mut self, level: f32, now: Instant, sink: &mut S) -> bool {
        if !self.running {
            return false;
        }

        let was_active = self.tracker.is_tone_active();
        let present = self.threshold.is_tone_present(level, was_active);
        let events = self
            .tracker
            .update(present, now, &self.timing, gate_ms(self.config.min_tone_ms));

        for event in events {
            self.dispatch(event, sink);
        }

        let active = self.tracker.is_tone_active();
        if !active {
            if let Some(timing) = self.pending_timing.take() {
                self.timing = timing;
            }
        }

        sink.on_raw_toggle(active, level);
        active
    }

    fn dispatch<S: EventSink>(&mut self, event: TrackerEvent, sink: &mut S) {
        match event {
            TrackerEvent::ToneStarted => {}
            TrackerEvent::Mark { symbol, duration_ms } => {
                trace!(mark = %symbol.as_char(), duration_ms, "mark");
            }
            TrackerEvent::NoiseRejected { duration_ms } => {
                trace!(duration_ms, "tone below noise gate ignored");
            }
            TrackerEvent::CharacterComplete { sequence, overflowed } => {
                let character = if overflowed {
                    NOT_RECOGNIZED
                } else {
                    alphabet::decode(&sequence, self.config.alphabet_mode)
                };
                debug!(%character, %sequence, "decoded");
                sink.on_symbol(character, &sequence);
                if self.config.surface_char_gaps {
                    sink.on_gap(GapMarker::Character);
                }
            }
            TrackerEvent::WordComplete => {
                debug!("word gap");
                sink.on_gap(GapMarker::Word);
            }
        }
    }
}
