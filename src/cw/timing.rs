/// Dot duration constant for WPM
///
/// Standard Morse timing: 1 word = 50 dit-lengths ("PARIS"),
/// so dit duration in ms = 1200 / WPM
pub const DOT_MS_PER_WPM: f32 = 1200.0;

/// Slowest speed accepted; anything lower (zero, negative, NaN) is clamped here
pub const MIN_WPM: f32 = 1.0;

/// Shortest dot we will ever calibrate for
pub const MIN_DOT_MS: f32 = 5.0;

pub const MIN_DASH_DOT_RATIO: f32 = 1.5;
pub const MAX_DASH_DOT_RATIO: f32 = 10.0;
pub const DEFAULT_DASH_DOT_RATIO: f32 = 3.0;

pub const MIN_PAUSE_MULTIPLIER: f32 = 1.0;
pub const DEFAULT_PAUSE_MULTIPLIER: f32 = 3.0;

/// Inter-word gap in dots (international convention)
pub const WORD_GAP_DOTS: f32 = 7.0;

/// Pause multiplier ceiling, keeps the character gap at or below the word gap
pub const MAX_PAUSE_MULTIPLIER: f32 = WORD_GAP_DOTS;

/// Duration boundaries derived from a speed setting.
///
/// A value of this type is a snapshot: the engine replaces it wholesale when
/// a setting changes and classification always reads one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    pub dot_duration_ms: f32,
    pub dash_duration_ms: f32,
    pub intra_char_gap_ms: f32,
    pub inter_char_gap_ms: f32,
    pub inter_word_gap_ms: f32,
    pub dash_dot_ratio: f32,
    /// Tones shorter than this are dots, the rest dashes
    pub symbol_boundary_ms: f32,
}

impl TimingConfig {
    /// Speed these boundaries correspond to
    pub fn wpm(&self) -> f32 {
        estimate_wpm_from_dit(self.dot_duration_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        derive_timing_config(20.0, DEFAULT_DASH_DOT_RATIO, DEFAULT_PAUSE_MULTIPLIER)
    }
}

/// Calculate dit duration in milliseconds from WPM, clamped to the
/// supported range and rounded to whole milliseconds
pub fn calculate_dit_duration(wpm: f32) -> f32 {
    let wpm = if wpm.is_nan() { MIN_WPM } else { wpm.max(MIN_WPM) };
    (DOT_MS_PER_WPM / wpm).round().max(MIN_DOT_MS)
}

/// Estimate WPM from a dit duration in milliseconds
pub fn estimate_wpm_from_dit(dit_ms: f32) -> f32 {
    DOT_MS_PER_WPM / dit_ms.max(MIN_DOT_MS)
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Derive every duration boundary from speed and the two shape ratios.
///
/// Out-of-range inputs are clamped, never rejected, so the result always
/// satisfies `dot < dash` and `intra <= inter_char <= inter_word`.
pub fn derive_timing_config(wpm: f32, dash_dot_ratio: f32, pause_multiplier: f32) -> TimingConfig {
    let ratio = clamp_or(
        dash_dot_ratio,
        MIN_DASH_DOT_RATIO,
        MAX_DASH_DOT_RATIO,
        DEFAULT_DASH_DOT_RATIO,
    );
    let pause = clamp_or(
        pause_multiplier,
        MIN_PAUSE_MULTIPLIER,
        MAX_PAUSE_MULTIPLIER,
        DEFAULT_PAUSE_MULTIPLIER,
    );

    let dot = calculate_dit_duration(wpm);
    let dash = dot * ratio;

    TimingConfig {
        dot_duration_ms: dot,
        dash_duration_ms: dash,
        intra_char_gap_ms: dot,
        inter_char_gap_ms: (dot * pause).round(),
        inter_word_gap_ms: dot * WORD_GAP_DOTS,
        dash_dot_ratio: ratio,
        // weighted midpoint between a dot scaled up and a dash
        symbol_boundary_ms: (dot * ratio + dash) / (ratio + 1.0),
    }
}
