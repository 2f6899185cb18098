use std::f32::consts::PI;

use tracing::warn;

use crate::cw::alphabet;
use crate::cw::timing::{calculate_dit_duration, WORD_GAP_DOTS};

/// Sine generator with attack/decay envelope, keyed on and off per sample
pub struct ToneGenerator {
    phase: f32,
    phase_increment: f32,
    sample_rate: f32,
    volume: f32,
    envelope: f32,
    attack_rate: f32,
    decay_rate: f32,
}

impl ToneGenerator {
    pub fn new(frequency: f32, volume: f32, sample_rate: f32) -> Self {
        let phase_increment = 2.0 * PI * frequency / sample_rate;

        // ~5ms rise/fall keeps key clicks out of neighbouring bins
        let attack_rate = 1.0 / (0.005 * sample_rate);
        let decay_rate = 1.0 / (0.005 * sample_rate);

        Self {
            phase: 0.0,
            phase_increment,
            sample_rate,
            volume: volume.clamp(0.0, 1.0),
            envelope: 0.0,
            attack_rate,
            decay_rate,
        }
    }

    /// Generate the next audio sample
    pub fn next_sample(&mut self, key_down: bool) -> f32 {
        if key_down {
            self.envelope = (self.envelope + self.attack_rate).min(1.0);
        } else {
            self.envelope = (self.envelope - self.decay_rate).max(0.0);
        }

        let sample = self.phase.sin() * self.envelope * self.volume;

        self.phase += self.phase_increment;
        if self.phase >= 2.0 * PI {
            self.phase -= 2.0 * PI;
        }

        sample
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

/// One stretch of key-down or key-up time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyElement {
    pub key_down: bool,
    pub duration_ms: f32,
}

/// How text is keyed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keying {
    pub wpm: f32,
    pub dash_dot_ratio: f32,
    /// Silence between characters, in dots
    pub char_gap_dots: f32,
    /// Silence between words, in dots
    pub word_gap_dots: f32,
    /// Silence before the first element
    pub lead_in_ms: f32,
    /// Silence after the last element, long enough for the receiver to flush
    pub tail_ms: f32,
}

impl Default for Keying {
    fn default() -> Self {
        Self {
            wpm: 20.0,
            dash_dot_ratio: 3.0,
            char_gap_dots: 3.0,
            word_gap_dots: WORD_GAP_DOTS,
            lead_in_ms: 200.0,
            tail_ms: 1000.0,
        }
    }
}

impl Keying {
    /// Key/unkey schedule for `text`.
    ///
    /// Elements are one dot apart; character and word gaps come from the
    /// keying (3 and 7 dots by default). Characters without a table entry
    /// are skipped.
    pub fn plan(&self, text: &str) -> Vec<KeyElement> {
        let dot = calculate_dit_duration(self.wpm);
        let dash = dot * self.dash_dot_ratio.max(1.0);

        let mut plan = vec![KeyElement {
            key_down: false,
            duration_ms: self.lead_in_ms,
        }];
        let mut pending_gap: Option<f32> = None;

        for ch in text.chars() {
            if ch.is_whitespace() {
                if pending_gap.is_some() {
                    pending_gap = Some(dot * self.word_gap_dots.max(self.char_gap_dots));
                }
                continue;
            }
            let Some(pattern) = alphabet::encode(ch) else {
                warn!(%ch, "no Morse pattern, skipping");
                continue;
            };

            if let Some(gap) = pending_gap.take() {
                plan.push(KeyElement {
                    key_down: false,
                    duration_ms: gap,
                });
            }
            for (i, mark) in pattern.chars().enumerate() {
                if i > 0 {
                    plan.push(KeyElement {
                        key_down: false,
                        duration_ms: dot,
                    });
                }
                plan.push(KeyElement {
                    key_down: true,
                    duration_ms: if mark == '-' { dash } else { dot },
                });
            }
            pending_gap = Some(dot * self.char_gap_dots.max(1.0));
        }

        plan.push(KeyElement {
            key_down: false,
            duration_ms: self.tail_ms,
        });
        plan
    }
}

/// Render a keying plan to mono samples
pub fn render(plan: &[KeyElement], generator: &mut ToneGenerator) -> Vec<f32> {
    let per_ms = generator.sample_rate() / 1000.0;
    let total: f32 = plan.iter().map(|e| e.duration_ms).sum();
    let mut samples = Vec::with_capacity((total * per_ms) as usize + 1);

    for element in plan {
        let count = (element.duration_ms * per_ms).round() as usize;
        samples.extend((0..count).map(|_| generator.next_sample(element.key_down)));
    }
    samples
}

/// Key `text` as CW audio at `frequency` Hz
pub fn key_text(text: &str, keying: &Keying, frequency: f32, sample_rate: u32) -> Vec<f32> {
    let mut generator = ToneGenerator::new(frequency, 0.5, sample_rate as f32);
    render(&keying.plan(text), &mut generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_rises_and_falls() {
        let mut gen = ToneGenerator::new(1000.0, 1.0, 48000.0);
        let peak = (0..480).map(|_| gen.next_sample(true).abs()).fold(0.0, f32::max);
        assert!(peak > 0.9);
        for _ in 0..480 {
            gen.next_sample(false);
        }
        assert_eq!(gen.next_sample(false), 0.0);
    }

    #[test]
    fn test_plan_spacing() {
        let keying = Keying {
            wpm: 20.0,
            lead_in_ms: 0.0,
            tail_ms: 0.0,
            ..Default::default()
        };
        // "E E" -> lead, dot, word gap, dot, tail
        let plan = keying.plan("E E");
        let durations: Vec<(bool, f32)> = plan.iter().map(|e| (e.key_down, e.duration_ms)).collect();
        assert_eq!(
            durations,
            vec![(false, 0.0), (true, 60.0), (false, 420.0), (true, 60.0), (false, 0.0)]
        );

        // "AN" -> .- then char gap then -.
        let plan = keying.plan("AN");
        let marks: Vec<f32> = plan.iter().filter(|e| e.key_down).map(|e| e.duration_ms).collect();
        assert_eq!(marks, vec![60.0, 180.0, 180.0, 60.0]);
        assert!(plan.contains(&KeyElement {
            key_down: false,
            duration_ms: 180.0
        }));
    }

    #[test]
    fn test_custom_gaps() {
        let keying = Keying {
            wpm: 20.0,
            char_gap_dots: 5.0,
            word_gap_dots: 9.0,
            lead_in_ms: 0.0,
            tail_ms: 0.0,
            ..Default::default()
        };
        let gaps: Vec<f32> = keying
            .plan("EE E")
            .iter()
            .filter(|e| !e.key_down && e.duration_ms > 0.0)
            .map(|e| e.duration_ms)
            .collect();
        assert_eq!(gaps, vec![300.0, 540.0]);
    }

    #[test]
    fn test_unknown_characters_skipped() {
        let keying = Keying::default();
        assert_eq!(keying.plan("E,"), keying.plan("E"));
    }

    #[test]
    fn test_render_length() {
        let keying = Keying {
            wpm: 20.0,
            lead_in_ms: 100.0,
            tail_ms: 100.0,
            ..Default::default()
        };
        let samples = key_text("T", &keying, 800.0, 8000);
        // 100 + 180 + 100 ms at 8 kHz
        assert_eq!(samples.len(), 3040);
    }
}
