use std::time::Instant;

use tracing::debug;

use super::alphabet::MAX_SEQUENCE_LEN;
use super::classify::{classify_gap, classify_symbol, GapKind, Symbol};
use super::timing::TimingConfig;

/// Tone on/off bookkeeping
#[derive(Debug, Clone, Copy, Default)]
pub struct ToneState {
    pub active: bool,
    pub start_time: Option<Instant>,
    pub last_tone_end_time: Option<Instant>,
}

/// Marks of the character currently being received
#[derive(Debug, Clone, Default)]
pub struct SymbolBuffer {
    marks: String,
    overflowed: bool,
}

impl SymbolBuffer {
    /// Append a mark; marks past the longest table entry are dropped
    pub fn push(&mut self, symbol: Symbol) -> bool {
        if self.marks.len() >= MAX_SEQUENCE_LEN {
            self.overflowed = true;
            return false;
        }
        self.marks.push(symbol.as_char());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.marks
    }

    /// Hand out the sequence and start a new one
    pub fn take(&mut self) -> (String, bool) {
        let overflowed = std::mem::take(&mut self.overflowed);
        (std::mem::take(&mut self.marks), overflowed)
    }

    pub fn clear(&mut self) {
        self.marks.clear();
        self.overflowed = false;
    }
}

/// What one tick changed
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    ToneStarted,
    /// Tone accepted and appended to the buffer
    Mark { symbol: Symbol, duration_ms: f32 },
    /// Tone shorter than the noise gate
    NoiseRejected { duration_ms: f32 },
    /// A character-terminating gap closed the buffer
    CharacterComplete { sequence: String, overflowed: bool },
    /// Silence reached word length after a character
    WordComplete,
}

fn elapsed_ms(from: Instant, to: Instant) -> f32 {
    to.saturating_duration_since(from).as_secs_f32() * 1000.0
}

/// Silent/Toning state machine measuring tones and gaps
#[derive(Debug, Clone, Default)]
pub struct ToneTracker {
    state: ToneState,
    buffer: SymbolBuffer,
    /// Set when a character is flushed, cleared by the word marker or the next mark
    word_gap_armed: bool,
    last_tick: Option<Instant>,
}

impl ToneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tone_active(&self) -> bool {
        self.state.active
    }

    pub fn state(&self) -> &ToneState {
        &self.state
    }

    pub fn buffer(&self) -> &SymbolBuffer {
        &self.buffer
    }

    /// Advance by one tick.
    ///
    /// `timing` is the snapshot used for every classification in this tick.
    pub fn update(
        &mut self,
        tone_present: bool,
        now: Instant,
        timing: &TimingConfig,
        min_tone_ms: f32,
    ) -> Vec<TrackerEvent> {
        // ticks are expected to be monotonic; a late one counts as the previous
        let now = match self.last_tick {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last_tick = Some(now);

        let mut events = Vec::new();

        if tone_present && !self.state.active {
            self.state.active = true;
            self.state.start_time = Some(now);
            events.push(TrackerEvent::ToneStarted);
        } else if !tone_present && self.state.active {
            self.state.active = false;
            let duration_ms = self
                .state
                .start_time
                .take()
                .map(|start| elapsed_ms(start, now))
                .unwrap_or(0.0);
            self.state.last_tone_end_time = Some(now);

            if duration_ms < min_tone_ms {
                events.push(TrackerEvent::NoiseRejected { duration_ms });
            } else {
                let symbol = classify_symbol(duration_ms, timing);
                if !self.buffer.push(symbol) {
                    debug!(mark = %symbol.as_char(), held = %self.buffer.as_str(), "character too long, mark dropped");
                }
                self.word_gap_armed = false;
                events.push(TrackerEvent::Mark { symbol, duration_ms });
            }
        }

        if !self.state.active {
            self.check_gap(now, timing, &mut events);
        }

        events
    }

    fn check_gap(&mut self, now: Instant, timing: &TimingConfig, events: &mut Vec<TrackerEvent>) {
        if self.buffer.is_empty() && !self.word_gap_armed {
            return;
        }
        let Some(tone_end) = self.state.last_tone_end_time else {
            return;
        };

        let gap = classify_gap(elapsed_ms(tone_end, now), timing);

        if !self.buffer.is_empty() && gap.terminates_character() {
            let (sequence, overflowed) = self.buffer.take();
            events.push(TrackerEvent::CharacterComplete { sequence, overflowed });
            self.word_gap_armed = true;
        }

        if self.word_gap_armed && gap == GapKind::InterWord {
            events.push(TrackerEvent::WordComplete);
            self.word_gap_armed = false;
        }
    }

    /// Drop everything in flight without flushing
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
