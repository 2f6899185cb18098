use crossbeam_channel::Sender;

/// Boundary marker emitted between decoded characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapMarker {
    /// Inter-character boundary, only surfaced when enabled
    Character,
    /// Inter-word boundary
    Word,
}

impl GapMarker {
    /// Wire form: a single space for a character gap, two for a word gap
    pub fn as_str(self) -> &'static str {
        match self {
            GapMarker::Character => " ",
            GapMarker::Word => "  ",
        }
    }
}

/// Unit of output from the receiver
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    Symbol { character: char, sequence: String },
    Gap(GapMarker),
    /// Per-tick telemetry; carries no decoding state
    RawToggle { tone_active: bool, level: f32 },
}

/// Observer the engine reports to.
///
/// Called synchronously from the tick, so implementations must not block.
pub trait EventSink {
    fn on_symbol(&mut self, character: char, sequence: &str);

    fn on_gap(&mut self, marker: GapMarker);

    fn on_raw_toggle(&mut self, _tone_active: bool, _level: f32) {}
}

/// Collects everything, telemetry included
impl EventSink for Vec<DecodeEvent> {
    fn on_symbol(&mut self, character: char, sequence: &str) {
        self.push(DecodeEvent::Symbol {
            character,
            sequence: sequence.to_string(),
        });
    }

    fn on_gap(&mut self, marker: GapMarker) {
        self.push(DecodeEvent::Gap(marker));
    }

    fn on_raw_toggle(&mut self, tone_active: bool, level: f32) {
        self.push(DecodeEvent::RawToggle { tone_active, level });
    }
}

/// Forwards events to another thread.
///
/// Use an unbounded channel: characters and gaps are sent with `send`,
/// telemetry with `try_send` and dropped when a bounded channel is full.
impl EventSink for Sender<DecodeEvent> {
    fn on_symbol(&mut self, character: char, sequence: &str) {
        let _ = self.send(DecodeEvent::Symbol {
            character,
            sequence: sequence.to_string(),
        });
    }

    fn on_gap(&mut self, marker: GapMarker) {
        let _ = self.send(DecodeEvent::Gap(marker));
    }

    fn on_raw_toggle(&mut self, tone_active: bool, level: f32) {
        let _ = self.try_send(DecodeEvent::RawToggle { tone_active, level });
    }
}

/// Sink that drops telemetry and keeps only decoded output
#[derive(Debug, Default, Clone)]
pub struct DecodedOnly(pub Vec<DecodeEvent>);

impl EventSink for DecodedOnly {
    fn on_symbol(&mut self, character: char, sequence: &str) {
        self.0.on_symbol(character, sequence);
    }

    fn on_gap(&mut self, marker: GapMarker) {
        self.0.on_gap(marker);
    }
}
