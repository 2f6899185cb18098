use super::timing::TimingConfig;

/// A primitive Morse mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    pub fn as_char(self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }
}

/// What a silence of a given length means
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GapKind {
    /// Shorter than an element gap, still inside a mark sequence
    None,
    /// Element gap inside a character
    IntraChar,
    /// Character is complete
    InterChar,
    /// Character is complete and so is the word
    InterWord,
}

impl GapKind {
    /// Whether this gap ends the character being collected
    pub fn terminates_character(self) -> bool {
        matches!(self, GapKind::InterChar | GapKind::InterWord)
    }
}

/// Classify a tone duration as a dot or a dash.
///
/// Durations below the boundary are dots, at or above it dashes.
pub fn classify_symbol(duration_ms: f32, timing: &TimingConfig) -> Symbol {
    if duration_ms < timing.symbol_boundary_ms {
        Symbol::Dot
    } else {
        Symbol::Dash
    }
}

/// Classify a silence duration against the gap boundaries
pub fn classify_gap(gap_ms: f32, timing: &TimingConfig) -> GapKind {
    if gap_ms >= timing.inter_word_gap_ms {
        GapKind::InterWord
    } else if gap_ms >= timing.inter_char_gap_ms {
        GapKind::InterChar
    } else if gap_ms >= timing.intra_char_gap_ms {
        GapKind::IntraChar
    } else {
        GapKind::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cw::timing::derive_timing_config;

    #[test]
    fn test_sixty_wpm_scenario() {
        let timing = derive_timing_config(60.0, 3.0, 3.0);
        assert_eq!(classify_symbol(15.0, &timing), Symbol::Dot);
        assert_eq!(classify_symbol(65.0, &timing), Symbol::Dash);
    }

    #[test]
    fn test_boundary_itself_is_a_dash() {
        let timing = derive_timing_config(60.0, 3.0, 3.0);
        assert_eq!(classify_symbol(timing.symbol_boundary_ms, &timing), Symbol::Dash);
    }

    #[test]
    fn test_symbol_classification_is_monotonic() {
        let timing = derive_timing_config(18.0, 4.5, 5.5);
        let mut seen_dash = false;
        for ms in 0..2000 {
            let symbol = classify_symbol(ms as f32 * 0.5, &timing);
            if seen_dash {
                assert_eq!(symbol, Symbol::Dash, "dot after dash at {} ms", ms as f32 * 0.5);
            }
            seen_dash |= symbol == Symbol::Dash;
        }
        assert!(seen_dash);
    }

    #[test]
    fn test_gap_boundaries() {
        // dot 20, inter-char 60, word 140
        let timing = derive_timing_config(60.0, 3.0, 3.0);
        assert_eq!(classify_gap(5.0, &timing), GapKind::None);
        assert_eq!(classify_gap(20.0, &timing), GapKind::IntraChar);
        assert_eq!(classify_gap(59.9, &timing), GapKind::IntraChar);
        assert_eq!(classify_gap(60.0, &timing), GapKind::InterChar);
        assert_eq!(classify_gap(139.0, &timing), GapKind::InterChar);
        assert_eq!(classify_gap(140.0, &timing), GapKind::InterWord);
        assert_eq!(classify_gap(10_000.0, &timing), GapKind::InterWord);
    }

    #[test]
    fn test_gap_classification_is_monotonic() {
        let timing = derive_timing_config(25.0, 3.0, 3.0);
        let mut previous = GapKind::None;
        for ms in 0..600 {
            let kind = classify_gap(ms as f32, &timing);
            assert!(kind >= previous);
            previous = kind;
        }
        assert!(!GapKind::IntraChar.terminates_character());
        assert!(GapKind::InterChar.terminates_character());
        assert!(GapKind::InterWord.terminates_character());
    }
}
