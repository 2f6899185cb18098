use serde::{Deserialize, Serialize};

/// Returned for any sequence with no table entry
pub const NOT_RECOGNIZED: char = '?';

/// Longest mark sequence the table is defined for
pub const MAX_SEQUENCE_LEN: usize = 6;

/// Which subset of the table is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlphabetMode {
    #[default]
    Letters,
    Digits,
}

impl AlphabetMode {
    fn table(self) -> &'static [(char, &'static str)] {
        match self {
            AlphabetMode::Letters => LETTERS,
            AlphabetMode::Digits => DIGITS,
        }
    }
}

/// International Morse, letters
const LETTERS: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
];

/// International Morse, digits
const DIGITS: &[(char, &str)] = &[
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('0', "-----"),
];

/// Look up a Morse pattern in the given mode's table.
///
/// Never fails: unknown, empty or over-long sequences give [`NOT_RECOGNIZED`].
pub fn decode(sequence: &str, mode: AlphabetMode) -> char {
    if sequence.is_empty() || sequence.len() > MAX_SEQUENCE_LEN {
        return NOT_RECOGNIZED;
    }
    mode.table()
        .iter()
        .find(|(_, p)| *p == sequence)
        .map(|(c, _)| *c)
        .unwrap_or(NOT_RECOGNIZED)
}

/// Canonical pattern for a character, searching both subsets
pub fn encode(ch: char) -> Option<&'static str> {
    let ch = ch.to_ascii_uppercase();
    LETTERS
        .iter()
        .chain(DIGITS.iter())
        .find(|(c, _)| *c == ch)
        .map(|(_, p)| *p)
}

/// Mode whose table contains `ch`
pub fn mode_of(ch: char) -> Option<AlphabetMode> {
    let ch = ch.to_ascii_uppercase();
    if LETTERS.iter().any(|(c, _)| *c == ch) {
        Some(AlphabetMode::Letters)
    } else if DIGITS.iter().any(|(c, _)| *c == ch) {
        Some(AlphabetMode::Digits)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_common_letters() {
        assert_eq!(decode(".", AlphabetMode::Letters), 'E');
        assert_eq!(decode("-", AlphabetMode::Letters), 'T');
        assert_eq!(decode(".-", AlphabetMode::Letters), 'A');
        assert_eq!(decode("...", AlphabetMode::Letters), 'S');
        assert_eq!(decode("---", AlphabetMode::Letters), 'O');
    }

    #[test]
    fn test_unknown_sequence_is_not_recognized() {
        assert_eq!(decode("--..--", AlphabetMode::Letters), NOT_RECOGNIZED);
        assert_eq!(decode("", AlphabetMode::Letters), NOT_RECOGNIZED);
        assert_eq!(decode(".......", AlphabetMode::Digits), NOT_RECOGNIZED);
        assert_eq!(decode(".-.-x", AlphabetMode::Letters), NOT_RECOGNIZED);
    }

    #[test]
    fn test_mode_selects_subset() {
        assert_eq!(decode(".----", AlphabetMode::Digits), '1');
        assert_eq!(decode(".----", AlphabetMode::Letters), NOT_RECOGNIZED);
        assert_eq!(decode(".-", AlphabetMode::Digits), NOT_RECOGNIZED);
    }

    #[test]
    fn test_round_trip_every_entry() {
        for (mode, table) in [(AlphabetMode::Letters, LETTERS), (AlphabetMode::Digits, DIGITS)] {
            for (ch, _) in table {
                let pattern = encode(*ch).unwrap();
                assert_eq!(decode(pattern, mode), *ch);
                assert_eq!(mode_of(*ch), Some(mode));
            }
        }
        assert_eq!(LETTERS.len(), 26);
        assert_eq!(DIGITS.len(), 10);
    }

    #[test]
    fn test_no_duplicate_patterns() {
        let all: Vec<&str> = LETTERS.iter().chain(DIGITS.iter()).map(|(_, p)| *p).collect();
        for (i, p) in all.iter().enumerate() {
            assert!(!all[i + 1..].contains(p), "duplicate pattern {}", p);
        }
    }

    #[test]
    fn test_encode_is_case_insensitive() {
        assert_eq!(encode('s'), Some("..."));
        assert_eq!(encode(','), None);
        assert_eq!(mode_of(' '), None);
    }
}
