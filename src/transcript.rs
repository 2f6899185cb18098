//! Running text built from decoded events.
//!
//! Reproduces the receiving log of a group-copy station: the plain text with
//! word separators, the same text split into five-character groups, and the
//! most recent group.

use crate::cw::{DecodeEvent, GapMarker, NOT_RECOGNIZED};

/// Characters per radiogram group
pub const GROUP_SIZE: usize = 5;

const WORD_SEPARATOR: &str = " / ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Char(char),
    Gap(GapMarker),
}

/// Accumulated decoded output
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event; telemetry is ignored
    pub fn push(&mut self, event: &DecodeEvent) {
        match event {
            DecodeEvent::Symbol { character, .. } => self.entries.push(Entry::Char(*character)),
            DecodeEvent::Gap(marker) => self.entries.push(Entry::Gap(*marker)),
            DecodeEvent::RawToggle { .. } => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Decoded characters, unrecognised ones included
    pub fn characters(&self) -> String {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Char(c) => Some(*c),
                Entry::Gap(_) => None,
            })
            .collect()
    }

    /// Text with `" "` for character gaps and `" / "` for word gaps.
    ///
    /// Unrecognised characters are left out.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            match entry {
                Entry::Char(c) if *c == NOT_RECOGNIZED => {}
                Entry::Char(c) => text.push(*c),
                Entry::Gap(GapMarker::Character) => {
                    if !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
                Entry::Gap(GapMarker::Word) => {
                    if text.ends_with(WORD_SEPARATOR) {
                        continue;
                    }
                    let trimmed = text.trim_end_matches(' ').len();
                    text.truncate(trimmed);
                    if !text.is_empty() {
                        text.push_str(WORD_SEPARATOR);
                    }
                }
            }
        }
        text
    }

    /// Full text with a space after every five characters of a run
    pub fn grouped_text(&self) -> String {
        group_text(&self.full_text())
    }

    /// Last five recognised characters, padded with `_`
    pub fn last_group(&self) -> String {
        let recognised: Vec<char> = self
            .entries
            .iter()
            .filter_map(|e| match e {
                Entry::Char(c) if *c != NOT_RECOGNIZED => Some(*c),
                _ => None,
            })
            .collect();
        let start = recognised.len().saturating_sub(GROUP_SIZE);
        let mut group: String = recognised[start..].iter().collect();
        while group.chars().count() < GROUP_SIZE {
            group.push('_');
        }
        group
    }
}

/// Insert a space after every [`GROUP_SIZE`] characters unless a separator
/// already follows
pub fn group_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len() + text.len() / GROUP_SIZE);
    let mut count = 0;

    for (i, &c) in chars.iter().enumerate() {
        result.push(c);
        if c == ' ' || c == '/' {
            continue;
        }
        count += 1;
        if count % GROUP_SIZE == 0 {
            if let Some(&next) = chars.get(i + 1) {
                if next != ' ' && next != '/' {
                    result.push(' ');
                }
            }
        }
    }
    result
}
