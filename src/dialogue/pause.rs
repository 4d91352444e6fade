//! Punctuation- and marker-driven reveal pauses
//!
//! Decides whether the typewriter animation should hold at a given
//! reveal index. Pauses fire at the end boundary of a punctuation run
//! and at the start boundary of an `[sfx:]` marker, once each.

use std::collections::HashMap;

use crate::dialogue::marker::MarkerKind;
use crate::dialogue::wrap::WrappedText;

/// Configured pause lengths in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PauseDurations {
    /// After `...`
    pub ellipsis: f32,
    /// After `.`, `?` or `!`
    pub sentence: f32,
    /// After `,`
    pub comma: f32,
    /// At an sfx marker position
    pub sfx: f32,
}

impl Default for PauseDurations {
    fn default() -> Self {
        Self {
            ellipsis: 0.8,
            sentence: 0.4,
            comma: 0.2,
            sfx: 0.5,
        }
    }
}

/// What triggered a pause, in priority order (highest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PauseTrigger {
    Ellipsis,
    Sentence,
    Comma,
    Sfx,
}

impl PauseTrigger {
    fn duration(self, durations: &PauseDurations) -> f32 {
        match self {
            PauseTrigger::Ellipsis => durations.ellipsis,
            PauseTrigger::Sentence => durations.sentence,
            PauseTrigger::Comma => durations.comma,
            PauseTrigger::Sfx => durations.sfx,
        }
    }
}

fn is_pause_punct(c: char) -> bool {
    matches!(c, '.' | ',' | '?' | '!' | '…')
}

/// Resolves pause triggers for one wrapped segment
///
/// Boundaries are precomputed from the visible-character stream when the
/// segment is set. The resolver is stateful: each boundary yields its
/// duration exactly once, so re-querying the same index returns 0.
#[derive(Debug, Default)]
pub struct PauseResolver {
    boundaries: HashMap<usize, PauseTrigger>,
    last_fired: Option<usize>,
}

impl PauseResolver {
    /// Build the boundary table for a wrapped segment
    pub fn new(wrapped: &WrappedText) -> Self {
        let mut boundaries: HashMap<usize, PauseTrigger> = HashMap::new();

        // Punctuation runs in the visible stream pause at their end
        let chars: Vec<char> = wrapped.visible_stream().chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if !is_pause_punct(chars[i]) {
                i += 1;
                continue;
            }
            let start = i;
            while i < chars.len() && is_pause_punct(chars[i]) {
                i += 1;
            }
            let run = &chars[start..i];
            let dots = run.iter().filter(|&&c| c == '.').count();
            let trigger = if dots >= 3 || run.contains(&'…') {
                PauseTrigger::Ellipsis
            } else if run.iter().any(|&c| matches!(c, '.' | '?' | '!')) {
                PauseTrigger::Sentence
            } else {
                PauseTrigger::Comma
            };
            insert_by_priority(&mut boundaries, i, trigger);
        }

        // Sfx markers pause at their start boundary
        for placed in wrapped.marker_positions() {
            if placed.marker.kind == MarkerKind::Sfx {
                insert_by_priority(&mut boundaries, placed.global_offset, PauseTrigger::Sfx);
            }
        }

        Self {
            boundaries,
            last_fired: None,
        }
    }

    /// Pause duration beginning at `reveal_index`, or 0
    ///
    /// Exactly one duration is returned when several triggers coincide
    /// at the same index; triggers never sum.
    pub fn pause_at(&mut self, reveal_index: usize, durations: &PauseDurations) -> f32 {
        if self.last_fired == Some(reveal_index) {
            return 0.0;
        }
        match self.boundaries.get(&reveal_index) {
            Some(trigger) => {
                self.last_fired = Some(reveal_index);
                trigger.duration(durations).max(0.0)
            }
            None => 0.0,
        }
    }

    /// What would trigger at an index, if anything (no firing state)
    pub fn trigger_at(&self, reveal_index: usize) -> Option<PauseTrigger> {
        self.boundaries.get(&reveal_index).copied()
    }
}

fn insert_by_priority(
    boundaries: &mut HashMap<usize, PauseTrigger>,
    index: usize,
    trigger: PauseTrigger,
) {
    boundaries
        .entry(index)
        .and_modify(|existing| {
            if trigger < *existing {
                *existing = trigger;
            }
        })
        .or_insert(trigger);
}
