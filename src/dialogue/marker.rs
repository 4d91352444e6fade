//! Inline markers and their one-shot dispatch
//!
//! Markers are zero-width directives embedded in dialogue text
//! (`[face:NAME]`, `[sfx:NAME]`). They consume no reveal time and no
//! visible characters; each fires its side effect exactly once per
//! segment, the first time the reveal index reaches its position.

use std::collections::HashSet;

use crate::dialogue::wrap::WrappedText;

/// What kind of side effect a marker triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Switch the active face image
    Face,
    /// Play a named sound cue
    Sfx,
}

/// An inline marker extracted from dialogue text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Effect kind
    pub kind: MarkerKind,
    /// Face or cue name
    pub value: String,
    /// Count of visible characters preceding this marker in its line
    pub plain_offset: usize,
}

impl Marker {
    /// Create a new marker
    pub fn new(kind: MarkerKind, value: &str, plain_offset: usize) -> Self {
        Self {
            kind,
            value: value.to_string(),
            plain_offset,
        }
    }
}

/// A side effect produced by a fired marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerEffect {
    /// Show the named face
    ShowFace(String),
    /// Play the named sound cue
    PlayCue(String),
}

/// Face image lookup capability, keyed by name
pub trait FaceLibrary {
    /// Whether a face image with this name exists
    fn has_face(&self, name: &str) -> bool;
}

/// Sound cue playback capability, keyed by cue name
pub trait SoundBank {
    /// Play the named cue; returns false if the cue is unavailable
    fn play(&mut self, cue: &str) -> bool;
}

/// Records which markers have already fired for the current segment
///
/// Keys are `(line_index, marker_ordinal_in_line)` so the same face or
/// cue name appearing twice still fires twice, while re-evaluating the
/// same reveal index never re-fires a marker.
#[derive(Debug, Default)]
pub struct MarkerFireLedger {
    fired: HashSet<(usize, usize)>,
}

impl MarkerFireLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as fired; returns true if it had not fired before
    pub fn fire_once(&mut self, line: usize, ordinal: usize) -> bool {
        self.fired.insert((line, ordinal))
    }

    /// Whether a key has fired
    pub fn has_fired(&self, line: usize, ordinal: usize) -> bool {
        self.fired.contains(&(line, ordinal))
    }

    /// Forget all fired keys (on segment change)
    pub fn clear(&mut self) {
        self.fired.clear();
    }
}

/// Walks the wrapped line structure each tick and fires every marker the
/// reveal index has reached or passed, exactly once per segment.
#[derive(Debug, Default)]
pub struct MarkerDispatcher {
    ledger: MarkerFireLedger,
}

impl MarkerDispatcher {
    /// Create a new dispatcher with an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the ledger for a new segment
    pub fn reset(&mut self) {
        self.ledger.clear();
    }

    /// Fire all unfired markers whose position is at or before `reveal`
    ///
    /// Returns the effects in document order. A marker at plain offset 5
    /// fires as the index crosses from 4 to 6 in one tick, and never
    /// again for the same segment.
    pub fn dispatch(&mut self, wrapped: &WrappedText, reveal: usize) -> Vec<MarkerEffect> {
        let mut effects = Vec::new();
        for placed in wrapped.marker_positions() {
            if placed.global_offset > reveal {
                // Positions are in document order; nothing further can fire
                break;
            }
            if self.ledger.fire_once(placed.line, placed.ordinal) {
                let effect = match placed.marker.kind {
                    MarkerKind::Face => MarkerEffect::ShowFace(placed.marker.value.clone()),
                    MarkerKind::Sfx => MarkerEffect::PlayCue(placed.marker.value.clone()),
                };
                effects.push(effect);
            }
        }
        effects
    }
}
