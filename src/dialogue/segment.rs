//! Dialogue segments produced by generation
//!
//! One segment is one on-screen dialogue box: text plus display
//! metadata. Segments are immutable once produced.

/// Requested reveal speed for a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
    /// The whole segment appears in one tick
    Instant,
}

impl TextSpeed {
    /// Multiplier applied to the configured base milliseconds-per-char
    pub fn modifier(self) -> f32 {
        match self {
            TextSpeed::Slow => 1.5,
            TextSpeed::Normal => 1.0,
            TextSpeed::Fast => 0.5,
            TextSpeed::Instant => 0.0,
        }
    }

    /// Parse a speed name; unknown names fall back to Normal
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "slow" => TextSpeed::Slow,
            "fast" => TextSpeed::Fast,
            "instant" => TextSpeed::Instant,
            "normal" => TextSpeed::Normal,
            other => {
                log::warn!("unknown text speed '{}', using normal", other);
                TextSpeed::Normal
            }
        }
    }
}

/// One dialogue box's worth of text and display metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueSegment {
    /// Raw text, possibly containing inline markers
    pub text: String,
    /// Face to show when the segment starts
    pub face: String,
    /// Reveal speed
    pub speed: TextSpeed,
    /// Bold styling
    pub bold: bool,
    /// Italic styling
    pub italic: bool,
}

impl DialogueSegment {
    /// Create a segment with default styling
    pub fn new(text: &str, face: &str) -> Self {
        Self {
            text: text.to_string(),
            face: face.to_string(),
            speed: TextSpeed::Normal,
            bold: false,
            italic: false,
        }
    }

    /// Set the reveal speed
    pub fn with_speed(mut self, speed: TextSpeed) -> Self {
        self.speed = speed;
        self
    }

    /// Whether the segment has no visible content at all
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Termination requested through control tokens in generated text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuitDirective {
    /// No termination requested
    #[default]
    None,
    /// `[quit]`: end after the queue drains
    Graceful,
    /// `[quit_forced]`: end after the queue drains, skipping farewells
    Forced,
}

const QUIT_FORCED_TOKEN: &str = "[quit_forced]";
const QUIT_TOKEN: &str = "[quit]";

/// Strip `[quit]` / `[quit_forced]` control tokens from the trailing
/// segment and drop segments left with no visible content.
///
/// Returns the surviving segments and the requested termination.
pub fn strip_control_tokens(
    mut segments: Vec<DialogueSegment>,
) -> (Vec<DialogueSegment>, QuitDirective) {
    let mut directive = QuitDirective::None;

    if let Some(last) = segments.last_mut() {
        if last.text.contains(QUIT_FORCED_TOKEN) {
            directive = QuitDirective::Forced;
            last.text = last.text.replace(QUIT_FORCED_TOKEN, "");
        }
        if last.text.contains(QUIT_TOKEN) {
            if directive == QuitDirective::None {
                directive = QuitDirective::Graceful;
            }
            last.text = last.text.replace(QUIT_TOKEN, "");
        }
        last.text = last.text.trim().to_string();
    }

    segments.retain(|segment| !segment.is_blank());
    (segments, directive)
}
