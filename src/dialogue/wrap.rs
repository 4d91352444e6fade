//! Marker-aware tokenization and line wrapping
//!
//! Splits raw dialogue text into plain-text runs and inline markers,
//! then packs the runs into display lines under a pixel-width budget.
//!
//! Visible characters are the characters of the plain-text runs; inline
//! markers and inter-word whitespace contribute nothing to the count, so
//! `total_visible_chars` is the same no matter where line breaks fall.
//! A joining space is presentational only: it appears together with the
//! first revealed character of the run that follows it.

use std::sync::LazyLock;

use regex::Regex;

use crate::dialogue::marker::{Marker, MarkerKind};

/// Matches the two inline marker syntaxes: `[face:NAME]` and `[sfx:NAME]`
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(face|sfx):([A-Za-z0-9_\-]+)\]").expect("marker regex")
});

/// Text measurement capability supplied by the renderer
pub trait FontMetrics {
    /// Measured pixel width of `text`, or None if it cannot be measured
    fn measure_width(&self, text: &str) -> Option<f32>;
    /// Pixel height of one line
    fn line_height(&self) -> f32;
    /// Estimated average glyph advance, used when measurement fails
    fn average_advance(&self) -> f32;
}

/// Fixed-advance metrics for tests and the headless demo
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMetrics {
    /// Advance per character in pixels
    pub advance: f32,
    /// Line height in pixels
    pub line_height: f32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            advance: 8.0,
            line_height: 16.0,
        }
    }
}

impl FontMetrics for MonospaceMetrics {
    fn measure_width(&self, text: &str) -> Option<f32> {
        Some(text.chars().count() as f32 * self.advance)
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }

    fn average_advance(&self) -> f32 {
        self.advance
    }
}

/// One item on a wrapped line
#[derive(Debug, Clone, PartialEq)]
pub enum LineItem {
    /// A run of visible characters (a word, or a piece of a force-split
    /// word). `glued` runs render with no joining space before them.
    Run { text: String, glued: bool },
    /// A zero-width inline marker
    Marker(Marker),
}

/// A wrapped display line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    /// Runs and markers in document order
    pub items: Vec<LineItem>,
}

impl Line {
    /// Count of visible characters on this line
    pub fn visible_len(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                LineItem::Run { text, .. } => text.chars().count(),
                LineItem::Marker(_) => 0,
            })
            .sum()
    }

    /// Render the first `budget` visible characters of this line
    ///
    /// Returns the rendered text and how many visible characters it
    /// consumed. Joining spaces appear only once the following run has
    /// at least one revealed character.
    pub fn render_prefix(&self, budget: usize) -> (String, usize) {
        let mut out = String::new();
        let mut used = 0;
        let mut any_run = false;
        for item in &self.items {
            if let LineItem::Run { text, glued } = item {
                if used >= budget {
                    break;
                }
                let take = (budget - used).min(text.chars().count());
                if take == 0 {
                    break;
                }
                if any_run && !glued {
                    out.push(' ');
                }
                out.extend(text.chars().take(take));
                used += take;
                any_run = true;
            }
        }
        (out, used)
    }

    /// Render the whole line
    pub fn render_full(&self) -> String {
        self.render_prefix(usize::MAX).0
    }

    fn push_run(&mut self, text: &str, glued: bool) {
        self.items.push(LineItem::Run {
            text: text.to_string(),
            glued,
        });
    }
}

/// A marker located within the wrapped structure
#[derive(Debug, Clone, Copy)]
pub struct PlacedMarker<'a> {
    /// Line index
    pub line: usize,
    /// Ordinal of this marker within its line
    pub ordinal: usize,
    /// Count of visible characters preceding the marker across all lines
    pub global_offset: usize,
    /// The marker itself
    pub marker: &'a Marker,
}

/// The result of wrapping one segment's text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrappedText {
    /// Wrapped display lines
    pub lines: Vec<Line>,
    /// Total visible characters across all lines (markers excluded)
    pub total_visible_chars: usize,
}

impl WrappedText {
    /// All markers in document order with their global reveal offsets
    pub fn marker_positions(&self) -> Vec<PlacedMarker<'_>> {
        let mut placed = Vec::new();
        let mut base = 0;
        for (line_idx, line) in self.lines.iter().enumerate() {
            let mut ordinal = 0;
            let mut seen = 0;
            for item in &line.items {
                match item {
                    LineItem::Run { text, .. } => seen += text.chars().count(),
                    LineItem::Marker(marker) => {
                        debug_assert_eq!(marker.plain_offset, seen);
                        placed.push(PlacedMarker {
                            line: line_idx,
                            ordinal,
                            global_offset: base + marker.plain_offset,
                            marker,
                        });
                        ordinal += 1;
                    }
                }
            }
            base += line.visible_len();
        }
        placed
    }

    /// The visible-character stream: all run characters in order, with
    /// no spaces and no markers
    pub fn visible_stream(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            for item in &line.items {
                if let LineItem::Run { text, .. } = item {
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// Index of the line containing the given reveal position
    pub fn line_of(&self, char_index: usize) -> usize {
        let mut base = 0;
        for (idx, line) in self.lines.iter().enumerate() {
            let len = line.visible_len();
            if char_index < base + len {
                return idx;
            }
            base += len;
        }
        self.lines.len().saturating_sub(1)
    }

    /// Render each line up to a total reveal budget
    pub fn render_visible(&self, reveal: usize) -> Vec<String> {
        let mut remaining = reveal;
        let mut out = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let (text, used) = line.render_prefix(remaining);
            remaining -= used;
            out.push(text);
        }
        out
    }
}

enum Token {
    Word { text: String, glued: bool },
    Mark { kind: MarkerKind, value: String },
}

fn push_words(chunk: &str, tokens: &mut Vec<Token>) {
    let leading_ws = chunk.starts_with(char::is_whitespace);
    let mut first = true;
    for word in chunk.split_whitespace() {
        let glued = first && !leading_ws && !tokens.is_empty();
        tokens.push(Token::Word {
            text: word.to_string(),
            glued,
        });
        first = false;
    }
}

/// Split text into word and marker tokens
///
/// Whitespace immediately before a marker is dropped here: gaps only
/// survive as the `glued=false` flag on the word that follows them, so
/// a marker can never produce a visible leading space.
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in MARKER_RE.captures_iter(text) {
        let whole = caps.get(0).expect("match group 0");
        push_words(&text[last..whole.start()], &mut tokens);
        let kind = if &caps[1] == "face" {
            MarkerKind::Face
        } else {
            MarkerKind::Sfx
        };
        tokens.push(Token::Mark {
            kind,
            value: caps[2].to_string(),
        });
        last = whole.end();
    }
    push_words(&text[last..], &mut tokens);
    tokens
}

fn measure(metrics: &dyn FontMetrics, text: &str) -> f32 {
    match metrics.measure_width(text) {
        Some(width) => width,
        None => {
            log::debug!("unmeasurable text ({} chars), using average advance", text.chars().count());
            text.chars().count() as f32 * metrics.average_advance()
        }
    }
}

/// Wrap `text` into display lines no wider than `max_width` pixels
///
/// Markers are atomic: they are never split across lines and never
/// contribute to word-wrap width. A single word wider than the budget is
/// force-split character by character so layout never stalls.
pub fn wrap(text: &str, metrics: &dyn FontMetrics, max_width: f32) -> WrappedText {
    let mut lines: Vec<Line> = Vec::new();
    let mut cur = Line::default();
    // Rendered form of the current line, used for measurement
    let mut cur_render = String::new();

    for token in tokenize(text) {
        match token {
            Token::Mark { kind, value } => {
                let marker = Marker::new(kind, &value, cur.visible_len());
                cur.items.push(LineItem::Marker(marker));
            }
            Token::Word { text: word, glued } => {
                let sep = if cur_render.is_empty() || glued { "" } else { " " };
                let candidate = format!("{cur_render}{sep}{word}");
                if measure(metrics, &candidate) <= max_width {
                    cur.push_run(&word, glued || cur_render.is_empty());
                    cur_render = candidate;
                    continue;
                }

                // Does not fit; close the current line if it has content
                if !cur_render.is_empty() {
                    lines.push(std::mem::take(&mut cur));
                    cur_render.clear();
                }

                if measure(metrics, &word) <= max_width {
                    cur.push_run(&word, true);
                    cur_render = word;
                } else {
                    force_split(&word, metrics, max_width, &mut lines, &mut cur, &mut cur_render);
                }
            }
        }
    }

    if !cur.items.is_empty() {
        lines.push(cur);
    }

    let total_visible_chars = lines.iter().map(Line::visible_len).sum();
    WrappedText {
        lines,
        total_visible_chars,
    }
}

/// Place an oversized word character by character across as many lines
/// as it needs. Always makes progress: at least one character per line.
fn force_split(
    word: &str,
    metrics: &dyn FontMetrics,
    max_width: f32,
    lines: &mut Vec<Line>,
    cur: &mut Line,
    cur_render: &mut String,
) {
    let chars: Vec<char> = word.chars().collect();
    let mut start = 0;
    while start < chars.len() {
        let mut end = start + 1;
        while end < chars.len() {
            let candidate: String = chars[start..=end].iter().collect();
            if measure(metrics, &candidate) > max_width {
                break;
            }
            end += 1;
        }
        let chunk: String = chars[start..end].iter().collect();
        cur.push_run(&chunk, true);
        if end < chars.len() {
            lines.push(std::mem::take(cur));
            cur_render.clear();
        } else {
            *cur_render = chunk;
        }
        start = end;
    }
}
