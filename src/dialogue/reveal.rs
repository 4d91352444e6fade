//! Reveal progress for the active dialogue segment
//!
//! The animation clock owns the typewriter state machine:
//! Idle -> Animating -> Paused <-> Animating -> Complete.

use crate::dialogue::pause::{PauseDurations, PauseResolver};
use crate::dialogue::segment::TextSpeed;
use crate::dialogue::wrap::WrappedText;

/// Fallback milliseconds-per-character when configuration is unusable
pub const DEFAULT_CHAR_MS: f32 = 30.0;

/// Clock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    /// No segment active
    #[default]
    Idle,
    /// Revealing characters
    Animating,
    /// Holding at a pause boundary
    Paused,
    /// All characters revealed
    Complete,
}

/// Snapshot of reveal progress for the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealState {
    /// Line the reveal position currently falls on
    pub line_index: usize,
    /// Count of visible characters currently shown
    pub char_index: usize,
    /// Total visible characters in the segment
    pub total_visible_chars: usize,
    /// True until every character is revealed (a paused segment still
    /// reports true)
    pub is_animating: bool,
    /// Whether the clock is holding at a pause
    pub is_paused: bool,
    /// Seconds left on the current pause
    pub pause_remaining: f32,
}

/// What one tick of the clock did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickOutput {
    /// Characters revealed this tick
    pub advanced: usize,
    /// Whether a reveal sound should play this tick
    pub reveal_sound: bool,
    /// Whether the segment finished this tick
    pub just_completed: bool,
}

/// Typewriter reveal clock for the active segment
#[derive(Debug, Default)]
pub struct AnimationClock {
    state: ClockState,
    char_index: usize,
    total: usize,
    ms_per_char: f32,
    instant: bool,
    carry_ms: f32,
    pause_remaining: f32,
    resolver: PauseResolver,
}

impl AnimationClock {
    /// Create an idle clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a segment active and restart reveal progress
    pub fn set_segment(&mut self, speed: TextSpeed, base_char_ms: f32, wrapped: &WrappedText) {
        self.resolver = PauseResolver::new(wrapped);
        self.total = wrapped.total_visible_chars;
        self.char_index = 0;
        self.carry_ms = 0.0;
        self.pause_remaining = 0.0;
        self.instant = speed == TextSpeed::Instant;

        let mut ms = base_char_ms * speed.modifier();
        if !self.instant && ms <= 0.0 {
            log::warn!(
                "non-positive ms-per-char ({}), substituting normal speed",
                ms
            );
            ms = if base_char_ms > 0.0 {
                base_char_ms
            } else {
                DEFAULT_CHAR_MS
            };
        }
        self.ms_per_char = ms;
        self.state = ClockState::Animating;
    }

    /// Return to Idle with no active segment
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Advance the clock by `dt_secs`
    pub fn tick(&mut self, dt_secs: f32, pauses: &PauseDurations) -> TickOutput {
        let mut out = TickOutput::default();
        match self.state {
            ClockState::Idle | ClockState::Complete => {}
            ClockState::Paused => {
                self.pause_remaining -= dt_secs;
                if self.pause_remaining <= 0.0 {
                    self.pause_remaining = 0.0;
                    if self.char_index >= self.total {
                        self.state = ClockState::Complete;
                        out.just_completed = true;
                    } else {
                        self.state = ClockState::Animating;
                    }
                }
            }
            ClockState::Animating => {
                if self.instant {
                    out.advanced = self.total - self.char_index;
                    self.char_index = self.total;
                    // At most one reveal sound for the whole segment
                    out.reveal_sound = out.advanced > 0;
                    self.state = ClockState::Complete;
                    out.just_completed = true;
                    return out;
                }

                // An sfx marker at offset zero pauses before the first char
                if self.char_index == 0 {
                    let pause = self.resolver.pause_at(0, pauses);
                    if pause > 0.0 {
                        self.pause_remaining = pause;
                        self.state = ClockState::Paused;
                        return out;
                    }
                }

                self.carry_ms += dt_secs * 1000.0;
                while self.carry_ms >= self.ms_per_char && self.char_index < self.total {
                    self.carry_ms -= self.ms_per_char;
                    self.char_index += 1;
                    out.advanced += 1;
                    let pause = self.resolver.pause_at(self.char_index, pauses);
                    if pause > 0.0 {
                        self.pause_remaining = pause;
                        self.state = ClockState::Paused;
                        // The pause swallows any leftover reveal budget
                        self.carry_ms = 0.0;
                        break;
                    }
                }

                if self.state == ClockState::Animating && self.char_index >= self.total {
                    self.state = ClockState::Complete;
                    out.just_completed = true;
                }
                out.reveal_sound = out.advanced > 0 && self.state != ClockState::Paused;
            }
        }
        out
    }

    /// Short-circuit straight to Complete, cancelling any pause
    pub fn skip(&mut self) -> bool {
        match self.state {
            ClockState::Animating | ClockState::Paused => {
                self.char_index = self.total;
                self.pause_remaining = 0.0;
                self.carry_ms = 0.0;
                self.state = ClockState::Complete;
                true
            }
            _ => false,
        }
    }

    /// Current state
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Current reveal index
    pub fn char_index(&self) -> usize {
        self.char_index
    }

    /// Total visible characters of the active segment
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether every character is revealed
    pub fn is_complete(&self) -> bool {
        self.state == ClockState::Complete
    }

    /// Snapshot for the renderer
    pub fn reveal_state(&self, wrapped: &WrappedText) -> RevealState {
        RevealState {
            line_index: wrapped.line_of(self.char_index),
            char_index: self.char_index,
            total_visible_chars: self.total,
            is_animating: matches!(self.state, ClockState::Animating | ClockState::Paused),
            is_paused: self.state == ClockState::Paused,
            pause_remaining: self.pause_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::wrap::{wrap, MonospaceMetrics};

    fn wrapped(text: &str) -> WrappedText {
        wrap(text, &MonospaceMetrics::default(), 10_000.0)
    }

    fn pauses() -> PauseDurations {
        PauseDurations::default()
    }

    #[test]
    fn test_starts_idle() {
        let clock = AnimationClock::new();
        assert_eq!(clock.state(), ClockState::Idle);
        assert_eq!(clock.char_index(), 0);
    }

    #[test]
    fn test_advance_by_elapsed_over_ms_per_char() {
        let w = wrapped("abcdefghij");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        let out = clock.tick(0.035, &pauses());
        assert_eq!(out.advanced, 3);
        assert_eq!(clock.char_index(), 3);
        assert!(out.reveal_sound);
    }

    #[test]
    fn test_carry_accumulates_across_ticks() {
        let w = wrapped("abcdefghij");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        assert_eq!(clock.tick(0.006, &pauses()).advanced, 0);
        assert_eq!(clock.tick(0.006, &pauses()).advanced, 1);
    }

    #[test]
    fn test_char_index_monotonic_and_bounded() {
        let w = wrapped("hello world again");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Fast, 10.0, &w);

        let mut last = 0;
        for _ in 0..500 {
            clock.tick(0.016, &pauses());
            assert!(clock.char_index() >= last);
            assert!(clock.char_index() <= clock.total());
            last = clock.char_index();
        }
        assert!(clock.is_complete());
    }

    #[test]
    fn test_pause_at_ellipsis_boundary() {
        // Stream "Wait...go", ellipsis boundary at index 7
        let w = wrapped("Wait... go");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        // One big tick: reveal stops at the boundary, sound suppressed
        let out = clock.tick(1.0, &pauses());
        assert_eq!(clock.char_index(), 7);
        assert_eq!(clock.state(), ClockState::Paused);
        assert!(!out.reveal_sound);

        // Pause decays, then animation resumes
        clock.tick(pauses().ellipsis, &pauses());
        assert_eq!(clock.state(), ClockState::Animating);
        let out = clock.tick(0.05, &pauses());
        assert!(out.advanced > 0);
    }

    #[test]
    fn test_pause_fires_once_per_boundary() {
        let w = wrapped("Hm... ok");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        clock.tick(1.0, &pauses());
        assert_eq!(clock.state(), ClockState::Paused);
        clock.tick(pauses().ellipsis + 0.01, &pauses());

        // Finishing the segment never re-pauses at the old boundary
        for _ in 0..100 {
            clock.tick(0.05, &pauses());
        }
        assert!(clock.is_complete());
    }

    #[test]
    fn test_pause_at_end_of_segment_delays_completion() {
        // Stream "Done." with a sentence boundary at the very end
        let w = wrapped("Done.");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        let out = clock.tick(1.0, &pauses());
        assert_eq!(clock.char_index(), clock.total());
        assert_eq!(clock.state(), ClockState::Paused);
        assert!(!out.just_completed);

        let out = clock.tick(pauses().sentence + 0.01, &pauses());
        assert!(out.just_completed);
        assert!(clock.is_complete());
    }

    #[test]
    fn test_instant_reveals_in_one_tick() {
        let w = wrapped("A fairly long segment... with pauses!");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Instant, 10.0, &w);

        let out = clock.tick(0.001, &pauses());
        assert!(clock.is_complete());
        assert_eq!(clock.char_index(), clock.total());
        assert!(out.reveal_sound);
        assert!(out.just_completed);
    }

    #[test]
    fn test_skip_bypasses_pending_pause() {
        let w = wrapped("Wait... go");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        clock.tick(1.0, &pauses());
        assert_eq!(clock.state(), ClockState::Paused);

        assert!(clock.skip());
        assert!(clock.is_complete());
        assert_eq!(clock.char_index(), clock.total());
        assert_eq!(clock.reveal_state(&w).pause_remaining, 0.0);
    }

    #[test]
    fn test_skip_is_noop_when_idle_or_complete() {
        let mut clock = AnimationClock::new();
        assert!(!clock.skip());

        let w = wrapped("hi");
        clock.set_segment(TextSpeed::Instant, 10.0, &w);
        clock.tick(0.01, &pauses());
        assert!(!clock.skip());
    }

    #[test]
    fn test_nonpositive_char_ms_falls_back() {
        let w = wrapped("abc");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 0.0, &w);

        // With the fallback rate, a long tick still makes progress
        let out = clock.tick(1.0, &pauses());
        assert!(out.advanced > 0);
    }

    #[test]
    fn test_sfx_at_offset_zero_pauses_before_first_char() {
        let w = wrapped("[sfx:bell]Hey");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        let out = clock.tick(0.05, &pauses());
        assert_eq!(out.advanced, 0);
        assert_eq!(clock.state(), ClockState::Paused);
        assert_eq!(clock.char_index(), 0);
    }

    #[test]
    fn test_reset_on_new_segment() {
        let w1 = wrapped("first segment");
        let w2 = wrapped("second");
        let mut clock = AnimationClock::new();

        clock.set_segment(TextSpeed::Normal, 10.0, &w1);
        clock.tick(0.2, &pauses());
        assert!(clock.char_index() > 0);

        clock.set_segment(TextSpeed::Normal, 10.0, &w2);
        assert_eq!(clock.char_index(), 0);
        assert_eq!(clock.total(), w2.total_visible_chars);
        assert_eq!(clock.state(), ClockState::Animating);
    }

    #[test]
    fn test_empty_segment_completes_immediately() {
        let w = wrapped("");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);

        let out = clock.tick(0.016, &pauses());
        assert!(out.just_completed);
        assert!(clock.is_complete());
    }

    #[test]
    fn test_reveal_state_snapshot() {
        let w = wrapped("Hello there friend");
        let mut clock = AnimationClock::new();
        clock.set_segment(TextSpeed::Normal, 10.0, &w);
        clock.tick(0.05, &pauses());

        let state = clock.reveal_state(&w);
        assert_eq!(state.char_index, clock.char_index());
        assert_eq!(state.total_visible_chars, w.total_visible_chars);
        assert!(state.is_animating);
        assert!(!state.is_paused);
    }
}
