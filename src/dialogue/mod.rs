//! Dialogue box engine
//!
//! Everything needed to turn one generated segment into an animated,
//! marker-aware dialogue box:
//! - Tokenization and line wrapping under a pixel budget
//! - Punctuation- and marker-driven reveal pauses
//! - One-shot marker side effects (faces, sound cues)
//! - The typewriter reveal clock
//! - The queue of segments awaiting display
//!
//! All of this is single-threaded state owned by the render/update loop.

pub mod marker;
pub mod pause;
pub mod queue;
pub mod reveal;
pub mod segment;
pub mod wrap;

pub use marker::{FaceLibrary, Marker, MarkerDispatcher, MarkerEffect, MarkerFireLedger, MarkerKind, SoundBank};
pub use pause::{PauseDurations, PauseResolver, PauseTrigger};
pub use queue::DialogueQueue;
pub use reveal::{AnimationClock, ClockState, RevealState, TickOutput};
pub use segment::{strip_control_tokens, DialogueSegment, QuitDirective, TextSpeed};
pub use wrap::{wrap, FontMetrics, Line, LineItem, MonospaceMetrics, PlacedMarker, WrappedText};
