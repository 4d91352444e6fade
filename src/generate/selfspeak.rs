//! Self-speak scheduling
//!
//! When the user leaves the companion idle it eventually speaks on its
//! own. The schedule holds one future fire instant drawn uniformly from
//! a configured band; it is recomputed after every spoken reply and
//! parked whenever self-speak is not allowed.

use std::time::{Duration, Instant};

use rand::Rng;

/// The single pending self-speak timer
#[derive(Debug, Default)]
pub struct SelfSpeakSchedule {
    next_fire: Option<Instant>,
}

impl SelfSpeakSchedule {
    /// Start parked; nothing fires until the first `recompute`
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh fire instant from the band, or park when the band
    /// is absent (self-speak disabled)
    pub fn recompute<R: Rng>(&mut self, now: Instant, band: Option<(f32, f32)>, rng: &mut R) {
        self.next_fire = band.map(|(lo, hi)| {
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            let secs = if lo == hi { lo } else { rng.gen_range(lo..=hi) };
            now + Duration::from_secs_f32(secs.max(0.0))
        });
        if let Some(at) = self.next_fire {
            log::debug!("self-speak scheduled in {:?}", at.duration_since(now));
        }
    }

    /// Suspend the timer without forgetting the band
    pub fn park(&mut self) {
        self.next_fire = None;
    }

    /// Whether the timer has elapsed
    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.next_fire, Some(at) if now >= at)
    }

    /// The pending fire instant, if any
    pub fn next_fire(&self) -> Option<Instant> {
        self.next_fire
    }
}

/// Pick a random self-speak topic
pub fn pick_topic<'a, R: Rng>(topics: &'a [String], rng: &mut R) -> Option<&'a str> {
    if topics.is_empty() {
        None
    } else {
        let idx = rng.gen_range(0..topics.len());
        Some(topics[idx].as_str())
    }
}
