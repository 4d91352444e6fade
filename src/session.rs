//! The session: one conversation from greeting to termination
//!
//! Owns every piece of engine state and exposes the tick/advance/skip
//! surface the host loop drives. All state lives here; nothing is
//! global. The host supplies the renderer-side capabilities (font
//! metrics, face lookup, sound playback) and a generation backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::Options;
use crate::dialogue::marker::{FaceLibrary, MarkerDispatcher, MarkerEffect, SoundBank};
use crate::dialogue::queue::DialogueQueue;
use crate::dialogue::reveal::{AnimationClock, RevealState};
use crate::dialogue::segment::{strip_control_tokens, DialogueSegment, QuitDirective};
use crate::dialogue::wrap::{wrap, FontMetrics, WrappedText};
use crate::generate::backend::Generator;
use crate::generate::coordinator::{
    BackoffPolicy, GenerationCoordinator, RetryChoice, RetryResolution,
};
use crate::generate::request::{GenerateError, GenerationOutcome, GenerationRequest};
use crate::generate::selfspeak::{pick_topic, SelfSpeakSchedule};
use crate::history::History;

/// Where the session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing on screen, nothing in flight
    Idle,
    /// A generation request is outstanding
    Generating,
    /// A segment is displayed (animating or fully revealed)
    Speaking,
    /// A failure is displayed, awaiting Retry/Cancel
    RetryPrompt,
    /// The session has ended
    Terminated,
}

/// Side effects for the host to act on, drained once per frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The active face changed
    ShowFace(String),
    /// A sound cue should play
    PlayCue(String),
    /// Characters were revealed this tick
    RevealSound,
}

/// One conversation session
pub struct Session {
    options: Options,
    metrics: Box<dyn FontMetrics>,
    faces: Box<dyn FaceLibrary>,
    sounds: Box<dyn SoundBank>,
    coordinator: GenerationCoordinator,
    queue: DialogueQueue,
    clock: AnimationClock,
    dispatcher: MarkerDispatcher,
    wrapped: Option<WrappedText>,
    active_face: String,
    history: History,
    schedule: SelfSpeakSchedule,
    rng: StdRng,
    phase: SessionPhase,
    input_visible: bool,
    quit_pending: QuitDirective,
    last_error: Option<GenerateError>,
    events: Vec<SessionEvent>,
}

impl Session {
    /// Assemble a session; loads history from disk when configured
    pub fn new(
        options: Options,
        generator: Arc<dyn Generator>,
        metrics: Box<dyn FontMetrics>,
        faces: Box<dyn FaceLibrary>,
        sounds: Box<dyn SoundBank>,
    ) -> Self {
        let backoff = BackoffPolicy {
            base_ms: options.retry_backoff_ms,
            max_attempts: options.retry_attempts,
        };
        let history = match &options.history_file {
            Some(path) if path.exists() => match History::load(path) {
                Ok(history) => history,
                Err(err) => {
                    log::warn!("could not load history, starting fresh: {:#}", err);
                    History::new()
                }
            },
            _ => History::new(),
        };
        let active_face = options.default_face.clone();
        Self {
            options,
            metrics,
            faces,
            sounds,
            coordinator: GenerationCoordinator::new(generator, backoff),
            queue: DialogueQueue::new(),
            clock: AnimationClock::new(),
            dispatcher: MarkerDispatcher::new(),
            wrapped: None,
            active_face,
            history,
            schedule: SelfSpeakSchedule::new(),
            rng: StdRng::from_entropy(),
            phase: SessionPhase::Idle,
            input_visible: false,
            quit_pending: QuitDirective::None,
            last_error: None,
            events: Vec::new(),
        }
    }

    /// Dispatch the mandatory opening greeting
    pub fn begin(&mut self) {
        let request = GenerationRequest::greeting(&self.options.prompt);
        if self.coordinator.dispatch(request, self.history.snapshot()) {
            self.phase = SessionPhase::Generating;
        }
    }

    /// Drive the session forward by one frame
    pub fn tick(&mut self, now: Instant, dt_secs: f32) {
        if self.phase == SessionPhase::Terminated {
            return;
        }

        if let Some(completed) = self.coordinator.poll() {
            match completed.outcome {
                GenerationOutcome::Success(segments) => {
                    self.accept_reply(completed.request, segments, now);
                }
                GenerationOutcome::Failure(error) => {
                    self.last_error = Some(error);
                    self.phase = SessionPhase::RetryPrompt;
                }
            }
        }

        if self.phase == SessionPhase::Speaking {
            let out = self.clock.tick(dt_secs, &self.options.pauses);
            self.fire_reached_markers();
            if out.reveal_sound {
                self.events.push(SessionEvent::RevealSound);
            }
        }

        if self.phase == SessionPhase::Idle
            && !self.coordinator.has_in_flight()
            && !self.coordinator.retry_pending()
            && self.queue.is_empty()
            && !self.input_visible
            && self.schedule.is_due(now)
        {
            self.dispatch_self_speak();
        }
    }

    /// Submit typed user input, optionally with a screenshot attachment;
    /// rejected outside the Idle phase
    pub fn submit(&mut self, input: &str, screenshot: Option<PathBuf>) -> bool {
        if self.phase != SessionPhase::Idle || self.coordinator.retry_pending() {
            log::warn!("user input rejected in phase {:?}", self.phase);
            return false;
        }
        let request = GenerationRequest::from_user(&self.options.prompt, input, screenshot);
        if self.coordinator.dispatch(request, self.history.snapshot()) {
            self.phase = SessionPhase::Generating;
            self.input_visible = false;
            self.schedule.park();
            true
        } else {
            false
        }
    }

    /// Move to the next queued segment; only once the current one is
    /// fully revealed. Returns false when nothing happened.
    pub fn advance(&mut self, now: Instant) -> bool {
        if self.phase != SessionPhase::Speaking || !self.clock.is_complete() {
            return false;
        }
        if self.quit_pending == QuitDirective::Forced {
            // Forced quit drops any remaining farewells
            self.queue.clear();
        }
        if !self.start_next_segment() {
            self.wrapped = None;
            self.clock.clear();
            self.finish_queue(now);
        }
        true
    }

    /// Reveal the rest of the current segment immediately
    pub fn skip(&mut self) -> bool {
        if self.phase != SessionPhase::Speaking {
            return false;
        }
        let skipped = self.clock.skip();
        if skipped {
            // Every remaining marker still fires, in document order
            self.fire_reached_markers();
        }
        skipped
    }

    /// Apply the user's answer to a surfaced generation failure
    pub fn resolve_retry(&mut self, choice: RetryChoice, now: Instant) -> Option<RetryResolution> {
        if self.phase != SessionPhase::RetryPrompt {
            return None;
        }
        let resolution = self
            .coordinator
            .resolve_retry(choice, self.history.snapshot())?;
        self.last_error = None;
        match resolution {
            RetryResolution::Redispatched => self.phase = SessionPhase::Generating,
            RetryResolution::ReturnToInput => {
                // A neutral acknowledgement so the box never goes dead silent
                let ack = DialogueSegment::new(&self.options.ack_text, &self.active_face);
                self.queue.enqueue_all(vec![ack]);
                if !self.start_next_segment() {
                    self.finish_queue(now);
                }
            }
            RetryResolution::EndSession => self.phase = SessionPhase::Terminated,
        }
        Some(resolution)
    }

    /// Show or hide the input field; self-speak only arms while hidden
    pub fn set_input_visible(&mut self, visible: bool, now: Instant) {
        self.input_visible = visible;
        if visible {
            self.schedule.park();
        } else {
            self.schedule
                .recompute(now, self.options.self_speak_band, &mut self.rng);
        }
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Reveal progress of the active segment, if any
    pub fn reveal_state(&self) -> Option<RevealState> {
        self.wrapped.as_ref().map(|w| self.clock.reveal_state(w))
    }

    /// Wrapped lines of the active segment, if any
    pub fn wrapped(&self) -> Option<&WrappedText> {
        self.wrapped.as_ref()
    }

    /// Whether the advance indicator should be shown
    pub fn advance_indicator_eligible(&self) -> bool {
        self.phase == SessionPhase::Speaking && self.clock.is_complete()
    }

    /// The face currently displayed
    pub fn active_face(&self) -> &str {
        &self.active_face
    }

    /// The failure awaiting Retry/Cancel, if any
    pub fn last_error(&self) -> Option<&GenerateError> {
        self.last_error.as_ref()
    }

    /// Conversation so far
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Take this frame's pending side effects
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn accept_reply(
        &mut self,
        request: GenerationRequest,
        segments: Vec<DialogueSegment>,
        now: Instant,
    ) {
        let (segments, quit) = strip_control_tokens(segments);
        if quit != QuitDirective::None {
            self.quit_pending = quit;
        }

        let parts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        self.history
            .record_exchange(request.user_input.as_deref(), &parts);
        self.persist_history();

        self.queue.enqueue_all(segments);
        if !self.start_next_segment() {
            // A reply that was nothing but control tokens
            self.finish_queue(now);
        }
    }

    /// Pop and activate the next queued segment
    fn start_next_segment(&mut self) -> bool {
        let Some(segment) = self.queue.pop_next() else {
            return false;
        };
        self.show_face(&segment.face);
        let wrapped = wrap(&segment.text, self.metrics.as_ref(), self.options.box_width);
        self.dispatcher.reset();
        self.clock
            .set_segment(segment.speed, self.options.char_ms, &wrapped);
        self.wrapped = Some(wrapped);
        self.phase = SessionPhase::Speaking;
        true
    }

    /// The queue just drained; settle into Idle or terminate
    fn finish_queue(&mut self, now: Instant) {
        if self.quit_pending != QuitDirective::None {
            log::info!("termination requested by reply; ending session");
            self.phase = SessionPhase::Terminated;
            return;
        }
        self.phase = SessionPhase::Idle;
        if !self.input_visible {
            self.schedule
                .recompute(now, self.options.self_speak_band, &mut self.rng);
        }
    }

    /// Fire every unfired marker at or before the current reveal index
    fn fire_reached_markers(&mut self) {
        let effects = match self.wrapped.as_ref() {
            Some(wrapped) => self.dispatcher.dispatch(wrapped, self.clock.char_index()),
            None => Vec::new(),
        };
        for effect in effects {
            match effect {
                MarkerEffect::ShowFace(name) => self.show_face(&name),
                MarkerEffect::PlayCue(cue) => self.play_cue(&cue),
            }
        }
    }

    fn show_face(&mut self, name: &str) {
        let resolved = if self.faces.has_face(name) {
            name.to_string()
        } else {
            log::warn!("unknown face '{}', using default", name);
            self.options.default_face.clone()
        };
        if resolved != self.active_face {
            self.active_face = resolved.clone();
            self.events.push(SessionEvent::ShowFace(resolved));
        }
    }

    fn play_cue(&mut self, cue: &str) {
        if !self.sounds.play(cue) {
            log::warn!("unknown sound cue '{}'", cue);
            return;
        }
        self.events.push(SessionEvent::PlayCue(cue.to_string()));
    }

    fn dispatch_self_speak(&mut self) {
        let prompt = match pick_topic(&self.options.topics, &mut self.rng) {
            Some(topic) => format!("{}\nBring up this topic: {}", self.options.prompt, topic),
            None => self.options.prompt.clone(),
        };
        let request = GenerationRequest::self_initiated(&prompt);
        if self.coordinator.dispatch(request, self.history.snapshot()) {
            log::debug!("self-speak dispatched");
            self.phase = SessionPhase::Generating;
            self.schedule.park();
        }
    }

    fn persist_history(&self) {
        if let Some(path) = &self.options.history_file {
            if let Err(err) = self.history.save(path) {
                log::error!("could not persist history: {:#}", err);
            }
        }
    }
}
