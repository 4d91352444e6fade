//! End-to-end session tests: generation, reveal, markers, retry, and
//! self-speak driven purely through the public surface.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use patter::config::Options;
use patter::dialogue::marker::{FaceLibrary, SoundBank};
use patter::dialogue::segment::DialogueSegment;
use patter::dialogue::wrap::MonospaceMetrics;
use patter::generate::backend::{FailingGenerator, Generator, ScriptedGenerator};
use patter::generate::coordinator::{RetryChoice, RetryResolution};
use patter::generate::request::GenerateError;
use patter::session::{Session, SessionEvent, SessionPhase};

struct Faces(HashSet<String>);

impl FaceLibrary for Faces {
    fn has_face(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

struct Sounds(HashSet<String>);

impl SoundBank for Sounds {
    fn play(&mut self, cue: &str) -> bool {
        self.0.contains(cue)
    }
}

fn seg(text: &str) -> DialogueSegment {
    DialogueSegment::new(text, "neutral")
}

fn build_session(generator: Arc<dyn Generator>, options: Options) -> Session {
    Session::new(
        options,
        generator,
        Box::new(MonospaceMetrics::default()),
        Box::new(Faces(
            ["neutral", "happy", "sad"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )),
        Box::new(Sounds(
            ["chime", "drum"].iter().map(|s| s.to_string()).collect(),
        )),
    )
}

fn fast_options() -> Options {
    Options {
        char_ms: 0.001,
        retry_backoff_ms: 1,
        self_speak_band: None,
        ..Options::default()
    }
}

/// Tick with real sleeps until the in-flight request lands
fn await_generation(session: &mut Session) {
    for _ in 0..2000 {
        session.tick(Instant::now(), 0.016);
        if session.phase() != SessionPhase::Generating {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("generation never completed");
}

/// Run the reveal to the end of the current segment
fn finish_reveal(session: &mut Session) {
    for _ in 0..500 {
        if session.advance_indicator_eligible() {
            return;
        }
        session.tick(Instant::now(), 0.1);
    }
    panic!("segment never finished revealing");
}

#[test]
fn greeting_plays_markers_in_order() {
    let generator = Arc::new(ScriptedGenerator::new(vec![seg(
        "[face:happy]Welcome[sfx:chime] back!",
    )]));
    let mut session = build_session(generator, fast_options());

    session.begin();
    await_generation(&mut session);
    assert_eq!(session.phase(), SessionPhase::Speaking);
    finish_reveal(&mut session);

    let events = session.drain_events();
    let face_pos = events
        .iter()
        .position(|e| *e == SessionEvent::ShowFace("happy".to_string()));
    let cue_pos = events
        .iter()
        .position(|e| *e == SessionEvent::PlayCue("chime".to_string()));
    assert!(face_pos.is_some(), "face marker never fired");
    assert!(cue_pos.is_some(), "sound marker never fired");
    assert!(face_pos < cue_pos, "markers fired out of document order");
    assert_eq!(session.active_face(), "happy");
}

#[test]
fn submit_grows_history_and_speaks_reply() {
    let generator = Arc::new(ScriptedGenerator::new(vec![seg("A canned reply")]));
    let mut session = build_session(generator, fast_options());

    assert!(session.submit("first question", None));
    await_generation(&mut session);
    assert_eq!(session.phase(), SessionPhase::Speaking);

    finish_reveal(&mut session);
    assert!(session.advance(Instant::now()));
    assert_eq!(session.phase(), SessionPhase::Idle);

    let turns = session.history().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text(), "first question");
    assert_eq!(turns[1].text(), "A canned reply");
}

#[test]
fn multi_segment_reply_advances_box_by_box() {
    let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
    generator.push_response(vec![seg("Box one."), seg("Box two."), seg("Box three.")]);
    let mut session = build_session(generator, fast_options());

    session.begin();
    await_generation(&mut session);

    for _ in 0..3 {
        assert_eq!(session.phase(), SessionPhase::Speaking);
        finish_reveal(&mut session);
        assert!(session.advance(Instant::now()));
    }
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn transient_failures_recover_without_user_involvement() {
    let generator = Arc::new(FailingGenerator::new(
        3,
        GenerateError::RateLimited,
        vec![seg("Made it")],
    ));
    let mut session = build_session(Arc::clone(&generator) as Arc<dyn Generator>, fast_options());

    session.begin();
    await_generation(&mut session);

    // The user only ever sees the success
    assert_eq!(session.phase(), SessionPhase::Speaking);
    assert_eq!(generator.attempts(), 4);
    assert!(session.last_error().is_none());
}

#[test]
fn exhausted_retries_offer_retry_choice() {
    let generator = Arc::new(FailingGenerator::new(
        2,
        GenerateError::ServerError("503".into()),
        vec![seg("Eventually")],
    ));
    let mut options = fast_options();
    options.retry_attempts = 2; // both attempts burned by failures
    let mut session = build_session(Arc::clone(&generator) as Arc<dyn Generator>, options);

    session.submit("hello?", None);
    await_generation(&mut session);
    assert_eq!(session.phase(), SessionPhase::RetryPrompt);
    assert!(session.last_error().is_some());

    // Retry re-dispatches the identical request, which now succeeds
    let resolution = session.resolve_retry(RetryChoice::Retry, Instant::now());
    assert_eq!(resolution, Some(RetryResolution::Redispatched));
    await_generation(&mut session);
    assert_eq!(session.phase(), SessionPhase::Speaking);
}

#[test]
fn cancelling_failed_greeting_terminates() {
    let generator = Arc::new(FailingGenerator::new(
        10,
        GenerateError::InvalidCredential,
        Vec::new(),
    ));
    let mut session = build_session(generator, fast_options());

    session.begin();
    await_generation(&mut session);
    assert_eq!(session.phase(), SessionPhase::RetryPrompt);

    let resolution = session.resolve_retry(RetryChoice::Cancel, Instant::now());
    assert_eq!(resolution, Some(RetryResolution::EndSession));
    assert_eq!(session.phase(), SessionPhase::Terminated);
}

#[test]
fn cancelling_failed_exchange_speaks_acknowledgement() {
    let generator = Arc::new(FailingGenerator::new(10, GenerateError::Timeout, Vec::new()));
    let mut options = fast_options();
    options.ack_text = "Let's move on.".to_string();
    let mut session = build_session(generator, options);

    session.submit("a doomed question", None);
    await_generation(&mut session);
    assert_eq!(session.phase(), SessionPhase::RetryPrompt);

    let resolution = session.resolve_retry(RetryChoice::Cancel, Instant::now());
    assert_eq!(resolution, Some(RetryResolution::ReturnToInput));
    assert_eq!(session.phase(), SessionPhase::Speaking);

    finish_reveal(&mut session);
    let visible = session
        .wrapped()
        .map(|w| w.render_visible(usize::MAX).join(" "))
        .unwrap_or_default();
    assert_eq!(visible, "Let's move on.");
}

#[test]
fn self_speak_fires_while_input_hidden() {
    let generator = Arc::new(ScriptedGenerator::new(vec![seg("Thinking out loud")]));
    let mut options = fast_options();
    options.self_speak_band = Some((0.0, 0.0)); // due immediately
    let mut session = build_session(generator, options);

    let now = Instant::now();
    session.set_input_visible(false, now);
    session.tick(now, 0.016);
    assert_eq!(session.phase(), SessionPhase::Generating);

    await_generation(&mut session);
    assert_eq!(session.phase(), SessionPhase::Speaking);

    // An unprompted reply records only the assistant turn
    assert_eq!(session.history().len(), 1);
}

#[test]
fn self_speak_parked_while_input_visible() {
    let generator = Arc::new(ScriptedGenerator::new(vec![seg("Never spoken")]));
    let mut options = fast_options();
    options.self_speak_band = Some((0.0, 0.0));
    let mut session = build_session(generator, options);

    let now = Instant::now();
    session.set_input_visible(true, now);
    for _ in 0..50 {
        session.tick(Instant::now(), 0.016);
    }
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn skip_reveals_everything_and_fires_markers() {
    let generator = Arc::new(ScriptedGenerator::new(vec![seg(
        "A long, winding answer[sfx:drum] that nobody waits through",
    )]));
    let mut options = fast_options();
    options.char_ms = 10_000.0; // reveal frozen without skip
    let mut session = build_session(generator, options);

    session.begin();
    await_generation(&mut session);
    session.tick(Instant::now(), 0.016);
    assert!(!session.advance_indicator_eligible());

    assert!(session.skip());
    assert!(session.advance_indicator_eligible());

    let state = session.reveal_state().unwrap();
    assert_eq!(state.char_index, state.total_visible_chars);
    assert!(session
        .drain_events()
        .contains(&SessionEvent::PlayCue("drum".to_string())));
}

#[test]
fn forced_quit_drops_remaining_segments() {
    let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
    generator.push_response(vec![
        seg("Something went wrong."),
        seg("Skipped farewell one."),
        seg("Skipped farewell two.[quit_forced]"),
    ]);
    let mut session = build_session(generator, fast_options());

    session.begin();
    await_generation(&mut session);

    finish_reveal(&mut session);
    assert!(session.advance(Instant::now()));
    // Forced quit: the remaining farewells never display
    assert_eq!(session.phase(), SessionPhase::Terminated);
}

#[test]
fn history_persists_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.txt");

    let mut options = fast_options();
    options.history_file = Some(path.clone());

    let generator = Arc::new(ScriptedGenerator::new(vec![seg("Noted.")]));
    let mut session = build_session(generator, options.clone());
    session.submit("remember this", None);
    await_generation(&mut session);
    assert_eq!(session.history().len(), 2);

    // A fresh session over the same file starts with the old turns
    let generator = Arc::new(ScriptedGenerator::new(vec![seg("Welcome back.")]));
    let session = build_session(generator, options);
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().turns()[0].text(), "remember this");
}
