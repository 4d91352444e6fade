use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use patter::cli::Cli;
use patter::dialogue::marker::{FaceLibrary, SoundBank};
use patter::dialogue::segment::DialogueSegment;
use patter::dialogue::wrap::MonospaceMetrics;
use patter::generate::backend::ScriptedGenerator;
use patter::session::{Session, SessionEvent, SessionPhase};

/// Faces shipped with the demo
struct DemoFaces(HashSet<&'static str>);

impl FaceLibrary for DemoFaces {
    fn has_face(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

/// The demo just announces cues on stdout
struct DemoSounds;

impl SoundBank for DemoSounds {
    fn play(&mut self, cue: &str) -> bool {
        println!("\n  *{}*", cue);
        true
    }
}

fn demo_generator() -> Arc<ScriptedGenerator> {
    let generator = Arc::new(ScriptedGenerator::new(vec![DialogueSegment::new(
        "Hm? I don't have anything else prepared...",
        "neutral",
    )]));
    generator.push_response(vec![
        DialogueSegment::new("[face:happy]Oh! You're here[sfx:chime]. Hello!", "happy"),
        DialogueSegment::new("I was starting to think... nobody was coming.", "neutral"),
    ]);
    generator.push_response(vec![DialogueSegment::new(
        "[face:happy]That's a fine question. Let me think, hm... got it!",
        "neutral",
    )]);
    generator.push_response(vec![DialogueSegment::new(
        "Alright, I should rest now. Goodbye![quit]",
        "neutral",
    )]);
    generator
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let options = cli.resolve_options()?;
    let max_ticks = cli.ticks;

    let mut session = Session::new(
        options,
        demo_generator(),
        Box::new(MonospaceMetrics::default()),
        Box::new(DemoFaces(["neutral", "happy"].into_iter().collect())),
        Box::new(DemoSounds),
    );
    session.begin();

    // Scripted stand-ins for the user typing
    let mut pending_inputs = vec!["Goodbye for now", "What's on your mind?"];

    let frame = Duration::from_millis(16);
    let mut printed = String::new();
    let mut ticks = 0u64;
    let mut input_hidden = false;

    loop {
        let now = Instant::now();
        session.tick(now, frame.as_secs_f32());

        for event in session.drain_events() {
            match event {
                SessionEvent::ShowFace(face) => println!("\n  [{}]", face),
                SessionEvent::PlayCue(_) | SessionEvent::RevealSound => {}
            }
        }

        // Print only what was newly revealed this frame
        if let Some(wrapped) = session.wrapped() {
            if let Some(state) = session.reveal_state() {
                let visible = wrapped.render_visible(state.char_index).join("\n");
                if let Some(suffix) = visible.strip_prefix(printed.as_str()) {
                    print!("{}", suffix);
                    std::io::stdout().flush()?;
                    printed = visible;
                }
            }
        }

        if session.advance_indicator_eligible() {
            println!();
            printed.clear();
            session.advance(now);
        }

        match session.phase() {
            SessionPhase::Idle => {
                if let Some(input) = pending_inputs.pop() {
                    println!("\n> {}", input);
                    session.submit(input, None);
                    input_hidden = false;
                } else if !input_hidden {
                    // Out of scripted input; let the self-speak timer arm
                    session.set_input_visible(false, now);
                    input_hidden = true;
                }
            }
            SessionPhase::RetryPrompt => {
                // The demo backend never fails; bail out if it somehow does
                if let Some(error) = session.last_error() {
                    println!("\n! {}", error.user_message());
                }
                break;
            }
            SessionPhase::Terminated => break,
            _ => {}
        }

        ticks += 1;
        if max_ticks > 0 && ticks >= max_ticks {
            break;
        }
        thread::sleep(frame);
    }

    println!();
    log::info!("session over after {} ticks", ticks);
    Ok(())
}
