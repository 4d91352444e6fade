//! Application options, settable via config file and CLI
//!
//! The config file is a flat `key = value` properties file. Unknown
//! keys and malformed values are logged and skipped so an old config
//! never prevents startup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::dialogue::pause::PauseDurations;

/// Everything the engine needs to run a session
#[derive(Debug, Clone)]
pub struct Options {
    /// Base reveal speed in milliseconds per character
    pub char_ms: f32,
    /// Pause lengths by trigger kind
    pub pauses: PauseDurations,
    /// Dialogue box width in pixels
    pub box_width: f32,
    /// Face shown when a segment names an unknown one
    pub default_face: String,
    /// Persona/system prompt sent with every request
    pub prompt: String,
    /// Neutral line spoken after the user cancels a failed exchange
    pub ack_text: String,
    /// Self-speak delay band in seconds, or None to disable
    pub self_speak_band: Option<(f32, f32)>,
    /// Topics the companion may bring up on its own
    pub topics: Vec<String>,
    /// Generation attempt ceiling (1 initial + retries)
    pub retry_attempts: u32,
    /// First retry delay in milliseconds
    pub retry_backoff_ms: u64,
    /// Where to persist conversation history, if anywhere
    pub history_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            char_ms: 30.0,
            pauses: PauseDurations::default(),
            box_width: 380.0,
            default_face: "neutral".to_string(),
            prompt: "You are a small desktop companion. Keep replies short.".to_string(),
            ack_text: "...never mind that.".to_string(),
            self_speak_band: Some((45.0, 180.0)),
            topics: Vec::new(),
            retry_attempts: 4,
            retry_backoff_ms: 1000,
            history_file: None,
        }
    }
}

/// Load options from a properties file, falling back to defaults for
/// anything it does not set
pub fn load_config(path: &Path) -> Result<Options> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let mut opts = Options::default();

    for (lineno, raw) in data.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::warn!("config line {}: no '=', skipping: {}", lineno + 1, line);
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if let Err(err) = apply_key(&mut opts, key, value) {
            log::warn!("config line {}: {}", lineno + 1, err);
        }
    }

    Ok(opts)
}

/// Drop everything from the first '#' onward
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn apply_key(opts: &mut Options, key: &str, value: &str) -> Result<()> {
    match key {
        "char_ms" => opts.char_ms = parse_f32(key, value)?,
        "pause_ellipsis" => opts.pauses.ellipsis = parse_f32(key, value)?,
        "pause_sentence" => opts.pauses.sentence = parse_f32(key, value)?,
        "pause_comma" => opts.pauses.comma = parse_f32(key, value)?,
        "pause_sfx" => opts.pauses.sfx = parse_f32(key, value)?,
        "box_width" => opts.box_width = parse_f32(key, value)?,
        "default_face" => opts.default_face = value.to_string(),
        "prompt" => opts.prompt = value.to_string(),
        "ack_text" => opts.ack_text = value.to_string(),
        "self_speak" => opts.self_speak_band = parse_band(value)?,
        "topics" => {
            opts.topics = value
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        "retry_attempts" => {
            opts.retry_attempts = value
                .parse()
                .with_context(|| format!("invalid {}: {}", key, value))?;
        }
        "retry_backoff_ms" => {
            opts.retry_backoff_ms = value
                .parse()
                .with_context(|| format!("invalid {}: {}", key, value))?;
        }
        "history_file" => opts.history_file = Some(PathBuf::from(value)),
        _ => anyhow::bail!("unknown key '{}'", key),
    }
    Ok(())
}

fn parse_f32(key: &str, value: &str) -> Result<f32> {
    value
        .parse()
        .with_context(|| format!("invalid {}: {}", key, value))
}

/// Parse a self-speak band: "LO..HI" in seconds, or "never"
pub fn parse_band(s: &str) -> Result<Option<(f32, f32)>> {
    if s.eq_ignore_ascii_case("never") {
        return Ok(None);
    }
    let Some((lo, hi)) = s.split_once("..") else {
        anyhow::bail!("self-speak band must be LO..HI or never, got '{}'", s);
    };
    let lo: f32 = lo.trim().parse().context("invalid band lower bound")?;
    let hi: f32 = hi.trim().parse().context("invalid band upper bound")?;
    if lo < 0.0 || hi < lo {
        anyhow::bail!("self-speak band out of order: {}..{}", lo, hi);
    }
    Ok(Some((lo, hi)))
}
