use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{load_config, parse_band, Options};

/// patter - a marker-aware dialogue box engine
#[derive(Parser, Debug, Default)]
#[command(name = "patter")]
#[command(version = "0.3.0")]
#[command(about = "Animated dialogue companion with asynchronous text generation", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base reveal speed in milliseconds per character
    #[arg(long, value_name = "MS")]
    pub char_ms: Option<f32>,

    /// Dialogue box width in pixels
    #[arg(short, long, value_name = "PIXELS")]
    pub width: Option<f32>,

    /// Self-speak delay band in seconds (LO..HI) or "never"
    #[arg(long, value_name = "BAND")]
    pub self_speak: Option<String>,

    /// Conversation history file
    #[arg(long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Generation attempt ceiling
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Ticks to run before the demo exits (0 = until terminated)
    #[arg(long, value_name = "TICKS", default_value_t = 0)]
    pub ticks: u64,
}

impl Cli {
    /// Resolve the final options: config file first, CLI overrides on top
    pub fn resolve_options(&self) -> Result<Options> {
        let opts = match &self.config {
            Some(path) => load_config(path)?,
            None => Options::default(),
        };
        self.merge_into_options(opts)
    }

    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(char_ms) = self.char_ms {
            if char_ms <= 0.0 {
                anyhow::bail!("--char-ms must be positive");
            }
            opts.char_ms = char_ms;
        }

        if let Some(width) = self.width {
            if width <= 0.0 {
                anyhow::bail!("--width must be positive");
            }
            opts.box_width = width;
        }

        if let Some(ref band) = self.self_speak {
            opts.self_speak_band = parse_band(band).context("invalid --self-speak band")?;
        }

        if let Some(ref history) = self.history {
            opts.history_file = Some(history.clone());
        }

        if let Some(retries) = self.retries {
            if retries == 0 {
                anyhow::bail!("--retries must be at least 1");
            }
            opts.retry_attempts = retries;
        }

        Ok(opts)
    }
}
