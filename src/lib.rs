// patter library
// Marker-aware dialogue boxes with asynchronous text generation

pub mod cli;
pub mod config;
pub mod dialogue;
pub mod generate;
pub mod history;
pub mod session;

pub use cli::Cli;
pub use config::Options;
pub use session::{Session, SessionEvent, SessionPhase};
