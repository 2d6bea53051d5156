//! erdboard application
//!
//! Headless host for the canvas engine: replays scripted input, writes the
//! downloads the engine asks for and feeds it the files it asks to import.

mod app;
mod script;

pub use app::{App, AppConfig, AppError, AppResult};
pub use script::{ScriptEvent, parse_script};
