//! EO Chatlog Library
//!
//! Библиотека для разбора чат-лога Endless-Online: каналы, опыт, убийства.

pub mod types;
pub mod error;
pub mod log_parser;
pub mod state;
pub mod merge;
pub mod file_watcher;
pub mod persistence;
pub mod commands;

pub use types::*;
pub use error::LogError;
pub use log_parser::LogParser;
pub use state::{KillTally, LogState};
pub use merge::SourceLines;
pub use file_watcher::LogWatcher;
