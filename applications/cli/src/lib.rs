//! Aria terminal player
//!
//! Library half of the `aria` binary: configuration, the interactive
//! command grammar and the JSON-lines play history.

pub mod commands;
pub mod config;
pub mod error;
pub mod history;

pub use commands::Command;
pub use config::{AppConfig, ResolverKind};
pub use error::{CliError, Result};
pub use history::{JsonlPlayLog, PlayEntry};
