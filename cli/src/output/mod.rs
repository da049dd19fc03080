//! CLI-specific output implementations
//!
//! Terminal rendering of the events emitted while a turn runs.

pub mod cli_handler;

pub use cli_handler::{CliOutputConfig, CliOutputHandler};
