//! Conversation control: configuration, turn state machine and controller

pub mod config;
pub mod controller;
pub mod execution;
pub mod state;

pub use config::{AgentBuilder, AgentConfig};
pub use controller::ConversationController;
pub use execution::TurnOutcome;
pub use state::{route_after_model, TurnState};
