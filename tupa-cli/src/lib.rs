//! Command-line front end for the TUPA assistant.

pub mod app;
pub mod cli;
pub mod guard;
pub mod render;
pub mod session;

pub use cli::{Cli, Command};
pub use guard::{ResetDecision, ResetGuard};
pub use session::{Action, ChatSession};
