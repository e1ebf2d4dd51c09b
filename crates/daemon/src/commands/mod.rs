//! Command registry, dispatch and handler context.
//!
//! - [`registry`]: ordered, first-match-wins command table
//! - [`context`]: what a handler can see and do while it runs

pub mod context;
pub mod registry;

pub use context::CommandContext;
pub use registry::{CommandEntry, CommandRegistry, Handler};
