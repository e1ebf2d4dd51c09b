//! Session management module.
//!
//! This module provides the fixed pool of session slots and the supervisor
//! that admits connections, pumps input and enforces idle timeouts.

pub mod pool;
pub mod slot;
pub mod supervisor;

pub use pool::{SessionLimits, SessionPool, SessionSummary};
pub use slot::Session;
pub use supervisor::{ServerInfo, SessionSupervisor};
