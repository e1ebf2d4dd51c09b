//! # MenuShell Daemon Library
//!
//! This crate provides the server side of MenuShell, a minimal line-oriented
//! menu server for raw TCP (telnet-style) clients.
//!
//! ## Overview
//!
//! - **Session Slots**: a fixed pool of reusable slots with admission control
//! - **Line Editing**: per-session backspace and single-step history recall
//! - **Command Dispatch**: ordered exact or prefix matching of command lines
//! - **Idle Supervision**: a warning, then a disconnect, for silent sessions
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   Daemon Orchestrator                     │
//! ├───────────────────────────────────────────────────────────┤
//! │  accept task ──mpsc──▶ ┌─────────────────────────────┐    │
//! │                        │     Session Supervisor      │    │
//! │  interval ──tick()───▶ │  admission │ pump │ idle    │    │
//! │                        ├─────────────────────────────┤    │
//! │                        │ Session Pool │ Cmd Registry │    │
//! │                        └─────────────────────────────┘    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, DaemonOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     let mut orchestrator = DaemonOrchestrator::new(config)?;
//!     orchestrator.start().await?;
//!
//!     // Serve until told to stop...
//!
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! The supervisor can also be embedded without any sockets:
//!
//! ```rust
//! use std::time::Instant;
//! use daemon::menu::register_standard_commands;
//! use daemon::network::MemoryAcceptor;
//! use daemon::session::{ServerInfo, SessionLimits, SessionSupervisor};
//!
//! let (acceptor, connector) = MemoryAcceptor::new();
//! let info = ServerInfo::new("Demo", "v1", Instant::now());
//! let mut supervisor = SessionSupervisor::new(SessionLimits::default(), info, acceptor);
//! register_standard_commands(supervisor.registry_mut()).unwrap();
//!
//! let client = connector.connect();
//! supervisor.tick();
//! assert!(client.take_text().starts_with("Welcome to Demo v1"));
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`network`]: Transport and acceptor abstractions, TCP and in-memory
//! - [`session`]: Slot pool and session supervisor
//! - [`commands`]: Command registry and handler context
//! - [`menu`]: Standard menu commands
//! - [`orchestrator`]: Listener and host loop

pub mod commands;
pub mod config;
pub mod menu;
pub mod network;
pub mod orchestrator;
pub mod session;

// Re-export protocol for convenience
pub use protocol;

/// Version reported in the welcome banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export session types for convenience
pub use session::{
    ServerInfo, Session, SessionLimits, SessionPool, SessionSummary, SessionSupervisor,
};

// Re-export command types for convenience
pub use commands::{CommandContext, CommandEntry, CommandRegistry, Handler};

// Re-export network types for convenience
pub use network::{
    Acceptor, MemoryAcceptor, MemoryConnector, MemoryPeer, MemoryTransport, NoAcceptor,
    TcpTransport, Transport,
};

// Re-export orchestrator types for convenience
pub use orchestrator::{DaemonOrchestrator, OrchestratorState};
