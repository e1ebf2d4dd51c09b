//! Daemon orchestrator for wiring together all components.
//!
//! This module provides the `DaemonOrchestrator` that binds the listener,
//! builds the session supervisor with the standard menu and drives it from
//! a tokio interval until shutdown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::menu::register_standard_commands;
use crate::network;
use crate::session::{ServerInfo, SessionSupervisor};

/// How long `stop` waits for the host loop to say goodbye to clients.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up, binding the listener.
    Starting,
    /// Running and accepting connections.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Daemon orchestrator that owns the listener and the host loop.
pub struct DaemonOrchestrator {
    /// Configuration.
    config: Config,
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// Connected sessions as of the last tick.
    active_sessions: Arc<AtomicUsize>,
    /// Bound listener address, once started.
    local_addr: Option<SocketAddr>,
    /// Accept loop task.
    accept_task: Option<JoinHandle<()>>,
    /// Supervisor tick loop task.
    host_task: Option<JoinHandle<()>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl DaemonOrchestrator {
    /// Creates a new daemon orchestrator from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            local_addr: None,
            accept_task: None,
            host_task: None,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Binds the listener and starts the host loop.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running or starting");
            }
            *state = OrchestratorState::Starting;
        }

        info!("Starting daemon orchestrator...");

        // A previous stop leaves the token cancelled
        if self.shutdown_token.is_cancelled() {
            self.shutdown_token = CancellationToken::new();
        }

        let net = &self.config.network;
        let bound = network::bind(
            &net.listen_addr,
            net.accept_backlog,
            net.no_delay,
            self.shutdown_token.child_token(),
        )
        .await
        .with_context(|| format!("Failed to bind {}", net.listen_addr));

        let (acceptor, accept_task, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                *self.state.write().await = OrchestratorState::Stopped;
                return Err(e);
            }
        };

        let info = ServerInfo::new(
            self.config.daemon.name.clone(),
            format!("v{}", crate::VERSION),
            Instant::now(),
        );
        let mut supervisor = SessionSupervisor::new(self.config.session.limits(), info, acceptor);
        if let Err(e) = register_standard_commands(supervisor.registry_mut()) {
            self.shutdown_token.cancel();
            *self.state.write().await = OrchestratorState::Stopped;
            return Err(e).context("Failed to register standard commands");
        }

        let host_task = tokio::spawn(run_host_loop(
            supervisor,
            self.config.session.tick_interval(),
            Arc::clone(&self.active_sessions),
            self.shutdown_token.clone(),
        ));

        self.local_addr = Some(local_addr);
        self.accept_task = Some(accept_task);
        self.host_task = Some(host_task);
        *self.state.write().await = OrchestratorState::Running;

        info!(
            addr = %local_addr,
            max_sessions = self.config.session.max_sessions,
            "Daemon orchestrator started successfully"
        );
        Ok(())
    }

    /// Stops the daemon orchestrator gracefully.
    ///
    /// Connected clients are told the server is going away before their
    /// connections are closed.
    pub async fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }

        info!("Stopping daemon orchestrator...");
        self.shutdown_token.cancel();

        if let Some(task) = self.host_task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => debug!("Host loop finished"),
                Ok(Err(e)) => warn!("Host loop task failed: {}", e),
                Err(_) => warn!("Host loop did not finish within {:?}", SHUTDOWN_GRACE),
            }
        }
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                warn!("Accept task failed: {}", e);
            }
        }

        self.local_addr = None;
        *self.state.write().await = OrchestratorState::Stopped;

        info!("Daemon orchestrator stopped");
        Ok(())
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Number of connected sessions as of the last tick.
    pub fn session_count(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// The configuration the orchestrator runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}

/// Ticks the supervisor until `shutdown` is cancelled, then closes every
/// session.
async fn run_host_loop(
    mut supervisor: SessionSupervisor,
    tick_interval: Duration,
    active_sessions: Arc<AtomicUsize>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Host loop received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                supervisor.tick();
                active_sessions.store(supervisor.active_count(), Ordering::Relaxed);
            }
        }
    }

    supervisor.shutdown();
    active_sessions.store(0, Ordering::Relaxed);
}
