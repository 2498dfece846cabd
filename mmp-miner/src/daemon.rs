//! Daemon lifecycle management for mmp-miner.
//!
//! This module handles the core daemon functionality including task
//! management, signal handling, and graceful shutdown.

use std::sync::Arc;

use tokio::signal::unix::{self, SignalKind};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::config::SessionConfig;
use crate::hasher::{FinalRound, Hasher, HasherBridge};
use crate::mmp::{ClientConfig, MmpClient};
use crate::session::Session;
use crate::tracing::prelude::*;

/// The main daemon that coordinates the mining session.
pub struct Daemon {
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Run the daemon until shutdown is requested.
    ///
    /// Spawns the MMP client and the session as tracked tasks, then waits
    /// for SIGINT or SIGTERM.
    pub async fn run(
        self,
        config: SessionConfig,
        bridge: Arc<HasherBridge>,
        hasher: Arc<dyn Hasher>,
        final_round: Arc<dyn FinalRound>,
    ) -> anyhow::Result<()> {
        // Channel for client-to-session events
        let (event_tx, event_rx) = mpsc::channel(100);

        let client_config = ClientConfig {
            addr: config.addr.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        };
        let (client, handle) = MmpClient::new(client_config, event_tx, self.shutdown.clone());

        self.tracker.spawn(async move {
            if let Err(e) = client.run().await {
                error!("Client error: {}", e);
            }
        });

        let session = Session::new(
            config,
            handle,
            event_rx,
            bridge,
            hasher,
            final_round,
            self.shutdown.clone(),
        );
        self.tracker.spawn(async move {
            if let Err(e) = session.run().await {
                error!("Session error: {}", e);
            }
        });
        self.tracker.close();

        info!("Started.");

        // Install signal handlers
        let mut sigint = unix::signal(SignalKind::interrupt())?;
        let mut sigterm = unix::signal(SignalKind::terminate())?;

        // Wait for shutdown signal
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            },
        }

        // Initiate shutdown
        trace!("Shutting down.");
        self.shutdown.cancel();

        // Wait for all tasks to complete
        self.tracker.wait().await;
        info!("Exiting.");

        Ok(())
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}
