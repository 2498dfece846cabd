//! Mining session orchestration.
//!
//! The session sits between the MMP client and the compute engine. On a
//! fixed polling period it drains the engine's mailbox, turning "need
//! work" signals into at most one outstanding work request and finished
//! candidate batches into verified submissions. Client events flow the
//! other way: new work units are padded and assigned to the engine, and
//! connection-state changes adjust what the session is allowed to ask for.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::SessionConfig;
use crate::hasher::{Assignment, FinalRound, Hasher, HasherBridge, ResultBatch};
use crate::mmp::{ClientEvent, MmpHandle, MmpResult};
use crate::work::{self, CandidateOutcome};

/// How often the engine mailbox is drained.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Minimum spacing between hashrate pushes to the server.
const RATE_PUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Orchestrates one mining session.
pub struct Session {
    /// Session configuration
    config: SessionConfig,

    /// Handle into the running MMP client
    client: MmpHandle,

    /// Events from the MMP client
    events: mpsc::Receiver<ClientEvent>,

    /// Mailbox shared with the compute engine
    bridge: Arc<HasherBridge>,

    /// The compute engine receiving assignments
    hasher: Arc<dyn Hasher>,

    /// Final-round recomputation for candidate verification
    final_round: Arc<dyn FinalRound>,

    /// Shutdown signal
    shutdown: CancellationToken,

    /// Lifecycle state
    state: SessionState,

    /// Whether the client currently has a live connection
    connected: bool,

    /// A MORE request is in flight; cleared when WORK arrives
    work_outstanding: bool,

    /// The engine wants work but no request could be issued yet
    work_wanted: bool,

    /// When the hashrate meta variable was last pushed
    last_rate_push: Option<Instant>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        client: MmpHandle,
        events: mpsc::Receiver<ClientEvent>,
        bridge: Arc<HasherBridge>,
        hasher: Arc<dyn Hasher>,
        final_round: Arc<dyn FinalRound>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            client,
            events,
            bridge,
            hasher,
            final_round,
            shutdown,
            state: SessionState::Idle,
            connected: false,
            work_outstanding: false,
            work_wanted: false,
            last_rate_push: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session until shutdown or until the client goes away.
    pub async fn run(mut self) -> MmpResult<()> {
        self.state = SessionState::Running;

        // Identity metadata goes out once; the client replays it on every
        // subsequent handshake.
        for (name, value) in self.config.identity_meta() {
            self.client.set_meta(&name, value).await?;
        }

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_engine().await?;
                }

                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_client_event(event).await?,
                        None => {
                            debug!("Client event channel closed");
                            break;
                        }
                    }
                }

                _ = self.shutdown.cancelled() => break,
            }
        }

        self.state = SessionState::Stopping;
        info!("Session stopping");
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// One polling tick: drain the engine mailbox and act on it.
    async fn poll_engine(&mut self) -> MmpResult<()> {
        let drained = self.bridge.drain();

        if drained.work_requested {
            self.work_wanted = true;
        }

        // Never more than one request in flight; the flag clears when the
        // WORK command arrives.
        if self.work_wanted && self.connected && !self.work_outstanding {
            trace!("Requesting work");
            self.client.request_work().await?;
            self.work_outstanding = true;
            self.work_wanted = false;
        }

        for batch in drained.batches {
            self.process_batch(&batch).await?;
        }

        if let Some(rate) = drained.hashrate {
            self.maybe_push_rate(rate).await?;
        }

        Ok(())
    }

    /// Verify every candidate in a batch and submit the qualifying ones.
    async fn process_batch(&mut self, batch: &ResultBatch) -> MmpResult<()> {
        for &nonce in &batch.nonces {
            match work::evaluate(self.final_round.as_ref(), batch, nonce) {
                CandidateOutcome::HardwareError => {
                    error!(
                        nonce = format!("{:#010x}", nonce),
                        "Result verification failed, check hardware"
                    );
                }
                CandidateOutcome::Share {
                    payload,
                    block_word,
                    ..
                } => {
                    let tag = work::block_tag(block_word);
                    info!(block = %tag, "Submitting result");

                    let verdict = self.client.submit(payload.to_vec()).await?;
                    tokio::spawn(async move {
                        match verdict.await {
                            Ok(true) => info!(block = %tag, "Result accepted"),
                            Ok(false) => warn!(block = %tag, "Result rejected"),
                            Err(_) => {}
                        }
                    });
                }
                CandidateOutcome::Diff1Only { diff1_word } => {
                    trace!(
                        word = format!("{:#010x}", diff1_word),
                        "Candidate below target"
                    );
                }
            }
        }
        Ok(())
    }

    /// Push the hashrate meta variable, at most once per interval.
    async fn maybe_push_rate(&mut self, rate: u64) -> MmpResult<()> {
        let now = Instant::now();
        let due = match self.last_rate_push {
            Some(last) => now.duration_since(last) >= RATE_PUSH_INTERVAL,
            None => true,
        };

        if due {
            debug!(rate, "Pushing hashrate");
            self.client.set_meta("rate", rate as i64).await?;
            self.last_rate_push = Some(now);
        }
        Ok(())
    }

    /// Handle one event from the MMP client.
    async fn handle_client_event(&mut self, event: ClientEvent) -> MmpResult<()> {
        match event {
            ClientEvent::Connected => {
                info!(addr = %self.config.addr, "Connected to server");
                self.connected = true;
            }
            ClientEvent::Disconnected => {
                warn!(addr = %self.config.addr, "Disconnected from server");
                self.connected = false;

                // A request in flight died with the connection; re-issue it
                // once the client is back.
                if self.work_outstanding {
                    self.work_outstanding = false;
                    self.work_wanted = true;
                }
            }
            ClientEvent::Msg(text) => {
                info!(message = %text, "Server message");
            }
            ClientEvent::Work(work) => {
                debug!(mask = work.mask, "Work received");
                self.work_outstanding = false;

                let padded = work::pad_for_hashing(&work.data);
                self.hasher.assign(Assignment { work, padded });
            }
            ClientEvent::Block(height) => {
                info!(height, "New block on the network");
            }
        }
        Ok(())
    }
}
