//! MMP client implementation.
//!
//! This module contains the main client that manages the connection
//! lifecycle, protocol state, and event emission. The client owns the
//! reconnect policy: it dials, runs one connection to completion, settles
//! anything left pending, and dials again after an exponentially growing
//! delay. Consumers talk to it through an [`MmpHandle`] and receive
//! [`ClientEvent`]s on a channel, so they never observe individual
//! connection attempts beyond the Connected/Disconnected notifications.

use std::collections::BTreeMap;
use std::time::Duration;

use super::codec::{self, trailing};
use super::connection::{Connection, Transport};
use super::dispatch::{dispatch, Dispatch, ServerCommand};
use super::error::{MmpError, MmpResult};
use super::registry::PendingResults;
use crate::config::MetaValue;
use crate::work::{WorkUnit, DATA_LEN, DEFAULT_TARGET};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// First reconnect delay after a connection is lost.
const BACKOFF_INITIAL: Duration = Duration::from_millis(200);

/// Reconnect delay ceiling.
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Server connection configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Server address, `host:port`
    pub addr: String,

    /// Worker username
    pub username: String,

    /// Worker password
    pub password: String,
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A connection to the server was established
    Connected,

    /// The connection was lost; pending submissions have been settled as
    /// rejected
    Disconnected,

    /// Free-text message from the server, for the operator
    Msg(String),

    /// A new work unit, carrying the target in force at receipt
    Work(WorkUnit),

    /// Block-height notice
    Block(u64),
}

/// Commands accepted by the client.
#[derive(Debug)]
pub enum ClientCommand {
    /// Ask the server for another work unit
    RequestWork,

    /// Set a metadata variable, synchronizing it to the server
    SetMeta { name: String, value: MetaValue },

    /// Submit a proof-of-work result; the reply settles with the server's
    /// verdict
    SubmitResult {
        payload: Vec<u8>,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable handle for driving a running [`MmpClient`].
#[derive(Clone)]
pub struct MmpHandle {
    command_tx: mpsc::Sender<ClientCommand>,
}

impl MmpHandle {
    /// Ask the server for another work unit.
    pub async fn request_work(&self) -> MmpResult<()> {
        self.command_tx
            .send(ClientCommand::RequestWork)
            .await
            .map_err(|_| MmpError::ChannelClosed)
    }

    /// Set a metadata variable. The client retains it and re-synchronizes
    /// on every reconnect.
    pub async fn set_meta(&self, name: &str, value: impl Into<MetaValue>) -> MmpResult<()> {
        self.command_tx
            .send(ClientCommand::SetMeta {
                name: name.to_string(),
                value: value.into(),
            })
            .await
            .map_err(|_| MmpError::ChannelClosed)
    }

    /// Submit a result payload.
    ///
    /// The returned receiver settles with the server's verdict, or with
    /// `false` if the connection is lost before a verdict arrives.
    pub async fn submit(&self, payload: Vec<u8>) -> MmpResult<oneshot::Receiver<bool>> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(ClientCommand::SubmitResult { payload, reply })
            .await
            .map_err(|_| MmpError::ChannelClosed)?;
        Ok(rx)
    }
}

/// Create a handle wired to a bare command channel, for driving consumers
/// of [`MmpHandle`] without a running client.
#[cfg(test)]
pub(crate) fn test_handle() -> (MmpHandle, mpsc::Receiver<ClientCommand>) {
    let (command_tx, command_rx) = mpsc::channel(32);
    (MmpHandle { command_tx }, command_rx)
}

/// Exponential reconnect backoff.
///
/// `next()` yields the delay to wait before the upcoming attempt and
/// doubles the stored delay up to the ceiling. Reset when the server
/// proves healthy, which for MMP means a valid work unit was processed,
/// not merely a TCP accept.
#[derive(Debug)]
struct Backoff {
    delay: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            delay: BACKOFF_INITIAL,
        }
    }

    fn next(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(BACKOFF_MAX);
        delay
    }

    fn reset(&mut self) {
        self.delay = BACKOFF_INITIAL;
    }
}

/// MMP client.
///
/// Manages the connection to a mining server, handles the protocol
/// lifecycle (login, metadata synchronization), and emits events for
/// work, verdicts, and connection state.
pub struct MmpClient {
    /// Server configuration
    config: ClientConfig,

    /// Where to send events
    event_tx: mpsc::Sender<ClientEvent>,

    /// Where to receive commands
    command_rx: mpsc::Receiver<ClientCommand>,

    /// Shutdown signal
    shutdown: CancellationToken,

    /// Submissions awaiting a server verdict
    pending: PendingResults,

    /// Reconnect delay state
    backoff: Backoff,

    /// Difficulty target for the current login session
    target: [u8; 32],

    /// Metadata variables, replayed during each handshake
    meta: BTreeMap<String, MetaValue>,
}

impl MmpClient {
    /// Create a new client and the handle that drives it.
    pub fn new(
        config: ClientConfig,
        event_tx: mpsc::Sender<ClientEvent>,
        shutdown: CancellationToken,
    ) -> (Self, MmpHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let client = Self {
            config,
            event_tx,
            command_rx,
            shutdown,
            pending: PendingResults::new(),
            backoff: Backoff::new(),
            target: DEFAULT_TARGET,
            meta: BTreeMap::new(),
        };
        (client, MmpHandle { command_tx })
    }

    async fn emit(&self, event: ClientEvent) -> MmpResult<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| MmpError::ChannelClosed)
    }

    /// Serialize one META command. Integer values go bare; strings carry
    /// the trailing marker so they may contain spaces.
    fn meta_line(name: &str, value: &MetaValue) -> String {
        match value {
            MetaValue::Int(v) => format!("META {} {}", name, v),
            MetaValue::Str(s) => format!("META {} {}", name, trailing(s)),
        }
    }

    /// Run the client until shutdown, reconnecting as needed.
    ///
    /// Each lost connection settles all pending submissions as rejected
    /// and emits `Disconnected`, then the next attempt waits out the
    /// current backoff delay. Commands arriving while offline are handled
    /// immediately rather than queued against a dead connection.
    pub async fn run(mut self) -> MmpResult<()> {
        loop {
            match Connection::connect(&self.config.addr).await {
                Ok(conn) => {
                    self.emit(ClientEvent::Connected).await?;

                    match self.run_with_transport(conn).await {
                        Ok(()) => {
                            // Shutdown requested; the consumer may already
                            // be gone, so a failed notification is fine.
                            let _ = self.connection_lost().await;
                            return Ok(());
                        }
                        Err(MmpError::ChannelClosed) => return Err(MmpError::ChannelClosed),
                        Err(e) => {
                            warn!(error = %e, "Connection lost");
                            self.connection_lost().await?;
                        }
                    }
                }
                Err(e) => {
                    warn!(addr = %self.config.addr, error = %e, "Connection attempt failed");
                }
            }

            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            let delay = self.backoff.next();
            info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,

                    Some(cmd) = self.command_rx.recv() => {
                        self.handle_offline_command(cmd);
                    }

                    _ = self.shutdown.cancelled() => return Ok(()),
                }
            }
        }
    }

    /// Settle state after a connection ends.
    ///
    /// No verdict will ever arrive for in-flight submissions, so they all
    /// resolve as rejected before the consumer hears `Disconnected`. The
    /// target belongs to the login session that just ended; the server
    /// resends it after the next login.
    async fn connection_lost(&mut self) -> MmpResult<()> {
        let outstanding = self.pending.len();
        if outstanding > 0 {
            debug!(outstanding, "Settling pending submissions as rejected");
        }
        self.pending.purge();
        self.target = DEFAULT_TARGET;
        self.emit(ClientEvent::Disconnected).await
    }

    /// Handle a command that arrives between connections.
    fn handle_offline_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::RequestWork => {
                // Nothing to ask; the consumer re-requests once reconnected.
                debug!("Dropping work request while disconnected");
            }
            ClientCommand::SetMeta { name, value } => {
                // Retained for replay during the next handshake.
                self.meta.insert(name, value);
            }
            ClientCommand::SubmitResult { reply, .. } => {
                let _ = reply.send(false);
            }
        }
    }

    /// Run one connection over a pre-established transport.
    ///
    /// Performs the handshake (LOGIN, metadata replay), then enters the
    /// main loop handling server commands and consumer commands until the
    /// connection drops or shutdown is requested.
    pub(crate) async fn run_with_transport(&mut self, mut conn: impl Transport) -> MmpResult<()> {
        conn.write_line(&format!(
            "LOGIN {} {}",
            self.config.username,
            trailing(&self.config.password)
        ))
        .await?;

        for (name, value) in &self.meta {
            conn.write_line(&Self::meta_line(name, value)).await?;
        }

        loop {
            tokio::select! {
                result = conn.read_line() => {
                    let line = result?.ok_or(MmpError::Disconnected)?;

                    match dispatch(&codec::parse(&line)) {
                        Dispatch::Command(cmd) => self.handle_server_command(cmd).await?,
                        Dispatch::Ignored => {}
                        Dispatch::Illegal(command) => {
                            warn!(command = %command, line = %line, "Malformed command from server");
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    self.handle_client_command(&mut conn, cmd).await?;
                }

                _ = self.shutdown.cancelled() => {
                    return Ok(());
                }
            }
        }
    }

    /// Handle one well-formed command from the server.
    async fn handle_server_command(&mut self, cmd: ServerCommand) -> MmpResult<()> {
        match cmd {
            ServerCommand::Msg(text) => {
                self.emit(ClientEvent::Msg(text)).await?;
            }
            ServerCommand::Target(hex_target) => {
                // Only an exactly 32-byte target takes effect.
                match hex::decode(&hex_target).ok().and_then(|b| <[u8; 32]>::try_from(b).ok()) {
                    Some(target) => {
                        debug!(target = %hex_target, "Target updated");
                        self.target = target;
                    }
                    None => {
                        warn!(target = %hex_target, "Ignoring malformed target");
                    }
                }
            }
            ServerCommand::Work { data, mask } => {
                // Anything but an exactly 80-byte prefix is dropped.
                let bytes = match hex::decode(&data)
                    .ok()
                    .and_then(|b| <[u8; DATA_LEN]>::try_from(b).ok())
                {
                    Some(bytes) => bytes,
                    None => {
                        debug!(len = data.len(), "Ignoring malformed work data");
                        return Ok(());
                    }
                };

                let work = WorkUnit {
                    data: bytes,
                    target: self.target,
                    mask,
                };
                self.emit(ClientEvent::Work(work)).await?;

                // A valid work unit means the server is healthy.
                self.backoff.reset();
            }
            ServerCommand::Block(height) => {
                self.emit(ClientEvent::Block(height)).await?;
            }
            ServerCommand::Accepted(hex_payload) => {
                self.handle_verdict(&hex_payload, true);
            }
            ServerCommand::Rejected(hex_payload) => {
                self.handle_verdict(&hex_payload, false);
            }
        }
        Ok(())
    }

    fn handle_verdict(&mut self, hex_payload: &str, accepted: bool) {
        let payload = match hex::decode(hex_payload) {
            Ok(payload) => payload,
            Err(_) => {
                warn!(payload = %hex_payload, "Ignoring verdict with malformed payload");
                return;
            }
        };

        if !self.pending.resolve(&payload, accepted) {
            warn!(payload = %hex_payload, accepted, "Verdict for unknown submission");
        }
    }

    /// Handle one command from the consumer while connected.
    async fn handle_client_command(
        &mut self,
        conn: &mut impl Transport,
        cmd: ClientCommand,
    ) -> MmpResult<()> {
        match cmd {
            ClientCommand::RequestWork => {
                conn.write_line("MORE").await?;
            }
            ClientCommand::SetMeta { name, value } => {
                conn.write_line(&Self::meta_line(&name, &value)).await?;
                self.meta.insert(name, value);
            }
            ClientCommand::SubmitResult { payload, reply } => {
                // The line is resent even when an identical payload is
                // already pending; the registry chains the waiters so one
                // verdict settles all of them.
                let line = format!("RESULT {}", hex::encode(&payload));
                self.pending.add(payload, reply);
                conn.write_line(&line).await?;
            }
        }
        Ok(())
    }
}
