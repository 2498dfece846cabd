//! Pending-submission registry.
//!
//! The server's ACCEPTED/REJECTED verdicts carry the submitted payload
//! bytes rather than an identifier, so submissions are correlated by exact
//! payload. Duplicate submissions of the same payload chain their waiters
//! onto one entry; a single verdict settles all of them.

use std::collections::HashMap;

use tokio::sync::oneshot;

/// Outstanding submissions awaiting a server verdict, keyed by payload.
#[derive(Debug, Default)]
pub struct PendingResults {
    entries: HashMap<Vec<u8>, Vec<oneshot::Sender<bool>>>,
}

impl PendingResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for a payload's verdict.
    pub fn add(&mut self, payload: Vec<u8>, reply: oneshot::Sender<bool>) {
        self.entries.entry(payload).or_default().push(reply);
    }

    /// Settle every waiter registered for `payload`.
    ///
    /// Returns false if no submission matched, which means the server's
    /// verdict referenced something we never sent (or already settled).
    pub fn resolve(&mut self, payload: &[u8], accepted: bool) -> bool {
        match self.entries.remove(payload) {
            Some(waiters) => {
                for reply in waiters {
                    // A dropped receiver just means the submitter stopped
                    // caring about the verdict.
                    let _ = reply.send(accepted);
                }
                true
            }
            None => false,
        }
    }

    /// Settle everything as rejected. Used on connection loss, when no
    /// verdict will ever arrive for in-flight submissions.
    pub fn purge(&mut self) {
        for (_, waiters) in self.entries.drain() {
            for reply in waiters {
                let _ = reply.send(false);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
