//! Compute engine seam.
//!
//! The session does not know how hashing is performed. It hands 128-byte
//! padded assignments to a [`Hasher`] and later drains finished
//! [`ResultBatch`]es from the [`HasherBridge`], a single-lock mailbox the
//! engine writes from its own threads. Candidate verification needs one
//! more hash round recomputed on the CPU, which is the [`FinalRound`]
//! trait.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::work::{WorkUnit, PADDED_LEN};

/// One assignment delivered to the compute engine.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// The work unit the assignment was built from
    pub work: WorkUnit,

    /// Padded message the engine hashes while enumerating nonces
    pub padded: [u8; PADDED_LEN],
}

/// A batch of candidate nonces reported by the engine.
///
/// Carries everything needed to verify the candidates without consulting
/// session state: the midstate and data words to recompute the final round,
/// and the target in force for the originating work. `work` is `None` when
/// the originating work unit was retired before the batch drained; such
/// candidates still count toward throughput but cannot be submitted.
#[derive(Debug, Clone)]
pub struct ResultBatch {
    pub work: Option<WorkUnit>,

    /// Hash state after the first 64 bytes of the header prefix
    pub midstate: [u32; 8],

    /// The three little-endian header words between the midstate boundary
    /// and the nonce (bytes 64..76); `data[1]` is the timestamp word
    pub data: [u32; 3],

    /// Target words for the originating work, per `work::target_words`
    pub target: [u32; 8],

    /// Candidate nonces claimed by the engine
    pub nonces: Vec<u32>,
}

/// A compute engine that accepts work assignments.
pub trait Hasher: Send + Sync {
    fn assign(&self, assignment: Assignment);
}

/// Recomputes the final hash round for one candidate nonce.
pub trait FinalRound: Send + Sync {
    fn finish(&self, midstate: &[u32; 8], data: &[u32; 3], nonce: u32) -> [u32; 8];
}

#[derive(Debug, Default)]
struct BridgeState {
    results: VecDeque<ResultBatch>,
    work_requested: bool,
    hashrate: Option<u64>,
}

/// Everything the session picks up on one polling tick.
#[derive(Debug, Default)]
pub struct Drained {
    /// Finished batches, oldest first
    pub batches: Vec<ResultBatch>,

    /// The engine asked for (more) work since the last drain
    pub work_requested: bool,

    /// Latest hashrate report in hashes per second, if any arrived
    pub hashrate: Option<u64>,
}

/// Mailbox between engine threads and the session task.
///
/// All fields live behind one mutex so a drain observes a consistent
/// snapshot; the engine side never blocks for longer than the copy.
#[derive(Debug, Default)]
pub struct HasherBridge {
    state: Mutex<BridgeState>,
}

impl HasherBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine side: ask the session to fetch another work unit. Idempotent
    /// between drains.
    pub fn request_work(&self) {
        self.state.lock().unwrap().work_requested = true;
    }

    /// Engine side: deliver a finished batch of candidates.
    pub fn push_results(&self, batch: ResultBatch) {
        self.state.lock().unwrap().results.push_back(batch);
    }

    /// Engine side: report measured throughput in hashes per second.
    pub fn report_hashrate(&self, rate: u64) {
        self.state.lock().unwrap().hashrate = Some(rate);
    }

    /// Session side: take all pending batches and flags in one lock
    /// acquisition.
    pub fn drain(&self) -> Drained {
        let mut state = self.state.lock().unwrap();
        Drained {
            batches: state.results.drain(..).collect(),
            work_requested: std::mem::take(&mut state.work_requested),
            hashrate: state.hashrate.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::DEFAULT_TARGET;

    fn batch() -> ResultBatch {
        ResultBatch {
            work: None,
            midstate: [0; 8],
            data: [0; 3],
            target: crate::work::target_words(&DEFAULT_TARGET),
            nonces: vec![7],
        }
    }

    #[test]
    fn drain_empties_the_mailbox() {
        let bridge = HasherBridge::new();
        bridge.push_results(batch());
        bridge.push_results(batch());
        bridge.request_work();
        bridge.report_hashrate(1_000_000);

        let drained = bridge.drain();
        assert_eq!(drained.batches.len(), 2);
        assert!(drained.work_requested);
        assert_eq!(drained.hashrate, Some(1_000_000));

        let again = bridge.drain();
        assert!(again.batches.is_empty());
        assert!(!again.work_requested);
        assert_eq!(again.hashrate, None);
    }

    #[test]
    fn work_request_is_idempotent_between_drains() {
        let bridge = HasherBridge::new();
        bridge.request_work();
        bridge.request_work();
        assert!(bridge.drain().work_requested);
        assert!(!bridge.drain().work_requested);
    }

    #[test]
    fn later_hashrate_report_wins() {
        let bridge = HasherBridge::new();
        bridge.report_hashrate(100);
        bridge.report_hashrate(200);
        assert_eq!(bridge.drain().hashrate, Some(200));
    }
}
