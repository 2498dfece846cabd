//! Work units and candidate-result validation.
//!
//! A work unit is one 80-byte block-header-prefix assignment plus the
//! 32-byte difficulty target in force when it was issued. The validator
//! decides, before anything reaches the server, whether a candidate nonce
//! from the compute engine is a genuine share: it recomputes the final hash
//! round through the [`FinalRound`](crate::hasher::FinalRound) collaborator
//! and compares the digest against the target word by word.
//!
//! Digests and targets are handled as eight 32-bit little-endian words. The
//! numeric comparison reverses each word's bytes and walks from the most
//! significant compared word down, so it is a standard big-number `<=` over
//! the 28-byte value formed by words 6..0.

use crate::hasher::{FinalRound, ResultBatch};

/// Length of the block-header prefix carried by a WORK command.
pub const DATA_LEN: usize = 80;

/// Length of the padded message handed to the compute engine.
pub const PADDED_LEN: usize = 128;

/// Byte offset of the data-dependent (timestamp) word in the header prefix.
const NTIME_OFFSET: usize = 68;

/// Byte offset of the nonce word in the header prefix.
const NONCE_OFFSET: usize = 76;

/// Default target until the server overrides it with a TARGET command.
///
/// Maximal over the compared words; the top word is zero by construction of
/// the verification step.
pub const DEFAULT_TARGET: [u8; 32] = {
    let mut t = [0xffu8; 32];
    t[28] = 0;
    t[29] = 0;
    t[30] = 0;
    t[31] = 0;
    t
};

/// One work assignment from the server.
///
/// Immutable once created; the compute engine may enumerate many candidate
/// nonces against it. The target is snapshotted at receipt, so a later
/// TARGET command does not retroactively change in-flight work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// 80-byte block header prefix
    pub data: [u8; DATA_LEN],

    /// 32-byte difficulty target in force when the work was issued
    pub target: [u8; 32],

    /// Search-space partition hint from the server
    pub mask: u32,
}

/// Extend the header prefix to the 128-byte padded message the compute
/// engine hashes (length/terminator words in the byte order the engine
/// expects).
pub fn pad_for_hashing(data: &[u8; DATA_LEN]) -> [u8; PADDED_LEN] {
    let mut padded = [0u8; PADDED_LEN];
    padded[..DATA_LEN].copy_from_slice(data);
    padded[DATA_LEN..DATA_LEN + 4].copy_from_slice(&[0x00, 0x00, 0x00, 0x80]);
    padded[PADDED_LEN - 4..].copy_from_slice(&[0x80, 0x02, 0x00, 0x00]);
    padded
}

/// View a 32-byte target as eight little-endian 32-bit words.
pub fn target_words(target: &[u8; 32]) -> [u32; 8] {
    let mut words = [0u32; 8];
    for (i, chunk) in target.chunks_exact(4).enumerate() {
        words[i] = u32::from_le_bytes(chunk.try_into().unwrap());
    }
    words
}

/// Big-number `<=` between a digest and the target, over words 6..0.
///
/// Words are byte-reversed and compared most-significant-first; a tie on a
/// word continues to the next lower word rather than deciding. The top word
/// (index 7) is deliberately not compared: the verification step already
/// requires it to be zero, and the wire target's top word is likewise zero.
pub fn below_or_equal(digest: &[u32; 8], target: &[u32; 8]) -> bool {
    for i in (0..7).rev() {
        let h = digest[i].swap_bytes();
        let t = target[i].swap_bytes();
        if h > t {
            return false;
        }
        if h < t {
            return true;
        }
    }
    true
}

/// Construct the submission payload for a qualifying candidate.
///
/// The original work data with the data-dependent timestamp word and the
/// candidate nonce spliced in at their fixed offsets, little-endian.
pub fn assemble_payload(data: &[u8; DATA_LEN], ntime: u32, nonce: u32) -> [u8; DATA_LEN] {
    let mut payload = *data;
    payload[NTIME_OFFSET..NTIME_OFFSET + 4].copy_from_slice(&ntime.to_le_bytes());
    payload[NONCE_OFFSET..NONCE_OFFSET + 4].copy_from_slice(&nonce.to_le_bytes());
    payload
}

/// Hex tag identifying a found block in operator-facing messages: the
/// digest's leading word, little-endian bytes.
pub fn block_tag(word: u32) -> String {
    hex::encode(word.to_le_bytes())
}

/// Verdict for one candidate nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Recomputation produced a nonzero top word: the engine's claimed
    /// candidate does not verify. Hardware or kernel fault, surfaced to the
    /// operator and not retried.
    HardwareError,

    /// Digest verifies and meets the work unit's target; submit it.
    Share {
        /// Exact submission payload bytes
        payload: [u8; DATA_LEN],
        /// Digest leading word, for tagging the server's verdict
        block_word: u32,
        /// Byte-reversed word 6, reported for throughput accounting
        diff1_word: u32,
    },

    /// Digest verifies and meets difficulty 1 accounting but not the
    /// target, or the work unit is no longer available to build a payload.
    Diff1Only {
        /// Byte-reversed word 6
        diff1_word: u32,
    },
}

/// Evaluate one candidate nonce from a finished batch.
pub fn evaluate(final_round: &dyn FinalRound, batch: &ResultBatch, nonce: u32) -> CandidateOutcome {
    let digest = final_round.finish(&batch.midstate, &batch.data, nonce);

    if digest[7] != 0 {
        return CandidateOutcome::HardwareError;
    }

    let diff1_word = digest[6].swap_bytes();

    if below_or_equal(&digest, &batch.target) {
        if let Some(work) = &batch.work {
            let payload = assemble_payload(&work.data, batch.data[1], nonce);
            return CandidateOutcome::Share {
                payload,
                block_word: digest[6],
                diff1_word,
            };
        }
    }

    CandidateOutcome::Diff1Only { diff1_word }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::ResultBatch;

    /// FinalRound stub returning a fixed digest.
    struct Fixed([u32; 8]);

    impl FinalRound for Fixed {
        fn finish(&self, _midstate: &[u32; 8], _data: &[u32; 3], _nonce: u32) -> [u32; 8] {
            self.0
        }
    }

    fn work() -> WorkUnit {
        WorkUnit {
            data: [0u8; DATA_LEN],
            target: DEFAULT_TARGET,
            mask: 1,
        }
    }

    fn batch(target: [u32; 8], work: Option<WorkUnit>) -> ResultBatch {
        ResultBatch {
            work,
            midstate: [0; 8],
            data: [0, 0x5f5e1000, 0],
            target,
            nonces: vec![1],
        }
    }

    #[test]
    fn default_target_words() {
        let words = target_words(&DEFAULT_TARGET);
        assert!(words[..7].iter().all(|&w| w == 0xffff_ffff));
        assert_eq!(words[7], 0);
    }

    #[test]
    fn target_words_are_little_endian() {
        let mut target = [0u8; 32];
        target[0] = 0x01;
        target[4] = 0x02;
        let words = target_words(&target);
        assert_eq!(words[0], 1);
        assert_eq!(words[1], 2);
    }

    #[test]
    fn maximal_target_accepts_any_digest() {
        let target = [0xffff_ffffu32; 8];
        assert!(below_or_equal(&[0xdead_beef; 8], &target));
        assert!(below_or_equal(&[0; 8], &target));
        assert!(below_or_equal(&[0xffff_ffff; 8], &target));
    }

    #[test]
    fn tie_on_high_words_continues_to_lower_words() {
        // Equal on words 6..1; word 0 decides.
        let mut target = [0x1111_1111u32; 8];
        let mut digest = target;
        digest[7] = 0;

        // 0x02...(reversed) > 0x01...(reversed): reject.
        target[0] = 0x0100_0000;
        digest[0] = 0x0200_0000;
        assert!(!below_or_equal(&digest, &target));

        // Strictly below on word 0: accept.
        digest[0] = 0x0000_0000;
        assert!(below_or_equal(&digest, &target));
    }

    #[test]
    fn exact_equality_is_accepted() {
        let target = [0x2222_2222u32; 8];
        assert!(below_or_equal(&target, &target));
    }

    #[test]
    fn high_word_decides_before_lower_words() {
        let target = [0u32; 8];
        let mut digest = [0u32; 8];
        // Word 6 reversed is larger than target's; lower words being zero
        // must not rescue it.
        digest[6] = 0x0100_0000;
        assert!(!below_or_equal(&digest, &target));
    }

    #[test]
    fn padding_layout() {
        let data = [0xabu8; DATA_LEN];
        let padded = pad_for_hashing(&data);
        assert_eq!(&padded[..DATA_LEN], &data);
        assert_eq!(&padded[80..84], &[0x00, 0x00, 0x00, 0x80]);
        assert!(padded[84..124].iter().all(|&b| b == 0));
        assert_eq!(&padded[124..128], &[0x80, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn payload_splices_ntime_and_nonce() {
        let mut data = [0u8; DATA_LEN];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        let payload = assemble_payload(&data, 0xaabb_ccdd, 0x1122_3344);

        assert_eq!(&payload[..68], &data[..68]);
        assert_eq!(&payload[68..72], &[0xdd, 0xcc, 0xbb, 0xaa]);
        assert_eq!(&payload[72..76], &data[72..76]);
        assert_eq!(&payload[76..80], &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn nonzero_top_word_is_hardware_error() {
        let mut digest = [0u32; 8];
        digest[7] = 1;
        let fr = Fixed(digest);
        let b = batch([0xffff_ffff; 8], Some(work()));
        assert_eq!(evaluate(&fr, &b, 42), CandidateOutcome::HardwareError);
    }

    #[test]
    fn qualifying_candidate_yields_share_payload() {
        let mut digest = [0u32; 8];
        digest[6] = 0x0000_0100;
        let fr = Fixed(digest);
        let b = batch([0xffff_ffff; 8], Some(work()));

        match evaluate(&fr, &b, 42) {
            CandidateOutcome::Share {
                payload,
                block_word,
                diff1_word,
            } => {
                assert_eq!(block_word, 0x0000_0100);
                assert_eq!(diff1_word, 0x0001_0000);
                // ntime word came from batch.data[1], nonce from the call.
                assert_eq!(&payload[68..72], &0x5f5e1000u32.to_le_bytes());
                assert_eq!(&payload[76..80], &42u32.to_le_bytes());
            }
            other => panic!("expected Share, got {:?}", other),
        }
    }

    #[test]
    fn above_target_candidate_reports_diff1_only() {
        let mut digest = [0u32; 8];
        digest[6] = 0x0100_0000; // reversed: 1, above an all-zero target
        let fr = Fixed(digest);
        let b = batch([0u32; 8], Some(work()));
        assert_eq!(
            evaluate(&fr, &b, 42),
            CandidateOutcome::Diff1Only {
                diff1_word: 0x0000_0001
            }
        );
    }

    #[test]
    fn missing_work_unit_downgrades_share_to_accounting() {
        let digest = [0u32; 8];
        let fr = Fixed(digest);
        let b = batch([0xffff_ffff; 8], None);
        assert_eq!(
            evaluate(&fr, &b, 42),
            CandidateOutcome::Diff1Only { diff1_word: 0 }
        );
    }

    #[test]
    fn block_tag_is_little_endian_hex() {
        assert_eq!(block_tag(0x0102_03ff), "ff030201");
    }
}
