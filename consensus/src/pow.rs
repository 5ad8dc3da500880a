/// Proof-of-work puzzle: search a nonce whose seal digest, read as an
/// unsigned big-endian integer, falls below the difficulty target.
use num_bigint::BigUint;
use num_traits::One;
use primitives::{Hash32, Header};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{CancelFlag, Consensus, ConsensusError};

/// Digest width the target is expressed against.
pub const HASH_BITS: u64 = 256;

/// Progress log cadence while mining.
const MINE_LOG_INTERVAL: u64 = 100_000;

/// Difficulty threshold for a bit count: `1 << (256 - target_bits)`.
///
/// # Panics
///
/// Panics when `target_bits` exceeds the digest width.
pub fn target_from_bits(target_bits: u64) -> BigUint {
    assert!(
        target_bits <= HASH_BITS,
        "target bits must not exceed digest width"
    );
    BigUint::one() << (HASH_BITS - target_bits) as usize
}

/// A winning seal: the nonce and the digest it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowSeal {
    pub nonce: u64,
    pub digest: Hash32,
}

/// The sealed preimage commits to the advertised difficulty alongside the
/// header contents, so `target_bits` cannot be forged independently of the
/// comparison target.
fn seal_digest(header: &Header, target_bits: u64, nonce: u64) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(header.prev_hash.as_bytes());
    hasher.update(header.txn_root.as_bytes());
    hasher.update(header.timestamp.to_be_bytes());
    hasher.update(target_bits.to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    Hash32(hasher.finalize().into())
}

fn meets_target(digest: &Hash32, target: &BigUint) -> bool {
    BigUint::from_bytes_be(digest.as_bytes()) < *target
}

/// Search the nonce space from 0 upward until the seal digest meets the
/// target. Unbounded except by the nonce space; `cancel` is checked between
/// attempts so callers can stop a stale round.
pub fn mine(
    header: &Header,
    target: &BigUint,
    target_bits: u64,
    cancel: &CancelFlag,
) -> Result<PowSeal, ConsensusError> {
    mine_from(header, target, target_bits, 0, cancel)
}

pub(crate) fn mine_from(
    header: &Header,
    target: &BigUint,
    target_bits: u64,
    start_nonce: u64,
    cancel: &CancelFlag,
) -> Result<PowSeal, ConsensusError> {
    let mut nonce = start_nonce;
    loop {
        if cancel.is_cancelled() {
            return Err(ConsensusError::Cancelled);
        }
        let digest = seal_digest(header, target_bits, nonce);
        if meets_target(&digest, target) {
            return Ok(PowSeal { nonce, digest });
        }
        if nonce % MINE_LOG_INTERVAL == 0 {
            debug!(nonce, digest = %digest, "mining in progress");
        }
        nonce = match nonce.checked_add(1) {
            Some(next) => next,
            None => return Err(ConsensusError::MiningExhausted),
        };
    }
}

/// Recompute the seal digest with the header's stored nonce and compare it
/// against the target. Pure, deterministic, side-effect free.
pub fn validate(header: &Header, target: &BigUint, target_bits: u64) -> bool {
    meets_target(&seal_digest(header, target_bits, header.nonce), target)
}

/// Proof-of-work consensus configured with a fixed difficulty.
pub struct ProofOfWork {
    target: BigUint,
    target_bits: u64,
    cancel: CancelFlag,
}

impl ProofOfWork {
    pub fn new(target_bits: u64) -> Self {
        ProofOfWork {
            target: target_from_bits(target_bits),
            target_bits,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for cancelling an in-flight seal from another task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn target_bits(&self) -> u64 {
        self.target_bits
    }
}

impl Consensus for ProofOfWork {
    fn supports_finality(&self) -> bool {
        false
    }

    fn seal(&self, header: &mut Header) -> Result<(), ConsensusError> {
        header.target_bits = self.target_bits;
        let seal = mine(header, &self.target, self.target_bits, &self.cancel)?;
        header.nonce = seal.nonce;
        debug!(height = header.height.0, nonce = seal.nonce, digest = %seal.digest, "sealed block");
        Ok(())
    }

    fn verify(&self, header: &Header) -> bool {
        // Genesis is configuration, not mined.
        if header.height.0 == 0 {
            return true;
        }
        header.target_bits == self.target_bits
            && validate(header, &self.target, self.target_bits)
    }
}
