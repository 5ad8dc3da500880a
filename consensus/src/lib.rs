pub mod pow;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use primitives::Header;
use thiserror::Error;

pub use pow::{mine, target_from_bits, validate, PowSeal, ProofOfWork};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    /// The whole nonce space was searched without meeting the target.
    /// Fatal to this mining round; the caller decides whether to retune
    /// difficulty or abort.
    #[error("nonce space exhausted without meeting the target")]
    MiningExhausted,
    #[error("sealing cancelled")]
    Cancelled,
}

/// Cooperative cancellation handle.
///
/// The mining loop checks it between nonce attempts, so a competing block or
/// a shutdown can stop a CPU-bound search without bounding the search itself.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Re-arm the flag for the next mining round.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Consensus capability selected at configuration time.
///
/// Block production and validation go through this trait so a future
/// finality-bearing scheme slots in without type-switching in the sync path.
pub trait Consensus: Send + Sync {
    /// Whether this scheme has a finality notion. Handshake summaries zero
    /// out the finalized fields when it does not.
    fn supports_finality(&self) -> bool;

    /// Fill in the header's seal fields (difficulty and winning nonce).
    fn seal(&self, header: &mut Header) -> Result<(), ConsensusError>;

    /// Check a header's stored seal. Pure and deterministic.
    fn verify(&self, header: &Header) -> bool;
}
