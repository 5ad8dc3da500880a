/// Block production worker.
///
/// Mining is CPU-bound and synchronous, so each round runs on a blocking
/// thread and never stalls request handling. The engine's cancel flag is
/// checked between nonce attempts; a shutdown (or a competing block) stops
/// the round instead of letting it run to completion.
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chain::ChainStore;
use consensus::{Consensus, ConsensusError, ProofOfWork};
use primitives::{Block, Hash32, Header};
use tokio::task;
use tracing::{debug, info, warn};

pub async fn run(chain: Arc<dyn ChainStore>, pow: Arc<ProofOfWork>) {
    loop {
        let tip = match chain.tip() {
            Ok(tip) => tip,
            Err(err) => {
                warn!(error = %err, "cannot read tip, stopping miner");
                return;
            }
        };

        let header = Header {
            height: tip.height().next(),
            prev_hash: tip.hash(),
            txn_root: Hash32::ZERO,
            timestamp: unix_now(),
            target_bits: pow.target_bits(),
            nonce: 0,
        };

        let engine = pow.clone();
        let sealed = task::spawn_blocking(move || {
            let mut header = header;
            engine.seal(&mut header).map(|_| header)
        })
        .await;

        let header = match sealed {
            Ok(Ok(header)) => header,
            Ok(Err(ConsensusError::Cancelled)) => {
                info!("mining cancelled");
                return;
            }
            Ok(Err(err)) => {
                warn!(error = %err, "mining round failed");
                return;
            }
            Err(err) => {
                warn!(error = %err, "mining worker panicked");
                return;
            }
        };

        // The tip may have moved while this round ran; a stale candidate
        // no longer extends the canonical chain.
        match chain.tip() {
            Ok(current) if current.hash() == header.prev_hash => {
                info!(height = header.height.0, nonce = header.nonce, "mined block");
                let block = Block {
                    header,
                    txn_hashes: Vec::new(),
                };
                if let Err(err) = chain.append(block) {
                    warn!(error = %err, "appending mined block failed");
                    return;
                }
            }
            Ok(_) => debug!(height = header.height.0, "discarding stale candidate"),
            Err(err) => {
                warn!(error = %err, "cannot re-read tip, stopping miner");
                return;
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
