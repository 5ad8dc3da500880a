/// Shared fixtures: deterministic mined chains and node contexts wired to
/// in-memory stores.
use std::sync::Arc;

use async_trait::async_trait;
use chain::{ChainStore, MemoryChain, MemoryTxnStore, TxnStore};
use consensus::{Consensus, ProofOfWork};
use primitives::{Block, BlockNum, Hash32, Header, NodeId, SignedTxn};

use crate::error::SyncError;
use crate::sync::{SyncContext, TxnProvider};

/// Low enough that sealing a fixture block takes a few hundred digests.
pub const EASY_BITS: u64 = 8;

/// A mined history: genesis plus `len` sealed blocks, each carrying one
/// transaction.
pub fn build_chain(len: u64, target_bits: u64) -> (Vec<Block>, Vec<Vec<SignedTxn>>) {
    let pow = ProofOfWork::new(target_bits);
    let mut blocks = vec![Block::genesis(target_bits)];
    let mut txns: Vec<Vec<SignedTxn>> = vec![Vec::new()];
    for height in 1..=len {
        let batch = vec![SignedTxn::new(format!("txn-{height}"), "pk", "sig")];
        let hashes: Vec<Hash32> = batch.iter().map(|txn| txn.txn_hash).collect();
        let mut header = Header {
            height: BlockNum(height),
            prev_hash: blocks.last().expect("seeded").hash(),
            txn_root: Block::txn_root(&hashes),
            timestamp: 1_700_000_000 + height,
            target_bits,
            nonce: 0,
        };
        pow.seal(&mut header).expect("fixture difficulty is minable");
        blocks.push(Block {
            header,
            txn_hashes: hashes,
        });
        txns.push(batch);
    }
    (blocks, txns)
}

/// Forwarding stub for paths that never relay.
pub struct NoForward;

#[async_trait]
impl TxnProvider for NoForward {
    async fn fetch_txns(
        &self,
        _producer: &NodeId,
        _hashes: Vec<Hash32>,
    ) -> Result<Vec<SignedTxn>, SyncError> {
        Ok(Vec::new())
    }
}

/// A node context plus concrete store handles for assertions.
pub struct TestNode {
    pub ctx: Arc<SyncContext>,
    pub chain: Arc<MemoryChain>,
    pub txns: Arc<MemoryTxnStore>,
}

pub fn test_node(blocks: &[Block], txns: &[Vec<SignedTxn>], seed: u64) -> TestNode {
    test_node_with(blocks, txns, seed, EASY_BITS, Arc::new(NoForward))
}

pub fn test_node_with(
    blocks: &[Block],
    txns: &[Vec<SignedTxn>],
    seed: u64,
    target_bits: u64,
    provider: Arc<dyn TxnProvider>,
) -> TestNode {
    let chain = Arc::new(MemoryChain::from_blocks(blocks.to_vec()));
    let store = Arc::new(MemoryTxnStore::new());
    for (block, batch) in blocks.iter().zip(txns) {
        store
            .set_txns(block.hash(), batch.clone())
            .expect("in-memory set_txns");
    }
    let ctx = Arc::new(SyncContext {
        node_id: NodeId::from_seed(seed),
        chain: chain.clone() as Arc<dyn ChainStore>,
        txns: store.clone() as Arc<dyn TxnStore>,
        consensus: Arc::new(ProofOfWork::new(target_bits)),
        provider,
    });
    TestNode {
        ctx,
        chain,
        txns: store,
    }
}
