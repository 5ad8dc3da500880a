use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{BlockNum, Hash32};

/// Block header.
///
/// `target_bits` is the advertised proof-of-work difficulty and is part of
/// the sealed preimage; `nonce` is filled in by the consensus engine.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub height: BlockNum,
    pub prev_hash: Hash32,
    pub txn_root: Hash32,
    pub timestamp: u64,
    pub target_bits: u64,
    pub nonce: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub header: Header,
    pub txn_hashes: Vec<Hash32>,
}

impl Block {
    /// The genesis block for a given difficulty.
    ///
    /// Genesis is configuration, not mined: zero parent, zero nonce, fixed
    /// timestamp, so every node configured with the same difficulty agrees
    /// on its hash.
    pub fn genesis(target_bits: u64) -> Self {
        Block {
            header: Header {
                height: BlockNum(0),
                prev_hash: Hash32::ZERO,
                txn_root: Hash32::ZERO,
                timestamp: 0,
                target_bits,
                nonce: 0,
            },
            txn_hashes: Vec::new(),
        }
    }

    /// Content hash identifying this block.
    ///
    /// Computed over the fixed-width header encoding, so it commits to the
    /// winning nonce and the advertised difficulty.
    pub fn hash(&self) -> Hash32 {
        let h = &self.header;
        let mut hasher = Sha256::new();
        hasher.update(h.height.0.to_be_bytes());
        hasher.update(h.prev_hash.as_bytes());
        hasher.update(h.txn_root.as_bytes());
        hasher.update(h.timestamp.to_be_bytes());
        hasher.update(h.target_bits.to_be_bytes());
        hasher.update(h.nonce.to_be_bytes());
        Hash32(hasher.finalize().into())
    }

    pub fn height(&self) -> BlockNum {
        self.header.height
    }

    /// Commitment over the transactions carried by a block.
    pub fn txn_root(txn_hashes: &[Hash32]) -> Hash32 {
        if txn_hashes.is_empty() {
            return Hash32::ZERO;
        }
        let mut hasher = Sha256::new();
        for hash in txn_hashes {
            hasher.update(hash.as_bytes());
        }
        Hash32(hasher.finalize().into())
    }
}

/// Encode a batch of blocks for transport.
pub fn encode_blocks(blocks: &[Block]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(blocks)
}

/// Decode a batch of blocks received from a peer.
pub fn decode_blocks(bytes: &[u8]) -> Result<Vec<Block>, serde_json::Error> {
    serde_json::from_slice(bytes)
}
