/// Collaborator seams around the chain and the transaction base.
///
/// The sync path talks to storage only through these traits; the in-memory
/// implementations below serialize concurrent writers with a store-level
/// lock, which is the single-writer discipline the raw `ChainStruct` does
/// not provide for itself.
use std::collections::HashMap;

use parking_lot::RwLock;
use primitives::{Block, BlockNum, Hash32, SignedTxn};
use thiserror::Error;

use crate::chain_struct::ChainStruct;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("chain has no genesis block")]
    MissingGenesis,
    #[error("no blocks in height range ({start}, {end}]")]
    EmptyRange { start: BlockNum, end: BlockNum },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub trait ChainStore: Send + Sync {
    fn genesis(&self) -> Result<Block, StorageError>;

    /// The finalized block, when the configured consensus has a finality
    /// notion. Proof-of-work chains return `None`.
    fn finalized(&self) -> Result<Option<Block>, StorageError>;

    /// Highest-height block known locally.
    fn tip(&self) -> Result<Block, StorageError>;

    /// Blocks with `start < height <= end`, ascending.
    fn range_blocks(&self, start: BlockNum, end: BlockNum) -> Result<Vec<Block>, StorageError>;

    fn append(&self, block: Block) -> Result<(), StorageError>;

    fn height(&self) -> Result<BlockNum, StorageError>;
}

pub trait TxnStore: Send + Sync {
    fn get_txn(&self, hash: &Hash32) -> Result<Option<SignedTxn>, StorageError>;

    /// Transactions recorded for a block, in insertion order.
    fn get_block_txns(&self, block_hash: &Hash32) -> Result<Vec<SignedTxn>, StorageError>;

    fn set_txns(&self, block_hash: Hash32, txns: Vec<SignedTxn>) -> Result<(), StorageError>;
}

/// In-memory chain store over a `ChainStruct`.
pub struct MemoryChain {
    inner: RwLock<ChainStruct>,
}

impl MemoryChain {
    pub fn new(genesis: Block) -> Self {
        MemoryChain {
            inner: RwLock::new(ChainStruct::new(genesis)),
        }
    }

    /// Seed from a pre-sorted finalized history.
    ///
    /// # Panics
    ///
    /// Panics when `blocks` is empty, like `ChainStruct::make_finalized_chain`.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        MemoryChain {
            inner: RwLock::new(ChainStruct::make_finalized_chain(blocks)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }
}

impl ChainStore for MemoryChain {
    fn genesis(&self) -> Result<Block, StorageError> {
        let chain = self.inner.read();
        let first = chain.first();
        if first.height() != BlockNum(0) {
            // History was backfilled from a non-zero height and the true
            // genesis has not arrived yet.
            return Err(StorageError::MissingGenesis);
        }
        Ok(first.clone())
    }

    fn finalized(&self) -> Result<Option<Block>, StorageError> {
        Ok(None)
    }

    fn tip(&self) -> Result<Block, StorageError> {
        Ok(self.inner.read().last().clone())
    }

    fn range_blocks(&self, start: BlockNum, end: BlockNum) -> Result<Vec<Block>, StorageError> {
        let chain = self.inner.read();
        let mut out = Vec::new();
        chain.range(|block| {
            if block.height() > start && block.height() <= end {
                out.push(block.clone());
            }
            Ok::<(), StorageError>(())
        })?;
        if out.is_empty() {
            return Err(StorageError::EmptyRange { start, end });
        }
        Ok(out)
    }

    fn append(&self, block: Block) -> Result<(), StorageError> {
        self.inner.write().append(block);
        Ok(())
    }

    fn height(&self) -> Result<BlockNum, StorageError> {
        Ok(self.inner.read().last().height())
    }
}

#[derive(Default)]
struct TxnIndex {
    by_txn: HashMap<Hash32, SignedTxn>,
    by_block: HashMap<Hash32, Vec<Hash32>>,
}

/// In-memory transaction base with lookups by transaction hash and by the
/// hash of the block that carries them.
#[derive(Default)]
pub struct MemoryTxnStore {
    inner: RwLock<TxnIndex>,
}

impl MemoryTxnStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TxnStore for MemoryTxnStore {
    fn get_txn(&self, hash: &Hash32) -> Result<Option<SignedTxn>, StorageError> {
        Ok(self.inner.read().by_txn.get(hash).cloned())
    }

    fn get_block_txns(&self, block_hash: &Hash32) -> Result<Vec<SignedTxn>, StorageError> {
        let index = self.inner.read();
        let hashes = match index.by_block.get(block_hash) {
            Some(hashes) => hashes,
            None => return Ok(Vec::new()),
        };
        hashes
            .iter()
            .map(|hash| {
                index.by_txn.get(hash).cloned().ok_or_else(|| {
                    StorageError::Backend(format!("txn {hash} indexed but not stored"))
                })
            })
            .collect()
    }

    fn set_txns(&self, block_hash: Hash32, txns: Vec<SignedTxn>) -> Result<(), StorageError> {
        let mut index = self.inner.write();
        let hashes = txns.iter().map(|txn| txn.txn_hash).collect();
        for txn in txns {
            index.by_txn.insert(txn.txn_hash, txn);
        }
        index.by_block.insert(block_hash, hashes);
        Ok(())
    }
}
