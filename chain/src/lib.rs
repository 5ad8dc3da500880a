pub mod chain_struct;
pub mod store;

pub use chain_struct::ChainStruct;
pub use store::{ChainStore, MemoryChain, MemoryTxnStore, StorageError, TxnStore};
