pub mod block;
pub mod transaction;
pub mod types;

pub use block::{decode_blocks, encode_blocks, Block, Header};
pub use transaction::{decode_txns, encode_txns, SignedTxn};
pub use types::{BlockNum, Hash32, NodeId};
