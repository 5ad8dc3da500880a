pub mod client;
/// Block and transaction synchronization over newline-framed streams.
///
/// The exchange is half-duplex request/response: exactly one outstanding
/// request per stream, each response matching the immediately preceding
/// request. It includes:
///
/// - **Client**: drives the handshake, then fetches an announced missing
///   range in capped sub-ranges until the gap closes.
/// - **Server**: one loop per inbound connection, dispatching on the
///   request-type tag to handshake or transaction-sync handling.
/// - **States**: the client-side state machine
///   (`Start -> AwaitingHandshake -> (RangeAnnounced -> AwaitingRange)* -> Done`).
pub mod config;
pub mod server;
pub mod states;

use std::sync::Arc;

use chain::{ChainStore, TxnStore};
use consensus::Consensus;
use primitives::NodeId;

pub use client::{request_txns, SyncClient};
pub use config::*;
pub use server::{serve_connection, TxnProvider};
pub use states::SyncState;

/// Everything a sync task needs from the node, injected at construction.
pub struct SyncContext {
    pub node_id: NodeId,
    pub chain: Arc<dyn ChainStore>,
    pub txns: Arc<dyn TxnStore>,
    pub consensus: Arc<dyn Consensus>,
    pub provider: Arc<dyn TxnProvider>,
}

#[cfg(test)]
mod tests;
