use std::sync::Arc;

use async_trait::async_trait;
use chain::TxnStore;
use parking_lot::Mutex;
use primitives::{Hash32, NodeId, SignedTxn};

use super::support::{build_chain, test_node_with, EASY_BITS};
use crate::error::SyncError;
use crate::sync::{client::request_txns, serve_connection, TxnProvider};

/// Records every relay and answers from a fixed supply.
struct RecordingProvider {
    requested: Mutex<Vec<(NodeId, Vec<Hash32>)>>,
    supply: Vec<SignedTxn>,
}

impl RecordingProvider {
    fn new(supply: Vec<SignedTxn>) -> Self {
        RecordingProvider {
            requested: Mutex::new(Vec::new()),
            supply,
        }
    }
}

#[async_trait]
impl TxnProvider for RecordingProvider {
    async fn fetch_txns(
        &self,
        producer: &NodeId,
        hashes: Vec<Hash32>,
    ) -> Result<Vec<SignedTxn>, SyncError> {
        self.requested.lock().push((producer.clone(), hashes));
        Ok(self.supply.clone())
    }
}

#[tokio::test]
async fn misses_are_forwarded_to_the_block_producer() {
    let (blocks, txns) = build_chain(1, EASY_BITS);

    let local: Vec<SignedTxn> = vec![
        SignedTxn::new("local-1", "pk", "sig"),
        SignedTxn::new("local-2", "pk", "sig"),
    ];
    let remote: Vec<SignedTxn> = vec![
        SignedTxn::new("remote-1", "pk", "sig"),
        SignedTxn::new("remote-2", "pk", "sig"),
        SignedTxn::new("remote-3", "pk", "sig"),
    ];

    let provider = Arc::new(RecordingProvider::new(remote.clone()));
    let node = test_node_with(&blocks, &txns, 1, EASY_BITS, provider.clone());
    node.txns
        .set_txns(Hash32::digest(b"some-block"), local.clone())
        .unwrap();

    let producer = NodeId::from_seed(99);
    let mut hashes: Vec<Hash32> = local.iter().map(|t| t.txn_hash).collect();
    let missing: Vec<Hash32> = remote.iter().map(|t| t.txn_hash).collect();
    hashes.extend(missing.iter().copied());

    let (client_stream, server_stream) = tokio::io::duplex(1 << 16);
    tokio::spawn(serve_connection(node.ctx.clone(), server_stream));

    let reply = request_txns(client_stream, hashes, producer.clone())
        .await
        .unwrap();
    assert_eq!(reply.len(), 5);

    let requested = provider.requested.lock();
    assert_eq!(requested.len(), 1);
    assert_eq!(requested[0].0, producer);
    assert_eq!(requested[0].1, missing);
}

#[tokio::test]
async fn no_forwarding_when_this_node_is_the_producer() {
    let (blocks, txns) = build_chain(1, EASY_BITS);

    let local = vec![SignedTxn::new("local-1", "pk", "sig")];
    let provider = Arc::new(RecordingProvider::new(Vec::new()));
    let node = test_node_with(&blocks, &txns, 1, EASY_BITS, provider.clone());
    node.txns
        .set_txns(Hash32::digest(b"some-block"), local.clone())
        .unwrap();

    let hashes = vec![local[0].txn_hash, Hash32::digest(b"unknown")];

    let (client_stream, server_stream) = tokio::io::duplex(1 << 16);
    tokio::spawn(serve_connection(node.ctx.clone(), server_stream));

    // The request names this very node as producer: nothing to relay to.
    let reply = request_txns(client_stream, hashes, node.ctx.node_id.clone())
        .await
        .unwrap();
    assert_eq!(reply, local);
    assert!(provider.requested.lock().is_empty());
}

#[tokio::test]
async fn all_hashes_present_locally_skips_the_relay() {
    let (blocks, txns) = build_chain(1, EASY_BITS);

    let local = vec![
        SignedTxn::new("local-1", "pk", "sig"),
        SignedTxn::new("local-2", "pk", "sig"),
    ];
    let provider = Arc::new(RecordingProvider::new(Vec::new()));
    let node = test_node_with(&blocks, &txns, 1, EASY_BITS, provider.clone());
    node.txns
        .set_txns(Hash32::digest(b"some-block"), local.clone())
        .unwrap();

    let hashes: Vec<Hash32> = local.iter().map(|t| t.txn_hash).collect();

    let (client_stream, server_stream) = tokio::io::duplex(1 << 16);
    tokio::spawn(serve_connection(node.ctx.clone(), server_stream));

    let reply = request_txns(client_stream, hashes, NodeId::from_seed(42))
        .await
        .unwrap();
    assert_eq!(reply, local);
    assert!(provider.requested.lock().is_empty());
}
