/// Listener and bootstrap service.
///
/// Binds the configured listen address, serves every inbound connection on
/// its own task, dials the configured bootnodes and syncs history from the
/// first that answers. Addresses and identities arrive pre-parsed through
/// the config; nothing here reads ambient process state.
use std::fs::File;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use primitives::{Hash32, NodeId, SignedTxn};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::sync::{client::request_txns, serve_connection, SyncClient, SyncContext, TxnProvider};
use crate::types::ConnectionState;

/// A peer reachable for direct requests. The node id is present only when
/// the configuration supplied one (`id@host:port`); id-less peers cannot be
/// forwarding targets.
#[derive(Debug, Clone)]
pub struct Peer {
    pub node_id: Option<NodeId>,
    pub address: SocketAddr,
    pub state: ConnectionState,
}

/// Known peers and their connection state.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: Mutex<Vec<Peer>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node_id: Option<NodeId>, address: SocketAddr) {
        let mut peers = self.peers.lock();
        if peers.iter().any(|peer| peer.address == address) {
            return;
        }
        peers.push(Peer {
            node_id,
            address,
            state: ConnectionState::Registered,
        });
    }

    pub fn set_state(&self, address: SocketAddr, state: ConnectionState) {
        let mut peers = self.peers.lock();
        if let Some(peer) = peers.iter_mut().find(|peer| peer.address == address) {
            peer.state = state;
        }
    }

    pub fn address_of(&self, node_id: &NodeId) -> Option<SocketAddr> {
        self.peers
            .lock()
            .iter()
            .find(|peer| peer.node_id.as_ref() == Some(node_id))
            .map(|peer| peer.address)
    }

    pub fn connected_count(&self) -> usize {
        self.peers
            .lock()
            .iter()
            .filter(|peer| peer.state == ConnectionState::Connected)
            .count()
    }
}

/// Fetches transactions by dialing the producer recorded in the peer table.
pub struct DialingTxnProvider {
    peers: Arc<PeerTable>,
}

impl DialingTxnProvider {
    pub fn new(peers: Arc<PeerTable>) -> Self {
        DialingTxnProvider { peers }
    }
}

#[async_trait]
impl TxnProvider for DialingTxnProvider {
    async fn fetch_txns(
        &self,
        producer: &NodeId,
        hashes: Vec<Hash32>,
    ) -> Result<Vec<SignedTxn>, SyncError> {
        let Some(address) = self.peers.address_of(producer) else {
            warn!(producer = %producer, "block producer address unknown, nothing to relay");
            return Ok(Vec::new());
        };
        let stream = TcpStream::connect(address).await?;
        request_txns(stream, hashes, producer.clone()).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootnode {
    pub node_id: Option<NodeId>,
    pub address: SocketAddr,
}

fn parse_bootnode_entry(entry: &str) -> Option<Bootnode> {
    let (node_id, addr) = match entry.split_once('@') {
        Some((id, addr)) => (Some(NodeId(id.to_string())), addr),
        None => (None, entry),
    };
    let address = addr.to_socket_addrs().ok()?.next()?;
    Some(Bootnode { node_id, address })
}

fn parse_bootnode_argument(arg: &str) -> Vec<Bootnode> {
    if let Some(bootnode) = parse_bootnode_entry(arg) {
        return vec![bootnode];
    }

    let Ok(file) = File::open(arg) else {
        warn!(
            "value {arg:?} provided as bootnode is not recognized - it is neither a dialable address nor a path to a file containing bootnodes."
        );
        return Vec::new();
    };

    let entries: Vec<String> = match serde_yaml::from_reader(file) {
        Ok(value) => value,
        Err(err) => {
            warn!("failed to read bootnodes from {arg:?}: {err:?}");
            return Vec::new();
        }
    };

    if entries.is_empty() {
        warn!("provided file with bootnodes {arg:?} is empty");
    }

    entries
        .iter()
        .filter_map(|entry| {
            let parsed = parse_bootnode_entry(entry);
            if parsed.is_none() {
                warn!("bootnode {entry:?} doesn't have a valid address to dial");
            }
            parsed
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct NetworkServiceConfig {
    pub listen_address: SocketAddr,
    bootnodes: Vec<Bootnode>,
}

impl NetworkServiceConfig {
    pub fn new(listen_address: SocketAddr, bootnode_args: Vec<String>) -> Self {
        let bootnodes = bootnode_args
            .iter()
            .flat_map(|arg| parse_bootnode_argument(arg))
            .collect();
        NetworkServiceConfig {
            listen_address,
            bootnodes,
        }
    }

    pub fn bootnodes(&self) -> &[Bootnode] {
        &self.bootnodes
    }
}

pub struct NetworkService {
    config: NetworkServiceConfig,
    ctx: Arc<SyncContext>,
    peers: Arc<PeerTable>,
}

impl NetworkService {
    pub fn new(config: NetworkServiceConfig, ctx: Arc<SyncContext>, peers: Arc<PeerTable>) -> Self {
        NetworkService { config, ctx, peers }
    }

    /// Bind, bootstrap, then accept forever. Each inbound connection is
    /// served by its own task; tasks share the stores through `SyncContext`.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        let listener = TcpListener::bind(self.config.listen_address).await?;
        info!(address = %self.config.listen_address, "listening for peers");

        self.bootstrap().await;

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!(peer = %peer_addr, "inbound connection");
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                serve_connection(ctx, stream).await;
            });
        }
    }

    /// Dial every configured bootnode; sync history from the first that
    /// completes an attempt. A failed attempt is retried over the next
    /// bootnode rather than aborting startup.
    async fn bootstrap(&self) {
        let mut synced = false;
        for bootnode in self.config.bootnodes() {
            self.peers
                .register(bootnode.node_id.clone(), bootnode.address);
            let stream = match TcpStream::connect(bootnode.address).await {
                Ok(stream) => {
                    self.peers
                        .set_state(bootnode.address, ConnectionState::Connected);
                    stream
                }
                Err(err) => {
                    warn!(bootnode = %bootnode.address, error = %err, "bootnode dial failed");
                    self.peers
                        .set_state(bootnode.address, ConnectionState::Disconnected);
                    continue;
                }
            };
            if synced {
                continue;
            }
            let mut client = SyncClient::new(self.ctx.clone(), stream);
            match client.sync_history().await {
                Ok(()) => synced = true,
                Err(err) => {
                    warn!(bootnode = %bootnode.address, error = %err, "history sync failed, trying next bootnode");
                }
            }
        }
        info!(
            connected = self.peers.connected_count(),
            synced, "bootstrap finished"
        );
    }
}
