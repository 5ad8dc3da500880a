use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use chain::{ChainStore, MemoryChain, MemoryTxnStore, TxnStore};
use clap::Parser;
use consensus::{Consensus, ProofOfWork};
use networking::{DialingTxnProvider, NetworkService, NetworkServiceConfig, PeerTable, SyncContext};
use primitives::{Block, NodeId};
use tokio::task;
use tracing::info;

mod miner;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    address: IpAddr,

    #[arg(short, long, default_value_t = 9670)]
    port: u16,

    /// Bootnode entries (`host:port` or `nodeid@host:port`) or paths to
    /// YAML files listing them.
    #[arg(short, long)]
    bootnodes: Vec<String>,

    /// Proof-of-work difficulty: leading zero bits required of a seal.
    #[arg(long, default_value_t = 20)]
    target_bits: u64,

    /// Produce blocks on top of the local tip.
    #[arg(long)]
    mine: bool,

    /// Seed for a deterministic node identity; random when omitted.
    #[arg(long)]
    node_key_seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let node_id = match args.node_key_seed {
        Some(seed) => NodeId::from_seed(seed),
        None => NodeId::from_seed(rand::random()),
    };
    info!(node_id = %node_id, "node identity ready");

    let chain: Arc<MemoryChain> = Arc::new(MemoryChain::new(Block::genesis(args.target_bits)));
    let txns = Arc::new(MemoryTxnStore::new());
    let pow = Arc::new(ProofOfWork::new(args.target_bits));
    let cancel = pow.cancel_flag();

    let peers = Arc::new(PeerTable::new());
    let ctx = Arc::new(SyncContext {
        node_id,
        chain: chain.clone() as Arc<dyn ChainStore>,
        txns: txns.clone() as Arc<dyn TxnStore>,
        consensus: pow.clone() as Arc<dyn Consensus>,
        provider: Arc::new(DialingTxnProvider::new(peers.clone())),
    });

    let config = NetworkServiceConfig::new(
        SocketAddr::new(args.address, args.port),
        args.bootnodes,
    );
    let mut service = NetworkService::new(config, ctx, peers);
    let service_handle = task::spawn(async move { service.start().await });

    let miner_handle = if args.mine {
        let chain = chain.clone() as Arc<dyn ChainStore>;
        Some(task::spawn(miner::run(chain, pow.clone())))
    } else {
        None
    };

    tokio::select! {
        result = service_handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            cancel.cancel();
            if let Some(handle) = miner_handle {
                let _ = handle.await;
            }
        }
    }

    Ok(())
}
