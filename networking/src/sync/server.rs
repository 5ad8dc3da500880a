/// Server side of the sync exchange: one loop per inbound connection.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use primitives::{encode_blocks, encode_txns, Hash32, NodeId, SignedTxn};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tracing::{debug, error};

use crate::error::{ProtocolError, SyncError};
use crate::framing::{read_frame, write_frame, RequestType};
use crate::protocol::{
    build_local_info, split_request, BlocksRange, HandShakeRequest, HandShakeResponse, TxnsRequest,
};

use super::SyncContext;

/// Source of transactions the local store misses.
///
/// Abstracts the dial-the-producer path so the handler can be exercised
/// without a network.
#[async_trait]
pub trait TxnProvider: Send + Sync {
    /// Fetch `hashes` from the given block producer.
    async fn fetch_txns(
        &self,
        producer: &NodeId,
        hashes: Vec<Hash32>,
    ) -> Result<Vec<SignedTxn>, SyncError>;
}

/// Serve one inbound stream until the peer hangs up.
///
/// Request handling errors are logged and the loop keeps serving — one bad
/// frame must not cost the listener the connection — but an error identical
/// to the previous one is not logged again, so a misbehaving peer cannot
/// turn the log into a storm. Transport errors end the loop: the stream is
/// gone.
pub async fn serve_connection<S>(ctx: Arc<SyncContext>, stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut io = BufReader::new(stream);
    let mut last_err: Option<String> = None;
    loop {
        match handle_request(&ctx, &mut io).await {
            Ok(true) => last_err = None,
            Ok(false) => {
                debug!("peer closed the connection");
                return;
            }
            Err(err) => {
                let msg = err.to_string();
                if last_err.as_deref() != Some(msg.as_str()) {
                    error!(error = %msg, "handle request failed");
                    last_err = Some(msg);
                }
                if matches!(err, SyncError::Transport(_)) {
                    return;
                }
            }
        }
    }
}

/// Handle one request; `Ok(false)` means the peer closed the stream.
async fn handle_request<S>(
    ctx: &SyncContext,
    io: &mut BufReader<S>,
) -> Result<bool, SyncError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(frame) = read_frame(io, None).await? else {
        return Ok(false);
    };
    let (kind, payload) = split_request(&frame)?;
    match kind {
        RequestType::Handshake => handle_handshake(ctx, io, payload).await?,
        RequestType::SyncTxns => handle_sync_txns(ctx, io, payload).await?,
    }
    Ok(true)
}

async fn handle_handshake<S>(
    ctx: &SyncContext,
    io: &mut BufReader<S>,
    payload: &[u8],
) -> Result<(), SyncError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req: HandShakeRequest = serde_json::from_slice(payload).map_err(ProtocolError::Codec)?;
    let resp = build_handshake_response(ctx, &req);
    let bytes = serde_json::to_vec(&resp).map_err(ProtocolError::Codec)?;
    write_frame(io.get_mut(), &bytes).await
}

/// Assemble the handshake reply. Any step's failure short-circuits into the
/// response's error field; a partial payload is never sent.
fn build_handshake_response(ctx: &SyncContext, req: &HandShakeRequest) -> HandShakeResponse {
    let mut resp = HandShakeResponse::default();

    if let Some(range) = &req.fetch_range {
        match collect_range_payload(ctx, range) {
            Ok((blocks, txns)) => {
                resp.blocks = Some(blocks);
                resp.txns = Some(txns);
            }
            Err(err) => {
                resp.error = Some(err.to_string());
                return resp;
            }
        }
    }

    let missing = build_local_info(ctx.chain.as_ref(), ctx.consensus.as_ref())
        .map_err(SyncError::Storage)
        .and_then(|local| {
            // The range the *requester* lacks relative to this node.
            req.info.compare(&local).map_err(SyncError::Protocol)
        });
    match missing {
        Ok(missing_range) => {
            if let Some(range) = &missing_range {
                debug!(
                    start = range.start_height.0,
                    end = range.end_height.0,
                    "peer is missing blocks"
                );
            }
            resp.missing_range = missing_range;
        }
        Err(err) => {
            resp = HandShakeResponse {
                error: Some(err.to_string()),
                ..HandShakeResponse::default()
            };
        }
    }
    resp
}

/// Load the requested span and package it: encoded blocks plus, per block,
/// its encoded transactions keyed by block hash.
fn collect_range_payload(
    ctx: &SyncContext,
    range: &BlocksRange,
) -> Result<(Vec<u8>, HashMap<Hash32, Vec<u8>>), SyncError> {
    let blocks = ctx.chain.range_blocks(range.start_height, range.end_height)?;
    let mut txns = HashMap::new();
    for block in &blocks {
        let block_hash = block.hash();
        let batch = ctx.txns.get_block_txns(&block_hash)?;
        txns.insert(
            block_hash,
            encode_txns(&batch).map_err(ProtocolError::Codec)?,
        );
    }
    let blocks_bytes = encode_blocks(&blocks).map_err(ProtocolError::Codec)?;
    Ok((blocks_bytes, txns))
}

async fn handle_sync_txns<S>(
    ctx: &SyncContext,
    io: &mut BufReader<S>,
    payload: &[u8],
) -> Result<(), SyncError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req: TxnsRequest = serde_json::from_slice(payload).map_err(ProtocolError::Codec)?;

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for hash in &req.hashes {
        match ctx.txns.get_txn(hash)? {
            Some(txn) => found.push(txn),
            None => missing.push(*hash),
        }
    }

    // The producer is the authoritative source for its block's
    // transactions; relay the misses unless that producer is us.
    if req.block_producer != ctx.node_id && !missing.is_empty() {
        debug!(
            producer = %req.block_producer,
            misses = missing.len(),
            "forwarding transaction request to block producer"
        );
        let mut relayed = ctx.provider.fetch_txns(&req.block_producer, missing).await?;
        found.append(&mut relayed);
    }

    let bytes = encode_txns(&found).map_err(ProtocolError::Codec)?;
    write_frame(io.get_mut(), &bytes).await
}
