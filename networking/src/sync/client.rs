/// Client side of the sync exchange.
///
/// Shakes hands with a peer, then fetches whatever history the peer reports
/// missing. Announced ranges are closed in capped sub-ranges, re-deriving
/// the remaining gap from the last applied height, so an arbitrarily large
/// gap never hinges on one oversized round trip.
use std::io;
use std::sync::Arc;

use primitives::{decode_blocks, decode_txns, Hash32, NodeId, SignedTxn};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, SyncError};
use crate::framing::{read_frame, write_frame, RequestType};
use crate::protocol::{
    build_local_info, encode_request, BlocksRange, HandShakeRequest, HandShakeResponse,
    TxnsRequest,
};

use super::config::{MAX_BLOCKS_PER_FETCH, READ_TIMEOUT};
use super::states::SyncState;
use super::SyncContext;

pub struct SyncClient<S> {
    ctx: Arc<SyncContext>,
    io: BufReader<S>,
    state: SyncState,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SyncClient<S> {
    pub fn new(ctx: Arc<SyncContext>, stream: S) -> Self {
        SyncClient {
            ctx,
            io: BufReader::new(stream),
            state: SyncState::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Run one sync attempt against the connected peer.
    ///
    /// Any transport, decode, or response-carried error fails the whole
    /// attempt; the caller decides whether to retry over another peer. The
    /// client is reentrant: a finished instance can sync again after the
    /// peer has grown.
    pub async fn sync_history(&mut self) -> Result<(), SyncError> {
        info!("starting history sync");
        self.transition(SyncState::AwaitingHandshake);
        let mut resp = self.request_blocks(None).await?;
        loop {
            if let Some(err) = resp.error.take() {
                return Err(SyncError::Remote(err));
            }
            let Some(range) = resp.missing_range.take() else {
                break;
            };
            // The peer computed this range from our info as of the previous
            // request; blocks applied since may have satisfied it already.
            if self.ctx.chain.height()? >= range.end_height {
                break;
            }
            self.transition(SyncState::RangeAnnounced);
            resp = self.fetch_range(range).await?;
        }
        self.transition(SyncState::Done);
        info!(height = self.ctx.chain.height()?.0, "history sync complete");
        Ok(())
    }

    /// Close one announced gap and return the final response, whose
    /// recomputed missing range drives any further rounds.
    async fn fetch_range(&mut self, range: BlocksRange) -> Result<HandShakeResponse, SyncError> {
        // Start from whichever is higher: the announced start or what the
        // chain already holds.
        let mut cursor = range.start_height.max(self.ctx.chain.height()?);
        loop {
            let sub = range.capped_from(cursor, MAX_BLOCKS_PER_FETCH);
            self.transition(SyncState::AwaitingRange);
            let mut resp = self.request_blocks(Some(sub)).await?;
            if let Some(err) = resp.error.take() {
                return Err(SyncError::Remote(err));
            }
            let blocks_bytes = resp.blocks.take().ok_or(ProtocolError::EmptyRangeReply)?;
            let blocks = decode_blocks(&blocks_bytes).map_err(ProtocolError::Codec)?;
            if blocks.is_empty() {
                return Err(ProtocolError::EmptyRangeReply.into());
            }

            // The whole batch must decode and carry valid seals before the
            // first append; a bad block never leaves a partial batch behind.
            for block in &blocks {
                if !self.ctx.consensus.verify(&block.header) {
                    return Err(ProtocolError::InvalidSeal(block.height().0).into());
                }
            }
            for block in blocks {
                cursor = block.height();
                self.ctx.chain.append(block)?;
            }
            debug!(
                applied_through = cursor.0,
                target = range.end_height.0,
                "applied fetched blocks"
            );

            if let Some(txns) = resp.txns.take() {
                for (block_hash, bytes) in txns {
                    let batch = decode_txns(&bytes).map_err(ProtocolError::Codec)?;
                    self.ctx.txns.set_txns(block_hash, batch)?;
                }
            }

            if cursor >= range.end_height {
                return Ok(resp);
            }
        }
    }

    async fn request_blocks(
        &mut self,
        fetch_range: Option<BlocksRange>,
    ) -> Result<HandShakeResponse, SyncError> {
        let info = build_local_info(self.ctx.chain.as_ref(), self.ctx.consensus.as_ref())?;
        if let Some(range) = &fetch_range {
            info!(
                start = range.start_height.0,
                end = range.end_height.0,
                "fetching history blocks"
            );
        }
        let frame = encode_request(RequestType::Handshake, &HandShakeRequest { info, fetch_range })?;
        write_frame(self.io.get_mut(), &frame).await?;
        let payload = read_frame(&mut self.io, Some(READ_TIMEOUT))
            .await?
            .ok_or_else(closed_mid_exchange)?;
        let resp = serde_json::from_slice(&payload).map_err(ProtocolError::Codec)?;
        Ok(resp)
    }

    fn transition(&mut self, target: SyncState) {
        if !self.state.can_transition_to(target) {
            warn!(from = ?self.state, to = ?target, "unexpected sync state transition");
        }
        debug!(from = ?self.state, to = ?target, "sync state");
        self.state = target;
    }
}

/// One transaction-sync round trip over `stream`.
///
/// Used both by nodes pulling block transactions they lack and by the
/// forwarding path relaying misses to the block producer.
pub async fn request_txns<S>(
    stream: S,
    hashes: Vec<Hash32>,
    block_producer: NodeId,
) -> Result<Vec<SignedTxn>, SyncError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut io = BufReader::new(stream);
    let frame = encode_request(
        RequestType::SyncTxns,
        &TxnsRequest {
            hashes,
            block_producer,
        },
    )?;
    write_frame(io.get_mut(), &frame).await?;
    let payload = read_frame(&mut io, Some(READ_TIMEOUT))
        .await?
        .ok_or_else(closed_mid_exchange)?;
    Ok(decode_txns(&payload).map_err(ProtocolError::Codec)?)
}

fn closed_mid_exchange() -> SyncError {
    SyncError::Transport(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "peer closed the stream mid-exchange",
    ))
}
