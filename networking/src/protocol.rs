/// Handshake protocol: chain summaries, range comparison, and the wire
/// shapes exchanged between peers.
use std::collections::HashMap;

use chain::{ChainStore, StorageError};
use consensus::Consensus;
use primitives::{BlockNum, Hash32, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::framing::{RequestType, REQUEST_TYPE_LEN};

/// Summary of the local chain exchanged during a handshake.
///
/// The finalized fields are zero under proof-of-work, which has no finality
/// notion.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandShakeInfo {
    pub genesis_hash: Hash32,
    pub finalized_height: BlockNum,
    pub finalized_hash: Hash32,
    pub end_height: BlockNum,
    pub end_hash: Hash32,
}

/// Height span one peer lacks relative to another. `start_height` is the
/// tip already held; blocks strictly above it up to `end_height` are wanted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocksRange {
    pub start_height: BlockNum,
    pub end_height: BlockNum,
}

impl BlocksRange {
    /// The sub-range starting at `cursor`, holding at most `max` blocks.
    pub fn capped_from(&self, cursor: BlockNum, max: u64) -> BlocksRange {
        BlocksRange {
            start_height: cursor,
            end_height: self.end_height.min(BlockNum(cursor.0 + max)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandShakeRequest {
    pub info: HandShakeInfo,
    /// Populated from the second round trip onward, once the peer has
    /// announced a missing range.
    pub fetch_range: Option<BlocksRange>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandShakeResponse {
    pub missing_range: Option<BlocksRange>,
    /// Encoded block batch for the requested fetch range.
    pub blocks: Option<Vec<u8>>,
    /// Encoded transaction batches keyed by the hash of their block.
    pub txns: Option<HashMap<Hash32, Vec<u8>>>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxnsRequest {
    pub hashes: Vec<Hash32>,
    /// Peer that produced the block these transactions belong to; the
    /// authoritative source for misses.
    pub block_producer: NodeId,
}

/// Build the local chain summary for a handshake.
///
/// Fails when the store has no genesis; a consensus without finality zeroes
/// the finalized fields.
pub fn build_local_info(
    chain: &dyn ChainStore,
    consensus: &dyn Consensus,
) -> Result<HandShakeInfo, StorageError> {
    let genesis = chain.genesis()?;
    let tip = chain.tip()?;
    let (finalized_height, finalized_hash) = if consensus.supports_finality() {
        match chain.finalized()? {
            Some(block) => (block.height(), block.hash()),
            None => (BlockNum(0), Hash32::ZERO),
        }
    } else {
        (BlockNum(0), Hash32::ZERO)
    };
    Ok(HandShakeInfo {
        genesis_hash: genesis.hash(),
        finalized_height,
        finalized_hash,
        end_height: tip.height(),
        end_hash: tip.hash(),
    })
}

impl HandShakeInfo {
    /// What `self` lacks relative to `remote`.
    ///
    /// Peers with differing genesis hashes share no history, so no range
    /// comparison is meaningful. Against a peer with no finality notion the
    /// tip heights decide; against a finality-bearing peer the finalized
    /// heights decide analogously.
    pub fn compare(&self, remote: &HandShakeInfo) -> Result<Option<BlocksRange>, ProtocolError> {
        if self.genesis_hash != remote.genesis_hash {
            return Err(ProtocolError::GenesisMismatch);
        }
        if self.end_height < remote.end_height || self.finalized_height < remote.finalized_height {
            if remote.finalized_height == BlockNum(0) {
                return Ok(Some(BlocksRange {
                    start_height: self.end_height,
                    end_height: remote.end_height,
                }));
            }
            if self.finalized_height < remote.finalized_height {
                return Ok(Some(BlocksRange {
                    start_height: self.end_height,
                    end_height: remote.end_height,
                }));
            }
        }
        Ok(None)
    }
}

/// Prefix a request payload with its decimal type tag.
pub fn encode_request<T: Serialize>(
    kind: RequestType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let mut frame = vec![kind.tag()];
    serde_json::to_writer(&mut frame, payload)?;
    Ok(frame)
}

/// Split a request frame into its type tag and payload.
pub fn split_request(frame: &[u8]) -> Result<(RequestType, &[u8]), ProtocolError> {
    if frame.len() < REQUEST_TYPE_LEN {
        return Err(ProtocolError::MalformedFrame("request shorter than its type tag"));
    }
    let kind = RequestType::from_tag(frame[0])
        .ok_or(ProtocolError::UnknownRequestType(frame[0] as char))?;
    Ok((kind, &frame[REQUEST_TYPE_LEN..]))
}
