use serde::{Deserialize, Serialize};

use crate::types::Hash32;

/// A signed transaction in transport form.
///
/// The sync core moves transactions between peers without interpreting them;
/// `pubkey` and `signature` are opaque hex payloads verified elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTxn {
    pub txn_hash: Hash32,
    pub pubkey: String,
    pub signature: String,
    pub raw: String,
}

impl SignedTxn {
    /// Build a transport transaction from its raw payload; the hash is the
    /// digest of that payload.
    pub fn new(raw: impl Into<String>, pubkey: impl Into<String>, signature: impl Into<String>) -> Self {
        let raw = raw.into();
        SignedTxn {
            txn_hash: Hash32::digest(raw.as_bytes()),
            pubkey: pubkey.into(),
            signature: signature.into(),
            raw,
        }
    }
}

/// Encode a transaction batch for transport.
pub fn encode_txns(txns: &[SignedTxn]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(txns)
}

/// Decode a transaction batch received from a peer.
pub fn decode_txns(bytes: &[u8]) -> Result<Vec<SignedTxn>, serde_json::Error> {
    serde_json::from_slice(bytes)
}
