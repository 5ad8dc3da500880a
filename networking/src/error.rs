use chain::StorageError;
use thiserror::Error;

/// Failures in the exchange itself: fatal to the current attempt, but the
/// peer (or another one) can be retried by the caller.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("genesis blocks differ between peers")]
    GenesisMismatch,
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    #[error("unknown request type tag {0:?}")]
    UnknownRequestType(char),
    #[error("peer announced a range but returned no blocks")]
    EmptyRangeReply,
    #[error("block at height {0} fails seal verification")]
    InvalidSeal(u64),
    #[error("wire codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Stream I/O failure; reconnect or try the next bootnode at a higher
    /// layer.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
    /// Collaborator storage failure, propagated verbatim.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    /// Error string carried inside a peer's response.
    #[error("remote error: {0}")]
    Remote(String),
}
