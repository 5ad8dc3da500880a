pub mod error;
pub mod framing;
pub mod protocol;
pub mod service;
pub mod sync;
pub mod types;

pub use error::{ProtocolError, SyncError};
pub use service::{DialingTxnProvider, NetworkService, NetworkServiceConfig, PeerTable};
pub use sync::{serve_connection, SyncClient, SyncContext, SyncState, TxnProvider};
