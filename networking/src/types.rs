use serde::Serialize;

/// Peer connection lifecycle.
///
/// Tracked per peer-table entry; a peer is a forwarding candidate only while
/// connected or freshly registered.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No active connection to this peer.
    Disconnected,
    /// Known address, not dialed yet.
    Registered,
    /// Transport established, can exchange protocol messages.
    Connected,
}
