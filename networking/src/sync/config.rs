/// Operational parameters for synchronization.
use std::time::Duration;

/// Maximum blocks fetched per handshake round. Announced ranges larger than
/// this are closed over multiple rounds.
pub const MAX_BLOCKS_PER_FETCH: u64 = 64;

/// Bound on waiting for a response frame; a stalled peer must not suspend
/// the requester indefinitely.
pub const READ_TIMEOUT: Duration = Duration::from_secs(20);
