//! Per-player bookkeeping kept next to each record.

use std::time::Instant;

use volley_protocol::{PlayerRecord, Vec2};

/// Where a player record came from.
///
/// ```text
///   Local  ── written by this client (join, movement); never evicted
///   Remote ── written by server updates; evicted by `evict_stale`
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// A player record plus the moment it was last written.
///
/// With smoothing on, `record.position` is what gets drawn and `target`
/// holds the latest server position it is easing toward.
#[derive(Debug, Clone)]
pub(crate) struct PlayerEntry {
    pub(crate) record: PlayerRecord,
    pub(crate) origin: Origin,
    pub(crate) last_seen: Instant,
    pub(crate) target: Option<Vec2>,
}

impl PlayerEntry {
    pub(crate) fn new(record: PlayerRecord, origin: Origin) -> Self {
        Self {
            record,
            origin,
            last_seen: Instant::now(),
            target: None,
        }
    }
}
