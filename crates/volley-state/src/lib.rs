//! World state for Volley.
//!
//! [`WorldStore`] is the client's mirror of the match: a map of players
//! keyed by name and an ordered list of projectiles. The ingestion
//! pipeline writes it; the presentation loop reads snapshots from it.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← applies decoded updates, exposes snapshots
//!     ↕
//! State (this crate)  ← thread-safe player/projectile mirror
//!     ↕
//! Protocol (below)  ← provides PlayerRecord, ProjectileRecord, Update
//! ```

mod entry;
mod error;
mod store;

pub use entry::Origin;
pub use error::StateError;
pub use store::WorldStore;
