//! Error types for the state layer.

/// Errors returned by [`WorldStore`](crate::WorldStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// No player with this name is in the store.
    #[error("player `{0}` not found")]
    UnknownPlayer(String),
}
