//! Error types for the protocol layer.
//!
//! Decoding never aborts a whole line because of one bad entry, so most
//! of these variants name the entry `key` they were raised for. The codec
//! collects them next to the successfully decoded updates instead of
//! returning early.

/// Errors that can occur while encoding or decoding wire lines.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound intent failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The line is not valid JSON. Nothing in it can be used.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The line is valid JSON but its top level is not an object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// A required field is absent from an entry.
    #[error("entry `{key}` is missing required field `{field}`")]
    MissingField { key: String, field: &'static str },

    /// The entry's `Type` discriminator is not one we understand.
    #[error("entry `{key}` has unknown type `{tag}`")]
    UnknownType { key: String, tag: String },

    /// A field is present but has the wrong shape, e.g. a non-numeric
    /// position.
    #[error("entry `{key}` has a malformed field: {reason}")]
    Field { key: String, reason: String },
}

impl ProtocolError {
    /// The entry key this error belongs to, or `None` for line-level
    /// failures.
    pub fn entry_key(&self) -> Option<&str> {
        match self {
            Self::MissingField { key, .. }
            | Self::UnknownType { key, .. }
            | Self::Field { key, .. } => Some(key),
            _ => None,
        }
    }
}
