//! Wire protocol for Volley.
//!
//! This crate defines what the client and server exchange:
//!
//! - **Types** ([`PlayerRecord`], [`ProjectileRecord`], [`Update`],
//!   [`OutboundIntent`], [`Vec2`], [`Rgb`]): the records decoded from and
//!   encoded to the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how lines become typed
//!   updates and intents become lines.
//! - **Errors** ([`ProtocolError`]): what can go wrong per line or per
//!   entry.
//!
//! # Architecture
//!
//! ```text
//! Transport (lines) → Protocol (Update) → State (world mirror)
//! ```

mod codec;
mod color;
mod error;
mod types;

pub use codec::{Codec, Decoded, strip_preamble};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use color::{NAMED_COLORS, ParseColorError, Rgb};
pub use error::ProtocolError;
pub use types::{
    DEFAULT_PROJECTILE_SPEED, OutboundIntent, PLAYER_SPEED, PlayerRecord,
    ProjectileRecord, Update, Vec2,
};
