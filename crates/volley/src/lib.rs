//! # Volley
//!
//! Client-side network sync core for real-time multiplayer sessions.
//!
//! A [`Client`] keeps one TCP connection to an authoritative server,
//! mirrors the server's players and projectiles into a shared
//! [`WorldStore`](volley_state::WorldStore), and sends local movement and
//! shots back. Front ends talk to it through three surfaces:
//!
//! - [`Client::subscribe`]: every raw line and applied update.
//! - [`Client::join`], [`Client::move_by`], [`Client::fire_at`],
//!   [`Client::send`]: outbound actions.
//! - [`Client::players`], [`Client::projectiles`]: per-frame snapshots.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use volley::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let client = Client::builder().server("127.0.0.1", 5555).build();
//! client.connect().await?;
//! client.join().await?;
//!
//! // Once per frame:
//! client.advance_projectiles();
//! for player in client.players() {
//!     // draw player.name at player.position ...
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod outbound;
mod pipeline;
pub mod telemetry;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, QueuePolicy};
pub use error::ClientError;
pub use outbound::aim;
pub use pipeline::SyncEvent;
pub use telemetry::init_tracing;

pub mod prelude {
    pub use crate::{
        Client, ClientBuilder, ClientConfig, ClientError, QueuePolicy,
        SyncEvent,
    };
    pub use volley_protocol::{
        Codec, JsonCodec, OutboundIntent, PlayerRecord, ProjectileRecord,
        Rgb, Update, Vec2,
    };
    pub use volley_state::WorldStore;
    pub use volley_transport::TransportError;
}
