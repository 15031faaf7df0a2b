//! `Client` builder and connection lifecycle.
//!
//! This is the entry point for a game front end. It ties together all the
//! layers: transport → pipeline → protocol → state.
//!
//! ```text
//!  disconnected ──connect()──→ connected ──disconnect()──→ disconnected
//!                                  │
//!                                  └──(server closes / read fails)──→ disconnected
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, broadcast, watch};
use volley_protocol::{Codec, JsonCodec, OutboundIntent, PlayerRecord, ProjectileRecord, Rgb, Vec2};
use volley_state::WorldStore;
use volley_transport::{Connection, TcpConnection, TransportError};

use crate::pipeline::{Pipeline, Sink, SyncEvent};
use crate::{ClientConfig, ClientError, QueuePolicy};

/// One live connection and the tasks serving it.
struct Link {
    conn: Arc<TcpConnection>,
    shutdown: watch::Sender<bool>,
    pipeline: Pipeline,
}

/// Builder for configuring a [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use volley::prelude::*;
///
/// # async fn run() -> Result<(), ClientError> {
/// let client = Client::builder()
///     .server("127.0.0.1", 5555)
///     .player("ann", Rgb::new(255, 0, 0))
///     .build();
/// client.connect().await?;
/// client.join().await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Starts from an existing configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the server host and port.
    pub fn server(mut self, host: &str, port: u16) -> Self {
        self.config.host = host.to_string();
        self.config.port = port;
        self
    }

    /// Sets the local player's name and color.
    pub fn player(mut self, name: &str, color: Rgb) -> Self {
        self.config.player_name = name.to_string();
        self.config.player_color = color;
        self
    }

    /// Sets where the local player appears on join.
    pub fn spawn(mut self, position: Vec2) -> Self {
        self.config.spawn = position;
        self
    }

    /// Sets the speed of locally fired projectiles.
    pub fn projectile_speed(mut self, speed: f32) -> Self {
        self.config.projectile_speed = speed;
        self
    }

    /// Sets the reader → consumer queue policy.
    pub fn queue(mut self, policy: QueuePolicy) -> Self {
        self.config.queue = policy;
        self
    }

    /// Evicts remote players not updated for `secs` seconds.
    pub fn player_ttl_secs(mut self, secs: u64) -> Self {
        self.config.player_ttl_secs = Some(secs);
        self
    }

    /// Eases remote players toward server positions by `factor` per
    /// [`Client::smooth_players`] call instead of snapping.
    pub fn smoothing(mut self, factor: f32) -> Self {
        self.config.smoothing = Some(factor);
        self
    }

    /// Builds a client using [`JsonCodec`].
    pub fn build(self) -> Client<JsonCodec> {
        self.build_with_codec(JsonCodec)
    }

    /// Builds a client with a custom codec.
    pub fn build_with_codec<C: Codec>(self, codec: C) -> Client<C> {
        let config = self.config.validated();
        let (events, _) = broadcast::channel(config.event_capacity);
        let store = match config.smoothing {
            Some(factor) => WorldStore::with_smoothing(factor),
            None => WorldStore::new(),
        };
        Client {
            config,
            codec: Arc::new(codec),
            store: Arc::new(store),
            events,
            connected: Arc::new(AtomicBool::new(false)),
            link: Mutex::new(None),
            connecting: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A session with one game server.
///
/// All methods take `&self`; share the client with `Arc<Client>` to call
/// it from several tasks. The world store outlives connections, so after a
/// disconnect the last known state is still readable.
pub struct Client<C: Codec = JsonCodec> {
    pub(crate) config: ClientConfig,
    pub(crate) codec: Arc<C>,
    pub(crate) store: Arc<WorldStore>,
    events: broadcast::Sender<SyncEvent>,
    connected: Arc<AtomicBool>,
    /// Held only to install or take a link, never across network I/O.
    link: Mutex<Option<Link>>,
    /// Serializes connect attempts.
    connecting: Mutex<()>,
    /// Bumped by `disconnect`; a dial that started in an older epoch is
    /// discarded.
    epoch: AtomicU64,
}

impl Client<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<C: Codec> Client<C> {
    /// Connects to the configured server and starts the ingestion
    /// pipeline.
    ///
    /// Calling this while already connected is a no-op. There is no
    /// automatic retry: on failure the caller decides what to do.
    ///
    /// # Errors
    /// Returns [`ClientError::Connection`] carrying host, port, and cause
    /// if the server is unreachable or refuses.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _attempt = self.connecting.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);

        let stale = {
            let mut link = self.link.lock().await;
            if link.is_some() && self.is_connected() {
                tracing::warn!("connect called while already connected");
                return Ok(());
            }
            link.take()
        };
        // The previous stream ended on its own; reap its tasks first.
        if let Some(stale) = stale {
            teardown(stale).await;
        }

        let host = &self.config.host;
        let port = self.config.port;
        let conn = match TcpConnection::connect(host, port).await {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                tracing::error!(%host, port, error = %e, "connection failed");
                return Err(ClientError::Connection(e));
            }
        };

        let mut link = self.link.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            drop(link);
            tracing::info!(conn_id = %conn.id(), "disconnect requested while connecting");
            let _ = conn.close().await;
            return Err(ClientError::Connection(TransportError::ConnectionClosed(
                "disconnected while connecting".into(),
            )));
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        self.connected.store(true, Ordering::SeqCst);

        let sink = Sink {
            codec: Arc::clone(&self.codec),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            player_ttl: self.config.player_ttl(),
        };
        let pipeline = Pipeline::spawn(
            Arc::clone(&conn),
            self.config.queue,
            sink,
            Arc::clone(&self.connected),
            shutdown_rx,
        );

        tracing::info!(conn_id = %conn.id(), %host, port, "connected");
        *link = Some(Link {
            conn,
            shutdown,
            pipeline,
        });
        Ok(())
    }

    /// Writes one raw line to the server.
    ///
    /// Fails fast while disconnected, including while a
    /// [`connect`](Self::connect) is still in flight.
    ///
    /// # Errors
    /// Returns [`ClientError::SendFailure`] when not connected or when the
    /// write fails. The message is dropped either way.
    pub async fn send(&self, line: &str) -> Result<(), ClientError> {
        let conn = if self.is_connected() {
            self.link.lock().await.as_ref().map(|link| Arc::clone(&link.conn))
        } else {
            None
        };
        let Some(conn) = conn else {
            tracing::warn!("send while disconnected, message dropped");
            return Err(ClientError::SendFailure("not connected".into()));
        };

        conn.send(line).await.map_err(|e| {
            tracing::warn!(conn_id = %conn.id(), error = %e, "send failed, message dropped");
            ClientError::SendFailure(e.to_string())
        })
    }

    /// Encodes and sends one intent.
    pub async fn send_intent(
        &self,
        intent: &OutboundIntent,
    ) -> Result<(), ClientError> {
        let line = self.codec.encode(intent)?;
        self.send(&line).await
    }

    /// Closes the connection and waits for the reader and consumer to stop.
    ///
    /// Safe to call at any time, any number of times. A
    /// [`connect`](Self::connect) still dialing when this is called fails
    /// instead of installing its connection.
    pub async fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let Some(link) = self.link.lock().await.take() else {
            tracing::debug!("disconnect called while not connected");
            return;
        };
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!(conn_id = %link.conn.id(), "disconnecting");
        teardown(link).await;
    }

    /// Whether the connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Subscribes to pipeline events: raw lines, applied updates, and
    /// disconnects.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// The shared world store.
    pub fn store(&self) -> &Arc<WorldStore> {
        &self.store
    }

    /// Snapshot of every known player.
    pub fn players(&self) -> Vec<PlayerRecord> {
        self.store.players()
    }

    /// Snapshot of every known projectile.
    pub fn projectiles(&self) -> Vec<ProjectileRecord> {
        self.store.projectiles()
    }

    /// Advances every projectile by one tick. Call once per frame.
    pub fn advance_projectiles(&self) {
        self.store.advance_projectiles();
    }

    /// Eases remote players one step toward their server positions. Call
    /// once per frame; a no-op unless smoothing is configured.
    pub fn smooth_players(&self) {
        self.store.smooth_players();
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

async fn teardown(link: Link) {
    let _ = link.shutdown.send(true);
    if let Err(e) = link.conn.close().await {
        tracing::debug!(conn_id = %link.conn.id(), error = %e, "close failed");
    }
    link.pipeline.join().await;
}
