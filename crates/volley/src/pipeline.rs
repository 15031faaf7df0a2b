//! Ingestion pipeline: socket reader → line queue → decoding consumer.
//!
//! Each connection gets two Tokio tasks:
//!   1. The reader loops on `recv()` and pushes every line onto a queue
//!      without waiting for it to be processed.
//!   2. The consumer drains the queue in order, decodes each line, applies
//!      the updates to the world store, and publishes [`SyncEvent`]s.
//!
//! The two tasks share nothing but the queue. Neither loop ever returns an
//! error: failures are logged where they happen and the loop either moves
//! on (bad line) or ends (stream gone).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use volley_protocol::{Codec, Update};
use volley_state::WorldStore;
use volley_transport::{Connection, TcpConnection};

use crate::QueuePolicy;

/// What subscribers see from the ingestion pipeline.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A raw line as received, before decoding.
    Message(Arc<str>),
    /// One update that was decoded and applied to the store.
    Update(Update),
    /// The reader stopped: the server closed the stream, a read failed,
    /// or the client disconnected.
    Disconnected,
}

// ---------------------------------------------------------------------------
// Line queue
// ---------------------------------------------------------------------------

enum LineSender {
    Unbounded(mpsc::UnboundedSender<String>),
    Bounded(mpsc::Sender<String>),
}

impl LineSender {
    /// Fails only when the consumer is gone.
    async fn send(&self, line: String) -> Result<(), ()> {
        match self {
            Self::Unbounded(tx) => tx.send(line).map_err(|_| ()),
            Self::Bounded(tx) => tx.send(line).await.map_err(|_| ()),
        }
    }
}

enum LineReceiver {
    Unbounded(mpsc::UnboundedReceiver<String>),
    Bounded(mpsc::Receiver<String>),
}

impl LineReceiver {
    async fn recv(&mut self) -> Option<String> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }
}

fn line_queue(policy: QueuePolicy) -> (LineSender, LineReceiver) {
    match policy {
        QueuePolicy::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (LineSender::Unbounded(tx), LineReceiver::Unbounded(rx))
        }
        QueuePolicy::Bounded { capacity } => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (LineSender::Bounded(tx), LineReceiver::Bounded(rx))
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything the consumer needs besides the queue.
pub(crate) struct Sink<C: Codec> {
    pub(crate) codec: Arc<C>,
    pub(crate) store: Arc<WorldStore>,
    pub(crate) events: broadcast::Sender<SyncEvent>,
    pub(crate) player_ttl: Option<Duration>,
}

/// Handles to the two tasks serving one connection.
pub(crate) struct Pipeline {
    reader: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl Pipeline {
    /// Starts the reader and consumer for `conn`.
    ///
    /// The reader stops when the stream ends, a read fails, or `shutdown`
    /// flips to `true`. It clears `connected` on the way out. The consumer
    /// finishes whatever is queued and stops once the reader is gone.
    pub(crate) fn spawn<C: Codec>(
        conn: Arc<TcpConnection>,
        policy: QueuePolicy,
        sink: Sink<C>,
        connected: Arc<AtomicBool>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (tx, rx) = line_queue(policy);
        let events = sink.events.clone();
        let reader = tokio::spawn(read_loop(conn, tx, connected, events, shutdown));
        let consumer = tokio::spawn(consume_loop(rx, sink));
        Self { reader, consumer }
    }

    /// Waits for both tasks to finish.
    pub(crate) async fn join(self) {
        if let Err(e) = self.reader.await {
            tracing::error!(error = %e, "reader task failed");
        }
        if let Err(e) = self.consumer.await {
            tracing::error!(error = %e, "consumer task failed");
        }
    }
}

/// Why the reader stopped. Logged once, when the loop exits.
enum StopReason {
    EndOfStream,
    ReadFailed(String),
    Shutdown,
    ConsumerGone,
}

async fn read_loop(
    conn: Arc<TcpConnection>,
    tx: LineSender,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<SyncEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "reader started");

    let reason = loop {
        if *shutdown.borrow() {
            break StopReason::Shutdown;
        }

        let received = tokio::select! {
            // A dropped sender counts as a shutdown request too.
            _ = shutdown.changed() => break StopReason::Shutdown,
            received = conn.recv() => received,
        };

        let line = match received {
            Ok(Some(line)) => line,
            Ok(None) => break StopReason::EndOfStream,
            Err(e) => break StopReason::ReadFailed(e.to_string()),
        };

        let queued = tokio::select! {
            _ = shutdown.changed() => break StopReason::Shutdown,
            queued = tx.send(line) => queued,
        };
        if queued.is_err() {
            break StopReason::ConsumerGone;
        }
    };

    connected.store(false, Ordering::SeqCst);
    drop(tx);

    match reason {
        StopReason::EndOfStream => {
            tracing::info!(%conn_id, "server closed the connection");
        }
        StopReason::ReadFailed(error) => {
            tracing::warn!(%conn_id, %error, "connection lost");
        }
        StopReason::Shutdown => {
            tracing::debug!(%conn_id, "reader stopped on shutdown");
        }
        StopReason::ConsumerGone => {
            tracing::warn!(%conn_id, "consumer exited early, reader stopping");
        }
    }
    let _ = events.send(SyncEvent::Disconnected);
}

async fn consume_loop<C: Codec>(mut rx: LineReceiver, sink: Sink<C>) {
    let mut handled: u64 = 0;
    while let Some(line) = rx.recv().await {
        handle_line(&sink, &line);
        handled += 1;
    }
    tracing::debug!(handled, "consumer drained");
}

/// Decodes and applies one line. Never panics past this point.
fn handle_line<C: Codec>(sink: &Sink<C>, line: &str) {
    let _ = sink.events.send(SyncEvent::Message(Arc::from(line)));

    // A misbehaving codec costs one line, not the consumer.
    let decoded =
        match std::panic::catch_unwind(AssertUnwindSafe(|| sink.codec.decode(line))) {
            Ok(decoded) => decoded,
            Err(_) => {
                tracing::error!(len = line.len(), "codec panicked, line skipped");
                return;
            }
        };

    for err in &decoded.rejected {
        match err.entry_key() {
            Some(key) => tracing::warn!(key, error = %err, "entry skipped"),
            None => tracing::warn!(error = %err, "line skipped"),
        }
    }

    let notify = sink.events.receiver_count() > 0;
    for update in decoded.updates {
        if notify {
            sink.store.apply(update.clone());
            let _ = sink.events.send(SyncEvent::Update(update));
        } else {
            sink.store.apply(update);
        }
    }

    if let Some(ttl) = sink.player_ttl {
        sink.store.evict_stale(ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_protocol::{JsonCodec, OutboundIntent, ProtocolError, Vec2};

    fn sink<C: Codec>(codec: C) -> (Sink<C>, broadcast::Receiver<SyncEvent>) {
        let (events, rx) = broadcast::channel(64);
        let sink = Sink {
            codec: Arc::new(codec),
            store: Arc::new(WorldStore::new()),
            events,
            player_ttl: None,
        };
        (sink, rx)
    }

    const TWO_ENTRY_LINE: &str = r#"{"p": {"Type": "player", "UserName": "ann", "Position": {"X": 10, "Y": 20}},
        "b": {"Type": "bullet", "Position": {"X": 1, "Y": 2}, "Velocity": {"X": 3, "Y": 4}}}"#;

    #[test]
    fn test_handle_line_applies_and_publishes() {
        let (sink, mut rx) = sink(JsonCodec);
        handle_line(&sink, TWO_ENTRY_LINE);

        assert_eq!(sink.store.player_count(), 1);
        assert_eq!(sink.store.projectile_count(), 1);

        assert!(matches!(rx.try_recv().unwrap(), SyncEvent::Message(_)));
        assert!(matches!(rx.try_recv().unwrap(), SyncEvent::Update(Update::UpsertPlayer(_))));
        assert!(matches!(
            rx.try_recv().unwrap(),
            SyncEvent::Update(Update::AppendProjectile(_))
        ));
    }

    #[test]
    fn test_handle_line_survives_garbage() {
        let (sink, _rx) = sink(JsonCodec);
        handle_line(&sink, "not json at all");
        handle_line(&sink, "");
        handle_line(&sink, TWO_ENTRY_LINE);
        assert_eq!(sink.store.player_count(), 1);
    }

    struct PanickyCodec;

    impl Codec for PanickyCodec {
        fn decode(&self, line: &str) -> volley_protocol::Decoded {
            if line == "boom" {
                panic!("codec bug");
            }
            JsonCodec.decode(line)
        }

        fn encode(&self, intent: &OutboundIntent) -> Result<String, ProtocolError> {
            JsonCodec.encode(intent)
        }
    }

    #[test]
    fn test_handle_line_contains_codec_panic() {
        let (sink, _rx) = sink(PanickyCodec);
        handle_line(&sink, "boom");
        handle_line(&sink, TWO_ENTRY_LINE);
        assert_eq!(
            sink.store.player("ann").unwrap().position,
            Vec2::new(10.0, 20.0)
        );
    }

    #[tokio::test]
    async fn test_bounded_queue_preserves_order() {
        let (tx, mut rx) = line_queue(QueuePolicy::Bounded { capacity: 2 });
        let producer = tokio::spawn(async move {
            for i in 0..10 {
                tx.send(format!("line {i}")).await.unwrap();
            }
        });

        for i in 0..10 {
            assert_eq!(rx.recv().await.unwrap(), format!("line {i}"));
        }
        producer.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
