//! Log output for binaries built on Volley.
//!
//! Library code only emits `tracing` events; nothing is printed until a
//! binary installs a subscriber.

/// Installs a compact `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`).
///
/// Call once, at the top of `main`. Later calls are ignored.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
