//! Headless Volley client.
//!
//! Connects, joins, and keeps the local world in sync without drawing
//! anything. With `--wander` it also walks in a circle and shoots at the
//! nearest other player, which is handy for exercising a server.
//!
//! ```text
//! RUST_LOG=debug cargo run -p headless-client -- --name bot --color orange --wander
//! ```

use std::time::Duration;

use clap::Parser;
use volley::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,

    /// Server port [default: 5555]
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Player name [default: Player]
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Player color: a name like "red" or a hex code like "#FF8800"
    #[arg(short = 'c', long)]
    color: Option<String>,

    /// JSON config file; command-line flags override it
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Frame interval in milliseconds
    #[arg(long, default_value = "12")]
    tick_ms: u64,

    /// Ease remote players toward server positions by this fraction per frame
    #[arg(long)]
    smoothing: Option<f32>,

    /// Walk around and shoot at other players
    #[arg(long)]
    wander: bool,
}

fn load_config(args: &Args) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ClientConfig::default(),
    };
    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(name) = &args.name {
        config.player_name.clone_from(name);
    }
    if let Some(factor) = args.smoothing {
        config.smoothing = Some(factor);
    }
    if let Some(color) = &args.color {
        config.player_color = color.parse()?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    volley::init_tracing();

    let args = Args::parse();
    let config = load_config(&args)?;
    let client = Client::builder().config(config).build();

    client.connect().await?;
    let me = client.join().await?;
    tracing::info!(name = %me.name, color = %me.color, position = %me.position, "joined");

    let mut events = client.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SyncEvent::Message(raw)) => tracing::trace!(%raw, "line"),
                Ok(SyncEvent::Update(update)) => tracing::debug!(?update, "applied"),
                Ok(SyncEvent::Disconnected) => {
                    tracing::info!("server went away");
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event subscriber lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut frame = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("ctrl-c received");
                break;
            }
            _ = frame.tick() => {
                client.advance_projectiles();
                client.smooth_players();
                frames += 1;

                if !client.is_connected() {
                    break;
                }
                if args.wander {
                    wander(&client, frames).await;
                }
                if frames % 500 == 0 {
                    tracing::info!(
                        players = client.players().len(),
                        projectiles = client.projectiles().len(),
                        "world"
                    );
                }
            }
        }
    }

    client.disconnect().await;
    Ok(())
}

/// One frame of bot behavior: a step along a circle, and every 50 frames a
/// shot at the closest other player.
async fn wander(client: &Client, frame: u64) {
    let angle = frame as f32 * 0.05;
    let step = Vec2::new(angle.cos(), angle.sin()) * 2.0;
    let me = match client.move_by(step).await {
        Ok(me) => me,
        Err(e) => {
            tracing::warn!(error = %e, "move failed");
            return;
        }
    };

    if frame % 50 != 0 {
        return;
    }
    let target = client
        .players()
        .into_iter()
        .filter(|p| p.name != me.name)
        .min_by(|a, b| {
            let da = (a.position - me.position).length();
            let db = (b.position - me.position).length();
            da.total_cmp(&db)
        });
    if let Some(target) = target {
        match client.fire_at(target.position).await {
            Ok(true) => tracing::debug!(target = %target.name, "fired"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "fire failed"),
        }
    }
}
