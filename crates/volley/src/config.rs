//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use volley_protocol::{DEFAULT_PROJECTILE_SPEED, Rgb, Vec2};

// ---------------------------------------------------------------------------
// QueuePolicy
// ---------------------------------------------------------------------------

/// How the reader hands lines to the consumer.
///
/// Neither policy drops lines. `Unbounded` never slows the socket read but
/// lets memory grow if decoding falls behind. `Bounded` caps memory by
/// making the reader wait for room, which pushes back on the server
/// through TCP flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    #[default]
    Unbounded,
    Bounded { capacity: usize },
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Client`](crate::Client).
///
/// Every field has a default, so a config file only needs the fields it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or IP address.
    pub host: String,

    /// Server TCP port.
    pub port: u16,

    /// Local player's display name (and identity).
    pub player_name: String,

    /// Local player's color.
    pub player_color: Rgb,

    /// Where the local player appears on `join`.
    pub spawn: Vec2,

    /// Speed given to locally fired projectiles.
    pub projectile_speed: f32,

    /// Queue between the socket reader and the decoder.
    pub queue: QueuePolicy,

    /// Evict remote players not updated for this many seconds.
    /// `None` keeps every player for the whole session. The minimum is 1.
    pub player_ttl_secs: Option<u64>,

    /// Ease remote players toward each new server position by this
    /// fraction per frame instead of snapping. Must be in `(0, 1]`;
    /// `None` snaps.
    pub smoothing: Option<f32>,

    /// Buffer size of the event broadcast. Slow subscribers that fall
    /// further behind than this skip events.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
            player_name: "Player".to_string(),
            player_color: Rgb::BLUE,
            spawn: Vec2::new(400.0, 300.0),
            projectile_speed: DEFAULT_PROJECTILE_SPEED,
            queue: QueuePolicy::Unbounded,
            player_ttl_secs: None,
            smoothing: None,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// The eviction TTL as a `Duration`, if enabled.
    pub fn player_ttl(&self) -> Option<Duration> {
        self.player_ttl_secs.map(Duration::from_secs)
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by [`ClientBuilder::build`](crate::ClientBuilder::build).
    /// Rules:
    /// - a bounded queue has capacity of at least 1;
    /// - `event_capacity` is at least 1;
    /// - a non-finite or non-positive `projectile_speed` falls back to the
    ///   default;
    /// - `player_ttl_secs` of 0 becomes 1;
    /// - a `smoothing` factor outside `(0, 1]` turns smoothing off.
    pub fn validated(mut self) -> Self {
        if let QueuePolicy::Bounded { capacity: 0 } = self.queue {
            tracing::warn!("bounded queue capacity 0, using 1");
            self.queue = QueuePolicy::Bounded { capacity: 1 };
        }
        if self.event_capacity == 0 {
            tracing::warn!("event_capacity 0, using 1");
            self.event_capacity = 1;
        }
        if !(self.projectile_speed.is_finite() && self.projectile_speed > 0.0) {
            tracing::warn!(
                speed = self.projectile_speed,
                "invalid projectile_speed, using default"
            );
            self.projectile_speed = DEFAULT_PROJECTILE_SPEED;
        }
        if self.player_ttl_secs == Some(0) {
            tracing::warn!("player_ttl_secs 0, using 1");
            self.player_ttl_secs = Some(1);
        }
        if let Some(factor) = self.smoothing {
            if !(factor > 0.0 && factor <= 1.0) {
                tracing::warn!(factor, "smoothing factor outside (0, 1], smoothing off");
                self.smoothing = None;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.port, 5555);
        assert_eq!(cfg.spawn, Vec2::new(400.0, 300.0));
        assert_eq!(cfg.projectile_speed, 10.0);
        assert_eq!(cfg.queue, QueuePolicy::Unbounded);
        assert_eq!(cfg.player_ttl(), None);
        assert_eq!(cfg.smoothing, None);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: ClientConfig = serde_json::from_str(
            r#"{"host": "game.example", "player_color": "red",
                "queue": {"bounded": {"capacity": 64}}, "player_ttl_secs": 30}"#,
        )
        .unwrap();
        assert_eq!(cfg.host, "game.example");
        assert_eq!(cfg.port, 5555);
        assert_eq!(cfg.player_color, Rgb::new(255, 0, 0));
        assert_eq!(cfg.queue, QueuePolicy::Bounded { capacity: 64 });
        assert_eq!(cfg.player_ttl(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validated_fixes_out_of_range_values() {
        let cfg = ClientConfig {
            queue: QueuePolicy::Bounded { capacity: 0 },
            event_capacity: 0,
            projectile_speed: f32::NAN,
            player_ttl_secs: Some(0),
            smoothing: Some(1.5),
            ..ClientConfig::default()
        }
        .validated();
        assert_eq!(cfg.player_ttl_secs, Some(1));
        assert_eq!(cfg.smoothing, None);
        assert_eq!(cfg.queue, QueuePolicy::Bounded { capacity: 1 });
        assert_eq!(cfg.event_capacity, 1);
        assert_eq!(cfg.projectile_speed, DEFAULT_PROJECTILE_SPEED);
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let cfg = ClientConfig {
            player_ttl_secs: Some(5),
            smoothing: Some(0.1),
            ..ClientConfig::default()
        }
        .validated();
        assert_eq!(cfg.player_ttl(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.smoothing, Some(0.1));
    }
}
