//! Outbound encoder: turns local actions into intents on the wire.

use volley_protocol::{Codec, OutboundIntent, PlayerRecord, ProjectileRecord, Vec2};

use crate::{Client, ClientError};

/// Velocity of a shot from `source` toward `target` at `speed`.
///
/// Returns `None` when the two points coincide: there is no direction to
/// fire in, and callers skip the shot.
pub fn aim(source: Vec2, target: Vec2, speed: f32) -> Option<Vec2> {
    (target - source).normalized().map(|dir| dir * speed)
}

impl<C: Codec> Client<C> {
    /// Places the local player at the spawn point and announces it.
    ///
    /// The player is written to the store first, so it is visible even if
    /// the announcement cannot be sent.
    pub async fn join(&self) -> Result<PlayerRecord, ClientError> {
        let record = PlayerRecord::new(
            self.config.player_name.clone(),
            self.config.player_color,
            self.config.spawn,
        );
        self.store.upsert_local_player(record.clone());
        self.send_intent(&OutboundIntent::from(&record)).await?;
        Ok(record)
    }

    /// Moves the local player by `delta` and sends the new position.
    ///
    /// # Errors
    /// [`ClientError::State`] if [`join`](Self::join) has not run yet;
    /// [`ClientError::SendFailure`] if the update could not be sent (the
    /// local move still stands).
    pub async fn move_by(&self, delta: Vec2) -> Result<PlayerRecord, ClientError> {
        let record = self.store.move_player(&self.config.player_name, delta)?;
        self.send_intent(&OutboundIntent::from(&record)).await?;
        Ok(record)
    }

    /// Fires from the local player toward `target`.
    ///
    /// Returns `Ok(false)` without sending anything when `target` is the
    /// player's own position. On a successful send the projectile is also
    /// added to the local store so it shows before the server echoes it.
    pub async fn fire_at(&self, target: Vec2) -> Result<bool, ClientError> {
        let name = &self.config.player_name;
        let source = self
            .store
            .player(name)
            .ok_or_else(|| volley_state::StateError::UnknownPlayer(name.clone()))?
            .position;

        let Some(velocity) = aim(source, target, self.config.projectile_speed) else {
            tracing::debug!(%source, "target equals source, shot skipped");
            return Ok(false);
        };

        let projectile = ProjectileRecord::new(source, velocity);
        self.send_intent(&OutboundIntent::from(&projectile)).await?;
        self.store.append_projectile(projectile);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aim_horizontal() {
        let v = aim(Vec2::new(400.0, 300.0), Vec2::new(500.0, 300.0), 10.0).unwrap();
        assert!((v.x - 10.0).abs() < 1e-5);
        assert!(v.y.abs() < 1e-5);
    }

    #[test]
    fn test_aim_diagonal_has_requested_speed() {
        let v = aim(Vec2::ZERO, Vec2::new(-3.0, 4.0), 10.0).unwrap();
        assert!((v.length() - 10.0).abs() < 1e-4);
        assert!((v.x + 6.0).abs() < 1e-4);
        assert!((v.y - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_aim_at_self_is_skipped() {
        let p = Vec2::new(400.0, 300.0);
        assert_eq!(aim(p, p, 10.0), None);
    }
}
