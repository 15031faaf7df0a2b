//! The world store: the client's mirror of players and projectiles.
//!
//! The store is written by the ingestion consumer task and read by the
//! presentation loop every frame, so all access goes through one
//! `parking_lot::RwLock`. Readers get owned snapshots and never hold the
//! lock after a call returns.
//!
//! # Lifecycle of a player entry
//!
//! ```text
//! first sighting ──→ upsert (replace in place) ──→ ... ──→ evict_stale()
//!                                                         (remote only)
//! ```
//!
//! # Smoothing
//!
//! A store built with [`WorldStore::with_smoothing`] does not snap remote
//! players to each new server position. It records the position as a
//! target and [`WorldStore::smooth_players`] eases the drawn position
//! toward it once per frame. Local players always move immediately.
//!
//! # Projectile growth
//!
//! Projectiles have no identity and no removal rule. The collection only
//! shrinks when a full-sync update replaces it, so a server that never
//! sends one lets it grow for the whole session.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use volley_protocol::{PlayerRecord, ProjectileRecord, Update, Vec2};

use crate::entry::{Origin, PlayerEntry};
use crate::StateError;

#[derive(Default)]
struct World {
    players: HashMap<String, PlayerEntry>,
    projectiles: Vec<ProjectileRecord>,
}

/// Distance below which a smoothed player lands on its target.
const SNAP_DISTANCE: f32 = 0.01;

/// Thread-safe store of every known player and projectile.
///
/// Share it with `Arc<WorldStore>`; every method takes `&self`.
#[derive(Default)]
pub struct WorldStore {
    world: RwLock<World>,
    smoothing: Option<f32>,
}

impl WorldStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that eases remote players toward server
    /// positions by `factor` per [`smooth_players`](Self::smooth_players)
    /// call.
    pub fn with_smoothing(factor: f32) -> Self {
        Self {
            smoothing: Some(factor),
            ..Self::default()
        }
    }

    // -- Players --

    /// Inserts a player reported by the server, or replaces the record with
    /// the same name.
    ///
    /// A record that was created locally keeps its local origin, so the
    /// server echoing our own player never makes it evictable.
    pub fn upsert_player(&self, record: PlayerRecord) {
        self.upsert(record, Origin::Remote);
    }

    /// Inserts or replaces the local player. Local entries are never
    /// evicted.
    pub fn upsert_local_player(&self, record: PlayerRecord) {
        self.upsert(record, Origin::Local);
    }

    fn upsert(&self, record: PlayerRecord, origin: Origin) {
        let mut world = self.world.write();
        match world.players.get_mut(&record.name) {
            Some(entry) => {
                if origin == Origin::Local {
                    entry.origin = Origin::Local;
                }
                let shown = entry.record.position;
                let eased = self.smoothing.is_some() && entry.origin == Origin::Remote;
                entry.target = eased.then_some(record.position);
                entry.record = record;
                if eased {
                    entry.record.position = shown;
                }
                entry.last_seen = Instant::now();
            }
            None => {
                tracing::debug!(player = %record.name, ?origin, "new player");
                world
                    .players
                    .insert(record.name.clone(), PlayerEntry::new(record, origin));
            }
        }
    }

    /// Moves an existing player by `delta` and returns the updated record.
    ///
    /// # Errors
    /// Returns [`StateError::UnknownPlayer`] if no player has that name.
    pub fn move_player(
        &self,
        name: &str,
        delta: Vec2,
    ) -> Result<PlayerRecord, StateError> {
        let mut world = self.world.write();
        let entry = world
            .players
            .get_mut(name)
            .ok_or_else(|| StateError::UnknownPlayer(name.to_string()))?;
        entry.record.position += delta;
        entry.last_seen = Instant::now();
        Ok(entry.record.clone())
    }

    /// Returns a copy of one player's record.
    pub fn player(&self, name: &str) -> Option<PlayerRecord> {
        self.world
            .read()
            .players
            .get(name)
            .map(|entry| entry.record.clone())
    }

    /// The latest server position of a player, which differs from the
    /// drawn position while smoothing is catching up.
    pub fn server_position(&self, name: &str) -> Option<Vec2> {
        self.world
            .read()
            .players
            .get(name)
            .map(|entry| entry.target.unwrap_or(entry.record.position))
    }

    /// Eases every smoothed player one step toward its server position.
    /// Call once per frame. Does nothing unless the store was built with
    /// [`with_smoothing`](Self::with_smoothing).
    pub fn smooth_players(&self) {
        let Some(factor) = self.smoothing else {
            return;
        };
        for entry in self.world.write().players.values_mut() {
            let Some(target) = entry.target else {
                continue;
            };
            entry.record.smooth_toward(target, factor);
            if (target - entry.record.position).length() < SNAP_DISTANCE {
                entry.record.position = target;
                entry.target = None;
            }
        }
    }

    /// Whether a player was written locally or by the server.
    pub fn origin(&self, name: &str) -> Option<Origin> {
        self.world.read().players.get(name).map(|entry| entry.origin)
    }

    /// Snapshot of every player, sorted by name.
    pub fn players(&self) -> Vec<PlayerRecord> {
        let mut players: Vec<PlayerRecord> = self
            .world
            .read()
            .players
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        players
    }

    pub fn player_count(&self) -> usize {
        self.world.read().players.len()
    }

    /// Removes remote players not written within `ttl`.
    ///
    /// Returns the names that were evicted.
    pub fn evict_stale(&self, ttl: Duration) -> Vec<String> {
        self.evict_stale_at(Instant::now(), ttl)
    }

    fn evict_stale_at(&self, now: Instant, ttl: Duration) -> Vec<String> {
        let mut world = self.world.write();
        let mut evicted = Vec::new();

        world.players.retain(|name, entry| {
            let stale = entry.origin == Origin::Remote
                && now.saturating_duration_since(entry.last_seen) > ttl;
            if stale {
                evicted.push(name.clone());
            }
            !stale
        });

        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), ?evicted, "evicted stale players");
        }
        evicted
    }

    // -- Projectiles --

    /// Appends one projectile. Order is insertion order.
    pub fn append_projectile(&self, record: ProjectileRecord) {
        self.world.write().projectiles.push(record);
    }

    /// Replaces the whole projectile collection in one step.
    ///
    /// Anything not in `records` is gone afterwards, including projectiles
    /// fired locally that the server has not acknowledged yet.
    pub fn replace_all_projectiles(&self, records: Vec<ProjectileRecord>) {
        let mut world = self.world.write();
        let dropped = world.projectiles.len();
        world.projectiles = records;
        tracing::trace!(dropped, kept = world.projectiles.len(), "projectiles replaced");
    }

    /// Snapshot of every projectile in insertion order.
    pub fn projectiles(&self) -> Vec<ProjectileRecord> {
        self.world.read().projectiles.clone()
    }

    pub fn projectile_count(&self) -> usize {
        self.world.read().projectiles.len()
    }

    /// Moves every projectile by its velocity once. Call once per tick.
    pub fn advance_projectiles(&self) {
        for projectile in self.world.write().projectiles.iter_mut() {
            projectile.advance();
        }
    }

    // -- Decoded updates --

    /// Applies one decoded server update.
    pub fn apply(&self, update: Update) {
        match update {
            Update::UpsertPlayer(record) => self.upsert_player(record),
            Update::AppendProjectile(record) => self.append_projectile(record),
            Update::ReplaceProjectiles(records) => {
                self.replace_all_projectiles(records)
            }
        }
    }
}
