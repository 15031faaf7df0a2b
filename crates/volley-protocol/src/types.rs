//! Core records for Volley's world state and wire format.
//!
//! Everything here is either stored in the client's world mirror
//! ([`PlayerRecord`], [`ProjectileRecord`]), produced by decoding a server
//! line ([`Update`]), or handed to the encoder ([`OutboundIntent`]).

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Deserializer, Serialize};

use crate::Rgb;

/// Movement speed shared by every player, in world units per input step.
pub const PLAYER_SPEED: f32 = 5.0;

/// Default speed given to locally fired projectiles.
pub const DEFAULT_PROJECTILE_SPEED: f32 = 10.0;

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A 2D vector used for positions and velocities.
///
/// On the wire this is `{"X": <f>, "Y": <f>}`. Components may arrive as
/// JSON numbers or numeric strings; anything else, or a non-finite value,
/// fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    #[serde(rename = "X", deserialize_with = "lenient_f32")]
    pub x: f32,
    #[serde(rename = "Y", deserialize_with = "lenient_f32")]
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Linear interpolation: `factor` 0 stays at `self`, 1 lands on
    /// `target`.
    pub fn lerp(self, target: Vec2, factor: f32) -> Vec2 {
        self + (target - self) * factor
    }

    /// Returns the unit vector in the same direction, or `None` for a
    /// zero-length (or non-finite) vector.
    pub fn normalized(self) -> Option<Vec2> {
        let len = self.length();
        if len > f32::EPSILON && len.is_finite() {
            Some(Vec2::new(self.x / len, self.y / len))
        } else {
            None
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Accepts `12.5` as well as `"12.5"`.
fn lenient_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(text) => text.trim().parse::<f64>().map_err(|_| {
            D::Error::custom(format!("`{text}` is not a number"))
        })?,
    };

    let value = value as f32;
    if !value.is_finite() {
        return Err(D::Error::custom("number is not finite"));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One player in the world mirror, keyed by `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    /// Unique display name. Doubles as the player's identity.
    pub name: String,
    pub color: Rgb,
    pub position: Vec2,
    /// Always [`PLAYER_SPEED`]; carried so renderers and input code read
    /// it from the record.
    pub speed: f32,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>, color: Rgb, position: Vec2) -> Self {
        Self {
            name: name.into(),
            color,
            position,
            speed: PLAYER_SPEED,
        }
    }

    /// Eases the position a `factor` fraction of the way toward `target`.
    pub fn smooth_toward(&mut self, target: Vec2, factor: f32) {
        self.position = self.position.lerp(target, factor);
    }
}

/// A projectile in flight. Projectiles have no identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileRecord {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl ProjectileRecord {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    /// Integrates one tick: `position += velocity`.
    pub fn advance(&mut self) {
        self.position += self.velocity;
    }
}

// ---------------------------------------------------------------------------
// Update: decoded server intent
// ---------------------------------------------------------------------------

/// One state change decoded from a server line.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Insert the player or replace the record with the same name.
    UpsertPlayer(PlayerRecord),

    /// Add one projectile to the collection.
    AppendProjectile(ProjectileRecord),

    /// Full sync: discard every known projectile and keep only these.
    ReplaceProjectiles(Vec<ProjectileRecord>),
}

// ---------------------------------------------------------------------------
// OutboundIntent: local action to encode
// ---------------------------------------------------------------------------

/// A local action to be encoded and sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundIntent {
    /// Announce or move the local player.
    Player {
        name: String,
        color: Rgb,
        position: Vec2,
    },

    /// A shot fired by the local player.
    Bullet { position: Vec2, velocity: Vec2 },
}

impl From<&PlayerRecord> for OutboundIntent {
    fn from(record: &PlayerRecord) -> Self {
        OutboundIntent::Player {
            name: record.name.clone(),
            color: record.color,
            position: record.position,
        }
    }
}

impl From<&ProjectileRecord> for OutboundIntent {
    fn from(record: &ProjectileRecord) -> Self {
        OutboundIntent::Bullet {
            position: record.position,
            velocity: record.velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projectile_advance_once_and_twice() {
        let mut p = ProjectileRecord::new(Vec2::ZERO, Vec2::new(2.0, 3.0));
        p.advance();
        assert_eq!(p.position, Vec2::new(2.0, 3.0));
        p.advance();
        assert_eq!(p.position, Vec2::new(4.0, 6.0));
    }

    #[test]
    fn test_normalized_zero_vector_is_none() {
        assert_eq!(Vec2::ZERO.normalized(), None);
        assert_eq!(Vec2::new(f32::NAN, 1.0).normalized(), None);
    }

    #[test]
    fn test_normalized_unit_length() {
        let n = Vec2::new(3.0, 4.0).normalized().unwrap();
        assert!((n.length() - 1.0).abs() < 1e-6);
        assert!((n.x - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_lerp() {
        let a = Vec2::ZERO;
        let b = Vec2::new(10.0, 0.0);
        assert_eq!(a.lerp(b, 0.1), Vec2::new(1.0, 0.0));
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }

    #[test]
    fn test_smooth_toward_converges() {
        let mut p = PlayerRecord::new("ann", Rgb::default(), Vec2::ZERO);
        p.smooth_toward(Vec2::new(10.0, 0.0), 0.1);
        assert_eq!(p.position, Vec2::new(1.0, 0.0));
        p.smooth_toward(Vec2::new(10.0, 0.0), 0.1);
        assert!((p.position.x - 1.9).abs() < 1e-5);
    }

    #[test]
    fn test_player_record_uses_fixed_speed() {
        let p = PlayerRecord::new("ann", Rgb::default(), Vec2::ZERO);
        assert_eq!(p.speed, PLAYER_SPEED);
    }

    #[test]
    fn test_vec2_accepts_numeric_strings() {
        let v: Vec2 = serde_json::from_str(r#"{"X": "1.5", "Y": 2}"#).unwrap();
        assert_eq!(v, Vec2::new(1.5, 2.0));
    }

    #[test]
    fn test_vec2_rejects_garbage() {
        assert!(serde_json::from_str::<Vec2>(r#"{"X": "abc", "Y": 2}"#).is_err());
        assert!(serde_json::from_str::<Vec2>(r#"{"X": true, "Y": 2}"#).is_err());
        assert!(serde_json::from_str::<Vec2>(r#"{"X": 1}"#).is_err());
    }

    #[test]
    fn test_vec2_serializes_pascal_case() {
        let json = serde_json::to_string(&Vec2::new(1.0, 2.5)).unwrap();
        assert_eq!(json, r#"{"X":1.0,"Y":2.5}"#);
    }
}
