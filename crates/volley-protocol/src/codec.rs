//! Codec trait and the JSON line codec.
//!
//! A server line is one JSON object whose values are independently keyed
//! entries:
//!
//! ```text
//! { "p1": { "Type": "player", "UserName": "ann", "Color": "Red",
//!           "Position": { "X": 10, "Y": 20 } },
//!   "b7": { "Type": "bullet", "Position": { "X": 1, "Y": 2 },
//!           "Velocity": { "X": 3, "Y": 4 } } }
//! ```
//!
//! Key names carry no meaning. Each entry is decoded on its own from its
//! own slice of the line, so one malformed entry (even one with a number
//! `serde_json` cannot represent) is reported and skipped while its
//! siblings still apply. Entries apply in wire order.
//! An entry of type `sync` turns the line into a full sync: the bullets in
//! it replace the whole projectile collection instead of being appended.
//!
//! Outbound intents use the same keyed envelope, one entry per line.

use crate::{OutboundIntent, ProtocolError, Update};

/// The result of decoding one line.
///
/// `updates` holds everything that decoded cleanly; `rejected` holds one
/// error per skipped entry (or a single line-level error).
#[derive(Debug, Default)]
pub struct Decoded {
    pub updates: Vec<Update>,
    pub rejected: Vec<ProtocolError>,
}

impl Decoded {
    /// A line that failed as a whole.
    pub fn rejected(err: ProtocolError) -> Self {
        Self {
            updates: Vec::new(),
            rejected: vec![err],
        }
    }

    /// True when the line produced neither updates nor errors.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.rejected.is_empty()
    }
}

/// Converts between wire lines and typed updates/intents.
///
/// `decode` is infallible by signature: every failure is reported inside
/// [`Decoded::rejected`], never by aborting the line.
pub trait Codec: Send + Sync + 'static {
    /// Decodes one inbound line into zero or more updates.
    fn decode(&self, line: &str) -> Decoded;

    /// Encodes one outbound intent as a single line, without the trailing
    /// newline.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode(&self, intent: &OutboundIntent) -> Result<String, ProtocolError>;
}

/// Strips leading byte-order marks and surrounding whitespace.
pub fn strip_preamble(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == '\u{feff}' || c.is_whitespace())
        .trim_end()
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

#[cfg(feature = "json")]
pub use json::JsonCodec;

#[cfg(feature = "json")]
mod json {
    use std::collections::BTreeMap;
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize};
    use serde_json::value::RawValue;
    use serde_json::{Map, Value};

    use super::{Codec, Decoded, strip_preamble};
    use crate::{
        OutboundIntent, PlayerRecord, ProjectileRecord, ProtocolError, Rgb,
        Update, Vec2,
    };

    /// A [`Codec`] for newline-delimited JSON (via `serde_json`).
    ///
    /// ```rust
    /// use volley_protocol::{Codec, JsonCodec, Update, Vec2};
    ///
    /// let line = r#"{"a": {"Type": "bullet",
    ///                      "Position": {"X": 0, "Y": 0},
    ///                      "Velocity": {"X": 2, "Y": 3}}}"#;
    /// let decoded = JsonCodec.decode(line);
    /// assert!(decoded.rejected.is_empty());
    /// match &decoded.updates[..] {
    ///     [Update::AppendProjectile(p)] => assert_eq!(p.velocity, Vec2::new(2.0, 3.0)),
    ///     other => panic!("unexpected: {other:?}"),
    /// }
    /// ```
    #[derive(Debug, Clone, Copy, Default)]
    pub struct JsonCodec;

    /// Entry shape selected by the `Type` discriminator.
    enum EntryKind {
        Player,
        Bullet,
        Sync,
    }

    impl EntryKind {
        fn from_tag(tag: &str) -> Option<Self> {
            if tag.eq_ignore_ascii_case("player") {
                Some(Self::Player)
            } else if tag.eq_ignore_ascii_case("bullet") {
                Some(Self::Bullet)
            } else if tag.eq_ignore_ascii_case("sync") {
                Some(Self::Sync)
            } else {
                None
            }
        }
    }

    /// A decoded entry before it is folded into the line's updates.
    enum Entry {
        Player(PlayerRecord),
        Bullet(ProjectileRecord),
        Sync,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct PlayerPayload {
        user_name: Option<String>,
        color: Option<Value>,
        position: Option<Vec2>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct BulletPayload {
        position: Option<Vec2>,
        velocity: Option<Vec2>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct PlayerWire<'a> {
        r#type: &'static str,
        user_name: &'a str,
        color: Rgb,
        position: Vec2,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct BulletWire {
        r#type: &'static str,
        position: Vec2,
        velocity: Vec2,
    }

    /// Top-level entries of one line, in wire order, each still unparsed.
    ///
    /// Duplicate keys are kept: a later entry with the same key is applied
    /// after the earlier one.
    struct RawEntries(Vec<(String, Box<RawValue>)>);

    impl<'de> Deserialize<'de> for RawEntries {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct EntriesVisitor;

            impl<'de> Visitor<'de> for EntriesVisitor {
                type Value = RawEntries;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a JSON object of keyed entries")
                }

                fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawEntries, A::Error> {
                    let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(2));
                    while let Some(entry) = map.next_entry::<String, Box<RawValue>>()? {
                        entries.push(entry);
                    }
                    Ok(RawEntries(entries))
                }
            }

            deserializer.deserialize_map(EntriesVisitor)
        }
    }

    /// Envelope key for outbound bullets.
    const BULLET_KEY: &str = "bullet";

    impl Codec for JsonCodec {
        fn decode(&self, line: &str) -> Decoded {
            let text = strip_preamble(line);
            if text.is_empty() {
                tracing::debug!("empty line, nothing to decode");
                return Decoded::default();
            }

            if !text.starts_with('{') {
                // Still report malformed JSON as such.
                return match serde_json::from_str::<&RawValue>(text) {
                    Ok(_) => Decoded::rejected(ProtocolError::NotAnObject),
                    Err(e) => Decoded::rejected(ProtocolError::Decode(e)),
                };
            }
            // Only the envelope is parsed here; entry bodies are checked
            // for syntax but their numbers are not converted yet.
            let RawEntries(entries) = match serde_json::from_str(text) {
                Ok(entries) => entries,
                Err(e) => return Decoded::rejected(ProtocolError::Decode(e)),
            };

            let mut decoded = Decoded::default();
            let mut bullets = Vec::new();
            let mut full_sync = false;

            for (key, raw) in entries {
                let entry = serde_json::from_str::<Value>(raw.get())
                    .map_err(|e| ProtocolError::Field {
                        key: key.clone(),
                        reason: e.to_string(),
                    })
                    .and_then(|value| decode_entry(&key, value));
                match entry {
                    Ok(Entry::Player(player)) => {
                        decoded.updates.push(Update::UpsertPlayer(player));
                    }
                    Ok(Entry::Bullet(bullet)) => bullets.push(bullet),
                    Ok(Entry::Sync) => full_sync = true,
                    Err(e) => decoded.rejected.push(e),
                }
            }

            if full_sync {
                decoded.updates.push(Update::ReplaceProjectiles(bullets));
            } else {
                decoded
                    .updates
                    .extend(bullets.into_iter().map(Update::AppendProjectile));
            }
            decoded
        }

        fn encode(
            &self,
            intent: &OutboundIntent,
        ) -> Result<String, ProtocolError> {
            match intent {
                OutboundIntent::Player {
                    name,
                    color,
                    position,
                } => {
                    let entry = PlayerWire {
                        r#type: "player",
                        user_name: name,
                        color: *color,
                        position: *position,
                    };
                    envelope(name, &entry)
                }
                OutboundIntent::Bullet { position, velocity } => {
                    let entry = BulletWire {
                        r#type: "bullet",
                        position: *position,
                        velocity: *velocity,
                    };
                    envelope(BULLET_KEY, &entry)
                }
            }
        }
    }

    fn envelope<T: Serialize>(
        key: &str,
        entry: &T,
    ) -> Result<String, ProtocolError> {
        let mut wrapper = BTreeMap::new();
        wrapper.insert(key, entry);
        serde_json::to_string(&wrapper).map_err(ProtocolError::Encode)
    }

    fn decode_entry(key: &str, value: Value) -> Result<Entry, ProtocolError> {
        let Value::Object(fields) = value else {
            return Err(ProtocolError::Field {
                key: key.to_string(),
                reason: "entry is not an object".into(),
            });
        };

        let tag = match fields.get("Type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => {
                return Err(ProtocolError::Field {
                    key: key.to_string(),
                    reason: format!("`Type` must be a string, got {other}"),
                });
            }
            None => {
                return Err(ProtocolError::MissingField {
                    key: key.to_string(),
                    field: "Type",
                });
            }
        };

        let kind = EntryKind::from_tag(&tag).ok_or_else(|| {
            ProtocolError::UnknownType {
                key: key.to_string(),
                tag,
            }
        })?;

        match kind {
            EntryKind::Player => decode_player(key, fields).map(Entry::Player),
            EntryKind::Bullet => decode_bullet(key, fields).map(Entry::Bullet),
            EntryKind::Sync => Ok(Entry::Sync),
        }
    }

    fn decode_player(
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<PlayerRecord, ProtocolError> {
        let payload: PlayerPayload = parse_fields(key, fields)?;

        let name = payload
            .user_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| missing(key, "UserName"))?;
        let position = payload.position.ok_or_else(|| missing(key, "Position"))?;
        let color = resolve_color(key, &name, payload.color);

        Ok(PlayerRecord::new(name, color, position))
    }

    fn decode_bullet(
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<ProjectileRecord, ProtocolError> {
        let payload: BulletPayload = parse_fields(key, fields)?;

        let position = payload.position.ok_or_else(|| missing(key, "Position"))?;
        let velocity = payload.velocity.ok_or_else(|| missing(key, "Velocity"))?;

        Ok(ProjectileRecord::new(position, velocity))
    }

    fn parse_fields<T: serde::de::DeserializeOwned>(
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<T, ProtocolError> {
        serde_json::from_value(Value::Object(fields)).map_err(|e| {
            ProtocolError::Field {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn missing(key: &str, field: &'static str) -> ProtocolError {
        ProtocolError::MissingField {
            key: key.to_string(),
            field,
        }
    }

    /// Absent, non-string, or unparseable colors fall back to the default.
    fn resolve_color(key: &str, name: &str, raw: Option<Value>) -> Rgb {
        match raw {
            None | Some(Value::Null) => Rgb::default(),
            Some(Value::String(text)) => text.parse().unwrap_or_else(|e| {
                tracing::warn!(key, player = name, error = %e, "using default color");
                Rgb::default()
            }),
            Some(other) => {
                tracing::warn!(key, player = name, value = %other, "color is not a string, using default");
                Rgb::default()
            }
        }
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{PlayerRecord, ProjectileRecord, Rgb, Vec2};

    fn decode(line: &str) -> Decoded {
        JsonCodec.decode(line)
    }

    #[test]
    fn test_decode_single_player() {
        let d = decode(
            r##"{"x": {"Type": "player", "UserName": "ann", "Color": "#FF0000",
                       "Position": {"X": 10.5, "Y": 20}}}"##,
        );
        assert!(d.rejected.is_empty());
        assert_eq!(
            d.updates,
            vec![Update::UpsertPlayer(PlayerRecord::new(
                "ann",
                Rgb::new(255, 0, 0),
                Vec2::new(10.5, 20.0),
            ))]
        );
    }

    #[test]
    fn test_decode_single_bullet() {
        let d = decode(
            r#"{"b": {"Type": "bullet", "Position": {"X": 1, "Y": 2},
                      "Velocity": {"X": 3, "Y": 4}}}"#,
        );
        assert!(d.rejected.is_empty());
        assert_eq!(
            d.updates,
            vec![Update::AppendProjectile(ProjectileRecord::new(
                Vec2::new(1.0, 2.0),
                Vec2::new(3.0, 4.0),
            ))]
        );
    }

    #[test]
    fn test_decode_type_is_case_insensitive() {
        let d = decode(
            r#"{"k": {"Type": "Player", "UserName": "bo", "Position": {"X": 0, "Y": 0}}}"#,
        );
        assert_eq!(d.updates.len(), 1);
    }

    #[test]
    fn test_decode_strips_bom_and_whitespace() {
        let d = decode(
            "\u{feff}  {\"k\": {\"Type\": \"bullet\", \"Position\": {\"X\": 0, \"Y\": 0}, \"Velocity\": {\"X\": 1, \"Y\": 1}}}  \r",
        );
        assert!(d.rejected.is_empty());
        assert_eq!(d.updates.len(), 1);
    }

    #[test]
    fn test_decode_empty_line_is_nothing() {
        assert!(decode("").is_empty());
        assert!(decode("   \u{feff} ").is_empty());
    }

    #[test]
    fn test_decode_malformed_json_rejects_line() {
        let d = decode(r#"{"k": {"Type": "player""#);
        assert!(d.updates.is_empty());
        assert!(matches!(d.rejected[..], [ProtocolError::Decode(_)]));
    }

    #[test]
    fn test_decode_non_object_rejects_line() {
        let d = decode("[1, 2, 3]");
        assert!(matches!(d.rejected[..], [ProtocolError::NotAnObject]));
    }

    #[test]
    fn test_decode_keeps_good_entry_next_to_bad_one() {
        let d = decode(
            r#"{"good": {"Type": "player", "UserName": "ann", "Position": {"X": 1, "Y": 2}},
                "bad":  {"Type": "player", "UserName": "bob", "Position": {"X": "oops", "Y": 2}}}"#,
        );
        assert_eq!(d.updates.len(), 1);
        match &d.updates[0] {
            Update::UpsertPlayer(p) => assert_eq!(p.name, "ann"),
            other => panic!("unexpected update {other:?}"),
        }
        assert_eq!(d.rejected.len(), 1);
        assert!(matches!(&d.rejected[0], ProtocolError::Field { key, .. } if key == "bad"));
    }

    #[test]
    fn test_decode_out_of_range_number_skips_only_its_entry() {
        let d = decode(
            r#"{"good": {"Type": "player", "UserName": "ann", "Position": {"X": 1, "Y": 2}},
                "bad":  {"Type": "bullet", "Position": {"X": 1e999, "Y": 0}, "Velocity": {"X": 1, "Y": 0}}}"#,
        );
        assert_eq!(d.updates.len(), 1);
        assert!(matches!(&d.updates[0], Update::UpsertPlayer(p) if p.name == "ann"));
        assert_eq!(d.rejected.len(), 1);
        assert!(matches!(&d.rejected[0], ProtocolError::Field { key, .. } if key == "bad"));
    }

    #[test]
    fn test_decode_applies_entries_in_wire_order() {
        let d = decode(
            r#"{"z": {"Type": "player", "UserName": "ann", "Position": {"X": 1, "Y": 1}},
                "a": {"Type": "player", "UserName": "ann", "Position": {"X": 9, "Y": 9}},
                "a": {"Type": "player", "UserName": "bo",  "Position": {"X": 0, "Y": 0}}}"#,
        );
        assert!(d.rejected.is_empty());
        let seen: Vec<(String, Vec2)> = d
            .updates
            .iter()
            .map(|u| match u {
                Update::UpsertPlayer(p) => (p.name.clone(), p.position),
                other => panic!("unexpected update {other:?}"),
            })
            .collect();
        assert_eq!(
            seen,
            vec![
                ("ann".to_string(), Vec2::new(1.0, 1.0)),
                ("ann".to_string(), Vec2::new(9.0, 9.0)),
                ("bo".to_string(), Vec2::ZERO),
            ]
        );
    }

    #[test]
    fn test_decode_unknown_and_missing_type_are_skipped() {
        let d = decode(
            r#"{"a": {"Type": "asteroid"},
                "b": {"UserName": "nobody"},
                "c": {"Type": "bullet", "Position": {"X": 0, "Y": 0}, "Velocity": {"X": 1, "Y": 0}}}"#,
        );
        assert_eq!(d.updates.len(), 1);
        assert_eq!(d.rejected.len(), 2);
        assert!(d.rejected.iter().any(|e| matches!(
            e,
            ProtocolError::UnknownType { tag, .. } if tag == "asteroid"
        )));
        assert!(d.rejected.iter().any(|e| matches!(
            e,
            ProtocolError::MissingField { field: "Type", .. }
        )));
    }

    #[test]
    fn test_decode_missing_required_fields() {
        let d = decode(
            r#"{"a": {"Type": "player", "Position": {"X": 0, "Y": 0}},
                "b": {"Type": "player", "UserName": "ann"},
                "c": {"Type": "bullet", "Position": {"X": 0, "Y": 0}}}"#,
        );
        assert!(d.updates.is_empty());
        let fields: Vec<_> = d
            .rejected
            .iter()
            .filter_map(|e| match e {
                ProtocolError::MissingField { field, .. } => Some(*field),
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec!["UserName", "Position", "Velocity"]);
    }

    #[test]
    fn test_decode_bad_or_missing_color_uses_default() {
        let d = decode(
            r#"{"a": {"Type": "player", "UserName": "ann", "Color": "plaid", "Position": {"X": 0, "Y": 0}},
                "b": {"Type": "player", "UserName": "bob", "Position": {"X": 0, "Y": 0}},
                "c": {"Type": "player", "UserName": "cy", "Color": 7, "Position": {"X": 0, "Y": 0}}}"#,
        );
        assert!(d.rejected.is_empty());
        assert_eq!(d.updates.len(), 3);
        for update in &d.updates {
            match update {
                Update::UpsertPlayer(p) => assert_eq!(p.color, Rgb::default()),
                other => panic!("unexpected update {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_sync_marker_replaces_projectiles() {
        let d = decode(
            r#"{"s":  {"Type": "sync"},
                "b1": {"Type": "bullet", "Position": {"X": 0, "Y": 0}, "Velocity": {"X": 1, "Y": 0}},
                "b2": {"Type": "bullet", "Position": {"X": 5, "Y": 5}, "Velocity": {"X": 0, "Y": 1}}}"#,
        );
        assert!(d.rejected.is_empty());
        match &d.updates[..] {
            [Update::ReplaceProjectiles(all)] => assert_eq!(all.len(), 2),
            other => panic!("unexpected updates {other:?}"),
        }
    }

    #[test]
    fn test_decode_sync_without_bullets_clears() {
        let d = decode(r#"{"s": {"Type": "SYNC"}}"#);
        assert!(matches!(&d.updates[..], [Update::ReplaceProjectiles(all)] if all.is_empty()));
    }

    #[test]
    fn test_encode_player_uses_keyed_envelope() {
        let line = JsonCodec
            .encode(&OutboundIntent::Player {
                name: "ann".into(),
                color: Rgb::new(0x12, 0xAB, 0xFF),
                position: Vec2::new(400.0, 300.0),
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        let entry = &value["ann"];
        assert_eq!(entry["Type"], "player");
        assert_eq!(entry["UserName"], "ann");
        assert_eq!(entry["Color"], "#12ABFF");
        assert_eq!(entry["Position"]["X"], 400.0);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_encoded_intents_decode_back() {
        let bullet = OutboundIntent::Bullet {
            position: Vec2::new(1.0, 2.0),
            velocity: Vec2::new(10.0, 0.0),
        };
        let line = JsonCodec.encode(&bullet).unwrap();
        let d = JsonCodec.decode(&line);
        assert_eq!(
            d.updates,
            vec![Update::AppendProjectile(ProjectileRecord::new(
                Vec2::new(1.0, 2.0),
                Vec2::new(10.0, 0.0),
            ))]
        );
    }
}
