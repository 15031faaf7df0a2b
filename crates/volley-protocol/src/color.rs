//! Player colors: named colors and `#RRGGBB` hex on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An RGB color. Serializes as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Players without a usable color are drawn blue.
impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLUE
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// The color string was neither a known name nor valid hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized color `{0}`")]
pub struct ParseColorError(pub String);

impl FromStr for Rgb {
    type Err = ParseColorError;

    /// Accepts `#RRGGBB`, `#RGB` (the `#` is optional) and the names in
    /// [`NAMED_COLORS`], case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let err = || ParseColorError(s.to_string());

        if let Some(rgb) = lookup_name(text) {
            return Ok(rgb);
        }

        let hex = text.strip_prefix('#').unwrap_or(text);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        match hex.len() {
            6 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err())
                };
                Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
            }
            3 => {
                // "#F80" expands to "#FF8800".
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| err())
                };
                Ok(Rgb::new(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => Err(err()),
        }
    }
}

/// Color names understood on the wire.
pub const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("black", Rgb::new(0, 0, 0)),
    ("white", Rgb::new(255, 255, 255)),
    ("red", Rgb::new(255, 0, 0)),
    ("lime", Rgb::new(0, 255, 0)),
    ("green", Rgb::new(0, 128, 0)),
    ("blue", Rgb::new(0, 0, 255)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("cyan", Rgb::new(0, 255, 255)),
    ("aqua", Rgb::new(0, 255, 255)),
    ("magenta", Rgb::new(255, 0, 255)),
    ("fuchsia", Rgb::new(255, 0, 255)),
    ("silver", Rgb::new(192, 192, 192)),
    ("gray", Rgb::new(128, 128, 128)),
    ("grey", Rgb::new(128, 128, 128)),
    ("maroon", Rgb::new(128, 0, 0)),
    ("olive", Rgb::new(128, 128, 0)),
    ("purple", Rgb::new(128, 0, 128)),
    ("teal", Rgb::new(0, 128, 128)),
    ("navy", Rgb::new(0, 0, 128)),
    ("orange", Rgb::new(255, 165, 0)),
    ("pink", Rgb::new(255, 192, 203)),
    ("brown", Rgb::new(165, 42, 42)),
    ("gold", Rgb::new(255, 215, 0)),
    ("violet", Rgb::new(238, 130, 238)),
    ("indigo", Rgb::new(75, 0, 130)),
    ("crimson", Rgb::new(220, 20, 60)),
    ("coral", Rgb::new(255, 127, 80)),
    ("salmon", Rgb::new(250, 128, 114)),
    ("turquoise", Rgb::new(64, 224, 208)),
    ("darkblue", Rgb::new(0, 0, 139)),
    ("darkgreen", Rgb::new(0, 100, 0)),
    ("darkred", Rgb::new(139, 0, 0)),
    ("lightblue", Rgb::new(173, 216, 230)),
    ("lightgreen", Rgb::new(144, 238, 144)),
];

fn lookup_name(name: &str) -> Option<Rgb> {
    NAMED_COLORS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|&(_, rgb)| rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_hex() {
        assert_eq!("#1A2B3C".parse::<Rgb>().unwrap(), Rgb::new(0x1A, 0x2B, 0x3C));
        assert_eq!("ff0000".parse::<Rgb>().unwrap(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_parse_short_hex() {
        assert_eq!("#F80".parse::<Rgb>().unwrap(), Rgb::new(0xFF, 0x88, 0x00));
    }

    #[test]
    fn test_parse_names_case_insensitive() {
        assert_eq!("Red".parse::<Rgb>().unwrap(), Rgb::new(255, 0, 0));
        assert_eq!("  DARKGREEN ".parse::<Rgb>().unwrap(), Rgb::new(0, 100, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#GGGGGG".parse::<Rgb>().is_err());
        assert!("notacolor".parse::<Rgb>().is_err());
        assert!("".parse::<Rgb>().is_err());
        // Multi-byte input must not panic on slicing.
        assert!("#ééé".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_is_upper_hex() {
        assert_eq!(Rgb::new(10, 171, 255).to_string(), "#0AABFF");
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(json, r##""#010203""##);
        let back: Rgb = serde_json::from_str(r#""orange""#).unwrap();
        assert_eq!(back, Rgb::new(255, 165, 0));
    }

    #[test]
    fn test_default_is_blue() {
        assert_eq!(Rgb::default(), Rgb::BLUE);
    }
}
