//! sRGB colors with a float alpha.

use std::fmt::Display;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: OrderedFloat<f32>,
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("aqua", (0, 255, 255)),
    ("black", (0, 0, 0)),
    ("blue", (0, 0, 255)),
    ("cyan", (0, 255, 255)),
    ("fuchsia", (255, 0, 255)),
    ("gray", (128, 128, 128)),
    ("green", (0, 128, 0)),
    ("grey", (128, 128, 128)),
    ("lime", (0, 255, 0)),
    ("magenta", (255, 0, 255)),
    ("maroon", (128, 0, 0)),
    ("navy", (0, 0, 128)),
    ("olive", (128, 128, 0)),
    ("orange", (255, 165, 0)),
    ("purple", (128, 0, 128)),
    ("red", (255, 0, 0)),
    ("silver", (192, 192, 192)),
    ("teal", (0, 128, 128)),
    ("white", (255, 255, 255)),
    ("yellow", (255, 255, 0)),
];

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Color {
        Color {
            red,
            green,
            blue,
            alpha: OrderedFloat(1.0),
        }
    }

    pub fn rgba(red: u8, green: u8, blue: u8, alpha: f32) -> Color {
        Color {
            red,
            green,
            blue,
            alpha: OrderedFloat(alpha.clamp(0.0, 1.0)),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha.0
    }

    pub fn opaque(&self) -> Color {
        Color {
            alpha: OrderedFloat(1.0),
            ..*self
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha.0 >= 1.0
    }

    /// A copy with alpha multiplied by `opacity`
    pub fn multiply_alpha(&self, opacity: f64) -> Color {
        Color::rgba(self.red, self.green, self.blue, self.alpha.0 * opacity as f32)
    }

    /// Alpha as a byte, the way CPAL stores it
    pub fn alpha_u8(&self) -> u8 {
        (self.alpha.0 * 255.0).round() as u8
    }

    /// Parse the color syntaxes that appear in restricted SVG.
    ///
    /// Supports `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)`
    /// and the basic CSS named colors.
    pub fn parse(raw: &str) -> Result<Color, Error> {
        let value = raw.trim().to_ascii_lowercase();
        let invalid = || Error::InvalidColor(raw.to_string());

        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(invalid);
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|v| v.strip_suffix(')'))
        {
            let parts: Vec<_> = args
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            let channel = |s: &str| -> Option<u8> {
                match s.strip_suffix('%') {
                    Some(pct) => pct
                        .parse::<f32>()
                        .ok()
                        .map(|v| (v.clamp(0.0, 100.0) * 2.55).round() as u8),
                    None => s.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8),
                }
            };
            return match parts.as_slice() {
                [r, g, b] => Some(Color::rgb(
                    channel(r).ok_or_else(invalid)?,
                    channel(g).ok_or_else(invalid)?,
                    channel(b).ok_or_else(invalid)?,
                )),
                [r, g, b, a] => Some(Color::rgba(
                    channel(r).ok_or_else(invalid)?,
                    channel(g).ok_or_else(invalid)?,
                    channel(b).ok_or_else(invalid)?,
                    a.parse::<f32>().map_err(|_| invalid())?,
                )),
                _ => None,
            }
            .ok_or_else(invalid);
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, (r, g, b))| Color::rgb(*r, *g, *b))
            .ok_or_else(invalid)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
        }
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(
            byte(0)?,
            byte(2)?,
            byte(4)?,
            byte(6)? as f32 / 255.0,
        )),
        _ => None,
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)?;
        if !self.is_opaque() {
            write!(f, "{:02x}", self.alpha_u8())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("#fff", Color::rgb(255, 255, 255))]
    #[case("#FF0000", Color::rgb(255, 0, 0))]
    #[case("  blue ", Color::rgb(0, 0, 255))]
    #[case("rgb(1, 2, 3)", Color::rgb(1, 2, 3))]
    #[case("rgb(100%,0%,0%)", Color::rgb(255, 0, 0))]
    #[case("rgba(10, 20, 30, 0.5)", Color::rgba(10, 20, 30, 0.5))]
    fn parses(#[case] raw: &str, #[case] expected: Color) {
        assert_eq!(expected, Color::parse(raw).unwrap());
    }

    #[rstest]
    #[case("#12")]
    #[case("#gggggg")]
    #[case("rgb(1, 2)")]
    #[case("chartreuse-ish")]
    fn rejects(#[case] raw: &str) {
        assert!(matches!(Color::parse(raw), Err(Error::InvalidColor(..))));
    }

    #[test]
    fn eight_digit_hex_has_alpha() {
        let color = Color::parse("#00ff0080").unwrap();
        assert_eq!(128, color.alpha_u8());
        assert_eq!("#00ff0080", color.to_string());
    }

    #[test]
    fn opaque_displays_without_alpha() {
        assert_eq!("#0a141e", Color::rgba(10, 20, 30, 0.5).opaque().to_string());
    }

    #[test]
    fn multiply_alpha() {
        assert_eq!(
            Color::rgba(0, 0, 0, 0.25),
            Color::rgba(0, 0, 0, 0.5).multiply_alpha(0.5)
        );
    }
}
