//! Font wide settings for a color font build.

use std::{fmt::Display, str::FromStr};

use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The color table(s) to build
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    #[serde(rename = "glyf_colr_0")]
    GlyfColr0,
    #[default]
    #[serde(rename = "glyf_colr_1")]
    GlyfColr1,
    #[serde(rename = "picosvg")]
    Picosvg,
    #[serde(rename = "picosvgz")]
    Picosvgz,
    #[serde(rename = "cbdt")]
    Cbdt,
    #[serde(rename = "sbix")]
    Sbix,
}

impl ColorFormat {
    pub const ALL: [ColorFormat; 6] = [
        ColorFormat::GlyfColr0,
        ColorFormat::GlyfColr1,
        ColorFormat::Picosvg,
        ColorFormat::Picosvgz,
        ColorFormat::Cbdt,
        ColorFormat::Sbix,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorFormat::GlyfColr0 => "glyf_colr_0",
            ColorFormat::GlyfColr1 => "glyf_colr_1",
            ColorFormat::Picosvg => "picosvg",
            ColorFormat::Picosvgz => "picosvgz",
            ColorFormat::Cbdt => "cbdt",
            ColorFormat::Sbix => "sbix",
        }
    }

    pub fn is_colr(&self) -> bool {
        matches!(self, ColorFormat::GlyfColr0 | ColorFormat::GlyfColr1)
    }

    pub fn is_svg(&self) -> bool {
        matches!(self, ColorFormat::Picosvg | ColorFormat::Picosvgz)
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self, ColorFormat::Cbdt | ColorFormat::Sbix)
    }
}

impl Display for ColorFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorFormat::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown color format '{s}'")))
    }
}

/// Reuse is disabled when the tolerance is set to this
pub const REUSE_DISABLED: f64 = -1.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FontConfig {
    pub family: String,
    pub upem: u16,
    /// Default advance width, glyphs with wide view boxes get wider
    pub width: u16,
    pub ascender: i16,
    pub descender: i16,
    pub linegap: i16,
    /// Applied to every glyph after mapping it into font units
    pub transform: Affine,
    /// How far apart points may be and still count as the same shape, -1 disables reuse
    pub reuse_tolerance: f64,
    /// Fall back to unshared shapes rather than failing if a reuse can't be encoded
    pub ignore_reuse_error: bool,
    pub color_format: ColorFormat,
    /// Height of bitmap glyphs, in pixels
    pub bitmap_resolution: u16,
    pub keep_glyph_names: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        FontConfig {
            family: "An Emoji Family".to_string(),
            upem: 1024,
            width: 1275,
            ascender: 950,
            descender: -250,
            linegap: 0,
            transform: Affine::IDENTITY,
            reuse_tolerance: 0.1,
            ignore_reuse_error: true,
            color_format: ColorFormat::default(),
            bitmap_resolution: 128,
            keep_glyph_names: false,
        }
    }
}

impl FontConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.upem == 0 {
            return Err(Error::InvalidConfig("upem must be positive".to_string()));
        }
        if self.ascender < 0 {
            return Err(Error::InvalidConfig(format!(
                "ascender {} must not be negative",
                self.ascender
            )));
        }
        if self.descender > 0 {
            return Err(Error::InvalidConfig(format!(
                "descender {} must not be positive",
                self.descender
            )));
        }
        if self.ascender == self.descender {
            return Err(Error::InvalidConfig(
                "ascender and descender must differ".to_string(),
            ));
        }
        if self.linegap < 0 {
            return Err(Error::InvalidConfig(format!(
                "linegap {} must not be negative",
                self.linegap
            )));
        }
        if self.reuse_tolerance != REUSE_DISABLED && self.reuse_tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "reuse_tolerance {} must be -1 or at least 0",
                self.reuse_tolerance
            )));
        }
        if self.bitmap_resolution == 0 || self.bitmap_resolution > 255 {
            return Err(Error::InvalidConfig(format!(
                "bitmap_resolution {} must be in 1..=255",
                self.bitmap_resolution
            )));
        }
        Ok(())
    }

    pub fn reuse_enabled(&self) -> bool {
        self.reuse_tolerance != REUSE_DISABLED
    }

    /// Distance from ascender to descender, in font units
    pub fn line_height(&self) -> f64 {
        self.ascender as f64 - self.descender as f64
    }

    /// A upem square, the default space for shapes without a view box
    pub fn em_square(&self) -> Rect {
        Rect::new(0.0, 0.0, self.upem as f64, self.upem as f64)
    }
}
