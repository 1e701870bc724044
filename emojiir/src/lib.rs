//! Intermediate representation of a color font: shapes, reusable parts and
//! the paint trees of color glyphs.

pub mod color;
pub mod color_glyph;
pub mod config;
pub mod error;
pub mod glyph;
pub mod ir;
pub mod paint;
pub mod parts;
pub mod shape;
pub mod svg;
pub mod warning;
