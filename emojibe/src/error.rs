use std::fmt::Display;

use emojidrasil::types::GlyphName;
use emojiir::color::Color;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    IrError(#[from] emojiir::error::Error),
    #[error("'{0}' {1}")]
    GlyphError(GlyphName, GlyphProblem),
    #[error("Glyph order violation: {0}")]
    GlyphOrderViolation(String),
    #[error("Unable to resolve {0}")]
    UnresolvedReference(String),
    #[error("{what} out of bounds: {value}")]
    OutOfBounds { what: String, value: String },
    #[error("Generating bytes for {context} failed: {report}")]
    DumpTableError { report: String, context: String },
    #[error("Error writing XML: '{0}'")]
    Xml(String),
    #[error("Error reading image: {0}")]
    Image(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn xml(e: impl Display) -> Error {
        Error::Xml(e.to_string())
    }
}

#[derive(Debug)]
pub enum GlyphProblem {
    NotInColorPalette(Color),
    NotInGlyphOrder,
    MissingViewBox,
    UnresolvedPath(String),
    FillWithoutOutline,
    UnsupportedPaint(String),
    TooBigForCbdt { width: u32, height: u32 },
}

impl Display for GlyphProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphProblem::NotInColorPalette(color) => write!(f, "uses {color}, not in the palette"),
            GlyphProblem::NotInGlyphOrder => f.write_str("has no entry in glyph order"),
            GlyphProblem::MissingViewBox => f.write_str("has no view box"),
            GlyphProblem::UnresolvedPath(d) => {
                write!(f, "paints path '{d}' that was never made into a glyph")
            }
            GlyphProblem::FillWithoutOutline => f.write_str("paints a fill that has no outline"),
            GlyphProblem::UnsupportedPaint(what) => write!(f, "uses {what}, which has no svg equivalent"),
            GlyphProblem::TooBigForCbdt { width, height } => {
                write!(f, "image is {width}x{height}, too big for CBDT")
            }
        }
    }
}
