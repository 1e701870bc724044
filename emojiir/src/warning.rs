//! Lossy but recoverable situations.
//!
//! Anything that degrades output and carries on is logged and also
//! surfaced to the caller as a [`Warning`].

use std::fmt::Display;

use emojidrasil::types::GlyphName;
use kurbo::Affine;

use crate::color::Color;

#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The glyph has no view box, it is drawn untransformed
    MissingViewBox { glyph: GlyphName },
    /// COLRv0 can't hold a gradient, the given color is used instead
    GradientDropped { glyph: GlyphName, color: Color },
    /// No shape in a bucket of similar shapes can produce all the others
    NoDonor { shape: String, members: usize },
    /// A reuse transform didn't fit fixed point, the shape is drawn on its own
    ReuseOverflow { shape: String, transform: Affine },
    /// Two shapes normalized alike but no affine maps one onto the other
    AffineBetweenFailed { shape: String, donor: String },
    /// A composite paint we can't express in SVG was skipped
    UnsupportedComposite { glyph: GlyphName, mode: String },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MissingViewBox { glyph } => {
                write!(f, "{glyph} has no view box, using the identity transform")
            }
            Warning::GradientDropped { glyph, color } => {
                write!(f, "{glyph} gradient replaced by {color}, COLRv0 is solid only")
            }
            Warning::NoDonor { shape, members } => write!(
                f,
                "none of {members} shapes like '{shape}' can produce all the others"
            ),
            Warning::ReuseOverflow { shape, transform } => write!(
                f,
                "not reusing '{shape}', {:?} overflows fixed point",
                transform.as_coeffs()
            ),
            Warning::AffineBetweenFailed { shape, donor } => {
                write!(f, "no affine maps '{donor}' onto '{shape}'")
            }
            Warning::UnsupportedComposite { glyph, mode } => {
                write!(f, "{glyph} uses unsupported composite mode {mode}")
            }
        }
    }
}
