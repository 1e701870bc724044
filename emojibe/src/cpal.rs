//! Generates a [CPAL](https://learn.microsoft.com/en-us/typography/opentype/spec/cpal) table.

use std::collections::BTreeSet;

use emojidrasil::types::GlyphName;
use emojiir::{color::Color, color_glyph::ColorGlyph};
use log::debug;
use write_fonts::{tables::cpal::ColorRecord, tables::cpal::Cpal, NullableOffsetMarker};

use crate::error::{Error, GlyphProblem};

/// A single sorted palette, the index of a color is its CPAL palette index.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ColorPalette {
    colors: Vec<Color>,
}

impl ColorPalette {
    /// Every color used by `glyphs`.
    ///
    /// COLRv1 stores alpha next to the palette index so only opaque colors
    /// are kept, COLRv0 has nowhere else to put alpha.
    pub fn new<'a>(glyphs: impl IntoIterator<Item = &'a ColorGlyph>, keep_alpha: bool) -> Self {
        let colors: BTreeSet<_> = glyphs
            .into_iter()
            .flat_map(|g| g.painted_layers.iter())
            .flat_map(|p| p.colors())
            .map(|c| if keep_alpha { c } else { c.opaque() })
            .collect();
        debug!("palette of {} colors", colors.len());
        ColorPalette {
            colors: colors.into_iter().collect(),
        }
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn index_of(&self, color: Color) -> Option<usize> {
        self.colors.binary_search(&color).ok()
    }

    /// The palette index of `color` used by `glyph`, as CPAL wants it
    pub(crate) fn palette_index(&self, glyph: &GlyphName, color: Color) -> Result<u16, Error> {
        self.index_of(color)
            .map(|i| i as u16)
            .ok_or_else(|| Error::GlyphError(glyph.clone(), GlyphProblem::NotInColorPalette(color)))
    }

    /// Generate [CPAL](https://learn.microsoft.com/en-us/typography/opentype/spec/cpal)
    pub fn to_cpal(&self) -> Result<Cpal, Error> {
        let color_records = self.colors.iter().map(to_cpal_color).collect::<Vec<_>>();

        if color_records.len() > u16::MAX as usize {
            return Err(Error::OutOfBounds {
                what: "Too many CPAL colorRecords".to_string(),
                value: format!("{}", color_records.len()),
            });
        }

        Ok(Cpal {
            num_palette_entries: color_records.len() as u16,
            num_palettes: 1,
            num_color_records: color_records.len() as u16,
            color_records_array: NullableOffsetMarker::new(Some(color_records)),
            color_record_indices: vec![0],
            ..Default::default()
        })
    }
}

fn to_cpal_color(c: &Color) -> ColorRecord {
    ColorRecord {
        red: c.red,
        green: c.green,
        blue: c.blue,
        alpha: c.alpha_u8(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use emojiir::paint::{GlyphRef, Paint};
    use kurbo::Affine;
    use pretty_assertions::assert_eq;

    use super::*;

    fn glyph_with(colors: &[Color]) -> ColorGlyph {
        ColorGlyph {
            name: "g".into(),
            glyph_id: 1,
            codepoints: vec![0xe000],
            advance_width: 1275,
            view_box: None,
            user_transform: Affine::IDENTITY,
            painted_layers: colors
                .iter()
                .map(|c| {
                    Paint::glyph(
                        GlyphRef::Path("M0,0 L1,0 L1,1 Z".to_string()),
                        Arc::new(Paint::Solid(*c)),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn v1_palette_is_opaque() {
        let glyph = glyph_with(&[Color::rgba(255, 0, 0, 0.5), Color::rgb(255, 0, 0)]);
        let palette = ColorPalette::new([&glyph], false);
        assert_eq!(&[Color::rgb(255, 0, 0)], palette.colors());
    }

    #[test]
    fn v0_palette_keeps_alpha() {
        let glyph = glyph_with(&[Color::rgba(255, 0, 0, 0.5), Color::rgb(0, 0, 255)]);
        let palette = ColorPalette::new([&glyph], true);
        assert_eq!(2, palette.len());
        assert!(palette.index_of(Color::rgba(255, 0, 0, 0.5)).is_some());
    }

    #[test]
    fn cpal_records() {
        let glyph = glyph_with(&[Color::rgba(0, 128, 0, 0.5), Color::rgb(0, 0, 255)]);
        let cpal = ColorPalette::new([&glyph], true).to_cpal().unwrap();
        assert_eq!(2, cpal.num_palette_entries);
        assert_eq!(1, cpal.num_palettes);
        assert_eq!(vec![0], cpal.color_record_indices);
    }

    #[test]
    fn missing_color_names_the_glyph() {
        let palette = ColorPalette::default();
        let err = palette
            .palette_index(&"smile".into(), Color::BLACK)
            .unwrap_err();
        assert!(
            matches!(err, Error::GlyphError(ref g, GlyphProblem::NotInColorPalette(_)) if g.as_str() == "smile"),
            "{err:?}"
        );
    }
}
