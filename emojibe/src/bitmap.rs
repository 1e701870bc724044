//! Record values for the bitmap color formats, [CBDT](https://learn.microsoft.com/en-us/typography/opentype/spec/cbdt)
//! with its [CBLC](https://learn.microsoft.com/en-us/typography/opentype/spec/cblc) index, and
//! [sbix](https://learn.microsoft.com/en-us/typography/opentype/spec/sbix).
//!
//! Images are PNGs supplied by the caller, one per color glyph, all the same height.

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use emojidrasil::types::GlyphName;
use emojiir::config::FontConfig;

use crate::error::{Error, GlyphProblem};

/// CBDT version 3.0, the header is just the version
const CBDT_HEADER_SIZE: u32 = 4;
/// Small metrics, PNG image data
const CBDT_SMALL_METRICS_PNG: u16 = 17;
/// SmallGlyphMetrics plus the u32 data length
const CBDT_SMALL_METRICS_PNG_HEADER_SIZE: u32 = 5 + 4;
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/eblc#bitmapflags>
const HORIZONTAL_METRICS: u8 = 1;
const SBIX_RESOLUTION_PPI: u16 = 72;

/// A color glyph drawn as a PNG
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapGlyph {
    pub name: GlyphName,
    pub glyph_id: u32,
    pub png: Vec<u8>,
}

/// Width and height of a PNG, in pixels
pub fn png_size(name: &GlyphName, data: &[u8]) -> Result<(u32, u32), Error> {
    let reader = png::Decoder::new(data)
        .read_info()
        .map_err(|e| Error::Image(format!("{name}: {e}")))?;
    let info = reader.info();
    Ok((info.width, info.height))
}

/// Clamp values one step out of range, the result of rounding
fn nudge_into_range(min: i32, max: i32, value: i32) -> i32 {
    if value == max + 1 {
        max
    } else if value == min - 1 {
        min
    } else {
        value
    }
}

fn to_i8(what: &str, value: i32) -> Result<i8, Error> {
    i8::try_from(value).map_err(|_| Error::OutOfBounds {
        what: what.to_string(),
        value: value.to_string(),
    })
}

fn to_u8(what: &str, value: i32) -> Result<u8, Error> {
    u8::try_from(value).map_err(|_| Error::OutOfBounds {
        what: what.to_string(),
        value: value.to_string(),
    })
}

/// Pixels per em for images `height` pixels tall filling ascender to descender
pub fn ppem(config: &FontConfig, height: u32) -> u16 {
    (config.upem as f64 * height as f64 / config.line_height()).round() as u16
}

/// The advance of an image, in pixels, never narrower than the default width
pub fn width_in_pixels(config: &FontConfig, width: u32, height: u32) -> i32 {
    let funits = config.line_height();
    let pixels = height as f64;
    let width_funits = (width as f64 * funits / pixels).max(config.width as f64);
    (width_funits * pixels / funits).round() as i32
}

/// Where an image sits relative to the line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapMetrics {
    pub x_offset: i8,
    pub y_offset: i8,
    pub line_height: i32,
    pub line_ascent: i32,
}

impl BitmapMetrics {
    /// Center an image horizontally within its advance and vertically within the line
    pub fn new(config: &FontConfig, width: u32, height: u32, ppem: u16) -> Result<Self, Error> {
        let ppem = ppem as f64;
        let upem = config.upem as f64;
        let resolution = config.bitmap_resolution as i32;
        let line_height = (config.line_height() * ppem / upem).round() as i32;
        let line_ascent = config.ascender as f64 * ppem / upem;

        let x_offset = ((width_in_pixels(config, width, height) - resolution) as f64 / 2.0)
            .round()
            .max(0.0) as i32;
        let y_offset = (line_ascent - 0.5 * (line_height - resolution) as f64).round() as i32;
        Ok(BitmapMetrics {
            x_offset: to_i8("x_offset", nudge_into_range(-128, 127, x_offset))?,
            y_offset: to_i8("y_offset", nudge_into_range(-128, 127, y_offset))?,
            line_height,
            line_ascent: line_ascent.round() as i32,
        })
    }
}

/// <https://learn.microsoft.com/en-us/typography/opentype/spec/eblc#smallglyphmetrics>
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmallGlyphMetrics {
    pub height: u8,
    pub width: u8,
    pub bearing_x: i8,
    pub bearing_y: i8,
    pub advance: u8,
}

/// A format 17 glyph record in CBDT
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CbdtGlyph {
    pub glyph_id: u16,
    pub metrics: SmallGlyphMetrics,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl CbdtGlyph {
    fn record_size(&self) -> u32 {
        CBDT_SMALL_METRICS_PNG_HEADER_SIZE + self.data.len() as u32
    }
}

/// <https://learn.microsoft.com/en-us/typography/opentype/spec/eblc#sbitlinemetrics-record>
///
/// Caret and bearing fields are always zero.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SbitLineMetrics {
    pub ascender: i8,
    pub descender: i8,
    pub width_max: u8,
}

/// Index subtable format 1: offsets of consecutive glyphs, plus one for the end
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexSubTable1 {
    pub first_glyph_index: u16,
    pub last_glyph_index: u16,
    pub image_format: u16,
    pub image_data_offset: u32,
    pub sbit_offsets: Vec<u32>,
}

/// <https://learn.microsoft.com/en-us/typography/opentype/spec/eblc#bitmapsize-record>
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CblcStrike {
    pub start_glyph_index: u16,
    pub end_glyph_index: u16,
    pub ppem_x: u8,
    pub ppem_y: u8,
    pub bit_depth: u8,
    pub flags: u8,
    pub hori: SbitLineMetrics,
    pub vert: SbitLineMetrics,
    pub index_sub_tables: Vec<IndexSubTable1>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct CbdtTables {
    /// CBLC, one strike per run of consecutive glyph ids
    pub strikes: Vec<CblcStrike>,
    /// CBDT, in glyph id order
    pub glyphs: Vec<CbdtGlyph>,
}

impl CbdtTables {
    /// The bytes of the CBDT table
    pub fn cbdt_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(3u16.to_be_bytes());
        data.extend(0u16.to_be_bytes());
        for glyph in self.glyphs.iter() {
            let m = glyph.metrics;
            data.extend([m.height, m.width, m.bearing_x as u8, m.bearing_y as u8, m.advance]);
            data.extend((glyph.data.len() as u32).to_be_bytes());
            data.extend_from_slice(&glyph.data);
        }
        data
    }
}

/// The one image height shared by every glyph
fn only_height(sizes: &[(u32, u32)]) -> Result<u32, Error> {
    let heights: BTreeSet<_> = sizes.iter().map(|(_, h)| *h).collect();
    match heights.len() {
        1 => Ok(*heights.iter().next().unwrap_or(&0)),
        0 => Err(Error::Image("no bitmaps".to_string())),
        _ => Err(Error::Image(format!(
            "bitmaps must share one height, got {heights:?}"
        ))),
    }
}

fn sorted_with_sizes(glyphs: &[BitmapGlyph]) -> Result<Vec<(&BitmapGlyph, (u32, u32))>, Error> {
    let mut sized = glyphs
        .iter()
        .map(|g| Ok((g, png_size(&g.name, &g.png)?)))
        .collect::<Result<Vec<_>, Error>>()?;
    sized.sort_by_key(|(g, _)| g.glyph_id);
    if let Some(w) = sized.windows(2).find(|w| w[0].0.glyph_id == w[1].0.glyph_id) {
        return Err(Error::GlyphOrderViolation(format!(
            "{} and {} share glyph id {}",
            w[0].0.name, w[1].0.name, w[0].0.glyph_id
        )));
    }
    Ok(sized)
}

fn glyph_id_u16(glyph: &BitmapGlyph) -> Result<u16, Error> {
    u16::try_from(glyph.glyph_id).map_err(|_| Error::OutOfBounds {
        what: format!("glyph id of {}", glyph.name),
        value: glyph.glyph_id.to_string(),
    })
}

/// CBDT can't describe images past 255 pixels
pub fn check_cbdt_sizes(glyphs: &[BitmapGlyph]) -> Result<(), Error> {
    for glyph in glyphs {
        let (width, height) = png_size(&glyph.name, &glyph.png)?;
        if width > u8::MAX as u32 || height > u8::MAX as u32 {
            return Err(Error::GlyphError(
                glyph.name.clone(),
                GlyphProblem::TooBigForCbdt { width, height },
            ));
        }
    }
    Ok(())
}

/// One strike over a run of glyphs with consecutive ids
fn cbdt_strike(
    config: &FontConfig,
    run: &[(&BitmapGlyph, (u32, u32))],
    ppem: u16,
    data_offset: u32,
) -> Result<(CblcStrike, Vec<CbdtGlyph>), Error> {
    let (Some((first, _)), Some((last, _))) = (run.first(), run.last()) else {
        return Err(Error::GlyphOrderViolation("empty strike".to_string()));
    };
    if last.glyph_id - first.glyph_id + 1 != run.len() as u32 {
        return Err(Error::GlyphOrderViolation(format!(
            "glyphs {}..={} are not consecutive",
            first.glyph_id, last.glyph_id
        )));
    }

    let mut line_heights = BTreeSet::new();
    let mut glyphs = Vec::with_capacity(run.len());
    for (glyph, (width, height)) in run {
        let metrics = BitmapMetrics::new(config, *width, *height, ppem)?;
        line_heights.insert(metrics.line_height);
        glyphs.push(CbdtGlyph {
            glyph_id: glyph_id_u16(glyph)?,
            metrics: SmallGlyphMetrics {
                height: to_u8("bitmap height", *height as i32)?,
                width: to_u8("bitmap width", *width as i32)?,
                bearing_x: metrics.x_offset,
                bearing_y: metrics.y_offset,
                advance: to_u8("advance", width_in_pixels(config, *width, *height))?,
            },
            data: glyph.png.clone(),
        });
    }
    let line_height = match line_heights.len() {
        1 => line_heights.into_iter().next().unwrap_or_default(),
        _ => {
            return Err(Error::Image(format!(
                "line heights {line_heights:?} should be the same"
            )))
        }
    };

    let mut sbit_offsets = Vec::with_capacity(glyphs.len() + 1);
    let mut offset = data_offset;
    for glyph in glyphs.iter() {
        sbit_offsets.push(offset - data_offset);
        offset += glyph.record_size();
    }
    sbit_offsets.push(offset - data_offset);

    let ascender = (config.ascender as f64 * ppem as f64 / config.upem as f64).round() as i32;
    let line_metrics = SbitLineMetrics {
        ascender: to_i8("line ascender", ascender)?,
        descender: to_i8("line descender", -(line_height - ascender))?,
        width_max: glyphs.iter().map(|g| g.metrics.advance).max().unwrap_or_default(),
    };
    let ppem = to_u8("ppem", ppem as i32)?;
    let strike = CblcStrike {
        start_glyph_index: glyphs[0].glyph_id,
        end_glyph_index: glyphs[glyphs.len() - 1].glyph_id,
        ppem_x: ppem,
        ppem_y: ppem,
        bit_depth: 32,
        flags: HORIZONTAL_METRICS,
        hori: line_metrics,
        vert: line_metrics,
        index_sub_tables: vec![IndexSubTable1 {
            first_glyph_index: glyphs[0].glyph_id,
            last_glyph_index: glyphs[glyphs.len() - 1].glyph_id,
            image_format: CBDT_SMALL_METRICS_PNG,
            image_data_offset: data_offset,
            sbit_offsets,
        }],
    };
    Ok((strike, glyphs))
}

/// CBDT and CBLC for `glyphs`, one strike per run of consecutive glyph ids
pub fn make_cbdt_tables(config: &FontConfig, glyphs: &[BitmapGlyph]) -> Result<CbdtTables, Error> {
    check_cbdt_sizes(glyphs)?;
    let sized = sorted_with_sizes(glyphs)?;
    let sizes: Vec<_> = sized.iter().map(|(_, s)| *s).collect();
    let ppem = ppem(config, only_height(&sizes)?);

    let mut tables = CbdtTables::default();
    let mut data_offset = CBDT_HEADER_SIZE;
    let mut rest = sized.as_slice();
    while !rest.is_empty() {
        let end = (1..rest.len())
            .find(|i| rest[*i].0.glyph_id != rest[i - 1].0.glyph_id + 1)
            .unwrap_or(rest.len());
        let (run, remainder) = rest.split_at(end);
        rest = remainder;

        let (strike, strike_glyphs) = cbdt_strike(config, run, ppem, data_offset)?;
        data_offset += strike_glyphs.iter().map(CbdtGlyph::record_size).sum::<u32>();
        debug!(
            "CBLC strike for glyphs {}..={} at {ppem} ppem",
            strike.start_glyph_index, strike.end_glyph_index
        );
        tables.strikes.push(strike);
        tables.glyphs.extend(strike_glyphs);
    }
    Ok(tables)
}

/// <https://learn.microsoft.com/en-us/typography/opentype/spec/sbix#glyph-data>
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SbixGlyph {
    pub glyph_name: GlyphName,
    pub glyph_id: u16,
    pub origin_offset_x: i16,
    pub origin_offset_y: i16,
    /// Always `png `
    pub graphic_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SbixStrike {
    pub ppem: u16,
    pub ppi: u16,
    pub glyphs: Vec<SbixGlyph>,
}

/// An sbix table with a single strike
pub fn make_sbix_strike(config: &FontConfig, glyphs: &[BitmapGlyph]) -> Result<SbixStrike, Error> {
    let sized = sorted_with_sizes(glyphs)?;
    let sizes: Vec<_> = sized.iter().map(|(_, s)| *s).collect();
    let ppem = ppem(config, only_height(&sizes)?);

    let glyphs = sized
        .into_iter()
        .map(|(glyph, (width, height))| {
            let metrics = BitmapMetrics::new(config, width, height, ppem)?;
            Ok(SbixGlyph {
                glyph_name: glyph.name.clone(),
                glyph_id: glyph_id_u16(glyph)?,
                origin_offset_x: metrics.x_offset as i16,
                origin_offset_y: (metrics.line_ascent - metrics.line_height) as i16,
                graphic_type: "png ".to_string(),
                data: glyph.png.clone(),
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(SbixStrike {
        ppem,
        ppi: SBIX_RESOLUTION_PPI,
        glyphs,
    })
}
