//! Draws the glyphs of a COLR table back as svg, in the coordinates of each glyph's view box.
//!
//! Lets tests compare what went into a font with what came out.

use std::sync::Arc;

use indexmap::IndexMap;
use kurbo::{Affine, Point, Rect};
use log::{debug, warn};

use emojidrasil::types::GlyphName;
use emojiir::{
    color::Color,
    color_glyph::view_box_to_font,
    config::FontConfig,
    ir::GlyphOrder,
    paint::{self as ir, GlyphRef},
    warning::Warning,
};
use write_fonts::{
    tables::{
        colr::{ColorLine, Colr, CompositeMode, Extend, Paint},
        cpal::{ColorRecord, Cpal},
    },
    types::{F2Dot14, FWord, GlyphId16},
};

use crate::{
    error::{Error, GlyphProblem},
    glyph_reuse::GlyphReuseCache,
    svg::SvgDocumentBuilder,
};

/// The text foreground, not a palette entry
const FOREGROUND_COLOR: u16 = 0xFFFF;
/// ColrGlyph paints nested deeper than this are assumed to be a cycle
const MAX_DEPTH: usize = 64;

fn coord(value: FWord) -> f64 {
    value.to_i16() as f64
}

fn point(x: FWord, y: FWord) -> Point {
    Point::new(coord(x), coord(y))
}

fn f2dot14(value: F2Dot14) -> f64 {
    value.to_f32() as f64
}

/// COLR angles are in half turns
fn degrees(value: F2Dot14) -> f64 {
    f2dot14(value) * 180.0
}

fn from_colr_extend(extend: Extend) -> ir::Extend {
    match extend {
        Extend::Repeat => ir::Extend::Repeat,
        Extend::Reflect => ir::Extend::Reflect,
        _ => ir::Extend::Pad,
    }
}

/// Reads paints out of a COLR table, resolving glyphs to their outlines
struct ColrReader<'a> {
    colr: &'a Colr,
    palette: &'a [ColorRecord],
    glyph_order: &'a GlyphOrder,
    outlines: &'a GlyphReuseCache,
    warnings: Vec<Warning>,
}

impl ColrReader<'_> {
    fn glyph_name(&self, gid: GlyphId16) -> Result<&GlyphName, Error> {
        self.glyph_order
            .glyph_name(gid.to_u32())
            .ok_or_else(|| Error::UnresolvedReference(format!("glyph id {}", gid.to_u32())))
    }

    fn outline(&self, glyph: &GlyphName, gid: GlyphId16) -> Result<GlyphRef, Error> {
        let name = self.glyph_name(gid)?;
        let d = self.outlines.outline(name).ok_or_else(|| {
            Error::GlyphError(glyph.clone(), GlyphProblem::UnresolvedPath(name.to_string()))
        })?;
        Ok(GlyphRef::Path(d.to_string()))
    }

    fn color(&self, glyph: &GlyphName, palette_index: u16, alpha: f64) -> Result<Color, Error> {
        if palette_index == FOREGROUND_COLOR {
            return Ok(Color::BLACK.multiply_alpha(alpha));
        }
        let record = self.palette.get(palette_index as usize).ok_or_else(|| {
            Error::UnresolvedReference(format!("{glyph} uses palette index {palette_index}"))
        })?;
        Ok(Color::rgba(
            record.red,
            record.green,
            record.blue,
            record.alpha as f32 / 255.0,
        )
        .multiply_alpha(alpha))
    }

    fn stops(&self, glyph: &GlyphName, line: &ColorLine) -> Result<Vec<ir::ColorStop>, Error> {
        line.color_stops
            .iter()
            .map(|stop| {
                Ok(ir::ColorStop {
                    offset: f2dot14(stop.stop_offset),
                    color: self.color(glyph, stop.palette_index, f2dot14(stop.alpha))?,
                })
            })
            .collect()
    }

    /// The paint of a base glyph, COLRv1 first
    fn base_paint(
        &mut self,
        glyph: &GlyphName,
        gid: GlyphId16,
        depth: usize,
    ) -> Result<Arc<ir::Paint>, Error> {
        if depth > MAX_DEPTH {
            return Err(Error::UnresolvedReference(format!(
                "{glyph} nests ColrGlyph paints more than {MAX_DEPTH} deep"
            )));
        }
        let v1 = self.colr.base_glyph_list.as_ref().and_then(|list| {
            list.base_glyph_paint_records
                .iter()
                .find(|record| record.glyph_id == gid)
        });
        if let Some(record) = v1 {
            return self.to_ir_paint(glyph, &record.paint, depth);
        }

        let v0 = self
            .colr
            .base_glyph_records
            .as_ref()
            .and_then(|records| records.iter().find(|record| record.glyph_id == gid));
        let Some(base) = v0 else {
            return Err(Error::UnresolvedReference(format!(
                "glyph id {} has no COLR paint",
                gid.to_u32()
            )));
        };
        let start = base.first_layer_index as usize;
        let end = start + base.num_layers as usize;
        let layers = self
            .colr
            .layer_records
            .as_ref()
            .and_then(|records| records.get(start..end))
            .ok_or_else(|| {
                Error::UnresolvedReference(format!("{glyph} layer records {start}..{end}"))
            })?;
        let layers = layers
            .iter()
            .map(|layer| {
                let fill = Arc::new(ir::Paint::Solid(self.color(glyph, layer.palette_index, 1.0)?));
                Ok(ir::Paint::glyph(self.outline(glyph, layer.glyph_id)?, fill))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Arc::new(ir::Paint::ColrLayers(layers)))
    }

    fn to_ir_paint(
        &mut self,
        glyph: &GlyphName,
        paint: &Paint,
        depth: usize,
    ) -> Result<Arc<ir::Paint>, Error> {
        let ir_paint = match paint {
            Paint::ColrLayers(layers) => {
                let start = layers.first_layer_index as usize;
                let end = start + layers.num_layers as usize;
                let paints = self
                    .colr
                    .layer_list
                    .as_ref()
                    .and_then(|list| list.paints.get(start..end))
                    .ok_or_else(|| {
                        Error::UnresolvedReference(format!("{glyph} layers {start}..{end}"))
                    })?;
                let layers = paints
                    .iter()
                    .map(|layer| self.to_ir_paint(glyph, layer, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                ir::Paint::ColrLayers(layers)
            }
            Paint::Solid(solid) => {
                ir::Paint::Solid(self.color(glyph, solid.palette_index, f2dot14(solid.alpha))?)
            }
            Paint::LinearGradient(linear) => ir::Paint::LinearGradient(ir::LinearGradient {
                extend: from_colr_extend(linear.color_line.extend),
                stops: self.stops(glyph, &linear.color_line)?,
                p0: point(linear.x0, linear.y0),
                p1: point(linear.x1, linear.y1),
                p2: point(linear.x2, linear.y2),
            }),
            Paint::RadialGradient(radial) => ir::Paint::RadialGradient(ir::RadialGradient {
                extend: from_colr_extend(radial.color_line.extend),
                stops: self.stops(glyph, &radial.color_line)?,
                c0: point(radial.x0, radial.y0),
                c1: point(radial.x1, radial.y1),
                r0: radial.radius0.to_u16() as f64,
                r1: radial.radius1.to_u16() as f64,
            }),
            Paint::Glyph(paint_glyph) => ir::Paint::Glyph {
                glyph: self.outline(glyph, paint_glyph.glyph_id)?,
                paint: self.to_ir_paint(glyph, &paint_glyph.paint, depth)?,
            },
            Paint::ColrGlyph(colr_glyph) => {
                return self.base_paint(glyph, colr_glyph.glyph_id, depth + 1);
            }
            Paint::Transform(t) => ir::Paint::Transform {
                transform: Affine::new([
                    t.transform.xx.to_f64(),
                    t.transform.yx.to_f64(),
                    t.transform.xy.to_f64(),
                    t.transform.yy.to_f64(),
                    t.transform.dx.to_f64(),
                    t.transform.dy.to_f64(),
                ]),
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::Translate(t) => ir::Paint::Translate {
                dx: coord(t.dx),
                dy: coord(t.dy),
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::Scale(t) => ir::Paint::Scale {
                sx: f2dot14(t.scale_x),
                sy: f2dot14(t.scale_y),
                center: None,
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::ScaleAroundCenter(t) => ir::Paint::Scale {
                sx: f2dot14(t.scale_x),
                sy: f2dot14(t.scale_y),
                center: Some(point(t.center_x, t.center_y)),
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::ScaleUniform(t) => ir::Paint::ScaleUniform {
                scale: f2dot14(t.scale),
                center: None,
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::ScaleUniformAroundCenter(t) => ir::Paint::ScaleUniform {
                scale: f2dot14(t.scale),
                center: Some(point(t.center_x, t.center_y)),
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::Rotate(t) => ir::Paint::Rotate {
                angle: degrees(t.angle),
                center: None,
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::RotateAroundCenter(t) => ir::Paint::Rotate {
                angle: degrees(t.angle),
                center: Some(point(t.center_x, t.center_y)),
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::Skew(t) => ir::Paint::Skew {
                x_angle: degrees(t.x_skew_angle),
                y_angle: degrees(t.y_skew_angle),
                center: None,
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::SkewAroundCenter(t) => ir::Paint::Skew {
                x_angle: degrees(t.x_skew_angle),
                y_angle: degrees(t.y_skew_angle),
                center: Some(point(t.center_x, t.center_y)),
                paint: self.to_ir_paint(glyph, &t.paint, depth)?,
            },
            Paint::Composite(composite) => {
                let source = self.to_ir_paint(glyph, &composite.source_paint, depth)?;
                if composite.composite_mode != CompositeMode::SrcIn {
                    warn!(
                        "{glyph}: {:?} is drawn as its source alone",
                        composite.composite_mode
                    );
                    self.warnings.push(Warning::UnsupportedComposite {
                        glyph: glyph.clone(),
                        mode: format!("{:?}", composite.composite_mode),
                    });
                    return Ok(source);
                }
                ir::Paint::Composite {
                    mode: ir::CompositeMode::SrcIn,
                    source,
                    backdrop: self.to_ir_paint(glyph, &composite.backdrop_paint, depth)?,
                }
            }
            // variable paints and sweep gradients, we never write them
            _ => {
                return Err(Error::GlyphError(
                    glyph.clone(),
                    GlyphProblem::UnsupportedPaint(format!("{paint:?}")),
                ))
            }
        };
        Ok(Arc::new(ir_paint))
    }
}

/// Every base glyph id in a COLR table, in table order
fn base_glyph_ids(colr: &Colr) -> Vec<GlyphId16> {
    let mut gids: Vec<_> = colr
        .base_glyph_list
        .as_ref()
        .map(|list| {
            list.base_glyph_paint_records
                .iter()
                .map(|r| r.glyph_id)
                .collect()
        })
        .unwrap_or_default();
    if let Some(records) = colr.base_glyph_records.as_ref() {
        gids.extend(
            records
                .iter()
                .map(|r| r.glyph_id)
                .filter(|gid| !gids.contains(gid))
                .collect::<Vec<_>>(),
        );
    }
    gids
}

/// One svg document per base glyph of `colr`.
///
/// `view_box` gives the view box each glyph was drawn in, documents use its
/// coordinates. Glyphs without one are drawn in font units, y flipped.
pub fn colr_to_svg(
    config: &FontConfig,
    view_box: impl Fn(&GlyphName) -> Option<Rect>,
    colr: &Colr,
    cpal: &Cpal,
    glyph_order: &GlyphOrder,
    outlines: &GlyphReuseCache,
) -> Result<(IndexMap<GlyphName, String>, Vec<Warning>), Error> {
    let start = cpal.color_record_indices.first().copied().unwrap_or_default() as usize;
    let palette = cpal
        .color_records_array
        .as_ref()
        .map(|records| records.get(start..).unwrap_or_default())
        .unwrap_or_default();
    let mut reader = ColrReader {
        colr,
        palette,
        glyph_order,
        outlines,
        warnings: Vec::new(),
    };

    let mut documents = IndexMap::new();
    let mut warnings = Vec::new();
    for gid in base_glyph_ids(colr) {
        let name = reader.glyph_name(gid)?.clone();
        let paint = reader.base_paint(&name, gid, 0)?;
        let mut doc = SvgDocumentBuilder::new();
        let font_to_doc = match view_box(&name) {
            Some(vb) => {
                doc.view_box(vb);
                view_box_to_font(config, Some(vb)).inverse()
            }
            None => Affine::FLIP_Y,
        };
        doc.add_glyph(gid.to_u32(), &name, &paint, font_to_doc)?;
        warnings.extend(doc.warnings().iter().cloned());
        debug!("{name} drawn back as svg");
        documents.insert(name, doc.to_xml()?);
    }
    warnings.extend(reader.warnings);
    Ok((documents, warnings))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use emojiir::{color_glyph::ColorGlyph, paint::LinearGradient};

    use crate::{colr::colr_v0, colr::colr_v1, cpal::ColorPalette};

    use super::*;

    const VIEW_BOX: Rect = Rect::new(0.0, 0.0, 128.0, 128.0);

    fn round_trip(layers: Vec<Arc<ir::Paint>>, v1: bool) -> (String, Vec<Warning>) {
        // as wide as tall so view box coordinates land on whole font units
        let config = FontConfig {
            width: 1200,
            ..Default::default()
        };
        // draw in the view box, store in font units
        let to_font = view_box_to_font(&config, Some(VIEW_BOX));
        let layers = layers
            .iter()
            .map(|layer| {
                ir::mutate(layer, &mut |node| {
                    let ir::Paint::Glyph {
                        glyph: GlyphRef::Path(d),
                        paint,
                    } = node.as_ref()
                    else {
                        return node;
                    };
                    ir::Paint::glyph(
                        GlyphRef::Path(emojiir::shape::transform_path(d, to_font).unwrap()),
                        paint.transform_gradient(to_font).unwrap(),
                    )
                })
            })
            .collect();
        let glyph = ColorGlyph {
            name: "smile".into(),
            glyph_id: 1,
            codepoints: vec![0x1f600],
            advance_width: 1200,
            view_box: Some(VIEW_BOX),
            user_transform: Affine::IDENTITY,
            painted_layers: layers,
        };
        let mut order: GlyphOrder = [GlyphName::NOTDEF, glyph.name.clone()]
            .into_iter()
            .collect();
        let mut cache = GlyphReuseCache::new(0.1);
        let (migrated, _) = cache.migrate_paths(&glyph, &mut order).unwrap();
        let palette = ColorPalette::new([&migrated], !v1);
        let colr = if v1 {
            colr_v1(&[migrated], &palette, &order, &cache).unwrap()
        } else {
            colr_v0(&[migrated], &palette, &mut order, &mut cache)
                .unwrap()
                .0
        };
        let cpal = palette.to_cpal().unwrap();
        let (mut documents, warnings) =
            colr_to_svg(&config, |_| Some(VIEW_BOX), &colr, &cpal, &order, &cache).unwrap();
        assert_eq!(1, documents.len());
        (documents.swap_remove("smile").unwrap(), warnings)
    }

    fn solid(color: Color) -> Arc<ir::Paint> {
        Arc::new(ir::Paint::Solid(color))
    }

    fn shape(d: &str, paint: Arc<ir::Paint>) -> Arc<ir::Paint> {
        ir::Paint::glyph(GlyphRef::Path(d.to_string()), paint)
    }

    #[test]
    fn solid_v1_comes_back() {
        let (svg, warnings) = round_trip(
            vec![shape("M0,0 L128,0 L128,128 Z", solid(Color::rgba(255, 0, 0, 0.5)))],
            true,
        );
        assert!(warnings.is_empty());
        assert_eq!(
            r##"<svg version="1.1" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 128 128"><g id="glyph1"><path d="M0,0 L128,0 L128,128 Z" fill="#ff0000" opacity="0.5"/></g></svg>"##,
            svg
        );
    }

    #[test]
    fn v0_layers_come_back() {
        let (svg, _) = round_trip(
            vec![
                shape("M0,0 L128,0 L128,128 Z", solid(Color::rgb(0, 0, 255))),
                shape("M0,0 L64,0 L64,64 L0,64 Z", solid(Color::rgb(0, 128, 0))),
            ],
            false,
        );
        assert!(
            svg.contains(r##"<path d="M0,0 L128,0 L128,128 Z" fill="#0000ff"/><path d="M0,0 L64,0 L64,64 L0,64 Z" fill="#008000"/>"##),
            "{svg}"
        );
    }

    #[test]
    fn linear_gradient_comes_back() {
        let gradient = Arc::new(ir::Paint::LinearGradient(LinearGradient {
            extend: ir::Extend::Pad,
            stops: vec![
                ir::ColorStop {
                    offset: 0.0,
                    color: Color::rgb(255, 0, 0),
                },
                ir::ColorStop {
                    offset: 1.0,
                    color: Color::rgb(0, 0, 255),
                },
            ],
            p0: Point::new(0.0, 0.0),
            p1: Point::new(128.0, 0.0),
            p2: Point::new(0.0, 128.0),
        }));
        let (svg, _) = round_trip(vec![shape("M0,0 L128,0 L128,128 Z", gradient)], true);
        assert!(
            svg.contains(r#"<linearGradient x1="0" y1="0" x2="128" y2="0" gradientUnits="userSpaceOnUse" id="gradient0">"#),
            "{svg}"
        );
        assert!(svg.contains(r##"fill="url(#gradient0)""##), "{svg}");
    }

    #[test]
    fn missing_outline_is_an_error() {
        let config = FontConfig::default();
        let palette = ColorPalette::default();
        let order: GlyphOrder = [GlyphName::NOTDEF, "a".into()].into_iter().collect();
        let mut colr = Colr::new(0, None, None, 0);
        colr.base_glyph_list = write_fonts::tables::colr::BaseGlyphList::new(
            1,
            vec![write_fonts::tables::colr::BaseGlyphPaint::new(
                GlyphId16::new(1),
                Paint::Glyph(write_fonts::tables::colr::PaintGlyph::new(
                    Paint::Solid(write_fonts::tables::colr::PaintSolid::new(
                        FOREGROUND_COLOR,
                        F2Dot14::from_f32(1.0),
                    )),
                    GlyphId16::new(1),
                )),
            )],
        )
        .into();
        let err = colr_to_svg(
            &config,
            |_| None,
            &colr,
            &palette.to_cpal().unwrap(),
            &order,
            &GlyphReuseCache::new(0.1),
        )
        .unwrap_err();
        assert!(
            matches!(err, Error::GlyphError(_, GlyphProblem::UnresolvedPath(_))),
            "{err:?}"
        );
    }
}
