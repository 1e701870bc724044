//! Generates a [COLR](https://learn.microsoft.com/en-us/typography/opentype/spec/colr) table.
//!
//! Expects color glyphs whose paths were already moved into outline glyphs by
//! [`crate::glyph_reuse::GlyphReuseCache::migrate_paths`].

use std::{collections::HashMap, sync::Arc};

use kurbo::{Affine, Point, Rect};
use log::{debug, trace, warn};

use emojidrasil::{
    fixed::{int16_safe, uint16_safe},
    transform::{compose_ltr, is_identity},
    types::GlyphName,
};
use emojiir::{
    color::Color,
    color_glyph::ColorGlyph,
    ir::GlyphOrder,
    paint::{self as ir, mutate, GlyphRef},
    warning::Warning,
};
use write_fonts::{
    tables::colr::{
        Affine2x3, BaseGlyph, BaseGlyphList, BaseGlyphPaint, Clip, ClipBox, ClipList, ColorLine,
        ColorStop, Colr, CompositeMode, Extend, Layer, LayerList, Paint, PaintColrGlyph,
        PaintColrLayers, PaintComposite, PaintGlyph, PaintLinearGradient, PaintRadialGradient,
        PaintRotate, PaintRotateAroundCenter, PaintScale, PaintScaleAroundCenter,
        PaintScaleUniform, PaintScaleUniformAroundCenter, PaintSkew, PaintSkewAroundCenter,
        PaintSolid, PaintTransform, PaintTranslate,
    },
    types::{F2Dot14, FWord, Fixed, GlyphId16, UfWord},
};

use crate::{
    cpal::ColorPalette,
    error::{Error, GlyphProblem},
    glyph_reuse::GlyphReuseCache,
};

/// PaintColrLayers counts its layers in a u8
const MAX_LAYERS: usize = u8::MAX as usize;

fn glyph_id(glyph_order: &GlyphOrder, name: &GlyphName) -> Result<GlyphId16, Error> {
    let gid = glyph_order
        .glyph_id(name)
        .ok_or_else(|| Error::GlyphError(name.clone(), GlyphProblem::NotInGlyphOrder))?;
    u16::try_from(gid)
        .map(GlyphId16::new)
        .map_err(|_| Error::OutOfBounds {
            what: format!("glyph id of {name}"),
            value: gid.to_string(),
        })
}

fn glyph_ref_name<'a>(color_glyph: &GlyphName, glyph: &'a GlyphRef) -> Result<&'a GlyphName, Error> {
    match glyph {
        GlyphRef::Name(name) => Ok(name),
        GlyphRef::Path(d) => Err(Error::GlyphError(
            color_glyph.clone(),
            GlyphProblem::UnresolvedPath(d.clone()),
        )),
    }
}

fn sorted_by_gid<'a>(
    glyphs: &'a [ColorGlyph],
    glyph_order: &GlyphOrder,
) -> Result<Vec<(GlyphId16, &'a ColorGlyph)>, Error> {
    let mut sorted = glyphs
        .iter()
        .map(|g| glyph_id(glyph_order, &g.name).map(|gid| (gid, g)))
        .collect::<Result<Vec<_>, _>>()?;
    sorted.sort_by_key(|(gid, _)| *gid);
    Ok(sorted)
}

/// The color a COLRv0 layer gets, the first we find
fn first_color(glyph: &GlyphName, paint: &ir::Paint, warnings: &mut Vec<Warning>) -> Option<Color> {
    let stops = match paint {
        ir::Paint::Solid(color) => return Some(*color),
        ir::Paint::LinearGradient(gradient) => &gradient.stops,
        ir::Paint::RadialGradient(gradient) => &gradient.stops,
        other => {
            return other
                .children()
                .into_iter()
                .find_map(|child| first_color(glyph, child, warnings))
        }
    };
    let color = stops.first()?.color;
    warn!("{glyph} uses a gradient, COLRv0 will paint it {color}");
    warnings.push(Warning::GradientDropped {
        glyph: glyph.clone(),
        color,
    });
    Some(color)
}

/// COLRv0 has no transforms, a transformed layer needs an outline of its own.
fn colr0_layers(
    color_glyph: &ColorGlyph,
    palette: &ColorPalette,
    glyph_order: &mut GlyphOrder,
    cache: &mut GlyphReuseCache,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<Layer>, Error> {
    let mut layers = Vec::new();
    for root in color_glyph.painted_layers.iter() {
        for (paint, transform) in root.breadth_first() {
            let ir::Paint::Glyph { glyph, paint } = paint else {
                continue;
            };
            let mut name = glyph_ref_name(&color_glyph.name, glyph)?.clone();
            let color = first_color(&color_glyph.name, paint, warnings).ok_or_else(|| {
                Error::UnresolvedReference(format!("a color for {name} in {}", color_glyph.name))
            })?;
            if !is_identity(transform) {
                name = cache.create_transformed_glyph(&color_glyph.name, &name, transform, glyph_order)?;
            }
            layers.push(Layer::new(
                glyph_id(glyph_order, &name)?,
                palette.palette_index(&color_glyph.name, color)?,
            ));
        }
    }
    Ok(layers)
}

/// Generate a COLRv0 table, each painted glyph a layer in its first color.
///
/// Anything that isn't a solid color is lost, which is reported as a warning.
pub fn colr_v0(
    glyphs: &[ColorGlyph],
    palette: &ColorPalette,
    glyph_order: &mut GlyphOrder,
    cache: &mut GlyphReuseCache,
) -> Result<(Colr, Vec<Warning>), Error> {
    let mut warnings = Vec::new();
    let mut base_glyphs = Vec::with_capacity(glyphs.len());
    let mut layers = Vec::new();
    for (gid, color_glyph) in sorted_by_gid(glyphs, glyph_order)? {
        let glyph_layers = colr0_layers(color_glyph, palette, glyph_order, cache, &mut warnings)?;
        if layers.len() + glyph_layers.len() > u16::MAX as usize {
            return Err(Error::OutOfBounds {
                what: "COLRv0 layer records".to_string(),
                value: (layers.len() + glyph_layers.len()).to_string(),
            });
        }
        base_glyphs.push(BaseGlyph::new(
            gid,
            layers.len() as u16,
            glyph_layers.len() as u16,
        ));
        layers.extend(glyph_layers);
    }
    debug!(
        "COLRv0 has {} base glyphs and {} layers",
        base_glyphs.len(),
        layers.len()
    );
    let num_base_glyphs = base_glyphs.len() as u16;
    let num_layers = layers.len() as u16;
    let colr = Colr::new(num_base_glyphs, Some(base_glyphs), Some(layers), num_layers);
    Ok((colr, warnings))
}

/// Merge directly nested transforms into one, as compact as it can be.
pub fn collapse_transforms(paint: &Arc<ir::Paint>) -> Arc<ir::Paint> {
    mutate(paint, &mut |node| {
        let Some((outer, child)) = node.as_transform() else {
            return node;
        };
        let Some((inner, grandchild)) = child.as_transform() else {
            return node;
        };
        let combined = compose_ltr(&[inner.affine(), outer.affine()]);
        match ir::Paint::transformed(combined, grandchild.clone()) {
            Ok(collapsed) => collapsed,
            Err(e) => {
                trace!("keeping nested transforms, {e}");
                node
            }
        }
    })
}

fn fword(glyph: &GlyphName, what: &str, value: f64) -> Result<FWord, Error> {
    let rounded = value.round();
    if !int16_safe(&[rounded]) {
        return Err(Error::OutOfBounds {
            what: format!("{what} of {glyph}"),
            value: value.to_string(),
        });
    }
    Ok(FWord::new(rounded as i16))
}

fn ufword(glyph: &GlyphName, what: &str, value: f64) -> Result<UfWord, Error> {
    let rounded = value.round();
    if !uint16_safe(&[rounded]) {
        return Err(Error::OutOfBounds {
            what: format!("{what} of {glyph}"),
            value: value.to_string(),
        });
    }
    Ok(UfWord::new(rounded as u16))
}

fn f2dot14(value: f64) -> F2Dot14 {
    F2Dot14::from_f32(value as f32)
}

/// COLR angles are in half turns
fn angle(degrees: f64) -> F2Dot14 {
    f2dot14(degrees / 180.0)
}

fn to_colr_extend(extend: ir::Extend) -> Extend {
    match extend {
        ir::Extend::Pad => Extend::Pad,
        ir::Extend::Repeat => Extend::Repeat,
        ir::Extend::Reflect => Extend::Reflect,
    }
}

/// Builds the COLRv1 paints of base glyphs, sharing a layer list between them
struct ColrV1Builder<'a> {
    palette: &'a ColorPalette,
    glyph_order: &'a GlyphOrder,
    layers: Vec<Paint>,
    /// What each entry of `layers` was made from
    ir_layers: Vec<Arc<ir::Paint>>,
}

impl ColrV1Builder<'_> {
    fn to_colr_line(
        &self,
        glyph: &GlyphName,
        extend: ir::Extend,
        stops: &[ir::ColorStop],
    ) -> Result<ColorLine, Error> {
        let mut color_stops = Vec::with_capacity(stops.len());
        for stop in stops {
            color_stops.push(ColorStop::new(
                f2dot14(stop.offset),
                self.palette.palette_index(glyph, stop.color.opaque())?,
                f2dot14(stop.color.alpha() as f64),
            ));
        }
        Ok(ColorLine::new(
            to_colr_extend(extend),
            stops.len() as u16,
            color_stops,
        ))
    }

    fn center(&self, glyph: &GlyphName, center: Point) -> Result<(FWord, FWord), Error> {
        Ok((
            fword(glyph, "center", center.x)?,
            fword(glyph, "center", center.y)?,
        ))
    }

    fn to_colr_paint(&mut self, glyph: &GlyphName, paint: &ir::Paint) -> Result<Paint, Error> {
        let colr_paint = match paint {
            ir::Paint::Solid(color) => Paint::Solid(PaintSolid::new(
                self.palette.palette_index(glyph, color.opaque())?,
                f2dot14(color.alpha() as f64),
            )),
            ir::Paint::LinearGradient(linear) => {
                Paint::LinearGradient(PaintLinearGradient::new(
                    self.to_colr_line(glyph, linear.extend, &linear.stops)?,
                    fword(glyph, "x0", linear.p0.x)?,
                    fword(glyph, "y0", linear.p0.y)?,
                    fword(glyph, "x1", linear.p1.x)?,
                    fword(glyph, "y1", linear.p1.y)?,
                    fword(glyph, "x2", linear.p2.x)?,
                    fword(glyph, "y2", linear.p2.y)?,
                ))
            }
            ir::Paint::RadialGradient(radial) => {
                Paint::RadialGradient(PaintRadialGradient::new(
                    self.to_colr_line(glyph, radial.extend, &radial.stops)?,
                    fword(glyph, "x0", radial.c0.x)?,
                    fword(glyph, "y0", radial.c0.y)?,
                    ufword(glyph, "r0", radial.r0)?,
                    fword(glyph, "x1", radial.c1.x)?,
                    fword(glyph, "y1", radial.c1.y)?,
                    ufword(glyph, "r1", radial.r1)?,
                ))
            }
            ir::Paint::Glyph {
                glyph: glyph_ref,
                paint,
            } => {
                let gid = glyph_id(self.glyph_order, glyph_ref_name(glyph, glyph_ref)?)?;
                Paint::Glyph(PaintGlyph::new(self.to_colr_paint(glyph, paint)?, gid))
            }
            ir::Paint::ColrGlyph(name) => {
                Paint::ColrGlyph(PaintColrGlyph::new(glyph_id(self.glyph_order, name)?))
            }
            ir::Paint::ColrLayers(layers) => self.colr_layers(glyph, layers)?,
            ir::Paint::Composite {
                mode: ir::CompositeMode::SrcIn,
                source,
                backdrop,
            } => Paint::Composite(PaintComposite::new(
                self.to_colr_paint(glyph, source)?,
                CompositeMode::SrcIn,
                self.to_colr_paint(glyph, backdrop)?,
            )),
            ir::Paint::Transform { transform, paint } => {
                let [xx, yx, xy, yy, dx, dy] = transform.as_coeffs().map(Fixed::from_f64);
                Paint::Transform(PaintTransform::new(
                    self.to_colr_paint(glyph, paint)?,
                    Affine2x3::new(xx, yx, xy, yy, dx, dy),
                ))
            }
            ir::Paint::Translate { dx, dy, paint } => Paint::Translate(PaintTranslate::new(
                self.to_colr_paint(glyph, paint)?,
                fword(glyph, "dx", *dx)?,
                fword(glyph, "dy", *dy)?,
            )),
            ir::Paint::ScaleUniform {
                scale,
                center,
                paint,
            } => {
                let child = self.to_colr_paint(glyph, paint)?;
                match center {
                    None => Paint::ScaleUniform(PaintScaleUniform::new(child, f2dot14(*scale))),
                    Some(center) => {
                        let (cx, cy) = self.center(glyph, *center)?;
                        Paint::ScaleUniformAroundCenter(PaintScaleUniformAroundCenter::new(
                            child,
                            f2dot14(*scale),
                            cx,
                            cy,
                        ))
                    }
                }
            }
            ir::Paint::Scale {
                sx,
                sy,
                center,
                paint,
            } => {
                let child = self.to_colr_paint(glyph, paint)?;
                match center {
                    None => Paint::Scale(PaintScale::new(child, f2dot14(*sx), f2dot14(*sy))),
                    Some(center) => {
                        let (cx, cy) = self.center(glyph, *center)?;
                        Paint::ScaleAroundCenter(PaintScaleAroundCenter::new(
                            child,
                            f2dot14(*sx),
                            f2dot14(*sy),
                            cx,
                            cy,
                        ))
                    }
                }
            }
            ir::Paint::Rotate {
                angle: degrees,
                center,
                paint,
            } => {
                let child = self.to_colr_paint(glyph, paint)?;
                match center {
                    None => Paint::Rotate(PaintRotate::new(child, angle(*degrees))),
                    Some(center) => {
                        let (cx, cy) = self.center(glyph, *center)?;
                        Paint::RotateAroundCenter(PaintRotateAroundCenter::new(
                            child,
                            angle(*degrees),
                            cx,
                            cy,
                        ))
                    }
                }
            }
            ir::Paint::Skew {
                x_angle,
                y_angle,
                center,
                paint,
            } => {
                let child = self.to_colr_paint(glyph, paint)?;
                match center {
                    None => Paint::Skew(PaintSkew::new(child, angle(*x_angle), angle(*y_angle))),
                    Some(center) => {
                        let (cx, cy) = self.center(glyph, *center)?;
                        Paint::SkewAroundCenter(PaintSkewAroundCenter::new(
                            child,
                            angle(*x_angle),
                            angle(*y_angle),
                            cx,
                            cy,
                        ))
                    }
                }
            }
        };
        Ok(colr_paint)
    }

    /// A layer list paint, reusing a run of layers we already emitted if possible
    fn colr_layers(&mut self, glyph: &GlyphName, layers: &[Arc<ir::Paint>]) -> Result<Paint, Error> {
        let mut layers = layers.to_vec();
        while layers.len() > MAX_LAYERS {
            layers = layers
                .chunks(MAX_LAYERS)
                .map(|chunk| match chunk {
                    [single] => single.clone(),
                    _ => Arc::new(ir::Paint::ColrLayers(chunk.to_vec())),
                })
                .collect();
        }

        if let Some(start) = self
            .ir_layers
            .windows(layers.len().max(1))
            .position(|run| run == layers.as_slice())
        {
            trace!("{glyph} reuses {} layers at {start}", layers.len());
            return Ok(Paint::ColrLayers(PaintColrLayers::new(
                layers.len() as u8,
                start as u32,
            )));
        }

        // children first, they may add layers of their own
        let paints = layers
            .iter()
            .map(|layer| self.to_colr_paint(glyph, layer))
            .collect::<Result<Vec<_>, _>>()?;
        let start = self.layers.len();
        self.layers.extend(paints);
        self.ir_layers.extend(layers.iter().cloned());
        Ok(Paint::ColrLayers(PaintColrLayers::new(
            layers.len() as u8,
            start as u32,
        )))
    }
}

/// Bounds of everything a paint draws, in font units
fn paint_bounds(
    paint: &ir::Paint,
    cache: &GlyphReuseCache,
    base_bounds: &HashMap<GlyphName, Rect>,
) -> Result<Option<Rect>, Error> {
    let mut bounds: Option<Rect> = None;
    for (node, transform) in paint.breadth_first() {
        let node_bounds = match node {
            ir::Paint::Glyph {
                glyph: GlyphRef::Name(name),
                ..
            } => cache.bounds(name, transform)?,
            ir::Paint::ColrGlyph(name) => base_bounds
                .get(name)
                .map(|r| transform.transform_rect_bbox(*r)),
            _ => None,
        };
        if let Some(node_bounds) = node_bounds {
            bounds = Some(match bounds {
                Some(b) => b.union(node_bounds),
                None => node_bounds,
            });
        }
    }
    Ok(bounds)
}

fn clip_box(glyph: &GlyphName, bounds: Rect) -> Result<ClipBox, Error> {
    Ok(ClipBox::format_1(
        fword(glyph, "clip x_min", bounds.x0.floor())?,
        fword(glyph, "clip y_min", bounds.y0.floor())?,
        fword(glyph, "clip x_max", bounds.x1.ceil())?,
        fword(glyph, "clip y_max", bounds.y1.ceil())?,
    ))
}

/// Generate a COLRv1 table.
pub fn colr_v1(
    glyphs: &[ColorGlyph],
    palette: &ColorPalette,
    glyph_order: &GlyphOrder,
    cache: &GlyphReuseCache,
) -> Result<Colr, Error> {
    let mut builder = ColrV1Builder {
        palette,
        glyph_order,
        layers: Vec::new(),
        ir_layers: Vec::new(),
    };
    let mut base_glyphs = Vec::with_capacity(glyphs.len());
    let mut emitted: Vec<(GlyphName, Arc<ir::Paint>)> = Vec::new();
    let mut base_bounds = HashMap::new();
    let mut clips = Vec::<Clip>::new();

    for (gid, color_glyph) in sorted_by_gid(glyphs, glyph_order)? {
        let paint = collapse_transforms(&color_glyph.paint());
        let same_as = emitted
            .iter()
            .find(|(_, p)| *p == paint)
            .map(|(name, _)| name.clone());
        let paint = match same_as {
            Some(name) => {
                debug!("{} paints the same as {name}", color_glyph.name);
                Arc::new(ir::Paint::ColrGlyph(name))
            }
            None => {
                emitted.push((color_glyph.name.clone(), paint.clone()));
                paint
            }
        };
        base_glyphs.push(BaseGlyphPaint::new(
            gid,
            builder.to_colr_paint(&color_glyph.name, &paint)?,
        ));

        let Some(bounds) = paint_bounds(&paint, cache, &base_bounds)? else {
            continue;
        };
        base_bounds.insert(color_glyph.name.clone(), bounds);
        let next_clip = clip_box(&color_glyph.name, bounds)?;
        let extends_run = clips
            .last()
            .map(|curr| {
                curr.end_glyph_id.to_u32() + 1 == gid.to_u32() && *curr.clip_box == next_clip
            })
            .unwrap_or(false);
        match clips.last_mut() {
            Some(curr) if extends_run => curr.end_glyph_id = gid,
            _ => clips.push(Clip::new(gid, gid, next_clip)),
        }
    }

    debug!(
        "COLRv1 has {} base glyphs, {} layers and {} clips",
        base_glyphs.len(),
        builder.layers.len(),
        clips.len()
    );
    let mut colr = Colr::new(0, None, None, 0);
    colr.base_glyph_list = BaseGlyphList::new(base_glyphs.len() as u32, base_glyphs).into();
    if !builder.layers.is_empty() {
        let mut layer_list = LayerList::default();
        layer_list.num_layers = builder.layers.len() as u32;
        layer_list.paints = builder.layers.into_iter().map(Into::into).collect();
        colr.layer_list = layer_list.into();
    }
    if !clips.is_empty() {
        colr.clip_list = ClipList::new(1, clips.len() as u32, clips).into();
    }
    Ok(colr)
}
