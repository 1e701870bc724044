//! Building the paint tree of a color glyph from its restricted svg.

use std::sync::Arc;

use kurbo::{Affine, Point, Rect, Shape, Vec2};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use emojidrasil::{
    transform::{compose_ltr, is_degenerate, is_identity, rect_to_rect},
    types::GlyphName,
};

use crate::{
    color::Color,
    config::FontConfig,
    error::Error,
    paint::{ColorStop, CompositeMode, GlyphRef, LinearGradient, Paint, RadialGradient},
    parts::ReusableParts,
    shape::{parse_path, transform_path},
    svg::{Fill, GradientGeometry, GradientUnits, SvgDocument, SvgGroup, SvgNode, SvgShape},
    warning::Warning,
};

const FLIP_Y: Affine = Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, 0.0]);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColorGlyph {
    pub name: GlyphName,
    /// Only changes when color glyphs are regrouped
    pub glyph_id: u32,
    pub codepoints: Vec<u32>,
    pub advance_width: u16,
    pub view_box: Option<Rect>,
    pub user_transform: Affine,
    /// Bottom to top, geometry in font units
    pub painted_layers: Vec<Arc<Paint>>,
}

/// Advance width for a view box, wide view boxes widen the glyph to keep their aspect.
pub fn advance_width(config: &FontConfig, view_box: Option<Rect>) -> u16 {
    let Some(view_box) = view_box else {
        return config.width;
    };
    let proportional = (config.line_height() * view_box.width() / view_box.height()).round();
    config.width.max(proportional.clamp(0.0, u16::MAX as f64) as u16)
}

/// Fit the view box to the line height, centered in the advance, still y-down
fn scale_to_metrics(config: &FontConfig, view_box: Rect) -> Affine {
    let scale = config.line_height() / view_box.height();
    let width = advance_width(config, Some(view_box)) as f64;
    let dx = (width - scale * view_box.width()) / 2.0;
    compose_ltr(&[
        Affine::translate((-view_box.x0, -view_box.y0)),
        Affine::new([scale, 0.0, 0.0, scale, dx, 0.0]),
    ])
}

/// Maps view box coordinates to font units, y-up.
pub fn view_box_to_font(config: &FontConfig, view_box: Option<Rect>) -> Affine {
    let Some(view_box) = view_box else {
        return Affine::IDENTITY;
    };
    compose_ltr(&[
        scale_to_metrics(config, view_box),
        Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, config.ascender as f64]),
        config.transform,
    ])
}

/// Maps view box coordinates to the y-down space of the OpenType SVG table.
pub fn view_box_to_otsvg(config: &FontConfig, view_box: Option<Rect>) -> Affine {
    if view_box.is_none() {
        return Affine::IDENTITY;
    }
    compose_ltr(&[view_box_to_font(config, view_box), FLIP_Y])
}

/// Maps a glyph's view box onto the view box of the reusable parts
pub fn view_box_to_parts(parts: &ReusableParts, view_box: Option<Rect>) -> Affine {
    match view_box {
        Some(view_box) if view_box != parts.view_box => rect_to_rect(view_box, parts.view_box),
        _ => Affine::IDENTITY,
    }
}

/// Register every shape of `svg` for reuse.
///
/// Has to happen for every glyph before any glyph is built.
pub fn register_shapes(parts: &mut ReusableParts, svg: &SvgDocument) -> Result<(), Error> {
    let to_parts = view_box_to_parts(parts, svg.view_box);
    for shape in svg.shapes() {
        parts.add(&transform_path(&shape.d, to_parts)?)?;
    }
    Ok(())
}

impl ColorGlyph {
    /// Build a color glyph, returning it and anything that was lost on the way.
    ///
    /// `parts` must already hold the shapes of every glyph, see [`register_shapes`].
    pub fn create(
        config: &FontConfig,
        parts: &ReusableParts,
        name: GlyphName,
        glyph_id: u32,
        codepoints: Vec<u32>,
        svg: &SvgDocument,
    ) -> Result<(ColorGlyph, Vec<Warning>), Error> {
        let mut warnings = Vec::new();
        if svg.view_box.is_none() {
            warn!("{name} has no view box, using the identity transform");
            warnings.push(Warning::MissingViewBox {
                glyph: name.clone(),
            });
        }

        let mut glyph = ColorGlyph {
            advance_width: advance_width(config, svg.view_box),
            name,
            glyph_id,
            codepoints,
            view_box: svg.view_box,
            user_transform: config.transform,
            painted_layers: Vec::new(),
        };

        let font_transform = view_box_to_font(config, svg.view_box);
        if is_degenerate(font_transform) {
            debug!("{} has a degenerate transform, nothing to paint", glyph.name);
            return Ok((glyph, warnings));
        }

        let mut builder = PaintBuilder {
            glyph: &glyph.name,
            svg,
            parts,
            font_transform,
            to_parts: view_box_to_parts(parts, svg.view_box),
            parts_to_font: view_box_to_font(config, Some(parts.view_box)),
            warnings,
        };
        let painted_layers = svg
            .nodes
            .iter()
            .map(|node| builder.node_paint(node))
            .collect::<Result<Vec<_>, _>>()?;
        let warnings = builder.warnings;
        glyph.painted_layers = painted_layers;
        Ok((glyph, warnings))
    }

    pub fn transform_for_font_space(&self, config: &FontConfig) -> Affine {
        view_box_to_font(config, self.view_box)
    }

    pub fn transform_for_otsvg_space(&self, config: &FontConfig) -> Affine {
        view_box_to_otsvg(config, self.view_box)
    }

    /// The paint of the whole glyph, a single layer or a layer list
    pub fn paint(&self) -> Arc<Paint> {
        match self.painted_layers.as_slice() {
            [single] => single.clone(),
            layers => Arc::new(Paint::ColrLayers(layers.to_vec())),
        }
    }
}

struct PaintBuilder<'a> {
    glyph: &'a GlyphName,
    svg: &'a SvgDocument,
    parts: &'a ReusableParts,
    /// view box to font units
    font_transform: Affine,
    /// view box to the reusable parts view box
    to_parts: Affine,
    /// parts view box to font units
    parts_to_font: Affine,
    warnings: Vec<Warning>,
}

impl PaintBuilder<'_> {
    fn node_paint(&mut self, node: &SvgNode) -> Result<Arc<Paint>, Error> {
        match node {
            SvgNode::Shape(shape) => self.shape_paint(shape),
            SvgNode::Group(group) => self.group_paint(group),
        }
    }

    /// Groups are only allowed to apply opacity to several children
    fn group_paint(&mut self, group: &SvgGroup) -> Result<Arc<Paint>, Error> {
        if !group.other_attributes.is_empty() {
            return Err(Error::malformed(format!(
                "{}: groups may only set opacity, found {:?}",
                self.glyph, group.other_attributes
            )));
        }
        let opacity = group.opacity.unwrap_or(1.0);
        if !(opacity > 0.0 && opacity < 1.0) || group.children.len() < 2 {
            return Err(Error::malformed(format!(
                "{}: a group must have opacity in (0, 1) and at least 2 children, has opacity {opacity} and {} children",
                self.glyph,
                group.children.len()
            )));
        }
        let children = group
            .children
            .iter()
            .map(|node| self.node_paint(node))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(Paint::Composite {
            mode: CompositeMode::SrcIn,
            source: Arc::new(Paint::ColrLayers(children)),
            backdrop: Arc::new(Paint::Solid(Color::BLACK.multiply_alpha(opacity))),
        }))
    }

    fn shape_paint(&mut self, shape: &SvgShape) -> Result<Arc<Paint>, Error> {
        let bbox = parse_path(&shape.d)?.bounding_box();
        let parts_path = transform_path(&shape.d, self.to_parts)?;
        let glyph_parts_to_font = compose_ltr(&[self.to_parts.inverse(), self.font_transform]);
        let font_path = transform_path(&parts_path, glyph_parts_to_font)?;

        let reuse = self.parts.try_reuse(&parts_path)?;
        if let Some(warning) = reuse.warning {
            self.warnings.push(warning);
        }
        let unshared = |builder: &Self| -> Result<Arc<Paint>, Error> {
            let fill = builder.fill_paint(shape, bbox, builder.font_transform)?;
            Ok(Paint::glyph(GlyphRef::Path(font_path.clone()), fill))
        };
        // in the parts view box an unshared path is already the donor's outline
        let same_frame = self.to_parts == Affine::IDENTITY;
        if is_identity(reuse.transform) && (same_frame || !self.parts.is_reused(&parts_path)?) {
            return unshared(self);
        }

        // donors always go to font units through the parts view box
        let donor_path = transform_path(&reuse.shape, self.parts_to_font)?;
        let font_reuse = compose_ltr(&[
            self.parts_to_font.inverse(),
            reuse.transform,
            self.to_parts.inverse(),
            self.font_transform,
        ]);
        // the fill is drawn under the reuse transform too
        let fill = self.fill_paint(
            shape,
            bbox,
            compose_ltr(&[self.font_transform, font_reuse.inverse()]),
        )?;
        match Paint::transformed(font_reuse, Paint::glyph(GlyphRef::Path(donor_path), fill)) {
            Ok(paint) => Ok(paint),
            Err(e) => {
                warn!("{}: not reusing '{}', {e}", self.glyph, reuse.shape);
                self.warnings.push(Warning::ReuseOverflow {
                    shape: parts_path,
                    transform: font_reuse,
                });
                unshared(self)
            }
        }
    }

    /// The fill of `shape` with geometry mapped from the view box by `transform`
    fn fill_paint(
        &self,
        shape: &SvgShape,
        bbox: Rect,
        transform: Affine,
    ) -> Result<Arc<Paint>, Error> {
        let id = match &shape.fill {
            Fill::Color(color) => {
                return Ok(Arc::new(Paint::Solid(color.multiply_alpha(shape.opacity))))
            }
            Fill::Url(id) => id,
        };
        let gradient = self.svg.gradient(id)?;
        let to_view_box = match gradient.units {
            GradientUnits::UserSpaceOnUse => Affine::IDENTITY,
            GradientUnits::ObjectBoundingBox => {
                if bbox.width() == 0.0 || bbox.height() == 0.0 {
                    return Err(Error::malformed(format!(
                        "{}: gradient {id} is relative to an empty bounding box",
                        self.glyph
                    )));
                }
                rect_to_rect(Rect::new(0.0, 0.0, 1.0, 1.0), bbox)
            }
        };
        let stops = gradient
            .stops
            .iter()
            .map(|stop| ColorStop {
                offset: stop.offset,
                color: stop.color.multiply_alpha(shape.opacity),
            })
            .collect();

        let paint = match gradient.geometry {
            GradientGeometry::Linear { x1, y1, x2, y2 } => {
                let p0 = Point::new(x1, y1);
                let p1 = Point::new(x2, y2);
                let v = p1 - p0;
                Paint::LinearGradient(LinearGradient {
                    extend: gradient.extend,
                    stops,
                    p0,
                    p1,
                    // p1 rotated 90 degrees around p0
                    p2: p0 + Vec2::new(-v.y, v.x),
                })
            }
            GradientGeometry::Radial {
                cx,
                cy,
                r,
                fx,
                fy,
                fr,
            } => Paint::RadialGradient(RadialGradient {
                extend: gradient.extend,
                stops,
                c0: Point::new(fx, fy),
                c1: Point::new(cx, cy),
                r0: fr,
                r1: r,
            }),
        };
        Arc::new(paint)
            .transform_gradient(compose_ltr(&[gradient.transform, to_view_box, transform]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::affine_between;
    use emojidrasil::transform::{almost_equal_affine, RestrictedTransform};
    use pretty_assertions::assert_eq;

    fn create(
        config: &FontConfig,
        svgs: &[&str],
    ) -> Vec<Result<(ColorGlyph, Vec<Warning>), Error>> {
        let docs: Vec<_> = svgs
            .iter()
            .map(|s| SvgDocument::parse(s).unwrap())
            .collect();
        let view_box = docs
            .iter()
            .find_map(|d| d.view_box)
            .unwrap_or_else(|| config.em_square());
        let mut parts = ReusableParts::new(view_box, config.reuse_tolerance);
        for doc in docs.iter() {
            register_shapes(&mut parts, doc).unwrap();
        }
        parts.compute_donors().unwrap();
        docs.iter()
            .enumerate()
            .map(|(i, doc)| {
                ColorGlyph::create(
                    config,
                    &parts,
                    GlyphName::new(format!("g{i}")),
                    i as u32 + 1,
                    vec![0xe000 + i as u32],
                    doc,
                )
            })
            .collect()
    }

    fn create_one(config: &FontConfig, svg: &str) -> (ColorGlyph, Vec<Warning>) {
        create(config, &[svg]).remove(0).unwrap()
    }

    fn glyph_paint(paint: &Paint) -> (&GlyphRef, &Arc<Paint>) {
        let Paint::Glyph { glyph, paint } = paint else {
            panic!("Expected a glyph paint, got {paint:?}");
        };
        (glyph, paint)
    }

    #[test]
    fn font_transform_fits_metrics() {
        let config = FontConfig::default();
        let view_box = Some(Rect::new(0.0, 0.0, 128.0, 128.0));
        let transform = view_box_to_font(&config, view_box);
        assert_eq!(Point::new(37.5, 950.0), transform * Point::new(0.0, 0.0));
        assert_eq!(Point::new(1237.5, -250.0), transform * Point::new(128.0, 128.0));

        let otsvg = view_box_to_otsvg(&config, view_box);
        assert_eq!(Point::new(37.5, -950.0), otsvg * Point::new(0.0, 0.0));
        assert_eq!(Point::new(1237.5, 250.0), otsvg * Point::new(128.0, 128.0));
    }

    #[test]
    fn wide_view_box_widens_advance() {
        let config = FontConfig::default();
        assert_eq!(1275, advance_width(&config, Some(Rect::new(0.0, 0.0, 10.0, 10.0))));
        assert_eq!(2400, advance_width(&config, Some(Rect::new(0.0, 0.0, 20.0, 10.0))));
        assert_eq!(1275, advance_width(&config, None));
    }

    #[test]
    fn solid_shape() {
        let (glyph, warnings) = create_one(
            &FontConfig::default(),
            r#"<svg viewBox="0 0 128 128"><path d="M0,0 L128,0 L128,128 Z" fill="red" opacity="0.5"/></svg>"#,
        );
        assert!(warnings.is_empty());
        assert_eq!(1275, glyph.advance_width);
        assert_eq!(1, glyph.painted_layers.len());
        let (outline, fill) = glyph_paint(&glyph.painted_layers[0]);
        assert_eq!(
            &GlyphRef::Path("M37.5,950 L1237.5,950 L1237.5,-250 Z".to_string()),
            outline
        );
        assert_eq!(Paint::Solid(Color::rgba(255, 0, 0, 0.5)), **fill);
    }

    #[test]
    fn group_opacity_is_a_composite() {
        let (glyph, _) = create_one(
            &FontConfig::default(),
            r#"<svg viewBox="0 0 128 128">
                <g opacity="0.5">
                  <path d="M0,0 L10,0 L10,10 Z" fill="red"/>
                  <path d="M20,20 L40,20 L40,40 L20,40 Z" fill="blue"/>
                </g>
            </svg>"#,
        );
        let Paint::Composite {
            mode,
            source,
            backdrop,
        } = glyph.painted_layers[0].as_ref()
        else {
            panic!("Expected a composite, got {:?}", glyph.painted_layers[0]);
        };
        assert_eq!(CompositeMode::SrcIn, *mode);
        assert_eq!(Paint::Solid(Color::rgba(0, 0, 0, 0.5)), **backdrop);
        let Paint::ColrLayers(layers) = source.as_ref() else {
            panic!("Expected layers, got {source:?}");
        };
        assert_eq!(2, layers.len());
        assert!(layers
            .iter()
            .all(|l| matches!(l.as_ref(), Paint::Glyph { .. })));
    }

    #[test]
    fn group_without_fractional_opacity_is_rejected() {
        for svg in [
            r#"<svg viewBox="0 0 10 10"><g opacity="1"><path d="M0,0 L1,0 L1,1 Z"/><path d="M2,2 L3,2 L3,4 Z"/></g></svg>"#,
            r#"<svg viewBox="0 0 10 10"><g opacity="0.5"><path d="M0,0 L1,0 L1,1 Z"/></g></svg>"#,
            r#"<svg viewBox="0 0 10 10"><g opacity="0.5" fill="red"><path d="M0,0 L1,0 L1,1 Z"/><path d="M2,2 L3,2 L3,4 Z"/></g></svg>"#,
        ] {
            let result = create(&FontConfig::default(), &[svg]).remove(0);
            assert!(matches!(result, Err(Error::MalformedInput(..))), "{svg}");
        }
    }

    #[test]
    fn unresolved_gradient() {
        let result = create(
            &FontConfig::default(),
            &[r#"<svg viewBox="0 0 10 10"><path d="M0,0 L1,0 L1,1 Z" fill="url(#missing)"/></svg>"#],
        )
        .remove(0);
        assert!(matches!(result, Err(Error::UnresolvedReference(..))));
    }

    #[test]
    fn radial_on_non_square_bbox_keeps_remainder() {
        let (glyph, _) = create_one(
            &FontConfig::default(),
            r##"<svg viewBox="0 0 128 128">
                <defs>
                  <radialGradient id="r">
                    <stop offset="0" stop-color="white"/>
                    <stop offset="1" stop-color="black"/>
                  </radialGradient>
                </defs>
                <path d="M0,0 L100,0 L100,50 L0,50 Z" fill="url(#r)"/>
            </svg>"##,
        );
        let (_, fill) = glyph_paint(&glyph.painted_layers[0]);
        let Some((remainder, child)) = fill.as_transform() else {
            panic!("Expected a transform around the radial, got {fill:?}");
        };
        assert!(!almost_equal_affine(
            remainder.affine(),
            Affine::IDENTITY,
            1e-6
        ));
        let Paint::RadialGradient(radial) = child.as_ref() else {
            panic!("Expected a radial, got {child:?}");
        };
        assert_eq!(
            vec![
                ColorStop {
                    offset: 0.0,
                    color: Color::rgb(255, 255, 255)
                },
                ColorStop {
                    offset: 1.0,
                    color: Color::BLACK
                }
            ],
            radial.stops
        );
    }

    #[test]
    fn linear_gradient_gets_perpendicular_p2() {
        let config = FontConfig {
            width: 100,
            ascender: 100,
            descender: 0,
            ..Default::default()
        };
        let (glyph, _) = create_one(
            &config,
            r##"<svg viewBox="0 0 100 100">
                <defs>
                  <linearGradient id="l" gradientUnits="userSpaceOnUse" x1="0" y1="0" x2="100" y2="0">
                    <stop offset="0" stop-color="red"/>
                    <stop offset="1" stop-color="blue"/>
                  </linearGradient>
                </defs>
                <path d="M0,0 L100,0 L100,100 Z" fill="url(#l)"/>
            </svg>"##,
        );
        let (_, fill) = glyph_paint(&glyph.painted_layers[0]);
        let Paint::LinearGradient(linear) = fill.as_ref() else {
            panic!("Expected a linear gradient, got {fill:?}");
        };
        assert_eq!(
            (
                Point::new(0.0, 100.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 0.0)
            ),
            (linear.p0, linear.p1, linear.p2)
        );
    }

    #[test]
    fn translated_shape_reuses_donor() {
        let config = FontConfig {
            width: 1200,
            ..Default::default()
        };
        let (glyph, _) = create_one(
            &config,
            r#"<svg viewBox="0 0 1200 1200">
                <path d="M10,10 L40,10 L40,30 L10,30 Z"/>
                <path d="M20,20 L50,20 L50,40 L20,40 Z"/>
            </svg>"#,
        );
        let (first, second) = (&glyph.painted_layers[0], &glyph.painted_layers[1]);
        let (first_outline, _) = glyph_paint(first);
        let Some((RestrictedTransform::Translate { dx, dy }, child)) = second.as_transform() else {
            panic!("Expected a translate, got {second:?}");
        };
        assert_eq!((10.0, -10.0), (dx, dy));
        let (second_outline, _) = glyph_paint(child);
        assert_eq!(first_outline, second_outline);
    }

    #[test]
    fn disabled_reuse_draws_every_shape() {
        let config = FontConfig {
            width: 1200,
            reuse_tolerance: -1.0,
            ..Default::default()
        };
        let (glyph, _) = create_one(
            &config,
            r#"<svg viewBox="0 0 1200 1200">
                <path d="M10,10 L40,10 L40,30 L10,30 Z"/>
                <path d="M20,20 L50,20 L50,40 L20,40 Z"/>
            </svg>"#,
        );
        assert!(glyph
            .painted_layers
            .iter()
            .all(|p| matches!(p.as_ref(), Paint::Glyph { .. })));
    }

    #[test]
    fn reuse_across_glyphs_shares_outline() {
        let config = FontConfig::default();
        let glyphs: Vec<_> = create(
            &config,
            &[
                r#"<svg viewBox="0 0 128 128"><path d="M10,10 L40,10 L40,30 L10,30 Z"/></svg>"#,
                r#"<svg viewBox="0 0 128 128"><path d="M20,20 L50,20 L50,40 L20,40 Z"/></svg>"#,
            ],
        )
        .into_iter()
        .map(|r| r.unwrap().0)
        .collect();

        let (donor_outline, _) = glyph_paint(&glyphs[0].painted_layers[0]);
        let Some((transform, child)) = glyphs[1].painted_layers[0].as_transform() else {
            panic!("Expected a transform, got {:?}", glyphs[1].painted_layers[0]);
        };
        let (outline, _) = glyph_paint(child);
        assert_eq!(donor_outline, outline);

        let GlyphRef::Path(donor) = donor_outline else {
            panic!("Expected a path");
        };
        let expected = transform_path(
            "M20,20 L50,20 L50,40 L20,40 Z",
            view_box_to_font(&config, Some(Rect::new(0.0, 0.0, 128.0, 128.0))),
        )
        .unwrap();
        let produced = transform_path(donor, transform.affine()).unwrap();
        assert_eq!(
            Some(Affine::IDENTITY),
            affine_between(&produced, &expected, 0.01).unwrap()
        );
    }

    #[test]
    fn reuse_across_view_boxes_shares_outline() {
        let config = FontConfig::default();
        let glyphs: Vec<_> = create(
            &config,
            &[
                r#"<svg viewBox="0 0 128 128"><path d="M0,0 L64,0 L64,64 L0,64 Z"/></svg>"#,
                r#"<svg viewBox="0 0 256 128"><path d="M64,64 L192,64 L192,128 L64,128 Z"/></svg>"#,
            ],
        )
        .into_iter()
        .map(|r| r.unwrap().0)
        .collect();

        let (donor_outline, _) = glyph_paint(&glyphs[0].painted_layers[0]);
        let Some((transform, child)) = glyphs[1].painted_layers[0].as_transform() else {
            panic!("Expected a transform, got {:?}", glyphs[1].painted_layers[0]);
        };
        let (outline, _) = glyph_paint(child);
        assert_eq!(donor_outline, outline);

        let GlyphRef::Path(donor) = donor_outline else {
            panic!("Expected a path");
        };
        let expected = transform_path(
            "M64,64 L192,64 L192,128 L64,128 Z",
            view_box_to_font(&config, Some(Rect::new(0.0, 0.0, 256.0, 128.0))),
        )
        .unwrap();
        let produced = transform_path(donor, transform.affine()).unwrap();
        assert_eq!(
            Some(Affine::IDENTITY),
            affine_between(&produced, &expected, 0.01).unwrap()
        );
    }

    #[test]
    fn missing_view_box_warns() {
        let (glyph, warnings) = create_one(
            &FontConfig::default(),
            r#"<svg><path d="M0,0 L100,0 L100,100 Z"/></svg>"#,
        );
        assert_eq!(
            vec![Warning::MissingViewBox {
                glyph: GlyphName::new("g0")
            }],
            warnings
        );
        let (outline, _) = glyph_paint(&glyph.painted_layers[0]);
        assert_eq!(&GlyphRef::Path("M0,0 L100,0 L100,100 Z".to_string()), outline);
    }

    #[test]
    fn degenerate_transform_paints_nothing() {
        let config = FontConfig {
            transform: Affine::scale_non_uniform(1.0, 0.0),
            ..Default::default()
        };
        let (glyph, _) = create_one(
            &config,
            r#"<svg viewBox="0 0 10 10"><path d="M0,0 L1,0 L1,1 Z"/></svg>"#,
        );
        assert!(glyph.painted_layers.is_empty());
    }
}
