//! Generates the documents of an [SVG](https://learn.microsoft.com/en-us/typography/opentype/spec/svg) table.
//!
//! Each group of glyphs becomes one document, each glyph a `<g id="glyph{gid}">`
//! in it. A path drawn more than once is written once and referenced with
//! `<use>`, moving it into `<defs>` when the references need a different fill.

use std::{collections::HashMap, io::Write, sync::Arc};

use flate2::{write::GzEncoder, Compression};
use kurbo::{Affine, Point, Rect, Vec2};
use log::{debug, warn};
use quick_xml::{
    events::{BytesEnd, BytesStart, Event},
    Writer,
};

use emojidrasil::{
    fixed::almost_equal,
    transform::{compose_ltr, decompose_uniform, is_degenerate, is_identity},
    types::GlyphName,
};
use emojiir::{
    color::Color,
    color_glyph::ColorGlyph,
    paint::{ColorStop, CompositeMode, Extend, GlyphRef, LinearGradient, Paint, RadialGradient},
    shape::{format_number, transform_path},
    warning::Warning,
};

use crate::error::{Error, GlyphProblem};

/// Font units are y-up, OT-SVG is y-down
pub const FONT_TO_OTSVG: Affine = Affine::FLIP_Y;

const ROOT: usize = 0;
const DEFS: usize = 1;

type Attributes = Vec<(&'static str, String)>;

#[derive(Debug, Clone)]
struct Element {
    name: &'static str,
    attributes: Attributes,
    children: Vec<usize>,
}

impl Element {
    fn new(name: &'static str) -> Self {
        Element {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &'static str, value: String) {
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key, value)),
        }
    }

    fn remove(&mut self, key: &str) {
        self.attributes.retain(|(k, _)| *k != key);
    }
}

/// A path we already wrote and can point a `<use>` at
#[derive(Debug, Clone)]
struct ReusableShape {
    element: usize,
    /// Font units to the coordinates the element was written in
    to_doc: Affine,
    glyph: GlyphName,
    fill: Attributes,
    in_defs: bool,
}

/// Format a transform for a `transform` or `gradientTransform` attribute
pub fn format_transform(transform: Affine) -> String {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    if almost_equal(a, 1.0) && almost_equal(b, 0.0) && almost_equal(c, 0.0) && almost_equal(d, 1.0)
    {
        return format!("translate({} {})", format_number(e), format_number(f));
    }
    format!(
        "matrix({} {} {} {} {} {})",
        format_number(a),
        format_number(b),
        format_number(c),
        format_number(d),
        format_number(e),
        format_number(f)
    )
}

/// One svg document, built glyph by glyph
#[derive(Debug, Clone)]
pub struct SvgDocumentBuilder {
    elements: Vec<Element>,
    shapes: HashMap<String, ReusableShape>,
    /// Gradient element, formatted, to its id
    gradients: HashMap<String, String>,
    glyph_ids: Vec<u32>,
    next_shape_id: usize,
    warnings: Vec<Warning>,
}

impl Default for SvgDocumentBuilder {
    fn default() -> Self {
        let mut root = Element::new("svg");
        root.set("version", "1.1".to_string());
        root.set("xmlns", "http://www.w3.org/2000/svg".to_string());
        root.set("xmlns:xlink", "http://www.w3.org/1999/xlink".to_string());
        root.children.push(DEFS);
        SvgDocumentBuilder {
            elements: vec![root, Element::new("defs")],
            shapes: HashMap::new(),
            gradients: HashMap::new(),
            glyph_ids: Vec::new(),
            next_shape_id: 0,
            warnings: Vec::new(),
        }
    }
}

impl SvgDocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `viewBox` of the document
    pub fn view_box(&mut self, view_box: Rect) {
        self.elements[ROOT].set(
            "viewBox",
            format!(
                "{} {} {} {}",
                format_number(view_box.x0),
                format_number(view_box.y0),
                format_number(view_box.width()),
                format_number(view_box.height())
            ),
        );
    }

    pub fn glyph_ids(&self) -> &[u32] {
        &self.glyph_ids
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    fn push(&mut self, parent: usize, element: Element) -> usize {
        let idx = self.elements.len();
        self.elements.push(element);
        self.elements[parent].children.push(idx);
        idx
    }

    /// Add a glyph whose paint has geometry in font units.
    ///
    /// `font_to_doc` maps font units to the coordinates of this document.
    pub fn add_glyph(
        &mut self,
        glyph_id: u32,
        name: &GlyphName,
        paint: &Paint,
        font_to_doc: Affine,
    ) -> Result<(), Error> {
        let mut group = Element::new("g");
        group.set("id", format!("glyph{glyph_id}"));
        let group = self.push(ROOT, group);
        self.glyph_ids.push(glyph_id);
        self.add_paint(name, paint, Affine::IDENTITY, font_to_doc, group)
    }

    fn add_paint(
        &mut self,
        glyph: &GlyphName,
        paint: &Paint,
        transform: Affine,
        font_to_doc: Affine,
        parent: usize,
    ) -> Result<(), Error> {
        match paint {
            Paint::ColrLayers(layers) => {
                for layer in layers {
                    self.add_paint(glyph, layer, transform, font_to_doc, parent)?;
                }
                Ok(())
            }
            Paint::Glyph {
                glyph: GlyphRef::Path(d),
                paint,
            } => self.add_shape(glyph, d, paint, transform, font_to_doc, parent),
            Paint::Glyph {
                glyph: GlyphRef::Name(name),
                ..
            }
            | Paint::ColrGlyph(name) => Err(Error::UnresolvedReference(format!(
                "{glyph} refers to glyph {name}, svg needs its outline"
            ))),
            Paint::Composite {
                mode,
                source,
                backdrop,
            } => {
                match (mode, backdrop.as_ref()) {
                    // group opacity
                    (CompositeMode::SrcIn, Paint::Solid(color))
                        if color.opaque() == Color::BLACK =>
                    {
                        let mut group = Element::new("g");
                        if !color.is_opaque() {
                            group.set("opacity", format_number(color.alpha() as f64));
                        }
                        let group = self.push(parent, group);
                        self.add_paint(glyph, source, transform, font_to_doc, group)
                    }
                    _ => {
                        warn!("{glyph}: dropping the backdrop of {mode:?}, svg can't draw it");
                        self.warnings.push(Warning::UnsupportedComposite {
                            glyph: glyph.clone(),
                            mode: format!("{mode:?}"),
                        });
                        self.add_paint(glyph, source, transform, font_to_doc, parent)
                    }
                }
            }
            Paint::Solid(..) | Paint::LinearGradient(..) | Paint::RadialGradient(..) => Err(
                Error::GlyphError(glyph.clone(), GlyphProblem::FillWithoutOutline),
            ),
            Paint::Transform { .. }
            | Paint::Translate { .. }
            | Paint::ScaleUniform { .. }
            | Paint::Scale { .. }
            | Paint::Rotate { .. }
            | Paint::Skew { .. } => {
                let Some((restricted, child)) = paint.as_transform() else {
                    return Ok(());
                };
                let transform = compose_ltr(&[restricted.affine(), transform]);
                self.add_paint(glyph, child, transform, font_to_doc, parent)
            }
        }
    }

    fn add_shape(
        &mut self,
        glyph: &GlyphName,
        d: &str,
        fill: &Arc<Paint>,
        transform: Affine,
        font_to_doc: Affine,
        parent: usize,
    ) -> Result<(), Error> {
        let to_doc = compose_ltr(&[transform, font_to_doc]);
        let reusable = !is_degenerate(to_doc);
        let existing = if reusable { self.shapes.remove(d) } else { None };
        let Some(mut shape) = existing else {
            let fill = self.fill(glyph, fill, transform, font_to_doc, Affine::IDENTITY)?;
            let mut path = Element::new("path");
            path.set("d", transform_path(d, to_doc)?);
            path.attributes.extend(fill.iter().cloned());
            let element = self.push(parent, path);
            if reusable && !self.shapes.contains_key(d) {
                self.shapes.insert(
                    d.to_string(),
                    ReusableShape {
                        element,
                        to_doc,
                        glyph: glyph.clone(),
                        fill,
                        in_defs: false,
                    },
                );
            }
            return Ok(());
        };

        // maps the coordinates of the first use onto ours
        let use_transform = compose_ltr(&[shape.to_doc.inverse(), to_doc]);
        let fill = self.fill(glyph, fill, transform, font_to_doc, use_transform)?;
        let id = self.shape_id(shape.element);
        if !shape.in_defs && (shape.glyph != *glyph || shape.fill != fill) {
            self.move_to_defs(&mut shape, &id);
        }

        let mut reference = Element::new("use");
        reference.set("xlink:href", format!("#{id}"));
        if !is_identity(use_transform) {
            reference.set("transform", format_transform(use_transform));
        }
        if shape.in_defs {
            reference.attributes.extend(fill);
        }
        self.push(parent, reference);
        self.shapes.insert(d.to_string(), shape);
        Ok(())
    }

    fn shape_id(&mut self, element: usize) -> String {
        if let Some(id) = self.elements[element].get("id") {
            return id.to_string();
        }
        let id = format!("shape{}", self.next_shape_id);
        self.next_shape_id += 1;
        self.elements[element].set("id", id.clone());
        id
    }

    /// Move a path into `<defs>` without its fill, leaving a `<use>` that
    /// carries the fill where it was.
    fn move_to_defs(&mut self, shape: &mut ReusableShape, id: &str) {
        let mut reference = Element::new("use");
        reference.set("xlink:href", format!("#{id}"));
        reference.attributes.extend(shape.fill.iter().cloned());
        let mut def = std::mem::replace(&mut self.elements[shape.element], reference);
        for (key, _) in shape.fill.iter() {
            def.remove(key);
        }
        shape.element = self.push(DEFS, def);
        shape.in_defs = true;
        debug!("{id} moved to defs");
    }

    /// The fill attributes for a paint under `transform`, for an element
    /// whose coordinates are mapped by `use_transform`.
    fn fill(
        &mut self,
        glyph: &GlyphName,
        paint: &Paint,
        transform: Affine,
        font_to_doc: Affine,
        use_transform: Affine,
    ) -> Result<Attributes, Error> {
        match paint {
            Paint::Solid(color) => {
                let mut fill = vec![("fill", color.opaque().to_string())];
                if !color.is_opaque() {
                    fill.push(("opacity", format_number(color.alpha() as f64)));
                }
                Ok(fill)
            }
            Paint::LinearGradient(..) | Paint::RadialGradient(..) => {
                let to_user = compose_ltr(&[transform, font_to_doc, use_transform.inverse()]);
                let id = self.add_gradient(paint, to_user)?;
                Ok(vec![("fill", format!("url(#{id})"))])
            }
            Paint::Transform { .. }
            | Paint::Translate { .. }
            | Paint::ScaleUniform { .. }
            | Paint::Scale { .. }
            | Paint::Rotate { .. }
            | Paint::Skew { .. } => {
                let Some((restricted, child)) = paint.as_transform() else {
                    return Err(Error::GlyphError(
                        glyph.clone(),
                        GlyphProblem::FillWithoutOutline,
                    ));
                };
                let transform = compose_ltr(&[restricted.affine(), transform]);
                self.fill(glyph, child, transform, font_to_doc, use_transform)
            }
            Paint::Glyph { .. }
            | Paint::ColrGlyph(..)
            | Paint::ColrLayers(..)
            | Paint::Composite { .. } => Err(Error::UnresolvedReference(format!(
                "{glyph} fills a shape with {paint:?}, svg can only fill with a color or gradient"
            ))),
        }
    }

    /// Add a gradient to `<defs>`, or find an identical one, returning its id
    fn add_gradient(&mut self, paint: &Paint, to_user: Affine) -> Result<String, Error> {
        let (mut gradient, extend, stops) = match paint {
            Paint::LinearGradient(linear) => (
                linear_gradient(linear, to_user),
                linear.extend,
                &linear.stops,
            ),
            Paint::RadialGradient(radial) => (
                radial_gradient(radial, to_user),
                radial.extend,
                &radial.stops,
            ),
            _ => {
                return Err(Error::UnresolvedReference(format!(
                    "{paint:?} is not a gradient"
                )))
            }
        };
        gradient.set("gradientUnits", "userSpaceOnUse".to_string());
        if extend != Extend::Pad {
            gradient.set("spreadMethod", extend.svg_name().to_string());
        }
        let stops: Vec<_> = stops.iter().map(stop_element).collect();

        let key = format!(
            "{} {:?} {:?}",
            gradient.name,
            gradient.attributes,
            stops.iter().map(|s| &s.attributes).collect::<Vec<_>>()
        );
        if let Some(id) = self.gradients.get(&key) {
            return Ok(id.clone());
        }
        let id = format!("gradient{}", self.gradients.len());
        gradient.set("id", id.clone());
        let gradient = self.push(DEFS, gradient);
        for stop in stops {
            self.push(gradient, stop);
        }
        self.gradients.insert(key, id.clone());
        Ok(id)
    }

    /// The document as xml
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Vec::new());
        self.write_element(&mut writer, ROOT)?;
        String::from_utf8(writer.into_inner()).map_err(Error::xml)
    }

    fn write_element(&self, writer: &mut Writer<Vec<u8>>, idx: usize) -> Result<(), Error> {
        let element = &self.elements[idx];
        let mut start = BytesStart::new(element.name);
        for (key, value) in element.attributes.iter() {
            start.push_attribute((*key, value.as_str()));
        }
        let children: Vec<_> = element
            .children
            .iter()
            .copied()
            .filter(|c| *c != DEFS || !self.elements[DEFS].children.is_empty())
            .collect();
        if children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(Error::xml);
        }
        writer.write_event(Event::Start(start)).map_err(Error::xml)?;
        for child in children {
            self.write_element(writer, child)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(element.name)))
            .map_err(Error::xml)
    }
}

fn point_attributes(element: &mut Element, keys: [&'static str; 2], pt: Point) {
    element.set(keys[0], format_number(pt.x));
    element.set(keys[1], format_number(pt.y));
}

fn linear_gradient(gradient: &LinearGradient, to_user: Affine) -> Element {
    let LinearGradient { p0, p1, p2, .. } = *gradient;
    let v = p1 - p0;
    let perpendicular = Vec2::new(-v.y, v.x);

    // svg gradients always have p2 perpendicular to p1, skew one into shape
    let basis = Affine::new([v.x, v.y, perpendicular.x, perpendicular.y, 0.0, 0.0]);
    let target = Affine::new([v.x, v.y, (p2 - p0).x, (p2 - p0).y, 0.0, 0.0]);
    let skew = if is_degenerate(basis) || is_degenerate(target) {
        Affine::IDENTITY
    } else {
        compose_ltr(&[
            Affine::translate(-p0.to_vec2()),
            basis.inverse(),
            target,
            Affine::translate(p0.to_vec2()),
        ])
    };
    let transform = compose_ltr(&[skew, to_user]);

    let mut element = Element::new("linearGradient");
    let q0 = transform * p0;
    let q1 = transform * p1;
    let q2 = transform * (p0 + perpendicular);
    let (u, w) = (q1 - q0, q2 - q0);
    if u.dot(w).abs() <= 1e-6 * u.hypot() * w.hypot() {
        point_attributes(&mut element, ["x1", "y1"], q0);
        point_attributes(&mut element, ["x2", "y2"], q1);
    } else {
        point_attributes(&mut element, ["x1", "y1"], p0);
        point_attributes(&mut element, ["x2", "y2"], p1);
        element.set("gradientTransform", format_transform(transform));
    }
    element
}

fn radial_gradient(gradient: &RadialGradient, to_user: Affine) -> Element {
    // circles survive uniform scale, the rest goes to gradientTransform
    let (uniform, remainder) = decompose_uniform(to_user);
    let scale = uniform.as_coeffs()[0].abs();
    let mut element = Element::new("radialGradient");
    point_attributes(&mut element, ["cx", "cy"], uniform * gradient.c1);
    element.set("r", format_number(gradient.r1 * scale));
    let focal = uniform * gradient.c0;
    if focal != uniform * gradient.c1 {
        point_attributes(&mut element, ["fx", "fy"], focal);
    }
    if gradient.r0 != 0.0 {
        element.set("fr", format_number(gradient.r0 * scale));
    }
    if !is_identity(remainder) {
        element.set("gradientTransform", format_transform(remainder));
    }
    element
}

fn stop_element(stop: &ColorStop) -> Element {
    let mut element = Element::new("stop");
    element.set("offset", format_number(stop.offset));
    element.set("stop-color", stop.color.opaque().to_string());
    if !stop.color.is_opaque() {
        element.set("stop-opacity", format_number(stop.color.alpha() as f64));
    }
    element
}

/// A document and the glyph ids it covers
#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocumentRecord {
    pub start_glyph_id: u16,
    pub end_glyph_id: u16,
    pub data: Vec<u8>,
}

/// The documents of an SVG table, ordered by glyph id
#[derive(Debug, Default)]
pub struct SvgTable {
    pub documents: Vec<SvgDocumentRecord>,
    pub warnings: Vec<Warning>,
    /// Glyphs left out of the table
    pub errors: Vec<Error>,
}

impl SvgTable {
    /// The binary table: a header, the document index, then the documents
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        const HEADER_LEN: u32 = 10;
        const RECORD_LEN: usize = 12;
        let num_entries = u16::try_from(self.documents.len()).map_err(|_| Error::OutOfBounds {
            what: "SVG document records".to_string(),
            value: self.documents.len().to_string(),
        })?;

        let mut data = Vec::new();
        data.extend(0u16.to_be_bytes());
        data.extend(HEADER_LEN.to_be_bytes());
        data.extend(0u32.to_be_bytes());
        data.extend(num_entries.to_be_bytes());

        let mut offset = 2 + RECORD_LEN * self.documents.len();
        for doc in self.documents.iter() {
            let out_of_bounds = |what: &str, value: usize| Error::OutOfBounds {
                what: what.to_string(),
                value: value.to_string(),
            };
            data.extend(doc.start_glyph_id.to_be_bytes());
            data.extend(doc.end_glyph_id.to_be_bytes());
            data.extend(
                u32::try_from(offset)
                    .map_err(|_| out_of_bounds("SVG document offset", offset))?
                    .to_be_bytes(),
            );
            data.extend(
                u32::try_from(doc.data.len())
                    .map_err(|_| out_of_bounds("SVG document length", doc.data.len()))?
                    .to_be_bytes(),
            );
            offset += doc.data.len();
        }
        for doc in self.documents.iter() {
            data.extend_from_slice(&doc.data);
        }
        Ok(data)
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn glyph_id_u16(glyph: &ColorGlyph) -> Result<u16, Error> {
    u16::try_from(glyph.glyph_id).map_err(|_| Error::OutOfBounds {
        what: format!("glyph id of {}", glyph.name),
        value: glyph.glyph_id.to_string(),
    })
}

/// Build one document per group.
///
/// Groups must already be contiguous in glyph id, see [`crate::grouping`].
/// Glyphs that fail, for example for lack of a view box, are left out and
/// reported in [`SvgTable::errors`].
pub fn make_svg_table(
    glyphs: &[ColorGlyph],
    groups: &[Vec<GlyphName>],
    compressed: bool,
) -> Result<SvgTable, Error> {
    let by_name: HashMap<_, _> = glyphs.iter().map(|g| (&g.name, g)).collect();
    let mut table = SvgTable::default();
    for group in groups {
        let mut doc = SvgDocumentBuilder::new();
        let mut gids = Vec::with_capacity(group.len());
        for name in group {
            let glyph = by_name
                .get(name)
                .ok_or_else(|| Error::UnresolvedReference(format!("color glyph {name}")))?;
            if glyph.view_box.is_none() {
                table.errors.push(Error::GlyphError(
                    glyph.name.clone(),
                    GlyphProblem::MissingViewBox,
                ));
                continue;
            }
            // a failed glyph leaves its partial output behind, start over without it
            let before = doc.clone();
            match doc.add_glyph(glyph.glyph_id, &glyph.name, &glyph.paint(), FONT_TO_OTSVG) {
                Ok(()) => gids.push(glyph_id_u16(glyph)?),
                Err(e) => {
                    doc = before;
                    table.errors.push(e);
                }
            }
        }
        let (Some(start), Some(end)) = (gids.iter().min(), gids.iter().max()) else {
            continue;
        };
        let xml = doc.to_xml()?;
        debug!("svg document for glyphs {start}..={end}, {} bytes", xml.len());
        table.warnings.extend(doc.warnings().iter().cloned());
        table.documents.push(SvgDocumentRecord {
            start_glyph_id: *start,
            end_glyph_id: *end,
            data: if compressed {
                gzip(xml.as_bytes())?
            } else {
                xml.into_bytes()
            },
        });
    }
    table.documents.sort_by_key(|d| d.start_glyph_id);
    Ok(table)
}
