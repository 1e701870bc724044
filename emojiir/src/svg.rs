//! Reader for restricted svg.
//!
//! Inputs are expected to be already simplified: a `viewBox`, a single `<defs>`
//! holding gradients, and then only `<path>` and `<g opacity>` elements. The
//! reader builds the shape tree color glyphs are built from and rejects
//! anything outside that vocabulary.

use std::collections::HashMap;

use kurbo::{Affine, Rect};
use log::debug;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{
    color::Color,
    error::Error,
    paint::{ColorStop, Extend},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientUnits {
    ObjectBoundingBox,
    UserSpaceOnUse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradientGeometry {
    Linear {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Radial {
        cx: f64,
        cy: f64,
        r: f64,
        fx: f64,
        fy: f64,
        fr: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientDef {
    pub id: String,
    pub geometry: GradientGeometry,
    pub units: GradientUnits,
    pub transform: Affine,
    pub extend: Extend,
    pub stops: Vec<ColorStop>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Color(Color),
    /// The id of a gradient, from `url(#id)`
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvgShape {
    pub d: String,
    pub fill: Fill,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvgGroup {
    pub opacity: Option<f64>,
    /// Names of attributes other than opacity, groups may not have any
    pub other_attributes: Vec<String>,
    pub children: Vec<SvgNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SvgNode {
    Shape(SvgShape),
    Group(SvgGroup),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvgDocument {
    pub view_box: Option<Rect>,
    pub gradients: HashMap<String, GradientDef>,
    /// Bottom to top
    pub nodes: Vec<SvgNode>,
}

impl SvgDocument {
    pub fn parse(xml: &str) -> Result<SvgDocument, Error> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut state = ReadState::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => state.start(&e)?,
                Event::Empty(e) => {
                    state.start(&e)?;
                    state.end(e.local_name().as_ref())?;
                }
                Event::End(e) => state.end(e.local_name().as_ref())?,
                Event::Eof => break,
                _ => (),
            }
        }
        if !state.saw_svg {
            return Err(Error::malformed("no <svg> element"));
        }
        if !state.groups.is_empty() {
            return Err(Error::malformed("unclosed <g>"));
        }
        Ok(state.doc)
    }

    /// Every shape, depth first, bottom to top
    pub fn shapes(&self) -> Vec<&SvgShape> {
        fn visit<'a>(nodes: &'a [SvgNode], shapes: &mut Vec<&'a SvgShape>) {
            for node in nodes {
                match node {
                    SvgNode::Shape(shape) => shapes.push(shape),
                    SvgNode::Group(group) => visit(&group.children, shapes),
                }
            }
        }
        let mut shapes = Vec::new();
        visit(&self.nodes, &mut shapes);
        shapes
    }

    pub fn gradient(&self, id: &str) -> Result<&GradientDef, Error> {
        self.gradients
            .get(id)
            .ok_or_else(|| Error::UnresolvedReference(format!("url(#{id})")))
    }
}

#[derive(Default)]
struct ReadState {
    doc: SvgDocument,
    saw_svg: bool,
    in_defs: bool,
    gradient: Option<GradientDef>,
    groups: Vec<SvgGroup>,
}

fn attributes(e: &BytesStart) -> Result<Vec<(String, String)>, Error> {
    e.attributes()
        .map(|attr| {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

impl ReadState {
    fn push_node(&mut self, node: SvgNode) {
        match self.groups.last_mut() {
            Some(group) => group.children.push(node),
            None => self.doc.nodes.push(node),
        }
    }

    fn start(&mut self, e: &BytesStart) -> Result<(), Error> {
        let name = element_name(e);
        let attrs = attributes(e)?;
        match name.as_str() {
            "svg" => {
                if self.saw_svg {
                    return Err(Error::malformed("nested <svg>"));
                }
                self.saw_svg = true;
                self.doc.view_box = attrs
                    .iter()
                    .find(|(k, _)| k == "viewBox")
                    .map(|(_, v)| parse_view_box(v))
                    .transpose()?;
            }
            "defs" => {
                if self.in_defs || !self.groups.is_empty() {
                    return Err(Error::malformed("<defs> must be a child of <svg>"));
                }
                self.in_defs = true;
            }
            "linearGradient" | "radialGradient" => {
                if !self.in_defs {
                    return Err(Error::malformed(format!("<{name}> outside <defs>")));
                }
                self.gradient = Some(self.parse_gradient(&name, &attrs)?);
            }
            "stop" => {
                let Some(gradient) = self.gradient.as_mut() else {
                    return Err(Error::malformed("<stop> outside a gradient"));
                };
                gradient.stops.push(parse_stop(&attrs)?);
            }
            "path" => {
                if self.in_defs {
                    return Err(Error::malformed("<path> inside <defs>"));
                }
                if let Some(shape) = parse_shape(&attrs)? {
                    self.push_node(SvgNode::Shape(shape));
                } else {
                    debug!("Skipping unfilled path");
                }
            }
            "g" => {
                if self.in_defs {
                    return Err(Error::malformed("<g> inside <defs>"));
                }
                let mut group = SvgGroup {
                    opacity: None,
                    other_attributes: Vec::new(),
                    children: Vec::new(),
                };
                for (key, value) in attrs {
                    match key.as_str() {
                        "opacity" => group.opacity = Some(parse_number(&value)?),
                        "id" => (),
                        _ => group.other_attributes.push(key),
                    }
                }
                self.groups.push(group);
            }
            "title" | "desc" => (),
            _ => return Err(Error::malformed(format!("unsupported element <{name}>"))),
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<(), Error> {
        match name {
            b"defs" => self.in_defs = false,
            b"linearGradient" | b"radialGradient" => {
                if let Some(gradient) = self.gradient.take() {
                    self.doc.gradients.insert(gradient.id.clone(), gradient);
                }
            }
            b"g" => {
                let Some(group) = self.groups.pop() else {
                    return Err(Error::malformed("unbalanced </g>"));
                };
                self.push_node(SvgNode::Group(group));
            }
            _ => (),
        }
        Ok(())
    }

    fn parse_gradient(&self, name: &str, attrs: &[(String, String)]) -> Result<GradientDef, Error> {
        let get = |key: &str| {
            attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        let id = get("id")
            .ok_or_else(|| Error::malformed(format!("<{name}> without an id")))?
            .to_string();
        let units = match get("gradientUnits") {
            None | Some("objectBoundingBox") => GradientUnits::ObjectBoundingBox,
            Some("userSpaceOnUse") => GradientUnits::UserSpaceOnUse,
            Some(other) => return Err(Error::malformed(format!("gradientUnits {other}"))),
        };
        let extend = match get("spreadMethod") {
            None | Some("pad") => Extend::Pad,
            Some("repeat") => Extend::Repeat,
            Some("reflect") => Extend::Reflect,
            Some(other) => return Err(Error::malformed(format!("spreadMethod {other}"))),
        };
        let transform = get("gradientTransform")
            .map(parse_transform)
            .transpose()?
            .unwrap_or(Affine::IDENTITY);

        // percentages are of the bounding box, or of the view box for user space
        let (width, height) = match (units, self.doc.view_box) {
            (GradientUnits::UserSpaceOnUse, Some(vb)) => (vb.width(), vb.height()),
            _ => (1.0, 1.0),
        };
        let diagonal = (width * width + height * height).sqrt() / std::f64::consts::SQRT_2;
        let coord = |key: &str, reference: f64, default: f64| -> Result<f64, Error> {
            get(key)
                .map(|v| parse_length(v, reference))
                .transpose()
                .map(|v| v.unwrap_or(default))
        };

        let geometry = if name == "linearGradient" {
            GradientGeometry::Linear {
                x1: coord("x1", width, 0.0)?,
                y1: coord("y1", height, 0.0)?,
                x2: coord("x2", width, width)?,
                y2: coord("y2", height, 0.0)?,
            }
        } else {
            let cx = coord("cx", width, 0.5 * width)?;
            let cy = coord("cy", height, 0.5 * height)?;
            GradientGeometry::Radial {
                cx,
                cy,
                r: coord("r", diagonal, 0.5 * diagonal)?,
                fx: coord("fx", width, cx)?,
                fy: coord("fy", height, cy)?,
                fr: coord("fr", diagonal, 0.0)?,
            }
        };
        Ok(GradientDef {
            id,
            geometry,
            units,
            transform,
            extend,
            stops: Vec::new(),
        })
    }
}

fn parse_stop(attrs: &[(String, String)]) -> Result<ColorStop, Error> {
    let mut offset = 0.0;
    let mut color = Color::BLACK;
    let mut opacity = 1.0;
    for (key, value) in attrs {
        match key.as_str() {
            "offset" => offset = parse_length(value, 1.0)?.clamp(0.0, 1.0),
            "stop-color" => color = Color::parse(value)?,
            "stop-opacity" => opacity = parse_number(value)?,
            _ => (),
        }
    }
    Ok(ColorStop {
        offset,
        color: color.multiply_alpha(opacity),
    })
}

/// Returns None for shapes with `fill="none"`
fn parse_shape(attrs: &[(String, String)]) -> Result<Option<SvgShape>, Error> {
    let mut d = None;
    let mut fill = Fill::Color(Color::BLACK);
    let mut opacity = 1.0;
    for (key, value) in attrs {
        match key.as_str() {
            "d" => d = Some(value.clone()),
            "fill" => {
                let value = value.trim();
                if value == "none" {
                    return Ok(None);
                }
                fill = match value
                    .strip_prefix("url(#")
                    .and_then(|v| v.strip_suffix(')'))
                {
                    Some(id) => Fill::Url(id.to_string()),
                    None => Fill::Color(Color::parse(value)?),
                };
            }
            "opacity" | "fill-opacity" => opacity *= parse_number(value)?,
            "id" => (),
            other => {
                return Err(Error::malformed(format!(
                    "unsupported attribute {other} on <path>"
                )))
            }
        }
    }
    let d = d.ok_or_else(|| Error::malformed("<path> without d"))?;
    Ok(Some(SvgShape { d, fill, opacity }))
}

fn parse_number(value: &str) -> Result<f64, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::malformed(format!("bad number '{value}'")))
}

fn parse_length(value: &str, reference: f64) -> Result<f64, Error> {
    match value.trim().strip_suffix('%') {
        Some(pct) => Ok(parse_number(pct)? / 100.0 * reference),
        None => parse_number(value),
    }
}

fn parse_numbers(value: &str) -> Result<Vec<f64>, Error> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(parse_number)
        .collect()
}

fn parse_view_box(value: &str) -> Result<Rect, Error> {
    match parse_numbers(value)?.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(Rect::new(*x, *y, x + w, y + h)),
        _ => Err(Error::malformed(format!("bad viewBox '{value}'"))),
    }
}

/// Parse an svg transform list such as `translate(10 0) scale(2)`.
pub fn parse_transform(value: &str) -> Result<Affine, Error> {
    let bad = || Error::malformed(format!("bad transform '{value}'"));
    let mut transform = Affine::IDENTITY;
    let mut rest = value.trim();
    while !rest.is_empty() {
        let open = rest.find('(').ok_or_else(bad)?;
        let close = rest.find(')').ok_or_else(bad)?;
        if close < open {
            return Err(bad());
        }
        let name = rest[..open].trim_matches(|c: char| c == ',' || c.is_whitespace());
        let args = parse_numbers(&rest[open + 1..close])?;
        let next = match (name, args.as_slice()) {
            ("matrix", [a, b, c, d, e, f]) => Affine::new([*a, *b, *c, *d, *e, *f]),
            ("translate", [tx]) => Affine::translate((*tx, 0.0)),
            ("translate", [tx, ty]) => Affine::translate((*tx, *ty)),
            ("scale", [s]) => Affine::scale(*s),
            ("scale", [sx, sy]) => Affine::scale_non_uniform(*sx, *sy),
            ("rotate", [deg]) => Affine::rotate(deg.to_radians()),
            ("rotate", [deg, cx, cy]) => {
                Affine::translate((*cx, *cy))
                    * Affine::rotate(deg.to_radians())
                    * Affine::translate((-cx, -cy))
            }
            ("skewX", [deg]) => Affine::skew(deg.to_radians().tan(), 0.0),
            ("skewY", [deg]) => Affine::skew(0.0, deg.to_radians().tan()),
            _ => return Err(bad()),
        };
        // the rightmost transform in the list applies first
        transform *= next;
        rest = rest[close + 1..].trim_start();
    }
    Ok(transform)
}
