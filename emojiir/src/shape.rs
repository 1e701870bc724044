//! Path parsing, formatting and affine-invariant normalization.
//!
//! Shapes are compared as svg path strings in a canonical format produced by
//! [`format_path`], so equal geometry always yields equal strings.

use kurbo::{Affine, BezPath, PathEl, Point, Shape, Vec2};
use serde::{Deserialize, Serialize};

use emojidrasil::transform::{compose_ltr, is_degenerate, is_identity};

use crate::error::Error;

/// A canonical key shared by shapes that differ only by an affine transform.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedShape(pub String);

// points closer to the start than this fraction of the shape's extent don't
// define a direction
const RELATIVE_EPSILON: f64 = 1e-3;

pub fn parse_path(d: &str) -> Result<BezPath, Error> {
    BezPath::from_svg(d).map_err(|e| Error::InvalidPath {
        path: d.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Format a coordinate with at most three decimals and no negative zero
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{rounded}")
}

fn format_point(pt: Point) -> String {
    format!("{},{}", format_number(pt.x), format_number(pt.y))
}

/// Format a path the way all shapes are keyed, e.g. `M0,0 L10,0 Z`
pub fn format_path(path: &BezPath) -> String {
    path.elements()
        .iter()
        .map(|el| match el {
            PathEl::MoveTo(p) => format!("M{}", format_point(*p)),
            PathEl::LineTo(p) => format!("L{}", format_point(*p)),
            PathEl::QuadTo(p1, p2) => format!("Q{} {}", format_point(*p1), format_point(*p2)),
            PathEl::CurveTo(p1, p2, p3) => format!(
                "C{} {} {}",
                format_point(*p1),
                format_point(*p2),
                format_point(*p3)
            ),
            PathEl::ClosePath => "Z".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse and reformat a path into canonical form.
pub fn canonical_path(d: &str) -> Result<String, Error> {
    parse_path(d).map(|p| format_path(&p))
}

/// Parse a path, apply a transform, and format it canonically.
pub fn transform_path(d: &str, transform: Affine) -> Result<String, Error> {
    let mut path = parse_path(d)?;
    if !is_identity(transform) {
        path.apply_affine(transform);
    }
    Ok(format_path(&path))
}

fn element_kind(el: &PathEl) -> char {
    match el {
        PathEl::MoveTo(..) => 'M',
        PathEl::LineTo(..) => 'L',
        PathEl::QuadTo(..) => 'Q',
        PathEl::CurveTo(..) => 'C',
        PathEl::ClosePath => 'Z',
    }
}

fn element_points(el: &PathEl) -> Vec<Point> {
    match *el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => vec![p],
        PathEl::QuadTo(p1, p2) => vec![p1, p2],
        PathEl::CurveTo(p1, p2, p3) => vec![p1, p2, p3],
        PathEl::ClosePath => Vec::new(),
    }
}

fn points(path: &BezPath) -> Vec<Point> {
    path.elements().iter().flat_map(element_points).collect()
}

/// Returns the transform mapping the shape to its canonical placement.
///
/// The first point goes to the origin, the first point distinct from it goes
/// to (1, 0) and the first point off that line goes to (0, 1). Shapes whose
/// points are all collinear only get the first two steps, which is a similarity.
fn normalizing_transform(points: &[Point]) -> Option<Affine> {
    let start = *points.first()?;
    let to_origin = Affine::translate(-start.to_vec2());

    let extent = points
        .iter()
        .map(|p| (*p - start).hypot())
        .fold(0.0, f64::max);
    if extent == 0.0 {
        return None;
    }
    let epsilon = extent * RELATIVE_EPSILON;

    let v = points
        .iter()
        .map(|p| *p - start)
        .find(|v| v.hypot() > epsilon)?;
    let len2 = v.hypot2();
    // similarity taking v to (1, 0)
    let to_x_axis = Affine::new([v.x / len2, -v.y / len2, v.y / len2, v.x / len2, 0.0, 0.0]);
    let similarity = compose_ltr(&[to_origin, to_x_axis]);

    let scaled_epsilon = epsilon / v.hypot();
    let Some(off_axis) = points
        .iter()
        .map(|p| similarity * *p)
        .find(|p| p.y.abs() > scaled_epsilon)
    else {
        return Some(similarity);
    };
    // keeps (1, 0) fixed, takes off_axis to (0, 1)
    let to_y_axis = Affine::new([
        1.0,
        0.0,
        -off_axis.x / off_axis.y,
        1.0 / off_axis.y,
        0.0,
        0.0,
    ]);
    Some(compose_ltr(&[similarity, to_y_axis]))
}

/// Compute the reuse key for a path.
///
/// A tolerance of -1 disables reuse, every distinct path is its own key. Otherwise
/// the path is placed canonically by [`normalizing_transform`] and its points are
/// rounded to `tolerance / 10`, which makes shapes that are affine transforms of
/// each other share a key.
pub fn normalize(d: &str, tolerance: f64) -> Result<NormalizedShape, Error> {
    let path = parse_path(d)?;
    if tolerance < 0.0 {
        return Ok(NormalizedShape(format_path(&path)));
    }
    let quantum = if tolerance > 0.0 { tolerance / 10.0 } else { 1e-6 };
    let transform = normalizing_transform(&points(&path)).unwrap_or(Affine::IDENTITY);

    let mut key = String::new();
    for el in path.elements() {
        key.push(element_kind(el));
        for pt in element_points(el) {
            let pt = transform * pt;
            let x = (pt.x / quantum).round() as i64;
            let y = (pt.y / quantum).round() as i64;
            key.push_str(&format!("{x},{y} "));
        }
    }
    Ok(NormalizedShape(key))
}

fn same_structure(p1: &BezPath, p2: &BezPath) -> bool {
    p1.elements().len() == p2.elements().len()
        && p1
            .elements()
            .iter()
            .zip(p2.elements())
            .all(|(e1, e2)| element_kind(e1) == element_kind(e2))
}

fn maps_within(transform: Affine, from: &[Point], to: &[Point], tolerance: f64) -> bool {
    from.iter()
        .zip(to)
        .all(|(p1, p2)| (transform * *p1 - *p2).hypot() <= tolerance)
}

/// Find an affine taking `s1` onto `s2`, point for point, within `tolerance`.
///
/// Simpler transforms are preferred: identity, then translation, then whatever
/// affine the canonical placement of both shapes implies.
pub fn affine_between(s1: &str, s2: &str, tolerance: f64) -> Result<Option<Affine>, Error> {
    let path1 = parse_path(s1)?;
    let path2 = parse_path(s2)?;
    if !same_structure(&path1, &path2) {
        return Ok(None);
    }
    let pts1 = points(&path1);
    let pts2 = points(&path2);
    let (Some(start1), Some(start2)) = (pts1.first(), pts2.first()) else {
        return Ok(Some(Affine::IDENTITY));
    };

    if maps_within(Affine::IDENTITY, &pts1, &pts2, tolerance) {
        return Ok(Some(Affine::IDENTITY));
    }

    let translate = Affine::translate(*start2 - *start1);
    if maps_within(translate, &pts1, &pts2, tolerance) {
        return Ok(Some(translate));
    }

    let (Some(n1), Some(n2)) = (normalizing_transform(&pts1), normalizing_transform(&pts2)) else {
        return Ok(None);
    };
    if is_degenerate(n2) {
        return Ok(None);
    }
    let candidate = compose_ltr(&[n1, n2.inverse()]);
    if maps_within(candidate, &pts1, &pts2, tolerance) {
        return Ok(Some(candidate));
    }
    Ok(None)
}

/// Area of the bounding box, used to rank donor candidates
pub fn bbox_area(d: &str) -> Result<f64, Error> {
    let bbox = parse_path(d)?.bounding_box();
    Ok(bbox.area())
}

/// Offset of the first point, for shapes that are known to be translations of
/// each other
pub fn start_point(d: &str) -> Result<Option<Vec2>, Error> {
    Ok(points(&parse_path(d)?).first().map(|p| p.to_vec2()))
}
