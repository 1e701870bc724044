//! Affine transform helpers.
//!
//! Transforms are [`kurbo::Affine`], coefficients `[a b c d e f]` mapping
//! `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`, the same layout as an SVG
//! `matrix(a b c d e f)`.
//!
//! Color paint formats can only hold a handful of transform shapes compactly
//! (translate, scale, rotate, skew, optionally around a center). [`classify`]
//! finds the most specific of these that can represent a transform within the
//! numeric range of the fields it would be stored in.

use kurbo::{Affine, Point, Rect, Vec2};

use crate::{
    error::Error,
    fixed::{almost_equal, f2dot14_rotation_safe, f2dot14_safe, fixed_safe, int16_safe},
};

const DEGENERATE_DETERMINANT: f64 = 1e-12;

/// Compose transforms left to right, `[t1, t2]` applies `t1` then `t2`.
pub fn compose_ltr(transforms: &[Affine]) -> Affine {
    transforms
        .iter()
        .fold(Affine::IDENTITY, |acc, transform| *transform * acc)
}

/// Map a vector, ignoring translation.
pub fn map_vector(transform: Affine, vector: Vec2) -> Vec2 {
    let [a, b, c, d, _, _] = transform.as_coeffs();
    Vec2::new(a * vector.x + c * vector.y, b * vector.x + d * vector.y)
}

/// The transform that maps `src` onto `dst`.
pub fn rect_to_rect(src: Rect, dst: Rect) -> Affine {
    let sx = dst.width() / src.width();
    let sy = dst.height() / src.height();
    Affine::new([sx, 0.0, 0.0, sy, dst.x0 - src.x0 * sx, dst.y0 - src.y0 * sy])
}

/// True if the transform collapses the plane onto a line or point.
pub fn is_degenerate(transform: Affine) -> bool {
    transform.determinant().abs() < DEGENERATE_DETERMINANT
}

pub fn almost_equal_affine(t1: Affine, t2: Affine, tolerance: f64) -> bool {
    t1.as_coeffs()
        .iter()
        .zip(t2.as_coeffs().iter())
        .all(|(a, b)| (a - b).abs() <= tolerance)
}

pub fn is_identity(transform: Affine) -> bool {
    almost_equal_affine(transform, Affine::IDENTITY, 1e-9)
}

/// Split into `(translate, remainder)` such that
/// `compose_ltr(&[remainder, translate]) == transform`.
///
/// The remainder is the linear (2x2) part of the transform.
pub fn decompose_translation(transform: Affine) -> (Affine, Affine) {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    (
        Affine::translate((e, f)),
        Affine::new([a, b, c, d, 0.0, 0.0]),
    )
}

/// Split into `(uniform, remainder)` such that
/// `compose_ltr(&[uniform, remainder]) == transform`.
///
/// `uniform` has equal magnitude x and y scale plus a translation, `remainder`
/// has no translation. Radial gradients need this: their circles can only absorb
/// a uniform scale, anything else has to wrap the gradient.
///
/// Axis aligned transforms keep the sign of each scale in `uniform` so a
/// y-flip does not leave a reflection behind in the remainder. An already
/// uniform transform yields an identity remainder. Degenerate transforms cannot
/// be split and come back as `(identity, transform)`.
pub fn decompose_uniform(transform: Affine) -> (Affine, Affine) {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    let det = a * d - b * c;
    if det.abs() < DEGENERATE_DETERMINANT {
        return (Affine::IDENTITY, transform);
    }

    let scale = Vec2::new(a, b).hypot().max(Vec2::new(c, d).hypot());
    let (ux, uy) = if almost_equal(b, 0.0) && almost_equal(c, 0.0) {
        (scale.copysign(a), scale.copysign(d))
    } else {
        (scale, scale)
    };

    // translation of uniform is uniform_scale * inverse(linear) * translation
    let lx = (d * e - c * f) / det;
    let ly = (a * f - b * e) / det;

    let uniform = Affine::new([ux, 0.0, 0.0, uy, ux * lx, uy * ly]);
    let remainder = Affine::new([a / ux, b / ux, c / uy, d / uy, 0.0, 0.0]);
    (uniform, remainder)
}

/// The most compact transform shape able to represent an affine.
///
/// Angles are in degrees, counter-clockwise, matching the COLR paint formats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestrictedTransform {
    Identity,
    Translate {
        dx: f64,
        dy: f64,
    },
    ScaleUniform {
        scale: f64,
        center: Option<Point>,
    },
    Scale {
        sx: f64,
        sy: f64,
        center: Option<Point>,
    },
    Rotate {
        angle: f64,
        center: Option<Point>,
    },
    Skew {
        x_angle: f64,
        y_angle: f64,
        center: Option<Point>,
    },
    General(Affine),
}

fn around_center(center: Option<Point>, linear: Affine) -> Affine {
    match center {
        Some(center) => {
            Affine::translate(center.to_vec2()) * linear * Affine::translate(-center.to_vec2())
        }
        None => linear,
    }
}

impl RestrictedTransform {
    /// The affine this transform represents.
    pub fn affine(&self) -> Affine {
        match *self {
            RestrictedTransform::Identity => Affine::IDENTITY,
            RestrictedTransform::Translate { dx, dy } => Affine::translate((dx, dy)),
            RestrictedTransform::ScaleUniform { scale, center } => {
                around_center(center, Affine::scale(scale))
            }
            RestrictedTransform::Scale { sx, sy, center } => {
                around_center(center, Affine::scale_non_uniform(sx, sy))
            }
            RestrictedTransform::Rotate { angle, center } => {
                let (sin, cos) = angle.to_radians().sin_cos();
                around_center(center, Affine::new([cos, sin, -sin, cos, 0.0, 0.0]))
            }
            RestrictedTransform::Skew {
                x_angle,
                y_angle,
                center,
            } => around_center(
                center,
                Affine::new([
                    1.0,
                    y_angle.to_radians().tan(),
                    (-x_angle).to_radians().tan(),
                    1.0,
                    0.0,
                    0.0,
                ]),
            ),
            RestrictedTransform::General(affine) => affine,
        }
    }
}

// solve (1 - s) * c = t for the center c of a scale s that produced translation t
fn scale_center(scale: f64, translation: f64) -> Option<f64> {
    if almost_equal(scale, 1.0) {
        return almost_equal(translation, 0.0).then_some(0.0);
    }
    Some(translation / (1.0 - scale))
}

// solve -k * c = t for the center c of a skew k that produced translation t
fn skew_center(skew: f64, translation: f64) -> Option<f64> {
    if almost_equal(skew, 0.0) {
        return almost_equal(translation, 0.0).then_some(0.0);
    }
    Some(-translation / skew)
}

fn rotation_center(cos: f64, sin: f64, dx: f64, dy: f64) -> Option<Point> {
    // (I - R) * c = d
    let one_minus_cos = 1.0 - cos;
    let det = one_minus_cos * one_minus_cos + sin * sin;
    if det < DEGENERATE_DETERMINANT {
        return None;
    }
    Some(Point::new(
        (one_minus_cos * dx - sin * dy) / det,
        (sin * dx + one_minus_cos * dy) / det,
    ))
}

/// An optional center, `Err(())` if the translation can't be expressed as one.
fn safe_center(has_translation: bool, center: Option<Point>) -> Result<Option<Point>, ()> {
    if !has_translation {
        return Ok(None);
    }
    match center {
        Some(c) if int16_safe(&[c.x, c.y]) => Ok(Some(Point::new(c.x.round(), c.y.round()))),
        _ => Err(()),
    }
}

fn classify_specific(transform: Affine) -> Option<RestrictedTransform> {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    let has_translation = !(almost_equal(e, 0.0) && almost_equal(f, 0.0));
    let no_shear = almost_equal(b, 0.0) && almost_equal(c, 0.0);

    if no_shear && almost_equal(a, 1.0) && almost_equal(d, 1.0) {
        return int16_safe(&[e, f]).then(|| RestrictedTransform::Translate {
            dx: e.round(),
            dy: f.round(),
        });
    }

    if no_shear {
        if !f2dot14_safe(&[a, d]) {
            return None;
        }
        let center = match (scale_center(a, e), scale_center(d, f)) {
            (Some(cx), Some(cy)) => Some(Point::new(cx, cy)),
            _ => None,
        };
        let center = safe_center(has_translation, center).ok()?;
        if almost_equal(a, d) {
            return Some(RestrictedTransform::ScaleUniform { scale: a, center });
        }
        return Some(RestrictedTransform::Scale {
            sx: a,
            sy: d,
            center,
        });
    }

    let is_rotation = almost_equal(a, d) && almost_equal(b, -c) && almost_equal(a * a + b * b, 1.0);
    if is_rotation {
        let angle = b.atan2(a).to_degrees();
        if !f2dot14_rotation_safe(&[angle]) {
            return None;
        }
        let center = safe_center(has_translation, rotation_center(a, b, e, f)).ok()?;
        return Some(RestrictedTransform::Rotate { angle, center });
    }

    if almost_equal(a, 1.0) && almost_equal(d, 1.0) {
        let x_angle = -c.atan().to_degrees();
        let y_angle = b.atan().to_degrees();
        if !f2dot14_rotation_safe(&[x_angle, y_angle]) {
            return None;
        }
        let center = match (skew_center(b, f), skew_center(c, e)) {
            (Some(cx), Some(cy)) => Some(Point::new(cx, cy)),
            _ => None,
        };
        let center = safe_center(has_translation, center).ok()?;
        return Some(RestrictedTransform::Skew {
            x_angle,
            y_angle,
            center,
        });
    }
    None
}

/// Classify a transform into the most specific representable form.
///
/// Each specific form is only used if its fields fit their encoding, int16 for
/// translations and centers, F2Dot14 for scales and angles. Otherwise we fall
/// back to a general transform, which is an error if even a 16.16 Fixed can't
/// hold the coefficients.
pub fn classify(transform: Affine) -> Result<RestrictedTransform, Error> {
    if is_identity(transform) {
        return Ok(RestrictedTransform::Identity);
    }
    if let Some(restricted) = classify_specific(transform) {
        return Ok(restricted);
    }
    let coeffs = transform.as_coeffs();
    if !fixed_safe(&coeffs) {
        return Err(Error::EncodingOverflow {
            what: "transform",
            value: format!("{coeffs:?}"),
        });
    }
    Ok(RestrictedTransform::General(transform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn assert_affine_eq(expected: Affine, actual: Affine) {
        assert!(
            almost_equal_affine(expected, actual, 1e-6),
            "{expected:?} != {actual:?}"
        );
    }

    #[test]
    fn compose_is_left_to_right() {
        let scale = Affine::scale(2.0);
        let translate = Affine::translate((10.0, 0.0));
        let composed = compose_ltr(&[scale, translate]);
        assert_eq!(Point::new(12.0, 0.0), composed * Point::new(1.0, 0.0));
    }

    #[rstest]
    #[case(Affine::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))]
    #[case(Affine::new([0.5, 0.0, 0.0, -2.0, 100.0, -40.0]))]
    #[case(Affine::rotate(0.7) * Affine::translate((3.0, -1.0)))]
    fn inverse_round_trips(#[case] transform: Affine) {
        assert_affine_eq(
            Affine::IDENTITY,
            compose_ltr(&[transform, transform.inverse()]),
        );
    }

    #[rstest]
    #[case(Affine::new([2.0, 0.0, 0.0, 4.0, 10.0, 20.0]))]
    #[case(Affine::new([1.0, 0.5, -0.25, 1.5, -3.0, 7.0]))]
    #[case(Affine::new([3.0, 0.0, 0.0, -3.0, 5.0, 950.0]))]
    #[case(Affine::rotate(1.2) * Affine::scale_non_uniform(2.0, 0.5))]
    fn decompose_uniform_recomposes(#[case] transform: Affine) {
        let (uniform, remainder) = decompose_uniform(transform);
        assert_affine_eq(transform, compose_ltr(&[uniform, remainder]));

        let [ua, ub, uc, ud, _, _] = uniform.as_coeffs();
        assert!(almost_equal(ua.abs(), ud.abs()), "{uniform:?}");
        assert!(almost_equal(ub, 0.0) && almost_equal(uc, 0.0));
        assert_eq!(Vec2::ZERO, remainder.translation());
    }

    #[test]
    fn decompose_uniform_of_uniform_is_clean() {
        let transform = Affine::new([2.0, 0.0, 0.0, -2.0, 10.0, 5.0]);
        let (uniform, remainder) = decompose_uniform(transform);
        assert_affine_eq(transform, uniform);
        assert_affine_eq(Affine::IDENTITY, remainder);
    }

    #[test]
    fn decompose_uniform_keeps_non_uniform_remainder() {
        let (_, remainder) = decompose_uniform(Affine::scale_non_uniform(100.0, 50.0));
        assert_affine_eq(Affine::scale_non_uniform(1.0, 0.5), remainder);
    }

    #[test]
    fn rect_to_rect_maps_corners() {
        let src = Rect::new(0.0, 0.0, 1.0, 1.0);
        let dst = Rect::new(10.0, 20.0, 110.0, 70.0);
        let transform = rect_to_rect(src, dst);
        assert_eq!(Point::new(10.0, 20.0), transform * Point::new(0.0, 0.0));
        assert_eq!(Point::new(110.0, 70.0), transform * Point::new(1.0, 1.0));
    }

    #[test]
    fn map_vector_ignores_translation() {
        let transform = Affine::new([2.0, 0.0, 0.0, 3.0, 100.0, 100.0]);
        assert_eq!(Vec2::new(2.0, 3.0), map_vector(transform, Vec2::new(1.0, 1.0)));
    }

    #[rstest]
    #[case(Affine::IDENTITY, RestrictedTransform::Identity)]
    #[case(
        Affine::translate((10.0, -20.0)),
        RestrictedTransform::Translate { dx: 10.0, dy: -20.0 }
    )]
    #[case(
        Affine::scale(0.5),
        RestrictedTransform::ScaleUniform { scale: 0.5, center: None }
    )]
    #[case(
        Affine::scale_non_uniform(0.5, 1.5),
        RestrictedTransform::Scale { sx: 0.5, sy: 1.5, center: None }
    )]
    fn classify_specific_forms(#[case] transform: Affine, #[case] expected: RestrictedTransform) {
        assert_eq!(expected, classify(transform).unwrap());
    }

    #[test]
    fn classify_scale_around_center() {
        let center = Point::new(100.0, 50.0);
        let transform = around_center(Some(center), Affine::scale(0.5));
        assert_eq!(
            RestrictedTransform::ScaleUniform {
                scale: 0.5,
                center: Some(center)
            },
            classify(transform).unwrap()
        );
    }

    #[test]
    fn classify_rotation_around_center() {
        let center = Point::new(500.0, 500.0);
        let transform = around_center(Some(center), Affine::rotate(90f64.to_radians()));
        let RestrictedTransform::Rotate {
            angle,
            center: Some(actual_center),
        } = classify(transform).unwrap()
        else {
            panic!("Expected a rotation around a center");
        };
        assert!((angle - 90.0).abs() < 1e-6, "{angle}");
        assert!((actual_center - center).hypot() < 1e-6);
    }

    #[test]
    fn classify_skew() {
        let skew = RestrictedTransform::Skew {
            x_angle: 10.0,
            y_angle: -5.0,
            center: None,
        };
        let RestrictedTransform::Skew {
            x_angle, y_angle, ..
        } = classify(skew.affine()).unwrap()
        else {
            panic!("Expected a skew");
        };
        assert!((x_angle - 10.0).abs() < 1e-6);
        assert!((y_angle + 5.0).abs() < 1e-6);
    }

    #[test]
    fn large_scale_falls_back_to_general() {
        let transform = Affine::scale(3.1);
        assert_eq!(
            RestrictedTransform::General(transform),
            classify(transform).unwrap()
        );
    }

    #[test]
    fn fractional_translation_falls_back_to_general() {
        let transform = Affine::translate((0.5, 1.0));
        assert_eq!(
            RestrictedTransform::General(transform),
            classify(transform).unwrap()
        );
    }

    #[test]
    fn unrepresentable_transform_is_an_error() {
        assert!(matches!(
            classify(Affine::scale(70000.0)),
            Err(Error::EncodingOverflow { .. })
        ));
    }

    #[rstest]
    #[case(RestrictedTransform::Translate { dx: 3.0, dy: 4.0 })]
    #[case(RestrictedTransform::Scale { sx: 0.5, sy: 1.25, center: Some(Point::new(10.0, 10.0)) })]
    #[case(RestrictedTransform::Rotate { angle: 30.0, center: Some(Point::new(-20.0, 7.0)) })]
    fn affine_of_classification_round_trips(#[case] restricted: RestrictedTransform) {
        let affine = restricted.affine();
        assert_affine_eq(affine, classify(affine).unwrap().affine());
    }
}
