//! The paint tree describing how a color glyph is drawn.
//!
//! Mirrors the COLRv1 paint vocabulary. Geometry is in font units once a
//! [`crate::color_glyph::ColorGlyph`] is built. Children are shared through
//! [`Arc`] so rewriting a tree only copies the nodes that change.

use std::{collections::BTreeSet, collections::VecDeque, sync::Arc};

use kurbo::{Affine, Point};
use serde::{Deserialize, Serialize};

use emojidrasil::{
    transform::{classify, compose_ltr, decompose_uniform, is_identity, RestrictedTransform},
    types::GlyphName,
};

use crate::{color::Color, error::Error};

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extend {
    #[default]
    Pad,
    Repeat,
    Reflect,
}

impl Extend {
    /// The svg `spreadMethod` value
    pub fn svg_name(&self) -> &'static str {
        match self {
            Extend::Pad => "pad",
            Extend::Repeat => "repeat",
            Extend::Reflect => "reflect",
        }
    }
}

/// Only source-in over a solid backdrop, the way group opacity is drawn, is supported
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeMode {
    SrcIn,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f64,
    pub color: Color,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub extend: Extend,
    pub stops: Vec<ColorStop>,
    pub p0: Point,
    pub p1: Point,
    /// Color is constant along lines parallel to p0-p2
    pub p2: Point,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub extend: Extend,
    pub stops: Vec<ColorStop>,
    pub c0: Point,
    pub c1: Point,
    pub r0: f64,
    pub r1: f64,
}

/// The outline a [`Paint::Glyph`] fills
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GlyphRef {
    /// An svg path, in font units
    Path(String),
    /// An existing glyph
    Name(GlyphName),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    LinearGradient(LinearGradient),
    RadialGradient(RadialGradient),
    Glyph {
        glyph: GlyphRef,
        paint: Arc<Paint>,
    },
    /// Draw the paint of another base glyph
    ColrGlyph(GlyphName),
    /// Bottom to top
    ColrLayers(Vec<Arc<Paint>>),
    Composite {
        mode: CompositeMode,
        source: Arc<Paint>,
        backdrop: Arc<Paint>,
    },
    Transform {
        transform: Affine,
        paint: Arc<Paint>,
    },
    Translate {
        dx: f64,
        dy: f64,
        paint: Arc<Paint>,
    },
    ScaleUniform {
        scale: f64,
        center: Option<Point>,
        paint: Arc<Paint>,
    },
    Scale {
        sx: f64,
        sy: f64,
        center: Option<Point>,
        paint: Arc<Paint>,
    },
    Rotate {
        angle: f64,
        center: Option<Point>,
        paint: Arc<Paint>,
    },
    Skew {
        x_angle: f64,
        y_angle: f64,
        center: Option<Point>,
        paint: Arc<Paint>,
    },
}

impl Paint {
    pub fn glyph(glyph: GlyphRef, paint: Arc<Paint>) -> Arc<Paint> {
        Arc::new(Paint::Glyph { glyph, paint })
    }

    pub fn children(&self) -> Vec<&Arc<Paint>> {
        match self {
            Paint::Solid(..)
            | Paint::LinearGradient(..)
            | Paint::RadialGradient(..)
            | Paint::ColrGlyph(..) => Vec::new(),
            Paint::ColrLayers(layers) => layers.iter().collect(),
            Paint::Composite {
                source, backdrop, ..
            } => vec![source, backdrop],
            Paint::Glyph { paint, .. }
            | Paint::Transform { paint, .. }
            | Paint::Translate { paint, .. }
            | Paint::ScaleUniform { paint, .. }
            | Paint::Scale { paint, .. }
            | Paint::Rotate { paint, .. }
            | Paint::Skew { paint, .. } => vec![paint],
        }
    }

    /// A copy of this node with new children, in the order of [`Paint::children`].
    ///
    /// Missing children keep their current value.
    fn with_children(&self, children: Vec<Arc<Paint>>) -> Paint {
        let mut children = children.into_iter();
        let mut next = |current: &Arc<Paint>| children.next().unwrap_or_else(|| current.clone());
        match self {
            Paint::Solid(..)
            | Paint::LinearGradient(..)
            | Paint::RadialGradient(..)
            | Paint::ColrGlyph(..) => self.clone(),
            Paint::ColrLayers(layers) => Paint::ColrLayers(layers.iter().map(&mut next).collect()),
            Paint::Composite {
                mode,
                source,
                backdrop,
            } => Paint::Composite {
                mode: *mode,
                source: next(source),
                backdrop: next(backdrop),
            },
            Paint::Glyph { glyph, paint } => Paint::Glyph {
                glyph: glyph.clone(),
                paint: next(paint),
            },
            Paint::Transform { transform, paint } => Paint::Transform {
                transform: *transform,
                paint: next(paint),
            },
            Paint::Translate { dx, dy, paint } => Paint::Translate {
                dx: *dx,
                dy: *dy,
                paint: next(paint),
            },
            Paint::ScaleUniform {
                scale,
                center,
                paint,
            } => Paint::ScaleUniform {
                scale: *scale,
                center: *center,
                paint: next(paint),
            },
            Paint::Scale {
                sx,
                sy,
                center,
                paint,
            } => Paint::Scale {
                sx: *sx,
                sy: *sy,
                center: *center,
                paint: next(paint),
            },
            Paint::Rotate {
                angle,
                center,
                paint,
            } => Paint::Rotate {
                angle: *angle,
                center: *center,
                paint: next(paint),
            },
            Paint::Skew {
                x_angle,
                y_angle,
                center,
                paint,
            } => Paint::Skew {
                x_angle: *x_angle,
                y_angle: *y_angle,
                center: *center,
                paint: next(paint),
            },
        }
    }

    /// The transform of a transform paint and the paint it wraps.
    pub fn as_transform(&self) -> Option<(RestrictedTransform, &Arc<Paint>)> {
        let transform = match *self {
            Paint::Transform { transform, .. } => RestrictedTransform::General(transform),
            Paint::Translate { dx, dy, .. } => RestrictedTransform::Translate { dx, dy },
            Paint::ScaleUniform { scale, center, .. } => {
                RestrictedTransform::ScaleUniform { scale, center }
            }
            Paint::Scale { sx, sy, center, .. } => RestrictedTransform::Scale { sx, sy, center },
            Paint::Rotate { angle, center, .. } => RestrictedTransform::Rotate { angle, center },
            Paint::Skew {
                x_angle,
                y_angle,
                center,
                ..
            } => RestrictedTransform::Skew {
                x_angle,
                y_angle,
                center,
            },
            _ => return None,
        };
        let child = self.children().into_iter().next()?;
        Some((transform, child))
    }

    pub fn is_transform(&self) -> bool {
        self.as_transform().is_some()
    }

    /// Wrap `paint` in the most compact transform paint that can hold `transform`.
    ///
    /// The identity returns `paint` itself.
    pub fn transformed(transform: Affine, paint: Arc<Paint>) -> Result<Arc<Paint>, Error> {
        Ok(Paint::from_restricted(classify(transform)?, paint))
    }

    pub fn from_restricted(transform: RestrictedTransform, paint: Arc<Paint>) -> Arc<Paint> {
        let wrapped = match transform {
            RestrictedTransform::Identity => return paint,
            RestrictedTransform::Translate { dx, dy } => Paint::Translate { dx, dy, paint },
            RestrictedTransform::ScaleUniform { scale, center } => Paint::ScaleUniform {
                scale,
                center,
                paint,
            },
            RestrictedTransform::Scale { sx, sy, center } => Paint::Scale {
                sx,
                sy,
                center,
                paint,
            },
            RestrictedTransform::Rotate { angle, center } => Paint::Rotate {
                angle,
                center,
                paint,
            },
            RestrictedTransform::Skew {
                x_angle,
                y_angle,
                center,
            } => Paint::Skew {
                x_angle,
                y_angle,
                center,
                paint,
            },
            RestrictedTransform::General(transform) => Paint::Transform { transform, paint },
        };
        Arc::new(wrapped)
    }

    /// Every color used by a solid or a gradient stop
    pub fn colors(&self) -> BTreeSet<Color> {
        let mut colors = BTreeSet::new();
        self.collect_colors(&mut colors);
        colors
    }

    fn collect_colors(&self, colors: &mut BTreeSet<Color>) {
        match self {
            Paint::Solid(color) => {
                colors.insert(*color);
            }
            Paint::LinearGradient(LinearGradient { stops, .. })
            | Paint::RadialGradient(RadialGradient { stops, .. }) => {
                colors.extend(stops.iter().map(|s| s.color));
            }
            _ => self
                .children()
                .into_iter()
                .for_each(|c| c.collect_colors(colors)),
        }
    }

    /// Every node, breadth first, with the transform accumulated from the
    /// transform paints above it.
    pub fn breadth_first(&self) -> Vec<(&Paint, Affine)> {
        let mut result = Vec::new();
        let mut frontier = VecDeque::from([(self, Affine::IDENTITY)]);
        while let Some((paint, transform)) = frontier.pop_front() {
            result.push((paint, transform));
            let child_transform = match paint.as_transform() {
                Some((restricted, _)) => compose_ltr(&[restricted.affine(), transform]),
                None => transform,
            };
            frontier.extend(
                paint
                    .children()
                    .into_iter()
                    .map(|c| (c.as_ref(), child_transform)),
            );
        }
        result
    }

    /// Map the geometry of a gradient by `transform`.
    ///
    /// Linear gradients absorb any affine. Radial gradients only absorb the
    /// uniform part of it, the rest wraps the gradient in a transform paint.
    /// Non-gradients are returned unchanged.
    pub fn transform_gradient(self: &Arc<Paint>, transform: Affine) -> Result<Arc<Paint>, Error> {
        if is_identity(transform) {
            return Ok(self.clone());
        }
        match self.as_ref() {
            Paint::LinearGradient(gradient) => {
                Ok(Arc::new(Paint::LinearGradient(LinearGradient {
                    p0: transform * gradient.p0,
                    p1: transform * gradient.p1,
                    p2: transform * gradient.p2,
                    ..gradient.clone()
                })))
            }
            Paint::RadialGradient(gradient) => {
                let (uniform, remainder) = decompose_uniform(transform);
                let scale = uniform.as_coeffs()[0].abs();
                let radial = Arc::new(Paint::RadialGradient(RadialGradient {
                    c0: uniform * gradient.c0,
                    c1: uniform * gradient.c1,
                    r0: gradient.r0 * scale,
                    r1: gradient.r1 * scale,
                    ..gradient.clone()
                }));
                Paint::transformed(remainder, radial)
            }
            _ => Ok(self.clone()),
        }
    }
}

/// Rewrite a tree bottom up.
///
/// `f` sees every node after its children were rewritten and returns its
/// replacement, returning the node it was given keeps it. Subtrees where
/// nothing changed are shared with the input.
pub fn mutate<F>(paint: &Arc<Paint>, f: &mut F) -> Arc<Paint>
where
    F: FnMut(Arc<Paint>) -> Arc<Paint>,
{
    let children = paint.children();
    let new_children: Vec<_> = children.iter().map(|c| mutate(c, f)).collect();
    let changed = children
        .iter()
        .zip(new_children.iter())
        .any(|(old, new)| !Arc::ptr_eq(old, new));
    let node = if changed {
        Arc::new(paint.with_children(new_children))
    } else {
        paint.clone()
    };
    f(node)
}
