//! Turns the paths painted by color glyphs into outline glyphs.
//!
//! Every `Glyph(path)` paint becomes a reference to an outline glyph named
//! after its color glyph, `smile.0`, `smile.1` and so on. Paths that are a
//! transformed version of an outline we already made reuse that outline.

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use kurbo::{Affine, Rect, Shape};
use log::{trace, warn};

use emojidrasil::{fixed::fixed_safe, types::GlyphName};
use emojiir::{
    color_glyph::ColorGlyph,
    config::REUSE_DISABLED,
    ir::GlyphOrder,
    paint::{mutate, GlyphRef, Paint},
    shape::{affine_between, normalize, parse_path, transform_path, NormalizedShape},
    warning::Warning,
};

use crate::error::{Error, GlyphProblem};

/// Draw a path as an existing glyph under a transform
#[derive(Debug, Clone, PartialEq)]
pub struct ReuseResult {
    pub glyph_name: GlyphName,
    pub transform: Affine,
}

#[derive(Debug, Clone, Default)]
pub struct GlyphReuseCache {
    tolerance: f64,
    reusable_paths: HashMap<NormalizedShape, (GlyphName, String)>,
    /// Outline glyphs we made, font units, in creation order
    outlines: IndexMap<GlyphName, String>,
}

impl GlyphReuseCache {
    pub fn new(tolerance: f64) -> Self {
        GlyphReuseCache {
            tolerance,
            ..Default::default()
        }
    }

    fn key(&self, path: &str) -> Result<NormalizedShape, Error> {
        Ok(normalize(path, self.tolerance)?)
    }

    /// Try to reproduce `path`, in font units, as a transform of a known glyph.
    pub fn try_reuse(&self, path: &str) -> Result<(Option<ReuseResult>, Option<Warning>), Error> {
        if self.tolerance == REUSE_DISABLED {
            return Ok((None, None));
        }
        let Some((glyph_name, glyph_path)) = self.reusable_paths.get(&self.key(path)?) else {
            return Ok((None, None));
        };
        let Some(transform) = affine_between(glyph_path, path, self.tolerance)? else {
            warn!("affine_between failed: {glyph_path} {path}");
            let warning = Warning::AffineBetweenFailed {
                shape: path.to_string(),
                donor: glyph_path.clone(),
            };
            return Ok((None, Some(warning)));
        };
        if !fixed_safe(&transform.as_coeffs()) {
            warn!(
                "affine_between overflows Fixed: {glyph_path} {path}, {:?}",
                transform.as_coeffs()
            );
            let warning = Warning::ReuseOverflow {
                shape: path.to_string(),
                transform,
            };
            return Ok((None, Some(warning)));
        }
        Ok((
            Some(ReuseResult {
                glyph_name: glyph_name.clone(),
                transform,
            }),
            None,
        ))
    }

    pub fn add_glyph(&mut self, glyph_name: GlyphName, glyph_path: String) -> Result<(), Error> {
        let key = if self.tolerance == REUSE_DISABLED {
            NormalizedShape(glyph_path.clone())
        } else {
            self.key(&glyph_path)?
        };
        trace!("{glyph_name} outlines {glyph_path}");
        self.reusable_paths
            .insert(key, (glyph_name.clone(), glyph_path.clone()));
        self.outlines.insert(glyph_name, glyph_path);
        Ok(())
    }

    pub fn is_known_glyph(&self, glyph_name: &GlyphName) -> bool {
        self.outlines.contains_key(glyph_name)
    }

    /// The path of an outline glyph we made
    pub fn outline(&self, glyph_name: &GlyphName) -> Option<&str> {
        self.outlines.get(glyph_name).map(String::as_str)
    }

    pub fn outlines(&self) -> impl Iterator<Item = (&GlyphName, &str)> {
        self.outlines.iter().map(|(n, p)| (n, p.as_str()))
    }

    /// Bounds of an outline glyph under `transform`
    pub fn bounds(&self, glyph_name: &GlyphName, transform: Affine) -> Result<Option<Rect>, Error> {
        let Some(path) = self.outline(glyph_name) else {
            return Ok(None);
        };
        let mut path = parse_path(path)?;
        path.apply_affine(transform);
        let bbox = path.bounding_box();
        Ok((bbox.area() > 0.0 || bbox.width() > 0.0 || bbox.height() > 0.0).then_some(bbox))
    }

    /// A new outline glyph that is `source` with `transform` baked in.
    ///
    /// For formats that can't transform a layer, COLRv0.
    pub fn create_transformed_glyph(
        &mut self,
        base: &GlyphName,
        source: &GlyphName,
        transform: Affine,
        glyph_order: &mut GlyphOrder,
    ) -> Result<GlyphName, Error> {
        let path = self.outline(source).ok_or_else(|| {
            Error::GlyphError(source.clone(), GlyphProblem::NotInGlyphOrder)
        })?;
        let path = transform_path(path, transform)?;
        let name = glyph_order.name_for_derivative(base);
        glyph_order.insert(name.clone());
        self.outlines.insert(name.clone(), path);
        Ok(name)
    }

    fn migrate_paint_glyph(
        &mut self,
        color_glyph: &GlyphName,
        node: Arc<Paint>,
        glyph_order: &mut GlyphOrder,
        warnings: &mut Vec<Warning>,
    ) -> Result<Arc<Paint>, Error> {
        let Paint::Glyph {
            glyph: GlyphRef::Path(path),
            paint,
        } = node.as_ref()
        else {
            return Ok(node);
        };

        let (reuse, warning) = self.try_reuse(path)?;
        warnings.extend(warning);
        if let Some(reuse) = reuse {
            let glyph = Paint::glyph(GlyphRef::Name(reuse.glyph_name), paint.clone());
            return Ok(Paint::transformed(reuse.transform, glyph)?);
        }

        let name = glyph_order.name_for_derivative(color_glyph);
        glyph_order.insert(name.clone());
        self.add_glyph(name.clone(), path.clone())?;
        Ok(Paint::glyph(GlyphRef::Name(name), paint.clone()))
    }

    /// Move every path painted by `glyph` into an outline glyph, appending
    /// new glyphs to `glyph_order`.
    pub fn migrate_paths(
        &mut self,
        glyph: &ColorGlyph,
        glyph_order: &mut GlyphOrder,
    ) -> Result<(ColorGlyph, Vec<Warning>), Error> {
        let mut warnings = Vec::new();
        let mut failure = None;
        let mut painted_layers = Vec::with_capacity(glyph.painted_layers.len());
        for layer in glyph.painted_layers.iter() {
            let migrated = mutate(layer, &mut |node| {
                if failure.is_some() {
                    return node;
                }
                match self.migrate_paint_glyph(&glyph.name, node.clone(), glyph_order, &mut warnings)
                {
                    Ok(migrated) => migrated,
                    Err(e) => {
                        failure = Some(e);
                        node
                    }
                }
            });
            painted_layers.push(migrated);
        }
        if let Some(e) = failure {
            return Err(e);
        }
        Ok((
            ColorGlyph {
                painted_layers,
                ..glyph.clone()
            },
            warnings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use emojiir::color::Color;
    use pretty_assertions::assert_eq;

    use super::*;

    const SQUARE: &str = "M0,0 L10,0 L10,10 L0,10 Z";
    const MOVED_SQUARE: &str = "M20,0 L30,0 L30,10 L20,10 Z";
    const BIG_SQUARE: &str = "M0,0 L15,0 L15,15 L0,15 Z";

    fn color_glyph(name: &str, paths: &[&str]) -> ColorGlyph {
        ColorGlyph {
            name: name.into(),
            glyph_id: 1,
            codepoints: vec![],
            advance_width: 100,
            view_box: None,
            user_transform: Affine::IDENTITY,
            painted_layers: paths
                .iter()
                .map(|d| {
                    Paint::glyph(
                        GlyphRef::Path(d.to_string()),
                        Arc::new(Paint::Solid(Color::BLACK)),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn paths_become_outline_glyphs() {
        let mut cache = GlyphReuseCache::new(0.1);
        let mut order: GlyphOrder = [".notdef", "a"].into_iter().map(GlyphName::from).collect();
        let (migrated, warnings) = cache
            .migrate_paths(&color_glyph("a", &[SQUARE]), &mut order)
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(Some(2), order.glyph_id("a.0"));
        assert_eq!(
            Paint::Glyph {
                glyph: GlyphRef::Name("a.0".into()),
                paint: Arc::new(Paint::Solid(Color::BLACK)),
            },
            *migrated.painted_layers[0]
        );
        assert_eq!(Some(SQUARE), cache.outline(&"a.0".into()));
    }

    #[test]
    fn transformed_paths_reuse_outlines() {
        let mut cache = GlyphReuseCache::new(0.1);
        let mut order: GlyphOrder = ["a", "b"].into_iter().map(GlyphName::from).collect();
        cache
            .migrate_paths(&color_glyph("a", &[SQUARE]), &mut order)
            .unwrap();
        let (migrated, _) = cache
            .migrate_paths(&color_glyph("b", &[MOVED_SQUARE, BIG_SQUARE]), &mut order)
            .unwrap();
        // nothing new was needed
        assert_eq!(3, order.len());
        assert!(matches!(
            migrated.painted_layers[0].as_ref(),
            Paint::Translate { dx, dy, .. } if *dx == 20.0 && *dy == 0.0
        ));
        assert!(matches!(
            migrated.painted_layers[1].as_ref(),
            Paint::ScaleUniform { scale, center: None, .. } if (*scale - 1.5).abs() < 1e-9
        ));
    }

    #[test]
    fn disabled_reuse_makes_a_glyph_per_path() {
        let mut cache = GlyphReuseCache::new(REUSE_DISABLED);
        let mut order: GlyphOrder = ["a"].into_iter().map(GlyphName::from).collect();
        cache
            .migrate_paths(&color_glyph("a", &[SQUARE, MOVED_SQUARE]), &mut order)
            .unwrap();
        assert_eq!(3, order.len());
        assert!(cache.is_known_glyph(&"a.1".into()));
    }

    #[test]
    fn transformed_glyph_bakes_transform() {
        let mut cache = GlyphReuseCache::new(0.1);
        let mut order: GlyphOrder = ["a"].into_iter().map(GlyphName::from).collect();
        cache.add_glyph("a.0".into(), SQUARE.to_string()).unwrap();
        order.insert("a.0".into());
        let name = cache
            .create_transformed_glyph(&"a".into(), &"a.0".into(), Affine::translate((20.0, 0.0)), &mut order)
            .unwrap();
        assert_eq!("a.1", name.as_str());
        assert_eq!(Some(MOVED_SQUARE), cache.outline(&name));
        assert_eq!(
            Some(Rect::new(20.0, 0.0, 30.0, 10.0)),
            cache.bounds(&name, Affine::IDENTITY).unwrap()
        );
    }
}
