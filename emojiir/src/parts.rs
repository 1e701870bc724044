//! A cache of reusable shapes.
//!
//! Every shape is registered up front with [`ReusableParts::add`]. Shapes are
//! bucketed by their [`NormalizedShape`] and each bucket picks a donor, a shape
//! that can be transformed into every other shape in the bucket. Once all shapes
//! are known [`ReusableParts::try_reuse`] tells a caller how to draw a shape as a
//! transformed donor.
//!
//! All shapes live in a single view box; callers with another view box map
//! their shapes into this one first.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kurbo::{Affine, Rect};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use emojidrasil::fixed::fixed_safe;

use crate::{
    error::Error,
    shape::{affine_between, bbox_area, canonical_path, normalize, NormalizedShape},
    warning::Warning,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShapeSet {
    pub normalized: NormalizedShape,
    pub shapes: BTreeSet<String>,
}

/// How to draw a shape in terms of its donor
#[derive(Debug, Clone, PartialEq)]
pub struct ReuseResult {
    /// Maps the donor onto the requested shape
    pub transform: Affine,
    /// The donor, the requested shape itself when there is nothing to reuse
    pub shape: String,
    /// Set if a reuse was found but had to be discarded
    pub warning: Option<Warning>,
}

impl ReuseResult {
    fn no_reuse(shape: String) -> ReuseResult {
        ReuseResult {
            transform: Affine::IDENTITY,
            shape,
            warning: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReusableParts {
    pub view_box: Rect,
    pub tolerance: f64,
    shape_sets: BTreeMap<NormalizedShape, ShapeSet>,
    normalized: HashMap<String, NormalizedShape>,
    donor_cache: HashMap<NormalizedShape, Option<String>>,
}

const PARTS_FILE_VERSION: &str = "1.0.0";

/// The serialized form of [`ReusableParts`]
#[derive(Serialize, Deserialize)]
struct PartsFile {
    version: String,
    view_box: Rect,
    reuse_tolerance: f64,
    shape_sets: Vec<ShapeSet>,
}

impl ReusableParts {
    pub fn new(view_box: Rect, tolerance: f64) -> ReusableParts {
        ReusableParts {
            view_box,
            tolerance,
            shape_sets: Default::default(),
            normalized: Default::default(),
            donor_cache: Default::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shape_sets.is_empty()
    }

    pub fn shape_sets(&self) -> impl Iterator<Item = &ShapeSet> {
        self.shape_sets.values()
    }

    fn add_normalized(&mut self, normalized: NormalizedShape, shape: String) {
        self.donor_cache.remove(&normalized);
        self.normalized.insert(shape.clone(), normalized.clone());
        self.shape_sets
            .entry(normalized.clone())
            .or_insert_with(|| ShapeSet {
                normalized,
                shapes: Default::default(),
            })
            .shapes
            .insert(shape);
    }

    /// Register a path. Adding the same path again has no effect.
    pub fn add(&mut self, d: &str) -> Result<(), Error> {
        let shape = canonical_path(d)?;
        if self.normalized.contains_key(&shape) {
            return Ok(());
        }
        let normalized = normalize(&shape, self.tolerance)?;
        self.add_normalized(normalized, shape);
        Ok(())
    }

    /// Add every shape registered with `other`.
    pub fn merge(&mut self, other: &ReusableParts) -> Result<(), Error> {
        if self.view_box != other.view_box || self.tolerance != other.tolerance {
            return Err(Error::malformed(format!(
                "can't merge parts for {:?} at {} into parts for {:?} at {}",
                other.view_box, other.tolerance, self.view_box, self.tolerance
            )));
        }
        for shape_set in other.shape_sets.values() {
            for shape in shape_set.shapes.iter() {
                self.add_normalized(shape_set.normalized.clone(), shape.clone());
            }
        }
        Ok(())
    }

    /// Pick the donor of a bucket.
    ///
    /// Candidates are tried largest bounding box first, shrinking a shape is kinder
    /// to fixed point than growing one. The first that maps onto every member wins.
    pub fn compute_donor(&self, normalized: &NormalizedShape) -> Result<Option<String>, Error> {
        let Some(shape_set) = self.shape_sets.get(normalized) else {
            return Ok(None);
        };
        let mut candidates = shape_set
            .shapes
            .iter()
            .map(|s| bbox_area(s).map(|area| (area, s)))
            .collect::<Result<Vec<_>, _>>()?;
        candidates.sort_by(|(a1, s1), (a2, s2)| a2.total_cmp(a1).then_with(|| s1.cmp(s2)));

        for (_, candidate) in candidates.iter() {
            let mut produces_all = true;
            for member in shape_set.shapes.iter() {
                if affine_between(candidate, member, self.tolerance)?.is_none() {
                    produces_all = false;
                    break;
                }
            }
            if produces_all {
                return Ok(Some(candidate.to_string()));
            }
        }
        Ok(None)
    }

    /// Compute and cache the donor of every bucket.
    ///
    /// Must run after the last [`ReusableParts::add`] and before lookups if the
    /// lookups are to hit the cache.
    pub fn compute_donors(&mut self) -> Result<Vec<Warning>, Error> {
        let mut warnings = Vec::new();
        let keys: Vec<_> = self
            .shape_sets
            .keys()
            .filter(|k| !self.donor_cache.contains_key(*k))
            .cloned()
            .collect();
        for key in keys {
            let donor = self.compute_donor(&key)?;
            if donor.is_none() {
                let shape_set = &self.shape_sets[&key];
                let shape = shape_set.shapes.iter().next().cloned().unwrap_or_default();
                warn!(
                    "No donor for {} shapes like '{shape}', they will not be shared",
                    shape_set.shapes.len()
                );
                warnings.push(Warning::NoDonor {
                    shape,
                    members: shape_set.shapes.len(),
                });
            }
            self.donor_cache.insert(key, donor);
        }
        debug!(
            "{} shapes in {} buckets",
            self.normalized.len(),
            self.shape_sets.len()
        );
        Ok(warnings)
    }

    fn donor(&self, normalized: &NormalizedShape) -> Result<Option<String>, Error> {
        match self.donor_cache.get(normalized) {
            Some(donor) => Ok(donor.clone()),
            None => self.compute_donor(normalized),
        }
    }

    fn lookup(&self, d: &str) -> Result<(String, &NormalizedShape), Error> {
        let shape = canonical_path(d)?;
        match self.normalized.get(&shape) {
            Some(normalized) => Ok((shape, normalized)),
            None => Err(Error::ReuseUnregistered(shape)),
        }
    }

    /// How to draw `d` as a transformed donor.
    ///
    /// It is an error to ask about a shape that was never added.
    pub fn try_reuse(&self, d: &str) -> Result<ReuseResult, Error> {
        let (shape, normalized) = self.lookup(d)?;
        let Some(donor) = self.donor(normalized)? else {
            return Ok(ReuseResult::no_reuse(shape));
        };
        if donor == shape {
            return Ok(ReuseResult::no_reuse(shape));
        }
        let Some(transform) = affine_between(&donor, &shape, self.tolerance)? else {
            return Ok(ReuseResult::no_reuse(shape));
        };
        if !fixed_safe(&transform.as_coeffs()) {
            warn!(
                "Not reusing '{donor}' for '{shape}', {:?} overflows fixed point",
                transform.as_coeffs()
            );
            let warning = Warning::ReuseOverflow {
                shape: shape.clone(),
                transform,
            };
            return Ok(ReuseResult {
                warning: Some(warning),
                ..ReuseResult::no_reuse(shape)
            });
        }
        Ok(ReuseResult {
            transform,
            shape: donor,
            warning: None,
        })
    }

    /// True if `d` is the donor for at least one other shape.
    pub fn is_reused(&self, d: &str) -> Result<bool, Error> {
        let (shape, normalized) = self.lookup(d)?;
        let members = self.shape_sets[normalized].shapes.len();
        Ok(members > 1 && self.donor(normalized)?.as_deref() == Some(shape.as_str()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&PartsFile {
            version: PARTS_FILE_VERSION.to_string(),
            view_box: self.view_box,
            reuse_tolerance: self.tolerance,
            shape_sets: self.shape_sets.values().cloned().collect(),
        })
    }

    pub fn from_json(json: &str) -> Result<ReusableParts, Error> {
        let file: PartsFile = serde_json::from_str(json)
            .map_err(|e| Error::malformed(format!("bad parts file: {e}")))?;
        if file.version != PARTS_FILE_VERSION {
            return Err(Error::malformed(format!(
                "unsupported parts version {}",
                file.version
            )));
        }
        let mut parts = ReusableParts::new(file.view_box, file.reuse_tolerance);
        for shape_set in file.shape_sets {
            for shape in shape_set.shapes {
                parts.add_normalized(shape_set.normalized.clone(), shape);
            }
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::transform_path;
    use pretty_assertions::assert_eq;

    const RECT: &str = "M10,10 L40,10 L40,30 L10,30 Z";

    fn parts(tolerance: f64, shapes: &[&str]) -> ReusableParts {
        let mut parts = ReusableParts::new(Rect::new(0.0, 0.0, 100.0, 100.0), tolerance);
        for shape in shapes {
            parts.add(shape).unwrap();
        }
        parts.compute_donors().unwrap();
        parts
    }

    #[test]
    fn translated_rect_reuses_donor() {
        let moved = transform_path(RECT, Affine::translate((10.0, 10.0))).unwrap();
        let parts = parts(0.1, &[RECT, &moved]);

        assert_eq!(1, parts.shape_sets().count());
        let donor = parts.try_reuse(RECT).unwrap().shape;
        let other = if donor == RECT { moved.as_str() } else { RECT };
        let reuse = parts.try_reuse(other).unwrap();
        assert_eq!(donor, reuse.shape);
        assert_ne!(Affine::IDENTITY, reuse.transform);
        let [a, b, c, d, _, _] = reuse.transform.as_coeffs();
        assert_eq!([1.0, 0.0, 0.0, 1.0], [a, b, c, d]);
    }

    #[test]
    fn largest_shape_is_donor() {
        let small = transform_path(RECT, Affine::scale(0.5)).unwrap();
        let parts = parts(0.1, &[&small, RECT]);
        assert!(parts.is_reused(RECT).unwrap());
        assert!(!parts.is_reused(&small).unwrap());

        let reuse = parts.try_reuse(&small).unwrap();
        assert_eq!(RECT, reuse.shape);
        assert_eq!(small, transform_path(RECT, reuse.transform).unwrap());
    }

    #[test]
    fn donor_maps_to_every_member() {
        let shapes = [
            RECT.to_string(),
            transform_path(RECT, Affine::rotate(0.5)).unwrap(),
            transform_path(RECT, Affine::scale_non_uniform(0.5, 2.0)).unwrap(),
        ];
        let shape_refs: Vec<_> = shapes.iter().map(String::as_str).collect();
        let parts = parts(0.1, &shape_refs);
        for shape in shapes.iter() {
            let reuse = parts.try_reuse(shape).unwrap();
            let produced = transform_path(&reuse.shape, reuse.transform).unwrap();
            assert_eq!(
                Some(Affine::IDENTITY),
                affine_between(&produced, shape, 0.01).unwrap(),
                "{produced} != {shape}"
            );
        }
    }

    #[test]
    fn single_shape_is_not_reused() {
        let parts = parts(0.1, &[RECT]);
        assert!(!parts.is_reused(RECT).unwrap());
        assert_eq!(
            ReuseResult::no_reuse(RECT.to_string()),
            parts.try_reuse(RECT).unwrap()
        );
    }

    #[test]
    fn disabled_reuse_shares_nothing() {
        let moved = transform_path(RECT, Affine::translate((10.0, 10.0))).unwrap();
        let parts = parts(-1.0, &[RECT, &moved]);
        assert_eq!(2, parts.shape_sets().count());
        assert_eq!(Affine::IDENTITY, parts.try_reuse(&moved).unwrap().transform);
        assert!(!parts.is_reused(RECT).unwrap());
    }

    #[test]
    fn unregistered_shape_is_an_error() {
        let parts = parts(0.1, &[RECT]);
        assert!(matches!(
            parts.try_reuse("M0,0 L1,1 L0,1 Z"),
            Err(Error::ReuseUnregistered(..))
        ));
    }

    #[test]
    fn add_is_idempotent() {
        let parts = parts(0.1, &[RECT, RECT, "M10 10 L40 10 L40 30 L10 30 Z"]);
        assert_eq!(1, parts.shape_sets().next().unwrap().shapes.len());
    }

    #[test]
    fn json_round_trip() {
        let moved = transform_path(RECT, Affine::translate((10.0, 10.0))).unwrap();
        let parts = parts(0.1, &[RECT, &moved]);
        let mut loaded = ReusableParts::from_json(&parts.to_json().unwrap()).unwrap();
        loaded.compute_donors().unwrap();
        assert_eq!(
            parts.shape_sets().collect::<Vec<_>>(),
            loaded.shape_sets().collect::<Vec<_>>()
        );
        assert_eq!(parts.try_reuse(&moved).unwrap(), loaded.try_reuse(&moved).unwrap());
    }
}
