//! Font wide IR shared between the color formats.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use emojidrasil::types::GlyphName;

/// Glyph names in glyph id order
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct GlyphOrder(IndexSet<GlyphName>);

impl GlyphOrder {
    pub fn new() -> Self {
        GlyphOrder(IndexSet::new())
    }

    pub fn glyph_id<Q>(&self, name: &Q) -> Option<u32>
    where
        Q: std::hash::Hash + indexmap::Equivalent<GlyphName> + ?Sized,
    {
        self.0.get_index_of(name).map(|i| i as u32)
    }

    pub fn glyph_name(&self, gid: u32) -> Option<&GlyphName> {
        self.0.get_index(gid as usize)
    }

    pub fn contains<Q>(&self, name: &Q) -> bool
    where
        Q: std::hash::Hash + indexmap::Equivalent<GlyphName> + ?Sized,
    {
        self.0.contains(name)
    }

    /// Appends `name`, returning its glyph id. Existing names keep their id.
    pub fn insert(&mut self, name: GlyphName) -> u32 {
        self.0.insert_full(name).0 as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlyphName> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &GlyphName> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A name derived from `base` that is not yet in use, e.g. `base.3`
    pub fn name_for_derivative(&self, base: &GlyphName) -> GlyphName {
        (0..)
            .map(|i| base.derivative(i))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| base.clone())
    }
}

impl FromIterator<GlyphName> for GlyphOrder {
    fn from_iter<T: IntoIterator<Item = GlyphName>>(iter: T) -> Self {
        GlyphOrder(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a GlyphOrder {
    type Item = &'a GlyphName;
    type IntoIter = indexmap::set::Iter<'a, GlyphName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_insertion() {
        let mut order: GlyphOrder = [".notdef", "space"].into_iter().map(GlyphName::from).collect();
        assert_eq!(2, order.insert("smile".into()));
        assert_eq!(0, order.insert(".notdef".into()));
        assert_eq!(Some(1), order.glyph_id("space"));
        assert_eq!(Some(&GlyphName::new("smile")), order.glyph_name(2));
    }

    #[test]
    fn derivative_names_are_free() {
        let order: GlyphOrder = ["smile", "smile.0", "smile.1"]
            .into_iter()
            .map(GlyphName::from)
            .collect();
        assert_eq!("smile.2", order.name_for_derivative(&"smile".into()).as_str());
    }
}
