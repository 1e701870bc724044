//! Groups color glyphs that share shapes so each group gets consecutive glyph ids.
//!
//! An SVG table document covers one contiguous glyph id range, glyphs that
//! `<use>` the same element have to live in the same document.

use std::collections::{HashMap, HashSet};

use log::debug;

use emojidrasil::{disjoint_set::DisjointSet, types::GlyphName};
use emojiir::{
    color_glyph::ColorGlyph,
    ir::GlyphOrder,
    paint::{GlyphRef, Paint},
};

use crate::error::{Error, GlyphProblem};

/// Color glyphs that must share a document, groups ordered by their smallest
/// name and members in input order.
pub fn group_glyphs(glyphs: &[ColorGlyph]) -> Vec<Vec<GlyphName>> {
    let mut sets = DisjointSet::new();
    let mut owners: HashMap<&str, &GlyphName> = HashMap::new();
    for glyph in glyphs {
        sets.make_set(glyph.name.clone());
        for layer in glyph.painted_layers.iter() {
            for (node, _) in layer.breadth_first() {
                let Paint::Glyph {
                    glyph: GlyphRef::Path(d),
                    ..
                } = node
                else {
                    continue;
                };
                match owners.get(d.as_str()) {
                    Some(owner) => sets.union(owner, &glyph.name),
                    None => {
                        owners.insert(d.as_str(), &glyph.name);
                    }
                }
            }
        }
    }

    let input_order: HashMap<_, _> = glyphs
        .iter()
        .enumerate()
        .map(|(i, g)| (&g.name, i))
        .collect();
    let mut groups = sets.sorted();
    for group in groups.iter_mut() {
        group.sort_by_key(|name| input_order.get(name).copied().unwrap_or(usize::MAX));
    }
    debug!(
        "{} color glyphs form {} groups",
        glyphs.len(),
        groups.len()
    );
    groups
}

/// A glyph order where every group is a run of consecutive glyph ids.
///
/// Glyphs outside the groups keep their relative order and come first.
/// `built_tables` names tables already written against `glyph_order`,
/// reordering under them would corrupt the font.
pub fn reorder_glyphs(
    glyph_order: &GlyphOrder,
    groups: &[Vec<GlyphName>],
    built_tables: &[&str],
) -> Result<GlyphOrder, Error> {
    if !built_tables.is_empty() {
        return Err(Error::GlyphOrderViolation(format!(
            "{} already use glyph ids, reorder glyphs before building them",
            built_tables.join(", ")
        )));
    }
    for name in groups.iter().flatten() {
        if !glyph_order.contains(name) {
            return Err(Error::GlyphError(name.clone(), GlyphProblem::NotInGlyphOrder));
        }
    }
    let grouped: HashSet<_> = groups.iter().flatten().collect();

    let reordered: GlyphOrder = glyph_order
        .iter()
        .filter(|name| !grouped.contains(name))
        .chain(groups.iter().flatten())
        .cloned()
        .collect();
    if reordered.len() != glyph_order.len() {
        return Err(Error::GlyphOrderViolation(format!(
            "{} glyphs in, {} glyphs out; is a glyph in two groups?",
            glyph_order.len(),
            reordered.len()
        )));
    }
    check_contiguous(&reordered, groups)?;
    Ok(reordered)
}

/// Every group must cover a run of consecutive glyph ids
pub fn check_contiguous(glyph_order: &GlyphOrder, groups: &[Vec<GlyphName>]) -> Result<(), Error> {
    for group in groups {
        let gids = group
            .iter()
            .map(|name| {
                glyph_order
                    .glyph_id(name)
                    .ok_or_else(|| Error::GlyphError(name.clone(), GlyphProblem::NotInGlyphOrder))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if gids.windows(2).any(|w| w[1] != w[0] + 1) {
            return Err(Error::GlyphOrderViolation(format!(
                "group {group:?} has glyph ids {gids:?}"
            )));
        }
    }
    Ok(())
}

/// Group `glyphs`, reorder `glyph_order` to match and renumber the glyphs.
///
/// Returns the groups, glyphs come back sorted by their new glyph id.
pub fn regroup(
    glyphs: &mut Vec<ColorGlyph>,
    glyph_order: &mut GlyphOrder,
    built_tables: &[&str],
) -> Result<Vec<Vec<GlyphName>>, Error> {
    let groups = group_glyphs(glyphs);
    let reordered = reorder_glyphs(glyph_order, &groups, built_tables)?;
    for glyph in glyphs.iter_mut() {
        glyph.glyph_id = reordered
            .glyph_id(&glyph.name)
            .ok_or_else(|| Error::GlyphError(glyph.name.clone(), GlyphProblem::NotInGlyphOrder))?;
    }
    glyphs.sort_by_key(|g| g.glyph_id);
    *glyph_order = reordered;
    Ok(groups)
}
