//! Union-find over hashable, orderable elements.
//!
//! Used to group color glyphs that share reusable shapes.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    hash::Hash,
};

use log::trace;

#[derive(Debug, Clone)]
pub struct DisjointSet<T> {
    parent: HashMap<T, T>,
    rank: HashMap<T, usize>,
}

impl<T> Default for DisjointSet<T> {
    fn default() -> Self {
        Self {
            parent: HashMap::new(),
            rank: HashMap::new(),
        }
    }
}

impl<T> DisjointSet<T>
where
    T: Clone + Eq + Hash + Ord + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `e` as a singleton set, no-op if it is already present.
    pub fn make_set(&mut self, e: T) {
        if self.parent.contains_key(&e) {
            return;
        }
        self.rank.insert(e.clone(), 0);
        self.parent.insert(e.clone(), e);
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// The representative of the set containing `e`, adding `e` if needed.
    pub fn find(&mut self, e: &T) -> T {
        if !self.parent.contains_key(e) {
            self.make_set(e.clone());
            return e.clone();
        }

        let mut root = e.clone();
        while self.parent[&root] != root {
            root = self.parent[&root].clone();
        }

        // path compression
        let mut curr = e.clone();
        while curr != root {
            let next = self.parent.insert(curr, root.clone()).unwrap_or_else(|| root.clone());
            curr = next;
        }
        root
    }

    /// Merge the sets containing `x` and `y`.
    pub fn union(&mut self, x: &T, y: &T) {
        let x_root = self.find(x);
        let y_root = self.find(y);
        if x_root == y_root {
            return;
        }
        trace!("Union {x:?} and {y:?}");

        let x_rank = self.rank[&x_root];
        let y_rank = self.rank[&y_root];
        if x_rank < y_rank {
            self.parent.insert(x_root, y_root);
        } else if x_rank > y_rank {
            self.parent.insert(y_root, x_root);
        } else {
            self.parent.insert(y_root, x_root.clone());
            self.rank.insert(x_root, x_rank + 1);
        }
    }

    /// Every set, keyed by its representative.
    pub fn sets(&mut self) -> Vec<BTreeSet<T>> {
        let elements: Vec<_> = self.parent.keys().cloned().collect();
        let mut by_root: BTreeMap<T, BTreeSet<T>> = BTreeMap::new();
        for e in elements {
            let root = self.find(&e);
            by_root.entry(root).or_default().insert(e);
        }
        by_root.into_values().collect()
    }

    /// Every set as a sorted list, sets ordered by their smallest member.
    pub fn sorted(&mut self) -> Vec<Vec<T>> {
        let mut sets: Vec<Vec<T>> = self
            .sets()
            .into_iter()
            .map(|s| s.into_iter().collect())
            .collect();
        sets.sort();
        sets
    }
}
