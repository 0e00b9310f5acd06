//src/lca_tree.rs

use std::collections::BTreeMap;

use crate::lineage::{Lineage, LineagePair};

/// A prefix tree over lineages. Children are kept sorted so that walks are
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct LcaTree {
    children: BTreeMap<LineagePair, LcaTree>,
}

impl LcaTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<'a, I>(lineages: I) -> Self
    where
        I: IntoIterator<Item = &'a Lineage>,
    {
        let mut tree = LcaTree::new();
        for lineage in lineages {
            tree.insert(lineage);
        }
        tree
    }

    /// Add every pair of `lineage` as a path from the root. The root lineage adds nothing.
    pub fn insert(&mut self, lineage: &Lineage) {
        let mut node = self;
        for pair in lineage.pairs() {
            node = node.children.entry(pair.clone()).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Walk down while there is exactly one child.
    ///
    /// Returns the lineage reached plus the number of branches below it: `0`
    /// means the walk ended at a leaf, anything else is a branch point where the
    /// inserted lineages disagree.
    pub fn find_lca(&self) -> (Lineage, usize) {
        let mut node = self;
        let mut path = Vec::new();
        loop {
            match node.children.len() {
                1 => {
                    if let Some((pair, child)) = node.children.iter().next() {
                        path.push(pair.clone());
                        node = child;
                    }
                }
                0 => return (Lineage::new(path), 0),
                n => return (Lineage::new(path), n),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lin(s: &str) -> Lineage {
        s.parse().unwrap()
    }

    #[test]
    fn test_single_lineage_is_leaf() {
        let l = lin("B;P;C;O;F;G;S");
        let tree = LcaTree::build([&l]);
        assert_eq!(tree.find_lca(), (l, 0));
    }

    #[test]
    fn test_branching_reports_disagreement() {
        let a = lin("B;P;C;O;F;G1");
        let b = lin("B;P;C;O;F;G2");
        let c = lin("B;P;C;O;F2");
        let tree = LcaTree::build([&a, &b]);
        assert_eq!(tree.find_lca(), (lin("B;P;C;O;F"), 2));

        let tree = LcaTree::build([&a, &b, &c]);
        assert_eq!(tree.find_lca(), (lin("B;P;C;O"), 2));
    }

    #[test]
    fn test_nested_lineages_resolve_to_deepest() {
        let genus = lin("B;P;C;O;F;G");
        let species = lin("B;P;C;O;F;G;S");
        let tree = LcaTree::build([&genus, &species]);
        assert_eq!(tree.find_lca(), (species, 0));
    }

    #[test]
    fn test_empty_tree() {
        let tree = LcaTree::build([&Lineage::root()]);
        assert!(tree.is_empty());
        assert_eq!(tree.find_lca(), (Lineage::root(), 0));
    }
}
