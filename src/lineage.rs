//src/lineage.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CharcoalError;

/// Standard ranks, coarse to fine.
pub const RANKS: [&str; 8] = [
    "superkingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "species",
    "strain",
];

/// Position of `rank` in [`RANKS`]; `domain` is accepted as an alias of the top rank.
pub fn rank_index(rank: &str) -> Option<usize> {
    if rank == "domain" {
        return Some(0);
    }
    RANKS.iter().position(|r| *r == rank)
}

/// True if `rank` is `floor` or finer. Unknown ranks are never fine enough.
pub fn is_rank_at_least(rank: &str, floor: &str) -> bool {
    match (rank_index(rank), rank_index(floor)) {
        (Some(r), Some(f)) => r >= f,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineagePair {
    pub rank: String,
    pub name: String,
}

impl LineagePair {
    pub fn new(rank: &str, name: &str) -> Self {
        Self {
            rank: rank.to_string(),
            name: name.to_string(),
        }
    }
}

/// A rank-ordered path from coarse to fine. The empty lineage is the root.
///
/// Ordering is lexicographic over pairs, so every prefix sorts before its
/// extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lineage(Vec<LineagePair>);

impl Lineage {
    pub fn new(pairs: Vec<LineagePair>) -> Self {
        Lineage(pairs)
    }

    pub fn root() -> Self {
        Lineage(Vec::new())
    }

    /// Assign names to [`RANKS`] in order. Extra names beyond `strain` are dropped.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Lineage(
            names
                .iter()
                .zip(RANKS.iter())
                .map(|(name, rank)| LineagePair::new(rank, name.as_ref()))
                .collect(),
        )
    }

    pub fn pairs(&self) -> &[LineagePair] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deepest rank, `None` for the root.
    pub fn rank(&self) -> Option<&str> {
        self.0.last().map(|p| p.rank.as_str())
    }

    pub fn last(&self) -> Option<&LineagePair> {
        self.0.last()
    }

    /// Drop the deepest pair. Returns `false` if already at the root.
    pub fn pop(&mut self) -> bool {
        self.0.pop().is_some()
    }

    pub fn parent(&self) -> Option<Lineage> {
        if self.is_empty() {
            return None;
        }
        Some(Lineage(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn is_ancestor_of(&self, other: &Lineage) -> bool {
        self.0.len() <= other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Longest shared prefix.
    pub fn common_prefix(&self, other: &Lineage) -> Lineage {
        let shared = self
            .0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Lineage(self.0[..shared].to_vec())
    }

    /// Truncate everything below `rank`. A lineage that never reaches `rank`
    /// comes back unchanged.
    pub fn pop_to_rank(&self, rank: &str) -> Lineage {
        match self.0.iter().position(|p| p.rank == rank) {
            Some(idx) => Lineage(self.0[..=idx].to_vec()),
            None => self.clone(),
        }
    }

    /// True if both lineages agree on every pair down to and including `rank`.
    /// A lineage that stops above `rank` never matches.
    pub fn is_lineage_match(&self, other: &Lineage, rank: &str) -> bool {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            if a != b {
                return false;
            }
            if a.rank == rank {
                return true;
            }
        }
        false
    }

    /// Semicolon-joined names. With `truncate_empty`, trailing unnamed ranks are dropped.
    pub fn display(&self, truncate_empty: bool) -> String {
        let mut names: Vec<&str> = self.0.iter().map(|p| p.name.as_str()).collect();
        if truncate_empty {
            while names.last().map_or(false, |n| n.is_empty()) {
                names.pop();
            }
        }
        names.join(";")
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", self.display(true))
        }
    }
}

/// Parse `Bacteria;Proteobacteria;...` using the standard rank order.
impl FromStr for Lineage {
    type Err = CharcoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Lineage::root());
        }
        let names: Vec<&str> = s.split(';').map(str::trim).collect();
        if names.len() > RANKS.len() {
            return Err(CharcoalError::InvalidConfig(format!(
                "lineage '{}' has {} ranks, at most {} supported",
                s,
                names.len(),
                RANKS.len()
            )));
        }
        Ok(Lineage::from_names(&names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lin(s: &str) -> Lineage {
        s.parse().unwrap()
    }

    #[test]
    fn test_rank_and_pop() {
        let l = lin("Bacteria;Proteobacteria;Gammaproteobacteria;Enterobacterales;Enterobacteriaceae;Escherichia;Escherichia coli");
        assert_eq!(l.rank(), Some("species"));
        assert_eq!(l.pop_to_rank("order").rank(), Some("order"));
        assert_eq!(l.pop_to_rank("order").len(), 4);

        let short = lin("Bacteria;Proteobacteria");
        assert_eq!(short.pop_to_rank("genus"), short);
        assert_eq!(Lineage::root().rank(), None);
    }

    #[test]
    fn test_genus_match() {
        let a = lin("B;P;C;O;F;G;G s1");
        let b = lin("B;P;C;O;F;G;G s2");
        let c = lin("B;P;C;O;F;H;H s1");
        let genus_only = lin("B;P;C;O;F;G");
        let family_only = lin("B;P;C;O;F");

        assert!(a.is_lineage_match(&b, "genus"));
        assert!(a.is_lineage_match(&genus_only, "genus"));
        assert!(!a.is_lineage_match(&c, "genus"));
        assert!(!a.is_lineage_match(&family_only, "genus"));
        assert!(!a.is_lineage_match(&Lineage::root(), "genus"));
        assert!(!Lineage::root().is_lineage_match(&Lineage::root(), "genus"));
    }

    #[test]
    fn test_prefix_ordering() {
        let parent = lin("B;P;C");
        let child = lin("B;P;C;O");
        assert!(parent < child);
        assert!(parent.is_ancestor_of(&child));
        assert!(Lineage::root().is_ancestor_of(&child));
        assert_eq!(child.parent(), Some(parent.clone()));
        assert_eq!(child.common_prefix(&lin("B;P;X")), lin("B;P"));
    }

    #[test]
    fn test_display_truncates_empty() {
        let l = Lineage::new(vec![
            LineagePair::new("superkingdom", "Bacteria"),
            LineagePair::new("phylum", ""),
        ]);
        assert_eq!(l.display(false), "Bacteria;");
        assert_eq!(l.display(true), "Bacteria");
        assert_eq!(Lineage::root().to_string(), "(root)");
    }

    #[test]
    fn test_rank_floor() {
        assert!(is_rank_at_least("species", "genus"));
        assert!(is_rank_at_least("genus", "genus"));
        assert!(!is_rank_at_least("order", "genus"));
        assert!(!is_rank_at_least("clade", "genus"));
        assert_eq!(rank_index("domain"), Some(0));
    }
}
