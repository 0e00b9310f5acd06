pub mod classify_fragment;
pub mod classify_stats;
pub mod gather;
pub mod lca_counts;
pub mod shred_to_tax;

use std::fmt;

pub use classify_fragment::{classify_fragment, majority_lineage, FragmentCall, MajorityLineage};
pub use gather::{gather_assignments, Assignments};
pub use lca_counts::{aggregate, classify_hashes, count_lca_for_assignments, summarize, LcaAggregate};
pub use shred_to_tax::{shred_to_tax, FragmentResult, ShredResults, ShredStats};

/// Outcome of building one tree from every retained LCA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LcaStatus {
    /// The tree walk ended at a leaf.
    Found,
    /// The tree branches below the returned lineage.
    Disagree,
    /// Nothing survived the threshold.
    NoMatch,
}

impl LcaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LcaStatus::Found => "found",
            LcaStatus::Disagree => "disagree",
            LcaStatus::NoMatch => "nomatch",
        }
    }
}

impl fmt::Display for LcaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Clean,
    Dirty,
    Unclassified,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::Dirty => "dirty",
            Verdict::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a fragment got its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallReason {
    /// Agrees with the genome at genus rank.
    Consistent,
    /// Consensus stops above genus.
    RankTooCoarse,
    /// Consensus does not share the genome's genus.
    GenusMismatch,
    /// No retained lineage; verdict set by the no-match policy.
    NoMatch,
}

impl CallReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallReason::Consistent => "consistent",
            CallReason::RankTooCoarse => "rank_too_coarse",
            CallReason::GenusMismatch => "genus_mismatch",
            CallReason::NoMatch => "nomatch",
        }
    }
}

impl fmt::Display for CallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
