use ahash::AHashMap;

use super::gather::Assignments;
use super::LcaStatus;
use crate::lca_tree::LcaTree;
use crate::lineage::Lineage;

/// lineage -> number of fingerprints
pub type LcaCounts = AHashMap<Lineage, u32>;

/// Per-fragment LCA evidence: aggregated counts plus the consensus call.
#[derive(Debug, Clone)]
pub struct LcaAggregate {
    /// Counts climbed to the root, most common first.
    pub counts: Vec<(Lineage, u32)>,
    pub consensus: Lineage,
    pub status: LcaStatus,
}

/// Reduce each hash's candidate lineages to their LCA and tally one count per
/// hash at that LCA.
///
/// Candidates are built into an [`LcaTree`], so a lineage that is an ancestor
/// of another candidate does not pull the LCA upward; only branching does.
pub fn count_lca_for_assignments(assignments: &Assignments) -> LcaCounts {
    let mut counts = LcaCounts::new();
    for lineages in assignments.values() {
        let lca = if lineages.len() == 1 {
            match lineages.iter().next() {
                Some(l) => l.clone(),
                None => continue,
            }
        } else {
            LcaTree::build(lineages.iter()).find_lca().0
        };
        *counts.entry(lca).or_insert(0) += 1;
    }
    counts
}

/// Sort descending by count. Equal counts currently fall back to lineage
/// order; callers must not rely on the order of ties.
pub fn most_common(counts: &LcaCounts) -> Vec<(Lineage, u32)> {
    let mut pairs: Vec<(Lineage, u32)> = counts.iter().map(|(l, &c)| (l.clone(), c)).collect();
    pairs.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

/// Entries with at least `threshold` counts, most common first.
pub fn retained_lcas(counts: &LcaCounts, threshold: u32) -> Vec<(Lineage, u32)> {
    most_common(counts)
        .into_iter()
        // sorted, so the first miss ends it
        .take_while(|(_, count)| *count >= threshold)
        .collect()
}

/// Add each retained LCA's count to itself and every ancestor up to the root.
fn climb_to_root(retained: &[(Lineage, u32)]) -> Vec<(Lineage, u32)> {
    let mut aggregated = LcaCounts::new();
    for (lca, count) in retained {
        let mut node = lca.clone();
        loop {
            *aggregated.entry(node.clone()).or_insert(0) += count;
            if !node.pop() {
                break;
            }
        }
    }
    most_common(&aggregated)
}

/// Build one tree from the retained LCAs and take its LCA.
fn consensus(retained: &[(Lineage, u32)]) -> (Lineage, LcaStatus) {
    let tree = LcaTree::build(retained.iter().map(|(l, _)| l));
    if tree.is_empty() {
        return (Lineage::root(), LcaStatus::NoMatch);
    }
    let (lca, branches) = tree.find_lca();
    let status = if branches == 0 {
        LcaStatus::Found
    } else {
        LcaStatus::Disagree
    };
    (lca, status)
}

/// Aggregated lineage counts for `assignments`, ignoring LCAs seen fewer than
/// `threshold` times.
pub fn summarize(assignments: &Assignments, threshold: u32) -> Vec<(Lineage, u32)> {
    let counts = count_lca_for_assignments(assignments);
    climb_to_root(&retained_lcas(&counts, threshold))
}

/// Consensus lineage and status for `assignments`.
pub fn classify_hashes(assignments: &Assignments, threshold: u32) -> (Lineage, LcaStatus) {
    let counts = count_lca_for_assignments(assignments);
    consensus(&retained_lcas(&counts, threshold))
}

/// [`summarize`] and [`classify_hashes`] from a single counting pass.
pub fn aggregate(assignments: &Assignments, threshold: u32) -> LcaAggregate {
    let counts = count_lca_for_assignments(assignments);
    let retained = retained_lcas(&counts, threshold);
    let (consensus, status) = consensus(&retained);
    LcaAggregate {
        counts: climb_to_root(&retained),
        consensus,
        status,
    }
}
