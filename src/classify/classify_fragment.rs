use ahash::AHashMap;

use super::gather::Assignments;
use super::{CallReason, LcaStatus, Verdict};
use crate::config::NoMatchPolicy;
use crate::error::{CharcoalError, Result};
use crate::lineage::{is_rank_at_least, Lineage};

/// The lineage most of a genome's hashes point to.
#[derive(Debug, Clone, PartialEq)]
pub struct MajorityLineage {
    pub lineage: Lineage,
    /// Hashes assigned (among others) to `lineage`.
    pub count: usize,
    /// Hashes with any assignment.
    pub n_hashes: usize,
}

impl MajorityLineage {
    pub fn fraction(&self) -> f64 {
        if self.n_hashes == 0 {
            0.0
        } else {
            self.count as f64 / self.n_hashes as f64
        }
    }
}

/// Count every (hash, lineage) assignment across the whole genome and pick
/// the most common lineage. Ties go to the smallest lineage.
///
/// The winner must be at species or strain rank; anything coarser means the
/// genome cannot be used as its own reference.
pub fn majority_lineage(assignments: &Assignments) -> Result<MajorityLineage> {
    let mut counts: AHashMap<&Lineage, usize> = AHashMap::new();
    for lineages in assignments.values() {
        for lineage in lineages {
            *counts.entry(lineage).or_insert(0) += 1;
        }
    }

    let (lineage, count) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .ok_or(CharcoalError::NoGenomeMatches)?;

    let majority = MajorityLineage {
        lineage: lineage.clone(),
        count,
        n_hashes: assignments.len(),
    };
    log::info!(
        "{:.1}% of hashes identify as {}",
        majority.fraction() * 100.0,
        majority.lineage
    );

    match majority.lineage.rank() {
        Some("species") | Some("strain") => Ok(majority),
        rank => Err(CharcoalError::InconclusiveGenome {
            lineage: majority.lineage.to_string(),
            rank: rank.unwrap_or("(root)").to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentCall {
    pub verdict: Verdict,
    pub reason: CallReason,
}

impl FragmentCall {
    fn new(verdict: Verdict, reason: CallReason) -> Self {
        Self { verdict, reason }
    }
}

/// Decide whether a fragment belongs with the rest of its genome.
///
/// A consensus above genus rank is dirty; a consensus that does not share the
/// majority lineage's genus is dirty; everything else is clean. "No match"
/// fragments carry the empty lineage, which fails the genus test, unless the
/// policy says otherwise.
pub fn classify_fragment(
    consensus: &Lineage,
    status: LcaStatus,
    majority: &Lineage,
    policy: NoMatchPolicy,
) -> FragmentCall {
    if status == LcaStatus::NoMatch {
        match policy {
            NoMatchPolicy::Dirty => {}
            NoMatchPolicy::Clean => return FragmentCall::new(Verdict::Clean, CallReason::NoMatch),
            NoMatchPolicy::Unclassified => {
                return FragmentCall::new(Verdict::Unclassified, CallReason::NoMatch)
            }
        }
    }

    if let Some(rank) = consensus.rank() {
        if !is_rank_at_least(rank, "genus") {
            log::debug!("dirty! {} at rank {}", consensus, rank);
            return FragmentCall::new(Verdict::Dirty, CallReason::RankTooCoarse);
        }
    }
    if !majority.is_lineage_match(consensus, "genus") {
        log::debug!("dirty! {}", consensus);
        return FragmentCall::new(Verdict::Dirty, CallReason::GenusMismatch);
    }
    FragmentCall::new(Verdict::Clean, CallReason::Consistent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    fn lin(s: &str) -> Lineage {
        s.parse().unwrap()
    }

    const GENOME: &str = "B;P;C;O;F;G;G sp";

    #[test]
    fn test_majority_picks_most_common() {
        let mut a = Assignments::new();
        for h in 0..3u64 {
            a.insert(h, [lin(GENOME)].into_iter().collect::<AHashSet<_>>());
        }
        a.insert(9, [lin("B;P;X;Y;Z;W;W sp")].into_iter().collect());
        let m = majority_lineage(&a).unwrap();
        assert_eq!(m.lineage, lin(GENOME));
        assert_eq!(m.count, 3);
        assert!((m.fraction() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_majority_rank_too_coarse_fails() {
        let mut a = Assignments::new();
        a.insert(1, [lin("B;P;C;O;F;G")].into_iter().collect());
        let err = majority_lineage(&a).unwrap_err();
        assert!(matches!(err, CharcoalError::InconclusiveGenome { ref rank, .. } if rank == "genus"));
    }

    #[test]
    fn test_majority_requires_matches() {
        assert!(matches!(
            majority_lineage(&Assignments::new()),
            Err(CharcoalError::NoGenomeMatches)
        ));
    }

    #[test]
    fn test_majority_tie_is_deterministic() {
        let mut a = Assignments::new();
        a.insert(1, [lin("B;P;C;O;F;G;A sp")].into_iter().collect());
        a.insert(2, [lin("B;P;C;O;F;G;B sp")].into_iter().collect());
        let m = majority_lineage(&a).unwrap();
        assert_eq!(m.lineage, lin("B;P;C;O;F;G;A sp"));
    }

    #[test]
    fn test_rank_too_coarse() {
        let call = classify_fragment(&lin("B;P;C;O"), LcaStatus::Disagree, &lin(GENOME), NoMatchPolicy::Dirty);
        assert_eq!(call.verdict, Verdict::Dirty);
        assert_eq!(call.reason, CallReason::RankTooCoarse);
    }

    #[test]
    fn test_genus_rule_is_symmetric() {
        let same_genus = lin("B;P;C;O;F;G;other sp");
        let other_genus = lin("B;P;C;O;F;H;H sp");
        for (a, b) in [(lin(GENOME), same_genus.clone()), (same_genus.clone(), lin(GENOME))] {
            let call = classify_fragment(&a, LcaStatus::Found, &b, NoMatchPolicy::Dirty);
            assert_eq!(call, FragmentCall::new(Verdict::Clean, CallReason::Consistent));
        }
        for (a, b) in [(lin(GENOME), other_genus.clone()), (other_genus.clone(), lin(GENOME))] {
            let call = classify_fragment(&a, LcaStatus::Found, &b, NoMatchPolicy::Dirty);
            assert_eq!(call, FragmentCall::new(Verdict::Dirty, CallReason::GenusMismatch));
        }
        // genus-level consensus in the right genus is fine
        let call = classify_fragment(&lin("B;P;C;O;F;G"), LcaStatus::Disagree, &lin(GENOME), NoMatchPolicy::Dirty);
        assert_eq!(call.verdict, Verdict::Clean);
    }

    #[test]
    fn test_nomatch_policies() {
        let root = Lineage::root();
        let dirty = classify_fragment(&root, LcaStatus::NoMatch, &lin(GENOME), NoMatchPolicy::Dirty);
        assert_eq!(dirty, FragmentCall::new(Verdict::Dirty, CallReason::GenusMismatch));

        let clean = classify_fragment(&root, LcaStatus::NoMatch, &lin(GENOME), NoMatchPolicy::Clean);
        assert_eq!(clean, FragmentCall::new(Verdict::Clean, CallReason::NoMatch));

        let unc = classify_fragment(&root, LcaStatus::NoMatch, &lin(GENOME), NoMatchPolicy::Unclassified);
        assert_eq!(unc.verdict, Verdict::Unclassified);
    }
}
