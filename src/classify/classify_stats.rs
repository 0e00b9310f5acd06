// src/classify/classify_stats.rs

use ahash::AHashMap;
use std::fmt::Write as _;

use crate::error::Result;
use crate::lineage::Lineage;
use crate::shred::GenomeShredder;
use crate::sketch::FracMinHash;
use crate::tax_map::GenomeTaxMap;
use crate::types::SequenceRecord;

/// Fragment tally for one lineage after popping to a rank.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageTally {
    pub lineage: Lineage,
    pub fragments: usize,
    /// Share of all tax-map fragments, in percent.
    pub pct: f64,
}

/// Pop every fragment lineage to `rank` and count fragments per result, most
/// common first (ties by lineage).
pub fn lineage_tally_at_rank(tax_map: &GenomeTaxMap, rank: &str) -> Vec<LineageTally> {
    let mut counts: AHashMap<Lineage, usize> = AHashMap::new();
    for lineage in tax_map.lineages() {
        *counts.entry(lineage.pop_to_rank(rank)).or_insert(0) += 1;
    }

    let total = tax_map.len();
    let mut tallies: Vec<LineageTally> = counts
        .into_iter()
        .map(|(lineage, fragments)| LineageTally {
            lineage,
            fragments,
            pct: if total == 0 {
                0.0
            } else {
                100.0 * fragments as f64 / total as f64
            },
        })
        .collect();
    tallies.sort_by(|a, b| b.fragments.cmp(&a.fragments).then_with(|| a.lineage.cmp(&b.lineage)));
    tallies
}

/// How many distinct tallied lineages end at each rank; `(none)` for the root.
pub fn rank_histogram(tallies: &[LineageTally]) -> Vec<(String, usize)> {
    let mut counts: AHashMap<String, usize> = AHashMap::new();
    for tally in tallies {
        let rank = tally.lineage.rank().unwrap_or("(none)").to_string();
        *counts.entry(rank).or_insert(0) += 1;
    }
    let mut histogram: Vec<(String, usize)> = counts.into_iter().collect();
    histogram.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    histogram
}

/// Generate a plain-text summary of the tax map at order and genus rank.
pub fn get_tax_map_summary(tax_map: &GenomeTaxMap) -> String {
    let mut out = String::new();

    writeln!(out, "Genome file: {}", tax_map.genome_file).unwrap();
    writeln!(out, "LCA database: {}", tax_map.lca_db_name).unwrap();
    writeln!(out, "Fragment size: {}", tax_map.fragment_size).unwrap();
    writeln!(out, "Fragments recorded w/hashes: {}", tax_map.len()).unwrap();
    writeln!(out, "ksize: {}  scaled: {}", tax_map.params.ksize, tax_map.params.scaled).unwrap();
    writeln!(out, "Duplicate minimal hashes: {}", tax_map.n_collisions()).unwrap();

    for rank in ["order", "genus"] {
        let tallies = lineage_tally_at_rank(tax_map, rank);
        writeln!(out, "\n{} or above: {} distinct taxonomic matches", rank, tallies.len()).unwrap();
        for t in &tallies {
            writeln!(out, "* {} fragments ({:.1}%), {}", t.fragments, t.pct, t.lineage).unwrap();
        }
        if rank == "genus" {
            for (r, n) in rank_histogram(&tallies) {
                writeln!(out, "* {} at rank '{}'", n, r).unwrap();
            }
        }
    }
    out
}

/// What a tax map says about the genome it came from, checked against the
/// genome itself.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeSummary {
    pub n_contigs: usize,
    pub genome_bp: usize,
    /// Windows produced by re-fragmenting with the tax map's settings.
    pub n_fragments: usize,
    /// Windows that carried no hash.
    pub n_missed_fragments: usize,
    pub missed_bp: usize,
    pub most_common_order: Option<LineageTally>,
}

/// Re-fragment `records` with the tax map's fragment size and sketch
/// parameters and count what hashing could not see.
pub fn summarize_genome(tax_map: &GenomeTaxMap, records: &[SequenceRecord]) -> Result<GenomeSummary> {
    tax_map.params.validate()?;
    let shredder = GenomeShredder::new(records, tax_map.fragment_size)?;
    let factory = FracMinHash::new(tax_map.params, false);

    let mut n_fragments = 0;
    let mut n_missed_fragments = 0;
    let mut missed_bp = 0;
    for fragment in shredder.fragments() {
        n_fragments += 1;
        let mut mh = factory.copy_and_clear();
        mh.add_sequence(fragment.seq);
        if mh.is_empty() {
            n_missed_fragments += 1;
            missed_bp += fragment.len();
        }
    }

    Ok(GenomeSummary {
        n_contigs: records.len(),
        genome_bp: records.iter().map(|r| r.len()).sum(),
        n_fragments,
        n_missed_fragments,
        missed_bp,
        most_common_order: lineage_tally_at_rank(tax_map, "order").into_iter().next(),
    })
}

/// Generate the genome-level summary text followed by the tax map summary.
pub fn get_genome_summary(tax_map: &GenomeTaxMap, records: &[SequenceRecord]) -> Result<String> {
    let summary = summarize_genome(tax_map, records)?;
    let mut out = String::new();

    writeln!(
        out,
        "{:.1} Mbp in {} contigs",
        summary.genome_bp as f64 / 1e6,
        summary.n_contigs
    )
    .unwrap();
    writeln!(
        out,
        "Hashing missed {:.2} kbp in {} of {} fragments",
        summary.missed_bp as f64 / 1e3,
        summary.n_missed_fragments,
        summary.n_fragments
    )
    .unwrap();
    out.push_str(&get_tax_map_summary(tax_map));

    match &summary.most_common_order {
        Some(order) => writeln!(
            out,
            "\nThe most common order is: {} ({} fragments, {:.1}%)",
            order.lineage, order.fragments, order.pct
        )
        .unwrap(),
        None => writeln!(out, "\nNo fragment lineages recorded.").unwrap(),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DuplicatePolicy, SketchParams};

    fn lin(s: &str) -> Lineage {
        s.parse().unwrap()
    }

    fn map() -> GenomeTaxMap {
        let mut m = GenomeTaxMap::new("g.fa", SketchParams::default(), 1000, "db");
        let entries = [
            (1, "B;P;C;O;F;G;S1"),
            (2, "B;P;C;O;F;G;S2"),
            (3, "B;P;C;O;F;H"),
            (4, "B;X"),
        ];
        for (h, l) in entries {
            m.insert_fragment(h, lin(l), "c", DuplicatePolicy::Overwrite).unwrap();
        }
        m.insert_fragment(5, Lineage::root(), "c", DuplicatePolicy::Overwrite).unwrap();
        m
    }

    #[test]
    fn test_tally_at_order() {
        let tallies = lineage_tally_at_rank(&map(), "order");
        assert_eq!(tallies[0].lineage, lin("B;P;C;O"));
        assert_eq!(tallies[0].fragments, 3);
        assert!((tallies[0].pct - 60.0).abs() < 1e-9);
        assert_eq!(tallies.len(), 3);
    }

    #[test]
    fn test_rank_histogram() {
        let tallies = lineage_tally_at_rank(&map(), "genus");
        let hist = rank_histogram(&tallies);
        assert_eq!(hist[0], ("genus".to_string(), 2));
        assert!(hist.contains(&("(none)".to_string(), 1)));
        assert!(hist.contains(&("phylum".to_string(), 1)));
    }

    #[test]
    fn test_summary_text() {
        let text = get_tax_map_summary(&map());
        assert!(text.contains("Fragments recorded w/hashes: 5"));
        assert!(text.contains("order or above: 3 distinct"));
    }

    #[test]
    fn test_genome_summary() {
        let seq: String = "ACGTTGCAAGGCTTAC".chars().cycle().take(1500).collect();
        let records = vec![
            SequenceRecord::new("c1", &seq),
            SequenceRecord::new("gaps", &"N".repeat(700)),
        ];
        let params = SketchParams::new(5, 1).unwrap();
        let mut tax_map = GenomeTaxMap::new("g.fa", params, 1000, "db");
        tax_map
            .insert_fragment(1, lin("B;P;C;O;F;G;S1"), "c1", DuplicatePolicy::Overwrite)
            .unwrap();

        let summary = summarize_genome(&tax_map, &records).unwrap();
        assert_eq!(summary.n_contigs, 2);
        assert_eq!(summary.genome_bp, 2200);
        assert_eq!(summary.n_fragments, 3);
        assert_eq!(summary.n_missed_fragments, 1);
        assert_eq!(summary.missed_bp, 700);
        assert_eq!(summary.most_common_order.as_ref().unwrap().lineage, lin("B;P;C;O"));

        let text = get_genome_summary(&tax_map, &records).unwrap();
        assert!(text.starts_with("0.0 Mbp in 2 contigs\n"));
        assert!(text.contains("Hashing missed 0.70 kbp in 1 of 3 fragments"));
        assert!(text.contains("The most common order is: "));
    }

    #[test]
    fn test_genome_summary_needs_fragment_size() {
        let mut tax_map = map();
        tax_map.fragment_size = 0;
        let records = vec![SequenceRecord::new("c", "ACGT")];
        assert!(summarize_genome(&tax_map, &records).is_err());
    }
}
