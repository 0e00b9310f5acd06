use std::collections::BTreeSet;
use std::io;

use super::classify_fragment::{classify_fragment, majority_lineage, FragmentCall, MajorityLineage};
use super::gather::{check_databases, gather_assignments, select_assignments};
use super::lca_counts::aggregate;
use super::{LcaStatus, Verdict};
use crate::config::ShredConfig;
use crate::error::Result;
use crate::lcadb::LineageDatabase;
use crate::lineage::Lineage;
use crate::shred::GenomeShredder;
use crate::sketch::FracMinHash;
use crate::tax_map::GenomeTaxMap;
use crate::types::{FragmentReportRow, LineageCountRow, SequenceRecord};

/// Everything learned about one fragment that had at least one hash.
#[derive(Debug, Clone)]
pub struct FragmentResult {
    pub contig: String,
    pub start: usize,
    pub end: usize,
    pub n_hashes: usize,
    pub min_hash: u64,
    /// Aggregated lineage counts, most common first.
    pub lineage_counts: Vec<(Lineage, u32)>,
    pub consensus: Lineage,
    pub status: LcaStatus,
    pub call: FragmentCall,
}

/// Run-level counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShredStats {
    /// All windows, including skipped ones.
    pub n_fragments: usize,
    /// Windows with no hashes or below the minimum size.
    pub n_skipped: usize,
    pub sum_bp: usize,
    pub sum_missed_bp: usize,
    pub n_clean: usize,
    pub n_dirty: usize,
    pub n_unclassified: usize,
    /// Fragments whose minimal hash was already in the tax map.
    pub n_collisions: usize,
}

#[derive(Debug)]
pub struct ShredResults {
    pub genome: String,
    pub majority: MajorityLineage,
    pub fragments: Vec<FragmentResult>,
    pub tax_map: GenomeTaxMap,
    pub stats: ShredStats,
}

impl ShredResults {
    /// One row per classified fragment.
    pub fn report_rows(&self) -> Vec<FragmentReportRow> {
        self.fragments
            .iter()
            .map(|f| FragmentReportRow {
                genome: self.genome.clone(),
                contig: f.contig.clone(),
                begin: f.start,
                end: f.end,
                lca: f.consensus.display(true),
                lca_rank: f.consensus.rank().unwrap_or("").to_string(),
                verdict: f.call.verdict,
                reason: f.call.reason,
                status: f.status,
            })
            .collect()
    }

    /// One row per retained lineage count per fragment.
    pub fn lineage_count_rows(&self) -> Vec<LineageCountRow> {
        let mut rows = Vec::new();
        for f in &self.fragments {
            for (lineage, count) in &f.lineage_counts {
                rows.push(LineageCountRow {
                    genome: self.genome.clone(),
                    contig: f.contig.clone(),
                    begin: f.start,
                    end: f.end,
                    lineage: lineage.display(false),
                    rank: lineage.rank().unwrap_or("").to_string(),
                    count: *count,
                });
            }
        }
        rows
    }

    /// Write the per-fragment CSV
    pub fn write_fragment_report<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([
            "filename",
            "contig",
            "begin",
            "end",
            "lca",
            "lca_rank",
            "classified_as",
            "classify_reason",
            "lca_status",
        ])?;
        for row in self.report_rows() {
            wtr.write_record([
                row.genome,
                row.contig,
                row.begin.to_string(),
                row.end.to_string(),
                row.lca,
                row.lca_rank,
                row.verdict.to_string(),
                row.reason.to_string(),
                row.status.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write one CSV row per retained lineage count per fragment
    pub fn write_lineage_counts_report<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["filename", "contig", "begin", "end", "lineage", "rank", "count"])?;
        for row in self.lineage_count_rows() {
            wtr.write_record([
                row.genome,
                row.contig,
                row.begin.to_string(),
                row.end.to_string(),
                row.lineage,
                row.rank,
                row.count.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Generate the per-fragment CSV on demand
    pub fn get_fragment_report(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_fragment_report(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Generate the per-lineage count CSV on demand
    pub fn get_lineage_counts_report(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_lineage_counts_report(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Minimal hashes of every dirty fragment.
    pub fn dirty_hashes(&self) -> BTreeSet<u64> {
        self.fragments
            .iter()
            .filter(|f| f.call.verdict == Verdict::Dirty)
            .map(|f| f.min_hash)
            .collect()
    }
}

/// Fragment a genome, classify every fragment against `dbs`, and build the
/// genome's tax map.
///
/// Fragments are sketched once. The union of their hashes gives the genome's
/// majority lineage; the same assignments are then reused per fragment, in
/// contig and position order.
pub fn shred_to_tax(
    genome: &str,
    records: &[SequenceRecord],
    dbs: &[&dyn LineageDatabase],
    lca_db_name: &str,
    config: &ShredConfig,
) -> Result<ShredResults> {
    config.validate()?;
    check_databases(&config.sketch, dbs)?;

    let mut stats = ShredStats::default();
    let factory = FracMinHash::new(config.sketch, false);

    // 1. Fragment and sketch
    let shredder = GenomeShredder::new(records, config.fragment_size)?
        .with_min_fragment_size(config.min_fragment_size);
    let mut fragments = shredder.fragments();
    let mut sketched = Vec::new();
    for fragment in fragments.by_ref() {
        stats.n_fragments += 1;
        stats.sum_bp += fragment.len();

        let mut mh = factory.copy_and_clear();
        mh.add_sequence(fragment.seq);
        if mh.is_empty() {
            stats.sum_missed_bp += fragment.len();
            stats.n_skipped += 1;
            continue;
        }
        sketched.push((fragment, mh));
    }
    stats.n_fragments += fragments.n_skipped();
    stats.n_skipped += fragments.n_skipped();
    stats.sum_bp += fragments.skipped_bp();
    stats.sum_missed_bp += fragments.skipped_bp();

    // 2. Genome-wide majority lineage from the union of all fragment hashes
    let mut whole = factory.copy_and_clear();
    for (_, mh) in &sketched {
        whole.merge(mh);
    }
    let all_assignments = gather_assignments(whole.hashes(), dbs);
    let majority = majority_lineage(&all_assignments)?;

    // 3. Per-fragment classification
    let mut tax_map = GenomeTaxMap::new(genome, config.sketch, config.fragment_size, lca_db_name);
    let mut results = Vec::with_capacity(sketched.len());
    for (fragment, mh) in &sketched {
        let min_hash = match mh.min_hash() {
            Some(h) => h,
            None => continue,
        };
        let assignments = select_assignments(&all_assignments, mh.hashes());
        let agg = aggregate(&assignments, config.min_count);
        let call = classify_fragment(&agg.consensus, agg.status, &majority.lineage, config.nomatch_policy);

        match call.verdict {
            Verdict::Clean => stats.n_clean += 1,
            Verdict::Dirty => stats.n_dirty += 1,
            Verdict::Unclassified => stats.n_unclassified += 1,
        }

        if tax_map.insert_fragment(min_hash, agg.consensus.clone(), fragment.name, config.duplicate_policy)? {
            stats.n_collisions += 1;
        }

        results.push(FragmentResult {
            contig: fragment.name.to_string(),
            start: fragment.start,
            end: fragment.end,
            n_hashes: mh.len(),
            min_hash,
            lineage_counts: agg.counts,
            consensus: agg.consensus,
            status: agg.status,
            call,
        });
    }

    log::info!(
        "{} fragments / {} bp, {} hash values (missing {} fragments / {} bp)",
        stats.n_fragments,
        stats.sum_bp,
        tax_map.len(),
        stats.n_skipped,
        stats.sum_missed_bp
    );
    if stats.n_collisions > 0 {
        log::warn!(
            "{} fragments shared a minimal hash with an earlier fragment",
            stats.n_collisions
        );
    }

    Ok(ShredResults {
        genome: genome.to_string(),
        majority,
        fragments: results,
        tax_map,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CallReason;
    use crate::config::SketchParams;

    fn lin(s: &str) -> Lineage {
        s.parse().unwrap()
    }

    #[test]
    fn test_report_quotes_fields() {
        let species = lin("B;P;C;O;F;G;G sp");
        let results = ShredResults {
            genome: "odd, name.fa".to_string(),
            majority: MajorityLineage {
                lineage: species.clone(),
                count: 1,
                n_hashes: 1,
            },
            fragments: vec![FragmentResult {
                contig: "ctg,1".to_string(),
                start: 0,
                end: 10,
                n_hashes: 1,
                min_hash: 7,
                lineage_counts: vec![(species.clone(), 1)],
                consensus: species,
                status: LcaStatus::Found,
                call: FragmentCall {
                    verdict: Verdict::Clean,
                    reason: CallReason::Consistent,
                },
            }],
            tax_map: GenomeTaxMap::new("odd, name.fa", SketchParams::default(), 10, "db"),
            stats: ShredStats::default(),
        };

        let report = results.get_fragment_report().unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines[0],
            "filename,contig,begin,end,lca,lca_rank,classified_as,classify_reason,lca_status"
        );
        assert_eq!(
            lines[1],
            "\"odd, name.fa\",\"ctg,1\",0,10,B;P;C;O;F;G;G sp,species,clean,consistent,found"
        );

        let counts = results.get_lineage_counts_report().unwrap();
        assert_eq!(counts.lines().count(), 2);
        assert!(counts.contains("\"ctg,1\""));
        assert!(results.dirty_hashes().is_empty());
    }
}
