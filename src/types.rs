//src/types.rs

use crate::classify::{CallReason, LcaStatus, Verdict};

/// A minimal representation of a contig or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Header up to the first whitespace.
    pub name: String,
    pub header_line: String,
    pub seq: String,
}

impl SequenceRecord {
    pub fn new(header_line: &str, seq: &str) -> Self {
        Self {
            name: header_line.split_whitespace().next().unwrap_or("").to_string(),
            header_line: header_line.to_string(),
            seq: seq.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// A structured representation of one per-fragment report row.
/// For example:
///  filename  contig  begin  end  lca  lca_rank  classified_as  classify_reason  lca_status
#[derive(Debug, Clone)]
pub struct FragmentReportRow {
    pub genome: String,
    pub contig: String,
    pub begin: usize,
    pub end: usize,
    /// Consensus lineage, rank-truncated display string.
    pub lca: String,
    /// Deepest rank of the consensus lineage, empty for the root.
    pub lca_rank: String,
    pub verdict: Verdict,
    pub reason: CallReason,
    pub status: LcaStatus,
}

/// One aggregated lineage count for a fragment, after threshold filtering.
#[derive(Debug, Clone)]
pub struct LineageCountRow {
    pub genome: String,
    pub contig: String,
    pub begin: usize,
    pub end: usize,
    pub lineage: String,
    pub rank: String,
    pub count: u32,
}
