//src/shred.rs

use crate::error::{CharcoalError, Result};
use crate::types::SequenceRecord;

/// A contiguous window of one contig. `start..end` are byte offsets into the contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub name: &'a str,
    pub seq: &'a [u8],
    pub start: usize,
    pub end: usize,
}

impl<'a> Fragment<'a> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits contigs into fixed-size, non-overlapping windows. Each call to
/// [`GenomeShredder::fragments`] starts a fresh pass over the same records.
#[derive(Debug, Clone)]
pub struct GenomeShredder<'a> {
    records: &'a [SequenceRecord],
    fragment_size: usize,
    min_fragment_size: usize,
}

impl<'a> GenomeShredder<'a> {
    /// Fails with `InvalidConfig` if `fragment_size` is zero.
    pub fn new(records: &'a [SequenceRecord], fragment_size: usize) -> Result<Self> {
        if fragment_size == 0 {
            return Err(CharcoalError::InvalidConfig(
                "fragment size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            records,
            fragment_size,
            min_fragment_size: 0,
        })
    }

    /// Skip windows shorter than `min_fragment_size`.
    pub fn with_min_fragment_size(mut self, min_fragment_size: usize) -> Self {
        self.min_fragment_size = min_fragment_size;
        self
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn fragments(&self) -> Fragments<'a> {
        Fragments {
            records: self.records,
            fragment_size: self.fragment_size,
            min_fragment_size: self.min_fragment_size,
            record_idx: 0,
            offset: 0,
            n_skipped: 0,
            skipped_bp: 0,
        }
    }
}

/// Iterator over fragments, contig order then position order.
#[derive(Debug)]
pub struct Fragments<'a> {
    records: &'a [SequenceRecord],
    fragment_size: usize,
    min_fragment_size: usize,
    record_idx: usize,
    offset: usize,
    n_skipped: usize,
    skipped_bp: usize,
}

impl<'a> Fragments<'a> {
    /// Windows dropped so far for being shorter than the minimum size.
    pub fn n_skipped(&self) -> usize {
        self.n_skipped
    }

    pub fn skipped_bp(&self) -> usize {
        self.skipped_bp
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(record) = self.records.get(self.record_idx) {
            let seq = record.seq.as_bytes();
            // a contig shorter than one window still yields one (short) fragment,
            // an empty contig yields nothing
            if self.offset >= seq.len() {
                self.record_idx += 1;
                self.offset = 0;
                continue;
            }
            let start = self.offset;
            let end = (start + self.fragment_size).min(seq.len());
            self.offset = end;

            if end - start < self.min_fragment_size {
                self.n_skipped += 1;
                self.skipped_bp += end - start;
                continue;
            }
            return Some(Fragment {
                name: &record.name,
                seq: &seq[start..end],
                start,
                end,
            });
        }
        None
    }
}
