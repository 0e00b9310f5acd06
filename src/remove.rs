//src/remove.rs

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use crate::config::{RemoveConfig, UnhashedPolicy};
use crate::error::{CharcoalError, Result};
use crate::fasta::{create_writer, write_fasta_record};
use crate::shred::GenomeShredder;
use crate::sketch::FracMinHash;
use crate::types::SequenceRecord;

/// A fragment cut out of a contig, owned so it can outlive the input records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFragment {
    pub contig: String,
    pub start: usize,
    pub end: usize,
    pub seq: String,
}

impl OwnedFragment {
    /// `contig:start-end`
    pub fn header(&self) -> String {
        format!("{}:{}-{}", self.contig, self.start, self.end)
    }
}

#[derive(Debug, Default, Clone)]
pub struct SplitFragments {
    pub clean: Vec<OwnedFragment>,
    /// Fragments sharing at least one hash with the removal set, plus
    /// unhashed fragments under [`UnhashedPolicy::Remove`].
    pub dirty: Vec<OwnedFragment>,
    /// Fragments that carried no hash, wherever they were put.
    pub n_unhashed: usize,
    /// Removal hashes that no fragment carried.
    pub unmatched: BTreeSet<u64>,
}

impl SplitFragments {
    pub fn clean_bp(&self) -> usize {
        self.clean.iter().map(|f| f.seq.len()).sum()
    }

    pub fn dirty_bp(&self) -> usize {
        self.dirty.iter().map(|f| f.seq.len()).sum()
    }
}

/// Re-fragment a genome with the same settings used to build the removal set
/// and sort every fragment by whether it carries a flagged hash.
///
/// Every removal hash should turn up in some fragment. Leftovers mean the
/// settings differ from the classifying run; they are logged, or an
/// `UnmatchedRemovalHashes` error under `config.strict`.
pub fn split_by_hashes(
    records: &[SequenceRecord],
    remove: &BTreeSet<u64>,
    config: &RemoveConfig,
) -> Result<SplitFragments> {
    config.validate()?;
    let factory = FracMinHash::new(config.sketch, false);
    let shredder = GenomeShredder::new(records, config.fragment_size)?;
    let mut split = SplitFragments {
        unmatched: remove.clone(),
        ..SplitFragments::default()
    };

    for fragment in shredder.fragments() {
        let mut mh = factory.copy_and_clear();
        mh.add_sequence(fragment.seq);
        let owned = OwnedFragment {
            contig: fragment.name.to_string(),
            start: fragment.start,
            end: fragment.end,
            seq: String::from_utf8_lossy(fragment.seq).into_owned(),
        };

        if mh.is_empty() {
            split.n_unhashed += 1;
            match config.unhashed {
                UnhashedPolicy::Remove => split.dirty.push(owned),
                UnhashedPolicy::Keep => split.clean.push(owned),
            }
            continue;
        }

        let mut hit = false;
        for h in mh.hashes() {
            if remove.contains(&h) {
                split.unmatched.remove(&h);
                hit = true;
            }
        }
        if hit {
            split.dirty.push(owned);
        } else {
            split.clean.push(owned);
        }
    }

    log::info!(
        "kept {} fragments ({} bp), removed {} ({} bp), {} without hashes",
        split.clean.len(),
        split.clean_bp(),
        split.dirty.len(),
        split.dirty_bp(),
        split.n_unhashed
    );

    if let Some(&example) = split.unmatched.iter().next() {
        if config.strict {
            return Err(CharcoalError::UnmatchedRemovalHashes {
                count: split.unmatched.len(),
                example,
            });
        }
        log::warn!(
            "{} of {} removal hashes matched no fragment; were ksize, scaled and fragment size the same?",
            split.unmatched.len(),
            remove.len()
        );
    }
    Ok(split)
}

pub fn write_fragments<W: Write>(out: &mut W, fragments: &[OwnedFragment]) -> Result<()> {
    for fragment in fragments {
        write_fasta_record(out, &fragment.header(), &fragment.seq)?;
    }
    Ok(())
}

/// Write fragments to `path`, gzip-compressed if it ends in `.gz`.
pub fn write_fragments_to<P: AsRef<Path>>(path: P, fragments: &[OwnedFragment]) -> Result<()> {
    let mut out = create_writer(path.as_ref())?;
    write_fragments(&mut out, fragments)?;
    out.flush()?;
    Ok(())
}
