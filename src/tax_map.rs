//src/tax_map.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;

use crate::config::{DuplicatePolicy, SketchParams};
use crate::error::{CharcoalError, Result};
use crate::fasta::open_reader;
use crate::lineage::Lineage;

/// Minimal fingerprint of each classified fragment -> that fragment's
/// consensus lineage, plus the settings that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeTaxMap {
    pub genome_file: String,
    pub params: SketchParams,
    pub fragment_size: usize,
    pub lca_db_name: String,
    entries: BTreeMap<u64, Lineage>,
    n_collisions: usize,
}

impl GenomeTaxMap {
    pub fn new(genome_file: &str, params: SketchParams, fragment_size: usize, lca_db_name: &str) -> Self {
        Self {
            genome_file: genome_file.to_string(),
            params,
            fragment_size,
            lca_db_name: lca_db_name.to_string(),
            entries: BTreeMap::new(),
            n_collisions: 0,
        }
    }

    /// Record a fragment. Returns `true` if `hash` was already present, which
    /// is counted and logged; `policy` decides which lineage survives.
    pub fn insert_fragment(
        &mut self,
        hash: u64,
        lineage: Lineage,
        contig: &str,
        policy: DuplicatePolicy,
    ) -> Result<bool> {
        if !self.entries.contains_key(&hash) {
            self.entries.insert(hash, lineage);
            return Ok(false);
        }

        self.n_collisions += 1;
        match policy {
            DuplicatePolicy::Overwrite => {
                log::warn!("Duplicate minimal hash {} in fragment of {}; overwriting", hash, contig);
                self.entries.insert(hash, lineage);
            }
            DuplicatePolicy::KeepFirst => {
                log::warn!("Duplicate minimal hash {} in fragment of {}; keeping first", hash, contig);
            }
            DuplicatePolicy::Reject => {
                return Err(CharcoalError::DuplicateFragmentHash {
                    hash,
                    contig: contig.to_string(),
                });
            }
        }
        Ok(true)
    }

    pub fn get(&self, hash: u64) -> Option<&Lineage> {
        self.entries.get(&hash)
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.entries.contains_key(&hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn n_collisions(&self) -> usize {
        self.n_collisions
    }

    /// Keys in ascending order.
    pub fn hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Lineage)> + '_ {
        self.entries.iter().map(|(h, l)| (*h, l))
    }

    pub fn lineages(&self) -> impl Iterator<Item = &Lineage> + '_ {
        self.entries.values()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let map: GenomeTaxMap = bincode::deserialize_from(reader)?;
        log::info!("Loaded {} hashes from {}", map.len(), map.genome_file);
        Ok(map)
    }
}

pub fn save_hashset<P: AsRef<Path>>(hashes: &BTreeSet<u64>, path: P) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, hashes)?;
    Ok(())
}

pub fn load_hashset<P: AsRef<Path>>(path: P) -> Result<BTreeSet<u64>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

/// One hash per line.
pub fn hashlist_text(hashes: &BTreeSet<u64>) -> String {
    let mut output = String::new();
    for h in hashes {
        writeln!(output, "{}", h).unwrap();
    }
    output
}

/// Read one integer per line; blank lines are ignored.
pub fn load_hashlist<P: AsRef<Path>>(path: P) -> Result<BTreeSet<u64>> {
    let path = path.as_ref();
    let reader = open_reader(path)?;
    let mut hashes = BTreeSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let hash = line.parse::<u64>().map_err(|e| CharcoalError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            message: format!("'{}' is not a hash value: {}", line, e),
        })?;
        hashes.insert(hash);
    }
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lin(s: &str) -> Lineage {
        s.parse().unwrap()
    }

    fn empty_map() -> GenomeTaxMap {
        GenomeTaxMap::new("genome.fa", SketchParams::default(), 100_000, "db.lcadb")
    }

    #[test]
    fn test_collision_overwrite() {
        let mut map = empty_map();
        assert!(!map.insert_fragment(5, lin("B;P"), "c1", DuplicatePolicy::Overwrite).unwrap());
        assert!(map.insert_fragment(5, lin("B;Q"), "c2", DuplicatePolicy::Overwrite).unwrap());
        assert_eq!(map.len(), 1);
        assert_eq!(map.n_collisions(), 1);
        assert_eq!(map.get(5), Some(&lin("B;Q")));
    }

    #[test]
    fn test_collision_keep_first() {
        let mut map = empty_map();
        map.insert_fragment(5, lin("B;P"), "c1", DuplicatePolicy::KeepFirst).unwrap();
        assert!(map.insert_fragment(5, lin("B;Q"), "c2", DuplicatePolicy::KeepFirst).unwrap());
        assert_eq!(map.n_collisions(), 1);
        assert_eq!(map.get(5), Some(&lin("B;P")));
    }

    #[test]
    fn test_collision_reject() {
        let mut map = empty_map();
        map.insert_fragment(5, lin("B;P"), "c1", DuplicatePolicy::Reject).unwrap();
        let err = map
            .insert_fragment(5, lin("B;Q"), "c2", DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, CharcoalError::DuplicateFragmentHash { hash: 5, .. }));
        assert_eq!(map.get(5), Some(&lin("B;P")));
    }

    #[test]
    fn test_save_load_preserves_everything() {
        let mut map = empty_map();
        map.insert_fragment(u64::MAX, lin("B;P;C"), "c1", DuplicatePolicy::Overwrite).unwrap();
        map.insert_fragment(1, Lineage::root(), "c2", DuplicatePolicy::Overwrite).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tax.bin");
        map.save(&path).unwrap();
        let loaded = GenomeTaxMap::load(&path).unwrap();
        assert_eq!(loaded, map);
        assert_eq!(loaded.hashes().collect::<Vec<_>>(), vec![1, u64::MAX]);
    }

    #[test]
    fn test_hashlist_roundtrip() {
        let set: BTreeSet<u64> = [3, u64::MAX, 17].into_iter().collect();
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("rm.txt");
        std::fs::write(&txt, format!("\n{}", hashlist_text(&set))).unwrap();
        assert_eq!(load_hashlist(&txt).unwrap(), set);

        let bin = dir.path().join("rm.bin");
        save_hashset(&set, &bin).unwrap();
        assert_eq!(load_hashset(&bin).unwrap(), set);

        std::fs::write(&txt, "12\nabc\n").unwrap();
        assert!(matches!(load_hashlist(&txt), Err(CharcoalError::Parse { line: 2, .. })));
    }
}
