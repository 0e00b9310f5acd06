//src/lcadb.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::config::SketchParams;
use crate::error::{CharcoalError, Result};
use crate::fasta::read_sequence_records;
use crate::lineage::Lineage;
use crate::sketch::FracMinHash;
use crate::taxdb::{ident_from_path, TaxAssignments};

/// Anything that can answer "which lineages carry fingerprint X".
pub trait LineageDatabase {
    /// The k-mer length and scale the database was built with.
    fn params(&self) -> SketchParams;

    /// Every lineage recorded for `hash`; empty if the hash is unknown.
    fn lineages_for(&self, hash: u64) -> Vec<&Lineage>;
}

/// An in-memory fingerprint -> lineage index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcaDatabase {
    params: SketchParams,
    /// Distinct lineages; hashes refer to them by position.
    lineages: Vec<Lineage>,
    /// ident -> lineage position
    idents: BTreeMap<String, u32>,
    /// hash -> sorted, deduplicated lineage positions
    hash_to_lineages: BTreeMap<u64, Vec<u32>>,
}

impl LcaDatabase {
    pub fn new(params: SketchParams) -> Self {
        Self {
            params,
            lineages: Vec::new(),
            idents: BTreeMap::new(),
            hash_to_lineages: BTreeMap::new(),
        }
    }

    fn lineage_position(&mut self, lineage: &Lineage) -> u32 {
        match self.lineages.iter().position(|l| l == lineage) {
            Some(pos) => pos as u32,
            None => {
                self.lineages.push(lineage.clone());
                (self.lineages.len() - 1) as u32
            }
        }
    }

    /// Record every hash of `sketch` as belonging to `lineage`.
    pub fn insert(&mut self, ident: &str, lineage: &Lineage, sketch: &FracMinHash) -> Result<()> {
        self.params.ensure_compatible(&sketch.params())?;
        let pos = self.lineage_position(lineage);
        self.idents.insert(ident.to_string(), pos);
        for hash in sketch.hashes() {
            let entry = self.hash_to_lineages.entry(hash).or_default();
            if let Err(at) = entry.binary_search(&pos) {
                entry.insert(at, pos);
            }
        }
        Ok(())
    }

    /// Sketch each genome file and insert it under the lineage of its identifier.
    pub fn index_genomes<P: AsRef<Path>>(
        &mut self,
        genome_paths: &[P],
        assignments: &TaxAssignments,
    ) -> Result<()> {
        let factory = FracMinHash::new(self.params, false);
        for path in genome_paths {
            let ident = ident_from_path(path);
            let lineage = assignments
                .get(&ident)
                .ok_or_else(|| CharcoalError::MissingLineage(ident.clone()))?;

            let mut mh = factory.copy_and_clear();
            for record in read_sequence_records(path)? {
                mh.add_sequence(record.seq.as_bytes());
            }
            log::debug!("{}: {} hashes => {}", ident, mh.len(), lineage);
            self.insert(&ident, lineage, &mh)?;
        }
        log::info!(
            "Indexed {} genomes: {} hashes across {} lineages",
            genome_paths.len(),
            self.hash_to_lineages.len(),
            self.lineages.len()
        );
        Ok(())
    }

    pub fn n_hashes(&self) -> usize {
        self.hash_to_lineages.len()
    }

    pub fn n_lineages(&self) -> usize {
        self.lineages.len()
    }

    pub fn lineage_for_ident(&self, ident: &str) -> Option<&Lineage> {
        self.idents
            .get(ident)
            .and_then(|&pos| self.lineages.get(pos as usize))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let db: LcaDatabase = bincode::deserialize_from(reader)?;
        db.params.validate()?;
        log::info!(
            "Loaded lineage database with {} hashes, {} lineages, k={}, scaled={}",
            db.n_hashes(),
            db.n_lineages(),
            db.params.ksize,
            db.params.scaled
        );
        Ok(db)
    }
}

impl LineageDatabase for LcaDatabase {
    fn params(&self) -> SketchParams {
        self.params
    }

    fn lineages_for(&self, hash: u64) -> Vec<&Lineage> {
        match self.hash_to_lineages.get(&hash) {
            Some(positions) => positions
                .iter()
                .filter_map(|&pos| self.lineages.get(pos as usize))
                .collect(),
            None => Vec::new(),
        }
    }
}
