// src/lib.rs
pub mod types;
pub mod error;
pub mod config;
pub mod lineage;
pub mod lca_tree;
pub mod sketch;
pub mod fasta;
pub mod shred;
pub mod taxdb;
pub mod lcadb;
pub mod classify;
pub mod tax_map;
pub mod metagenomes;
pub mod remove;

use std::path::{Path, PathBuf};

use crate::classify::{shred_to_tax, ShredResults};
use crate::config::ShredConfig;
use crate::error::{CharcoalError, Result};
use crate::fasta::read_sequence_records;
use crate::lcadb::{LcaDatabase, LineageDatabase};
use crate::metagenomes::{PresenceMatrix, SampleSketch};
use crate::tax_map::GenomeTaxMap;

/// Load one or more saved lineage databases.
pub fn load_databases(db_paths: &[PathBuf]) -> Result<Vec<LcaDatabase>> {
    if db_paths.is_empty() {
        return Err(CharcoalError::InvalidConfig(
            "at least one lineage database is required".to_string(),
        ));
    }
    db_paths.iter().map(LcaDatabase::load).collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a genome, fragment it, and classify every fragment against the
/// given databases.
pub fn classify_genome(
    genome_path: &Path,
    db_paths: &[PathBuf],
    config: &ShredConfig,
) -> Result<ShredResults> {
    // 1. Load databases
    let dbs = load_databases(db_paths)?;
    let db_refs: Vec<&dyn LineageDatabase> = dbs.iter().map(|db| db as &dyn LineageDatabase).collect();
    let lca_db_name = db_paths
        .iter()
        .map(|p| file_name(p))
        .collect::<Vec<_>>()
        .join(";");

    // 2. Read the genome once; both passes reuse the records
    let records = read_sequence_records(genome_path)?;
    log::info!(
        "Read {} contigs ({} bp) from {}",
        records.len(),
        records.iter().map(|r| r.len()).sum::<usize>(),
        genome_path.display()
    );

    // 3. Shred and classify
    shred_to_tax(&file_name(genome_path), &records, &db_refs, &lca_db_name, config)
}

/// Sketch each sample read file with the tax map's parameters and build the
/// presence matrix of the tax map's hashes across them.
pub fn match_metagenomes(tax_map: &GenomeTaxMap, sample_paths: &[PathBuf]) -> Result<PresenceMatrix> {
    let samples = sample_paths
        .iter()
        .map(|p| SampleSketch::from_file(p, tax_map.params))
        .collect::<Result<Vec<_>>>()?;
    PresenceMatrix::build(tax_map, &samples)
}
