use ahash::{AHashMap, AHashSet};

use crate::config::SketchParams;
use crate::error::Result;
use crate::lcadb::LineageDatabase;
use crate::lineage::Lineage;

/// hash -> every lineage any database records for it
pub type Assignments = AHashMap<u64, AHashSet<Lineage>>;

/// Fail unless every database was built with `params`.
pub fn check_databases(params: &SketchParams, dbs: &[&dyn LineageDatabase]) -> Result<()> {
    for db in dbs {
        params.ensure_compatible(&db.params())?;
    }
    Ok(())
}

/// Look up each hash in every database. Hashes with no hit anywhere are left
/// out of the result.
pub fn gather_assignments<I>(hashes: I, dbs: &[&dyn LineageDatabase]) -> Assignments
where
    I: IntoIterator<Item = u64>,
{
    let mut assignments = Assignments::new();
    for hash in hashes {
        let mut found: AHashSet<Lineage> = AHashSet::new();
        for db in dbs {
            for lineage in db.lineages_for(hash) {
                found.insert(lineage.clone());
            }
        }
        if !found.is_empty() {
            assignments.insert(hash, found);
        }
    }
    assignments
}

/// Restrict an existing assignment table to `hashes`, without going back to
/// the databases.
pub fn select_assignments<I>(all: &Assignments, hashes: I) -> Assignments
where
    I: IntoIterator<Item = u64>,
{
    hashes
        .into_iter()
        .filter_map(|h| all.get(&h).map(|lins| (h, lins.clone())))
        .collect()
}
