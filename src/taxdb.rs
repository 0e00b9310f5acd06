//src/taxdb.rs

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::{CharcoalError, Result};
use crate::fasta::open_reader;
use crate::lineage::{Lineage, LineagePair};

/// identifier -> lineage
pub type TaxAssignments = HashMap<String, Lineage>;

/// Parses a lineage spreadsheet in the format:
/// ```text
/// ident,superkingdom,phylum,class,order,family,genus,species
/// GCF_000005845,Bacteria,Proteobacteria,...
/// ```
/// Rank names come from the header. Trailing empty cells shorten the lineage;
/// rows with no identifier are skipped.
pub fn parse_lineages_csv<P: AsRef<Path>>(filepath: P) -> Result<TaxAssignments> {
    let path = filepath.as_ref();
    let reader = open_reader(path)?;
    log::debug!("reading lineages from {}", path.display());
    parse_lineages(reader, path)
}

pub(crate) fn parse_lineages<R: Read>(reader: R, path: &Path) -> Result<TaxAssignments> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let header = csv_reader.headers()?.clone();
    let ranks: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
    if ranks.is_empty() || ranks.iter().any(|r| r.is_empty()) {
        return Err(CharcoalError::Parse {
            path: path.to_path_buf(),
            line: 1,
            message: format!(
                "header needs an identifier column and named rank columns, got '{}'",
                header.iter().collect::<Vec<_>>().join(",")
            ),
        });
    }

    let mut assignments = HashMap::new();
    for result in csv_reader.records() {
        let record = result?;
        let ident = record.get(0).unwrap_or("");
        if ident.is_empty() {
            continue;
        }
        if record.len() - 1 > ranks.len() {
            return Err(CharcoalError::Parse {
                path: path.to_path_buf(),
                line: record.position().map_or(0, |p| p.line() as usize),
                message: format!("{} lineage columns, header names {}", record.len() - 1, ranks.len()),
            });
        }

        let mut pairs: Vec<LineagePair> = ranks
            .iter()
            .zip(record.iter().skip(1))
            .map(|(rank, name)| LineagePair::new(rank, name))
            .collect();
        while pairs.last().map_or(false, |p| p.name.is_empty()) {
            pairs.pop();
        }
        assignments.insert(ident.to_string(), Lineage::new(pairs));
    }
    Ok(assignments)
}

/// Identifier for a genome file: the file name up to its first `.`.
pub fn ident_from_path<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split('.').next().unwrap_or("").to_string()
}
