//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a genome run. Degenerate fragments, LCA
/// disagreement and fingerprint collisions are not errors; they are counted.
#[derive(Error, Debug)]
pub enum CharcoalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sequence parse error: {0}")]
    Fastx(#[from] needletail::errors::ParseError),

    #[error("no sample sketches provided; at least one is required")]
    NoSamples,

    #[error("no fingerprints in this genome match the lineage database")]
    NoGenomeMatches,

    #[error("majority lineage {lineage} is at rank '{rank}', need species or strain; genome is inconclusive")]
    InconclusiveGenome { lineage: String, rank: String },

    #[error("{what} mismatch: expected {expected}, found {found}")]
    ParamMismatch {
        what: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("not a distance matrix: min value {min}, max value {max}")]
    InvalidDistanceMatrix { min: f64, max: f64 },

    #[error("fragment {contig} shares minimal fingerprint {hash} with an earlier fragment")]
    DuplicateFragmentHash { hash: u64, contig: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("parse error in {}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("no lineage assignment for identifier '{0}'")]
    MissingLineage(String),

    #[error("{count} removal hashes matched no fragment (e.g. {example}); check ksize, scaled and fragment size")]
    UnmatchedRemovalHashes { count: usize, example: u64 },
}

pub type Result<T> = std::result::Result<T, CharcoalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CharcoalError::InconclusiveGenome {
            lineage: "d__Bacteria;p__Firmicutes".to_string(),
            rank: "phylum".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("phylum"));
        assert!(msg.contains("inconclusive"));

        let err = CharcoalError::ParamMismatch {
            what: "ksize",
            expected: 31,
            found: 21,
        };
        assert_eq!(err.to_string(), "ksize mismatch: expected 31, found 21");

        let err = CharcoalError::Parse {
            path: PathBuf::from("lineages.csv"),
            line: 3,
            message: "bad row".to_string(),
        };
        assert_eq!(err.to_string(), "parse error in lineages.csv:3: bad row");
    }
}
