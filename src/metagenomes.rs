//src/metagenomes.rs

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::config::SketchParams;
use crate::error::{CharcoalError, Result};
use crate::fasta::read_sequence_records;
use crate::sketch::FracMinHash;
use crate::tax_map::GenomeTaxMap;
use crate::types::SequenceRecord;

/// Abundance sketch of one environmental sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSketch {
    pub name: String,
    pub params: SketchParams,
    pub abundances: BTreeMap<u64, u64>,
}

impl SampleSketch {
    pub fn from_records(name: &str, records: &[SequenceRecord], params: SketchParams) -> Self {
        let mut mh = FracMinHash::new(params, true);
        for record in records {
            mh.add_sequence(record.seq.as_bytes());
        }
        Self {
            name: name.to_string(),
            params,
            abundances: mh.into_abundances(),
        }
    }

    /// Sketch a FASTA/FASTQ file of reads, named after the file.
    pub fn from_file<P: AsRef<Path>>(path: P, params: SketchParams) -> Result<Self> {
        let path = path.as_ref();
        let records = read_sequence_records(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_records(&name, &records, params))
    }

    pub fn abundance(&self, hash: u64) -> u64 {
        self.abundances.get(&hash).copied().unwrap_or(0)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

/// Headline numbers about how a genome's hashes show up across samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSummary {
    pub n_samples: usize,
    pub n_hashes: usize,
    /// Hashes seen in no sample.
    pub n_empty_hashes: usize,
    /// Samples containing none of the hashes.
    pub n_samples_without_overlap: usize,
}

/// Dense samples x hashes table, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMatrix {
    pub genome_file: String,
    pub fragment_size: usize,
    pub params: SketchParams,
    pub sample_names: Vec<String>,
    /// Column labels.
    pub hashes: Vec<u64>,
    values: Vec<f64>,
    normalized: bool,
}

impl PresenceMatrix {
    /// Columns are the tax map's hashes in ascending order.
    pub fn build(tax_map: &GenomeTaxMap, samples: &[SampleSketch]) -> Result<Self> {
        let hashes: Vec<u64> = tax_map.hashes().collect();
        Self::from_hashes(
            &tax_map.genome_file,
            tax_map.fragment_size,
            tax_map.params,
            hashes,
            samples,
        )
    }

    pub fn from_hashes(
        genome_file: &str,
        fragment_size: usize,
        params: SketchParams,
        hashes: Vec<u64>,
        samples: &[SampleSketch],
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(CharcoalError::NoSamples);
        }
        for sample in samples {
            if sample.params.ksize != params.ksize {
                return Err(CharcoalError::ParamMismatch {
                    what: "ksize",
                    expected: params.ksize as u64,
                    found: sample.params.ksize as u64,
                });
            }
            if sample.params.scaled != params.scaled {
                log::warn!(
                    "sample {} scaled {} != query scaled {}",
                    sample.name,
                    sample.params.scaled,
                    params.scaled
                );
            }
        }

        let rows: Vec<Vec<f64>> = samples
            .par_iter()
            .map(|sample| {
                let row: Vec<f64> = hashes.iter().map(|&h| sample.abundance(h) as f64).collect();
                let present = row.iter().filter(|v| **v > 0.0).count();
                log::debug!("... {}: {} of {} hashes present", sample.name, present, hashes.len());
                row
            })
            .collect();

        log::info!("built {} x {} presence matrix", samples.len(), hashes.len());
        Ok(Self {
            genome_file: genome_file.to_string(),
            fragment_size,
            params,
            sample_names: samples.iter().map(|s| s.name.clone()).collect(),
            hashes,
            values: rows.into_iter().flatten().collect(),
            normalized: false,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.sample_names.len()
    }

    pub fn n_hashes(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn get(&self, sample: usize, hash: usize) -> f64 {
        self.values[sample * self.n_hashes() + hash]
    }

    pub fn column(&self, hash: usize) -> Vec<f64> {
        let n = self.n_hashes();
        (0..self.n_samples()).map(|i| self.values[i * n + hash]).collect()
    }

    fn column_is_empty(&self, hash: usize) -> bool {
        let n = self.n_hashes();
        (0..self.n_samples()).all(|i| self.values[i * n + hash] == 0.0)
    }

    pub fn summary(&self) -> PresenceSummary {
        let n = self.n_hashes();
        let n_empty_hashes = (0..n).filter(|&j| self.column_is_empty(j)).count();
        let n_samples_without_overlap = (0..self.n_samples())
            .filter(|&i| self.values[i * n..(i + 1) * n].iter().all(|v| *v == 0.0))
            .count();
        PresenceSummary {
            n_samples: self.n_samples(),
            n_hashes: n,
            n_empty_hashes,
            n_samples_without_overlap,
        }
    }

    /// Scale each hash column to unit Euclidean norm. All-zero columns are
    /// returned by hash and, with `drop_empty`, removed.
    pub fn normalize(&mut self, drop_empty: bool) -> Vec<u64> {
        let n = self.n_hashes();
        let m = self.n_samples();
        let mut empty = Vec::new();
        for j in 0..n {
            let norm = (0..m).map(|i| self.values[i * n + j].powi(2)).sum::<f64>().sqrt();
            if norm > 0.0 {
                for i in 0..m {
                    self.values[i * n + j] /= norm;
                }
            } else {
                empty.push(j);
            }
        }
        self.normalized = true;

        let empty_hashes: Vec<u64> = empty.iter().map(|&j| self.hashes[j]).collect();
        if !empty.is_empty() {
            log::warn!("{} of {} presence vectors are all zero", empty.len(), n);
        }
        if drop_empty && !empty.is_empty() {
            log::info!("removing {} null presence vectors", empty.len());
            let keep: Vec<usize> = (0..n).filter(|j| empty.binary_search(j).is_err()).collect();
            let mut values = Vec::with_capacity(m * keep.len());
            for i in 0..m {
                for &j in &keep {
                    values.push(self.values[i * n + j]);
                }
            }
            self.values = values;
            self.hashes = keep.iter().map(|&j| self.hashes[j]).collect();
        }
        empty_hashes
    }

    /// Pairwise angular similarity between hash columns,
    /// `1 - 2 * acos(cos_sim) / pi`. Normalizes first if needed (keeping
    /// empty columns, which get similarity 0 to everything).
    pub fn angular_similarity(&self) -> DistanceMatrix {
        let owned;
        let mat = if self.normalized {
            self
        } else {
            let mut copy = self.clone();
            copy.normalize(false);
            owned = copy;
            &owned
        };

        let n = mat.n_hashes();
        let columns: Vec<Vec<f64>> = (0..n).map(|j| mat.column(j)).collect();
        let nonzero: Vec<bool> = columns.iter().map(|c| c.iter().any(|v| *v != 0.0)).collect();

        // symmetric, so only the upper triangle is computed
        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| {
                        let dot: f64 = columns[i].iter().zip(&columns[j]).map(|(a, b)| a * b).sum();
                        angular_similarity(dot)
                    })
                    .collect()
            })
            .collect();

        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = if nonzero[i] { 1.0 } else { angular_similarity(0.0) };
            for (offset, &v) in upper[i].iter().enumerate() {
                let j = i + 1 + offset;
                values[i * n + j] = v;
                values[j * n + i] = v;
            }
        }
        DistanceMatrix {
            labels: mat.hashes.clone(),
            values,
        }
    }

    /// Generate the raw matrix CSV on demand, one sample per line
    pub fn get_matrix_csv(&self) -> String {
        let mut output = String::new();
        let n = self.n_hashes();
        for i in 0..self.n_samples() {
            let row: Vec<String> = self.values[i * n..(i + 1) * n].iter().map(|v| format!("{}", v)).collect();
            writeln!(output, "{}", row.join(",")).unwrap();
        }
        output
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

/// Cosine similarity clamped to at most 1, mapped onto [0, 1] by angle.
pub fn angular_similarity(cos_sim: f64) -> f64 {
    let cos_sim = cos_sim.clamp(-1.0, 1.0);
    1.0 - 2.0 * cos_sim.acos() / PI
}

/// Square, symmetric similarity matrix between hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    pub labels: Vec<u64>,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn from_values(labels: Vec<u64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(labels.len() * labels.len(), values.len());
        Self { labels, values }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `(min, max)` over all cells; `(0, 0)` when empty.
    pub fn min_max(&self) -> (f64, f64) {
        if self.values.is_empty() {
            return (0.0, 0.0);
        }
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Check every value lies in [0, 1]. Out-of-range matrices are rejected,
    /// or with `force` shifted by the minimum and divided by the new maximum.
    /// Returns whether a rescale happened.
    pub fn validate(&mut self, force: bool) -> Result<bool> {
        let (min, max) = self.min_max();
        if min >= 0.0 && max <= 1.0 {
            return Ok(false);
        }
        log::warn!(
            "This matrix doesn't look like a distance matrix - min value {}, max value {}",
            min,
            max
        );
        if !force {
            return Err(CharcoalError::InvalidDistanceMatrix { min, max });
        }
        log::warn!("force is set; scaling to [0, 1]");
        for v in self.values.iter_mut() {
            *v -= min;
        }
        let new_max = max - min;
        if new_max > 0.0 {
            for v in self.values.iter_mut() {
                *v /= new_max;
            }
        }
        Ok(true)
    }

    /// Generate the matrix as CSV on demand, hash labels in the header
    pub fn get_csv(&self) -> String {
        let mut output = String::new();
        let header: Vec<String> = self.labels.iter().map(|h| h.to_string()).collect();
        writeln!(output, "{}", header.join(",")).unwrap();
        let n = self.len();
        for i in 0..n {
            let row: Vec<String> = self.values[i * n..(i + 1) * n].iter().map(|v| format!("{}", v)).collect();
            writeln!(output, "{}", row.join(",")).unwrap();
        }
        output
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, entries: &[(u64, u64)]) -> SampleSketch {
        SampleSketch {
            name: name.to_string(),
            params: SketchParams::default(),
            abundances: entries.iter().copied().collect(),
        }
    }

    fn matrix(hashes: Vec<u64>, samples: &[SampleSketch]) -> PresenceMatrix {
        PresenceMatrix::from_hashes("g.fa", 1000, SketchParams::default(), hashes, samples).unwrap()
    }

    #[test]
    fn test_no_samples_is_an_error() {
        let err = PresenceMatrix::from_hashes("g.fa", 1000, SketchParams::default(), vec![1], &[]).unwrap_err();
        assert!(matches!(err, CharcoalError::NoSamples));
    }

    #[test]
    fn test_ksize_mismatch_rejected() {
        let mut s = sample("s", &[]);
        s.params.ksize = 21;
        let err = PresenceMatrix::from_hashes("g.fa", 1000, SketchParams::default(), vec![1], &[s]).unwrap_err();
        assert!(matches!(err, CharcoalError::ParamMismatch { what: "ksize", .. }));
    }

    #[test]
    fn test_build_and_summary() {
        let samples = [
            sample("s1", &[(10, 2), (20, 1)]),
            sample("s2", &[(10, 1), (99, 4)]),
            sample("s3", &[(99, 1)]),
        ];
        let m = matrix(vec![10, 20, 30], &samples);
        assert_eq!(m.get(0, 0), 2.0);
        assert_eq!(m.get(1, 1), 0.0);
        assert_eq!(m.column(0), vec![2.0, 1.0, 0.0]);
        let s = m.summary();
        assert_eq!(s.n_empty_hashes, 1);
        assert_eq!(s.n_samples_without_overlap, 1);
        assert_eq!(m.get_matrix_csv(), "2,1,0\n1,0,0\n0,0,0\n");
    }

    #[test]
    fn test_equal_presence_and_empty_column() {
        let samples = [
            sample("s1", &[(1, 5)]),
            sample("s2", &[(1, 5)]),
            sample("s3", &[(1, 5)]),
        ];
        let mut m = matrix(vec![1, 2], &samples);
        let empty = m.normalize(true);
        assert_eq!(empty, vec![2]);
        assert_eq!(m.hashes, vec![1]);

        let mut d = m.angular_similarity();
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(0, 0), 1.0);
        assert_eq!(d.validate(false).unwrap(), false);
    }

    #[test]
    fn test_similarity_range_and_symmetry() {
        let samples = [
            sample("s1", &[(1, 3), (2, 1)]),
            sample("s2", &[(1, 1), (3, 7)]),
            sample("s3", &[(2, 2), (3, 1)]),
            sample("s4", &[(1, 4), (2, 4), (3, 4)]),
        ];
        let mut m = matrix(vec![1, 2, 3], &samples);
        m.normalize(false);
        for j in 0..3 {
            let norm: f64 = m.column(j).iter().map(|v| v * v).sum();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        let mut d = m.angular_similarity();
        for i in 0..3 {
            assert_eq!(d.get(i, i), 1.0);
            for j in 0..3 {
                let v = d.get(i, j);
                assert!((0.0..=1.0).contains(&v));
                assert_eq!(v, d.get(j, i));
            }
        }
        assert!(!d.validate(false).unwrap());
    }

    #[test]
    fn test_disjoint_columns_are_zero() {
        let samples = [sample("s1", &[(1, 1)]), sample("s2", &[(2, 1)])];
        let d = matrix(vec![1, 2], &samples).angular_similarity();
        assert!(d.get(0, 1).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_or_rescales() {
        let mut d = DistanceMatrix::from_values(vec![1, 2], vec![2.0, 0.5, 0.5, -1.0]);
        let err = d.clone().validate(false).unwrap_err();
        assert!(matches!(err, CharcoalError::InvalidDistanceMatrix { .. }));

        assert!(d.validate(true).unwrap());
        assert_eq!(d.min_max(), (0.0, 1.0));
        assert!((d.get(0, 1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_angular_similarity_endpoints() {
        assert_eq!(angular_similarity(1.0), 1.0);
        assert_eq!(angular_similarity(1.0 + 1e-9), 1.0);
        assert!(angular_similarity(0.0).abs() < 1e-15);
    }

    #[test]
    fn test_save_load_full_precision() {
        let samples = [sample("s1", &[(u64::MAX, 3)]), sample("s2", &[(u64::MAX, 7)])];
        let mut m = matrix(vec![u64::MAX], &samples);
        m.normalize(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.bin");
        m.save(&path).unwrap();
        assert_eq!(PresenceMatrix::load(&path).unwrap(), m);

        let d = m.angular_similarity();
        let dpath = dir.path().join("d.bin");
        d.save(&dpath).unwrap();
        assert_eq!(DistanceMatrix::load(&dpath).unwrap(), d);
    }
}
