//src/config.rs

use serde::{Deserialize, Serialize};

use crate::error::{CharcoalError, Result};

pub const DEFAULT_FRAGMENT_SIZE: usize = 100_000;
pub const DEFAULT_KSIZE: u8 = 31;
pub const DEFAULT_SCALED: u64 = 1000;

/// K-mer length and sparsity factor shared by a sketch and every database it is
/// compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SketchParams {
    pub ksize: u8,
    pub scaled: u64,
}

impl Default for SketchParams {
    fn default() -> Self {
        Self {
            ksize: DEFAULT_KSIZE,
            scaled: DEFAULT_SCALED,
        }
    }
}

impl SketchParams {
    pub fn new(ksize: u8, scaled: u64) -> Result<Self> {
        let params = Self { ksize, scaled };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ksize == 0 || self.ksize > 32 {
            return Err(CharcoalError::InvalidConfig(format!(
                "ksize must be in 1..=32, got {}",
                self.ksize
            )));
        }
        if self.scaled == 0 {
            return Err(CharcoalError::InvalidConfig(
                "scaled must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Fail with `ParamMismatch` unless `other` was built with the same k and scale.
    pub fn ensure_compatible(&self, other: &SketchParams) -> Result<()> {
        if self.ksize != other.ksize {
            return Err(CharcoalError::ParamMismatch {
                what: "ksize",
                expected: self.ksize as u64,
                found: other.ksize as u64,
            });
        }
        if self.scaled != other.scaled {
            return Err(CharcoalError::ParamMismatch {
                what: "scaled",
                expected: self.scaled,
                found: other.scaled,
            });
        }
        Ok(())
    }
}

/// How fragments whose consensus is "no match" are called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoMatchPolicy {
    /// Apply the rank/genus rule to the empty lineage, which always fails.
    #[default]
    Dirty,
    Clean,
    Unclassified,
}

/// What to do when two fragments share the same minimal fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Warn and replace the earlier entry.
    #[default]
    Overwrite,
    /// Warn and keep the earlier entry.
    KeepFirst,
    /// Abort the genome run.
    Reject,
}

/// Where `remove` puts fragments that carry no fingerprint at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnhashedPolicy {
    /// Nothing vouches for them, so they go with the removed fragments.
    #[default]
    Remove,
    Keep,
}

/// Everything one genome run needs, passed explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShredConfig {
    pub fragment_size: usize,
    /// Windows shorter than this are skipped and counted as missed.
    pub min_fragment_size: usize,
    pub sketch: SketchParams,
    /// Minimum number of fingerprints an LCA needs before it is taken seriously.
    pub min_count: u32,
    pub nomatch_policy: NoMatchPolicy,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ShredConfig {
    fn default() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            min_fragment_size: 0,
            sketch: SketchParams::default(),
            min_count: 1,
            nomatch_policy: NoMatchPolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl ShredConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fragment_size == 0 {
            return Err(CharcoalError::InvalidConfig(
                "fragment size must be greater than zero".to_string(),
            ));
        }
        if self.min_count == 0 {
            return Err(CharcoalError::InvalidConfig(
                "minimum LCA count must be at least 1".to_string(),
            ));
        }
        self.sketch.validate()
    }
}

/// Settings for splitting a genome by a removal hash set. These must match
/// the run that produced the hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveConfig {
    pub fragment_size: usize,
    pub sketch: SketchParams,
    pub unhashed: UnhashedPolicy,
    /// Fail instead of warning when some removal hashes match no fragment.
    pub strict: bool,
}

impl Default for RemoveConfig {
    fn default() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            sketch: SketchParams::default(),
            unhashed: UnhashedPolicy::default(),
            strict: false,
        }
    }
}

impl RemoveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fragment_size == 0 {
            return Err(CharcoalError::InvalidConfig(
                "fragment size must be greater than zero".to_string(),
            ));
        }
        self.sketch.validate()
    }
}
