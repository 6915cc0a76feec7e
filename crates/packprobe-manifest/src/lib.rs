//! Packaging manifest parsing and order-sensitive comparison
//!
//! A manifest is an ordered list of relative file paths a packaging step is
//! expected to have produced. Actual manifests arrive as a single
//! space-delimited string; comparison is exact on elements, order, and
//! count, with a structural diff on divergence.

use std::fmt;

/// Ordered list of relative file paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    #[must_use]
    pub const fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// Split a space-delimited manifest string on single spaces.
    ///
    /// No other normalization is performed: separators, casing, and
    /// surrounding whitespace are significant.
    #[must_use]
    pub fn from_delimited(raw: &str) -> Self {
        Self {
            entries: raw.split(' ').map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare an actual manifest against this expected one.
    ///
    /// # Errors
    ///
    /// Returns a `ManifestDiff` pinpointing the first divergent index plus
    /// the entries missing from and extra in the actual manifest.
    pub fn verify(&self, actual: &Self) -> Result<(), ManifestDiff> {
        if self.entries == actual.entries {
            return Ok(());
        }

        let index = self
            .entries
            .iter()
            .zip(&actual.entries)
            .position(|(expected, actual)| expected != actual)
            .unwrap_or_else(|| self.entries.len().min(actual.entries.len()));

        let missing = self
            .entries
            .iter()
            .filter(|entry| !actual.entries.contains(entry))
            .cloned()
            .collect();
        let extra = actual
            .entries
            .iter()
            .filter(|entry| !self.entries.contains(entry))
            .cloned()
            .collect();

        Err(ManifestDiff {
            index,
            expected: self.entries.get(index).cloned(),
            actual: actual.entries.get(index).cloned(),
            missing,
            extra,
        })
    }
}

impl FromIterator<String> for Manifest {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Structural description of how an actual manifest diverged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDiff {
    /// First index where the two manifests disagree.
    pub index: usize,
    /// Expected entry at that index, `None` when the expected list ended.
    pub expected: Option<String>,
    /// Actual entry at that index, `None` when the actual list ended.
    pub actual: Option<String>,
    /// Expected entries absent from the actual manifest, in expected order.
    pub missing: Vec<String>,
    /// Actual entries absent from the expected manifest, in actual order.
    pub extra: Vec<String>,
}

impl fmt::Display for ManifestDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "first divergence at entry {}", self.index)?;
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => {
                write!(f, ": expected {expected:?}, found {actual:?}")?;
            }
            (Some(expected), None) => write!(f, ": expected {expected:?}, list ended")?,
            (None, Some(actual)) => write!(f, ": unexpected trailing entry {actual:?}")?,
            (None, None) => {}
        }
        if !self.missing.is_empty() {
            write!(f, "; missing: {:?}", self.missing)?;
        }
        if !self.extra.is_empty() {
            write!(f, "; extra: {:?}", self.extra)?;
        }
        Ok(())
    }
}

impl std::error::Error for ManifestDiff {}
