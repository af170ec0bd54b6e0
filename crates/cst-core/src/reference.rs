//! Secondary references converting absolute shielding to chemical shift.
//!
//! For an element with calculated reference shielding $\sigma_{ref}$ and
//! observed shift $\delta_{ref}$ every principal value becomes
//! $\delta = \sigma_{ref} - \sigma + \delta_{ref}$.
//!
//! Reference files are plain text, one nucleus per line. Lines starting with
//! `#` are comments; every other line, blank ones included, must be a record:
//! ```text
//! # element  sigma    delta
//! C          186.0    0.0
//! H           31.7    0.0
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::BufRead;
use std::path::Path;

use log::{debug, warn};
use thiserror::Error;

use crate::collection::TensorList;
use crate::tensor::{normalize_element, Tensor};

/// Errors while loading a reference table.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to read reference file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record at line {line}: \"{record}\"")]
    Format { line: usize, record: String },
}

/// Table of `(sigma, delta)` pairs keyed by element symbol.
#[derive(Debug, Clone, Default)]
pub struct SigmaReference {
    refs: BTreeMap<String, (f64, f64)>,
}

impl SigmaReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a reference pair, replacing any previous one for the element.
    pub fn insert(&mut self, element: &str, sigma: f64, delta: f64) {
        self.refs.insert(Self::key(element), (sigma, delta));
    }

    pub fn get(&self, element: &str) -> Option<(f64, f64)> {
        self.refs.get(&Self::key(element)).copied()
    }

    pub fn contains(&self, element: &str) -> bool {
        self.refs.contains_key(&Self::key(element))
    }

    fn key(element: &str) -> String {
        normalize_element(element).unwrap_or_else(|| element.to_string())
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Entries in alphabetical order of the element symbol.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.refs.iter().map(|(e, &(s, d))| (e.as_str(), s, d))
    }

    /// Convert the principal values of one tensor to shifts.
    ///
    /// Tensors of elements without a reference are left untouched; the
    /// return value tells whether the tensor was converted.
    pub fn transform_tensor(&self, tensor: &mut Tensor) -> bool {
        match self.refs.get(tensor.element()) {
            Some(&(sigma, delta)) => {
                let values = tensor.eigenvalues_mut();
                *values = values.map(|v| sigma - v + delta);
                true
            }
            None => {
                debug!(
                    "No reference for atom {} ({}), value kept as shielding",
                    tensor.index(),
                    tensor.element()
                );
                false
            }
        }
    }

    /// Reference every tensor of a list. A list is converted at most once.
    pub fn transform_list(&self, list: &mut TensorList) {
        if list.is_referenced() {
            debug!("Tensors from \"{}\" already referenced", list.filename());
            return;
        }

        let mut skipped = BTreeSet::new();
        for tensor in list.iter_mut() {
            if !self.transform_tensor(tensor) {
                skipped.insert(tensor.element().to_string());
            }
        }
        list.mark_referenced();

        if !skipped.is_empty() {
            let names: Vec<_> = skipped.into_iter().collect();
            warn!(
                "No secondary reference for {} in \"{}\"; these nuclei were NOT referenced",
                names.join(", "),
                list.filename()
            );
        }
    }

    /// Parse a reference table from text.
    pub fn parse_str(content: &str) -> Result<Self, ReferenceError> {
        let mut table = Self::new();
        for (idx, line) in content.lines().enumerate() {
            table.read_line(idx + 1, line)?;
        }
        Ok(table)
    }

    /// Parse a reference table from a buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ReferenceError> {
        let mut table = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            table.read_line(idx + 1, &line?)?;
        }
        Ok(table)
    }

    /// Load a reference table from a file.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    fn read_line(&mut self, line_no: usize, line: &str) -> Result<(), ReferenceError> {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            return Ok(());
        }

        let invalid = || ReferenceError::Format {
            line: line_no,
            record: line.to_string(),
        };

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(invalid());
        }
        let element = normalize_element(fields[0]).ok_or_else(invalid)?;
        let sigma: f64 = fields[1].parse().map_err(|_| invalid())?;
        let delta: f64 = fields[2].parse().map_err(|_| invalid())?;

        self.insert(&element, sigma, delta);
        Ok(())
    }
}

impl fmt::Display for SigmaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secondary chemical shift references:")?;
        for (element, sigma, delta) in self.iter() {
            write!(f, "\nNucleus: {} sigma: {:10.3} delta: {:10.3}", element, sigma, delta)?;
        }
        Ok(())
    }
}
