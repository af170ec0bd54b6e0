//! Ordered list of the tensors read from one output file.

use std::io::{self, Write};

use thiserror::Error;

use crate::reference::SigmaReference;
use crate::tensor::{ShieldingType, Tensor, Verbosity};

/// Errors raised when a tensor does not fit into a list.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("Tensor of atom {index} holds {found} shielding, list holds {expected} shielding")]
    TypeMismatch {
        index: usize,
        expected: ShieldingType,
        found: ShieldingType,
    },

    #[error("Insert position {position} is out of bounds for a list of {len} tensors")]
    OutOfBounds { position: usize, len: usize },
}

/// Admit a tensor into a list holding `expected` shielding.
pub fn check_tensor(tensor: &Tensor, expected: ShieldingType) -> Result<(), CollectionError> {
    if tensor.shielding_type() == expected {
        Ok(())
    } else {
        Err(CollectionError::TypeMismatch {
            index: tensor.index(),
            expected,
            found: tensor.shielding_type(),
        })
    }
}

/// Tensors of a single source file, all of one shielding type.
#[derive(Debug, Clone)]
pub struct TensorList {
    tensors: Vec<Tensor>,
    filename: String,
    file_type: String,
    shielding_type: ShieldingType,
    referenced: bool,
}

impl TensorList {
    pub fn new(
        filename: impl Into<String>,
        file_type: impl Into<String>,
        shielding_type: ShieldingType,
    ) -> Self {
        Self {
            tensors: Vec::new(),
            filename: filename.into(),
            file_type: file_type.into(),
            shielding_type,
            referenced: false,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn shielding_type(&self) -> ShieldingType {
        self.shielding_type
    }

    /// Relabel the list and every tensor in it.
    pub fn set_shielding_type(&mut self, shielding_type: ShieldingType) {
        self.shielding_type = shielding_type;
        for tensor in &mut self.tensors {
            tensor.set_shielding_type(shielding_type);
        }
    }

    /// Whether a secondary reference has already been applied.
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    pub(crate) fn mark_referenced(&mut self) {
        self.referenced = true;
    }

    pub fn append(&mut self, tensor: Tensor) -> Result<(), CollectionError> {
        check_tensor(&tensor, self.shielding_type)?;
        self.tensors.push(tensor);
        Ok(())
    }

    pub fn insert(&mut self, position: usize, tensor: Tensor) -> Result<(), CollectionError> {
        check_tensor(&tensor, self.shielding_type)?;
        if position > self.tensors.len() {
            return Err(CollectionError::OutOfBounds {
                position,
                len: self.tensors.len(),
            });
        }
        self.tensors.insert(position, tensor);
        Ok(())
    }

    /// Stable sort by atomic index.
    pub fn sort(&mut self) {
        self.tensors.sort_by_key(|t| t.index());
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Tensor> {
        self.tensors.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tensor> {
        self.tensors.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Tensor> {
        self.tensors.iter_mut()
    }

    /// Write the per-file report.
    ///
    /// When a reference table is given the header documents every reference
    /// and the list is referenced (at most once) before the values are printed.
    pub fn write_report<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        verbosity: Verbosity,
        reference: Option<&SigmaReference>,
    ) -> io::Result<()> {
        writeln!(out, "# NMR shielding tensors from file \"{}\"", self.filename)?;
        writeln!(out, "# source file type: {}", self.file_type)?;

        if let Some(reference) = reference {
            writeln!(out, "# The shielding values of the following nuclei were ")?;
            writeln!(out, "# converted to chemical shifts using ")?;
            writeln!(out, "# these secondary references:")?;
            for (element, sigma, delta) in reference.iter() {
                writeln!(
                    out,
                    "# nucleus: {:>2} sigma: {:10.3} delta: {:10.3}",
                    element, sigma, delta
                )?;
            }
            reference.transform_list(self);
        }

        writeln!(out, "# list of {} shielding tensor parameters", self.shielding_type)?;
        if verbosity == Verbosity::Full {
            writeln!(out, "# principal axes are also printed")?;
        }

        write!(out, "# {:>8} {:>10}", "atom", "isotropic")?;
        if verbosity >= Verbosity::Principal {
            write!(out, "{:>10} {:>10} {:>10}", "value 11", "value 22", "value 33")?;
        }
        writeln!(out)?;

        for tensor in &self.tensors {
            tensor.write_record(out, verbosity)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TensorList {
    type Item = &'a Tensor;
    type IntoIter = std::slice::Iter<'a, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}
