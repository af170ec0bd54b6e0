//! The shielding tensor of a single nucleus.
//!
//! A [`Tensor`] is created once by a parser and afterwards only changes when a
//! secondary reference is applied to it (see [`crate::reference`]). Principal
//! values are stored as read from the source file; the raw cartesian tensor is
//! kept alongside when the program prints it.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or printing a tensor.
#[derive(Debug, Error)]
pub enum TensorError {
    #[error("Invalid element symbol {0:?}: expected one or two letters")]
    InvalidElement(String),

    #[error("Invalid atomic index {0}: atom numbers start at 1")]
    InvalidIndex(usize),

    #[error("Invalid verbosity level {0}, should be 1 to 3")]
    InvalidVerbosity(u8),

    #[error("Unrecognized shielding type {0:?}")]
    UnknownShieldingType(String),
}

/// Contribution of the shielding tensor reported by the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShieldingType {
    #[default]
    Total,
    Diamagnetic,
    Paramagnetic,
    SpinOrbit,
}

impl ShieldingType {
    pub const ALL: [ShieldingType; 4] = [
        ShieldingType::Total,
        ShieldingType::Diamagnetic,
        ShieldingType::Paramagnetic,
        ShieldingType::SpinOrbit,
    ];

    /// Lower-case name used on the command line and in report headers.
    pub fn name(&self) -> &'static str {
        match self {
            ShieldingType::Total => "total",
            ShieldingType::Diamagnetic => "diamagnetic",
            ShieldingType::Paramagnetic => "paramagnetic",
            ShieldingType::SpinOrbit => "spin-orbit",
        }
    }

    /// Section label printed by ADF after `=== SCALED:`.
    pub fn adf_label(&self) -> &'static str {
        match self {
            ShieldingType::Total => "TOTAL",
            ShieldingType::Diamagnetic => "DIAMAGNETIC",
            ShieldingType::Paramagnetic => "PARAMAGNETIC",
            ShieldingType::SpinOrbit => "SPIN-ORBIT",
        }
    }
}

impl fmt::Display for ShieldingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShieldingType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| TensorError::UnknownShieldingType(s.to_string()))
    }
}

/// How much of each tensor is written to a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Index, element and isotropic value.
    #[default]
    Isotropic = 1,
    /// Adds the three principal values.
    Principal = 2,
    /// Adds the principal axis system.
    Full = 3,
}

impl TryFrom<u8> for Verbosity {
    type Error = TensorError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Verbosity::Isotropic),
            2 => Ok(Verbosity::Principal),
            3 => Ok(Verbosity::Full),
            other => Err(TensorError::InvalidVerbosity(other)),
        }
    }
}

/// Normalise an element symbol to `Xx` form.
///
/// Returns `None` unless the symbol consists of one or two ASCII letters.
pub fn normalize_element(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() || symbol.len() > 2 || !symbol.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut chars = symbol.chars();
    let first = chars.next()?.to_ascii_uppercase();
    Some(std::iter::once(first).chain(chars.map(|c| c.to_ascii_lowercase())).collect())
}

/// Shielding tensor of one atom in one calculation.
///
/// Two tensors are equal when they describe the same atom (same index and
/// element); the numeric content is not compared. Lists are ordered by index
/// only, see [`crate::collection::TensorList::sort`].
#[derive(Debug, Clone)]
pub struct Tensor {
    index: usize,
    element: String,
    shielding_type: ShieldingType,
    eigenvalues: Vector3<f64>,
    eigenvectors: Option<Matrix3<f64>>,
    cartesian: Option<Matrix3<f64>>,
}

impl Tensor {
    /// Validate the atom identity and create a tensor with zero principal values.
    pub fn new(
        index: usize,
        element: &str,
        shielding_type: ShieldingType,
    ) -> Result<Self, TensorError> {
        if index == 0 {
            return Err(TensorError::InvalidIndex(index));
        }
        let element =
            normalize_element(element).ok_or_else(|| TensorError::InvalidElement(element.into()))?;
        Ok(Self {
            index,
            element,
            shielding_type,
            eigenvalues: Vector3::zeros(),
            eigenvectors: None,
            cartesian: None,
        })
    }

    /// Build a tensor from its raw cartesian representation.
    ///
    /// The matrix is symmetrised and diagonalised; principal values are sorted
    /// in ascending order and the matching eigenvectors stored as rows.
    pub fn from_cartesian(
        index: usize,
        element: &str,
        shielding_type: ShieldingType,
        cartesian: Matrix3<f64>,
    ) -> Result<Self, TensorError> {
        let (values, axes) = principal_system(&cartesian);
        Ok(Self::new(index, element, shielding_type)?
            .with_eigenvalues(values)
            .with_eigenvectors(axes)
            .with_cartesian(cartesian))
    }

    pub fn with_eigenvalues(mut self, values: Vector3<f64>) -> Self {
        self.eigenvalues = values;
        self
    }

    /// Attach the principal axis system, one axis per row.
    pub fn with_eigenvectors(mut self, axes: Matrix3<f64>) -> Self {
        self.eigenvectors = Some(axes);
        self
    }

    pub fn with_cartesian(mut self, cartesian: Matrix3<f64>) -> Self {
        self.cartesian = Some(cartesian);
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn shielding_type(&self) -> ShieldingType {
        self.shielding_type
    }

    pub fn eigenvalues(&self) -> &Vector3<f64> {
        &self.eigenvalues
    }

    pub fn eigenvectors(&self) -> Option<&Matrix3<f64>> {
        self.eigenvectors.as_ref()
    }

    pub fn cartesian(&self) -> Option<&Matrix3<f64>> {
        self.cartesian.as_ref()
    }

    /// Isotropic shielding: the mean of the principal values.
    pub fn isotropic(&self) -> f64 {
        self.eigenvalues.mean()
    }

    /// Principal axes as rows, diagonalising the cartesian tensor when the
    /// source did not print them.
    pub fn principal_axes(&self) -> Option<Matrix3<f64>> {
        self.eigenvectors
            .or_else(|| self.cartesian.as_ref().map(|c| principal_system(c).1))
    }

    pub(crate) fn set_shielding_type(&mut self, shielding_type: ShieldingType) {
        self.shielding_type = shielding_type;
    }

    pub(crate) fn eigenvalues_mut(&mut self) -> &mut Vector3<f64> {
        &mut self.eigenvalues
    }

    /// Write one report record.
    ///
    /// Fixed column widths; downstream plotting scripts read these columns.
    pub fn write_record<W: Write + ?Sized>(&self, out: &mut W, verbosity: Verbosity) -> io::Result<()> {
        write!(out, "{:6} {:>3} {:10.3}", self.index, self.element, self.isotropic())?;

        if verbosity >= Verbosity::Principal {
            write!(
                out,
                "{:10.3} {:10.3} {:10.3}",
                self.eigenvalues[0], self.eigenvalues[1], self.eigenvalues[2]
            )?;
        }
        writeln!(out)?;

        if verbosity == Verbosity::Full {
            writeln!(out, "# Principal axis system (eigenvectors in rows):")?;
            match self.principal_axes() {
                Some(axes) => {
                    for row in axes.row_iter() {
                        writeln!(out, "    {:10.6}{:10.6}{:10.6}", row[0], row[1], row[2])?;
                    }
                }
                None => writeln!(out, "# principal axes not available")?,
            }
            writeln!(out, "{}", "#".repeat(78))?;
        }
        Ok(())
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.element == other.element
    }
}

impl Eq for Tensor {}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index: {}", self.index)?;
        writeln!(f, "Element symbol: {}", self.element)?;
        writeln!(f, "Type of shielding tensor: {}", self.shielding_type)?;
        writeln!(
            f,
            "Eigenvalues: [{:.4}, {:.4}, {:.4}]",
            self.eigenvalues[0], self.eigenvalues[1], self.eigenvalues[2]
        )?;
        writeln!(f, "Isotropic value: {:.4}", self.isotropic())?;
        match self.principal_axes() {
            Some(axes) => write!(f, "Eigenvectors:{}", axes),
            None => writeln!(f, "Eigenvectors: not available"),
        }
    }
}

/// Diagonalise the symmetric part of a cartesian tensor.
fn principal_system(cartesian: &Matrix3<f64>) -> (Vector3<f64>, Matrix3<f64>) {
    let symmetric = (cartesian + cartesian.transpose()) * 0.5;
    let eig = symmetric.symmetric_eigen();

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));

    let values = Vector3::new(
        eig.eigenvalues[order[0]],
        eig.eigenvalues[order[1]],
        eig.eigenvalues[order[2]],
    );
    let axes = Matrix3::from_rows(&[
        eig.eigenvectors.column(order[0]).transpose(),
        eig.eigenvectors.column(order[1]).transpose(),
        eig.eigenvectors.column(order[2]).transpose(),
    ]);
    (values, axes)
}
