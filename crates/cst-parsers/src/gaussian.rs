//! Parser for the GIAO shielding section of Gaussian 0X log files.
//!
//! The section looks like:
//! ```text
//!  SCF GIAO Magnetic shielding tensor (ppm):
//!       1  C    Isotropic =    57.7345   Anisotropy =   194.4092
//!    XX=    48.4143   YX=   -50.1808   ZX=    36.4927
//!    XY=   -34.6004   YY=    67.2395   ZY=   -33.6069
//!    XZ=    33.8812   YZ=   -47.9286   ZZ=    57.5498
//!    Eigenvalues:   -11.6707    12.2000   172.6743
//!       2  H    Isotropic =    31.5023   Anisotropy =     7.1206
//!  ...
//!  End of Minotr Frequency-dependent properties file   721 does not exist.
//! ```
//! Newer releases end the section with
//! `End of Minotr F.D. properties file   721 does not exist.` instead; both
//! are matched on their common prefix.
//! With extra print options each record is followed by an `Eigenvectors:`
//! line and three rows of the principal axis system.
//!
//! Eigenvalues and eigenvectors are read from fixed columns. Gaussian writes
//! a field of asterisks when a value overflows its width; such fields are
//! read as 0.0.

use std::ops::Range;

use cst_core::{ShieldingType, Tensor, TensorList};
use log::{debug, warn};
use nalgebra::{Matrix3, Vector3};

use crate::{columns, ParseError, ParserConfig, ShieldingParser};

const FILE_TYPE: &str = "Gaussian 0X output";

const SECTION_BEGIN: &str = "SCF GIAO Magnetic shielding tensor (ppm):";
const SECTION_END: &str = "End of Minotr";
const TENSOR_BEGIN: &str = "Isotropic =";
const EIGENVALUES: &str = "Eigenvalues:";
const EIGENVECTORS: &str = "Eigenvectors:";

const EIGENVALUE_LINE: usize = 4;
const EIGENVALUE_MARKER_COLS: Range<usize> = 0..15;
const EIGENVALUE_COLS: [Range<usize>; 3] = [15..26, 26..37, 37..48];

const EIGENVECTOR_LINE: usize = 5;
const EIGENVECTOR_MARKER_COLS: Range<usize> = 0..17;
const EIGENVECTOR_COLS: [Range<usize>; 3] = [9..20, 20..31, 31..42];

/// Lines of one tensor record, starting at the `Isotropic =` line.
struct Block<'a> {
    first_line: usize,
    lines: Vec<&'a str>,
}

enum Flow {
    Continue,
    Stop,
}

/// Reader for Gaussian GIAO output. Only total shielding is printed by
/// Gaussian, so the configured shielding type and numbering are not used.
#[derive(Debug, Clone)]
pub struct GaussianParser {
    config: ParserConfig,
}

impl GaussianParser {
    pub fn new(config: ParserConfig) -> Self {
        if config.shielding_type != ShieldingType::Total {
            warn!(
                "Gaussian output only contains total shielding, ignoring shielding type '{}'",
                config.shielding_type
            );
        }
        Self { config }
    }

    fn format_error(stage: &'static str, line: usize, message: impl Into<String>) -> ParseError {
        ParseError::FormatError {
            format: "Gaussian",
            stage,
            line,
            message: message.into(),
        }
    }

    /// Parse a block and append it, or signal that the index limit was passed.
    fn dispatch(&self, block: &Block<'_>, list: &mut TensorList) -> Result<Flow, ParseError> {
        match self.process_block(block)? {
            Some(tensor) => {
                list.append(tensor)?;
                Ok(Flow::Continue)
            }
            None => Ok(Flow::Stop),
        }
    }

    fn process_block(&self, block: &Block<'_>) -> Result<Option<Tensor>, ParseError> {
        let line_no = block.first_line;
        let mut header = block.lines[0].split_whitespace();
        let index: usize = header
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Self::format_error("atom header", line_no, "missing atom index"))?;
        let element = header
            .next()
            .ok_or_else(|| Self::format_error("atom header", line_no, "missing element symbol"))?;

        if let Some(max) = self.config.max_index {
            if index > max {
                debug!("Atom {} is past the maximum index {}, stopping", index, max);
                return Ok(None);
            }
        }

        let tensor = Tensor::new(index, element, ShieldingType::Total)
            .map_err(|e| Self::format_error("atom header", line_no, e.to_string()))?;

        let eig_line = block.lines.get(EIGENVALUE_LINE).ok_or_else(|| {
            Self::format_error(
                "eigenvalues",
                line_no,
                format!("record has {} lines, eigenvalues expected on line {}", block.lines.len(), EIGENVALUE_LINE + 1),
            )
        })?;
        if !columns(eig_line, EIGENVALUE_MARKER_COLS).contains(EIGENVALUES) {
            return Err(Self::format_error(
                "eigenvalues",
                line_no + EIGENVALUE_LINE,
                format!("expected '{}', got '{}'", EIGENVALUES, eig_line.trim()),
            ));
        }
        let eigenvalues = read_fields(eig_line, &EIGENVALUE_COLS)
            .ok_or_else(|| Self::format_error("eigenvalues", line_no + EIGENVALUE_LINE, "invalid number"))?;
        let mut tensor = tensor.with_eigenvalues(Vector3::from(eigenvalues));

        if let Some(cartesian) = read_cartesian(&block.lines[1..EIGENVALUE_LINE]) {
            tensor = tensor.with_cartesian(cartesian);
        }

        if block.lines.len() > EIGENVECTOR_LINE {
            let marker = block.lines[EIGENVECTOR_LINE];
            if !columns(marker, EIGENVECTOR_MARKER_COLS).contains(EIGENVECTORS) {
                return Err(Self::format_error(
                    "eigenvectors",
                    line_no + EIGENVECTOR_LINE,
                    format!("expected '{}', got '{}'", EIGENVECTORS, marker.trim()),
                ));
            }

            let mut rows = [[0.0; 3]; 3];
            for (i, row) in rows.iter_mut().enumerate() {
                let offset = EIGENVECTOR_LINE + 1 + i;
                let line = block.lines.get(offset).ok_or_else(|| {
                    Self::format_error("eigenvectors", line_no + offset, "missing eigenvector row")
                })?;
                *row = read_fields(line, &EIGENVECTOR_COLS)
                    .ok_or_else(|| Self::format_error("eigenvectors", line_no + offset, "invalid number"))?;
            }
            tensor = tensor.with_eigenvectors(Matrix3::from_fn(|r, c| rows[r][c]));
        }

        Ok(Some(tensor))
    }
}

impl ShieldingParser for GaussianParser {
    fn file_type(&self) -> &'static str {
        FILE_TYPE
    }

    fn parse_str(&self, content: &str, filename: &str) -> Result<TensorList, ParseError> {
        let mut list = TensorList::new(filename, FILE_TYPE, ShieldingType::Total);
        let mut in_section = false;
        let mut block: Option<Block<'_>> = None;

        for (idx, line) in content.lines().enumerate() {
            if !in_section {
                in_section = line.contains(SECTION_BEGIN);
                continue;
            }

            if line.contains(SECTION_END) {
                if let Some(last) = block.take() {
                    self.dispatch(&last, &mut list)?;
                }
                return Ok(list);
            }

            if line.contains(TENSOR_BEGIN) {
                if let Some(done) = block.take() {
                    if let Flow::Stop = self.dispatch(&done, &mut list)? {
                        return Ok(list);
                    }
                }
                block = Some(Block {
                    first_line: idx + 1,
                    lines: Vec::new(),
                });
            }

            if let Some(open) = block.as_mut() {
                open.lines.push(line);
            }
        }

        // Truncated log: keep the record that was still open.
        if let Some(last) = block {
            self.dispatch(&last, &mut list)?;
        }
        Ok(list)
    }
}

/// Read a number from a fixed-width field; overflow asterisks give 0.0.
fn g0x_float(field: &str) -> Option<f64> {
    let field = field.trim();
    if !field.is_empty() && field.chars().all(|c| c == '*') {
        return Some(0.0);
    }
    field.parse().ok()
}

fn read_fields(line: &str, cols: &[Range<usize>; 3]) -> Option<[f64; 3]> {
    Some([
        g0x_float(columns(line, cols[0].clone()))?,
        g0x_float(columns(line, cols[1].clone()))?,
        g0x_float(columns(line, cols[2].clone()))?,
    ])
}

/// Read the `XX= .. YX= .. ZX= ..` lines of a record.
///
/// Each line holds one column of the tensor. Returns `None` when the lines do
/// not have that shape.
fn read_cartesian(lines: &[&str]) -> Option<Matrix3<f64>> {
    if lines.len() != 3 {
        return None;
    }
    let mut cols = [[0.0; 3]; 3];
    for (col, line) in cols.iter_mut().zip(lines) {
        let values: Vec<f64> = line
            .split('=')
            .skip(1)
            .map(|part| part.split_whitespace().next().and_then(g0x_float))
            .collect::<Option<_>>()?;
        *col = values.try_into().ok()?;
    }
    Some(Matrix3::from_fn(|r, c| cols[c][r]))
}
