//! # CST Parsers
//!
//! Readers turning quantum-chemistry output files into
//! [`TensorList`](cst_core::TensorList)s.
//!
//! Supported formats:
//! - [`gaussian`]: GIAO shielding section of Gaussian 0X log files
//!   (fixed-column eigenvalue records)
//! - [`adf`]: NMR program output of ADF (nucleus blocks, isotropic or full
//!   tensor output)
//!
//! Both parsers take an explicit [`ParserConfig`] and implement
//! [`ShieldingParser`].

pub mod adf;
pub mod gaussian;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use cst_core::{CollectionError, ShieldingType, TensorList};
use serde::Deserialize;
use thiserror::Error;

pub use adf::AdfParser;
pub use gaussian::GaussianParser;

/// Errors during output file parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to read {format} tensor at line {line} ({stage}): {message}")]
    FormatError {
        format: &'static str,
        stage: &'static str,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("Unrecognized {kind} {value:?}")]
    UnknownOption { kind: &'static str, value: String },
}

/// Atom numbering convention of ADF output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomNumbering {
    /// Numbering of the input structure.
    #[default]
    Input,
    /// Numbering assigned by ADF during fragment generation.
    Internal,
}

impl AtomNumbering {
    pub fn name(&self) -> &'static str {
        match self {
            AtomNumbering::Input => "input",
            AtomNumbering::Internal => "internal",
        }
    }

    /// Text preceding the atom label in ADF nucleus blocks.
    pub fn label(&self) -> &'static str {
        match self {
            AtomNumbering::Input => "Atom input number in the ADF calculation:",
            AtomNumbering::Internal => "Internal NMR numbering of atoms:",
        }
    }
}

impl FromStr for AtomNumbering {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" => Ok(AtomNumbering::Input),
            "internal" => Ok(AtomNumbering::Internal),
            _ => Err(ParseError::UnknownOption {
                kind: "numbering type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AtomNumbering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings shared by both parsers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserConfig {
    pub shielding_type: ShieldingType,
    pub numbering: AtomNumbering,
    /// Ignore atoms past this index (see each parser for the exact cut-off).
    pub max_index: Option<usize>,
}

/// Kind of output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Adf,
    Gaussian,
}

impl FileType {
    pub fn name(&self) -> &'static str {
        match self {
            FileType::Adf => "adf",
            FileType::Gaussian => "gaussian",
        }
    }

    /// Build the parser for this file type.
    pub fn parser(&self, config: ParserConfig) -> Box<dyn ShieldingParser> {
        match self {
            FileType::Adf => Box::new(AdfParser::new(config)),
            FileType::Gaussian => Box::new(GaussianParser::new(config)),
        }
    }
}

impl FromStr for FileType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adf" => Ok(FileType::Adf),
            "gaussian" => Ok(FileType::Gaussian),
            _ => Err(ParseError::UnknownOption {
                kind: "file type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reads the shielding tensors of one output file.
pub trait ShieldingParser {
    /// Description of the source format written to report headers.
    fn file_type(&self) -> &'static str;

    /// Parse the full text of an output file.
    fn parse_str(&self, content: &str, filename: &str) -> Result<TensorList, ParseError>;

    /// Read and parse a file. The file is closed before parsing starts.
    fn read(&self, path: &Path) -> Result<TensorList, ParseError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content, &path.display().to_string())
    }
}

/// Field of a fixed-column record, clipped to the line.
///
/// Returns an empty string when the columns lie past the end of the line.
pub(crate) fn columns(line: &str, range: std::ops::Range<usize>) -> &str {
    let end = range.end.min(line.len());
    line.get(range.start.min(end)..end).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_names_round_trip() {
        for t in [FileType::Adf, FileType::Gaussian] {
            assert_eq!(t.name().parse::<FileType>().unwrap(), t);
        }
        for n in [AtomNumbering::Input, AtomNumbering::Internal] {
            assert_eq!(n.name().parse::<AtomNumbering>().unwrap(), n);
        }
        assert!(matches!(
            "orca".parse::<FileType>(),
            Err(ParseError::UnknownOption { kind: "file type", .. })
        ));
    }

    #[test]
    fn test_parser_factory() {
        let config = ParserConfig::default();
        assert_eq!(FileType::Adf.parser(config).file_type(), "ADF NMR output");
        assert_eq!(FileType::Gaussian.parser(config).file_type(), "Gaussian 0X output");
    }

    #[test]
    fn test_columns_clip_to_line() {
        assert_eq!(columns("abcdef", 1..3), "bc");
        assert_eq!(columns("abcdef", 4..10), "ef");
        assert_eq!(columns("abc", 5..9), "");
    }
}
