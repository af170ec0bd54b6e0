//! Parser for the output of the ADF NMR program.
//!
//! The relevant parts of an output file are:
//! ```text
//!  (INPUT FILE)
//!  nmr
//!    out tens
//!  end
//!  ...
//!  ****  N U C L E U S :  C(1)
//!  Atom input number in the ADF calculation:   C(1)
//!  Internal NMR numbering of atoms:            C(3)
//!  === SCALED: PARAMAGNETIC
//!  ...
//!  === SCALED: TOTAL
//!  ==== Principal components:
//!     -11.6707    12.2000   172.6743
//!  ==== Principal Axis System:
//!     0.1234    0.9876    0.0000
//!  ...
//!  *******************************************************************************
//!  ...
//!  N M R   E X I T
//! ```
//! The `out` keyword of the echoed input decides whether nucleus blocks carry
//! only the isotropic value (`iso`) or the full principal axis system
//! (`tens`).

use std::iter::Enumerate;
use std::str::Lines;

use cst_core::{Tensor, TensorList};
use log::debug;
use nalgebra::{Matrix3, Vector3};

use crate::{ParseError, ParserConfig, ShieldingParser};

const FILE_TYPE: &str = "ADF NMR output";

const NMR_END: &str = "N M R   E X I T";
const NUCLEUS_BEGIN: &str = "****  N U C L E U S : ";
const NUCLEUS_END_WIDTH: usize = 79;
const SHIELDING_SELECTOR: &str = "=== SCALED:";

const JOB_BEGIN: &str = "(INPUT FILE)";
const JOB_END: &str = "end";
const OUTPUT_KEYWORD: &str = "out";

const ISO_TOTAL: &str = "total";
const PRINCIPAL_COMPONENTS: &str = "==== Principal components:";
const PRINCIPAL_AXES: &str = "==== Principal Axis System:";

type LineCursor<'a> = Enumerate<Lines<'a>>;

/// Which interpreter reads the nucleus blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum OutputKind {
    #[default]
    Iso,
    Tens,
}

/// Reader for ADF NMR output.
///
/// With `max_index` set, nucleus blocks at or above that index are skipped.
#[derive(Debug, Clone)]
pub struct AdfParser {
    config: ParserConfig,
}

/// Parse an atom label such as `C(12)` into index and element.
pub fn parse_atom_label(text: &str) -> Option<(usize, String)> {
    let (element, rest) = text.trim_start().split_once('(')?;
    if element.is_empty() || element.len() > 2 || !element.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let (digits, _) = rest.split_once(')')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, element.to_string()))
}

impl AdfParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    fn format_error(stage: &'static str, line: usize, message: impl Into<String>) -> ParseError {
        ParseError::FormatError {
            format: "ADF",
            stage,
            line,
            message: message.into(),
        }
    }

    /// Read one nucleus block. Returns `None` for atoms past the index limit.
    fn read_nucleus(
        &self,
        lines: &mut LineCursor<'_>,
        first_line: usize,
        kind: OutputKind,
    ) -> Result<Option<Tensor>, ParseError> {
        let numbering_label = self.config.numbering.label();
        let selector = format!(
            "{} {}",
            SHIELDING_SELECTOR,
            self.config.shielding_type.adf_label()
        );
        let separator = "*".repeat(NUCLEUS_END_WIDTH);

        let mut atom = None;
        let mut collecting = false;
        let mut block: Vec<(usize, &str)> = Vec::new();

        loop {
            let Some((idx, raw)) = lines.next() else {
                return Err(Self::format_error(
                    "nucleus block",
                    first_line,
                    "end of file before the end of the nucleus block",
                ));
            };
            let line = raw.trim();

            if line.contains(numbering_label) {
                let label = line.split_once(':').map_or("", |(_, rest)| rest);
                atom = Some(parse_atom_label(label).ok_or_else(|| {
                    Self::format_error(
                        "atom numbering",
                        idx + 1,
                        format!("invalid atom numbering format '{}'", label.trim()),
                    )
                })?);
                continue;
            }
            if line.contains(&selector) {
                collecting = true;
                continue;
            }
            if line.contains(&separator) {
                break;
            }
            if collecting {
                if line.contains(SHIELDING_SELECTOR) {
                    break;
                }
                if !line.is_empty() {
                    block.push((idx + 1, line));
                }
            }
        }

        let (index, element) = atom.ok_or_else(|| {
            Self::format_error(
                "atom numbering",
                first_line,
                format!("no '{}' line in nucleus block", numbering_label),
            )
        })?;

        if let Some(max) = self.config.max_index {
            if index >= max {
                debug!("Skipping atom {}({}), index limit is {}", element, index, max);
                return Ok(None);
            }
        }

        let tensor = Tensor::new(index, &element, self.config.shielding_type)
            .map_err(|e| Self::format_error("atom numbering", first_line, e.to_string()))?;

        let tensor = match kind {
            OutputKind::Iso => Self::parse_iso_block(&block, tensor, first_line)?,
            OutputKind::Tens => Self::parse_tens_block(&block, tensor, first_line)?,
        };
        Ok(Some(tensor))
    }

    /// The isotropic value is the last number on the last line mentioning
    /// `total`; it is replicated as the three principal values.
    fn parse_iso_block(block: &[(usize, &str)], tensor: Tensor, first_line: usize) -> Result<Tensor, ParseError> {
        let (line_no, line) = block
            .iter()
            .rev()
            .find(|(_, l)| l.contains(ISO_TOTAL))
            .ok_or_else(|| {
                Self::format_error("isotropic shielding", first_line, "no total isotropic shielding line")
            })?;
        let value: f64 = line
            .split_whitespace()
            .last()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Self::format_error("isotropic shielding", *line_no, format!("invalid value in '{}'", line)))?;
        Ok(tensor.with_eigenvalues(Vector3::repeat(value)))
    }

    fn parse_tens_block(block: &[(usize, &str)], tensor: Tensor, first_line: usize) -> Result<Tensor, ParseError> {
        let find = |marker: &str| block.iter().position(|(_, l)| l.starts_with(marker));

        let pc = find(PRINCIPAL_COMPONENTS).ok_or_else(|| {
            Self::format_error("principal components", first_line, format!("missing '{}'", PRINCIPAL_COMPONENTS))
        })?;
        let eigenvalues = Self::row_after(block, pc, 1, "principal components")?;

        let pas = find(PRINCIPAL_AXES).ok_or_else(|| {
            Self::format_error("principal axis system", first_line, format!("missing '{}'", PRINCIPAL_AXES))
        })?;
        let rows = [
            Self::row_after(block, pas, 1, "principal axis system")?,
            Self::row_after(block, pas, 2, "principal axis system")?,
            Self::row_after(block, pas, 3, "principal axis system")?,
        ];

        // ADF prints the axes as columns.
        let axes = Matrix3::from_fn(|r, c| rows[r][c]).transpose();

        Ok(tensor
            .with_eigenvalues(Vector3::from(eigenvalues))
            .with_eigenvectors(axes))
    }

    /// Three numbers on the line `offset` lines after the marker at `marker_pos`.
    fn row_after(
        block: &[(usize, &str)],
        marker_pos: usize,
        offset: usize,
        stage: &'static str,
    ) -> Result<[f64; 3], ParseError> {
        let marker_line = block[marker_pos].0;
        let (line_no, line) = block
            .get(marker_pos + offset)
            .ok_or_else(|| Self::format_error(stage, marker_line, "block ends after marker"))?;
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|v| v.parse().ok())
            .collect::<Option<_>>()
            .ok_or_else(|| Self::format_error(stage, *line_no, format!("non-numeric field in '{}'", line)))?;
        values.try_into().map_err(|v: Vec<f64>| {
            Self::format_error(stage, *line_no, format!("expected 3 values, found {}", v.len()))
        })
    }
}

/// Scan the echoed input up to `end` for the `out` keyword.
fn read_output_kind(lines: &mut LineCursor<'_>) -> Option<OutputKind> {
    let mut kind = None;
    for (_, raw) in lines.by_ref() {
        let line = raw.trim().to_lowercase();
        if line == JOB_END {
            break;
        }
        let mut fields = line.split_whitespace();
        if fields.next() != Some(OUTPUT_KEYWORD) {
            continue;
        }
        let options: Vec<&str> = fields.collect();
        if options.contains(&"tens") {
            kind = Some(OutputKind::Tens);
        } else if options.contains(&"iso") {
            kind = Some(OutputKind::Iso);
        }
    }
    kind
}

impl ShieldingParser for AdfParser {
    fn file_type(&self) -> &'static str {
        FILE_TYPE
    }

    fn parse_str(&self, content: &str, filename: &str) -> Result<TensorList, ParseError> {
        let mut list = TensorList::new(filename, FILE_TYPE, self.config.shielding_type);
        let mut kind = OutputKind::default();
        let mut lines = content.lines().enumerate();

        while let Some((idx, line)) = lines.next() {
            if line.contains(NMR_END) {
                break;
            }
            if line.contains(JOB_BEGIN) {
                if let Some(found) = read_output_kind(&mut lines) {
                    debug!("Output type of {}: {:?}", filename, found);
                    kind = found;
                }
                continue;
            }
            if line.contains(NUCLEUS_BEGIN) {
                if let Some(tensor) = self.read_nucleus(&mut lines, idx + 1, kind)? {
                    list.append(tensor)?;
                }
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AtomNumbering;
    use approx::assert_abs_diff_eq;
    use cst_core::ShieldingType;

    fn nucleus(element: &str, input: usize, internal: usize, iso: f64) -> String {
        format!(
            " ****  N U C L E U S :  {e}({i})\n\
             \x20Atom input number in the ADF calculation:   {e}({i})\n\
             \x20Internal NMR numbering of atoms:   {e}({n})\n\
             \x20=== SCALED: PARAMAGNETIC\n\
             \x20   total paramagnetic shielding:   {p:.4}\n\
             \x20=== SCALED: TOTAL\n\
             \x20==== Principal components:\n\
             \x20   {a:.4}   {b:.4}   {c:.4}\n\
             \x20==== Principal Axis System:\n\
             \x20   0.0000   1.0000   0.0000\n\
             \x20   0.0000   0.0000   1.0000\n\
             \x20   1.0000   0.0000   0.0000\n\
             \n\
             \x20   total isotropic shielding =   {iso:.4}\n\
             \x20{stars}\n",
            e = element,
            i = input,
            n = internal,
            p = -iso,
            a = iso - 10.0,
            b = iso,
            c = iso + 10.0,
            iso = iso,
            stars = "*".repeat(79),
        )
    }

    fn output(out: &str, blocks: &[String]) -> String {
        let mut s = format!(" header\n (INPUT FILE)\n nmr\n   {}\n   nuc\n end\n", out);
        for b in blocks {
            s.push_str(b);
        }
        s.push_str(" N M R   E X I T\n");
        s.push_str(&nucleus("Xe", 99, 99, 1.0));
        s
    }

    fn parser(config: ParserConfig) -> AdfParser {
        AdfParser::new(config)
    }

    #[test]
    fn test_atom_label() {
        assert_eq!(parse_atom_label("  C(12) "), Some((12, "C".to_string())));
        assert_eq!(parse_atom_label("Cl(3)"), Some((3, "Cl".to_string())));
        assert_eq!(parse_atom_label("Xyz(3)"), None);
        assert_eq!(parse_atom_label("C 3"), None);
        assert_eq!(parse_atom_label("C(+3)"), None);
        assert_eq!(parse_atom_label("(3)"), None);
    }

    #[test]
    fn test_iso_output() {
        let content = output("out iso", &[nucleus("C", 1, 2, 120.0), nucleus("h", 2, 1, 30.5)]);
        let list = parser(ParserConfig::default()).parse_str(&content, "a.out").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.file_type(), "ADF NMR output");

        let h = list.get(1).unwrap();
        assert_eq!((h.index(), h.element()), (2, "H"));
        assert_eq!(h.eigenvalues(), &Vector3::repeat(30.5));
        assert!(h.eigenvectors().is_none());
    }

    #[test]
    fn test_tens_output() {
        let content = output("out tens", &[nucleus("N", 1, 1, 100.0)]);
        let list = parser(ParserConfig::default()).parse_str(&content, "a.out").unwrap();
        let n = list.get(0).unwrap();
        assert_abs_diff_eq!(n.eigenvalues()[0], 90.0, epsilon = 1e-12);
        assert_abs_diff_eq!(n.eigenvalues()[2], 110.0, epsilon = 1e-12);
        assert_abs_diff_eq!(n.isotropic(), 100.0, epsilon = 1e-12);

        // Printed columns become rows: first axis is z.
        let axes = n.eigenvectors().unwrap();
        assert_abs_diff_eq!(axes[(0, 2)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(axes[(1, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(axes[(2, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_default_output_kind_is_iso() {
        let content = format!("{}{}", nucleus("C", 1, 1, 50.0), " N M R   E X I T\n");
        let list = parser(ParserConfig::default()).parse_str(&content, "a.out").unwrap();
        assert_eq!(list.get(0).unwrap().eigenvalues(), &Vector3::repeat(50.0));
    }

    #[test]
    fn test_internal_numbering() {
        let content = output("out iso", &[nucleus("C", 1, 5, 120.0)]);
        let config = ParserConfig {
            numbering: AtomNumbering::Internal,
            ..Default::default()
        };
        let list = parser(config).parse_str(&content, "a.out").unwrap();
        assert_eq!(list.get(0).unwrap().index(), 5);
    }

    #[test]
    fn test_paramagnetic_selection() {
        let content = output("out iso", &[nucleus("C", 1, 1, 120.0)]);
        let config = ParserConfig {
            shielding_type: ShieldingType::Paramagnetic,
            ..Default::default()
        };
        let list = parser(config).parse_str(&content, "a.out").unwrap();
        assert_eq!(list.shielding_type(), ShieldingType::Paramagnetic);
        let t = list.get(0).unwrap();
        assert_eq!(t.shielding_type(), ShieldingType::Paramagnetic);
        assert_abs_diff_eq!(t.isotropic(), -120.0, epsilon = 1e-12);
    }

    #[test]
    fn test_max_index_drops_blocks() {
        let content = output(
            "out iso",
            &[nucleus("C", 2, 2, 10.0), nucleus("C", 3, 3, 20.0), nucleus("H", 1, 1, 30.0)],
        );
        let config = ParserConfig {
            max_index: Some(3),
            ..Default::default()
        };
        let list = parser(config).parse_str(&content, "a.out").unwrap();
        let kept: Vec<usize> = list.iter().map(|t| t.index()).collect();
        assert_eq!(kept, vec![2, 1]);
    }

    #[test]
    fn test_missing_numbering_is_an_error() {
        let block = nucleus("C", 1, 1, 10.0).replace("Atom input number", "Atom number");
        let err = parser(ParserConfig::default())
            .parse_str(&output("out iso", &[block]), "a.out")
            .unwrap_err();
        assert!(matches!(err, ParseError::FormatError { stage: "atom numbering", .. }), "{}", err);
    }

    #[test]
    fn test_bad_numbering_label_is_an_error() {
        let block = nucleus("C", 1, 1, 10.0).replace("calculation:   C(1)", "calculation:   C-1");
        let err = parser(ParserConfig::default())
            .parse_str(&output("out iso", &[block]), "a.out")
            .unwrap_err();
        assert!(err.to_string().contains("invalid atom numbering format"));
    }

    #[test]
    fn test_missing_principal_axes_is_an_error() {
        let block = nucleus("C", 1, 1, 10.0).replace("==== Principal Axis System:", "==== Something else:");
        let err = parser(ParserConfig::default())
            .parse_str(&output("out tens", &[block]), "a.out")
            .unwrap_err();
        assert!(matches!(err, ParseError::FormatError { stage: "principal axis system", .. }));
    }

    #[test]
    fn test_non_numeric_component_is_an_error() {
        let block = nucleus("C", 1, 1, 10.0).replace("   20.0000", "   twenty");
        let err = parser(ParserConfig::default())
            .parse_str(&output("out tens", &[block]), "a.out")
            .unwrap_err();
        assert!(matches!(err, ParseError::FormatError { stage: "principal components", .. }));
    }

    #[test]
    fn test_unterminated_block_is_an_error() {
        let content = " ****  N U C L E U S :  C(1)\n Atom input number in the ADF calculation: C(1)\n";
        let err = parser(ParserConfig::default()).parse_str(content, "a.out").unwrap_err();
        assert!(matches!(err, ParseError::FormatError { stage: "nucleus block", line: 1, .. }));
    }
}
