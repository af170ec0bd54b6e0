//! End-to-end checks: output files on disk through parsing, referencing,
//! reports and statistics.

use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use cst_core::{ShieldingType, SigmaReference, StatsError, TensorStats, Verbosity};
use cst_parsers::{FileType, ParseError, ParserConfig};

fn adf_nucleus(element: &str, index: usize, iso: f64) -> String {
    format!(
        " ****  N U C L E U S :  {e}({i})\n\
         \x20Atom input number in the ADF calculation:   {e}({i})\n\
         \x20Internal NMR numbering of atoms:   {e}({i})\n\
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
        i = index,
        a = iso - 5.0,
        b = iso,
        c = iso + 5.0,
        iso = iso,
        stars = "*".repeat(79),
    )
}

fn adf_output(out: &str, nuclei: &[(&str, usize, f64)]) -> String {
    let mut s = format!(" (INPUT FILE)\n nmr\n   {}\n end\n", out);
    for (element, index, iso) in nuclei {
        s.push_str(&adf_nucleus(element, *index, *iso));
    }
    s.push_str(" N M R   E X I T\n");
    s
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_stats_over_three_runs() {
    let dir = tempfile::tempdir().unwrap();
    let parser = FileType::Adf.parser(ParserConfig::default());

    let mut stats = TensorStats::new();
    for (run, value) in [10.0, 12.0, 14.0].iter().enumerate() {
        // Atom order differs from run to run; sorting restores it.
        let content = adf_output("out iso", &[("H", 2, 30.0), ("C", 1, *value)]);
        let path = write(dir.path(), &format!("run{}.out", run), &content);
        let mut list = parser.read(&path).unwrap();
        assert_eq!(list.filename(), path.display().to_string());
        list.sort();
        stats.add_from_list(&list).unwrap();
    }

    assert_eq!(stats.filenames().len(), 3);
    let carbon = stats.summary(1).unwrap();
    assert_eq!(carbon.count, 3);
    assert_abs_diff_eq!(carbon.mean, 12.0, epsilon = 1e-12);
    assert_abs_diff_eq!(carbon.std_dev, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(carbon.std_err, 1.1547, epsilon = 1e-4);
    assert_abs_diff_eq!(carbon.conf_int_95, 2.263, epsilon = 1e-3);

    let hydrogen = stats.summary(2).unwrap();
    assert_abs_diff_eq!(hydrogen.std_dev, 0.0, epsilon = 1e-12);

    let mut table = Vec::new();
    stats.write_stats(&mut table).unwrap();
    let table = String::from_utf8(table).unwrap();
    assert_eq!(
        table.lines().nth(1).unwrap(),
        "     1  C      3   12.000    2.000              1.155                2.263"
    );
}

#[test]
fn test_referenced_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "mol.out", &adf_output("out tens", &[("C", 1, 150.0), ("O", 2, 300.0)]));
    let refs = write(dir.path(), "refs.txt", "# nucleus sigma delta\nC 180.0 0.0\n");

    let reference = SigmaReference::load(&refs).unwrap();
    let mut list = FileType::Adf.parser(ParserConfig::default()).read(&path).unwrap();

    let mut report = Vec::new();
    list.write_report(&mut report, Verbosity::Full, Some(&reference)).unwrap();
    // Writing twice must not reference twice.
    list.write_report(&mut Vec::new(), Verbosity::Full, Some(&reference)).unwrap();
    assert!(list.is_referenced());
    assert_abs_diff_eq!(list.get(0).unwrap().isotropic(), 30.0, epsilon = 1e-9);
    assert_abs_diff_eq!(list.get(1).unwrap().isotropic(), 300.0, epsilon = 1e-9);

    let report = String::from_utf8(report).unwrap();
    assert!(report.contains("# source file type: ADF NMR output\n"));
    assert!(report.contains("# principal axes are also printed\n"));
    assert!(report.contains("     1   C     30.000"));
    assert!(report.contains("# Principal axis system (eigenvectors in rows):\n"));
    assert!(report.contains("      0.000000  0.000000  1.000000\n"));
}

#[test]
fn test_gaussian_file() {
    let dir = tempfile::tempdir().unwrap();
    let content = "\
 Gaussian header
 SCF GIAO Magnetic shielding tensor (ppm):
      1  O    Isotropic =   300.0000   Anisotropy =    60.0000
   XX=   260.0000   YX=     0.0000   ZX=     0.0000
   XY=     0.0000   YY=   300.0000   ZY=     0.0000
   XZ=     0.0000   YZ=     0.0000   ZZ=   340.0000
   Eigenvalues:   260.0000   300.0000   340.0000
      2  H    Isotropic =    31.0000   Anisotropy =     9.0000
   XX=    25.0000   YX=     0.0000   ZX=     0.0000
   XY=     0.0000   YY=    34.0000   ZY=     0.0000
   XZ=     0.0000   YZ=     0.0000   ZZ=    34.0000
   Eigenvalues:    25.0000    34.0000***********
 End of Minotr Frequency-dependent properties file   721 does not exist.
";
    let path = write(dir.path(), "water.log", content);
    let list = FileType::Gaussian.parser(ParserConfig::default()).read(&path).unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(list.shielding_type(), ShieldingType::Total);
    let h = list.get(1).unwrap();
    assert_abs_diff_eq!(h.eigenvalues()[2], 0.0, epsilon = 1e-12);
    assert!(list.get(0).unwrap().cartesian().is_some());
}

#[test]
fn test_runs_of_different_structures_are_rejected() {
    let parser = FileType::Adf.parser(ParserConfig::default());
    let first = parser.parse_str(&adf_output("out iso", &[("C", 1, 10.0)]), "a.out").unwrap();
    let second = parser.parse_str(&adf_output("out iso", &[("N", 1, 10.0)]), "b.out").unwrap();

    let mut stats = TensorStats::new();
    stats.add_from_list(&first).unwrap();
    let err = stats.add_from_list(&second).unwrap_err();
    assert!(matches!(err, StatsError::ElementMismatch { index: 1, .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = FileType::Gaussian
        .parser(ParserConfig::default())
        .read(&dir.path().join("absent.log"))
        .unwrap_err();
    assert!(matches!(err, ParseError::IoError(_)));
}
