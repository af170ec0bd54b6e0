//! TOML job description for extraction and statistics runs.
//!
//! ```toml
//! mode = "stats"
//! inputs = ["run1/nmr.out", "run2/nmr.out"]
//!
//! [parser]
//! file_type = "adf"
//! shielding_type = "total"
//! numbering = "input"
//! max_index = 24
//!
//! [reference]
//! file = "refs.txt"
//!
//! [output]
//! path = "cststat.txt"
//! directory = "samples"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cst_core::{ShieldingType, Verbosity};
use cst_parsers::{AtomNumbering, FileType, ParserConfig};
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub mode: JobMode,
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub parser: ParserSection,
    pub reference: Option<ReferenceSection>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to produce from the input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// One report for a single input file.
    Extract,
    /// One report per input file.
    Batch,
    /// Statistics over all input files.
    Stats,
}

/// Parser selection and settings.
#[derive(Debug, Default, Deserialize)]
pub struct ParserSection {
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default)]
    pub shielding_type: ShieldingType,
    #[serde(default)]
    pub numbering: AtomNumbering,
    /// Highest atomic index of interest, 0 reads all atoms.
    #[serde(default)]
    pub max_index: usize,
}

impl ParserSection {
    pub fn to_config(&self) -> ParserConfig {
        ParserConfig {
            shielding_type: self.shielding_type,
            numbering: self.numbering,
            max_index: (self.max_index > 0).then_some(self.max_index),
        }
    }
}

/// Secondary reference file.
#[derive(Debug, Deserialize)]
pub struct ReferenceSection {
    pub file: PathBuf,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Report file (extract; standard output when absent) or statistics file
    /// (stats; default "cststat.txt").
    pub path: Option<PathBuf>,
    /// Suffix appended to the input file stem in batch mode.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Batch report directory, or per-atom sample directory for stats.
    pub directory: Option<PathBuf>,
    /// Optional JSON copy of the statistics.
    pub json: Option<PathBuf>,
    /// Report verbosity, 1 to 3 (default: 1).
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            suffix: default_suffix(),
            directory: None,
            json: None,
            verbosity: default_verbosity(),
        }
    }
}

impl OutputConfig {
    pub fn path(&self) -> Option<&Path> {
        non_empty(&self.path)
    }

    pub fn directory(&self) -> Option<&Path> {
        non_empty(&self.directory)
    }

    pub fn json(&self) -> Option<&Path> {
        non_empty(&self.json)
    }
}

/// An empty string in the job file means "not set".
fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

pub fn default_suffix() -> String {
    "_cstext.txt".into()
}

pub fn default_stats_path() -> PathBuf {
    PathBuf::from("cststat.txt")
}

fn default_verbosity() -> u8 {
    1
}

impl JobConfig {
    /// Check the rules a TOML file cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.inputs.is_empty() {
            bail!("No input file name specified");
        }
        if self.mode == JobMode::Extract && self.inputs.len() != 1 {
            bail!(
                "Extract mode reads exactly one input file, got {}; use batch mode for several",
                self.inputs.len()
            );
        }
        Verbosity::try_from(self.output.verbosity)?;
        Ok(())
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration \"{}\"", path.display()))?;
    let config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid configuration \"{}\"", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let job: JobConfig = toml::from_str("mode = \"extract\"\ninputs = [\"a.out\"]\n").unwrap();
        assert_eq!(job.mode, JobMode::Extract);
        assert_eq!(job.parser.file_type, FileType::Adf);
        assert_eq!(job.parser.shielding_type, ShieldingType::Total);
        assert_eq!(job.parser.to_config().max_index, None);
        assert!(job.reference.is_none());
        assert_eq!(job.output.suffix, "_cstext.txt");
        assert_eq!(job.output.verbosity, 1);
        job.validate().unwrap();
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            mode = "stats"
            inputs = ["r1.log", "r2.log"]

            [parser]
            file_type = "gaussian"
            shielding_type = "spin-orbit"
            numbering = "internal"
            max_index = 12

            [reference]
            file = "refs.txt"

            [output]
            path = "summary.txt"
            directory = "samples"
            json = "summary.json"
        "#;
        let job: JobConfig = toml::from_str(text).unwrap();
        assert_eq!(job.mode, JobMode::Stats);
        assert_eq!(job.parser.file_type, FileType::Gaussian);
        assert_eq!(job.parser.shielding_type, ShieldingType::SpinOrbit);
        assert_eq!(job.parser.numbering, AtomNumbering::Internal);
        assert_eq!(job.parser.to_config().max_index, Some(12));
        assert_eq!(job.reference.unwrap().file, PathBuf::from("refs.txt"));
        assert_eq!(job.output.directory(), Some(Path::new("samples")));
    }

    #[test]
    fn test_empty_paths_are_unset() {
        let text = "mode = \"stats\"\ninputs = [\"a\"]\n[output]\ndirectory = \"\"\njson = \"\"\n";
        let job: JobConfig = toml::from_str(text).unwrap();
        assert_eq!(job.output.directory(), None);
        assert_eq!(job.output.json(), None);
        assert_eq!(job.output.path(), None);
    }

    #[test]
    fn test_unknown_choices_are_rejected() {
        assert!(toml::from_str::<JobConfig>("mode = \"plot\"\ninputs = [\"a\"]\n").is_err());
        let bad_type = "mode = \"stats\"\ninputs = [\"a\"]\n[parser]\nfile_type = \"orca\"\n";
        assert!(toml::from_str::<JobConfig>(bad_type).is_err());
    }

    #[test]
    fn test_validate_rules() {
        let two = "mode = \"extract\"\ninputs = [\"a\", \"b\"]\n";
        assert!(toml::from_str::<JobConfig>(two).unwrap().validate().is_err());

        let none = "mode = \"stats\"\ninputs = []\n";
        assert!(toml::from_str::<JobConfig>(none).unwrap().validate().is_err());

        let verbose = "mode = \"batch\"\ninputs = [\"a\"]\n[output]\nverbosity = 4\n";
        assert!(toml::from_str::<JobConfig>(verbose).unwrap().validate().is_err());
    }
}
