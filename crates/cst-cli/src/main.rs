//! Command-line interface for extracting NMR shielding tensors.
//!
//! ```sh
//! cst extract -t gaussian mol.log mol_cst.txt
//! cst batch -r refs.txt run*/nmr.out
//! cst stats -m 24 -d samples run*/nmr.out
//! cst run job.toml
//! cst validate job.toml
//! ```

mod config;
mod runner;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cst_core::ShieldingType;
use cst_parsers::{AtomNumbering, FileType};
use log::info;

use crate::config::{JobConfig, JobMode, OutputConfig, ParserSection, ReferenceSection};

#[derive(Parser)]
#[command(name = "cst")]
#[command(about = "Extract NMR chemical shielding tensors from Gaussian and ADF output")]
#[command(version)]
struct Cli {
    /// Only print warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every extraction mode.
#[derive(Args)]
struct ParserArgs {
    /// Type of output file: adf or gaussian.
    #[arg(short = 't', long = "file-type", default_value = "adf")]
    file_type: FileType,

    /// Shielding tensor to read: total, diamagnetic, paramagnetic or spin-orbit.
    #[arg(short = 's', long = "shielding-type", default_value = "total")]
    shielding_type: ShieldingType,

    /// ADF atom numbering: input or internal.
    #[arg(short = 'n', long = "numbering-type", default_value = "input")]
    numbering: AtomNumbering,

    /// Highest atomic index of interest (0 reads all atoms).
    #[arg(short = 'm', long = "max-index", default_value_t = 0)]
    max_index: usize,

    /// File with secondary references (element, sigma, delta per line).
    #[arg(short = 'r', long = "reference-file", value_name = "FILENAME")]
    reference: Option<PathBuf>,
}

impl ParserArgs {
    fn section(&self) -> ParserSection {
        ParserSection {
            file_type: self.file_type,
            shielding_type: self.shielding_type,
            numbering: self.numbering,
            max_index: self.max_index,
        }
    }

    fn reference(&self) -> Option<ReferenceSection> {
        self.reference.clone().map(|file| ReferenceSection { file })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the tensors of one output file.
    Extract {
        /// Output file of the quantum-chemistry program.
        input: PathBuf,
        /// Report file (standard output if omitted).
        output: Option<PathBuf>,
        #[command(flatten)]
        parser: ParserArgs,
        /// 1: isotropic, 2: principal components, 3: principal axes too.
        #[arg(short = 'l', long = "verbosity-level", default_value_t = 1,
              value_parser = clap::value_parser!(u8).range(1..=3))]
        verbosity: u8,
    },
    /// Extract several output files, one report per file.
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Suffix replacing the extension of each input file.
        #[arg(short = 'o', long = "suffix", default_value = "_cstext.txt")]
        suffix: String,
        /// Directory for the reports (next to each input if omitted).
        #[arg(short = 'd', long = "directory")]
        directory: Option<PathBuf>,
        #[command(flatten)]
        parser: ParserArgs,
        #[arg(short = 'l', long = "verbosity-level", default_value_t = 1,
              value_parser = clap::value_parser!(u8).range(1..=3))]
        verbosity: u8,
    },
    /// Per-atom statistics over several output files of the same structure.
    Stats {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Statistics file.
        #[arg(short = 'o', long = "output", default_value = "cststat.txt")]
        output: PathBuf,
        /// Directory receiving one sample file per atom.
        #[arg(short = 'd', long = "series-directory")]
        series: Option<PathBuf>,
        /// Also write the statistics as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
        #[command(flatten)]
        parser: ParserArgs,
    },
    /// Run a job from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Validate a configuration file without running the job.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let job = match cli.command {
        Commands::Extract { input, output, parser, verbosity } => JobConfig {
            mode: JobMode::Extract,
            inputs: vec![input],
            reference: parser.reference(),
            parser: parser.section(),
            output: OutputConfig {
                path: output,
                verbosity,
                ..OutputConfig::default()
            },
        },
        Commands::Batch { inputs, suffix, directory, parser, verbosity } => JobConfig {
            mode: JobMode::Batch,
            inputs,
            reference: parser.reference(),
            parser: parser.section(),
            output: OutputConfig {
                suffix,
                directory,
                verbosity,
                ..OutputConfig::default()
            },
        },
        Commands::Stats { inputs, output, series, json, parser } => JobConfig {
            mode: JobMode::Stats,
            inputs,
            reference: parser.reference(),
            parser: parser.section(),
            output: OutputConfig {
                path: Some(output),
                directory: series,
                json,
                ..OutputConfig::default()
            },
        },
        Commands::Run { config } => {
            let job = config::load_config(&config)?;
            info!("Configuration: {}", config.display());
            job
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            job.validate()?;
            println!("Configuration is valid: {}", config.display());
            return Ok(());
        }
    };

    runner::run_job(&job)?;
    info!("Done.");
    Ok(())
}
