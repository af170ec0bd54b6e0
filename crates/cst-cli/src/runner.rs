//! Job runner: ties together parsers, references and statistics.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use cst_core::{SampleSummary, SigmaReference, TensorList, TensorStats, Verbosity};
use cst_parsers::ShieldingParser;

use crate::config::{default_stats_path, JobConfig, JobMode};

/// Run a job from a parsed configuration.
pub fn run_job(job: &JobConfig) -> Result<()> {
    job.validate()?;

    let verbosity = Verbosity::try_from(job.output.verbosity)?;
    let parser = job.parser.file_type.parser(job.parser.to_config());
    let reference = job
        .reference
        .as_ref()
        .map(|r| load_reference(&r.file))
        .transpose()?;

    match job.mode {
        JobMode::Extract => extract_single(
            parser.as_ref(),
            &job.inputs[0],
            job.output.path(),
            verbosity,
            reference.as_ref(),
        ),
        JobMode::Batch => {
            for input in &job.inputs {
                let output = batch_output_path(input, &job.output.suffix, job.output.directory());
                extract_single(parser.as_ref(), input, Some(&output), verbosity, reference.as_ref())?;
            }
            Ok(())
        }
        JobMode::Stats => {
            let path = job.output.path().map_or_else(default_stats_path, Path::to_path_buf);
            let stats = collect_stats(parser.as_ref(), &job.inputs, reference.as_ref())?;
            write_stats(&stats, &path, job.output.directory(), job.output.json())
        }
    }
}

/// Load a secondary reference file and log its contents.
pub fn load_reference(path: &Path) -> Result<SigmaReference> {
    info!("Reading file \"{}\" containing secondary references...", path.display());
    let reference = SigmaReference::load(path)
        .with_context(|| format!("Invalid reference file \"{}\"", path.display()))?;

    if reference.is_empty() {
        warn!("No references found in \"{}\"", path.display());
    } else {
        info!("Found these reference values.");
        for line in reference.to_string().lines().filter(|l| !l.is_empty()) {
            info!("{}", line);
        }
    }
    info!("Other nuclei will NOT be referenced.");
    Ok(reference)
}

/// Read, sort and optionally reference the tensors of one file.
pub fn read_tensors(
    parser: &dyn ShieldingParser,
    path: &Path,
    reference: Option<&SigmaReference>,
) -> Result<TensorList> {
    info!("Attempting to read file \"{}\"...", path.display());
    let mut list = parser
        .read(path)
        .with_context(|| format!("Failed to read NMR tensors from \"{}\"", path.display()))?;
    info!("Processed {} entries.", list.len());
    if list.is_empty() {
        warn!("No {} shielding tensors found in \"{}\"", list.shielding_type(), path.display());
    }

    list.sort();
    if let Some(reference) = reference {
        info!("Referencing entries...");
        reference.transform_list(&mut list);
    }
    Ok(list)
}

/// Report file name for batch mode: input stem plus suffix, next to the
/// input unless a directory is given.
pub fn batch_output_path(input: &Path, suffix: &str, directory: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{}{}", stem, suffix);
    match directory {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Extract one file to `output`, or to standard output when `None`.
pub fn extract_single(
    parser: &dyn ShieldingParser,
    input: &Path,
    output: Option<&Path>,
    verbosity: Verbosity,
    reference: Option<&SigmaReference>,
) -> Result<()> {
    let mut list = read_tensors(parser, input, reference)?;

    match output {
        Some(path) => {
            info!("Writing entries to file \"{}\"...", path.display());
            write_file(path, |out| list.write_report(out, verbosity, reference))?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            list.write_report(&mut out, verbosity, reference)
                .context("I/O error during writing to standard output")?;
            out.flush()?;
        }
    }
    Ok(())
}

/// Accumulate the tensors of all inputs.
pub fn collect_stats(
    parser: &dyn ShieldingParser,
    inputs: &[PathBuf],
    reference: Option<&SigmaReference>,
) -> Result<TensorStats> {
    let mut stats = TensorStats::new();
    for input in inputs {
        let list = read_tensors(parser, input, reference)?;
        stats
            .add_from_list(&list)
            .with_context(|| format!("Inconsistent structure in \"{}\"", input.display()))?;
    }
    info!("Collected {} atoms from {} files.", stats.len(), stats.filenames().len());
    Ok(stats)
}

/// Write the statistics table, plus optional sample files and JSON summary.
pub fn write_stats(
    stats: &TensorStats,
    path: &Path,
    sample_dir: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    info!("Calculating statistics and writing entries to file \"{}\"...", path.display());
    write_file(path, |out| stats.write_stats(out))?;

    if let Some(dir) = sample_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory \"{}\"", dir.display()))?;
        info!("Writing per-atom samples to \"{}\"...", dir.display());
        for index in stats.indices() {
            let Some(name) = stats.sample_file_name(index) else {
                continue;
            };
            write_file(&dir.join(name), |out| stats.write_samples(index, out))?;
        }
    }

    if let Some(json_path) = json {
        write_summary_json(&stats.summaries(), json_path)?;
    }
    Ok(())
}

/// Write statistics summaries as pretty-printed JSON.
pub fn write_summary_json(summaries: &[SampleSummary], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summaries)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json).with_context(|| format!("Failed to write \"{}\"", path.display()))?;

    info!("Statistics (JSON) written to: {}", path.display());
    Ok(())
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create \"{}\"", path.display()))?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|_| out.flush())
        .with_context(|| format!("I/O error during writing \"{}\"", path.display()))?;
    Ok(())
}
