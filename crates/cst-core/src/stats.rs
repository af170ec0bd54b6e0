//! Sample statistics of isotropic values over many calculations.
//!
//! Tensors from every run are grouped by atomic index. For each index the
//! sample mean, standard deviation (n - 1 divisor), standard error of the mean
//! and a 95 % confidence half-width are reported. The interval uses the
//! large-sample normal quantile 1.96 rather than Student's t, so it is too
//! narrow for small numbers of runs.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;

use crate::collection::TensorList;
use crate::tensor::{Tensor, Verbosity};

/// Normal quantile for a two-sided 95 % interval.
pub const Z_95: f64 = 1.96;

/// Errors raised while aggregating tensors.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Element mismatch between tensors for atom {index}: expected {expected}, found {found}")]
    ElementMismatch {
        index: usize,
        expected: String,
        found: String,
    },
}

/// Descriptive statistics for one atomic index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    pub index: usize,
    pub element: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN for a single sample.
    pub std_dev: f64,
    pub std_err: f64,
    /// Half-width of the 95 % confidence interval.
    pub conf_int_95: f64,
}

impl SampleSummary {
    /// Summarise a set of values. Returns `None` for an empty sample.
    pub fn from_values(index: usize, element: &str, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();
        let std_err = std_dev / n.sqrt();

        Some(Self {
            index,
            element: element.to_string(),
            count: values.len(),
            mean,
            std_dev,
            std_err,
            conf_int_95: Z_95 * std_err,
        })
    }
}

/// Tensors of many runs grouped by atomic index.
#[derive(Debug, Clone, Default)]
pub struct TensorStats {
    data: BTreeMap<usize, Vec<Tensor>>,
    filenames: Vec<String>,
}

impl TensorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample. All samples of an index must belong to the same element.
    pub fn add_tensor(&mut self, tensor: Tensor) -> Result<(), StatsError> {
        check_element(self.stored_element(tensor.index()), &tensor)?;
        self.data.entry(tensor.index()).or_default().push(tensor);
        Ok(())
    }

    /// Add every tensor of a list as one run.
    ///
    /// The run is checked in full before anything is stored, so on error the
    /// aggregator is left as it was.
    pub fn add_from_list(&mut self, list: &TensorList) -> Result<(), StatsError> {
        let mut run: BTreeMap<usize, &str> = BTreeMap::new();
        for tensor in list {
            let expected = self
                .stored_element(tensor.index())
                .or_else(|| run.get(&tensor.index()).copied());
            check_element(expected, tensor)?;
            run.entry(tensor.index()).or_insert(tensor.element());
        }

        for tensor in list {
            self.data.entry(tensor.index()).or_default().push(tensor.clone());
        }
        self.filenames.push(list.filename().to_string());
        Ok(())
    }

    fn stored_element(&self, index: usize) -> Option<&str> {
        self.data.get(&index)?.first().map(Tensor::element)
    }

    /// Source files added so far, in run order.
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    /// Number of distinct atomic indices.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Atomic indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.data.keys().copied()
    }

    pub fn samples(&self, index: usize) -> Option<&[Tensor]> {
        self.data.get(&index).map(Vec::as_slice)
    }

    pub fn summary(&self, index: usize) -> Option<SampleSummary> {
        let samples = self.data.get(&index)?;
        let first = samples.first()?;
        let values: Vec<f64> = samples.iter().map(Tensor::isotropic).collect();
        SampleSummary::from_values(index, first.element(), &values)
    }

    /// Summaries for all indices, ascending.
    pub fn summaries(&self) -> Vec<SampleSummary> {
        self.indices().filter_map(|i| self.summary(i)).collect()
    }

    /// Name of the per-index sample file, e.g. `000012C_samples.txt`.
    pub fn sample_file_name(&self, index: usize) -> Option<String> {
        let element = self.data.get(&index)?.first()?.element();
        Some(format!("{:06}{}_samples.txt", index, element))
    }

    pub fn write_header<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "#{:>9} {:>6} {:>8} {:>8} {:>18} {:>20} ",
            "Atom", "count", "mean", "sigma", "std. err. mean", "95% conf. int. (+/-)"
        )
    }

    /// Write the statistics table, one line per atomic index.
    pub fn write_stats<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        self.write_header(out)?;
        for s in self.summaries() {
            writeln!(
                out,
                "{:6} {:>2} {:6} {:8.3} {:8.3} {:18.3} {:20.3}",
                s.index, s.element, s.count, s.mean, s.std_dev, s.std_err, s.conf_int_95
            )?;
        }
        Ok(())
    }

    /// Dump every sample of one index, numbered by run order.
    pub fn write_samples<W: Write + ?Sized>(&self, index: usize, out: &mut W) -> io::Result<()> {
        writeln!(out, "# Array NMR Shielding/shift tensors for atom No. {}", index)?;
        writeln!(
            out,
            "# {:>6} {:>10} {:>8} {:>8} {:>8} {:>8}",
            "Number", "atom", "d_iso", "d_11", "d_22", "d_33"
        )?;
        for (run, tensor) in self.samples(index).unwrap_or_default().iter().enumerate() {
            write!(out, "{:6} ", run + 1)?;
            tensor.write_record(out, Verbosity::Principal)?;
        }
        Ok(())
    }
}

fn check_element(expected: Option<&str>, tensor: &Tensor) -> Result<(), StatsError> {
    match expected {
        Some(expected) if expected != tensor.element() => Err(StatsError::ElementMismatch {
            index: tensor.index(),
            expected: expected.to_string(),
            found: tensor.element().to_string(),
        }),
        _ => Ok(()),
    }
}
