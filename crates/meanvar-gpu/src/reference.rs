//! Host reference computations for validating device results.

use std::fmt;

use crate::error::{GpuError, Result};

/// Mean of `data`, accumulated in `f64`.
pub fn host_mean(data: &[f32]) -> Result<f32> {
    if data.is_empty() {
        return Err(GpuError::InvalidConfiguration(
            "cannot take the mean of an empty dataset".to_string(),
        ));
    }
    let sum: f64 = data.iter().map(|&x| f64::from(x)).sum();
    Ok((sum / data.len() as f64) as f32)
}

/// Sample variance of `data` around `mean`, accumulated in `f64`.
pub fn host_variance(data: &[f32], mean: f32) -> Result<f32> {
    if data.len() < 2 {
        return Err(GpuError::InvalidConfiguration(format!(
            "sample variance needs at least 2 elements, got {}",
            data.len()
        )));
    }
    let sum: f64 = data
        .iter()
        .map(|&x| {
            let d = f64::from(x - mean);
            d * d
        })
        .sum();
    Ok((sum / (data.len() - 1) as f64) as f32)
}

/// `|reference - candidate| / |reference|`, or the absolute error when the
/// reference is zero.
pub fn relative_error(reference: f32, candidate: f32) -> f32 {
    let diff = (reference - candidate).abs();
    if reference == 0.0 {
        diff
    } else {
        diff / reference.abs()
    }
}

/// Outcome of checking one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricCheck {
    /// Relative error against the host reference.
    pub relative_error: f32,
    /// Whether the error is strictly below the tolerance.
    pub passed: bool,
}

impl MetricCheck {
    fn new(reference: f32, candidate: f32, tolerance: f32) -> Self {
        let relative_error = relative_error(reference, candidate);
        Self { relative_error, passed: relative_error < tolerance }
    }
}

/// Per-metric comparison of device and host results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Mean check.
    pub mean: MetricCheck,
    /// Variance check.
    pub variance: MetricCheck,
}

impl Comparison {
    /// Both metrics within tolerance.
    pub fn passed(&self) -> bool {
        self.mean.passed && self.variance.passed
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = |ok: bool| if ok { "OK" } else { "WRONG" };
        writeln!(f, "Relative error for mean is: {}", self.mean.relative_error)?;
        writeln!(f, "Relative error for var is: {}", self.variance.relative_error)?;
        writeln!(f, "Mean calculation {}!", verdict(self.mean.passed))?;
        write!(f, "Var calculation {}!", verdict(self.variance.passed))
    }
}

/// Compare device results against host references.
pub fn compare(
    gpu_mean: f32,
    cpu_mean: f32,
    gpu_var: f32,
    cpu_var: f32,
    tolerance: f32,
) -> Comparison {
    Comparison {
        mean: MetricCheck::new(cpu_mean, gpu_mean, tolerance),
        variance: MetricCheck::new(cpu_var, gpu_var, tolerance),
    }
}
