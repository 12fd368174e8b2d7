use anyhow::{Result, bail};
use ndarray::{Array3, Array4, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

/// Default tolerance below which a metric change is not detectable.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Parameters of the finite-difference sensitivity analysis.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SensitivityParams {
    /// Fractional perturbation factor (e.g. 1.01 for a 1% increase).
    pub rate: f64,
    /// Index of the baseline along the perturbation axis (negative counts from the back).
    pub metric_idx: isize,
    /// Absolute difference tolerance.
    pub epsilon: f64,
}

impl SensitivityParams {
    pub fn new(rate: f64, metric_idx: isize) -> Self {
        Self {
            rate,
            metric_idx,
            epsilon: DEFAULT_EPSILON,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || self.rate <= 0.0 || self.rate == 1.0 {
            bail!("rate must be finite, positive and different from 1, but is {}", self.rate);
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            bail!("epsilon must be finite and non-negative, but is {}", self.epsilon);
        }
        Ok(())
    }
}

/// Resolve a possibly negative index into an axis of length `len`.
pub fn resolve_idx(idx: isize, len: usize) -> Result<usize> {
    let resolved = if idx < 0 {
        len.checked_sub(idx.unsigned_abs())
    } else {
        Some(idx as usize).filter(|&idx| idx < len)
    };
    match resolved {
        Some(idx) => Ok(idx),
        None => bail!("index {idx} is out of range for axis of length {len}"),
    }
}

/// Sensitivity coefficient of a single cell.
///
/// `val` is the perturbed metric value and `base` the baseline one. The
/// result is always NaN, 0.0 or finite.
pub fn coefficient(val: f64, base: f64, rate: f64, epsilon: f64) -> f64 {
    if !val.is_finite() || !base.is_finite() {
        return f64::NAN;
    }
    if (val - base).abs() < epsilon {
        return 0.0;
    }
    if val == 0.0 || base == 0.0 {
        // Ratio is zero or infinite: no finite log-ratio exists.
        return f64::NAN;
    }
    if val.signum() != base.signum() {
        return 0.0;
    }
    // Difference of logs, as `val / base` can overflow or underflow.
    (val.abs().ln() - base.abs().ln()) / rate.ln()
}

/// Compute the sensitivity coefficients of a signaling metric.
///
/// `metric` is indexed by (file, perturbation, observable, condition). The
/// lengths of `perturbed_idx`, `observables` and `conditions` (and `n_file`)
/// must match its shape; their values are not read.
///
/// # Errors
/// Returns an error if the shapes are inconsistent, if `metric_idx` is out
/// of range or if `rate` or `epsilon` are invalid.
pub fn compute_sensitivity_coefficients<P, O, C>(
    metric: ArrayView4<f64>,
    n_file: usize,
    perturbed_idx: &[P],
    observables: &[O],
    conditions: &[C],
    params: &SensitivityParams,
) -> Result<Array4<f64>> {
    params.validate()?;

    let exp_dim = (n_file, perturbed_idx.len(), observables.len(), conditions.len());
    let dim = metric.dim();
    if dim != exp_dim {
        bail!("metric shape must be {exp_dim:?}, but is {dim:?}");
    }

    let n_perturbed = exp_dim.1;
    if n_perturbed == 0 {
        return Ok(Array4::zeros(exp_dim));
    }
    let i_base = resolve_idx(params.metric_idx, n_perturbed)?;

    let coefficients = Array4::from_shape_fn(exp_dim, |(i, j, k, l)| {
        coefficient(
            metric[(i, j, k, l)],
            metric[(i, i_base, k, l)],
            params.rate,
            params.epsilon,
        )
    });

    Ok(coefficients)
}

/// Average coefficients over the file axis, skipping NaN values.
///
/// Cells where every file is NaN stay NaN.
pub fn average_over_files(coefficients: ArrayView4<f64>) -> Array3<f64> {
    coefficients.map_axis(Axis(0), |lane| {
        let (sum, count) = lane
            .iter()
            .filter(|val| !val.is_nan())
            .fold((0.0, 0usize), |(sum, count), &val| (sum + val, count + 1));
        if count == 0 { f64::NAN } else { sum / count as f64 }
    })
}

/// Cell counts of a coefficient array.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct CoefficientSummary {
    pub n_cells: usize,
    pub n_nan: usize,
    pub n_zero: usize,
}

impl CoefficientSummary {
    pub fn new(coefficients: ArrayView4<f64>) -> Self {
        Self {
            n_cells: coefficients.len(),
            n_nan: coefficients.iter().filter(|val| val.is_nan()).count(),
            n_zero: coefficients.iter().filter(|&&val| val == 0.0).count(),
        }
    }
}
