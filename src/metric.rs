use crate::duration::{duration, first_argmax, first_argmin};
use anyhow::{Context, Result, bail};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Scalar summary extracted from a simulated time course.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Maximum,
    Minimum,
    Argmax,
    Argmin,
    Duration,
    Integral,
}

impl MetricKind {
    /// Evaluate the metric on a single time course.
    ///
    /// Empty or NaN-containing time courses come from failed simulations
    /// and evaluate to NaN, as does an undefined duration.
    pub fn evaluate(self, series: &[f64]) -> f64 {
        if series.is_empty() || series.iter().any(|val| val.is_nan()) {
            return f64::NAN;
        }
        match self {
            Self::Maximum => first_argmax(series).1,
            Self::Minimum => first_argmin(series).1,
            Self::Argmax => first_argmax(series).0 as f64,
            Self::Argmin => first_argmin(series).0 as f64,
            Self::Duration => match duration(series) {
                Ok(Some(t_end)) => t_end as f64,
                _ => f64::NAN,
            },
            Self::Integral => series
                .windows(2)
                .map(|pair| 0.5 * (pair[0] + pair[1]))
                .sum(),
        }
    }
}

/// Simulated time courses of one parameter set.
///
/// Indexed as `[perturbation][observable][condition][time]`.
pub type Dynamics = Vec<Vec<Vec<Vec<f64>>>>;

/// Build the signaling metric array from the dynamics of every parameter set.
///
/// The result is indexed by (file, perturbation, observable, condition).
///
/// # Errors
/// Returns an error if any parameter set does not have the expected shape.
pub fn build_signaling_metric(
    sets: &[Dynamics],
    kind: MetricKind,
    n_perturbed: usize,
    n_obs: usize,
    n_cond: usize,
) -> Result<Array4<f64>> {
    let mut metric = Array4::from_elem((sets.len(), n_perturbed, n_obs, n_cond), f64::NAN);

    for (i_file, set) in sets.iter().enumerate() {
        check_len(set.len(), n_perturbed)
            .with_context(|| format!("invalid number of perturbations in set {i_file}"))?;
        for (i_per, per) in set.iter().enumerate() {
            check_len(per.len(), n_obs).with_context(|| {
                format!("invalid number of observables in set {i_file}, perturbation {i_per}")
            })?;
            for (i_obs, obs) in per.iter().enumerate() {
                check_len(obs.len(), n_cond).with_context(|| {
                    format!(
                        "invalid number of conditions in set {i_file}, perturbation {i_per}, observable {i_obs}"
                    )
                })?;
                for (i_cond, series) in obs.iter().enumerate() {
                    metric[(i_file, i_per, i_obs, i_cond)] = kind.evaluate(series);
                }
            }
        }
    }

    Ok(metric)
}

fn check_len(len: usize, exp_len: usize) -> Result<()> {
    if len != exp_len {
        bail!("length must be {exp_len}, but is {len}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES: [f64; 6] = [0.0, 5.0, 10.0, 8.0, 0.5, 0.2];

    #[test]
    fn evaluates_kinds() {
        assert_eq!(MetricKind::Maximum.evaluate(&SERIES), 10.0);
        assert_eq!(MetricKind::Minimum.evaluate(&SERIES), 0.0);
        assert_eq!(MetricKind::Argmax.evaluate(&SERIES), 2.0);
        assert_eq!(MetricKind::Argmin.evaluate(&SERIES), 0.0);
        assert_eq!(MetricKind::Duration.evaluate(&SERIES), 4.0);
        assert!((MetricKind::Integral.evaluate(&SERIES) - 23.6).abs() < 1e-12);
    }

    #[test]
    fn failed_simulations_are_nan() {
        assert!(MetricKind::Maximum.evaluate(&[]).is_nan());
        assert!(MetricKind::Integral.evaluate(&[1.0, f64::NAN]).is_nan());
        assert!(MetricKind::Duration.evaluate(&[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn builds_metric_array() {
        let set = vec![
            vec![vec![SERIES.to_vec(), vec![1.0, 3.0, 2.0]]],
            vec![vec![vec![f64::NAN], vec![4.0]]],
        ];
        let metric =
            build_signaling_metric(&[set.clone(), set], MetricKind::Maximum, 2, 1, 2).unwrap();
        assert_eq!(metric.dim(), (2, 2, 1, 2));
        assert_eq!(metric[(1, 0, 0, 0)], 10.0);
        assert_eq!(metric[(1, 0, 0, 1)], 3.0);
        assert!(metric[(0, 1, 0, 0)].is_nan());
        assert_eq!(metric[(0, 1, 0, 1)], 4.0);
    }

    #[test]
    fn rejects_ragged_sets() {
        let set = vec![vec![vec![SERIES.to_vec()]]];
        assert!(build_signaling_metric(&[set.clone()], MetricKind::Integral, 1, 1, 1).is_ok());
        assert!(build_signaling_metric(&[set.clone()], MetricKind::Integral, 2, 1, 1).is_err());
        assert!(build_signaling_metric(&[set.clone()], MetricKind::Integral, 1, 2, 1).is_err());
        assert!(build_signaling_metric(&[set], MetricKind::Integral, 1, 1, 2).is_err());
    }
}
