use crate::metric::MetricKind;
use crate::sensitivity::{DEFAULT_EPSILON, SensitivityParams, resolve_idx};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Model description parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Names of the observables.
    pub observables: Vec<String>,
    /// Names of the experimental conditions.
    pub conditions: Vec<String>,
    /// Indices of the perturbed rate equations or initial values.
    pub perturbed_idx: Vec<usize>,
}

/// Sensitivity analysis parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Signaling metric extracted from each time course.
    pub metric: MetricKind,
    /// Fractional perturbation factor.
    pub rate: f64,
    /// Baseline index along the perturbation axis (0 or -1).
    pub metric_idx: isize,
    /// Absolute difference tolerance.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

/// Analysis configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Sensitivity analysis parameters.
    pub fn sensitivity_params(&self) -> SensitivityParams {
        SensitivityParams {
            rate: self.analysis.rate,
            metric_idx: self.analysis.metric_idx,
            epsilon: self.analysis.epsilon,
        }
    }

    fn validate(&self) -> Result<()> {
        check_names(&self.model.observables).context("invalid observables")?;
        check_names(&self.model.conditions).context("invalid conditions")?;
        check_num(self.model.perturbed_idx.len(), 1..).context("invalid perturbed indices")?;

        check_num(self.analysis.rate, f64::MIN_POSITIVE..=10.0).context("invalid rate")?;
        if self.analysis.rate == 1.0 {
            bail!("invalid rate: rate must not be 1");
        }
        check_num(self.analysis.epsilon, 0.0..1.0).context("invalid epsilon")?;
        resolve_idx(self.analysis.metric_idx, self.model.perturbed_idx.len())
            .context("invalid metric index")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        bail!("list must not be empty");
    }
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            bail!("name {name:?} appears more than once");
        }
    }
    Ok(())
}
