use crate::config::Config;
use crate::metric::{Dynamics, MetricKind, build_signaling_metric};
use crate::sensitivity::{
    CoefficientSummary, average_over_files, compute_sensitivity_coefficients,
};
use anyhow::{Context, Result, bail};
use glob::glob;
use ndarray::{Array3, Array4};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Results of a sensitivity analysis.
#[derive(Debug, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub metric: MetricKind,
    pub rate: f64,
    pub metric_idx: isize,
    pub perturbed_idx: Vec<usize>,
    pub observables: Vec<String>,
    pub conditions: Vec<String>,
    /// Coefficients indexed by (file, perturbation, observable, condition).
    pub coefficients: Array4<f64>,
    /// Coefficients averaged over files, skipping NaN values.
    pub average: Array3<f64>,
    pub summary: CoefficientSummary,
}

/// Signaling metric saved between `compute` and `analyze`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricCache {
    pub metric: MetricKind,
    pub n_file: usize,
    /// Values indexed by (file, perturbation, observable, condition).
    pub values: Array4<f64>,
}

pub struct Manager {
    analysis_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(analysis_dir: P) -> Result<Self> {
        let analysis_dir = analysis_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(analysis_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { analysis_dir, cfg })
    }

    /// Compute the signaling metric of every parameter set and save it.
    pub fn compute_metric(&self) -> Result<Array4<f64>> {
        let n_sets = self.count_set_dirs().context("failed to count set dirs")?;
        log::info!("found {n_sets} parameter sets");

        let mut sets = Vec::with_capacity(n_sets);
        for set_idx in 0..n_sets {
            let dynamics_file = self.dynamics_file(set_idx);
            let dynamics = load_msgpack::<Dynamics>(&dynamics_file)
                .with_context(|| format!("failed to load {dynamics_file:?}"))?;
            sets.push(dynamics);
        }

        let model = &self.cfg.model;
        let metric = build_signaling_metric(
            &sets,
            self.cfg.analysis.metric,
            model.perturbed_idx.len(),
            model.observables.len(),
            model.conditions.len(),
        )
        .context("failed to build signaling metric")?;

        let n_nan = metric.iter().filter(|val| val.is_nan()).count();
        if n_nan > 0 {
            log::warn!("signaling metric has {n_nan} missing values");
        }

        let cache = MetricCache {
            metric: self.cfg.analysis.metric,
            n_file: n_sets,
            values: metric,
        };

        let metric_file = self.metric_file();
        save_msgpack(&metric_file, &cache)
            .with_context(|| format!("failed to save {metric_file:?}"))?;
        log::info!("saved {metric_file:?}");

        Ok(cache.values)
    }

    /// Compute the sensitivity coefficients and save the report.
    ///
    /// The signaling metric is computed first if it has not been saved yet.
    /// A saved metric must match the current config and parameter sets.
    pub fn analyze(&self) -> Result<()> {
        let metric_file = self.metric_file();
        let metric = if metric_file.is_file() {
            let cache = load_msgpack::<MetricCache>(&metric_file)
                .with_context(|| format!("failed to load {metric_file:?}"))?;
            if cache.metric != self.cfg.analysis.metric {
                bail!(
                    "saved signaling metric is {:?}, but config requests {:?}",
                    cache.metric,
                    self.cfg.analysis.metric
                );
            }
            let n_sets = self.count_set_dirs().context("failed to count set dirs")?;
            if cache.n_file != n_sets {
                bail!(
                    "saved signaling metric has {} parameter sets, but {n_sets} were found",
                    cache.n_file
                );
            }
            log::info!("loaded {metric_file:?}");
            cache.values
        } else {
            self.compute_metric().context("failed to compute metric")?
        };

        let model = &self.cfg.model;
        let params = self.cfg.sensitivity_params();
        let coefficients = compute_sensitivity_coefficients(
            metric.view(),
            metric.dim().0,
            &model.perturbed_idx,
            &model.observables,
            &model.conditions,
            &params,
        )
        .context("failed to compute sensitivity coefficients")?;

        let summary = CoefficientSummary::new(coefficients.view());
        log::info!("{summary:?}");

        let report = SensitivityReport {
            metric: self.cfg.analysis.metric,
            rate: params.rate,
            metric_idx: params.metric_idx,
            perturbed_idx: model.perturbed_idx.clone(),
            observables: model.observables.clone(),
            conditions: model.conditions.clone(),
            average: average_over_files(coefficients.view()),
            coefficients,
            summary,
        };

        let report_file = self.report_file();
        save_msgpack(&report_file, &report)
            .with_context(|| format!("failed to save {report_file:?}"))?;
        log::info!("saved {report_file:?}");

        Ok(())
    }

    /// Remove every generated output file.
    pub fn clean(&self) -> Result<()> {
        for file in [self.metric_file(), self.report_file()] {
            if file.is_file() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }
        Ok(())
    }

    fn count_set_dirs(&self) -> Result<usize> {
        let pattern = self.analysis_dir.join("out").join("set-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob set dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn dynamics_file(&self, set_idx: usize) -> PathBuf {
        self.analysis_dir
            .join("out")
            .join(format!("set-{set_idx:04}"))
            .join("dynamics.msgpack")
    }

    fn metric_file(&self) -> PathBuf {
        self.analysis_dir.join("signaling_metric.msgpack")
    }

    fn report_file(&self) -> PathBuf {
        self.analysis_dir.join("sensitivity.msgpack")
    }
}

fn load_msgpack<T: for<'de> Deserialize<'de>>(file: &Path) -> Result<T> {
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let value = decode::from_read(&mut reader).context("failed to deserialize value")?;
    Ok(value)
}

fn save_msgpack<T: Serialize>(file: &Path, value: &T) -> Result<()> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
