//! Cross-check of configured clamping ranges against measured quantiles.
//!
//! For every validated variable of the training config and every cone with
//! scaling parameters, the clamping range is compared with the quantile
//! record of one input file. Suspicious ranges are drawn through a
//! [`RangePlotter`] into `output_folder/<var_type>/`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::config::{ScalingType, TrainingConfig};
use crate::plot::{RangePlot, RangePlotter};
use crate::records::{QuantileParams, QuantileStore, ScalingParams, ScalingStore, SigmaRange};

/// Checks raised for one (variable, cone) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SuspicionFlags {
    /// Clamping cuts into the 2 sigma range on the left.
    pub left_within: bool,
    /// Clamping cuts into the 2 sigma range on the right.
    pub right_within: bool,
    pub one_sigma_empty: bool,
    pub two_sigma_empty: bool,
    pub three_sigma_empty: bool,
    pub five_sigma_empty: bool,
}

impl SuspicionFlags {
    /// A clamp edge is "within" when it lies strictly inside the 2 sigma range.
    pub fn evaluate(clamp: SigmaRange, quantiles: &QuantileParams) -> Self {
        Self {
            left_within: clamp.left > quantiles.two_sigma.left,
            right_within: clamp.right < quantiles.two_sigma.right,
            one_sigma_empty: quantiles.one_sigma.is_empty(),
            two_sigma_empty: quantiles.two_sigma.is_empty(),
            three_sigma_empty: quantiles.three_sigma.is_empty(),
            five_sigma_empty: quantiles.five_sigma.is_empty(),
        }
    }

    pub fn is_suspicious(&self) -> bool {
        self.iter().any(|(_, raised)| raised)
    }

    /// `(name, value)` for every check, in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [
            ("left_within", self.left_within),
            ("right_within", self.right_within),
            ("one_sigma_empty", self.one_sigma_empty),
            ("two_sigma_empty", self.two_sigma_empty),
            ("three_sigma_empty", self.three_sigma_empty),
            ("five_sigma_empty", self.five_sigma_empty),
        ]
        .into_iter()
    }

    /// Names of the raised checks.
    pub fn active(&self) -> Vec<&'static str> {
        self.iter()
            .filter_map(|(name, raised)| raised.then_some(name))
            .collect()
    }
}

fn clamp_of(params: &ScalingParams) -> SigmaRange {
    let (left, right) = params.clamp_range();
    SigmaRange::new(left, right)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Suspicious {
        flags: SuspicionFlags,
        /// Written figure, if drawing succeeded.
        plot: Option<PathBuf>,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub var_type: String,
    pub var_name: String,
    /// `None` when the variable has no scaling parameters at all.
    pub cone_type: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Result of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub file_id: String,
    pub var_types: Vec<String>,
    pub entries: Vec<ReportEntry>,
}

impl ValidationReport {
    pub fn n_ok(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Ok))
    }

    pub fn n_suspicious(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Suspicious { .. }))
    }

    pub fn n_skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    pub fn find(&self, var_name: &str, cone_type: &str) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|e| e.var_name == var_name && e.cone_type.as_deref() == Some(cone_type))
    }
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for var_type in &self.var_types {
            write!(f, "\n\n\n  <{var_type}>\n\n")?;
            for entry in self.entries.iter().filter(|e| &e.var_type == var_type) {
                let cone = entry.cone_type.as_deref().unwrap_or("*");
                match &entry.outcome {
                    Outcome::Ok => writeln!(f, "       {}, {cone}: OK", entry.var_name)?,
                    Outcome::Suspicious { flags, .. } => {
                        writeln!(f, "-----> {}, {cone}: looks suspicious", entry.var_name)?;
                        for (name, raised) in flags.iter() {
                            writeln!(f, "           {name}: {}", py_bool(raised))?;
                        }
                        writeln!(f)?;
                    }
                    Outcome::Skipped { reason } => writeln!(f, "[INFO] {reason}")?,
                }
            }
        }
        Ok(())
    }
}

/// Runs the clamping range checks for one quantile file id.
pub struct Validator {
    output_folder: PathBuf,
    file_id: String,
}

impl Validator {
    pub fn new(output_folder: impl Into<PathBuf>, file_id: impl ToString) -> Self {
        Self {
            output_folder: output_folder.into(),
            file_id: file_id.to_string(),
        }
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// One sequential pass over every (var_type, variable, cone).
    ///
    /// Missing records are skipped and logged. Only failing to create the
    /// output directories is an error; a figure that cannot be drawn is logged
    /// and leaves [`Outcome::Suspicious::plot`] empty.
    pub fn run(
        &self,
        cfg: &TrainingConfig,
        scaling: &ScalingStore,
        quantiles: &QuantileStore,
        plotter: &dyn RangePlotter,
    ) -> anyhow::Result<ValidationReport> {
        create_dir(&self.output_folder)?;

        let mut report = ValidationReport {
            file_id: self.file_id.clone(),
            ..Default::default()
        };

        for group in &cfg.groups {
            let var_type = group.var_type.as_str();
            let type_dir = self.output_folder.join(var_type);
            create_dir(&type_dir)?;
            report.var_types.push(var_type.to_string());

            for feature in group.features.iter().filter(|f| f.scaling.is_validated()) {
                let var_name = feature.name.as_str();
                let Some(cones) = scaling.cones(var_type, var_name) else {
                    let reason = format!(
                        "Failed to retrieve scaling parameters for var_name={var_name}: skipping this variable"
                    );
                    tracing::info!(var_type, var_name, "No scaling parameters, skipping");
                    report.entries.push(ReportEntry {
                        var_type: var_type.to_string(),
                        var_name: var_name.to_string(),
                        cone_type: None,
                        outcome: Outcome::Skipped { reason },
                    });
                    continue;
                };

                for (cone_type, params) in cones {
                    let outcome = self.check(
                        var_type,
                        var_name,
                        cone_type,
                        &feature.scaling,
                        params,
                        quantiles,
                        &type_dir,
                        plotter,
                    );
                    report.entries.push(ReportEntry {
                        var_type: var_type.to_string(),
                        var_name: var_name.to_string(),
                        cone_type: Some(cone_type.clone()),
                        outcome,
                    });
                }
            }
        }

        tracing::info!(
            file_id = %self.file_id,
            ok = report.n_ok(),
            suspicious = report.n_suspicious(),
            skipped = report.n_skipped(),
            "Quantile validation complete"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn check(
        &self,
        var_type: &str,
        var_name: &str,
        cone_type: &str,
        scaling_type: &ScalingType,
        params: &ScalingParams,
        quantiles: &QuantileStore,
        type_dir: &Path,
        plotter: &dyn RangePlotter,
    ) -> Outcome {
        let Some(measured) = quantiles.get(var_type, var_name, cone_type, &self.file_id) else {
            tracing::info!(
                var_type,
                var_name,
                cone_type,
                file_id = %self.file_id,
                "No quantile parameters, skipping"
            );
            return Outcome::Skipped {
                reason: format!(
                    "Failed to retrieve quantile parameters for var_name={var_name} and cone_type={cone_type}: skipping this variable"
                ),
            };
        };

        let clamp = clamp_of(params);
        let flags = SuspicionFlags::evaluate(clamp, measured);
        if !flags.is_suspicious() {
            return Outcome::Ok;
        }

        let mean = (*scaling_type != ScalingType::Linear).then_some(params.mean);
        let drawn = RangePlot::new(var_name, cone_type, &self.file_id, mean, clamp, measured)
            .and_then(|plot| plotter.plot(&plot.with_flags(flags.active()), type_dir));
        let plot = match drawn {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(var_type, var_name, cone_type, error = %e, "Failed to draw range plot");
                None
            }
        };
        tracing::debug!(var_type, var_name, cone_type, flags = ?flags.active(), "Suspicious clamping range");
        Outcome::Suspicious { flags, plot }
    }
}

fn create_dir(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}
