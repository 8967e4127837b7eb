//! Validation of input-variable scaling against measured quantiles.
//!
//! - [`quantile`]: weighted empirical quantiles used to build quantile records
//! - [`records`]: scaling and quantile stores (JSON/YAML)
//! - [`config`]: the `Features_all` section of a training config
//! - [`validator`]: clamping range checks producing a [`ValidationReport`]
//! - [`plot`]: diagnostic range figures rendered to PNG

pub mod config;
pub mod mocks;
pub mod plot;
pub mod quantile;
pub mod records;
pub mod validator;

pub use config::{ConfigError, FeatureSpec, ScalingType, TrainingConfig, VariableGroup};
pub use plot::{PlotError, PlotLayout, PngPlotter, RangePlot, RangePlotter};
pub use quantile::{quantile_ex, QuantileError};
pub use records::{QuantileParams, QuantileStore, ScalingParams, ScalingStore, SigmaRange};
pub use validator::{Outcome, ReportEntry, SuspicionFlags, ValidationReport, Validator};
