//! Scaling and quantile records and the stores that hold them.
//!
//! Both stores are nested maps serialized as JSON (read through the YAML
//! parser, so YAML files work too):
//! - scaling: `var_type -> var_name -> cone_type -> ScalingParams`
//! - quantiles: `var_type -> var_name -> cone_type -> file_id -> QuantileParams`

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};

/// A number that may be written as a string (`"inf"`, `"-inf"`, `"nan"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match LenientNumber::deserialize(deserializer)? {
        LenientNumber::Number(v) => Ok(v),
        LenientNumber::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got '{s}'"))),
    }
}

/// Standardization parameters of one variable in one cone.
///
/// Values are clamped to `[mean + lim_min * std, mean + lim_max * std]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingParams {
    #[serde(deserialize_with = "lenient_f64")]
    pub mean: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub std: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub lim_min: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub lim_max: f64,
}

impl ScalingParams {
    /// Clamping range in the variable's original units.
    pub fn clamp_range(&self) -> (f64, f64) {
        (
            self.mean + self.lim_min * self.std,
            self.mean + self.lim_max * self.std,
        )
    }
}

/// Empirical `[left, right]` quantile interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaRange {
    #[serde(deserialize_with = "lenient_f64")]
    pub left: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub right: f64,
}

impl SigmaRange {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// The interval collapsed to a single point.
    pub fn is_empty(&self) -> bool {
        self.left == self.right
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.left, self.right)
    }
}

/// Quantiles of one variable in one cone measured on one input file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileParams {
    #[serde(deserialize_with = "lenient_f64")]
    pub median: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub min: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub max: f64,
    #[serde(rename = "1sigma")]
    pub one_sigma: SigmaRange,
    #[serde(rename = "2sigma")]
    pub two_sigma: SigmaRange,
    #[serde(rename = "3sigma")]
    pub three_sigma: SigmaRange,
    #[serde(rename = "5sigma")]
    pub five_sigma: SigmaRange,
}

type ByCone<T> = BTreeMap<String, T>;
type ByVariable<T> = BTreeMap<String, ByCone<T>>;

fn read_structured<T: for<'de> Deserialize<'de>>(path: &Path, what: &str) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file {}", path.display()))?;
    let parsed = serde_yaml_ng::from_str(&contents)
        .with_context(|| format!("Failed to parse {what} file {}", path.display()))?;
    Ok(parsed)
}

/// Scaling parameters of every variable type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScalingStore {
    types: BTreeMap<String, ByVariable<ScalingParams>>,
}

impl ScalingStore {
    /// Load from a JSON or YAML file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let store: Self = read_structured(path, "scaling")?;
        tracing::info!(path = %path.display(), var_types = store.types.len(), "Loaded scaling parameters");
        Ok(store)
    }

    /// Parse from a JSON or YAML string.
    pub fn from_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml_ng::from_str(contents)?)
    }

    pub fn insert(&mut self, var_type: &str, var_name: &str, cone_type: &str, params: ScalingParams) {
        self.types
            .entry(var_type.to_string())
            .or_default()
            .entry(var_name.to_string())
            .or_default()
            .insert(cone_type.to_string(), params);
    }

    /// All cones with scaling parameters for a variable, in key order.
    pub fn cones(&self, var_type: &str, var_name: &str) -> Option<&BTreeMap<String, ScalingParams>> {
        self.types.get(var_type)?.get(var_name)
    }

    pub fn get(&self, var_type: &str, var_name: &str, cone_type: &str) -> Option<&ScalingParams> {
        self.cones(var_type, var_name)?.get(cone_type)
    }
}

/// Quantile measurements of every variable type, per input file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuantileStore {
    types: BTreeMap<String, ByVariable<BTreeMap<String, QuantileParams>>>,
}

impl QuantileStore {
    /// Load from a JSON or YAML file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let store: Self = read_structured(path, "quantile")?;
        tracing::info!(path = %path.display(), var_types = store.types.len(), "Loaded quantile parameters");
        Ok(store)
    }

    /// Parse from a JSON or YAML string.
    pub fn from_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml_ng::from_str(contents)?)
    }

    pub fn insert(
        &mut self,
        var_type: &str,
        var_name: &str,
        cone_type: &str,
        file_id: &str,
        params: QuantileParams,
    ) {
        self.types
            .entry(var_type.to_string())
            .or_default()
            .entry(var_name.to_string())
            .or_default()
            .entry(cone_type.to_string())
            .or_default()
            .insert(file_id.to_string(), params);
    }

    pub fn get(
        &self,
        var_type: &str,
        var_name: &str,
        cone_type: &str,
        file_id: &str,
    ) -> Option<&QuantileParams> {
        self.types
            .get(var_type)?
            .get(var_name)?
            .get(cone_type)?
            .get(file_id)
    }
}
