//! Training configuration: the `Features_all` section listing every input
//! variable and the scaling applied to it.
//!
//! ```yaml
//! Features_all:
//!   TauFlat:
//!     - tau_pt: [false, true, linear]
//!     - tau_eta: [false, true, normal]
//!   PfCand_ele:
//!     - pfCand_ele_valid: [false, false, categorical]
//! ```
//!
//! Each variable is a single-key mapping whose value is a list; the third
//! entry names the scaling type. Variable types and variables keep file order.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde_yaml_ng::{Mapping, Value};

const FEATURES_KEY: &str = "Features_all";
const SCALING_TYPE_INDEX: usize = 2;

/// Errors raised while interpreting a training configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Training config has no '{0}' section")]
    MissingSection(&'static str),

    #[error("Malformed training config: {0}")]
    Malformed(String),

    #[error("Variable entry under '{var_type}' must have exactly one key, found {keys}")]
    VariableKeys { var_type: String, keys: usize },

    #[error("Variable '{var_name}' under '{var_type}' lists {len} entries, expected at least 3")]
    ShortEntry {
        var_type: String,
        var_name: String,
        len: usize,
    },

    #[error("Variable '{var_name}' under '{var_type}' has a non-string scaling type")]
    ScalingType { var_type: String, var_name: String },

    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// How a training input variable is standardized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalingType {
    NoScaling,
    Categorical,
    Linear,
    Normal,
    Other(String),
}

impl ScalingType {
    pub fn parse(s: &str) -> Self {
        match s {
            "no_scaling" => Self::NoScaling,
            "categorical" => Self::Categorical,
            "linear" => Self::Linear,
            "normal" => Self::Normal,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NoScaling => "no_scaling",
            Self::Categorical => "categorical",
            Self::Linear => "linear",
            Self::Normal => "normal",
            Self::Other(s) => s,
        }
    }

    /// Whether clamping ranges of this scaling are worth checking.
    pub fn is_validated(&self) -> bool {
        !matches!(self, Self::NoScaling | Self::Categorical)
    }
}

impl fmt::Display for ScalingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: String,
    pub scaling: ScalingType,
}

/// Variables of one type (one particle collection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableGroup {
    pub var_type: String,
    pub features: Vec<FeatureSpec>,
}

/// The parts of the training configuration the validator needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingConfig {
    pub groups: Vec<VariableGroup>,
}

impl TrainingConfig {
    /// Load from a YAML file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read training config {}", path.display()))?;
        let cfg = Self::from_str(&contents)
            .with_context(|| format!("Failed to parse training config {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            var_types = cfg.groups.len(),
            features = cfg.groups.iter().map(|g| g.features.len()).sum::<usize>(),
            "Loaded training config"
        );
        Ok(cfg)
    }

    /// Parse a YAML document.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_yaml_ng::from_str(contents)?;
        let features = root
            .get(FEATURES_KEY)
            .ok_or(ConfigError::MissingSection(FEATURES_KEY))?;
        let features = features
            .as_mapping()
            .ok_or_else(|| ConfigError::Malformed(format!("'{FEATURES_KEY}' must be a mapping")))?;

        let groups = features
            .iter()
            .map(|(key, value)| parse_group(key, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub fn group(&self, var_type: &str) -> Option<&VariableGroup> {
        self.groups.iter().find(|g| g.var_type == var_type)
    }
}

fn parse_group(key: &Value, value: &Value) -> Result<VariableGroup, ConfigError> {
    let var_type = key
        .as_str()
        .ok_or_else(|| ConfigError::Malformed(format!("variable type {key:?} is not a string")))?
        .to_string();
    let entries = match value {
        Value::Sequence(entries) => entries.as_slice(),
        Value::Null => &[],
        _ => {
            return Err(ConfigError::Malformed(format!(
                "variables of '{var_type}' must be a list"
            )))
        }
    };

    let features = entries
        .iter()
        .map(|entry| {
            let mapping = entry.as_mapping().ok_or_else(|| {
                ConfigError::Malformed(format!("entry under '{var_type}' is not a mapping"))
            })?;
            parse_feature(&var_type, mapping)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(VariableGroup { var_type, features })
}

fn parse_feature(var_type: &str, mapping: &Mapping) -> Result<FeatureSpec, ConfigError> {
    if mapping.len() != 1 {
        return Err(ConfigError::VariableKeys {
            var_type: var_type.to_string(),
            keys: mapping.len(),
        });
    }
    let Some((key, value)) = mapping.iter().next() else {
        return Err(ConfigError::VariableKeys {
            var_type: var_type.to_string(),
            keys: 0,
        });
    };
    let name = key
        .as_str()
        .ok_or_else(|| ConfigError::Malformed(format!("variable name {key:?} is not a string")))?
        .to_string();

    let list = value.as_sequence().map(Vec::as_slice).unwrap_or_default();
    if list.len() <= SCALING_TYPE_INDEX {
        return Err(ConfigError::ShortEntry {
            var_type: var_type.to_string(),
            var_name: name,
            len: list.len(),
        });
    }
    let scaling = list[SCALING_TYPE_INDEX]
        .as_str()
        .map(ScalingType::parse)
        .ok_or_else(|| ConfigError::ScalingType {
            var_type: var_type.to_string(),
            var_name: name.clone(),
        })?;

    Ok(FeatureSpec { name, scaling })
}
