//! Saving and reloading a trained discriminator together with its losses.
//!
//! A checkpoint directory holds:
//! - `model.mpk`: network weights (burn named MessagePack, full precision)
//! - `meta.json`: [`ModelMeta`], the network config plus the loss and metric
//!   names and the scale factors in effect when training stopped
//!
//! Loading with a [`LossRegistry`] "compiles" the model: every stored name is
//! resolved to a function, and an unknown name is an error.

use std::path::Path;

use anyhow::Context;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use crate::model::{TauDiscriminator, TauDiscriminatorConfig};
use crate::registry::{LossFn, LossRegistry};
use crate::scale::ScaleFactors;

const MODEL_FILE: &str = "model";
const META_FILE: &str = "meta.json";

/// Metadata saved alongside the model weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Network configuration used to rebuild the module before loading weights.
    pub model: TauDiscriminatorConfig,
    /// Serialized name of the training loss.
    pub loss: String,
    /// Serialized names of the losses tracked as metrics.
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Scale factors in effect at save time.
    #[serde(default)]
    pub scale_factors: ScaleFactors,
}

/// Training loss and metrics resolved through a [`LossRegistry`].
pub struct CompiledLoss<B: Backend> {
    loss_name: String,
    loss_fn: LossFn<B>,
    metrics: Vec<(String, LossFn<B>)>,
    scale_factors: ScaleFactors,
}

impl<B: Backend> CompiledLoss<B> {
    /// Resolve the loss and every metric named in `meta`.
    pub fn resolve(meta: &ModelMeta, registry: &LossRegistry<B>) -> anyhow::Result<Self> {
        let loss_fn = registry
            .get(&meta.loss)
            .with_context(|| format!("Cannot resolve training loss '{}'", meta.loss))?;
        let metrics = meta
            .metrics
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .map(|f| (name.clone(), f))
                    .with_context(|| format!("Cannot resolve metric '{name}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            loss_name: meta.loss.clone(),
            loss_fn,
            metrics,
            scale_factors: meta.scale_factors,
        })
    }

    pub fn loss_name(&self) -> &str {
        &self.loss_name
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|(name, _)| name.as_str())
    }

    pub fn scale_factors(&self) -> &ScaleFactors {
        &self.scale_factors
    }

    /// Per-example training loss, shape `(batch,)`.
    pub fn loss(&self, target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
        (self.loss_fn)(&self.scale_factors, target, output)
    }

    /// Per-example value of every metric, in stored order.
    pub fn metrics(&self, target: Tensor<B, 2>, output: Tensor<B, 2>) -> Vec<(&str, Tensor<B, 1>)> {
        self.metrics
            .iter()
            .map(|(name, f)| {
                (
                    name.as_str(),
                    f(&self.scale_factors, target.clone(), output.clone()),
                )
            })
            .collect()
    }
}

/// A reloaded discriminator.
pub struct LoadedModel<B: Backend> {
    pub model: TauDiscriminator<B>,
    pub meta: ModelMeta,
    /// Present when loaded with a registry.
    pub compiled: Option<CompiledLoss<B>>,
}

/// Save model weights and metadata into `dir`, creating it if needed.
pub fn save_model<B: Backend>(
    dir: &Path,
    model: &TauDiscriminator<B>,
    meta: &ModelMeta,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create checkpoint dir {}", dir.display()))?;

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(dir.join(MODEL_FILE), &recorder)
        .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {e}", dir.display()))?;

    let meta_path = dir.join(META_FILE);
    let file = std::fs::File::create(&meta_path)
        .with_context(|| format!("Failed to create {}", meta_path.display()))?;
    serde_json::to_writer_pretty(file, meta)
        .with_context(|| format!("Failed to write {}", meta_path.display()))?;

    tracing::info!(
        dir = %dir.display(),
        loss = %meta.loss,
        metrics = meta.metrics.len(),
        "Checkpoint saved (model + meta)"
    );
    Ok(())
}

/// Read only the metadata of a checkpoint.
pub fn load_meta(dir: &Path) -> anyhow::Result<ModelMeta> {
    let meta_path = dir.join(META_FILE);
    let file = std::fs::File::open(&meta_path)
        .with_context(|| format!("Failed to open {}", meta_path.display()))?;
    let meta = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", meta_path.display()))?;
    Ok(meta)
}

/// Load a checkpoint written by [`save_model`].
///
/// With `registry = Some(..)` the loss and metric names are resolved and
/// returned as [`LoadedModel::compiled`]; with `None` only the network is
/// restored.
pub fn load_model<B: Backend>(
    dir: &Path,
    registry: Option<&LossRegistry<B>>,
    device: &B::Device,
) -> anyhow::Result<LoadedModel<B>> {
    let meta = load_meta(dir)?;

    let model = meta
        .model
        .init::<B>(device)
        .load_file(
            dir.join(MODEL_FILE),
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint from {}: {e}", dir.display()))?;

    let compiled = registry
        .map(|registry| CompiledLoss::resolve(&meta, registry))
        .transpose()?;

    tracing::info!(
        dir = %dir.display(),
        loss = %meta.loss,
        compiled = compiled.is_some(),
        "Loaded checkpoint"
    );
    Ok(LoadedModel {
        model,
        meta,
        compiled,
    })
}
