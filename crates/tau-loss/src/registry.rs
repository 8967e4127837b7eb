//! Name → loss function registry used when reloading a trained model.
//!
//! Checkpoint metadata stores loss and metric names as strings. The registry
//! is built once and passed explicitly to [`load_model`](crate::checkpoint::load_model),
//! which resolves every stored name back to the function used in training.

use std::collections::HashMap;

use burn::prelude::*;

use crate::error::LossError;
use crate::loss;
use crate::scale::ScaleFactors;

/// Uniform signature of every registered loss.
///
/// Losses that do not depend on scale factors ignore the first argument.
pub type LossFn<B> = fn(&ScaleFactors, Tensor<B, 2>, Tensor<B, 2>) -> Tensor<B, 1>;

/// Registry of loss functions keyed by their serialized name.
pub struct LossRegistry<B: Backend> {
    entries: HashMap<String, LossFn<B>>,
}

impl<B: Backend> Default for LossRegistry<B> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<B: Backend> LossRegistry<B> {
    /// Create a registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry with every loss known to the tau training pipeline.
    ///
    /// `HbinInv` resolves to the same function as `Hbin`; models trained
    /// under that name were trained with the label-flipped tau entropy.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("tau_crossentropy", loss::tau_crossentropy::<B>);
        registry.register("tau_crossentropy_v2", loss::tau_crossentropy_v2::<B>);
        registry.register("Le", |_, t, o| loss::tau_vs_e(t, o));
        registry.register("Lmu", |_, t, o| loss::tau_vs_mu(t, o));
        registry.register("Ljet", |_, t, o| loss::tau_vs_jet(t, o));
        registry.register("sLe", loss::scaled_tau_vs_e::<B>);
        registry.register("sLmu", loss::scaled_tau_vs_mu::<B>);
        registry.register("sLjet", loss::scaled_tau_vs_jet::<B>);
        registry.register("He", |_, t, o| loss::entropy_e(t, o));
        registry.register("Hmu", |_, t, o| loss::entropy_mu(t, o));
        registry.register("Htau", |_, t, o| loss::entropy_tau(t, o));
        registry.register("Hjet", |_, t, o| loss::entropy_jet(t, o));
        registry.register("Hcat_e", |_, t, o| loss::gated_entropy_e(t, o));
        registry.register("Hcat_mu", |_, t, o| loss::gated_entropy_mu(t, o));
        registry.register("Hcat_jet", |_, t, o| loss::gated_entropy_jet(t, o));
        registry.register("Hcat_eInv", |_, t, o| loss::gated_entropy_e_inv(t, o));
        registry.register("Hcat_muInv", |_, t, o| loss::gated_entropy_mu_inv(t, o));
        registry.register("Hcat_jetInv", |_, t, o| loss::gated_entropy_jet_inv(t, o));
        registry.register("Hbin", |_, t, o| loss::binary_entropy_tau(t, o));
        registry.register("HbinInv", |_, t, o| loss::binary_entropy_tau(t, o));
        registry.register("Fe", |_, t, o| loss::focal_e(t, o));
        registry.register("Fmu", |_, t, o| loss::focal_mu(t, o));
        registry.register("Fjet", |_, t, o| loss::focal_jet(t, o));
        registry.register("Fcmb", |_, t, o| loss::focal_combined(t, o));
        registry
    }

    /// Add or replace an entry.
    pub fn register(&mut self, name: &str, loss_fn: LossFn<B>) {
        if self.entries.insert(name.to_string(), loss_fn).is_some() {
            tracing::debug!(name, "Replaced registered loss");
        }
    }

    /// Resolve a serialized name.
    pub fn get(&self, name: &str) -> Result<LossFn<B>, LossError> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| LossError::UnknownFunction(name.to_string()))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
