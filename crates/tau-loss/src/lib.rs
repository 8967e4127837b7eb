//! Losses and metrics for the multi-class tau identification discriminator.
//!
//! Every tensor indexed along the class axis follows the fixed
//! `e, mu, tau, jet` order defined in [`classes`]. Loss functions are free
//! functions over burn tensors; the only training-time state they read is a
//! caller-owned [`ScaleFactors`] value.

pub mod checkpoint;
pub mod classes;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod scale;

pub use checkpoint::{load_model, save_model, CompiledLoss, LoadedModel, ModelMeta};
pub use classes::{TauClass, NUM_CLASSES};
pub use error::LossError;
pub use metrics::{binary, binary_negative, tau_vs_other, tau_vs_other_slice, tau_vs_other_tensor};
pub use model::{TauDiscriminator, TauDiscriminatorConfig};
pub use registry::{LossFn, LossRegistry};
pub use scale::ScaleFactors;
