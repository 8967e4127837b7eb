//! Discriminator network producing per-class probabilities.

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;

use crate::classes::NUM_CLASSES;

/// Configuration for the [`TauDiscriminator`] MLP.
///
/// ```text
/// (batch, n_features)
///   → Linear(n_features→d_hidden1) → ReLU → Dropout
///   → Linear(d_hidden1→d_hidden2) → ReLU → Dropout
///   → Linear(d_hidden2→4) → softmax
///   → probabilities: (batch, 4) in e, mu, tau, jet order
/// ```
#[derive(Config, Debug)]
pub struct TauDiscriminatorConfig {
    /// Number of input features per candidate.
    pub n_features: usize,
    /// First hidden layer dimension.
    #[config(default = 128)]
    pub d_hidden1: usize,
    /// Second hidden layer dimension.
    #[config(default = 64)]
    pub d_hidden2: usize,
    /// Dropout probability applied after each activation.
    #[config(default = 0.1)]
    pub dropout: f64,
}

/// Four-class tau discriminator.
#[derive(Module, Debug)]
pub struct TauDiscriminator<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
    head: Linear<B>,
    dropout1: Dropout,
    dropout2: Dropout,
    activation: Relu,
}

impl TauDiscriminatorConfig {
    /// Initialize a discriminator with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TauDiscriminator<B> {
        TauDiscriminator {
            linear1: LinearConfig::new(self.n_features, self.d_hidden1).init(device),
            linear2: LinearConfig::new(self.d_hidden1, self.d_hidden2).init(device),
            head: LinearConfig::new(self.d_hidden2, NUM_CLASSES).init(device),
            dropout1: DropoutConfig::new(self.dropout).init(),
            dropout2: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> TauDiscriminator<B> {
    /// Forward pass.
    ///
    /// Input shape: `(batch, n_features)`
    /// Output shape: `(batch, 4)`, each row a probability vector.
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear1.forward(features);
        let x = self.activation.forward(x);
        let x = self.dropout1.forward(x);

        let x = self.linear2.forward(x);
        let x = self.activation.forward(x);
        let x = self.dropout2.forward(x);

        softmax(self.head.forward(x), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = TauDiscriminatorConfig::new(16).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 2>::random([8, 16], Distribution::Normal(0.0, 1.0), &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [8, NUM_CLASSES]);
    }

    #[test]
    fn test_rows_are_probabilities() {
        let device = Default::default();
        let model = TauDiscriminatorConfig::new(5)
            .with_d_hidden1(8)
            .with_d_hidden2(4)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 2>::random([6, 5], Distribution::Normal(0.0, 2.0), &device);
        let output = model.forward(input);

        let values: Vec<f32> = output.clone().into_data().to_vec().unwrap();
        assert!(values.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let row_sums: Vec<f32> = output.sum_dim(1).into_data().to_vec().unwrap();
        for s in row_sums {
            assert!((s - 1.0).abs() < 1e-5, "row sum {s} should be 1");
        }
    }
}
