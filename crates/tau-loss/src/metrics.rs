//! Discriminant scoring and weighted accuracy metrics.

use burn::prelude::*;

/// Genuine-vs-background discriminant `p_tau / (p_tau + p_other)`.
///
/// Returns 0 unless `prob_tau > 0`, so a sample with no tau probability (or a
/// NaN one) never divides by zero.
pub fn tau_vs_other(prob_tau: f64, prob_other: f64) -> f64 {
    if prob_tau > 0.0 {
        prob_tau / (prob_tau + prob_other)
    } else {
        0.0
    }
}

/// Element-wise [`tau_vs_other`] over plain slices.
///
/// # Panics
/// Panics if the slices have different lengths.
pub fn tau_vs_other_slice(prob_tau: &[f64], prob_other: &[f64]) -> Vec<f64> {
    assert_eq!(
        prob_tau.len(),
        prob_other.len(),
        "prob_tau has length {}, prob_other has length {}",
        prob_tau.len(),
        prob_other.len()
    );
    prob_tau
        .iter()
        .zip(prob_other)
        .map(|(&t, &o)| tau_vs_other(t, o))
        .collect()
}

/// Element-wise [`tau_vs_other`] over burn tensors.
pub fn tau_vs_other_tensor<B: Backend, const D: usize>(
    prob_tau: Tensor<B, D>,
    prob_other: Tensor<B, D>,
) -> Tensor<B, D> {
    let no_tau = prob_tau.clone().greater_elem(0.0).bool_not();
    let ratio = prob_tau.clone() / (prob_tau + prob_other);
    ratio.mask_fill(no_tau, 0.0)
}

/// Weighted recall for one side of a 0.5 threshold.
///
/// With `selected == 1` the positive side is used (`target > 0.5`,
/// `output > 0.5`); any other value selects the negative side (`< 0.5`).
/// Returns `sum(w | target and output selected) / sum(w | target selected)`
/// as a shape `(1,)` tensor.
///
/// The division is not guarded: when no example is selected the result is
/// NaN, which signals "no data for this class" to the caller.
pub fn binary<B: Backend, const D: usize>(
    target: Tensor<B, D>,
    output: Tensor<B, D>,
    weights: Tensor<B, D>,
    selected: i64,
) -> Tensor<B, 1> {
    let (cmp_target, cmp_output) = if selected == 1 {
        (target.greater_elem(0.5), output.greater_elem(0.5))
    } else {
        (target.lower_elem(0.5), output.lower_elem(0.5))
    };

    let w_all = weights.mask_fill(cmp_target.bool_not(), 0.0);
    let w_correct = w_all.clone().mask_fill(cmp_output.bool_not(), 0.0);
    w_correct.sum() / w_all.sum()
}

/// Indicator of negative labels: 1.0 where `target < 0.5`, else 0.0.
pub fn binary_negative<B: Backend, const D: usize>(
    target: Tensor<B, D>,
    _output: Tensor<B, D>,
) -> Tensor<B, D> {
    target.lower_elem(0.5).float()
}
