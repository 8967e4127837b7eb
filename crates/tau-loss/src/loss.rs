//! Tau identification losses over `[batch, 4]` target/output tensors.
//!
//! All functions are generic over `B: Backend` and return per-example losses
//! of shape `(batch,)`; reduction is left to the training loop.
//! Probabilities are clipped to `[EPSILON, 1 - EPSILON]` before any logarithm.
//!
//! Naming follows the loss families:
//! - `binary_*` / `tau_vs_*`: genuine-vs-fake binary cross-entropy (Lbase).
//! - `entropy_*`: single-column cross-entropy (Hbase).
//! - `gated_entropy_*`: cross-entropy gated by the tau-probability decay (Hcat).
//! - `focal_*`: focal loss (Fbase).

use burn::prelude::*;
use burn::tensor::activation::tanh;

use crate::classes::TauClass;
use crate::error::LossError;
use crate::scale::ScaleFactors;

/// Clipping bound applied to probabilities before taking a logarithm.
pub const EPSILON: f64 = 1e-7;

/// Tau-probability threshold once used to merge discriminant scores.
pub const MERGE_THRESHOLD: f64 = 0.1;

/// Steepness of the tanh gate in [`tau_decay`].
pub const DECAY_SLOPE: f64 = 70.0;

/// Tau probability at which the tanh gate is half open.
pub const DECAY_THRESHOLD: f64 = 0.1;

/// Normalization of the per-foe focal terms (Fe, Fmu, Fjet).
pub const FOCAL_FOE_FACTOR: f64 = 1.63636;

/// Normalization of the combined focal term (Fcmb).
pub const FOCAL_COMBINED_FACTOR: f64 = 1.17153;

/// Weight of the per-foe focal terms in [`tau_crossentropy_v2`].
pub const F_FACTOR: f64 = 5.0;

/// Focusing parameter of the per-foe focal terms.
const FOCAL_FOE_GAMMA: f64 = 2.0;

/// Focusing parameter of the combined focal term.
const FOCAL_COMBINED_GAMMA: f64 = 0.5;

fn column<B: Backend>(tensor: &Tensor<B, 2>, class: TauClass) -> Tensor<B, 1> {
    let [batch, _] = tensor.dims();
    let index = class.index();
    tensor
        .clone()
        .slice([0..batch, index..index + 1])
        .squeeze::<1>(1)
}

fn clip<B: Backend>(x: Tensor<B, 1>) -> Tensor<B, 1> {
    x.clamp(EPSILON, 1.0 - EPSILON)
}

fn complement<B: Backend>(x: Tensor<B, 1>) -> Tensor<B, 1> {
    x.neg().add_scalar(1.0)
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Smooth region-of-relevance gate `(tanh(70 * (p_tau - 0.1)) + 1) / 2`.
///
/// Close to 0 for non-tau-like predictions and close to 1 once the tau
/// probability passes ~0.1.
pub fn tau_decay<B: Backend>(output: &Tensor<B, 2>) -> Tensor<B, 1> {
    let p_tau = column(output, TauClass::Tau);
    tanh(p_tau.sub_scalar(DECAY_THRESHOLD).mul_scalar(DECAY_SLOPE))
        .add_scalar(1.0)
        .div_scalar(2.0)
}

/// Binary cross-entropy between a genuine and a fake class (Lbase).
///
/// The genuine probability is renormalized against the fake one,
/// `p = out[g] / (out[g] + out[f] + eps)`, so the loss only measures
/// separability of the pair.
pub fn binary_base<B: Backend>(
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
    genuine: TauClass,
    fake: TauClass,
) -> Tensor<B, 1> {
    let out_genuine = column(&output, genuine);
    let out_fake = column(&output, fake);
    let ratio = out_genuine.clone() / (out_genuine + out_fake).add_scalar(EPSILON);
    let ratio = clip(ratio);

    let genuine_term = column(&target, genuine) * ratio.clone().log();
    let fake_term = column(&target, fake) * complement(ratio).log();
    genuine_term.neg() - fake_term
}

/// Cross-entropy on a single class column (Hbase).
///
/// With `inverse` the label is flipped: `-(1 - t) * log(1 - x)`.
pub fn entropy_base<B: Backend>(
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
    class: TauClass,
    inverse: bool,
) -> Tensor<B, 1> {
    let x = clip(column(&output, class));
    let t = column(&target, class);
    if inverse {
        (complement(t) * complement(x).log()).neg()
    } else {
        (t * x.log()).neg()
    }
}

/// Cross-entropy on `class` multiplied by the tau decay gate (Hcat_base).
///
/// With `inverse` the complement of the gate is used instead.
pub fn gated_entropy_base<B: Backend>(
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
    class: TauClass,
    inverse: bool,
) -> Tensor<B, 1> {
    let decay = tau_decay(&output);
    let decay = if inverse { complement(decay) } else { decay };
    decay * entropy_base(target, output, class, false)
}

/// Focal loss on a single class column (Fbase).
///
/// `-(1 - x)^gamma * t * log(x)`, or `-x^gamma * (1 - t) * log(1 - x)` when
/// `inverse`, optionally multiplied by the tau decay gate.
///
/// # Errors
/// [`LossError::NonPositiveGamma`] when `gamma <= 0` (or NaN).
pub fn focal_base<B: Backend>(
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
    class: TauClass,
    gamma: f64,
    apply_decay: bool,
    inverse: bool,
) -> Result<Tensor<B, 1>, LossError> {
    if gamma.is_nan() || gamma <= 0.0 {
        return Err(LossError::NonPositiveGamma(gamma));
    }
    Ok(focal_unchecked(target, output, class, gamma, apply_decay, inverse))
}

fn focal_unchecked<B: Backend>(
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
    class: TauClass,
    gamma: f64,
    apply_decay: bool,
    inverse: bool,
) -> Tensor<B, 1> {
    let x = clip(column(&output, class));
    let t = column(&target, class);
    let loss = if inverse {
        complement(t) * x.clone().powf_scalar(gamma) * complement(x).log()
    } else {
        t * complement(x.clone()).powf_scalar(gamma) * x.log()
    };
    let loss = loss.neg();
    if apply_decay {
        tau_decay(&output) * loss
    } else {
        loss
    }
}

// ---------------------------------------------------------------------------
// Named losses
// ---------------------------------------------------------------------------

/// Tau vs electron separability (Le).
pub fn tau_vs_e<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    binary_base(target, output, TauClass::Tau, TauClass::Electron)
}

/// Tau vs muon separability (Lmu).
pub fn tau_vs_mu<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    binary_base(target, output, TauClass::Tau, TauClass::Muon)
}

/// Tau vs jet separability (Ljet).
pub fn tau_vs_jet<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    binary_base(target, output, TauClass::Tau, TauClass::Jet)
}

/// [`tau_vs_e`] weighted by the electron scale factor (sLe).
pub fn scaled_tau_vs_e<B: Backend>(
    sf: &ScaleFactors,
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
) -> Tensor<B, 1> {
    tau_vs_e(target, output).mul_scalar(sf.e())
}

/// [`tau_vs_mu`] weighted by the muon scale factor (sLmu).
pub fn scaled_tau_vs_mu<B: Backend>(
    sf: &ScaleFactors,
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
) -> Tensor<B, 1> {
    tau_vs_mu(target, output).mul_scalar(sf.mu())
}

/// [`tau_vs_jet`] weighted by the jet scale factor (sLjet).
pub fn scaled_tau_vs_jet<B: Backend>(
    sf: &ScaleFactors,
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
) -> Tensor<B, 1> {
    tau_vs_jet(target, output).mul_scalar(sf.jet())
}

/// Cross-entropy on the electron column (He).
pub fn entropy_e<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    entropy_base(target, output, TauClass::Electron, false)
}

/// Cross-entropy on the muon column (Hmu).
pub fn entropy_mu<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    entropy_base(target, output, TauClass::Muon, false)
}

/// Cross-entropy on the tau column (Htau).
pub fn entropy_tau<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    entropy_base(target, output, TauClass::Tau, false)
}

/// Cross-entropy on the jet column (Hjet).
pub fn entropy_jet<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    entropy_base(target, output, TauClass::Jet, false)
}

/// Label-flipped tau cross-entropy (Hbin).
pub fn binary_entropy_tau<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    entropy_base(target, output, TauClass::Tau, true)
}

/// Electron cross-entropy weighted by the tau decay gate (Hcat_e).
pub fn gated_entropy_e<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    gated_entropy_base(target, output, TauClass::Electron, false)
}

/// Muon cross-entropy weighted by the tau decay gate (Hcat_mu).
pub fn gated_entropy_mu<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    gated_entropy_base(target, output, TauClass::Muon, false)
}

/// Jet cross-entropy weighted by the tau decay gate (Hcat_jet).
pub fn gated_entropy_jet<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    gated_entropy_base(target, output, TauClass::Jet, false)
}

/// Electron cross-entropy weighted by the complement of the gate (Hcat_eInv).
pub fn gated_entropy_e_inv<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    gated_entropy_base(target, output, TauClass::Electron, true)
}

/// Muon cross-entropy weighted by the complement of the gate (Hcat_muInv).
pub fn gated_entropy_mu_inv<B: Backend>(
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
) -> Tensor<B, 1> {
    gated_entropy_base(target, output, TauClass::Muon, true)
}

/// Jet cross-entropy weighted by the complement of the gate (Hcat_jetInv).
pub fn gated_entropy_jet_inv<B: Backend>(
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
) -> Tensor<B, 1> {
    gated_entropy_base(target, output, TauClass::Jet, true)
}

/// Gated focal loss on the electron column (Fe).
pub fn focal_e<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    focal_unchecked(target, output, TauClass::Electron, FOCAL_FOE_GAMMA, true, false)
        .mul_scalar(FOCAL_FOE_FACTOR)
}

/// Gated focal loss on the muon column (Fmu).
pub fn focal_mu<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    focal_unchecked(target, output, TauClass::Muon, FOCAL_FOE_GAMMA, true, false)
        .mul_scalar(FOCAL_FOE_FACTOR)
}

/// Gated focal loss on the jet column (Fjet).
pub fn focal_jet<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    focal_unchecked(target, output, TauClass::Jet, FOCAL_FOE_GAMMA, true, false)
        .mul_scalar(FOCAL_FOE_FACTOR)
}

/// Inverse focal loss on the tau column, i.e. "not tau" for all foes combined (Fcmb).
pub fn focal_combined<B: Backend>(target: Tensor<B, 2>, output: Tensor<B, 2>) -> Tensor<B, 1> {
    focal_unchecked(target, output, TauClass::Tau, FOCAL_COMBINED_GAMMA, false, true)
        .mul_scalar(FOCAL_COMBINED_FACTOR)
}

// ---------------------------------------------------------------------------
// Training losses
// ---------------------------------------------------------------------------

/// Sum of the three scaled separability losses.
pub fn tau_crossentropy<B: Backend>(
    sf: &ScaleFactors,
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
) -> Tensor<B, 1> {
    scaled_tau_vs_e(sf, target.clone(), output.clone())
        + scaled_tau_vs_mu(sf, target.clone(), output.clone())
        + scaled_tau_vs_jet(sf, target, output)
}

/// Production training loss.
///
/// ```text
/// sf_tau * Htau + (sf_e + sf_mu + sf_jet) * Fcmb
///   + 5 * (sf_e * Fe + sf_mu * Fmu + sf_jet * Fjet)
/// ```
pub fn tau_crossentropy_v2<B: Backend>(
    sf: &ScaleFactors,
    target: Tensor<B, 2>,
    output: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let h_tau = entropy_tau(target.clone(), output.clone()).mul_scalar(sf.tau());
    let f_cmb =
        focal_combined(target.clone(), output.clone()).mul_scalar(sf.e() + sf.mu() + sf.jet());
    let foes = focal_e(target.clone(), output.clone()).mul_scalar(sf.e())
        + focal_mu(target.clone(), output.clone()).mul_scalar(sf.mu())
        + focal_jet(target, output).mul_scalar(sf.jet());
    h_tau + f_cmb + foes.mul_scalar(F_FACTOR)
}
