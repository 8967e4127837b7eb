//! Per-class loss weights.
//!
//! Replaces process-wide mutable weights with a value the training loop owns
//! and passes to every scaled loss. Set it between training steps; the loss
//! functions only read it.

use serde::{Deserialize, Serialize};

use crate::classes::{TauClass, NUM_CLASSES};
use crate::error::LossError;

/// Per-class scale factors, normalized so that `e + mu + tau + jet == 4`.
///
/// Stored factors are normalized again on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScaleFactors")]
pub struct ScaleFactors {
    e: f64,
    mu: f64,
    tau: f64,
    jet: f64,
}

#[derive(Deserialize)]
struct RawScaleFactors {
    e: f64,
    mu: f64,
    tau: f64,
    jet: f64,
}

impl TryFrom<RawScaleFactors> for ScaleFactors {
    type Error = LossError;

    fn try_from(raw: RawScaleFactors) -> Result<Self, Self::Error> {
        Self::new(raw.e, raw.mu, raw.tau, raw.jet)
    }
}

impl Default for ScaleFactors {
    fn default() -> Self {
        Self {
            e: 1.0,
            mu: 1.0,
            tau: 1.0,
            jet: 1.0,
        }
    }
}

impl ScaleFactors {
    /// Build normalized scale factors from raw per-class weights.
    ///
    /// Each weight is multiplied by `4 / (e + mu + tau + jet)`.
    pub fn new(e: f64, mu: f64, tau: f64, jet: f64) -> Result<Self, LossError> {
        let mut sf = Self::default();
        sf.set(e, mu, tau, jet)?;
        Ok(sf)
    }

    /// Overwrite all four factors in place, applying the same normalization as [`new`](Self::new).
    ///
    /// On error the current values are left untouched.
    pub fn set(&mut self, e: f64, mu: f64, tau: f64, jet: f64) -> Result<(), LossError> {
        let invalid = |reason| LossError::InvalidScaleFactors {
            e,
            mu,
            tau,
            jet,
            reason,
        };
        if ![e, mu, tau, jet].iter().all(|v| v.is_finite()) {
            return Err(invalid("all factors must be finite"));
        }
        let sum = e + mu + tau + jet;
        if sum <= 0.0 {
            return Err(invalid("factors must sum to a positive value"));
        }

        let corr = NUM_CLASSES as f64 / sum;
        self.e = e * corr;
        self.mu = mu * corr;
        self.tau = tau * corr;
        self.jet = jet * corr;
        Ok(())
    }

    pub fn e(&self) -> f64 {
        self.e
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn jet(&self) -> f64 {
        self.jet
    }

    /// Factor for one class.
    pub fn get(&self, class: TauClass) -> f64 {
        match class {
            TauClass::Electron => self.e,
            TauClass::Muon => self.mu,
            TauClass::Tau => self.tau,
            TauClass::Jet => self.jet,
        }
    }

    /// Sum of the four factors (4 up to rounding).
    pub fn sum(&self) -> f64 {
        self.e + self.mu + self.tau + self.jet
    }

    /// Factors in column order.
    pub fn as_array(&self) -> [f64; NUM_CLASSES] {
        [self.e, self.mu, self.tau, self.jet]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;

    #[test]
    fn test_default_is_unit() {
        let sf = ScaleFactors::default();
        assert_eq!(sf.as_array(), [1.0; 4]);
        assert!((sf.sum() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalization_sums_to_four() {
        let sf = ScaleFactors::new(1.0, 2.0, 3.0, 4.0).unwrap();
        assert!((sf.sum() - 4.0).abs() < 1e-12);
        assert!((sf.e - 0.4).abs() < 1e-12);
        assert!((sf.jet - 1.6).abs() < 1e-12);
        assert!((sf.get(TauClass::Tau) - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_random_positive_inputs_sum_to_four() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let w: [f64; 4] = [
                rng.gen_range(1e-3..100.0),
                rng.gen_range(1e-3..100.0),
                rng.gen_range(1e-3..100.0),
                rng.gen_range(1e-3..100.0),
            ];
            let sf = ScaleFactors::new(w[0], w[1], w[2], w[3]).unwrap();
            assert!(
                (sf.sum() - 4.0).abs() < 1e-9,
                "inputs {w:?} gave sum {}",
                sf.sum()
            );
        }
    }

    #[test]
    fn test_set_keeps_ratios() {
        let mut sf = ScaleFactors::default();
        sf.set(2.0, 2.0, 2.0, 2.0).unwrap();
        assert_eq!(sf, ScaleFactors::default());
        sf.set(1.0, 0.0, 0.0, 1.0).unwrap();
        assert!((sf.e - 2.0).abs() < 1e-12);
        assert_eq!(sf.mu, 0.0);
    }

    #[test]
    fn test_rejects_zero_sum() {
        let mut sf = ScaleFactors::new(1.0, 1.0, 1.0, 5.0).unwrap();
        let before = sf;
        let err = sf.set(0.0, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, LossError::InvalidScaleFactors { .. }));
        assert_eq!(sf, before, "failed set must not modify factors");
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(ScaleFactors::new(f64::NAN, 1.0, 1.0, 1.0).is_err());
        assert!(ScaleFactors::new(1.0, f64::INFINITY, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let sf = ScaleFactors::new(1.0, 1.0, 2.0, 4.0).unwrap();
        let json = serde_json::to_string(&sf).unwrap();
        let back: ScaleFactors = serde_json::from_str(&json).unwrap();
        assert_eq!(sf, back);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let sf: ScaleFactors =
            serde_json::from_str(r#"{"e": 10, "mu": 1, "tau": 1, "jet": 1}"#).unwrap();
        assert!((sf.sum() - 4.0).abs() < 1e-12, "sum {}", sf.sum());
        assert!((sf.e() - 40.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_rejects_zero_sum() {
        let err = serde_json::from_str::<ScaleFactors>(r#"{"e": 0, "mu": 0, "tau": 0, "jet": 0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("positive"), "{err}");
    }
}
