/// Errors raised by loss construction, scale factors and the loss registry.
#[derive(Debug, thiserror::Error)]
pub enum LossError {
    /// Focal loss is only defined for a strictly positive focusing parameter.
    #[error("Focal loss requires gamma > 0, got {0}")]
    NonPositiveGamma(f64),

    /// Scale factors must be finite and sum to a positive value.
    #[error("Invalid scale factors (e={e}, mu={mu}, tau={tau}, jet={jet}): {reason}")]
    InvalidScaleFactors {
        e: f64,
        mu: f64,
        tau: f64,
        jet: f64,
        reason: &'static str,
    },

    /// A serialized loss or metric name has no registered implementation.
    #[error("Unknown loss or metric function: {0}")]
    UnknownFunction(String),
}
