//! Weighted empirical quantiles.

/// Errors from [`quantile_ex`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuantileError {
    /// No data points were given.
    #[error("Cannot compute quantiles of an empty sample")]
    Empty,

    /// `data` and `weights` differ in length.
    #[error("Data has {data} entries but weights has {weights}")]
    LengthMismatch { data: usize, weights: usize },
}

/// Weighted quantiles using the mid-point rule.
///
/// Data is sorted ascending with weights carried along. Each point sits at
/// probability `cumsum(w) - w / 2`, and that axis is rescaled to `[0, 1]`
/// using its first and last values. Requested quantiles are then linearly
/// interpolated against the sorted data. Quantiles outside `[0, 1]` clamp to
/// the extreme data values.
///
/// When the probability axis has zero span (a single point, or all weight on
/// one point) every quantile is the lowest sorted value.
pub fn quantile_ex(
    data: &[f64],
    quantiles: &[f64],
    weights: &[f64],
) -> Result<Vec<f64>, QuantileError> {
    if data.len() != weights.len() {
        return Err(QuantileError::LengthMismatch {
            data: data.len(),
            weights: weights.len(),
        });
    }
    if data.is_empty() {
        return Err(QuantileError::Empty);
    }

    let mut order: Vec<usize> = (0..data.len()).collect();
    order.sort_by(|&a, &b| data[a].total_cmp(&data[b]));
    let sorted: Vec<f64> = order.iter().map(|&i| data[i]).collect();

    let mut cumulative = 0.0;
    let mut prob: Vec<f64> = order
        .iter()
        .map(|&i| {
            cumulative += weights[i];
            cumulative - weights[i] / 2.0
        })
        .collect();

    let first = prob[0];
    let span = prob[prob.len() - 1] - first;
    if span.is_nan() || span <= 0.0 {
        return Ok(vec![sorted[0]; quantiles.len()]);
    }
    for p in &mut prob {
        *p = (*p - first) / span;
    }

    Ok(quantiles.iter().map(|&q| interp(q, &prob, &sorted)).collect())
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`, clamped to the end points.
///
/// `xp` must be non-decreasing. On ties the right-most point with `xp[j] <= x`
/// wins, and an exact hit returns `fp[j]`.
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x.is_nan() {
        return f64::NAN;
    }
    if x < xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    // xp[0] <= x < xp[last], so 0 <= j < last and xp[j + 1] > x.
    let j = xp.partition_point(|&p| p <= x) - 1;
    if xp[j] == x {
        return fp[j];
    }
    let (x0, x1) = (xp[j], xp[j + 1]);
    let t = (x - x0) / (x1 - x0);
    fp[j] + t * (fp[j + 1] - fp[j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_uniform_median() {
        let q = quantile_ex(&[1.0, 2.0, 3.0, 4.0, 5.0], &[0.5], &[1.0; 5]).unwrap();
        assert!(approx(q[0], 3.0), "got {}", q[0]);
    }

    #[test]
    fn test_endpoints_and_interpolation() {
        let q = quantile_ex(&[10.0, 20.0, 30.0], &[0.0, 0.25, 1.0], &[1.0; 3]).unwrap();
        assert!(approx(q[0], 10.0));
        assert!(approx(q[1], 15.0));
        assert!(approx(q[2], 30.0));
    }

    #[test]
    fn test_out_of_range_quantiles_clamp() {
        let q = quantile_ex(&[1.0, 2.0, 3.0], &[-0.5, 1.5], &[1.0; 3]).unwrap();
        assert_eq!(q, vec![1.0, 3.0]);
    }

    #[test]
    fn test_weights_shift_median() {
        // Mid-points: 1, 3, 7 (heavy last point) → normalized 0, 1/3, 1.
        let q = quantile_ex(&[1.0, 2.0, 3.0], &[2.0 / 3.0], &[2.0, 2.0, 6.0]).unwrap();
        assert!(approx(q[0], 2.5), "got {}", q[0]);
    }

    #[test]
    fn test_zero_weight_tie_takes_right_point() {
        // Probability axis: 0, 0.5, 0.5, 1.
        let q = quantile_ex(&[1.0, 2.0, 3.0, 4.0], &[0.5], &[1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(q, vec![3.0]);
    }

    #[test]
    fn test_zero_weight_tie_at_start() {
        // Probability axis: 0, 0, 1/3, 1.
        let q = quantile_ex(&[1.0, 2.0, 3.0, 4.0], &[0.0], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(q, vec![2.0]);
    }

    #[test]
    fn test_nan_quantile() {
        let q = quantile_ex(&[1.0, 2.0, 3.0], &[f64::NAN], &[1.0; 3]).unwrap();
        assert!(q[0].is_nan());
    }

    #[test]
    fn test_unsorted_input() {
        let q = quantile_ex(&[5.0, 1.0, 4.0, 2.0, 3.0], &[0.5], &[1.0; 5]).unwrap();
        assert!(approx(q[0], 3.0));
    }

    #[test]
    fn test_order_invariance() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut pairs: Vec<(f64, f64)> = (0..200)
            .map(|i| (i as f64 * 0.37 + rng.gen_range(0.0..0.3), rng.gen_range(0.1..2.0)))
            .collect();
        let quantiles = [0.0, 0.02275, 0.1587, 0.5, 0.8413, 0.97725, 1.0];

        let (d, w): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
        let reference = quantile_ex(&d, &quantiles, &w).unwrap();

        for _ in 0..5 {
            pairs.shuffle(&mut rng);
            let (d, w): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
            let got = quantile_ex(&d, &quantiles, &w).unwrap();
            for (a, b) in reference.iter().zip(&got) {
                assert!(approx(*a, *b), "shuffled input changed quantile: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_single_point() {
        let q = quantile_ex(&[7.0], &[0.1, 0.5, 0.9], &[2.0]).unwrap();
        assert_eq!(q, vec![7.0; 3]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(quantile_ex(&[], &[0.5], &[]), Err(QuantileError::Empty));
        assert_eq!(
            quantile_ex(&[1.0, 2.0], &[0.5], &[1.0]),
            Err(QuantileError::LengthMismatch { data: 2, weights: 1 })
        );
    }
}
