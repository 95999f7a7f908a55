//! Shape validation and the scalar reference evaluator.
//!
//! Validation functions return `Result<(), String>` so callers can map the
//! message into their own error type. The reference evaluator is a direct,
//! unvectorized rendition of the layer semantics (clamp-to-edge 3x3
//! windows, per-output bias, leaky rectifier) used by the test suite to
//! check every backend.

use crate::ops::activations::leaky_relu_scalar;

/// Validate a layer configuration against the engine's structural
/// requirements.
///
/// The paired-pixel path (any `n_out` other than 1 or 3) requires input
/// planes in vector-width multiples, output planes in paired-unroll
/// multiples, and at least two pixel columns.
#[inline]
pub fn validate_conv_shape(
    width: usize,
    height: usize,
    n_in: usize,
    n_out: usize,
) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err("image dimensions must be > 0".into());
    }
    if n_in == 0 || n_out == 0 {
        return Err("plane counts must be > 0".into());
    }
    match n_out {
        1 | 3 => Ok(()),
        _ => {
            if n_out % 16 != 0 {
                Err(format!("n_out {n_out} must be 1, 3, or a multiple of 16"))
            } else if n_in % 8 != 0 {
                Err(format!(
                    "n_in {n_in} must be a multiple of 8 when n_out is {n_out}"
                ))
            } else if width < 2 {
                Err("paired-pixel path requires width >= 2".into())
            } else {
                Ok(())
            }
        }
    }
}

/// Evaluate one layer with a naive scalar loop nest.
///
/// `weights` are in standard `(n_out, n_in, 3, 3)` order, not packed.
/// Border pixels replicate the edge row/column, matching the kernels'
/// clamp behavior.
pub fn reference_conv3x3(
    input: &[f32],
    weights: &[f32],
    biases: &[f32],
    width: usize,
    height: usize,
    n_in: usize,
    n_out: usize,
) -> Vec<f32> {
    assert!(input.len() >= width * height * n_in);
    assert!(weights.len() >= n_in * n_out * 9);
    assert!(biases.len() >= n_out);

    let mut output = vec![0.0; width * height * n_out];
    for y in 0..height {
        for x in 0..width {
            for op in 0..n_out {
                let mut sum = 0.0;
                for ip in 0..n_in {
                    for ky in 0..3 {
                        for kx in 0..3 {
                            let sy = (y + ky).saturating_sub(1).min(height - 1);
                            let sx = (x + kx).saturating_sub(1).min(width - 1);
                            let w = weights[((op * n_in + ip) * 3 + ky) * 3 + kx];
                            sum += w * input[(sy * width + sx) * n_in + ip];
                        }
                    }
                }
                output[(y * width + x) * n_out + op] = leaky_relu_scalar(sum + biases[op]);
            }
        }
    }
    output
}

/// Largest absolute element-wise difference between two buffers.
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}
