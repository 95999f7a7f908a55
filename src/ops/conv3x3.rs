//! Public entry point for one 3x3 convolution layer.
//!
//! Validates the layer configuration, then hands the evaluation to
//! [`ConvKernels`], which fans the tile drain loop out over the
//! environment's workers. All failures are reported before any output is
//! written; once launched, the layer runs to completion.

use std::fmt;

use crate::cpu_kernels::ConvKernels;
use crate::parallel::ComputeEnv;
use crate::tensor::LayerShape;
use crate::validation::validate_conv_shape;
use crate::weights::{PackLayout, WeightBank};

/// Errors reported by the layer entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Shape or buffer configuration the engine cannot evaluate.
    InvalidConfig(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::InvalidConfig(msg) => write!(f, "invalid kernel config: {msg}"),
        }
    }
}

impl std::error::Error for KernelError {}

/// Apply one 3x3 convolution layer with leaky-ReLU activation.
///
/// `input` is an `(height, width, n_in)` planar tensor, `output` an
/// `(height, width, n_out)` planar tensor; plane counts come from the
/// weight bank. Every output element is overwritten. The backend is the
/// best ISA level the CPU supports.
///
/// `n_jobs` is the worker count, typically the CPU count; `0` is treated
/// as `1`.
#[allow(clippy::too_many_arguments)]
pub fn apply_layer(
    env: &dyn ComputeEnv,
    input: &[f32],
    output: &mut [f32],
    weights: &WeightBank,
    biases: &[f32],
    width: usize,
    height: usize,
    n_jobs: usize,
) -> Result<(), KernelError> {
    apply_layer_with(
        &ConvKernels::new(),
        env,
        input,
        output,
        weights,
        biases,
        width,
        height,
        n_jobs,
    )
}

/// [`apply_layer`] with an explicit backend, e.g. one obtained from
/// [`ConvKernels::with_isa`].
#[allow(clippy::too_many_arguments)]
pub fn apply_layer_with(
    kernels: &ConvKernels,
    env: &dyn ComputeEnv,
    input: &[f32],
    output: &mut [f32],
    weights: &WeightBank,
    biases: &[f32],
    width: usize,
    height: usize,
    n_jobs: usize,
) -> Result<(), KernelError> {
    let n_in = weights.n_in();
    let n_out = weights.n_out();
    validate_conv_shape(width, height, n_in, n_out).map_err(KernelError::InvalidConfig)?;
    debug_assert_eq!(
        weights.layout(),
        if n_out == 1 || n_out == 3 { PackLayout::Narrow } else { PackLayout::Wide }
    );

    let shape = LayerShape::new(width, height, n_in, n_out);
    check_len("input", input.len(), shape.input_len())?;
    check_len("output", output.len(), shape.output_len())?;
    check_len("biases", biases.len(), n_out)?;
    debug_assert_eq!(weights.as_slice().len(), n_in * n_out * 9);

    kernels.launch(
        env,
        input,
        output,
        weights.as_slice(),
        biases,
        shape,
        n_jobs,
    );
    Ok(())
}

fn check_len(buffer: &'static str, got: usize, expected: usize) -> Result<(), KernelError> {
    if got < expected {
        return Err(KernelError::InvalidConfig(format!(
            "{buffer} buffer holds {got} floats, layer needs {expected}"
        )));
    }
    Ok(())
}
