//! srcnn-kernels: CPU SIMD kernels for 3x3 convolutional super-resolution.
//!
//! This crate implements the inner evaluation engine of a CNN-based image
//! upscaler: one 3x3 convolution layer over a planar (channel-minor) f32
//! tensor, followed by a leaky-rectifier activation, parallelized over
//! fixed-size output tiles.
//!
//! # Architecture
//!
//! The engine is built from three layers, leaves first:
//!
//! 1. **SIMD primitives**: [`simd_primitive!`] maps an abstract 8-wide f32
//!    vector op set onto concrete intrinsics per ISA (AVX2 native 256-bit,
//!    SSE4.1 / NEON as two 128-bit halves, plain scalar fallback).
//! 2. **Microkernel templates**: [`define_conv3x3_ops!`] generates the
//!    three convolution microkernels (2-pixel wide-output, single-pixel
//!    1-output, single-pixel 3-output) plus the tile drain loop, once per
//!    ISA, with border handling monomorphized via const generics.
//! 3. **Dispatch**: [`ConvKernels`](cpu_kernels::ConvKernels) detects the
//!    ISA level once and routes [`apply_layer`] to the matching expansion.
//!
//! # Example
//!
//! ```
//! use srcnn_kernels::{apply_layer, ThreadEnv, WeightBank};
//!
//! // 3x3 image, 1 input plane -> 1 output plane, identity kernel.
//! let input = vec![1.0f32; 9];
//! let mut output = vec![0.0f32; 9];
//! let mut weights = vec![0.0f32; 9];
//! weights[4] = 1.0; // center tap
//! let bank = WeightBank::pack(&weights, 1, 1);
//!
//! apply_layer(&ThreadEnv, &input, &mut output, &bank, &[0.0], 3, 3, 1).unwrap();
//! assert_eq!(output, input);
//! ```

#[macro_use]
pub mod macros;
pub mod cpu_kernels;
pub mod ops;
pub mod parallel;
pub mod scratch;
pub mod tensor;
pub mod validation;
pub mod weights;

pub use cpu_kernels::{get_isa_level, ConvKernels, IsaLevel};
pub use ops::conv3x3::{apply_layer, KernelError};
pub use parallel::{ComputeEnv, RayonEnv, ThreadEnv};
pub use tensor::{LayerShape, PlanarTensor};
pub use weights::{PackLayout, WeightBank};
