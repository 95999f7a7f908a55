//! Macro system for srcnn-kernels.
//!
//! Follows a strict layered architecture:
//! 1. simd_primitive! (Hardware Primitives)
//! 2. conv3x3_taps! / apply_leaky_relu! (Kernel Building Blocks)
//! 3. define_conv3x3_ops! (Microkernel + Scheduler Logic)
//! 4. expand_isa_impls! (Per-ISA Expansion)

#[macro_use]
pub mod simd_primitive;
#[macro_use]
pub mod conv_templates;
#[macro_use]
pub mod expand;
