//! CPU kernel backends and ISA dispatch.
//!
//! One backend module per instruction-set tier, each expanded from the
//! shared operator template in `macros::conv_templates`:
//!
//! | module | vector realization | requires |
//! |--------|--------------------|----------|
//! | `avx2` | native `__m256`, FMA | x86_64 with AVX2+FMA |
//! | `sse41` | two `__m128` halves | x86_64 with SSE4.1 |
//! | `neon` | two `float32x4_t` halves | aarch64 |
//! | `scalar` | `[f32; 8]` loops | everywhere |
//!
//! [`get_isa_level`] probes the CPU once; [`ConvKernels`] holds the chosen
//! level and routes a layer evaluation to the matching expansion through a
//! single indirection, never per vector op.

use std::sync::atomic::AtomicUsize;
use std::sync::OnceLock;

use crate::parallel::ComputeEnv;
use crate::tensor::LayerShape;

#[cfg(target_arch = "x86_64")]
pub mod avx2;
#[cfg(target_arch = "aarch64")]
pub mod neon;
pub mod scalar;
#[cfg(target_arch = "x86_64")]
pub mod sse41;

/// Logical vector width in f32 lanes, shared by every backend.
pub const VEC_WIDTH: usize = 8;

/// Tile width in output pixels.
pub const BLOCK_SIZE_HOR: usize = 256;

/// Tile height in output pixels.
pub const BLOCK_SIZE_VER: usize = 16;

/// ISA level for dispatch decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsaLevel {
    Scalar,
    Sse41,
    Avx2,
    Neon,
}

/// Detect the best ISA level for the running CPU, cached after the first
/// call.
pub fn get_isa_level() -> IsaLevel {
    static LEVEL: OnceLock<IsaLevel> = OnceLock::new();
    *LEVEL.get_or_init(|| {
        let isa = detect_isa_level();
        log::debug!("conv kernels: selected ISA level {isa:?}");
        isa
    })
}

fn detect_isa_level() -> IsaLevel {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return IsaLevel::Avx2;
        }
        if is_x86_feature_detected!("sse4.1") {
            return IsaLevel::Sse41;
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        return IsaLevel::Neon;
    }
    #[allow(unreachable_code)]
    IsaLevel::Scalar
}

/// Whether `isa` can run on the current CPU.
pub fn isa_available(isa: IsaLevel) -> bool {
    match isa {
        IsaLevel::Scalar => true,
        IsaLevel::Avx2 => {
            #[cfg(target_arch = "x86_64")]
            {
                is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
            }
            #[cfg(not(target_arch = "x86_64"))]
            {
                false
            }
        }
        IsaLevel::Sse41 => {
            #[cfg(target_arch = "x86_64")]
            {
                is_x86_feature_detected!("sse4.1")
            }
            #[cfg(not(target_arch = "x86_64"))]
            {
                false
            }
        }
        IsaLevel::Neon => cfg!(target_arch = "aarch64"),
    }
}

/// Backend-dispatched convolution kernels.
///
/// Holds the ISA level chosen at construction; every layer launched
/// through the same `ConvKernels` uses the same backend, so outputs are
/// bit-reproducible across calls and worker counts.
#[derive(Debug, Clone, Copy)]
pub struct ConvKernels {
    isa: IsaLevel,
}

impl ConvKernels {
    /// Use the best ISA the CPU supports.
    pub fn new() -> Self {
        Self {
            isa: get_isa_level(),
        }
    }

    /// Force a specific ISA level. Returns `None` when the current CPU
    /// cannot run it. Mainly useful for backend-agreement testing.
    pub fn with_isa(isa: IsaLevel) -> Option<Self> {
        isa_available(isa).then_some(Self { isa })
    }

    #[inline]
    pub fn isa(&self) -> IsaLevel {
        self.isa
    }

    /// Fan the tile drain loop out over `n_jobs` workers.
    ///
    /// Callers must have validated shapes and buffer lengths (see
    /// `ops::conv3x3`). Workers share one atomic tile counter; tiles are
    /// disjoint output regions, so the raw output pointer can be handed to
    /// every worker without store synchronization.
    pub(crate) fn launch(
        &self,
        env: &dyn ComputeEnv,
        input: &[f32],
        output: &mut [f32],
        weights: &[f32],
        biases: &[f32],
        shape: LayerShape,
        n_jobs: usize,
    ) {
        debug_assert!(input.len() >= shape.input_len());
        debug_assert!(output.len() >= shape.output_len());

        let next_tile = AtomicUsize::new(0);
        let counter = &next_tile;
        let shape_ref = &shape;
        let in_addr = input.as_ptr() as usize;
        let out_addr = output.as_mut_ptr() as usize;
        let w_addr = weights.as_ptr() as usize;
        let b_addr = biases.as_ptr() as usize;

        match self.isa {
            #[cfg(target_arch = "x86_64")]
            IsaLevel::Avx2 => env.parallel_for(n_jobs, &|| unsafe {
                avx2::avx2_f32::run_worker(
                    in_addr as *const f32,
                    out_addr as *mut f32,
                    w_addr as *const f32,
                    b_addr as *const f32,
                    shape_ref,
                    counter,
                );
            }),
            #[cfg(target_arch = "x86_64")]
            IsaLevel::Sse41 => env.parallel_for(n_jobs, &|| unsafe {
                sse41::sse41_f32::run_worker(
                    in_addr as *const f32,
                    out_addr as *mut f32,
                    w_addr as *const f32,
                    b_addr as *const f32,
                    shape_ref,
                    counter,
                );
            }),
            #[cfg(target_arch = "aarch64")]
            IsaLevel::Neon => env.parallel_for(n_jobs, &|| unsafe {
                neon::neon_f32::run_worker(
                    in_addr as *const f32,
                    out_addr as *mut f32,
                    w_addr as *const f32,
                    b_addr as *const f32,
                    shape_ref,
                    counter,
                );
            }),
            _ => env.parallel_for(n_jobs, &|| unsafe {
                scalar::scalar_f32::run_worker(
                    in_addr as *const f32,
                    out_addr as *mut f32,
                    w_addr as *const f32,
                    b_addr as *const f32,
                    shape_ref,
                    counter,
                );
            }),
        }
    }
}

impl Default for ConvKernels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isa_detection() {
        let isa = get_isa_level();
        assert!(isa_available(isa), "detected ISA {isa:?} must be available");
        #[cfg(target_arch = "aarch64")]
        assert_eq!(isa, IsaLevel::Neon);
    }

    #[test]
    fn test_scalar_always_available() {
        assert!(ConvKernels::with_isa(IsaLevel::Scalar).is_some());
    }

    #[test]
    fn test_with_isa_rejects_unavailable() {
        #[cfg(target_arch = "x86_64")]
        assert!(ConvKernels::with_isa(IsaLevel::Neon).is_none());
        #[cfg(target_arch = "aarch64")]
        assert!(ConvKernels::with_isa(IsaLevel::Avx2).is_none());
    }
}
