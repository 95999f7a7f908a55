//! AVX2 backend: native 256-bit vectors with FMA.
//!
//! The primitive ops expand straight to `_mm256_*` intrinsics inside
//! `simd_primitive!`; no wrapper type is needed.

crate::expand_isa_impls!(avx2_f32, avx2, f32, ["avx2", "fma"]);
