//! Scalar fallback backend.
//!
//! Models the 8-wide logical vector as a plain `[f32; 8]` with loop-based
//! lane ops. Always available; also serves as the comparison baseline for
//! the SIMD backends. `fma` is a separate multiply and add.

#[derive(Clone, Copy, Debug)]
pub struct F32x8(pub [f32; 8]);

#[inline(always)]
pub fn v256_zero() -> F32x8 {
    F32x8([0.0; 8])
}

#[inline(always)]
pub fn v256_splat(v: f32) -> F32x8 {
    F32x8([v; 8])
}

#[inline(always)]
pub unsafe fn v256_bcast(p: *const f32) -> F32x8 {
    F32x8([*p; 8])
}

#[inline(always)]
pub unsafe fn v256_load(p: *const f32) -> F32x8 {
    let mut out = [0.0; 8];
    std::ptr::copy_nonoverlapping(p, out.as_mut_ptr(), 8);
    F32x8(out)
}

#[inline(always)]
pub unsafe fn v256_store(p: *mut f32, v: F32x8) {
    std::ptr::copy_nonoverlapping(v.0.as_ptr(), p, 8);
}

#[inline(always)]
pub fn v256_add(a: F32x8, b: F32x8) -> F32x8 {
    let mut out = [0.0; 8];
    for i in 0..8 {
        out[i] = a.0[i] + b.0[i];
    }
    F32x8(out)
}

#[inline(always)]
pub fn v256_mul(a: F32x8, b: F32x8) -> F32x8 {
    let mut out = [0.0; 8];
    for i in 0..8 {
        out[i] = a.0[i] * b.0[i];
    }
    F32x8(out)
}

#[inline(always)]
pub fn v256_max(a: F32x8, b: F32x8) -> F32x8 {
    let mut out = [0.0; 8];
    for i in 0..8 {
        out[i] = a.0[i].max(b.0[i]);
    }
    F32x8(out)
}

#[inline(always)]
pub fn v256_min(a: F32x8, b: F32x8) -> F32x8 {
    let mut out = [0.0; 8];
    for i in 0..8 {
        out[i] = a.0[i].min(b.0[i]);
    }
    F32x8(out)
}

#[inline(always)]
pub fn v256_fma(a: F32x8, b: F32x8, c: F32x8) -> F32x8 {
    let mut out = [0.0; 8];
    for i in 0..8 {
        out[i] = a.0[i] * b.0[i] + c.0[i];
    }
    F32x8(out)
}

#[inline(always)]
pub fn v256_reduce_sum(v: F32x8) -> f32 {
    v.0.iter().sum()
}

crate::expand_isa_impls!(scalar_f32, scalar, f32, []);
