//! SSE4.1 backend: the 8-wide logical vector as two 128-bit halves.
//!
//! No FMA here: `fma` is a separate multiply and add, so results can
//! differ from the AVX2 backend by one rounding per tap.

use std::arch::x86_64::*;

#[derive(Clone, Copy)]
pub struct F32x8 {
    lo: __m128,
    hi: __m128,
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_zero() -> F32x8 {
    F32x8 {
        lo: _mm_setzero_ps(),
        hi: _mm_setzero_ps(),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_splat(v: f32) -> F32x8 {
    F32x8 {
        lo: _mm_set1_ps(v),
        hi: _mm_set1_ps(v),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_bcast(p: *const f32) -> F32x8 {
    v256_splat(*p)
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_load(p: *const f32) -> F32x8 {
    F32x8 {
        lo: _mm_loadu_ps(p),
        hi: _mm_loadu_ps(p.add(4)),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_store(p: *mut f32, v: F32x8) {
    _mm_storeu_ps(p, v.lo);
    _mm_storeu_ps(p.add(4), v.hi);
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_add(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: _mm_add_ps(a.lo, b.lo),
        hi: _mm_add_ps(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_mul(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: _mm_mul_ps(a.lo, b.lo),
        hi: _mm_mul_ps(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_max(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: _mm_max_ps(a.lo, b.lo),
        hi: _mm_max_ps(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_min(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: _mm_min_ps(a.lo, b.lo),
        hi: _mm_min_ps(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_fma(a: F32x8, b: F32x8, c: F32x8) -> F32x8 {
    F32x8 {
        lo: _mm_add_ps(_mm_mul_ps(a.lo, b.lo), c.lo),
        hi: _mm_add_ps(_mm_mul_ps(a.hi, b.hi), c.hi),
    }
}

#[inline]
#[target_feature(enable = "sse4.1")]
pub unsafe fn v256_reduce_sum(v: F32x8) -> f32 {
    let sum4 = _mm_add_ps(v.lo, v.hi);
    let sum4 = _mm_hadd_ps(sum4, sum4);
    let sum4 = _mm_hadd_ps(sum4, sum4);
    _mm_cvtss_f32(sum4)
}

crate::expand_isa_impls!(sse41_f32, sse41, f32, ["sse4.1"]);
