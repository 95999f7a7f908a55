//! NEON backend: the 8-wide logical vector as two 128-bit halves.
//!
//! `fma` maps to `vfmaq_f32`, so results match the AVX2 backend's fused
//! rounding rather than the SSE4.1 backend's separate multiply-add.

use std::arch::aarch64::*;

#[derive(Clone, Copy)]
pub struct F32x8 {
    lo: float32x4_t,
    hi: float32x4_t,
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_zero() -> F32x8 {
    F32x8 {
        lo: vdupq_n_f32(0.0),
        hi: vdupq_n_f32(0.0),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_splat(v: f32) -> F32x8 {
    F32x8 {
        lo: vdupq_n_f32(v),
        hi: vdupq_n_f32(v),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_bcast(p: *const f32) -> F32x8 {
    v256_splat(*p)
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_load(p: *const f32) -> F32x8 {
    F32x8 {
        lo: vld1q_f32(p),
        hi: vld1q_f32(p.add(4)),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_store(p: *mut f32, v: F32x8) {
    vst1q_f32(p, v.lo);
    vst1q_f32(p.add(4), v.hi);
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_add(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: vaddq_f32(a.lo, b.lo),
        hi: vaddq_f32(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_mul(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: vmulq_f32(a.lo, b.lo),
        hi: vmulq_f32(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_max(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: vmaxq_f32(a.lo, b.lo),
        hi: vmaxq_f32(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_min(a: F32x8, b: F32x8) -> F32x8 {
    F32x8 {
        lo: vminq_f32(a.lo, b.lo),
        hi: vminq_f32(a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_fma(a: F32x8, b: F32x8, c: F32x8) -> F32x8 {
    F32x8 {
        lo: vfmaq_f32(c.lo, a.lo, b.lo),
        hi: vfmaq_f32(c.hi, a.hi, b.hi),
    }
}

#[inline]
#[target_feature(enable = "neon")]
pub unsafe fn v256_reduce_sum(v: F32x8) -> f32 {
    vaddvq_f32(vaddq_f32(v.lo, v.hi))
}

crate::expand_isa_impls!(neon_f32, neon, f32, ["neon"]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_half_ops() {
        let src: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let mut dst = vec![0.0f32; 8];
        unsafe {
            let v = v256_load(src.as_ptr());
            v256_store(dst.as_mut_ptr(), v256_add(v, v));
            assert_eq!(dst, (0..8).map(|i| 2.0 * i as f32).collect::<Vec<_>>());
            assert_eq!(v256_reduce_sum(v), 28.0);
        }
    }
}
