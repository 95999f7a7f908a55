/// Maps abstract 8-wide f32 vector operations to concrete hardware
/// intrinsics or fallback implementations.
///
/// # Architecture
///
/// This macro is the "Layer 1" of the macro architecture. Every kernel
/// template manipulates one logical vector shape (8 single-precision
/// floats) through a fixed op set:
///
/// | op | contract |
/// |----|----------|
/// | `lanes` | logical width (always 8) |
/// | `zero` | vector of +0.0 |
/// | `splat` | broadcast a scalar |
/// | `bcast` | broadcast `*p` |
/// | `load` / `store` | 8 floats at `p`, no alignment requirement |
/// | `add` / `mul` / `max` / `min` | lane-wise |
/// | `fma` | `a * b + c` lane-wise (fused where the ISA provides it) |
/// | `reduce_sum` | sum of all 8 lanes as a scalar |
///
/// AVX2 realizes the vector as a native `__m256`; SSE4.1 and NEON as two
/// 128-bit halves (see the `F32x8` types in their backend modules); the
/// scalar backend as a plain `[f32; 8]`. Backends may differ numerically
/// only by fused vs. separate multiply-add rounding.
///
/// # Usage
/// ```ignore
/// simd_primitive!(scalar, f32, add, a, b) // -> lane-wise array add
/// simd_primitive!(avx2, f32, add, a, b)   // -> _mm256_add_ps(a, b)
/// ```
#[macro_export]
macro_rules! simd_primitive {
    // ========================================================================
    // Scalar Fallback ([f32; 8] lanes, plain loops)
    // ========================================================================

    (scalar, f32, lanes) => { 8 };
    (scalar, f32, zero) => { $crate::cpu_kernels::scalar::v256_zero() };
    (scalar, f32, splat, $v:expr) => { $crate::cpu_kernels::scalar::v256_splat($v) };
    (scalar, f32, bcast, $p:expr) => { $crate::cpu_kernels::scalar::v256_bcast($p) };
    (scalar, f32, load, $p:expr) => { $crate::cpu_kernels::scalar::v256_load($p) };
    (scalar, f32, store, $p:expr, $v:expr) => { $crate::cpu_kernels::scalar::v256_store($p, $v) };
    (scalar, f32, add, $a:expr, $b:expr) => { $crate::cpu_kernels::scalar::v256_add($a, $b) };
    (scalar, f32, mul, $a:expr, $b:expr) => { $crate::cpu_kernels::scalar::v256_mul($a, $b) };
    (scalar, f32, max, $a:expr, $b:expr) => { $crate::cpu_kernels::scalar::v256_max($a, $b) };
    (scalar, f32, min, $a:expr, $b:expr) => { $crate::cpu_kernels::scalar::v256_min($a, $b) };
    (scalar, f32, fma, $a:expr, $b:expr, $c:expr) => { $crate::cpu_kernels::scalar::v256_fma($a, $b, $c) };
    (scalar, f32, reduce_sum, $v:expr) => { $crate::cpu_kernels::scalar::v256_reduce_sum($v) };

    // ========================================================================
    // AVX2 Implementation (native 256-bit, FMA)
    // ========================================================================

    (avx2, f32, lanes) => { 8 };
    (avx2, f32, zero) => { std::arch::x86_64::_mm256_setzero_ps() };
    (avx2, f32, splat, $v:expr) => { std::arch::x86_64::_mm256_set1_ps($v) };
    (avx2, f32, bcast, $p:expr) => { std::arch::x86_64::_mm256_broadcast_ss(&*$p) };
    (avx2, f32, load, $p:expr) => { std::arch::x86_64::_mm256_loadu_ps($p) };
    (avx2, f32, store, $p:expr, $v:expr) => { std::arch::x86_64::_mm256_storeu_ps($p, $v) };
    (avx2, f32, add, $a:expr, $b:expr) => { std::arch::x86_64::_mm256_add_ps($a, $b) };
    (avx2, f32, mul, $a:expr, $b:expr) => { std::arch::x86_64::_mm256_mul_ps($a, $b) };
    (avx2, f32, max, $a:expr, $b:expr) => { std::arch::x86_64::_mm256_max_ps($a, $b) };
    (avx2, f32, min, $a:expr, $b:expr) => { std::arch::x86_64::_mm256_min_ps($a, $b) };
    (avx2, f32, fma, $a:expr, $b:expr, $c:expr) => { std::arch::x86_64::_mm256_fmadd_ps($a, $b, $c) };

    // Reduce sum: horizontal add within halves, then across them
    (avx2, f32, reduce_sum, $v:expr) => {
        {
            let h1 = std::arch::x86_64::_mm256_hadd_ps($v, $v);
            let h2 = std::arch::x86_64::_mm256_hadd_ps(h1, h1);
            let t1 = std::arch::x86_64::_mm256_extractf128_ps(h2, 1);
            let t2 = std::arch::x86_64::_mm256_castps256_ps128(h2);
            let res = std::arch::x86_64::_mm_add_ps(t1, t2);
            std::arch::x86_64::_mm_cvtss_f32(res)
        }
    };

    // ========================================================================
    // SSE4.1 Implementation (two 128-bit halves)
    // ========================================================================

    (sse41, f32, lanes) => { 8 };
    (sse41, f32, zero) => { $crate::cpu_kernels::sse41::v256_zero() };
    (sse41, f32, splat, $v:expr) => { $crate::cpu_kernels::sse41::v256_splat($v) };
    (sse41, f32, bcast, $p:expr) => { $crate::cpu_kernels::sse41::v256_bcast($p) };
    (sse41, f32, load, $p:expr) => { $crate::cpu_kernels::sse41::v256_load($p) };
    (sse41, f32, store, $p:expr, $v:expr) => { $crate::cpu_kernels::sse41::v256_store($p, $v) };
    (sse41, f32, add, $a:expr, $b:expr) => { $crate::cpu_kernels::sse41::v256_add($a, $b) };
    (sse41, f32, mul, $a:expr, $b:expr) => { $crate::cpu_kernels::sse41::v256_mul($a, $b) };
    (sse41, f32, max, $a:expr, $b:expr) => { $crate::cpu_kernels::sse41::v256_max($a, $b) };
    (sse41, f32, min, $a:expr, $b:expr) => { $crate::cpu_kernels::sse41::v256_min($a, $b) };
    (sse41, f32, fma, $a:expr, $b:expr, $c:expr) => { $crate::cpu_kernels::sse41::v256_fma($a, $b, $c) };
    (sse41, f32, reduce_sum, $v:expr) => { $crate::cpu_kernels::sse41::v256_reduce_sum($v) };

    // ========================================================================
    // NEON Implementation (two 128-bit halves)
    // ========================================================================

    (neon, f32, lanes) => { 8 };
    (neon, f32, zero) => { $crate::cpu_kernels::neon::v256_zero() };
    (neon, f32, splat, $v:expr) => { $crate::cpu_kernels::neon::v256_splat($v) };
    (neon, f32, bcast, $p:expr) => { $crate::cpu_kernels::neon::v256_bcast($p) };
    (neon, f32, load, $p:expr) => { $crate::cpu_kernels::neon::v256_load($p) };
    (neon, f32, store, $p:expr, $v:expr) => { $crate::cpu_kernels::neon::v256_store($p, $v) };
    (neon, f32, add, $a:expr, $b:expr) => { $crate::cpu_kernels::neon::v256_add($a, $b) };
    (neon, f32, mul, $a:expr, $b:expr) => { $crate::cpu_kernels::neon::v256_mul($a, $b) };
    (neon, f32, max, $a:expr, $b:expr) => { $crate::cpu_kernels::neon::v256_max($a, $b) };
    (neon, f32, min, $a:expr, $b:expr) => { $crate::cpu_kernels::neon::v256_min($a, $b) };
    (neon, f32, fma, $a:expr, $b:expr, $c:expr) => { $crate::cpu_kernels::neon::v256_fma($a, $b, $c) };
    (neon, f32, reduce_sum, $v:expr) => { $crate::cpu_kernels::neon::v256_reduce_sum($v) };
}
