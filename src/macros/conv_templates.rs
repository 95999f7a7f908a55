//! Kernel building blocks and the 3x3 convolution operator template.
//!
//! "Layer 2/3" of the macro architecture. `conv3x3_taps!` and
//! `apply_leaky_relu!` are small expression-level blocks shared by every
//! microkernel; `define_conv3x3_ops!` is the full operator template that
//! [`expand_isa_impls!`](crate::expand_isa_impls) instantiates once per ISA.

/// The 9-tap multiply-accumulate over one 3x3 window. Weight taps are read
/// at `stride`-float intervals from `w` in row-major kernel order; the nine
/// column vectors are the matching neighborhood inputs. Returns the
/// accumulated vector.
#[macro_export]
macro_rules! conv3x3_taps {
    ($isa:ident, $elem:ident, $w:expr, $stride:expr,
     $c00:expr, $c01:expr, $c02:expr,
     $c10:expr, $c11:expr, $c12:expr,
     $c20:expr, $c21:expr, $c22:expr) => {{
        let wp = $w;
        let st = $stride;
        let mut v = $crate::simd_primitive!($isa, $elem, mul,
            $crate::simd_primitive!($isa, $elem, load, wp), $c00);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(st)), $c01, v);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(2 * st)), $c02, v);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(3 * st)), $c10, v);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(4 * st)), $c11, v);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(5 * st)), $c12, v);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(6 * st)), $c20, v);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(7 * st)), $c21, v);
        v = $crate::simd_primitive!($isa, $elem, fma,
            $crate::simd_primitive!($isa, $elem, load, wp.add(8 * st)), $c22, v);
        v
    }};
}

/// Leaky-rectifier epilogue applied to a SIMD vector between accumulation
/// and the final store: `max(x, 0) + 0.1 * min(x, 0)`.
#[macro_export]
macro_rules! apply_leaky_relu {
    ($isa:ident, $elem:ident, $v:expr) => {{
        let v = $v;
        let vz = $crate::simd_primitive!($isa, $elem, zero);
        let mtz = $crate::simd_primitive!($isa, $elem, max, v, vz);
        let ltz = $crate::simd_primitive!($isa, $elem, min, v, vz);
        let slope = $crate::simd_primitive!($isa, $elem, splat, 0.1);
        $crate::simd_primitive!($isa, $elem, fma, ltz, slope, mtz)
    }};
}

/// Generates the 3x3 convolution microkernels and the tile drain loop for
/// one ISA.
///
/// Expanded inside a backend module by [`expand_isa_impls!`]; the module
/// provides `LayerShape`, `Scratch`, the tile constants, and the atomic
/// imports. `$feat` lists the `target_feature` strings the generated
/// kernels require (empty for the scalar backend).
///
/// Border handling is monomorphized through the `BORDER` const generic:
/// the scheduler only instantiates the `true` variant for pixels touching
/// the left or right image edge, so interior pixels never pay for clamp
/// logic. The wide kernel additionally monomorphizes `FIRST_PLANE`, which
/// switches the scratch update between plain store and load-add-store.
#[macro_export]
macro_rules! define_conv3x3_ops {
    ($isa:ident, $elem:ident, [$($feat:literal),*]) => {
        /// Clamp-to-edge row pointers for output row `yi`.
        #[inline(always)]
        unsafe fn clamped_rows(
            input: *const $elem,
            row: usize,
            yi: usize,
            height: usize,
        ) -> (*const $elem, *const $elem, *const $elem) {
            let mid = input.add(yi * row);
            let top = if yi == 0 { mid } else { mid.sub(row) };
            let bot = if yi + 1 == height { mid } else { mid.add(row) };
            (top, mid, bot)
        }

        /// Scalar 9-tap window sum for one input plane. Used as the tail
        /// of the single-pixel kernels when the plane count is not a
        /// multiple of the vector width.
        #[inline(always)]
        unsafe fn tap_sum_scalar(
            w: *const $elem,
            stride: usize,
            t: *const $elem,
            m: *const $elem,
            b: *const $elem,
            left: usize,
            right: usize,
        ) -> $elem {
            *w * *t.sub(left)
                + *w.add(stride) * *t
                + *w.add(2 * stride) * *t.add(right)
                + *w.add(3 * stride) * *m.sub(left)
                + *w.add(4 * stride) * *m
                + *w.add(5 * stride) * *m.add(right)
                + *w.add(6 * stride) * *b.sub(left)
                + *w.add(7 * stride) * *b
                + *w.add(8 * stride) * *b.add(right)
        }

        /// Accumulate one input plane's 3x3 contributions for two
        /// horizontally adjacent pixels into the scratch buffer, across
        /// all output planes.
        ///
        /// `in_top`/`in_mid`/`in_bot` point at column `xi` of the
        /// vertically clamped rows, already offset to the current input
        /// plane. `weights` points at this plane's packed block. The first
        /// input plane seeds the scratch; later planes accumulate.
        #[allow(clippy::too_many_arguments)]
        $(#[target_feature(enable = $feat)])*
        pub unsafe fn accumulate_pair<const BORDER: bool, const FIRST_PLANE: bool>(
            xi: usize,
            width: usize,
            in_top: *const $elem,
            in_mid: *const $elem,
            in_bot: *const $elem,
            weights: *const $elem,
            scratch: *mut $elem,
            n_in: usize,
            n_out: usize,
        ) {
            let scratch1 = scratch.add(n_out);

            // Column offsets with the horizontal clamp folded in: the left
            // neighbor of column 0 is column 0, the right neighbor of the
            // right edge is the edge itself.
            let left = if BORDER && xi == 0 { 0 } else { n_in };
            let right2 = if BORDER && xi + 1 == width - 1 {
                n_in
            } else {
                2 * n_in
            };

            // 12 broadcast inputs: 3 rows x columns (xi-1, xi, xi+1, xi+2)
            let i00 = $crate::simd_primitive!($isa, $elem, bcast, in_top.sub(left));
            let i10 = $crate::simd_primitive!($isa, $elem, bcast, in_mid.sub(left));
            let i20 = $crate::simd_primitive!($isa, $elem, bcast, in_bot.sub(left));
            let i01 = $crate::simd_primitive!($isa, $elem, bcast, in_top);
            let i11 = $crate::simd_primitive!($isa, $elem, bcast, in_mid);
            let i21 = $crate::simd_primitive!($isa, $elem, bcast, in_bot);
            let i02 = $crate::simd_primitive!($isa, $elem, bcast, in_top.add(n_in));
            let i12 = $crate::simd_primitive!($isa, $elem, bcast, in_mid.add(n_in));
            let i22 = $crate::simd_primitive!($isa, $elem, bcast, in_bot.add(n_in));
            let i03 = $crate::simd_primitive!($isa, $elem, bcast, in_top.add(right2));
            let i13 = $crate::simd_primitive!($isa, $elem, bcast, in_mid.add(right2));
            let i23 = $crate::simd_primitive!($isa, $elem, bcast, in_bot.add(right2));

            let mut w = weights;
            let mut op = 0;
            while op < n_out {
                // Left pixel taps columns (xi-1, xi, xi+1); right pixel
                // taps (xi, xi+1, xi+2). Both share the same weight group.
                let v00 = $crate::conv3x3_taps!($isa, $elem, w, VEC_WIDTH,
                    i00, i01, i02, i10, i11, i12, i20, i21, i22);
                let v01 = $crate::conv3x3_taps!($isa, $elem, w, VEC_WIDTH,
                    i01, i02, i03, i11, i12, i13, i21, i22, i23);
                w = w.add(9 * VEC_WIDTH);

                if FIRST_PLANE {
                    $crate::simd_primitive!($isa, $elem, store, scratch.add(op), v00);
                    $crate::simd_primitive!($isa, $elem, store, scratch1.add(op), v01);
                } else {
                    let p0 = $crate::simd_primitive!($isa, $elem, load, scratch.add(op));
                    let p1 = $crate::simd_primitive!($isa, $elem, load, scratch1.add(op));
                    $crate::simd_primitive!($isa, $elem, store, scratch.add(op),
                        $crate::simd_primitive!($isa, $elem, add, p0, v00));
                    $crate::simd_primitive!($isa, $elem, store, scratch1.add(op),
                        $crate::simd_primitive!($isa, $elem, add, p1, v01));
                }

                let v10 = $crate::conv3x3_taps!($isa, $elem, w, VEC_WIDTH,
                    i00, i01, i02, i10, i11, i12, i20, i21, i22);
                let v11 = $crate::conv3x3_taps!($isa, $elem, w, VEC_WIDTH,
                    i01, i02, i03, i11, i12, i13, i21, i22, i23);
                w = w.add(9 * VEC_WIDTH);

                if FIRST_PLANE {
                    $crate::simd_primitive!($isa, $elem, store, scratch.add(op + VEC_WIDTH), v10);
                    $crate::simd_primitive!($isa, $elem, store, scratch1.add(op + VEC_WIDTH), v11);
                } else {
                    let p0 = $crate::simd_primitive!($isa, $elem, load, scratch.add(op + VEC_WIDTH));
                    let p1 = $crate::simd_primitive!($isa, $elem, load, scratch1.add(op + VEC_WIDTH));
                    $crate::simd_primitive!($isa, $elem, store, scratch.add(op + VEC_WIDTH),
                        $crate::simd_primitive!($isa, $elem, add, p0, v10));
                    $crate::simd_primitive!($isa, $elem, store, scratch1.add(op + VEC_WIDTH),
                        $crate::simd_primitive!($isa, $elem, add, p1, v11));
                }

                op += 2 * VEC_WIDTH;
            }
        }

        /// Produce output at pixels (yi, xi) and (yi, xi+1) for every
        /// output plane: accumulate all input planes into scratch, then
        /// add bias, apply the leaky rectifier, and write out.
        #[allow(clippy::too_many_arguments)]
        $(#[target_feature(enable = $feat)])*
        pub unsafe fn filter_pair<const BORDER: bool>(
            input: *const $elem,
            output: *mut $elem,
            weights: *const $elem,
            biases: *const $elem,
            shape: &LayerShape,
            yi: usize,
            xi: usize,
            scratch: *mut $elem,
        ) {
            let LayerShape { width, height, n_in, n_out } = *shape;
            let row = width * n_in;
            let (top, mid, bot) = clamped_rows(input, row, yi, height);
            let top = top.add(xi * n_in);
            let mid = mid.add(xi * n_in);
            let bot = bot.add(xi * n_in);

            accumulate_pair::<BORDER, true>(
                xi, width, top, mid, bot, weights, scratch, n_in, n_out,
            );
            let mut ip = 1;
            while ip < n_in {
                accumulate_pair::<BORDER, false>(
                    xi,
                    width,
                    top.add(ip),
                    mid.add(ip),
                    bot.add(ip),
                    weights.add(ip * n_out * 9),
                    scratch,
                    n_in,
                    n_out,
                );
                ip += 1;
            }

            let out0 = output.add((yi * width + xi) * n_out);
            let out1 = output.add((yi * width + xi + 1) * n_out);
            let scratch1 = scratch.add(n_out);
            let mut op = 0;
            while op < n_out {
                let bv = $crate::simd_primitive!($isa, $elem, load, biases.add(op));

                let v0 = $crate::simd_primitive!($isa, $elem, add,
                    $crate::simd_primitive!($isa, $elem, load, scratch.add(op)), bv);
                let v0 = $crate::apply_leaky_relu!($isa, $elem, v0);
                $crate::simd_primitive!($isa, $elem, store, out0.add(op), v0);

                let v1 = $crate::simd_primitive!($isa, $elem, add,
                    $crate::simd_primitive!($isa, $elem, load, scratch1.add(op)), bv);
                let v1 = $crate::apply_leaky_relu!($isa, $elem, v1);
                $crate::simd_primitive!($isa, $elem, store, out1.add(op), v1);

                op += VEC_WIDTH;
            }
        }

        /// Single-pixel kernel for a 1-plane output layer. Input planes are
        /// consumed in vector-width chunks with the window vectorized over
        /// planes; accumulation stays in registers.
        $(#[target_feature(enable = $feat)])*
        pub unsafe fn filter_single_po1<const BORDER: bool>(
            input: *const $elem,
            output: *mut $elem,
            weights: *const $elem,
            biases: *const $elem,
            shape: &LayerShape,
            yi: usize,
            xi: usize,
        ) {
            let LayerShape { width, height, n_in, .. } = *shape;
            let row = width * n_in;
            let (top, mid, bot) = clamped_rows(input, row, yi, height);
            let top = top.add(xi * n_in);
            let mid = mid.add(xi * n_in);
            let bot = bot.add(xi * n_in);

            let left = if BORDER && xi == 0 { 0 } else { n_in };
            let right = if BORDER && xi + 1 == width { 0 } else { n_in };

            let mut sum = $crate::simd_primitive!($isa, $elem, zero);
            let vec_planes = n_in & !(VEC_WIDTH - 1);
            let mut ip = 0;
            while ip < vec_planes {
                let t = top.add(ip);
                let m = mid.add(ip);
                let b = bot.add(ip);
                let i00 = $crate::simd_primitive!($isa, $elem, load, t.sub(left));
                let i01 = $crate::simd_primitive!($isa, $elem, load, t);
                let i02 = $crate::simd_primitive!($isa, $elem, load, t.add(right));
                let i10 = $crate::simd_primitive!($isa, $elem, load, m.sub(left));
                let i11 = $crate::simd_primitive!($isa, $elem, load, m);
                let i12 = $crate::simd_primitive!($isa, $elem, load, m.add(right));
                let i20 = $crate::simd_primitive!($isa, $elem, load, b.sub(left));
                let i21 = $crate::simd_primitive!($isa, $elem, load, b);
                let i22 = $crate::simd_primitive!($isa, $elem, load, b.add(right));

                let v = $crate::conv3x3_taps!($isa, $elem, weights.add(ip), n_in,
                    i00, i01, i02, i10, i11, i12, i20, i21, i22);
                sum = $crate::simd_primitive!($isa, $elem, add, sum, v);
                ip += VEC_WIDTH;
            }

            let mut acc = $crate::simd_primitive!($isa, $elem, reduce_sum, sum);
            while ip < n_in {
                acc += tap_sum_scalar(
                    weights.add(ip), n_in,
                    top.add(ip), mid.add(ip), bot.add(ip),
                    left, right,
                );
                ip += 1;
            }

            let out = output.add(yi * width + xi);
            *out = $crate::ops::activations::leaky_relu_scalar(acc + *biases);
        }

        /// Single-pixel kernel for a 3-plane output layer. Same structure
        /// as the 1-output kernel with the tap pass unrolled three times
        /// over three weight bases `9 * n_in` apart.
        $(#[target_feature(enable = $feat)])*
        pub unsafe fn filter_single_po3<const BORDER: bool>(
            input: *const $elem,
            output: *mut $elem,
            weights: *const $elem,
            biases: *const $elem,
            shape: &LayerShape,
            yi: usize,
            xi: usize,
        ) {
            let LayerShape { width, height, n_in, .. } = *shape;
            let row = width * n_in;
            let (top, mid, bot) = clamped_rows(input, row, yi, height);
            let top = top.add(xi * n_in);
            let mid = mid.add(xi * n_in);
            let bot = bot.add(xi * n_in);

            let left = if BORDER && xi == 0 { 0 } else { n_in };
            let right = if BORDER && xi + 1 == width { 0 } else { n_in };

            let w0 = weights;
            let w1 = weights.add(9 * n_in);
            let w2 = weights.add(18 * n_in);

            let mut sum0 = $crate::simd_primitive!($isa, $elem, zero);
            let mut sum1 = $crate::simd_primitive!($isa, $elem, zero);
            let mut sum2 = $crate::simd_primitive!($isa, $elem, zero);
            let vec_planes = n_in & !(VEC_WIDTH - 1);
            let mut ip = 0;
            while ip < vec_planes {
                let t = top.add(ip);
                let m = mid.add(ip);
                let b = bot.add(ip);
                let i00 = $crate::simd_primitive!($isa, $elem, load, t.sub(left));
                let i01 = $crate::simd_primitive!($isa, $elem, load, t);
                let i02 = $crate::simd_primitive!($isa, $elem, load, t.add(right));
                let i10 = $crate::simd_primitive!($isa, $elem, load, m.sub(left));
                let i11 = $crate::simd_primitive!($isa, $elem, load, m);
                let i12 = $crate::simd_primitive!($isa, $elem, load, m.add(right));
                let i20 = $crate::simd_primitive!($isa, $elem, load, b.sub(left));
                let i21 = $crate::simd_primitive!($isa, $elem, load, b);
                let i22 = $crate::simd_primitive!($isa, $elem, load, b.add(right));

                let v0 = $crate::conv3x3_taps!($isa, $elem, w0.add(ip), n_in,
                    i00, i01, i02, i10, i11, i12, i20, i21, i22);
                sum0 = $crate::simd_primitive!($isa, $elem, add, sum0, v0);
                let v1 = $crate::conv3x3_taps!($isa, $elem, w1.add(ip), n_in,
                    i00, i01, i02, i10, i11, i12, i20, i21, i22);
                sum1 = $crate::simd_primitive!($isa, $elem, add, sum1, v1);
                let v2 = $crate::conv3x3_taps!($isa, $elem, w2.add(ip), n_in,
                    i00, i01, i02, i10, i11, i12, i20, i21, i22);
                sum2 = $crate::simd_primitive!($isa, $elem, add, sum2, v2);
                ip += VEC_WIDTH;
            }

            let mut acc0 = $crate::simd_primitive!($isa, $elem, reduce_sum, sum0);
            let mut acc1 = $crate::simd_primitive!($isa, $elem, reduce_sum, sum1);
            let mut acc2 = $crate::simd_primitive!($isa, $elem, reduce_sum, sum2);
            while ip < n_in {
                let t = top.add(ip);
                let m = mid.add(ip);
                let b = bot.add(ip);
                acc0 += tap_sum_scalar(w0.add(ip), n_in, t, m, b, left, right);
                acc1 += tap_sum_scalar(w1.add(ip), n_in, t, m, b, left, right);
                acc2 += tap_sum_scalar(w2.add(ip), n_in, t, m, b, left, right);
                ip += 1;
            }

            let out = output.add((yi * width + xi) * 3);
            *out = $crate::ops::activations::leaky_relu_scalar(acc0 + *biases);
            *out.add(1) = $crate::ops::activations::leaky_relu_scalar(acc1 + *biases.add(1));
            *out.add(2) = $crate::ops::activations::leaky_relu_scalar(acc2 + *biases.add(2));
        }

        /// One worker's drain loop: fetch tile indices from the shared
        /// counter and process them until the image is exhausted.
        ///
        /// Tiles never overlap, so workers write disjoint output regions
        /// and no store synchronization is needed. The scratch buffer is
        /// private to this worker and lives for the whole drain.
        $(#[target_feature(enable = $feat)])*
        pub unsafe fn run_worker(
            input: *const $elem,
            output: *mut $elem,
            weights: *const $elem,
            biases: *const $elem,
            shape: &LayerShape,
            next_tile: &AtomicUsize,
        ) {
            let LayerShape { width, height, n_out, .. } = *shape;
            let blocks_hor = (width + BLOCK_SIZE_HOR - 1) / BLOCK_SIZE_HOR;
            let blocks_ver = (height + BLOCK_SIZE_VER - 1) / BLOCK_SIZE_VER;
            let total = blocks_hor * blocks_ver;

            let mut scratch = Scratch::for_planes(n_out);
            let sp = scratch.as_mut_ptr();

            loop {
                let b = next_tile.fetch_add(1, Ordering::AcqRel);
                if b >= total {
                    return;
                }
                let x_start = (b % blocks_hor) * BLOCK_SIZE_HOR;
                let x_end = (x_start + BLOCK_SIZE_HOR).min(width);
                let y_start = (b / blocks_hor) * BLOCK_SIZE_VER;
                let y_end = (y_start + BLOCK_SIZE_VER).min(height);

                if n_out == 1 {
                    let mut yi = y_start;
                    while yi < y_end {
                        let mut xi = x_start;
                        while xi < x_end {
                            if xi == 0 || xi == width - 1 {
                                filter_single_po1::<true>(
                                    input, output, weights, biases, shape, yi, xi,
                                );
                            } else {
                                filter_single_po1::<false>(
                                    input, output, weights, biases, shape, yi, xi,
                                );
                            }
                            xi += 1;
                        }
                        yi += 1;
                    }
                } else if n_out == 3 {
                    let mut yi = y_start;
                    while yi < y_end {
                        let mut xi = x_start;
                        while xi < x_end {
                            if xi == 0 || xi == width - 1 {
                                filter_single_po3::<true>(
                                    input, output, weights, biases, shape, yi, xi,
                                );
                            } else {
                                filter_single_po3::<false>(
                                    input, output, weights, biases, shape, yi, xi,
                                );
                            }
                            xi += 1;
                        }
                        yi += 1;
                    }
                } else {
                    debug_assert!(width >= 2);
                    // Pairs step by two, so a tile ending one column short
                    // of the image edge absorbs the odd final column, and a
                    // tile holding only that column is skipped. This keeps
                    // every output cell owned by exactly one tile.
                    let x_end = if x_end + 1 == width { width } else { x_end };
                    if x_start + 1 == width {
                        continue;
                    }
                    let mut yi = y_start;
                    while yi < y_end {
                        let mut xi = x_start;
                        while xi < x_end {
                            // An odd final column re-runs the last pair
                            // shifted left by one; the overlapping pixel
                            // gets the same value both times.
                            let x = if xi + 1 >= width { width - 2 } else { xi };
                            if x == 0 || x + 1 == width - 1 {
                                filter_pair::<true>(
                                    input, output, weights, biases, shape, yi, x, sp,
                                );
                            } else {
                                filter_pair::<false>(
                                    input, output, weights, biases, shape, yi, x, sp,
                                );
                            }
                            xi += 2;
                        }
                        yi += 1;
                    }
                }
            }
        }
    };
}
