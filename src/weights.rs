//! Packed 3x3 weight banks.
//!
//! The convolution microkernels do not read weights in the standard
//! `(n_out, n_in, 3, 3)` order; they require one of two pre-packed layouts
//! chosen by the output plane count:
//!
//! - **Wide** (`n_out >= 8`): outermost index is the input plane. Within
//!   each input-plane block the weights are grouped by 8-wide output-plane
//!   group, and within a group laid out as 9 kernel taps (row-major over
//!   the 3x3 window) of 8 contiguous floats, one per plane of the group.
//!   The microkernel streams this layout linearly, advancing its weight
//!   pointer by `9 * 8` floats per group.
//! - **Narrow** (`n_out` 1 or 3): outermost index is the output plane.
//!   Within each output-plane block, 9 taps each hold a contiguous run of
//!   `n_in` floats, so an input-plane chunk of 8 is one vector load per tap.
//!
//! [`WeightBank::pack_wide`] and [`WeightBank::pack_narrow`] perform the
//! repack from the standard order; [`WeightBank::pack`] selects between
//! them by output plane count, and [`WeightBank::unpack`] inverts either.

/// Kernel tap count of a 3x3 window.
const TAPS: usize = 9;

/// Which packed order a [`WeightBank`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackLayout {
    /// Input-plane-major, 8-wide output groups. Used when `n_out >= 8`.
    Wide,
    /// Output-plane-major, tap runs of `n_in`. Used when `n_out` is 1 or 3.
    Narrow,
}

/// A packed bank of `n_in * n_out` 3x3 kernels.
#[derive(Clone, Debug)]
pub struct WeightBank {
    data: Vec<f32>,
    n_in: usize,
    n_out: usize,
    layout: PackLayout,
}

impl WeightBank {
    /// Repack standard-order weights `(n_out, n_in, 3, 3)` into the layout
    /// the microkernels consume, selected by the output plane count.
    ///
    /// `standard[((op * n_in + ip) * 3 + ky) * 3 + kx]` is the tap (ky, kx)
    /// connecting input plane `ip` to output plane `op`.
    pub fn pack(standard: &[f32], n_in: usize, n_out: usize) -> Self {
        if n_out == 1 || n_out == 3 {
            Self::pack_narrow(standard, n_in, n_out)
        } else {
            Self::pack_wide(standard, n_in, n_out)
        }
    }

    /// Repack into the wide order consumed by the paired-pixel kernel.
    pub fn pack_wide(standard: &[f32], n_in: usize, n_out: usize) -> Self {
        debug_assert!(n_out != 1 && n_out != 3, "wide order is for n_out >= 8");
        Self::pack_with(standard, n_in, n_out, PackLayout::Wide)
    }

    /// Repack into the narrow order consumed by the single-pixel kernels.
    pub fn pack_narrow(standard: &[f32], n_in: usize, n_out: usize) -> Self {
        debug_assert!(n_out == 1 || n_out == 3, "narrow order is for n_out 1 or 3");
        Self::pack_with(standard, n_in, n_out, PackLayout::Narrow)
    }

    fn pack_with(standard: &[f32], n_in: usize, n_out: usize, layout: PackLayout) -> Self {
        assert!(n_in > 0 && n_out > 0, "plane counts must be positive");
        assert_eq!(
            standard.len(),
            n_in * n_out * TAPS,
            "standard weight length must be n_in * n_out * 9"
        );
        let mut data = vec![0.0; standard.len()];
        for op in 0..n_out {
            for ip in 0..n_in {
                for tap in 0..TAPS {
                    let src = (op * n_in + ip) * TAPS + tap;
                    data[packed_index(layout, n_in, n_out, ip, op, tap)] = standard[src];
                }
            }
        }
        Self {
            data,
            n_in,
            n_out,
            layout,
        }
    }

    /// Invert [`pack`](Self::pack), returning standard-order weights.
    pub fn unpack(&self) -> Vec<f32> {
        let mut standard = vec![0.0; self.data.len()];
        for op in 0..self.n_out {
            for ip in 0..self.n_in {
                for tap in 0..TAPS {
                    let dst = (op * self.n_in + ip) * TAPS + tap;
                    standard[dst] =
                        self.data[packed_index(self.layout, self.n_in, self.n_out, ip, op, tap)];
                }
            }
        }
        standard
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline(always)]
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    #[inline(always)]
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    #[inline(always)]
    pub fn layout(&self) -> PackLayout {
        self.layout
    }
}

/// Linear offset of tap `tap` for (`ip`, `op`) in the given layout.
#[inline]
fn packed_index(
    layout: PackLayout,
    n_in: usize,
    n_out: usize,
    ip: usize,
    op: usize,
    tap: usize,
) -> usize {
    match layout {
        PackLayout::Wide => {
            // ip block, then 8-plane output group, then tap, then lane
            ip * n_out * TAPS + (op / 8) * (TAPS * 8) + tap * 8 + op % 8
        }
        PackLayout::Narrow => op * n_in * TAPS + tap * n_in + ip,
    }
}
