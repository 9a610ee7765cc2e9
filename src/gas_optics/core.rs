//! Low-level interpolation primitives shared by all the evaluators.
//!
//! None of these check their indices beyond what `ndarray` indexing does on
//! its own. The indices come out of the coefficient builder already clamped
//! to the table, so anything out of range here is a bug upstream.

use std::ops::Range;

use ndarray::{ArrayView2, ArrayView3, ArrayView4, Axis};
use smallvec::SmallVec;

/// Per-band (or per-g-point-range) scratch row. Bands rarely have more than 16
/// g-points, so this normally stays on the stack.
pub(crate) type Row = SmallVec<[f64; 16]>;

/// Lower bracketing index for a continuous table location.
///
/// This is `floor(loc)` clamped to `[0, n - 2]`, so that both `index` and
/// `index + 1` address valid nodes of an axis of length `n`. NaN maps to 0.
#[inline]
pub(crate) fn bracket_index(loc: f64, n: usize) -> usize {
    let upper = n.saturating_sub(2);
    if loc >= upper as f64 {
        upper
    } else if loc > 0. {
        // Truncation is the floor for positive values
        loc as usize
    } else {
        0
    }
}

/// Linear interpolation along the first axis of `table`.
///
/// The table nodes sit at `offset + i * delta`. The returned row has one value
/// per column of `table`. The bracketing index is clamped to the table, and the
/// fraction is taken relative to the clamped node, so a `value` outside the
/// table is linearly extrapolated from the boundary bin.
pub(crate) fn interpolate1d(value: f64, offset: f64, delta: f64, table: ArrayView2<'_, f64>) -> Row {
    let loc = (value - offset) / delta;
    let index = bracket_index(loc, table.nrows());
    let frac = loc - index as f64;

    let lo = table.row(index);
    let hi = table.row(index + 1);
    lo.iter()
        .zip(hi)
        .map(|(lo, hi)| lo + frac * (hi - lo))
        .collect()
}

/// Bilinear interpolation over (temperature, eta) for a single g-point.
///
/// `k` is dimensioned as (temperature, eta, g-point). The weights are
/// `fminor[itemp][ieta]`, and each temperature bracket has its own eta index.
#[inline]
pub(crate) fn interpolate2d(
    fminor: &[[f64; 2]; 2],
    k: ArrayView3<'_, f64>,
    igpt: usize,
    jeta: [usize; 2],
    jtemp: usize,
) -> f64 {
    fminor[0][0] * k[[jtemp, jeta[0], igpt]]
        + fminor[0][1] * k[[jtemp, jeta[0] + 1, igpt]]
        + fminor[1][0] * k[[jtemp + 1, jeta[1], igpt]]
        + fminor[1][1] * k[[jtemp + 1, jeta[1] + 1, igpt]]
}

/// [`interpolate2d`] over a contiguous range of g-points of `k`.
pub(crate) fn interpolate2d_byflav(
    fminor: &[[f64; 2]; 2],
    k: ArrayView3<'_, f64>,
    gpts: Range<usize>,
    jeta: [usize; 2],
    jtemp: usize,
) -> Row {
    debug_assert!(jtemp + 1 < k.len_of(Axis(0)));
    debug_assert!(jeta.iter().all(|&j| j + 1 < k.len_of(Axis(1))));
    debug_assert!(gpts.end <= k.len_of(Axis(2)));

    gpts.map(|igpt| interpolate2d(fminor, k, igpt, jeta, jtemp))
        .collect()
}

/// Bilinear interpolation over (pressure, eta) at one reference temperature.
///
/// `k` is dimensioned as (pressure, eta, g-point) and the weights are
/// `f[ipress][ieta]`.
#[inline]
fn interpolate_eta_press(
    f: &[[f64; 2]; 2],
    k: ArrayView3<'_, f64>,
    igpt: usize,
    jeta: usize,
    jpress: usize,
) -> f64 {
    f[0][0] * k[[jpress, jeta, igpt]]
        + f[0][1] * k[[jpress, jeta + 1, igpt]]
        + f[1][0] * k[[jpress + 1, jeta, igpt]]
        + f[1][1] * k[[jpress + 1, jeta + 1, igpt]]
}

/// Interpolation over (temperature, pressure, eta) for a single g-point.
///
/// `k` is dimensioned as (temperature, pressure, eta, g-point) and `jpress` is
/// the lower pressure row *including* the atmosphere-half offset.
///
/// This is not a trilinear interpolation. Each of the two bracketing reference
/// temperatures contributes its own (pressure, eta) bilinear surface, with its
/// own eta index, and the two are added after being multiplied by
/// `scaling[0]` and `scaling[1]` respectively. The temperature weights are
/// already folded into `fmajor[itemp][ipress][ieta]`.
#[inline]
pub(crate) fn interpolate3d(
    scaling: [f64; 2],
    fmajor: &[[[f64; 2]; 2]; 2],
    k: ArrayView4<'_, f64>,
    igpt: usize,
    jeta: [usize; 2],
    jtemp: usize,
    jpress: usize,
) -> f64 {
    scaling[0]
        * interpolate_eta_press(
            &fmajor[0],
            k.index_axis(Axis(0), jtemp),
            igpt,
            jeta[0],
            jpress,
        )
        + scaling[1]
            * interpolate_eta_press(
                &fmajor[1],
                k.index_axis(Axis(0), jtemp + 1),
                igpt,
                jeta[1],
                jpress,
            )
}

/// [`interpolate3d`] over a contiguous range of g-points of `k`.
pub(crate) fn interpolate3d_byflav(
    scaling: [f64; 2],
    fmajor: &[[[f64; 2]; 2]; 2],
    k: ArrayView4<'_, f64>,
    gpts: Range<usize>,
    jeta: [usize; 2],
    jtemp: usize,
    jpress: usize,
) -> Row {
    debug_assert!(jtemp + 1 < k.len_of(Axis(0)));
    debug_assert!(jpress + 1 < k.len_of(Axis(1)));
    debug_assert!(jeta.iter().all(|&j| j + 1 < k.len_of(Axis(2))));
    debug_assert!(gpts.end <= k.len_of(Axis(3)));

    gpts.map(|igpt| interpolate3d(scaling, fmajor, k, igpt, jeta, jtemp, jpress))
        .collect()
}
