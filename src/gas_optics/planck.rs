//! Internal (thermal) source functions for the longwave.

use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, ArrayView4, ArrayViewMut1, Axis, Zip};

use super::core::{interpolate1d, interpolate3d_byflav, Row};
use super::interpolation::InterpolationCoefficients;
use super::tables::{ReferenceGrid, SpectralMap};

/// Planck source terms for every g-point.
#[derive(Debug, Clone)]
pub struct PlanckSources {
    /// Surface source, dimensioned as (column, g-point)
    pub sfc_src: Array2<f64>,
    /// Change in the surface source for a 1 K increase in surface
    /// temperature, dimensioned as (column, g-point)
    pub sfc_src_jac: Array2<f64>,
    /// Layer source, dimensioned as (column, layer, g-point)
    pub lay_src: Array3<f64>,
    /// Level source in the direction of increasing layer index, taken at
    /// the level below layer `ilay + 1`, dimensioned as (column, layer,
    /// g-point)
    pub lev_src_inc: Array3<f64>,
    /// Level source in the direction of decreasing layer index, taken at
    /// the level above layer `ilay`, dimensioned as (column, layer, g-point)
    pub lev_src_dec: Array3<f64>,
}

/// Band-integrated Planck function at each band, as a function of temperature.
struct PlanckTable<'a> {
    totplnk: ArrayView2<'a, f64>,
    offset: f64,
    delta: f64,
}

impl PlanckTable<'_> {
    fn at(&self, temperature: f64) -> Row {
        interpolate1d(temperature, self.offset, self.delta, self.totplnk)
    }
}

/// Multiply the Planck fraction of each g-point by the band's Planck function.
#[inline]
fn fill_source(
    mut src: ArrayViewMut1<'_, f64>,
    pfrac: ArrayView1<'_, f64>,
    planck: &[f64],
    gpoint_bands: &[usize],
) {
    src.iter_mut()
        .zip(pfrac)
        .zip(gpoint_bands)
        .for_each(|((src, pfrac), &band)| *src = pfrac * planck[band]);
}

/// Compute the Planck source terms.
///
/// `pfracin` is dimensioned like `kmajor`, and `totplnk` as (Planck
/// temperature, band) on a uniform temperature axis spanning the reference
/// temperatures. `tlay` is dimensioned as (column, layer), `tlev` as (column,
/// layer + 1), and `tsfc` has one value per column. `top_at_1` says whether
/// layer 0 is the top of the atmosphere, which decides which layer is next to
/// the surface.
#[allow(clippy::too_many_arguments)]
pub fn compute_planck_source(
    grid: &ReferenceGrid,
    spectral: &SpectralMap,
    pfracin: ArrayView4<'_, f64>,
    totplnk: ArrayView2<'_, f64>,
    tlay: ArrayView2<'_, f64>,
    tlev: ArrayView2<'_, f64>,
    tsfc: ArrayView1<'_, f64>,
    top_at_1: bool,
    coefs: &InterpolationCoefficients,
) -> PlanckSources {
    let (ncol, nlay) = tlay.dim();
    let ngpt = spectral.ngpt();
    let gpoint_bands = spectral.gpoint_bands();
    let planck = PlanckTable {
        totplnk,
        offset: grid.temp_ref_min,
        delta: (grid.temp_ref_max - grid.temp_ref_min) / (totplnk.nrows() - 1) as f64,
    };

    // Planck fraction, interpolated like the major species but unscaled
    let mut pfrac = Array3::zeros((ncol, nlay, ngpt));
    Zip::from(pfrac.lanes_mut(Axis(2)))
        .and(&coefs.layer)
        .and(coefs.flavor.lanes(Axis(2)))
        .par_for_each(|mut pfrac, layer, by_flavor| {
            let half = layer.half();
            for gpts in &spectral.band_lims_gpt {
                let flavor = &by_flavor[spectral.flavor_of(half, gpts.start)];
                let row = interpolate3d_byflav(
                    [1., 1.],
                    &flavor.fmajor,
                    pfracin,
                    gpts.clone(),
                    flavor.jeta,
                    layer.jtemp,
                    layer.jpress + half.index(),
                );
                pfrac
                    .slice_mut(s![gpts.clone()])
                    .iter_mut()
                    .zip(&row)
                    .for_each(|(pfrac, value)| *pfrac = *value);
            }
        });

    let sfc_lay = if top_at_1 { nlay - 1 } else { 0 };
    let mut sfc_src = Array2::zeros((ncol, ngpt));
    let mut sfc_src_jac = Array2::zeros((ncol, ngpt));
    Zip::from(sfc_src.rows_mut())
        .and(sfc_src_jac.rows_mut())
        .and(pfrac.index_axis(Axis(1), sfc_lay).rows())
        .and(tsfc)
        .par_for_each(|src, jac, pfrac, &tsfc| {
            let planck_sfc = planck.at(tsfc);
            let planck_warmer = planck.at(tsfc + 1.);
            fill_source(src, pfrac, &planck_sfc, &gpoint_bands);

            let delta: Row = planck_warmer
                .iter()
                .zip(&planck_sfc)
                .map(|(warmer, sfc)| warmer - sfc)
                .collect();
            fill_source(jac, pfrac, &delta, &gpoint_bands);
        });

    // Each source shares the layout of `pfrac`; only the temperature differs
    let source_at = |temperature: ArrayView2<'_, f64>| {
        let mut src = Array3::zeros((ncol, nlay, ngpt));
        Zip::from(src.lanes_mut(Axis(2)))
            .and(pfrac.lanes(Axis(2)))
            .and(temperature)
            .par_for_each(|src, pfrac, &temperature| {
                fill_source(src, pfrac, &planck.at(temperature), &gpoint_bands);
            });
        src
    };
    let lay_src = source_at(tlay);
    let lev_src_dec = source_at(tlev.slice(s![.., ..nlay]));
    let lev_src_inc = source_at(tlev.slice(s![.., 1..]));

    PlanckSources {
        sfc_src,
        sfc_src_jac,
        lay_src,
        lev_src_inc,
        lev_src_dec,
    }
}
