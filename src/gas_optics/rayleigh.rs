//! Rayleigh scattering optical depth.

use ndarray::{s, Array3, ArrayView3, ArrayView4, Axis, Zip};

use super::core::interpolate2d_byflav;
use super::interpolation::InterpolationCoefficients;
use super::tables::SpectralMap;

/// Compute the Rayleigh optical depth of every (column, layer, g-point).
///
/// `krayl` is dimensioned as (half, temperature, eta, g-point). The
/// coefficient is interpolated in temperature and eta with the band's flavor
/// and multiplied by the column amount of moist air, i.e. dry air plus water
/// vapor.
pub fn compute_tau_rayleigh(
    spectral: &SpectralMap,
    krayl: ArrayView4<'_, f64>,
    idx_h2o: usize,
    col_gas: ArrayView3<'_, f64>,
    coefs: &InterpolationCoefficients,
) -> Array3<f64> {
    let (ncol, nlay, _) = col_gas.dim();
    let mut tau_rayleigh = Array3::zeros((ncol, nlay, spectral.ngpt()));

    Zip::from(tau_rayleigh.lanes_mut(Axis(2)))
        .and(&coefs.layer)
        .and(coefs.flavor.lanes(Axis(2)))
        .and(col_gas.lanes(Axis(2)))
        .par_for_each(|mut tau, layer, by_flavor, col_gas| {
            let half = layer.half();
            let k = krayl.index_axis(Axis(0), half.index());
            let moist_air = col_gas[idx_h2o] + col_gas[0];

            for gpts in &spectral.band_lims_gpt {
                let flavor = &by_flavor[spectral.flavor_of(half, gpts.start)];
                let k = interpolate2d_byflav(
                    &flavor.fminor,
                    k,
                    gpts.clone(),
                    flavor.jeta,
                    layer.jtemp,
                );
                tau.slice_mut(s![gpts.clone()])
                    .iter_mut()
                    .zip(&k)
                    .for_each(|(tau, k)| *tau = k * moist_air);
            }
        });

    tau_rayleigh
}
