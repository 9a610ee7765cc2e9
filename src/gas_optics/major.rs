//! Absorption by the major species.

use ndarray::{s, Array3, ArrayView4, Axis, Zip};

use super::core::interpolate3d_byflav;
use super::interpolation::InterpolationCoefficients;
use super::tables::SpectralMap;

/// Add the major-species optical depth to `tau`.
///
/// `kmajor` is dimensioned as (temperature, pressure + 1, eta, g-point) and
/// `tau` as (column, layer, g-point). For each band, the flavor of the band's
/// first g-point selects the interpolation weights, and the two temperature
/// brackets are scaled by the flavor's mixed column amounts. Upper-atmosphere
/// layers read the pressure rows one further along, since the tables repeat
/// the tropopause pressure once in each half.
pub fn gas_optical_depths_major(
    spectral: &SpectralMap,
    kmajor: ArrayView4<'_, f64>,
    coefs: &InterpolationCoefficients,
    tau: &mut Array3<f64>,
) {
    Zip::from(tau.lanes_mut(Axis(2)))
        .and(&coefs.layer)
        .and(coefs.flavor.lanes(Axis(2)))
        .par_for_each(|mut tau, layer, by_flavor| {
            let half = layer.half();
            for gpts in &spectral.band_lims_gpt {
                let flavor = &by_flavor[spectral.flavor_of(half, gpts.start)];
                let tau_major = interpolate3d_byflav(
                    flavor.col_mix,
                    &flavor.fmajor,
                    kmajor,
                    gpts.clone(),
                    flavor.jeta,
                    layer.jtemp,
                    layer.jpress + half.index(),
                );
                tau.slice_mut(s![gpts.clone()])
                    .iter_mut()
                    .zip(&tau_major)
                    .for_each(|(tau, tau_major)| *tau += tau_major);
            }
        });
}
