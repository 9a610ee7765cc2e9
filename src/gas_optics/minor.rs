//! Absorption by the minor species.
//!
//! Each minor absorber only affects a few g-points, and it is only applied in
//! one half of the atmosphere. The absorption coefficient is interpolated in
//! temperature and eta only and then multiplied by a scaled column amount.

use std::ops::RangeInclusive;

use ndarray::{s, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use super::core::interpolate2d_byflav;
use super::interpolation::InterpolationCoefficients;
use super::tables::{AtmosphereHalf, MinorAbsorbers, MinorScaling, SpectralMap};

/// Convert pressure from Pa to hPa
const PA_TO_HPA: f64 = 0.01;

/// The amount of a minor absorber in one layer.
///
/// `col_gas` holds the column amounts of every gas in the layer, with dry air
/// at index 0. Pressure `play` is in Pa and temperature `tlay` in K.
#[inline]
pub(crate) fn scaling_factor(
    scaling: MinorScaling,
    gas: usize,
    idx_h2o: usize,
    play: f64,
    tlay: f64,
    col_gas: ArrayView1<'_, f64>,
) -> f64 {
    let column = col_gas[gas];
    let density = || column * (PA_TO_HPA * play / tlay);

    // Volume mixing ratio of `other` with respect to dry air, corrected to
    // the moist air amount
    let vmr = |other: usize| {
        let vmr_fact = 1. / col_gas[0];
        let dry_fact = 1. / (1. + col_gas[idx_h2o] * vmr_fact);
        col_gas[other] * vmr_fact * dry_fact
    };

    match scaling {
        MinorScaling::Column => column,
        MinorScaling::Density => density(),
        MinorScaling::DensityVmr { gas } => density() * vmr(gas),
        MinorScaling::DensityComplement { gas } => density() * (1. - vmr(gas)),
    }
}

/// Add the optical depth of one set of minor absorbers to `tau`.
///
/// `half` says which half of the atmosphere the absorbers in `minor` are
/// for, and `layer_limits` gives the matching layers of each column (see
/// [`InterpolationCoefficients::layer_limits`]); columns with `None` are
/// skipped. `play` and `tlay` are dimensioned as (column, layer), `col_gas` as
/// (column, layer, gas), and `tau` as (column, layer, g-point).
#[allow(clippy::too_many_arguments)]
pub fn gas_optical_depths_minor(
    half: AtmosphereHalf,
    spectral: &SpectralMap,
    minor: &MinorAbsorbers,
    idx_h2o: usize,
    play: ArrayView2<'_, f64>,
    tlay: ArrayView2<'_, f64>,
    col_gas: ArrayView3<'_, f64>,
    coefs: &InterpolationCoefficients,
    layer_limits: &[Option<RangeInclusive<usize>>],
    tau: &mut Array3<f64>,
) {
    if minor.absorbers.is_empty() {
        return;
    }
    let kminor = minor.kminor.view();

    tau.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(layer_limits.par_iter())
        .enumerate()
        .for_each(|(icol, (mut tau, limits))| {
            let Some(limits) = limits else {
                return;
            };

            for absorber in &minor.absorbers {
                // The flavor is constant within a band, and the absorber is
                // within one band
                let iflav = spectral.flavor_of(half, absorber.gpts.start);
                let contributors =
                    absorber.kminor_start..absorber.kminor_start + absorber.gpts.len();

                for ilay in limits.clone() {
                    let scaling = scaling_factor(
                        absorber.scaling,
                        absorber.gas,
                        idx_h2o,
                        play[[icol, ilay]],
                        tlay[[icol, ilay]],
                        col_gas.slice(s![icol, ilay, ..]),
                    );
                    let flavor = &coefs.flavor[[icol, ilay, iflav]];
                    let k = interpolate2d_byflav(
                        &flavor.fminor,
                        kminor,
                        contributors.clone(),
                        flavor.jeta,
                        coefs.layer[[icol, ilay]].jtemp,
                    );
                    tau.slice_mut(s![ilay, absorber.gpts.clone()])
                        .iter_mut()
                        .zip(&k)
                        .for_each(|(tau, k)| *tau += scaling * k);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{array, Array2};

    use crate::gas_optics::interpolation::{ClampCounts, LayerCoefficients};
    use crate::gas_optics::tables::MinorAbsorber;
    use crate::gas_optics::tests::flavor_coefficients;

    #[test]
    fn complement_of_dry_air_is_nothing() {
        // Only dry air: no water vapor and no other gases
        let col_gas = array![2.1e24, 0., 0.];
        let scaling = MinorScaling::from_flags(true, true, Some(0));
        let factor = scaling_factor(scaling, 0, 1, 80_000., 250., col_gas.view());
        assert_abs_diff_eq!(factor, 0., epsilon = 1e-12 * 2.1e24);

        // Whereas direct scaling by dry air leaves just the density scaling
        let scaling = MinorScaling::from_flags(true, false, Some(0));
        let factor = scaling_factor(scaling, 0, 1, 80_000., 250., col_gas.view());
        assert_relative_eq!(factor, 2.1e24 * 800. / 250., epsilon = 1e-12);
    }

    #[test]
    fn scaling_modes() {
        // Dry air, water vapor, and the minor gas
        let col_gas = array![1e24, 2.5e22, 4e18];
        let (play, tlay) = (50_000., 200.);
        let density = 4e18 * 500. / 200.;

        let factor = scaling_factor(MinorScaling::Column, 2, 1, play, tlay, col_gas.view());
        assert_relative_eq!(factor, 4e18);

        let factor = scaling_factor(MinorScaling::Density, 2, 1, play, tlay, col_gas.view());
        assert_relative_eq!(factor, density);

        // The water vapor mixing ratio relative to moist air
        let h2o_vmr = 2.5e22 / 1e24 / (1. + 2.5e22 / 1e24);
        let factor = scaling_factor(
            MinorScaling::DensityVmr { gas: 1 },
            2,
            1,
            play,
            tlay,
            col_gas.view(),
        );
        assert_relative_eq!(factor, density * h2o_vmr, epsilon = 1e-12);

        let factor = scaling_factor(
            MinorScaling::DensityComplement { gas: 1 },
            2,
            1,
            play,
            tlay,
            col_gas.view(),
        );
        assert_relative_eq!(factor, density * (1. - h2o_vmr), epsilon = 1e-12);
    }

    #[test]
    fn only_layers_in_range() {
        // Four g-points in two bands, one flavor everywhere
        let spectral = SpectralMap::new(
            vec![[1, 2]],
            Array2::zeros((2, 4)),
            vec![0..2, 2..4],
        )
        .unwrap();

        // Two temperatures, two etas, five contributors. Only the last three
        // are used, by an absorber on g-points 2 and 3.
        let kminor = Array3::from_shape_fn((2, 2, 5), |(t, e, c)| {
            (1 + t) as f64 * 100. + e as f64 * 10. + c as f64
        });
        let minor = MinorAbsorbers::new(
            kminor,
            vec![MinorAbsorber {
                gas: 2,
                gpts: 2..4,
                kminor_start: 3,
                scaling: MinorScaling::Column,
            }],
        )
        .unwrap();

        let (ncol, nlay) = (2, 3);
        let layer = LayerCoefficients {
            jtemp: 0,
            ftemp: 0.25,
            jpress: 0,
            fpress: 0.,
            tropo: true,
        };
        let flavor = flavor_coefficients([1., 1.], [0, 0], 0.25, 0., [0.5, 0.5]);
        let coefs = InterpolationCoefficients {
            layer: Array2::from_elem((ncol, nlay), layer),
            flavor: Array3::from_elem((ncol, nlay, 1), flavor),
            clamped: ClampCounts::default(),
        };
        let play = Array2::from_elem((ncol, nlay), 50_000.);
        let tlay = Array2::from_elem((ncol, nlay), 250.);
        let col_gas = Array3::from_shape_fn((ncol, nlay, 3), |(_, ilay, gas)| {
            if gas == 2 {
                (ilay + 1) as f64
            } else {
                1e24
            }
        });

        let mut tau = Array3::from_elem((ncol, nlay, 4), 1.);
        gas_optical_depths_minor(
            AtmosphereHalf::Lower,
            &spectral,
            &minor,
            1,
            play.view(),
            tlay.view(),
            col_gas.view(),
            &coefs,
            &[Some(1..=2), None],
            &mut tau,
        );

        // Interpolated at 0.25 of the way in temperature and halfway in eta
        let k = |c: f64| 0.75 * (100. + 5. + c) + 0.25 * (200. + 5. + c);
        for ilay in 0..nlay {
            // Untouched g-points
            assert_eq!(tau[[0, ilay, 0]], 1.);
            assert_eq!(tau[[0, ilay, 1]], 1.);
        }
        assert_eq!(tau[[0, 0, 2]], 1.);
        assert_eq!(tau[[0, 0, 3]], 1.);
        for ilay in 1..nlay {
            let column = (ilay + 1) as f64;
            assert_relative_eq!(tau[[0, ilay, 2]], 1. + column * k(3.), epsilon = 1e-12);
            assert_relative_eq!(tau[[0, ilay, 3]], 1. + column * k(4.), epsilon = 1e-12);
        }
        // The second column has no layers in range
        assert!(tau.index_axis(Axis(0), 1).iter().all(|&tau| tau == 1.));
    }
}
