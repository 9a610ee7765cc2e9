//! Locate each layer within the reference tables.
//!
//! For every (column, layer) this finds the bracketing temperature and
//! pressure nodes, and for every flavor the bracketing eta nodes at each of
//! the two bracketing reference temperatures. The weights computed here are
//! what all of the evaluators interpolate with.

use std::ops::RangeInclusive;

use log::debug;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

use super::core::bracket_index;
use super::tables::{AtmosphereHalf, ReferenceGrid};

/// Table location of a single layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerCoefficients {
    /// Lower bracketing temperature node
    pub jtemp: usize,
    /// Fractional distance from `jtemp` towards `jtemp + 1`
    pub ftemp: f64,
    /// Lower bracketing pressure node
    pub jpress: usize,
    /// Fractional distance from `jpress` towards `jpress + 1`
    pub fpress: f64,
    /// Whether the layer is below the reference tropopause
    pub tropo: bool,
}

impl LayerCoefficients {
    /// Locate a layer with pressure `play` (Pa) and temperature `tlay` (K).
    ///
    /// Values outside the grid are clamped to the boundary bin, which means the
    /// fractional weights fall outside `[0, 1]` and the tables are linearly
    /// extrapolated.
    pub fn new(grid: &ReferenceGrid, play: f64, tlay: f64) -> Self {
        let jtemp = bracket_index(
            (tlay - grid.temp_ref_min) / grid.temp_ref_delta,
            grid.ntemp(),
        );
        let ftemp = (tlay - grid.temp_ref[jtemp]) / grid.temp_ref_delta;

        let log_p = play.ln();
        let locpress = (log_p - grid.press_ref_log[0]) / grid.press_ref_log_delta;
        let jpress = bracket_index(locpress, grid.npres());
        let fpress = locpress - jpress as f64;

        Self {
            jtemp,
            ftemp,
            jpress,
            fpress,
            tropo: log_p > grid.press_ref_trop_log,
        }
    }

    /// Which half of the tables applies.
    #[inline]
    pub fn half(&self) -> AtmosphereHalf {
        AtmosphereHalf::from_tropo(self.tropo)
    }
}

/// Interpolation weights for a single (layer, flavor).
///
/// The leading index of every field is the temperature bracket: 0 for the
/// `jtemp` node and 1 for `jtemp + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlavorCoefficients {
    /// Combined column amount of the flavor's two gases, weighted by the
    /// reference mixing ratio at each reference temperature
    pub col_mix: [f64; 2],
    /// Lower bracketing eta node
    pub jeta: [usize; 2],
    /// Weights as `fminor[itemp][ieta]`, which include the temperature weight
    pub fminor: [[f64; 2]; 2],
    /// Weights as `fmajor[itemp][ipress][ieta]`
    pub fmajor: [[[f64; 2]; 2]; 2],
}

impl FlavorCoefficients {
    /// Compute the weights for the flavor with gases `gases`, given the
    /// column amounts `col` of those two gases.
    pub fn new(
        grid: &ReferenceGrid,
        neta: usize,
        layer: &LayerCoefficients,
        gases: [usize; 2],
        col: [f64; 2],
    ) -> Self {
        let half = layer.half().index();
        let mut coefs = Self::default();

        for itemp in 0..2 {
            let jtemp = layer.jtemp + itemp;
            let ratio_eta_half =
                grid.vmr_ref[[half, gases[0], jtemp]] / grid.vmr_ref[[half, gases[1], jtemp]];
            let col_mix = col[0] + ratio_eta_half * col[1];

            // With (almost) none of either gas, eta is arbitrary: take the middle
            let eta = if col_mix > 2. * f64::MIN_POSITIVE {
                col[0] / col_mix
            } else {
                0.5
            };
            let loceta = eta * (neta - 1) as f64;
            let jeta = bracket_index(loceta, neta);
            let feta = loceta.fract();

            let ftemp_term = if itemp == 0 {
                1. - layer.ftemp
            } else {
                layer.ftemp
            };
            let fminor = [(1. - feta) * ftemp_term, feta * ftemp_term];

            coefs.col_mix[itemp] = col_mix;
            coefs.jeta[itemp] = jeta;
            coefs.fminor[itemp] = fminor;
            coefs.fmajor[itemp] = [
                fminor.map(|f| (1. - layer.fpress) * f),
                fminor.map(|f| layer.fpress * f),
            ];
        }

        coefs
    }
}

/// How many layers fell outside the reference grid and were extrapolated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClampCounts {
    /// Layers with a temperature outside the reference temperatures
    pub temperature: usize,
    /// Layers with a pressure outside the reference pressures
    pub pressure: usize,
}

impl ClampCounts {
    /// Whether any layer was extrapolated.
    pub fn any(&self) -> bool {
        self.temperature > 0 || self.pressure > 0
    }
}

/// Interpolation coefficients for every (column, layer) and flavor.
#[derive(Debug, Clone)]
pub struct InterpolationCoefficients {
    /// Dimensioned as (column, layer)
    pub(crate) layer: Array2<LayerCoefficients>,
    /// Dimensioned as (column, layer, flavor)
    pub(crate) flavor: Array3<FlavorCoefficients>,
    pub(crate) clamped: ClampCounts,
}

impl InterpolationCoefficients {
    /// Number of columns.
    pub fn ncol(&self) -> usize {
        self.layer.nrows()
    }

    /// Number of layers.
    pub fn nlay(&self) -> usize {
        self.layer.ncols()
    }

    /// Coefficients of one layer.
    pub fn layer(&self, icol: usize, ilay: usize) -> &LayerCoefficients {
        &self.layer[[icol, ilay]]
    }

    /// Coefficients of one layer and flavor.
    pub fn flavor(&self, icol: usize, ilay: usize, iflav: usize) -> &FlavorCoefficients {
        &self.flavor[[icol, ilay, iflav]]
    }

    /// Layers that were extrapolated.
    pub fn clamped(&self) -> ClampCounts {
        self.clamped
    }

    /// The troposphere flag of every layer, as (column, layer).
    pub fn tropo(&self) -> Array2<bool> {
        self.layer.map(|layer| layer.tropo)
    }

    /// For each column, the first and last layer that belong to `half`.
    ///
    /// This assumes a monotonic pressure profile, so that the layers of one
    /// half are contiguous. A column with no layers in `half` gets `None`.
    pub fn layer_limits(&self, half: AtmosphereHalf) -> Vec<Option<RangeInclusive<usize>>> {
        self.layer
            .axis_iter(Axis(0))
            .map(|column| {
                let mut matching = column
                    .iter()
                    .enumerate()
                    .filter(|(_, layer)| layer.half() == half)
                    .map(|(ilay, _)| ilay);
                let first = matching.next()?;
                let last = matching.last().unwrap_or(first);
                Some(first..=last)
            })
            .collect()
    }
}

/// Compute the interpolation coefficients.
///
/// `play` and `tlay` are dimensioned as (column, layer) and `col_gas` as
/// (column, layer, gas) with dry air as gas 0. `neta` is the length of the
/// eta axis of the tables.
pub fn compute_interpolation(
    grid: &ReferenceGrid,
    flavors: &[[usize; 2]],
    neta: usize,
    play: ArrayView2<'_, f64>,
    tlay: ArrayView2<'_, f64>,
    col_gas: ArrayView3<'_, f64>,
) -> InterpolationCoefficients {
    let (ncol, nlay) = play.dim();

    let mut layer = Array2::from_elem((ncol, nlay), LayerCoefficients::default());
    Zip::from(&mut layer)
        .and(play)
        .and(tlay)
        .par_for_each(|coefs, &play, &tlay| *coefs = LayerCoefficients::new(grid, play, tlay));

    let mut flavor = Array3::from_elem((ncol, nlay, flavors.len()), FlavorCoefficients::default());
    Zip::from(flavor.lanes_mut(Axis(2)))
        .and(&layer)
        .and(col_gas.lanes(Axis(2)))
        .par_for_each(|mut by_flavor, layer, col_gas| {
            for (coefs, &gases) in by_flavor.iter_mut().zip(flavors) {
                let col = gases.map(|gas| col_gas[gas]);
                *coefs = FlavorCoefficients::new(grid, neta, layer, gases, col);
            }
        });

    let outside = |f: f64| !(0.0..=1.0).contains(&f);
    let clamped = ClampCounts {
        temperature: layer.iter().filter(|layer| outside(layer.ftemp)).count(),
        pressure: layer.iter().filter(|layer| outside(layer.fpress)).count(),
    };
    if clamped.any() {
        debug!(
            "extrapolating beyond the reference grid for {} temperature(s) and {} pressure(s)",
            clamped.temperature, clamped.pressure
        );
    }

    InterpolationCoefficients {
        layer,
        flavor,
        clamped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{array, Array3, Array4};

    use crate::gas_optics::core::interpolate3d;

    /// Four pressures a decade apart, three temperatures 60 K apart, two gases
    fn grid() -> ReferenceGrid {
        let vmr_ref = Array3::from_shape_fn((2, 3, 3), |(half, gas, temp)| match gas {
            0 => 1.,
            1 => 0.25 * (1 + half + temp) as f64,
            _ => 1. / 64.,
        });
        ReferenceGrid::new(
            &[100_000., 10_000., 1_000., 100.],
            9_000.,
            &[160., 220., 280.],
            vmr_ref,
        )
        .unwrap()
    }

    #[test]
    fn indices_and_weights_within_grid() {
        let grid = grid();
        for ip in 0..=60 {
            let play = 100. * 10f64.powf(3. * ip as f64 / 60.);
            for it in 0..=48 {
                let tlay = 160. + 2.5 * it as f64;
                let layer = LayerCoefficients::new(&grid, play, tlay);

                assert!(layer.jtemp <= grid.ntemp() - 2);
                assert!(layer.jpress <= grid.npres() - 2);
                assert!((0.0..=1.0 + 1e-12).contains(&layer.ftemp), "{tlay} {layer:?}");
                assert!((-1e-12..=1.0 + 1e-12).contains(&layer.fpress), "{play} {layer:?}");
            }
        }
    }

    #[test]
    fn exact_nodes() {
        let grid = grid();
        let layer = LayerCoefficients::new(&grid, 10_000., 220.);
        assert_eq!(layer.jtemp, 1);
        assert_abs_diff_eq!(layer.ftemp, 0.);
        // Either side of the node is fine, as long as it is the same location
        assert_abs_diff_eq!(layer.jpress as f64 + layer.fpress, 1., epsilon = 1e-12);
        assert!(layer.tropo);

        // Pressure decreases with the index, and the last node is reached from
        // the last bin
        let layer = LayerCoefficients::new(&grid, 100., 280.);
        assert_eq!(layer.jtemp, 1);
        assert_abs_diff_eq!(layer.ftemp, 1.);
        assert_eq!(layer.jpress, 2);
        assert_abs_diff_eq!(layer.fpress, 1., epsilon = 1e-12);
        assert!(!layer.tropo);
    }

    #[test]
    fn clamped_outside_grid() {
        let grid = grid();
        for (play, tlay) in [(1e6, 100.), (1., 400.), (1e-3, -50.), (5e5, 1e4)] {
            let layer = LayerCoefficients::new(&grid, play, tlay);
            assert!(layer.jtemp <= grid.ntemp() - 2);
            assert!(layer.jpress <= grid.npres() - 2);
        }

        let layer = LayerCoefficients::new(&grid, 1e6, 130.);
        assert_eq!(layer.jtemp, 0);
        assert_relative_eq!(layer.ftemp, -0.5);
        assert_eq!(layer.jpress, 0);
        assert_relative_eq!(layer.fpress, -1., epsilon = 1e-12);
    }

    #[test]
    fn weights_sum_to_one() {
        let grid = grid();
        let layer = LayerCoefficients::new(&grid, 30_000., 250.);
        let coefs = FlavorCoefficients::new(&grid, 9, &layer, [1, 2], [2e21, 7e19]);

        let ftemp_terms = [1. - layer.ftemp, layer.ftemp];
        for itemp in 0..2 {
            let fminor_sum: f64 = coefs.fminor[itemp].iter().sum();
            assert_relative_eq!(fminor_sum, ftemp_terms[itemp], epsilon = 1e-15);

            let fmajor_sum: f64 = coefs.fmajor[itemp].iter().flatten().sum();
            assert_relative_eq!(fmajor_sum, ftemp_terms[itemp], epsilon = 1e-15);
            assert!(coefs.fmajor[itemp]
                .iter()
                .flatten()
                .all(|f| (0.0..=1.0).contains(f)));
            assert!(coefs.jeta[itemp] <= 7);
        }
        assert_relative_eq!(ftemp_terms.iter().sum::<f64>(), 1.);
        let total: f64 = coefs.fmajor.iter().flatten().flatten().sum();
        assert_relative_eq!(total, 1., epsilon = 1e-14);
    }

    #[test]
    fn eta_from_mixing_ratios() {
        let grid = grid();
        let layer = LayerCoefficients::new(&grid, 50_000., 190.);
        assert!(layer.tropo);
        assert_eq!(layer.jtemp, 0);
        assert_relative_eq!(layer.ftemp, 0.5);

        // Reference ratio is 0.25 / (1 / 64) = 16 at the first node and
        // 0.5 / (1 / 64) = 32 at the second node
        let col = [1e20, 6.25e18];
        let coefs = FlavorCoefficients::new(&grid, 5, &layer, [1, 2], col);
        assert_relative_eq!(coefs.col_mix[0], 2e20);
        assert_relative_eq!(coefs.col_mix[1], 3e20);

        // eta = 0.5 lands on node 2 of 5
        assert_eq!(coefs.jeta[0], 2);
        assert_abs_diff_eq!(coefs.fminor[0][1], 0., epsilon = 1e-12);
        assert_relative_eq!(coefs.fminor[0][0], 0.5, epsilon = 1e-12);
        // eta = 1/3 sits a third of the way between nodes 1 and 2
        assert_eq!(coefs.jeta[1], 1);
        assert_relative_eq!(coefs.fminor[1][1], 0.5 / 3., epsilon = 1e-12);
    }

    #[test]
    fn eta_defaults_to_half_without_gas() {
        let grid = grid();
        let layer = LayerCoefficients::new(&grid, 50_000., 190.);
        let coefs = FlavorCoefficients::new(&grid, 9, &layer, [1, 2], [0., 0.]);
        for itemp in 0..2 {
            assert_eq!(coefs.col_mix[itemp], 0.);
            // 0.5 * 8 = 4 exactly
            assert_eq!(coefs.jeta[itemp], 4);
            assert_eq!(coefs.fminor[itemp][1], 0.);
        }
        assert_relative_eq!(coefs.fminor[0][0], 0.5);
        assert_relative_eq!(coefs.fminor[1][0], 0.5);
    }

    #[test]
    fn lower_temperature_bracket_of_unit_table() {
        // Two temperatures, two pressures, two etas: a single bin in each. The
        // table is 1 at the lower temperature node and 0 at the upper one, so
        // the interpolated value is the weight of the lower bracket.
        let vmr_ref = Array3::from_elem((2, 3, 2), 1e-3);
        let grid = ReferenceGrid::new(&[100_000., 100.], 10.0, &[200., 300.], vmr_ref).unwrap();
        let k = Array4::from_shape_fn((2, 3, 2, 1), |(t, _, _, _)| if t == 0 { 1. } else { 0. });

        for play in [100_000., 20_000., 3_000., 100.] {
            for col in [[1e20, 0.], [0., 1e20], [3e19, 1e20], [0., 0.]] {
                for (tlay, expected) in [(250., 0.5), (200., 1.0)] {
                    let layer = LayerCoefficients::new(&grid, play, tlay);
                    let coefs = FlavorCoefficients::new(&grid, 2, &layer, [1, 2], col);
                    let value = interpolate3d(
                        [1., 1.],
                        &coefs.fmajor,
                        k.view(),
                        0,
                        coefs.jeta,
                        layer.jtemp,
                        layer.jpress + layer.half().index(),
                    );
                    assert_relative_eq!(value, expected, epsilon = 1e-14);
                }
            }
        }
    }

    #[test]
    fn full_computation() {
        let grid = grid();
        let play = array![[90_000., 20_000., 1_000.], [5e5, 9_500., 50.]];
        let tlay = array![[280., 230., 200.], [300., 220., 150.]];
        let col_gas = Array3::from_shape_fn((2, 3, 3), |(_, ilay, gas)| match gas {
            0 => 1e24 / (ilay + 1) as f64,
            1 => 1e22 / (ilay + 1) as f64,
            _ => 4e20 / (ilay + 1) as f64,
        });
        let flavors = [[1, 2], [2, 2]];

        let coefs =
            compute_interpolation(&grid, &flavors, 9, play.view(), tlay.view(), col_gas.view());

        assert_eq!(coefs.ncol(), 2);
        assert_eq!(coefs.nlay(), 3);
        assert_eq!(coefs.flavor.dim(), (2, 3, 2));
        // Second column: 300 K and 150 K are outside, as are 5e5 Pa and 50 Pa
        assert_eq!(
            coefs.clamped(),
            ClampCounts {
                temperature: 2,
                pressure: 2
            }
        );
        assert_eq!(
            coefs.tropo(),
            array![[true, true, false], [true, true, false]]
        );
        for icol in 0..2 {
            for ilay in 0..3 {
                let layer = coefs.layer(icol, ilay);
                assert_eq!(
                    layer,
                    &LayerCoefficients::new(&grid, play[[icol, ilay]], tlay[[icol, ilay]])
                );
                let expected = FlavorCoefficients::new(
                    &grid,
                    9,
                    layer,
                    [2, 2],
                    [col_gas[[icol, ilay, 2]], col_gas[[icol, ilay, 2]]],
                );
                assert_eq!(coefs.flavor(icol, ilay, 1), &expected);
            }
        }
    }

    #[test]
    fn layer_limits_per_half() {
        let grid = grid();
        // Surface first, top first, and a column entirely above the tropopause
        let play = array![
            [90_000., 20_000., 1_000., 500.],
            [500., 1_000., 20_000., 90_000.],
            [8_000., 5_000., 1_000., 500.]
        ];
        let tlay = Array2::from_elem((3, 4), 220.);
        let col_gas = Array3::from_elem((3, 4, 3), 1e20);

        let coefs =
            compute_interpolation(&grid, &[[1, 2]], 9, play.view(), tlay.view(), col_gas.view());

        assert_eq!(
            coefs.layer_limits(AtmosphereHalf::Lower),
            vec![Some(0..=1), Some(2..=3), None]
        );
        assert_eq!(
            coefs.layer_limits(AtmosphereHalf::Upper),
            vec![Some(2..=3), Some(0..=1), Some(0..=3)]
        );
    }
}
