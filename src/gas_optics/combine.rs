//! Hand the optical depths over to the solver.
//!
//! The evaluators accumulate with the g-points contiguous in memory, while the
//! solvers want the columns contiguous. These functions do the transpose, and
//! for the shortwave also combine absorption and Rayleigh scattering into a
//! two-stream description.

use ndarray::{Array3, Zip};

/// Optical properties with absorption only.
#[derive(Debug, Clone)]
pub struct OpticalProps1Scalar {
    /// Optical depth, dimensioned as (g-point, layer, column)
    pub tau: Array3<f64>,
}

/// Optical properties for a two-stream solver.
#[derive(Debug, Clone)]
pub struct OpticalProps2Stream {
    /// Optical depth, dimensioned as (g-point, layer, column)
    pub tau: Array3<f64>,
    /// Single-scattering albedo, dimensioned as (g-point, layer, column)
    pub ssa: Array3<f64>,
    /// Asymmetry parameter, dimensioned as (g-point, layer, column)
    pub g: Array3<f64>,
}

/// Reverse the axes, keeping a standard (row-major) layout.
fn reorder(values: &Array3<f64>) -> Array3<f64> {
    values
        .view()
        .permuted_axes([2, 1, 0])
        .as_standard_layout()
        .into_owned()
}

/// Transpose the absorption optical depth from (column, layer, g-point) to
/// (g-point, layer, column).
pub fn reorder_1scl(tau_abs: &Array3<f64>) -> OpticalProps1Scalar {
    OpticalProps1Scalar {
        tau: reorder(tau_abs),
    }
}

/// Combine absorption and Rayleigh optical depths, both dimensioned as
/// (column, layer, g-point), into two-stream properties dimensioned as
/// (g-point, layer, column).
///
/// The single-scattering albedo is the Rayleigh share of the total optical
/// depth, or zero where the total is too small to divide by. Rayleigh
/// scattering is symmetric, so the asymmetry parameter is zero everywhere.
pub fn combine_and_reorder_2str(
    tau_abs: &Array3<f64>,
    tau_rayleigh: &Array3<f64>,
) -> OpticalProps2Stream {
    let tau = reorder(&(tau_abs + tau_rayleigh));
    let tau_rayleigh = reorder(tau_rayleigh);

    let ssa = Zip::from(&tau)
        .and(&tau_rayleigh)
        .par_map_collect(|&tau, &tau_rayleigh| {
            if tau > 2. * f64::MIN_POSITIVE {
                tau_rayleigh / tau
            } else {
                0.
            }
        });
    let g = Array3::zeros(tau.raw_dim());

    OpticalProps2Stream { tau, ssa, g }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn tau_abs() -> Array3<f64> {
        Array3::from_shape_fn((2, 3, 4), |(c, l, g)| (100 * c + 10 * l + g) as f64 * 0.01)
    }

    #[test]
    fn reorder_transposes() {
        let tau_abs = tau_abs();
        let props = reorder_1scl(&tau_abs);
        assert_eq!(props.tau.dim(), (4, 3, 2));
        assert!(props.tau.is_standard_layout());
        for ((c, l, g), &tau) in tau_abs.indexed_iter() {
            assert_eq!(props.tau[[g, l, c]], tau);
        }
    }

    #[test]
    fn two_stream_combination() {
        let tau_abs = tau_abs();
        let tau_rayleigh = Array3::from_shape_fn((2, 3, 4), |(c, _, g)| {
            if g == 3 {
                0.
            } else {
                0.5 + c as f64
            }
        });
        let props = combine_and_reorder_2str(&tau_abs, &tau_rayleigh);
        assert_eq!(props.tau.dim(), (4, 3, 2));
        assert_eq!(props.ssa.dim(), (4, 3, 2));
        assert!(props.g.iter().all(|&g| g == 0.));

        for ((c, l, g), &tau) in tau_abs.indexed_iter() {
            let ray = tau_rayleigh[[c, l, g]];
            assert_eq!(props.tau[[g, l, c]], tau + ray);
            let ssa = props.ssa[[g, l, c]];
            assert!((0.0..=1.0).contains(&ssa));
            if ray == 0. {
                assert_eq!(ssa, 0.);
            } else {
                assert_relative_eq!(ssa, ray / (tau + ray));
            }
        }
    }

    #[test]
    fn no_optical_depth_is_not_scattering() {
        let zeros = Array3::zeros((1, 2, 2));
        let tiny = Array3::from_elem((1, 2, 2), f64::MIN_POSITIVE / 2.);
        let props = combine_and_reorder_2str(&zeros, &tiny);
        assert!(props.ssa.iter().all(|&ssa| ssa == 0.));
        assert!(props.tau.iter().all(|&tau| tau == f64::MIN_POSITIVE / 2.));
    }
}
