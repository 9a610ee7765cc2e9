//! Atmospheric state on the (column, layer) grid.

use ndarray::{Array1, Array2, Array3, ArrayView, ArrayView1, ArrayView2, ArrayView3, Axis, Dimension};

use crate::error::GasOpticsError;

/// Check that `actual` is the `expected` shape.
pub(crate) fn check_shape(
    name: &'static str,
    actual: &[usize],
    expected: &[usize],
) -> Result<(), GasOpticsError> {
    if actual == expected {
        Ok(())
    } else {
        Err(GasOpticsError::InconsistentInputs {
            name,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

/// Check that every value is within `[min, max]`. NaN is never in range.
pub(crate) fn check_range<D: Dimension>(
    name: &'static str,
    values: ArrayView<'_, f64, D>,
    min: f64,
    max: f64,
) -> Result<(), GasOpticsError> {
    if values.iter().all(|value| (min..=max).contains(value)) {
        Ok(())
    } else {
        Err(GasOpticsError::OutOfRange { name, min, max })
    }
}

/// Layer pressures, temperatures, and gas amounts for a set of columns.
#[derive(Debug, Clone)]
pub struct Atmosphere {
    /// Layer pressure in Pa, dimensioned as (column, layer)
    pub(crate) play: Array2<f64>,
    /// Layer temperature in K, dimensioned as (column, layer)
    pub(crate) tlay: Array2<f64>,
    /// Column amounts in molecules/cm², dimensioned as (column, layer, gas),
    /// with dry air as gas 0
    pub(crate) col_gas: Array3<f64>,
    /// Whether layer 0 is the top of the atmosphere
    pub(crate) top_at_1: bool,
}

impl Atmosphere {
    /// Check and bundle the atmospheric state.
    ///
    /// There must be at least one column and one layer, and at least dry air
    /// in `col_gas`. Pressures and temperatures must be positive and finite,
    /// gas amounts non-negative and finite, and the dry air amount positive.
    pub fn new(
        play: Array2<f64>,
        tlay: Array2<f64>,
        col_gas: Array3<f64>,
        top_at_1: bool,
    ) -> Result<Self, GasOpticsError> {
        let (ncol, nlay) = play.dim();
        if ncol == 0 || nlay == 0 {
            return Err(GasOpticsError::InconsistentInputs {
                name: "play",
                expected: vec![ncol.max(1), nlay.max(1)],
                actual: vec![ncol, nlay],
            });
        }
        check_shape("tlay", tlay.shape(), &[ncol, nlay])?;
        let ngas = col_gas.len_of(Axis(2)).max(1);
        check_shape("col_gas", col_gas.shape(), &[ncol, nlay, ngas])?;

        check_range("play", play.view(), f64::MIN_POSITIVE, f64::MAX)?;
        check_range("tlay", tlay.view(), f64::MIN_POSITIVE, f64::MAX)?;
        check_range("col_gas", col_gas.view(), 0., f64::MAX)?;
        check_range(
            "col_dry",
            col_gas.index_axis(Axis(2), 0),
            f64::MIN_POSITIVE,
            f64::MAX,
        )?;

        Ok(Self {
            play,
            tlay,
            col_gas,
            top_at_1,
        })
    }

    /// Number of columns.
    pub fn ncol(&self) -> usize {
        self.play.nrows()
    }

    /// Number of layers.
    pub fn nlay(&self) -> usize {
        self.play.ncols()
    }

    /// Number of gases in `col_gas`, not counting dry air.
    pub fn ngas(&self) -> usize {
        self.col_gas.len_of(Axis(2)) - 1
    }

    /// Layer pressure in Pa.
    pub fn play(&self) -> ArrayView2<'_, f64> {
        self.play.view()
    }

    /// Layer temperature in K.
    pub fn tlay(&self) -> ArrayView2<'_, f64> {
        self.tlay.view()
    }

    /// Gas column amounts, with dry air as gas 0.
    pub fn col_gas(&self) -> ArrayView3<'_, f64> {
        self.col_gas.view()
    }

    /// Whether layer 0 is the top of the atmosphere.
    pub fn top_at_1(&self) -> bool {
        self.top_at_1
    }
}

/// Level and surface temperatures, needed for the longwave sources.
#[derive(Debug, Clone)]
pub struct SourceTemperatures {
    /// Level temperature in K, dimensioned as (column, layer + 1)
    pub(crate) tlev: Array2<f64>,
    /// Surface temperature in K, for each column
    pub(crate) tsfc: Array1<f64>,
}

impl SourceTemperatures {
    /// Check and bundle the temperatures. Both must be positive and finite.
    pub fn new(tlev: Array2<f64>, tsfc: Array1<f64>) -> Result<Self, GasOpticsError> {
        check_shape("tsfc", tsfc.shape(), &[tlev.nrows()])?;
        check_range("tlev", tlev.view(), f64::MIN_POSITIVE, f64::MAX)?;
        check_range("tsfc", tsfc.view(), f64::MIN_POSITIVE, f64::MAX)?;
        Ok(Self { tlev, tsfc })
    }

    /// Check that the levels match the layers of `atmos`.
    pub(crate) fn check_against(&self, atmos: &Atmosphere) -> Result<(), GasOpticsError> {
        check_shape("tlev", self.tlev.shape(), &[atmos.ncol(), atmos.nlay() + 1])?;
        check_shape("tsfc", self.tsfc.shape(), &[atmos.ncol()])
    }

    /// Level temperature in K.
    pub fn tlev(&self) -> ArrayView2<'_, f64> {
        self.tlev.view()
    }

    /// Surface temperature in K.
    pub fn tsfc(&self) -> ArrayView1<'_, f64> {
        self.tsfc.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    fn col_gas(ncol: usize, nlay: usize) -> Array3<f64> {
        Array3::from_shape_fn((ncol, nlay, 3), |(_, _, gas)| if gas == 0 { 1e24 } else { 1e20 })
    }

    #[test]
    fn valid_atmosphere() {
        let atmos = Atmosphere::new(
            array![[90_000., 50_000.]],
            array![[280., 250.]],
            col_gas(1, 2),
            false,
        )
        .unwrap();
        assert_eq!(atmos.ncol(), 1);
        assert_eq!(atmos.nlay(), 2);
        assert_eq!(atmos.ngas(), 2);
        assert!(!atmos.top_at_1());
    }

    #[test]
    fn shape_mismatch_names_the_array() {
        let err = Atmosphere::new(
            array![[90_000., 50_000.]],
            array![[280., 250., 220.]],
            col_gas(1, 2),
            false,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GasOpticsError::InconsistentInputs {
                name: "tlay",
                expected: vec![1, 2],
                actual: vec![1, 3]
            }
        );

        let err = Atmosphere::new(
            array![[90_000., 50_000.]],
            array![[280., 250.]],
            col_gas(2, 2),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("col_gas"), "{err}");

        let err = Atmosphere::new(
            Array2::zeros((0, 3)),
            Array2::zeros((0, 3)),
            Array3::zeros((0, 3, 1)),
            true,
        )
        .unwrap_err();
        assert!(err.to_string().contains("play"), "{err}");
    }

    #[test]
    fn values_must_be_physical() {
        let mut negative = col_gas(1, 2);
        negative[[0, 1, 2]] = -1.;
        let err = Atmosphere::new(
            array![[90_000., 50_000.]],
            array![[280., 250.]],
            negative,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("col_gas"), "{err}");

        let mut no_air = col_gas(1, 2);
        no_air[[0, 0, 0]] = 0.;
        let err = Atmosphere::new(
            array![[90_000., 50_000.]],
            array![[280., 250.]],
            no_air,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("col_dry"), "{err}");

        let err = Atmosphere::new(
            array![[90_000., f64::NAN]],
            array![[280., 250.]],
            col_gas(1, 2),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("play"), "{err}");
    }

    #[test]
    fn source_temperatures_match_layers() {
        let atmos = Atmosphere::new(
            array![[90_000., 50_000.]],
            array![[280., 250.]],
            col_gas(1, 2),
            false,
        )
        .unwrap();

        let temps = SourceTemperatures::new(array![[290., 270., 230.]], array![292.]).unwrap();
        temps.check_against(&atmos).unwrap();

        let temps = SourceTemperatures::new(array![[290., 270.]], array![292.]).unwrap();
        let err = temps.check_against(&atmos).unwrap_err();
        assert!(err.to_string().contains("tlev"), "{err}");

        let err = SourceTemperatures::new(array![[290., 270.]], array![292., 293.]).unwrap_err();
        assert!(err.to_string().contains("tsfc"), "{err}");
        let err = SourceTemperatures::new(array![[290., -1.]], array![292.]).unwrap_err();
        assert!(err.to_string().contains("tlev"), "{err}");
    }
}
