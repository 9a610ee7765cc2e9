//! Python interface
//!
//! Arrays come in and go out as numpy arrays with the same dimension order as
//! the Rust side. Indices (gases, g-points, bands) are 0-based.

use log::{debug, info};
use ndarray::{Array2, Array3, ArrayView2};
use numpy::{
    PyArray2, PyArray3, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray3, PyReadonlyArray4,
    ToPyArray,
};
use pyo3::exceptions::{PyIndexError, PyValueError};
use pyo3::prelude::*;

use crate::error::GasOpticsError;
use crate::gas_optics::{
    self, Atmosphere, ComputeOptions, MinorAbsorber, MinorAbsorbers, MinorScaling,
    ReferenceGrid, SourceTables, SourceTemperatures, SpectralMap,
};

impl From<GasOpticsError> for PyErr {
    fn from(e: GasOpticsError) -> Self {
        match e {
            GasOpticsError::InconsistentInputs { .. } => PyValueError::new_err(e.to_string()),
            GasOpticsError::OutOfRange { .. } => PyValueError::new_err(e.to_string()),
            GasOpticsError::InconsistentTable { .. } => PyValueError::new_err(e.to_string()),
            GasOpticsError::InvalidIndex { .. } => PyIndexError::new_err(e.to_string()),
            GasOpticsError::MissingSource(_) => PyValueError::new_err(e.to_string()),
            GasOpticsError::NotContiguous => PyValueError::new_err(e.to_string()),
        }
    }
}

/// Convert a Python-side index to `usize`.
fn to_index(name: &'static str, value: i64) -> Result<usize, GasOpticsError> {
    usize::try_from(value).map_err(|_| GasOpticsError::OutOfRange {
        name,
        min: 0.,
        max: i64::MAX as f64,
    })
}

/// Build the minor absorbers from a `kminor` table and a descriptor array.
///
/// Each row of `descriptors` is (gas, first g-point, last g-point + 1,
/// `kminor` start, scales with density, scale by complement, scaling gas),
/// where the flags are 0 or 1 and a scaling gas of -1 means none.
fn minor_absorbers(
    kminor: PyReadonlyArray3<'_, f64>,
    descriptors: PyReadonlyArray2<'_, i64>,
) -> Result<MinorAbsorbers, GasOpticsError> {
    let descriptors = descriptors.as_array();
    if descriptors.ncols() != 7 {
        return Err(GasOpticsError::InconsistentTable {
            name: "minor descriptors",
            expected: vec![descriptors.nrows(), 7],
            actual: descriptors.shape().to_vec(),
        });
    }

    let absorbers = descriptors
        .rows()
        .into_iter()
        .map(|row| -> Result<_, GasOpticsError> {
            let scaling_gas = match row[6] {
                -1 => None,
                gas => Some(to_index("minor scaling gas", gas)?),
            };
            Ok(MinorAbsorber {
                gas: to_index("minor gas", row[0])?,
                gpts: to_index("minor g-point", row[1])?..to_index("minor g-point", row[2])?,
                kminor_start: to_index("kminor_start", row[3])?,
                scaling: MinorScaling::from_flags(row[4] != 0, row[5] != 0, scaling_gas),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    MinorAbsorbers::new(kminor.as_array().to_owned(), absorbers)
}

/// Key species of each band, from an array dimensioned as (band, 4) with the
/// lower atmosphere pair first.
fn parse_key_species(
    key_species: ArrayView2<'_, i64>,
    nband: usize,
) -> Result<Vec<[[usize; 2]; 2]>, GasOpticsError> {
    if key_species.shape() != [nband, 4] {
        return Err(GasOpticsError::InconsistentTable {
            name: "key_species",
            expected: vec![nband, 4],
            actual: key_species.shape().to_vec(),
        });
    }
    key_species
        .rows()
        .into_iter()
        .map(|row| -> Result<_, GasOpticsError> {
            Ok([
                [to_index("key_species", row[0])?, to_index("key_species", row[1])?],
                [to_index("key_species", row[2])?, to_index("key_species", row[3])?],
            ])
        })
        .collect()
}

fn thread_pool(num_threads: Option<usize>) -> PyResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Longwave results.
///
/// `tau` is dimensioned as (`ngpt`, `nlay`, `ncol`), the surface sources as
/// (`ncol`, `ngpt`), and the other sources as (`ncol`, `nlay`, `ngpt`).
#[pyclass]
struct LongwaveResults {
    tau: Array3<f64>,
    sfc_src: Array2<f64>,
    sfc_src_jac: Array2<f64>,
    lay_src: Array3<f64>,
    lev_src_inc: Array3<f64>,
    lev_src_dec: Array3<f64>,
    #[pyo3(get)]
    clamped_temperature: usize,
    #[pyo3(get)]
    clamped_pressure: usize,
}

#[pymethods]
impl LongwaveResults {
    #[getter]
    fn tau<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.tau.to_pyarray(py)
    }

    #[getter]
    fn sfc_src<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.sfc_src.to_pyarray(py)
    }

    #[getter]
    fn sfc_src_jac<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.sfc_src_jac.to_pyarray(py)
    }

    #[getter]
    fn lay_src<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.lay_src.to_pyarray(py)
    }

    #[getter]
    fn lev_src_inc<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.lev_src_inc.to_pyarray(py)
    }

    #[getter]
    fn lev_src_dec<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.lev_src_dec.to_pyarray(py)
    }
}

/// Shortwave results.
///
/// `tau`, `ssa`, and `g` are dimensioned as (`ngpt`, `nlay`, `ncol`), and
/// `toa_src` as (`ncol`, `ngpt`).
#[pyclass]
struct ShortwaveResults {
    tau: Array3<f64>,
    ssa: Array3<f64>,
    g: Array3<f64>,
    toa_src: Array2<f64>,
    #[pyo3(get)]
    clamped_temperature: usize,
    #[pyo3(get)]
    clamped_pressure: usize,
}

#[pymethods]
impl ShortwaveResults {
    #[getter]
    fn tau<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.tau.to_pyarray(py)
    }

    #[getter]
    fn ssa<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.ssa.to_pyarray(py)
    }

    #[getter]
    fn g<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.g.to_pyarray(py)
    }

    #[getter]
    fn toa_src<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.toa_src.to_pyarray(py)
    }
}

/// Gas optics tables.
///
/// `press_ref` (Pa) and `temp_ref` (K) are the reference axes, and
/// `vmr_ref` is dimensioned as (2, `ngas` + 1, `ntemp`) with dry air first.
/// `kmajor` and `pfracin` are dimensioned as (`ntemp`, `npres` + 1, `neta`,
/// `ngpt`), the `kminor` tables as (`ntemp`, `neta`, contributors), `krayl` as
/// (2, `ntemp`, `neta`, `ngpt`), and `totplnk` as (Planck temperatures,
/// `nband`).
///
/// `band_lims_gpt` is dimensioned as (`nband`, 2) with the first g-point and
/// one past the last g-point of each band. `key_species` is dimensioned as
/// (`nband`, 4): the gas pair of the lower atmosphere, then of the upper
/// atmosphere.
///
/// Either `pfracin` and `totplnk` (longwave) or `solar_src` (shortwave) must
/// be given.
#[pyclass(name = "GasOptics")]
struct PyGasOptics {
    inner: gas_optics::GasOptics,
}

#[pymethods]
impl PyGasOptics {
    #[new]
    #[pyo3(signature = (press_ref, press_ref_trop, temp_ref, vmr_ref, kmajor, key_species, band_lims_gpt, kminor_lower, minor_lower, kminor_upper, minor_upper, idx_h2o, krayl=None, pfracin=None, totplnk=None, solar_src=None))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        press_ref: PyReadonlyArray1<'_, f64>,
        press_ref_trop: f64,
        temp_ref: PyReadonlyArray1<'_, f64>,
        vmr_ref: PyReadonlyArray3<'_, f64>,
        kmajor: PyReadonlyArray4<'_, f64>,
        key_species: PyReadonlyArray2<'_, i64>,
        band_lims_gpt: PyReadonlyArray2<'_, i64>,
        kminor_lower: PyReadonlyArray3<'_, f64>,
        minor_lower: PyReadonlyArray2<'_, i64>,
        kminor_upper: PyReadonlyArray3<'_, f64>,
        minor_upper: PyReadonlyArray2<'_, i64>,
        idx_h2o: usize,
        krayl: Option<PyReadonlyArray4<'_, f64>>,
        pfracin: Option<PyReadonlyArray4<'_, f64>>,
        totplnk: Option<PyReadonlyArray2<'_, f64>>,
        solar_src: Option<PyReadonlyArray1<'_, f64>>,
    ) -> PyResult<Self> {
        let grid = ReferenceGrid::new(
            press_ref
                .as_slice()
                .map_err(|_| GasOpticsError::NotContiguous)?,
            press_ref_trop,
            temp_ref
                .as_slice()
                .map_err(|_| GasOpticsError::NotContiguous)?,
            vmr_ref.as_array().to_owned(),
        )?;

        let band_lims_gpt = band_lims_gpt.as_array();
        if band_lims_gpt.ncols() != 2 {
            return Err(GasOpticsError::InconsistentTable {
                name: "band_lims_gpt",
                expected: vec![band_lims_gpt.nrows(), 2],
                actual: band_lims_gpt.shape().to_vec(),
            }
            .into());
        }
        let band_lims_gpt = band_lims_gpt
            .rows()
            .into_iter()
            .map(|row| -> Result<_, GasOpticsError> {
                Ok(to_index("band_lims_gpt", row[0])?..to_index("band_lims_gpt", row[1])?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let key_species = parse_key_species(key_species.as_array(), band_lims_gpt.len())?;
        let spectral = SpectralMap::from_key_species(&key_species, band_lims_gpt)?;

        let source = match (pfracin, totplnk, solar_src) {
            (Some(pfracin), Some(totplnk), None) => SourceTables::Planck {
                pfracin: pfracin.as_array().to_owned(),
                totplnk: totplnk.as_array().to_owned(),
            },
            (None, None, Some(solar_src)) => SourceTables::Solar {
                solar_src: solar_src.as_array().to_owned(),
            },
            _ => {
                return Err(PyValueError::new_err(
                    "give either pfracin and totplnk, or solar_src",
                ))
            }
        };

        let inner = gas_optics::GasOptics::new(
            grid,
            spectral,
            kmajor.as_array().to_owned(),
            minor_absorbers(kminor_lower, minor_lower)?,
            minor_absorbers(kminor_upper, minor_upper)?,
            idx_h2o,
            krayl.map(|krayl| krayl.as_array().to_owned()),
            source,
        )?;
        debug!("loaded gas optics tables with {} g-points", inner.ngpt());

        Ok(Self { inner })
    }

    /// Number of g-points.
    #[getter]
    fn ngpt(&self) -> usize {
        self.inner.ngpt()
    }

    /// Number of bands.
    #[getter]
    fn nband(&self) -> usize {
        self.inner.nband()
    }

    /// Band index of each g-point.
    #[getter]
    fn gpoint_bands(&self) -> Vec<usize> {
        self.inner.gpoint_bands()
    }

    /// Compute the longwave optical depth and Planck sources.
    ///
    /// `play` (Pa) and `tlay` (K) are dimensioned as (`ncol`, `nlay`),
    /// `col_gas` (molecules/cm²) as (`ncol`, `nlay`, `ngas` + 1) with dry air
    /// first, `tlev` (K) as (`ncol`, `nlay` + 1), and `tsfc` (K) as (`ncol`, ).
    ///
    /// The number of worker threads is controlled by `num_threads`. It must be
    /// a positive integer, or `None` to automatically choose the number of
    /// threads.
    #[pyo3(signature = (play, tlay, col_gas, tlev, tsfc, top_at_1, check_values=true, num_threads=None))]
    #[allow(clippy::too_many_arguments)]
    fn compute_lw(
        &self,
        py: Python<'_>,
        play: PyReadonlyArray2<'_, f64>,
        tlay: PyReadonlyArray2<'_, f64>,
        col_gas: PyReadonlyArray3<'_, f64>,
        tlev: PyReadonlyArray2<'_, f64>,
        tsfc: PyReadonlyArray1<'_, f64>,
        top_at_1: bool,
        check_values: bool,
        num_threads: Option<usize>,
    ) -> PyResult<LongwaveResults> {
        let atmos = Atmosphere::new(
            play.as_array().to_owned(),
            tlay.as_array().to_owned(),
            col_gas.as_array().to_owned(),
            top_at_1,
        )?;
        let temps = SourceTemperatures::new(tlev.as_array().to_owned(), tsfc.as_array().to_owned())?;
        debug!("input shapes are consistent");

        let pool = thread_pool(num_threads)?;
        info!(
            "Processing longwave gas optics for {} columns and {} layers",
            atmos.ncol(),
            atmos.nlay()
        );
        let options = ComputeOptions { check_values };
        let outputs = py.allow_threads(|| {
            pool.install(|| self.inner.compute_lw(&atmos, &temps, options))
        })?;

        let sources = outputs.sources;
        Ok(LongwaveResults {
            tau: outputs.optical_props.tau,
            sfc_src: sources.sfc_src,
            sfc_src_jac: sources.sfc_src_jac,
            lay_src: sources.lay_src,
            lev_src_inc: sources.lev_src_inc,
            lev_src_dec: sources.lev_src_dec,
            clamped_temperature: outputs.clamped.temperature,
            clamped_pressure: outputs.clamped.pressure,
        })
    }

    /// Compute the shortwave optical properties and top-of-atmosphere source.
    ///
    /// The inputs are as for `compute_lw`, without the level and surface
    /// temperatures.
    #[pyo3(signature = (play, tlay, col_gas, top_at_1, check_values=true, num_threads=None))]
    #[allow(clippy::too_many_arguments)]
    fn compute_sw(
        &self,
        py: Python<'_>,
        play: PyReadonlyArray2<'_, f64>,
        tlay: PyReadonlyArray2<'_, f64>,
        col_gas: PyReadonlyArray3<'_, f64>,
        top_at_1: bool,
        check_values: bool,
        num_threads: Option<usize>,
    ) -> PyResult<ShortwaveResults> {
        let atmos = Atmosphere::new(
            play.as_array().to_owned(),
            tlay.as_array().to_owned(),
            col_gas.as_array().to_owned(),
            top_at_1,
        )?;
        debug!("input shapes are consistent");

        let pool = thread_pool(num_threads)?;
        info!(
            "Processing shortwave gas optics for {} columns and {} layers",
            atmos.ncol(),
            atmos.nlay()
        );
        let options = ComputeOptions { check_values };
        let outputs =
            py.allow_threads(|| pool.install(|| self.inner.compute_sw(&atmos, options)))?;

        let props = outputs.optical_props;
        Ok(ShortwaveResults {
            tau: props.tau,
            ssa: props.ssa,
            g: props.g,
            toa_src: outputs.toa_src,
            clamped_temperature: outputs.clamped.temperature,
            clamped_pressure: outputs.clamped.pressure,
        })
    }
}

/// A Python module implemented in Rust.
#[pymodule]
fn rte_gas_optics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_class::<PyGasOptics>()?;
    m.add_class::<LongwaveResults>()?;
    m.add_class::<ShortwaveResults>()?;
    Ok(())
}
