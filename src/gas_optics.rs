//! Correlated-k gas optics
//!
//! Optical depths and source functions of the gases in each layer, for each
//! g-point, from tabulated absorption coefficients. The tables are indexed by
//! temperature, log-pressure, and "eta", the share of a pair of major gases
//! (a "flavor") in their combined column amount.
//!
//! A computation first locates every layer in the tables (see
//! [`compute_interpolation`]), then the evaluators interpolate the tables with
//! those coefficients. Absorption is accumulated from the major species, then
//! the minor species of the lower and upper atmosphere.

mod core;

pub mod atmosphere;
pub mod combine;
pub mod interpolation;
pub mod major;
pub mod minor;
pub mod planck;
pub mod rayleigh;
pub mod tables;


use std::ops::Range;

use log::{debug, info};
use ndarray::{Array2, Array3, Array4, Axis};

pub use self::atmosphere::{Atmosphere, SourceTemperatures};
pub use self::combine::{OpticalProps1Scalar, OpticalProps2Stream};
pub use self::interpolation::{compute_interpolation, ClampCounts, InterpolationCoefficients};
pub use self::planck::PlanckSources;
pub use self::tables::{
    AtmosphereHalf, MinorAbsorber, MinorAbsorbers, MinorScaling, ReferenceGrid, SourceTables,
    SpectralMap,
};

use self::atmosphere::{check_range, check_shape};
use crate::error::GasOpticsError;

/// Options for a single computation.
#[derive(Debug, Clone, Copy)]
pub struct ComputeOptions {
    /// Reject pressures and temperatures outside the reference grid, rather
    /// than extrapolating the tables
    pub check_values: bool,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self { check_values: true }
    }
}

/// Longwave results.
#[derive(Debug, Clone)]
pub struct LongwaveOutputs {
    /// Absorption optical depth
    pub optical_props: OpticalProps1Scalar,
    /// Planck sources
    pub sources: PlanckSources,
    /// Layers extrapolated beyond the reference grid
    pub clamped: ClampCounts,
}

/// Shortwave results.
#[derive(Debug, Clone)]
pub struct ShortwaveOutputs {
    /// Optical depth, single-scattering albedo, and asymmetry parameter
    pub optical_props: OpticalProps2Stream,
    /// Solar source at the top of the atmosphere, dimensioned as (column,
    /// g-point)
    pub toa_src: Array2<f64>,
    /// Layers extrapolated beyond the reference grid
    pub clamped: ClampCounts,
}

/// The gas optics tables, ready to compute with.
#[derive(Debug, Clone)]
pub struct GasOptics {
    grid: ReferenceGrid,
    spectral: SpectralMap,
    /// Dimensioned as (temperature, pressure + 1, eta, g-point)
    kmajor: Array4<f64>,
    minor_lower: MinorAbsorbers,
    minor_upper: MinorAbsorbers,
    /// Index of water vapor in the gas column amounts
    idx_h2o: usize,
    /// Dimensioned as (half, temperature, eta, g-point)
    krayl: Option<Array4<f64>>,
    source: SourceTables,
}

/// Check a table's shape against what the rest of the tables say it should be.
fn check_table(name: &'static str, actual: &[usize], expected: &[usize]) -> Result<(), GasOpticsError> {
    if actual == expected {
        Ok(())
    } else {
        Err(GasOpticsError::InconsistentTable {
            name,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

/// Check that a gas index addresses one of the gases (or dry air).
fn check_gas(name: &'static str, gas: usize, ngas: usize) -> Result<(), GasOpticsError> {
    if gas <= ngas {
        Ok(())
    } else {
        Err(GasOpticsError::InvalidIndex {
            name,
            index: gas,
            limit: ngas + 1,
        })
    }
}

impl GasOptics {
    /// Bundle the tables, checking that they agree with each other.
    ///
    /// The shapes of `kmajor`, the minor tables, `krayl`, and the source
    /// tables must agree with the reference grid and the spectral map, and
    /// the gas indices in the flavors and the minor absorbers must address
    /// the gases of the reference grid. `krayl` is only needed for the
    /// shortwave.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid: ReferenceGrid,
        spectral: SpectralMap,
        kmajor: Array4<f64>,
        minor_lower: MinorAbsorbers,
        minor_upper: MinorAbsorbers,
        idx_h2o: usize,
        krayl: Option<Array4<f64>>,
        source: SourceTables,
    ) -> Result<Self, GasOpticsError> {
        let (ntemp, npres, ngas) = (grid.ntemp(), grid.npres(), grid.ngas());
        let ngpt = spectral.ngpt();
        let neta = kmajor.len_of(Axis(2));

        check_table("kmajor", kmajor.shape(), &[ntemp, npres + 1, neta.max(2), ngpt])?;
        check_gas("idx_h2o", idx_h2o, ngas)?;
        for &gas in spectral.flavors().iter().flatten() {
            check_gas("flavor", gas, ngas)?;
        }

        for (name, minor) in [("kminor_lower", &minor_lower), ("kminor_upper", &minor_upper)] {
            let ncontrib = minor.kminor.len_of(Axis(2));
            check_table(name, minor.kminor.shape(), &[ntemp, neta, ncontrib])?;
            for absorber in minor.absorbers() {
                check_gas("minor gas", absorber.gas, ngas)?;
                if let Some(gas) = absorber.scaling.scaling_gas() {
                    check_gas("minor scaling gas", gas, ngas)?;
                }
                if absorber.gpts.end > ngpt || absorber.gpts.is_empty() {
                    return Err(GasOpticsError::InvalidIndex {
                        name: "minor g-point",
                        index: absorber.gpts.end.saturating_sub(1),
                        limit: ngpt,
                    });
                }
            }
        }

        if let Some(krayl) = &krayl {
            check_table("krayl", krayl.shape(), &[2, ntemp, neta, ngpt])?;
        }
        match &source {
            SourceTables::Planck { pfracin, totplnk } => {
                check_table("pfracin", pfracin.shape(), kmajor.shape())?;
                let nplanck = totplnk.nrows().max(2);
                check_table("totplnk", totplnk.shape(), &[nplanck, spectral.nband()])?;
            }
            SourceTables::Solar { solar_src } => {
                check_table("solar_src", solar_src.shape(), &[ngpt])?;
            }
        }

        debug!(
            "gas optics tables: {ntemp} temperatures, {npres} pressures, {neta} etas, {ngas} gases, {} flavors, {} bands, {ngpt} g-points",
            spectral.nflav(),
            spectral.nband()
        );

        Ok(Self {
            grid,
            spectral,
            kmajor,
            minor_lower,
            minor_upper,
            idx_h2o,
            krayl,
            source,
        })
    }

    /// Validate `atmos` and compute the absorption optical depth, dimensioned
    /// as (column, layer, g-point), along with the interpolation coefficients.
    pub fn compute_gas_taus(
        &self,
        atmos: &Atmosphere,
        options: ComputeOptions,
    ) -> Result<(Array3<f64>, InterpolationCoefficients), GasOpticsError> {
        let (ncol, nlay) = (atmos.ncol(), atmos.nlay());
        check_shape(
            "col_gas",
            atmos.col_gas.shape(),
            &[ncol, nlay, self.grid.ngas() + 1],
        )?;
        if options.check_values {
            let (pmin, pmax) = self.grid.press_ref_bounds();
            check_range("play", atmos.play(), pmin, pmax)?;
            let (tmin, tmax) = self.grid.temp_ref_bounds();
            check_range("tlay", atmos.tlay(), tmin, tmax)?;
        }

        info!(
            "computing gas optical depths for {ncol} columns, {nlay} layers, and {} g-points",
            self.ngpt()
        );
        let coefs = compute_interpolation(
            &self.grid,
            self.spectral.flavors(),
            self.kmajor.len_of(Axis(2)),
            atmos.play(),
            atmos.tlay(),
            atmos.col_gas(),
        );

        let mut tau = Array3::zeros((ncol, nlay, self.ngpt()));
        major::gas_optical_depths_major(&self.spectral, self.kmajor.view(), &coefs, &mut tau);
        for (half, minor) in [
            (AtmosphereHalf::Lower, &self.minor_lower),
            (AtmosphereHalf::Upper, &self.minor_upper),
        ] {
            minor::gas_optical_depths_minor(
                half,
                &self.spectral,
                minor,
                self.idx_h2o,
                atmos.play(),
                atmos.tlay(),
                atmos.col_gas(),
                &coefs,
                &coefs.layer_limits(half),
                &mut tau,
            );
        }

        Ok((tau, coefs))
    }

    /// Compute the longwave absorption optical depth and Planck sources.
    ///
    /// Fails with [`GasOpticsError::MissingSource`] if the tables don't carry
    /// Planck source tables.
    pub fn compute_lw(
        &self,
        atmos: &Atmosphere,
        temps: &SourceTemperatures,
        options: ComputeOptions,
    ) -> Result<LongwaveOutputs, GasOpticsError> {
        let SourceTables::Planck { pfracin, totplnk } = &self.source else {
            return Err(GasOpticsError::MissingSource("Planck source tables"));
        };
        temps.check_against(atmos)?;
        if options.check_values {
            let (tmin, tmax) = self.grid.temp_ref_bounds();
            check_range("tlev", temps.tlev(), tmin, tmax)?;
            check_range("tsfc", temps.tsfc(), tmin, tmax)?;
        }

        let (tau, coefs) = self.compute_gas_taus(atmos, options)?;
        let sources = planck::compute_planck_source(
            &self.grid,
            &self.spectral,
            pfracin.view(),
            totplnk.view(),
            atmos.tlay(),
            temps.tlev(),
            temps.tsfc(),
            atmos.top_at_1(),
            &coefs,
        );

        Ok(LongwaveOutputs {
            optical_props: combine::reorder_1scl(&tau),
            sources,
            clamped: coefs.clamped(),
        })
    }

    /// Compute the shortwave optical properties and top-of-atmosphere source.
    ///
    /// Fails with [`GasOpticsError::MissingSource`] if the tables don't carry
    /// a solar source or Rayleigh scattering coefficients.
    pub fn compute_sw(
        &self,
        atmos: &Atmosphere,
        options: ComputeOptions,
    ) -> Result<ShortwaveOutputs, GasOpticsError> {
        let SourceTables::Solar { solar_src } = &self.source else {
            return Err(GasOpticsError::MissingSource("a solar source"));
        };
        let krayl = self
            .krayl
            .as_ref()
            .ok_or(GasOpticsError::MissingSource("Rayleigh scattering tables"))?;

        let (tau, coefs) = self.compute_gas_taus(atmos, options)?;
        let tau_rayleigh = rayleigh::compute_tau_rayleigh(
            &self.spectral,
            krayl.view(),
            self.idx_h2o,
            atmos.col_gas(),
            &coefs,
        );
        let toa_src = Array2::from_shape_fn((atmos.ncol(), self.ngpt()), |(_, igpt)| solar_src[igpt]);

        Ok(ShortwaveOutputs {
            optical_props: combine::combine_and_reorder_2str(&tau, &tau_rayleigh),
            toa_src,
            clamped: coefs.clamped(),
        })
    }

    /// Number of g-points.
    pub fn ngpt(&self) -> usize {
        self.spectral.ngpt()
    }

    /// Number of bands.
    pub fn nband(&self) -> usize {
        self.spectral.nband()
    }

    /// Number of gases, not counting dry air.
    pub fn ngas(&self) -> usize {
        self.grid.ngas()
    }

    /// Number of flavors.
    pub fn nflav(&self) -> usize {
        self.spectral.nflav()
    }

    /// G-point range of each band.
    pub fn band_lims_gpt(&self) -> &[Range<usize>] {
        self.spectral.band_lims_gpt()
    }

    /// Band index of each g-point.
    pub fn gpoint_bands(&self) -> Vec<usize> {
        self.spectral.gpoint_bands()
    }

    /// Minimum reference temperature (K).
    pub fn temp_ref_min(&self) -> f64 {
        self.grid.temp_ref_bounds().0
    }

    /// Maximum reference temperature (K).
    pub fn temp_ref_max(&self) -> f64 {
        self.grid.temp_ref_bounds().1
    }

    /// Minimum reference pressure (Pa).
    pub fn press_ref_min(&self) -> f64 {
        self.grid.press_ref_bounds().0
    }

    /// Maximum reference pressure (Pa).
    pub fn press_ref_max(&self) -> f64 {
        self.grid.press_ref_bounds().1
    }

    /// Whether the tables are for an internal (Planck) source.
    pub fn source_is_internal(&self) -> bool {
        matches!(self.source, SourceTables::Planck { .. })
    }

    /// Whether the tables are for an external (solar) source.
    pub fn source_is_external(&self) -> bool {
        matches!(self.source, SourceTables::Solar { .. })
    }

    /// The reference grid.
    pub fn grid(&self) -> &ReferenceGrid {
        &self.grid
    }

    /// The spectral map.
    pub fn spectral(&self) -> &SpectralMap {
        &self.spectral
    }
}
