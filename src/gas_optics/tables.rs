//! Reference tables and the descriptors that tie them to g-points.
//!
//! Everything here is read-only once built. The constructors check shapes and
//! indices so that the evaluators can index without further checks.

use std::ops::Range;

use ndarray::{s, Array1, Array2, Array3, Array4};

use crate::error::GasOpticsError;

/// Which half of the reference tables applies to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtmosphereHalf {
    /// Below the reference tropopause (higher pressure)
    Lower,
    /// Above the reference tropopause
    Upper,
}

impl AtmosphereHalf {
    /// Classify a layer from its troposphere flag.
    #[inline]
    pub fn from_tropo(tropo: bool) -> Self {
        if tropo {
            AtmosphereHalf::Lower
        } else {
            AtmosphereHalf::Upper
        }
    }

    /// Index into the leading "half" axis of the tables, and also the offset
    /// into the pressure axis of `kmajor`/`pfracin`.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            AtmosphereHalf::Lower => 0,
            AtmosphereHalf::Upper => 1,
        }
    }
}

/// The temperature and pressure axes of the tables, and the reference volume
/// mixing ratios used to build the eta axis.
#[derive(Debug, Clone)]
pub struct ReferenceGrid {
    /// Natural log of the reference pressures (Pa), with length `npres`
    pub(crate) press_ref_log: Array1<f64>,
    /// Uniform spacing of `press_ref_log`
    pub(crate) press_ref_log_delta: f64,
    /// Natural log of the reference tropopause pressure
    pub(crate) press_ref_trop_log: f64,
    pub(crate) press_ref_min: f64,
    pub(crate) press_ref_max: f64,
    /// Reference temperatures (K), with length `ntemp`
    pub(crate) temp_ref: Array1<f64>,
    pub(crate) temp_ref_min: f64,
    pub(crate) temp_ref_max: f64,
    /// Uniform spacing of `temp_ref`
    pub(crate) temp_ref_delta: f64,
    /// Reference volume mixing ratios, dimensioned as (half, gas, temperature),
    /// where gas 0 is dry air
    pub(crate) vmr_ref: Array3<f64>,
}

impl ReferenceGrid {
    /// Build the grid from the reference pressures (Pa), tropopause pressure
    /// (Pa), reference temperatures (K), and reference volume mixing ratios.
    ///
    /// Both axes must have at least two nodes and are assumed to be uniformly
    /// spaced (in log-pressure and temperature respectively); the spacing is
    /// taken from the end points. `vmr_ref` is dimensioned as (2, `ngas + 1`,
    /// `ntemp`).
    pub fn new(
        press_ref: &[f64],
        press_ref_trop: f64,
        temp_ref: &[f64],
        vmr_ref: Array3<f64>,
    ) -> Result<Self, GasOpticsError> {
        let npres = press_ref.len();
        let ntemp = temp_ref.len();
        if npres < 2 {
            return Err(GasOpticsError::InconsistentTable {
                name: "press_ref",
                expected: vec![2],
                actual: vec![npres],
            });
        }
        if ntemp < 2 {
            return Err(GasOpticsError::InconsistentTable {
                name: "temp_ref",
                expected: vec![2],
                actual: vec![ntemp],
            });
        }
        if press_ref
            .iter()
            .chain([&press_ref_trop])
            .any(|&p| p.is_nan() || p <= 0. || p.is_infinite())
        {
            return Err(GasOpticsError::OutOfRange {
                name: "press_ref",
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }
        let shape = vmr_ref.shape();
        if shape[0] != 2 || shape[1] == 0 || shape[2] != ntemp {
            return Err(GasOpticsError::InconsistentTable {
                name: "vmr_ref",
                expected: vec![2, shape[1].max(1), ntemp],
                actual: shape.to_vec(),
            });
        }
        // Ratios of these set the eta axis
        if vmr_ref.iter().any(|&v| v.is_nan() || v <= 0. || v.is_infinite()) {
            return Err(GasOpticsError::OutOfRange {
                name: "vmr_ref",
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }

        let press_ref_log: Array1<f64> = press_ref.iter().map(|p| p.ln()).collect();
        let press_ref_log_delta = (press_ref_log[npres - 1] - press_ref_log[0]) / (npres - 1) as f64;
        if press_ref_log_delta == 0. {
            return Err(GasOpticsError::OutOfRange {
                name: "press_ref",
                min: press_ref[0],
                max: press_ref[0],
            });
        }
        let temp_ref = Array1::from(temp_ref.to_vec());
        let temp_ref_delta = (temp_ref[ntemp - 1] - temp_ref[0]) / (ntemp - 1) as f64;
        if temp_ref_delta.is_nan() || temp_ref_delta <= 0. || temp_ref_delta.is_infinite() {
            return Err(GasOpticsError::OutOfRange {
                name: "temp_ref",
                min: temp_ref[0],
                max: temp_ref[0],
            });
        }

        Ok(Self {
            press_ref_log_delta,
            press_ref_trop_log: press_ref_trop.ln(),
            press_ref_min: press_ref.iter().copied().fold(f64::INFINITY, f64::min),
            press_ref_max: press_ref.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            press_ref_log,
            temp_ref_min: temp_ref.iter().copied().fold(f64::INFINITY, f64::min),
            temp_ref_max: temp_ref.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            temp_ref_delta,
            temp_ref,
            vmr_ref,
        })
    }

    /// Number of reference pressures.
    pub fn npres(&self) -> usize {
        self.press_ref_log.len()
    }

    /// Number of reference temperatures.
    pub fn ntemp(&self) -> usize {
        self.temp_ref.len()
    }

    /// Number of gases, not counting dry air.
    pub fn ngas(&self) -> usize {
        self.vmr_ref.shape()[1] - 1
    }

    /// Minimum and maximum reference pressure (Pa).
    pub fn press_ref_bounds(&self) -> (f64, f64) {
        (self.press_ref_min, self.press_ref_max)
    }

    /// Minimum and maximum reference temperature (K).
    pub fn temp_ref_bounds(&self) -> (f64, f64) {
        (self.temp_ref_min, self.temp_ref_max)
    }
}

/// How flavors, bands, and g-points relate to each other.
#[derive(Debug, Clone)]
pub struct SpectralMap {
    /// Gas pair for each flavor
    pub(crate) flavor: Vec<[usize; 2]>,
    /// Flavor for each (half, g-point)
    pub(crate) gpoint_flavor: Array2<usize>,
    /// Contiguous g-point range of each band
    pub(crate) band_lims_gpt: Vec<Range<usize>>,
}

/// Check that the bands tile `0..ngpt` in order, returning `ngpt`.
fn check_band_lims(band_lims_gpt: &[Range<usize>]) -> Result<usize, GasOpticsError> {
    let mut next = 0;
    for band in band_lims_gpt {
        if band.start != next || band.end <= band.start {
            return Err(GasOpticsError::InvalidIndex {
                name: "band_lims_gpt start",
                index: band.start,
                limit: next + 1,
            });
        }
        next = band.end;
    }
    if next == 0 {
        return Err(GasOpticsError::InconsistentTable {
            name: "band_lims_gpt",
            expected: vec![1],
            actual: vec![0],
        });
    }
    Ok(next)
}

impl SpectralMap {
    /// Create from an explicit flavor list and g-point to flavor map.
    ///
    /// `gpoint_flavor` is dimensioned as (2, `ngpt`) and must be constant
    /// within each band: the evaluators only read the flavor of the first
    /// g-point of a band.
    pub fn new(
        flavor: Vec<[usize; 2]>,
        gpoint_flavor: Array2<usize>,
        band_lims_gpt: Vec<Range<usize>>,
    ) -> Result<Self, GasOpticsError> {
        let ngpt = check_band_lims(&band_lims_gpt)?;
        if gpoint_flavor.shape() != [2, ngpt] {
            return Err(GasOpticsError::InconsistentTable {
                name: "gpoint_flavor",
                expected: vec![2, ngpt],
                actual: gpoint_flavor.shape().to_vec(),
            });
        }
        if let Some(&iflav) = gpoint_flavor.iter().find(|&&iflav| iflav >= flavor.len()) {
            return Err(GasOpticsError::InvalidIndex {
                name: "gpoint_flavor",
                index: iflav,
                limit: flavor.len(),
            });
        }
        for gpts in &band_lims_gpt {
            for band_flavor in gpoint_flavor.slice(s![.., gpts.clone()]).rows() {
                let mut distinct: Vec<usize> = band_flavor.to_vec();
                distinct.sort_unstable();
                distinct.dedup();
                if distinct.len() > 1 {
                    return Err(GasOpticsError::InconsistentTable {
                        name: "flavors of a band in gpoint_flavor",
                        expected: vec![1],
                        actual: vec![distinct.len()],
                    });
                }
            }
        }

        Ok(Self {
            flavor,
            gpoint_flavor,
            band_lims_gpt,
        })
    }

    /// Create from the key species of each band.
    ///
    /// `key_species[band][half]` is the pair of major gases for that band in
    /// the lower and upper atmosphere. A `[0, 0]` pair marks a band without
    /// major absorbers in that half; it is mapped to the pair `[2, 2]` so the
    /// g-points still have a valid flavor to interpolate with. Flavors are
    /// numbered in the order they are first seen.
    pub fn from_key_species(
        key_species: &[[[usize; 2]; 2]],
        band_lims_gpt: Vec<Range<usize>>,
    ) -> Result<Self, GasOpticsError> {
        let ngpt = check_band_lims(&band_lims_gpt)?;
        if key_species.len() != band_lims_gpt.len() {
            return Err(GasOpticsError::InconsistentTable {
                name: "key_species",
                expected: vec![band_lims_gpt.len(), 2, 2],
                actual: vec![key_species.len(), 2, 2],
            });
        }

        let mut flavor: Vec<[usize; 2]> = Vec::new();
        let mut gpoint_flavor = Array2::zeros((2, ngpt));
        for (pairs, gpts) in key_species.iter().zip(&band_lims_gpt) {
            for (half, &pair) in pairs.iter().enumerate() {
                let pair = if pair == [0, 0] { [2, 2] } else { pair };
                let iflav = match flavor.iter().position(|&f| f == pair) {
                    Some(iflav) => iflav,
                    None => {
                        flavor.push(pair);
                        flavor.len() - 1
                    }
                };
                gpoint_flavor.slice_mut(s![half, gpts.clone()]).fill(iflav);
            }
        }

        Self::new(flavor, gpoint_flavor, band_lims_gpt)
    }

    /// Number of g-points.
    pub fn ngpt(&self) -> usize {
        self.gpoint_flavor.shape()[1]
    }

    /// Number of bands.
    pub fn nband(&self) -> usize {
        self.band_lims_gpt.len()
    }

    /// Number of flavors.
    pub fn nflav(&self) -> usize {
        self.flavor.len()
    }

    /// Gas pair of each flavor.
    pub fn flavors(&self) -> &[[usize; 2]] {
        &self.flavor
    }

    /// G-point range of each band.
    pub fn band_lims_gpt(&self) -> &[Range<usize>] {
        &self.band_lims_gpt
    }

    /// Band index of each g-point.
    pub fn gpoint_bands(&self) -> Vec<usize> {
        self.band_lims_gpt
            .iter()
            .enumerate()
            .flat_map(|(band, gpts)| gpts.clone().map(move |_| band))
            .collect()
    }

    /// Flavor that applies to g-point `igpt` in the given atmosphere half.
    #[inline]
    pub fn flavor_of(&self, half: AtmosphereHalf, igpt: usize) -> usize {
        self.gpoint_flavor[[half.index(), igpt]]
    }
}

/// How a minor absorber's column amount is scaled before multiplying the
/// interpolated absorption coefficient.
///
/// Resolved once from the table flags, so the layer loop only has to match on
/// a single tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinorScaling {
    /// The gas column amount as-is
    Column,
    /// Column amount times `0.01 * p / T`
    Density,
    /// Density scaling, times the dry volume mixing ratio of `gas`
    DensityVmr {
        /// Index of the scaling gas
        gas: usize,
    },
    /// Density scaling, times one minus the dry volume mixing ratio of `gas`
    DensityComplement {
        /// Index of the scaling gas
        gas: usize,
    },
}

impl MinorScaling {
    /// Resolve the tag from the per-absorber flags in the coefficient tables.
    ///
    /// A scaling gas only has an effect for absorbers that scale with
    /// density; otherwise it is ignored.
    pub fn from_flags(
        scales_with_density: bool,
        scale_by_complement: bool,
        scaling_gas: Option<usize>,
    ) -> Self {
        match (scales_with_density, scaling_gas) {
            (false, _) => MinorScaling::Column,
            (true, None) => MinorScaling::Density,
            (true, Some(gas)) if scale_by_complement => MinorScaling::DensityComplement { gas },
            (true, Some(gas)) => MinorScaling::DensityVmr { gas },
        }
    }

    /// Index of the secondary scaling gas, if any.
    pub fn scaling_gas(self) -> Option<usize> {
        match self {
            MinorScaling::Column | MinorScaling::Density => None,
            MinorScaling::DensityVmr { gas } | MinorScaling::DensityComplement { gas } => {
                Some(gas)
            }
        }
    }
}

/// One minor absorber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinorAbsorber {
    /// Index of the absorbing gas in the gas column amounts
    pub gas: usize,
    /// G-points affected by this absorber
    pub gpts: Range<usize>,
    /// Position in the `kminor` table that corresponds to `gpts.start`
    pub kminor_start: usize,
    /// How the column amount is scaled
    pub scaling: MinorScaling,
}

/// Minor absorbers for one half of the atmosphere.
#[derive(Debug, Clone)]
pub struct MinorAbsorbers {
    /// Absorption coefficients, dimensioned as (temperature, eta,
    /// contributor), where the contributors of all absorbers are concatenated
    pub(crate) kminor: Array3<f64>,
    pub(crate) absorbers: Vec<MinorAbsorber>,
}

impl MinorAbsorbers {
    /// Bundle a `kminor` table with its absorber descriptors.
    ///
    /// Each absorber's `kminor_start..kminor_start + gpts.len()` must fit in
    /// the table. The gas indices are checked later, against the reference
    /// grid.
    pub fn new(kminor: Array3<f64>, absorbers: Vec<MinorAbsorber>) -> Result<Self, GasOpticsError> {
        let ncontrib = kminor.shape()[2];
        for absorber in &absorbers {
            let end = absorber.kminor_start + absorber.gpts.len();
            if end > ncontrib {
                return Err(GasOpticsError::InvalidIndex {
                    name: "kminor_start",
                    index: end - 1,
                    limit: ncontrib,
                });
            }
        }
        Ok(Self { kminor, absorbers })
    }

    /// No minor absorbers, with an empty table compatible with the grid.
    pub fn empty(ntemp: usize, neta: usize) -> Self {
        Self {
            kminor: Array3::zeros((ntemp, neta, 0)),
            absorbers: Vec::new(),
        }
    }

    /// The absorber descriptors.
    pub fn absorbers(&self) -> &[MinorAbsorber] {
        &self.absorbers
    }
}

/// Source terms carried by the tables.
#[derive(Debug, Clone)]
pub enum SourceTables {
    /// Internal (thermal) source, for longwave
    Planck {
        /// Planck fractions, dimensioned like `kmajor` as (temperature,
        /// pressure + 1, eta, g-point)
        pfracin: Array4<f64>,
        /// Band-integrated Planck function, dimensioned as (Planck
        /// temperature, band), on a uniform temperature axis from the
        /// minimum to maximum reference temperature
        totplnk: Array2<f64>,
    },
    /// External (solar) source, for shortwave
    Solar {
        /// Top-of-atmosphere solar source for each g-point
        solar_src: Array1<f64>,
    },
}
