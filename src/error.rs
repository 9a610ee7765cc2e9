//! Errors from building tables and validating inputs.

/// Possible gas optics errors.
///
/// These are all raised while validating tables or inputs, before any of the
/// interpolation kernels run.
#[derive(Debug, Clone, PartialEq)]
pub enum GasOpticsError {
    /// An atmosphere input doesn't have the expected shape
    InconsistentInputs {
        /// Name of the offending array
        name: &'static str,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },
    /// An input array has values outside the allowed range
    OutOfRange {
        /// Name of the offending array
        name: &'static str,
        /// Lower bound (inclusive)
        min: f64,
        /// Upper bound (inclusive)
        max: f64,
    },
    /// A reference table doesn't agree in shape with the rest of the tables
    InconsistentTable {
        /// Name of the offending table
        name: &'static str,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },
    /// An index stored in a table descriptor addresses outside its target
    InvalidIndex {
        /// What the index refers to
        name: &'static str,
        /// The index
        index: usize,
        /// The exclusive upper limit
        limit: usize,
    },
    /// The tables lack the source terms needed for this computation
    MissingSource(&'static str),
    /// An array is not contiguous when it was assumed to be
    NotContiguous,
}

impl std::fmt::Display for GasOpticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GasOpticsError::InconsistentInputs {
                name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "input array {name} has shape {actual:?}, expected {expected:?}"
                )
            }
            GasOpticsError::OutOfRange { name, min, max } => {
                write!(f, "array {name} has values outside the range [{min}, {max}]")
            }
            GasOpticsError::InconsistentTable {
                name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "reference table {name} has shape {actual:?}, expected {expected:?}"
                )
            }
            GasOpticsError::InvalidIndex { name, index, limit } => {
                write!(f, "{name} index {index} is out of bounds (limit {limit})")
            }
            GasOpticsError::MissingSource(what) => {
                write!(f, "gas optics tables don't provide {what}")
            }
            GasOpticsError::NotContiguous => write!(f, "array slice not contiguous in memory"),
        }
    }
}

impl std::error::Error for GasOpticsError {}
