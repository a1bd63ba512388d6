use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// 2D per-pixel field on the swath grid (scanline x ground pixel)
///
/// "No value" is represented by IEEE-754 NaN. Every arithmetic step in the
/// column derivation (quadrature sums, ratios, unit scaling) relies on NaN
/// propagating through `+`, `-`, `*`, `/` and `sqrt`, so a pixel masked in any
/// input stays masked in every derived field.
pub type Grid = Array2<f64>;

/// Which NO2 column is being compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnMode {
    /// Full atmospheric column (troposphere + stratosphere)
    Total,
    /// Tropospheric column only
    Tropospheric,
}

impl ColumnMode {
    /// Short tag used in file names
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnMode::Total => "Tot",
            ColumnMode::Tropospheric => "Trop",
        }
    }
}

impl std::fmt::Display for ColumnMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for ColumnMode {
    type Err = CosampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tot" | "total" => Ok(ColumnMode::Total),
            "trop" | "tropospheric" => Ok(ColumnMode::Tropospheric),
            _ => Err(CosampleError::InvalidMode(format!("Unknown column mode: {}", s))),
        }
    }
}

/// Source of the cloud fields used to screen a swath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudProduct {
    /// Cloud fields stored alongside the NO2 retrieval in the same file
    Fresco,
    /// Separate L2 cloud product delivered as its own file per orbit
    O22Cld,
}

impl CloudProduct {
    pub fn tag(&self) -> &'static str {
        match self {
            CloudProduct::Fresco => "fresco",
            CloudProduct::O22Cld => "o22cld",
        }
    }

    /// Whether cloud fields come from a separate file
    pub fn is_external(&self) -> bool {
        matches!(self, CloudProduct::O22Cld)
    }
}

impl std::fmt::Display for CloudProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for CloudProduct {
    type Err = CosampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fresco" => Ok(CloudProduct::Fresco),
            "o22cld" | "dlr-ocra" => Ok(CloudProduct::O22Cld),
            _ => Err(CosampleError::InvalidMode(format!("Unknown cloud product: {}", s))),
        }
    }
}

/// Processing version of the ground reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceVersion {
    /// Columns reported in Dobson units
    V1_7,
    /// Columns reported in mol/m2
    V1_8,
}

impl ReferenceVersion {
    /// Factor converting the native column unit to molecules/cm2
    pub fn unit_factor(&self) -> f64 {
        match self {
            ReferenceVersion::V1_7 => DU_TO_MOLECULES_PER_CM2,
            ReferenceVersion::V1_8 => MOLES_PER_M2_TO_MOLECULES_PER_CM2,
        }
    }
}

impl std::fmt::Display for ReferenceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceVersion::V1_7 => write!(f, "1.7"),
            ReferenceVersion::V1_8 => write!(f, "1.8"),
        }
    }
}

impl FromStr for ReferenceVersion {
    type Err = CosampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.7" => Ok(ReferenceVersion::V1_7),
            "1.8" => Ok(ReferenceVersion::V1_8),
            _ => Err(CosampleError::InvalidMode(format!("Unknown reference version: {}", s))),
        }
    }
}

/// Dobson units to molecules/cm2
pub const DU_TO_MOLECULES_PER_CM2: f64 = 2.6867e16;

/// mol/m2 to molecules/cm2
pub const MOLES_PER_M2_TO_MOLECULES_PER_CM2: f64 = 6.02214e19;

/// Fixed location of a ground observation site
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above sea level in meters
    pub altitude: f64,
}

/// Why a unit of work (a swath or an overpass window) produced nothing
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No satellite pixels overlap the site in space and time
    NoData,
    /// No usable reference records inside the overpass window
    NoReferenceData,
    /// Cloud grid does not line up with the swath grid
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no satellite data near site"),
            SkipReason::NoReferenceData => write!(f, "no reference data in overpass window"),
            SkipReason::ShapeMismatch { expected, found } => write!(
                f,
                "cloud grid {}x{} does not match swath grid {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

/// Result of a routine step that may legitimately have nothing to contribute
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    Skip(SkipReason),
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    /// Convert to an `Option`, dropping the skip reason
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::Skip(_) => None,
        }
    }
}

/// Error types for co-sampling
#[derive(Debug, thiserror::Error)]
pub enum CosampleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::error::Error),

    #[error("Variable {variable} not found in {}", path.display())]
    MissingVariable { path: PathBuf, variable: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid selection: {0}")]
    InvalidMode(String),

    #[error("Inconsistent file set: {0}")]
    InconsistentFileSet(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for co-sampling operations
pub type CosampleResult<T> = Result<T, CosampleError>;
