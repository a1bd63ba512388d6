//! no2cosample: co-sampling of satellite NO2 columns with ground-based reference spectrometers
//!
//! Satellite swaths are screened for quality and cloud, matched in space and
//! time to a ground site, and accumulated with the site's own measurements
//! into a daily time series of error-weighted means.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    CloudProduct, ColumnMode, CosampleError, CosampleResult, Grid, Outcome, ReferenceVersion,
    SiteLocation, SkipReason,
};

pub use crate::core::{
    ComparisonStatistics, CoincidenceMatcher, DailyAggregator, DailySeries, DailyValues,
    ReferenceSeries, SatelliteSwath, ValidPixels,
};
pub use io::{ReferenceFile, OrbitFiles};
pub use pipeline::{Cosampler, CosamplingParams};
