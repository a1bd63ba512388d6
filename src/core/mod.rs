//! Core co-sampling modules

pub mod swath;
pub mod cloud_mask;
pub mod reference;
pub mod matcher;
pub mod aggregator;
pub mod statistics;

// Re-export main types
pub use swath::{SatelliteSwath, SwathFields, DerivedColumns, ValidPixels, ScanlineTime, BiasCorrectionParams, SwathScreeningParams};
pub use cloud_mask::{CloudMask, CloudScreeningParams, ExternalCloudFields, ColocatedCloudFields};
pub use reference::{ReferenceSeries, ReferenceSample, ReferenceCorrectionParams};
pub use matcher::{CoincidenceMatcher, MatchParams, MatchWindow};
pub use aggregator::{DailyAggregator, DailySeries, DailyValues};
pub use statistics::ComparisonStatistics;
