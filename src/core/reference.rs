use crate::io::reference_file::{ReferenceFile, ReferenceFileRecord};
use crate::types::{ColumnMode, ReferenceVersion, SiteLocation};
use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

/// Calibration offset applied to older processing versions at high-altitude sites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCorrectionParams {
    /// Sites above this altitude (meters) are corrected
    pub altitude_threshold_m: f64,
    /// Multiplier applied to column value and error
    pub factor: f64,
}

impl Default for ReferenceCorrectionParams {
    fn default() -> Self {
        Self {
            altitude_threshold_m: 2000.0,
            factor: 0.9,
        }
    }
}

impl ReferenceCorrectionParams {
    /// Multiplier for a series: `factor` for total columns from a v1.7 site above the threshold, else 1
    pub fn factor_for(&self, mode: ColumnMode, altitude: f64, version: ReferenceVersion) -> f64 {
        if mode == ColumnMode::Total && altitude > self.altitude_threshold_m && version == ReferenceVersion::V1_7 {
            self.factor
        } else {
            1.0
        }
    }
}

/// Hour of day, with 00:00-02:00 UTC moved to 24:00-26:00 so a window across midnight stays contiguous
pub fn continuous_hour(hour: u32, minute: u32) -> f64 {
    let h = hour as f64 + minute as f64 / 60.0;
    if (0.0..2.0).contains(&h) {
        h + 24.0
    } else {
        h
    }
}

/// One ground measurement, in the series' native column unit
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSample {
    pub date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
    /// Hour of day from [`continuous_hour`]
    pub continuous_hour: f64,
    pub julian_day: f64,
    pub solar_zenith: f64,
    /// NaN when the retrieval failed
    pub value: f64,
    pub error: f64,
    pub qa_flag: i32,
    pub fit_flag: i32,
}

impl ReferenceSample {
    pub fn from_record(record: &ReferenceFileRecord, correction: f64) -> Self {
        let time = record.time;
        Self {
            date: time.date(),
            hour: time.hour(),
            minute: time.minute(),
            continuous_hour: continuous_hour(time.hour(), time.minute()),
            julian_day: record.julian_day,
            solar_zenith: record.solar_zenith,
            value: record.value * correction,
            error: record.error * correction,
            qa_flag: record.qa_flag,
            fit_flag: record.fit_flag,
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_finite()
    }
}

/// Full time series of one ground site
#[derive(Debug, Clone)]
pub struct ReferenceSeries {
    pub site: SiteLocation,
    pub version: ReferenceVersion,
    pub samples: Vec<ReferenceSample>,
}

impl ReferenceSeries {
    pub fn new(site: SiteLocation, version: ReferenceVersion, samples: Vec<ReferenceSample>) -> Self {
        Self { site, version, samples }
    }

    /// Build the series from a parsed file, applying the high-altitude correction where due
    pub fn from_file(
        file: ReferenceFile,
        mode: ColumnMode,
        version: ReferenceVersion,
        params: &ReferenceCorrectionParams,
    ) -> Self {
        let altitude = file.site.altitude;
        let correction = params.factor_for(mode, altitude, version);
        if correction != 1.0 {
            log::info!(
                "Applying {:.0}% correction to v{} {} column at {} m",
                (1.0 - correction) * 100.0,
                version,
                mode,
                altitude
            );
        } else {
            log::info!("No altitude correction for v{} {} column at {} m", version, mode, altitude);
        }

        let samples = file
            .records
            .iter()
            .map(|record| ReferenceSample::from_record(record, correction))
            .collect();

        Self::new(file.site, version, samples)
    }

    /// Multiplier from the native column unit to molecules/cm2
    pub fn unit_factor(&self) -> f64 {
        self.version.unit_factor()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
