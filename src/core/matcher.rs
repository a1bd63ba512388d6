use crate::core::reference::ReferenceSeries;
use crate::core::swath::ValidPixels;
use crate::types::{ColumnMode, Outcome, SiteLocation, SkipReason};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Spatial and temporal coincidence criteria
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchParams {
    /// Half-width in degrees of the lon/lat box around the site
    pub box_half_width_deg: f64,
    /// Half-width in hours of the reference sampling window around each overpass
    pub time_half_width_hours: f64,
    /// Tropospheric columns at or below this value (molecules/cm2) are not matched
    pub trop_detection_limit: f64,
    /// Reference QA flags above this value are rejected
    pub max_reference_qa_flag: i32,
    /// Reference QA flag rejected regardless of `max_reference_qa_flag`
    pub rejected_reference_qa_flag: i32,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            box_half_width_deg: 0.2,
            time_half_width_hours: 0.5,
            trop_detection_limit: 2e13,
            max_reference_qa_flag: 11,
            rejected_reference_qa_flag: 2,
        }
    }
}

/// Satellite pixels matched to a site for one swath and day
#[derive(Debug, Clone, PartialEq)]
pub struct MatchWindow {
    /// Indices into the swath's [`ValidPixels`]
    pub pixel_indices: Vec<usize>,
    /// Representative overpass times (fractional UTC hours), one or two per day
    pub overpass_hours: Vec<f64>,
}

/// Selects coincident satellite pixels and reference samples around a site
pub struct CoincidenceMatcher {
    params: MatchParams,
    mode: ColumnMode,
}

impl CoincidenceMatcher {
    pub fn new(params: MatchParams, mode: ColumnMode) -> Self {
        Self { params, mode }
    }

    /// Pixels within the site box on `date`'s day of month, with the overpass times they span
    pub fn match_pixels(&self, date: NaiveDate, pixels: &ValidPixels, site: &SiteLocation) -> Outcome<MatchWindow> {
        let half_width = self.params.box_half_width_deg;
        let day = date.day();

        let pixel_indices: Vec<usize> = (0..pixels.len())
            .filter(|&i| {
                let value = pixels.value[i];
                (pixels.longitude[i] - site.longitude).abs() <= half_width
                    && (pixels.latitude[i] - site.latitude).abs() <= half_width
                    && pixels.day[i] == day
                    && value.is_finite()
                    && (self.mode == ColumnMode::Total || value > self.params.trop_detection_limit)
            })
            .collect();

        if pixel_indices.is_empty() {
            return Outcome::Skip(SkipReason::NoData);
        }

        let overpass_hours = overpass_hours(pixels, &pixel_indices);
        log::debug!(
            "{} pixels within {} deg of site on {}, overpass hours {:?}",
            pixel_indices.len(),
            half_width,
            date,
            overpass_hours
        );

        Outcome::Ready(MatchWindow {
            pixel_indices,
            overpass_hours,
        })
    }

    /// Reference samples on `date` within the time half-width of `overpass_hour`
    ///
    /// Samples need a value and a QA flag on the accept-list.
    pub fn select_reference(&self, date: NaiveDate, overpass_hour: f64, series: &ReferenceSeries) -> Outcome<Vec<usize>> {
        let half_width = self.params.time_half_width_hours;
        let low = overpass_hour - half_width;
        let high = overpass_hour + half_width;

        let indices: Vec<usize> = series
            .samples
            .iter()
            .enumerate()
            .filter(|(_, sample)| {
                sample.date == date
                    && sample.has_value()
                    && sample.qa_flag <= self.params.max_reference_qa_flag
                    && sample.qa_flag != self.params.rejected_reference_qa_flag
                    && sample.continuous_hour >= low
                    && sample.continuous_hour <= high
            })
            .map(|(i, _)| i)
            .collect();

        if indices.is_empty() {
            log::debug!("No reference data on {} around {:.2} UTC", date, overpass_hour);
            return Outcome::Skip(SkipReason::NoReferenceData);
        }
        Outcome::Ready(indices)
    }
}

/// Earliest and latest matched acquisition time; a single time when both fall in the same hour
fn overpass_hours(pixels: &ValidPixels, indices: &[usize]) -> Vec<f64> {
    let mut min_hour = u32::MAX;
    let mut max_hour = 0;
    let mut min_time = f64::INFINITY;
    let mut max_time = f64::NEG_INFINITY;

    for &i in indices {
        min_hour = min_hour.min(pixels.hour[i]);
        max_hour = max_hour.max(pixels.hour[i]);
        let t = pixels.utc_hour(i);
        min_time = min_time.min(t);
        max_time = max_time.max(t);
    }

    if min_hour == max_hour {
        vec![min_time]
    } else {
        vec![min_time, max_time]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::reference_file::MISSING_FLAG;
    use crate::core::reference::{continuous_hour, ReferenceSample};
    use crate::types::ReferenceVersion;
    use approx::assert_relative_eq;

    fn site() -> SiteLocation {
        SiteLocation { latitude: 28.31, longitude: -16.50, altitude: 2360.0 }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 6, 3).expect("valid date")
    }

    fn pixels(entries: &[(f64, f64, u32, u32, u32, f64)]) -> ValidPixels {
        let mut p = ValidPixels::default();
        for &(lon, lat, day, hour, minute, value) in entries {
            p.longitude.push(lon);
            p.latitude.push(lat);
            p.day.push(day);
            p.hour.push(hour);
            p.minute.push(minute);
            p.value.push(value);
            p.error.push(1e14);
            p.cloud_fraction.push(0.0);
            p.cloud_pressure.push(90_000.0);
        }
        p
    }

    fn sample(date: NaiveDate, hour: u32, minute: u32, value: f64, qa_flag: i32) -> ReferenceSample {
        ReferenceSample {
            date,
            hour,
            minute,
            continuous_hour: continuous_hour(hour, minute),
            julian_day: 0.0,
            solar_zenith: 30.0,
            value,
            error: 0.01,
            qa_flag,
            fit_flag: 0,
        }
    }

    #[test]
    fn test_pixel_box_and_day_filter() {
        let matcher = CoincidenceMatcher::new(MatchParams::default(), ColumnMode::Total);
        let p = pixels(&[
            (-16.45, 28.30, 3, 13, 10, 3e15),
            (-16.10, 28.30, 3, 13, 10, 3e15), // outside box
            (-16.50, 28.40, 4, 13, 10, 3e15), // other day
            (-16.60, 28.20, 3, 13, 40, 1e13),
        ]);
        let window = matcher.match_pixels(date(), &p, &site()).ready().expect("pixels match");
        assert_eq!(window.pixel_indices, vec![0, 3]);
        assert_eq!(window.overpass_hours.len(), 1);
        assert_relative_eq!(window.overpass_hours[0], 13.0 + 10.0 / 60.0);
    }

    #[test]
    fn test_tropospheric_detection_limit() {
        let matcher = CoincidenceMatcher::new(MatchParams::default(), ColumnMode::Tropospheric);
        let p = pixels(&[(-16.45, 28.30, 3, 13, 10, 1e13), (-16.45, 28.30, 3, 13, 10, 2e13)]);
        assert_eq!(matcher.match_pixels(date(), &p, &site()), Outcome::Skip(SkipReason::NoData));
    }

    #[test]
    fn test_two_overpasses_when_hours_differ() {
        let matcher = CoincidenceMatcher::new(MatchParams::default(), ColumnMode::Total);
        let p = pixels(&[(-16.45, 28.30, 3, 12, 58, 3e15), (-16.45, 28.32, 3, 14, 36, 3e15)]);
        let window = matcher.match_pixels(date(), &p, &site()).ready().expect("pixels match");
        assert_eq!(window.overpass_hours.len(), 2);
        assert_relative_eq!(window.overpass_hours[0], 12.0 + 58.0 / 60.0);
        assert_relative_eq!(window.overpass_hours[1], 14.6);
    }

    #[test]
    fn test_reference_quality_and_time_window() {
        let matcher = CoincidenceMatcher::new(MatchParams::default(), ColumnMode::Total);
        let d = date();
        let series = ReferenceSeries::new(
            site(),
            ReferenceVersion::V1_8,
            vec![
                sample(d, 13, 0, 1e-4, 0),
                sample(d, 13, 20, 1e-4, 2),       // rejected flag
                sample(d, 13, 25, 1e-4, 12),      // above accept-list
                sample(d, 13, 30, f64::NAN, 0),   // no value
                sample(d, 14, 5, 1e-4, 11),       // outside window
                sample(d.succ_opt().expect("next day"), 13, 0, 1e-4, 0),
                sample(d, 13, 40, 1e-4, 10),
                sample(d, 13, 45, 1e-4, MISSING_FLAG), // flag missing in file
            ],
        );
        let indices = matcher.select_reference(d, 13.5, &series).ready().expect("samples match");
        assert_eq!(indices, vec![0, 6]);
    }

    #[test]
    fn test_reference_after_midnight_joins_late_window() {
        let matcher = CoincidenceMatcher::new(
            MatchParams { time_half_width_hours: 1.0, ..Default::default() },
            ColumnMode::Total,
        );
        let d = date();
        let series = ReferenceSeries::new(site(), ReferenceVersion::V1_7, vec![sample(d, 1, 0, 0.5, 0)]);
        assert_relative_eq!(series.samples[0].continuous_hour, 25.0);

        // 23:50 overpass, window 22:50 to 24:50 misses 01:00
        assert!(!matcher.select_reference(d, 23.0 + 50.0 / 60.0, &series).is_ready());
        // A window reaching past 25:00 includes it
        let indices = matcher.select_reference(d, 24.5, &series).ready().expect("sample matches");
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn test_no_reference_data() {
        let matcher = CoincidenceMatcher::new(MatchParams::default(), ColumnMode::Total);
        let series = ReferenceSeries::new(site(), ReferenceVersion::V1_7, vec![]);
        assert_eq!(
            matcher.select_reference(date(), 13.0, &series),
            Outcome::Skip(SkipReason::NoReferenceData)
        );
    }
}
