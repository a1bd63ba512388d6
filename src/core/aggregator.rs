use crate::core::matcher::MatchWindow;
use crate::core::reference::ReferenceSeries;
use crate::core::swath::ValidPixels;
use crate::types::{ColumnMode, CosampleError, CosampleResult};
use chrono::NaiveDate;

/// Running sums for one calendar day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayAccumulator {
    /// Sum of value / error^2 over matched satellite pixels
    pub sat_weighted_sum: f64,
    /// Sum of 1 / error^2 over matched satellite pixels
    pub sat_weight: f64,
    pub sat_count: usize,
    /// Sum of cloud pressure in hPa over the same pixels; NaN once any pixel lacks cloud data
    pub cloud_pressure_sum: f64,
    pub cloud_fraction_sum: f64,
    pub ref_weighted_sum: f64,
    pub ref_weight: f64,
    /// Sum of 1 / error^2 over matched reference samples
    pub ref_precision: f64,
    pub ref_count: usize,
    /// Earliest and latest reference sampling time used, continuous UTC hours
    pub sampling_window: Option<(f64, f64)>,
}

impl DayAccumulator {
    /// Widen the sampling window to cover `[start, end]`
    fn widen_window(&mut self, start: f64, end: f64) {
        self.sampling_window = Some(match self.sampling_window {
            None => (start, end),
            Some((lo, hi)) => (lo.min(start), hi.max(end)),
        });
    }

    fn finalize(&self) -> DailyValues {
        let error_from_precision = |precision: f64| {
            if precision > 0.0 {
                1.0 / precision.sqrt()
            } else {
                f64::NAN
            }
        };
        let (start_utc, end_utc) = self.sampling_window.unwrap_or((f64::NAN, f64::NAN));

        DailyValues {
            start_utc,
            end_utc,
            sat_mean: self.sat_weighted_sum / self.sat_weight,
            sat_error: error_from_precision(self.sat_weight),
            sat_count: self.sat_count,
            cloud_pressure_mean: self.cloud_pressure_sum / self.sat_count as f64,
            cloud_fraction_mean: self.cloud_fraction_sum / self.sat_count as f64,
            ref_mean: self.ref_weighted_sum / self.ref_weight,
            ref_error: error_from_precision(self.ref_precision),
            ref_count: self.ref_count,
        }
    }
}

/// Finalized statistics for one day; NaN marks "no data"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyValues {
    pub start_utc: f64,
    pub end_utc: f64,
    /// Error-weighted satellite mean, molecules/cm2
    pub sat_mean: f64,
    pub sat_error: f64,
    pub sat_count: usize,
    /// hPa
    pub cloud_pressure_mean: f64,
    pub cloud_fraction_mean: f64,
    /// Reference mean, molecules/cm2
    pub ref_mean: f64,
    pub ref_error: f64,
    pub ref_count: usize,
}

/// Read-only daily time series produced by [`DailyAggregator::finalize`]
#[derive(Debug, Clone)]
pub struct DailySeries {
    pub start_date: NaiveDate,
    pub mode: ColumnMode,
    pub days: Vec<DailyValues>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailyValues> {
        let offset = (date - self.start_date).num_days();
        usize::try_from(offset).ok().and_then(|i| self.days.get(i))
    }
}

/// Accumulates matched satellite and reference data into one bucket per day
///
/// The day range is fixed at construction. [`finalize`](Self::finalize) consumes the
/// aggregator, so sums are converted to means exactly once.
#[derive(Debug, Clone)]
pub struct DailyAggregator {
    start_date: NaiveDate,
    mode: ColumnMode,
    days: Vec<DayAccumulator>,
}

impl DailyAggregator {
    /// Allocate one bucket per day in `[start_date, end_date]`
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, mode: ColumnMode) -> CosampleResult<Self> {
        if end_date < start_date {
            return Err(CosampleError::Processing(format!(
                "End date {} precedes start date {}",
                end_date, start_date
            )));
        }
        let n_days = (end_date - start_date).num_days() as usize + 1;
        Ok(Self {
            start_date,
            mode,
            days: vec![DayAccumulator::default(); n_days],
        })
    }

    pub fn n_days(&self) -> usize {
        self.days.len()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Whole days since the start date
    pub fn day_index(&self, date: NaiveDate) -> CosampleResult<usize> {
        let offset = (date - self.start_date).num_days();
        usize::try_from(offset)
            .ok()
            .filter(|&i| i < self.days.len())
            .ok_or_else(|| CosampleError::Processing(format!("Date {} outside aggregation range", date)))
    }

    pub fn day(&self, date: NaiveDate) -> CosampleResult<&DayAccumulator> {
        let index = self.day_index(date)?;
        Ok(&self.days[index])
    }

    /// Add the matched satellite pixels of one swath
    pub fn add_satellite(&mut self, date: NaiveDate, pixels: &ValidPixels, window: &MatchWindow) -> CosampleResult<()> {
        let index = self.day_index(date)?;
        let day = &mut self.days[index];

        for &i in &window.pixel_indices {
            let weight = 1.0 / (pixels.error[i] * pixels.error[i]);
            day.sat_weighted_sum += pixels.value[i] * weight;
            day.sat_weight += weight;
            day.sat_count += 1;
            day.cloud_pressure_sum += pixels.cloud_pressure[i] * 1e-2;
            day.cloud_fraction_sum += pixels.cloud_fraction[i];
        }
        Ok(())
    }

    /// Add reference samples matched to one overpass
    ///
    /// Total columns are weighted by 1/error^2; tropospheric columns are unweighted.
    pub fn add_reference(&mut self, date: NaiveDate, series: &ReferenceSeries, indices: &[usize]) -> CosampleResult<()> {
        if indices.is_empty() {
            return Ok(());
        }
        let index = self.day_index(date)?;
        let mode = self.mode;
        let day = &mut self.days[index];
        let factor = series.unit_factor();

        let mut window_start = f64::INFINITY;
        let mut window_end = f64::NEG_INFINITY;

        for &i in indices {
            let sample = &series.samples[i];
            let value = sample.value * factor;
            let error = sample.error * factor;

            let precision = 1.0 / (error * error);
            let weight = match mode {
                ColumnMode::Total => precision,
                ColumnMode::Tropospheric => 1.0,
            };
            day.ref_weighted_sum += value * weight;
            day.ref_weight += weight;
            day.ref_precision += precision;
            day.ref_count += 1;

            window_start = window_start.min(sample.continuous_hour);
            window_end = window_end.max(sample.continuous_hour);
        }

        day.widen_window(window_start, window_end);
        Ok(())
    }

    /// Convert every running sum into its daily mean
    pub fn finalize(self) -> DailySeries {
        let days: Vec<DailyValues> = self.days.iter().map(DayAccumulator::finalize).collect();

        let relative = |err: f64, mean: f64| err / mean;
        let (ref_min, ref_max) = finite_range(days.iter().map(|d| relative(d.ref_error, d.ref_mean)));
        let (sat_min, sat_max) = finite_range(days.iter().map(|d| relative(d.sat_error, d.sat_mean)));
        log::info!("Min & max relative errors (reference): {:.4} {:.4}", ref_min, ref_max);
        log::info!("Min & max relative errors (satellite): {:.4} {:.4}", sat_min, sat_max);

        DailySeries {
            start_date: self.start_date,
            mode: self.mode,
            days,
        }
    }
}

fn finite_range<I: Iterator<Item = f64>>(values: I) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold((f64::NAN, f64::NAN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
