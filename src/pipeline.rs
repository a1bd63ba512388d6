//! Day-by-day co-sampling driver
//!
//! Processing is strictly sequential: one orbit file is loaded, screened,
//! matched and accumulated before the next, and one day before the next.
//! Per-swath conditions (`Outcome::Skip`) are logged and skipped; any `Err`
//! aborts the run.

use crate::core::aggregator::{DailyAggregator, DailySeries};
use crate::core::cloud_mask::{CloudMask, CloudScreeningParams};
use crate::core::matcher::{CoincidenceMatcher, MatchParams, MatchWindow};
use crate::core::reference::{ReferenceCorrectionParams, ReferenceSeries};
use crate::core::swath::{BiasCorrectionParams, SatelliteSwath, SwathScreeningParams, ValidPixels};
use crate::io::cloud_file::{read_colocated_cloud_fields, read_external_cloud_fields};
use crate::io::discovery::{orbit_pairs_on_day, orbit_start_stamp, OrbitFiles};
use crate::io::reference_file::ReferenceFile;
use crate::io::swath_file::read_swath_fields;
use crate::types::{
    CloudProduct, ColumnMode, CosampleError, CosampleResult, Outcome, ReferenceVersion,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full configuration of a co-sampling run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosamplingParams {
    pub column_mode: ColumnMode,
    pub cloud_product: CloudProduct,
    pub reference_version: ReferenceVersion,
    pub apply_bias_correction: bool,
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    pub matching: MatchParams,
    pub swath_screening: SwathScreeningParams,
    pub cloud_screening: CloudScreeningParams,
    pub bias: BiasCorrectionParams,
    pub reference_correction: ReferenceCorrectionParams,
}

impl Default for CosamplingParams {
    fn default() -> Self {
        Self {
            column_mode: ColumnMode::Total,
            cloud_product: CloudProduct::Fresco,
            reference_version: ReferenceVersion::V1_7,
            apply_bias_correction: false,
            start_date: NaiveDate::from_ymd_opt(2019, 6, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2020, 5, 31).unwrap_or_default(),
            matching: MatchParams::default(),
            swath_screening: SwathScreeningParams::default(),
            cloud_screening: CloudScreeningParams::default(),
            bias: BiasCorrectionParams::default(),
            reference_correction: ReferenceCorrectionParams::default(),
        }
    }
}

impl CosamplingParams {
    fn bias_correction(&self) -> Option<&BiasCorrectionParams> {
        self.apply_bias_correction.then_some(&self.bias)
    }
}

/// Co-samples satellite swaths with one site's reference series into daily means
pub struct Cosampler {
    params: CosamplingParams,
    matcher: CoincidenceMatcher,
    reference: ReferenceSeries,
    aggregator: DailyAggregator,
}

impl Cosampler {
    pub fn new(params: CosamplingParams, reference: ReferenceSeries) -> CosampleResult<Self> {
        let aggregator = DailyAggregator::new(params.start_date, params.end_date, params.column_mode)?;
        let matcher = CoincidenceMatcher::new(params.matching.clone(), params.column_mode);
        log::info!(
            "Co-sampling {} columns with {} clouds, {} to {} ({} days)",
            params.column_mode,
            params.cloud_product,
            params.start_date,
            params.end_date,
            aggregator.n_days()
        );
        Ok(Self {
            params,
            matcher,
            reference,
            aggregator,
        })
    }

    /// Read and correct a site's reference file for this configuration
    pub fn load_reference<P: AsRef<Path>>(path: P, params: &CosamplingParams) -> CosampleResult<ReferenceSeries> {
        let file = ReferenceFile::read(path, params.column_mode)?;
        let series = ReferenceSeries::from_file(
            file,
            params.column_mode,
            params.reference_version,
            &params.reference_correction,
        );
        if series.is_empty() {
            log::warn!("Reference file contains no records");
        }
        Ok(series)
    }

    /// Load one orbit, derive its columns and screen it with its cloud source
    pub fn load_orbit(&self, files: &OrbitFiles) -> CosampleResult<Outcome<ValidPixels>> {
        let fields = match read_swath_fields(
            &files.no2,
            &self.reference.site,
            self.params.swath_screening.site_search_box_deg,
        )? {
            Outcome::Ready(fields) => fields,
            Outcome::Skip(reason) => return Ok(Outcome::Skip(reason)),
        };

        let swath = SatelliteSwath::new(fields, self.params.column_mode, self.params.bias_correction());

        let cloud = match &files.cloud {
            Some(cloud_path) => {
                let stamp = orbit_start_stamp(&files.no2).ok_or_else(|| {
                    CosampleError::InvalidFormat(format!("no orbit stamp in {}", files.no2.display()))
                })?;
                let fields = read_external_cloud_fields(cloud_path, &stamp)?;
                CloudMask::from_external(fields, &self.params.cloud_screening)
            }
            None => {
                let fields = read_colocated_cloud_fields(&files.no2)?;
                CloudMask::from_colocated(fields, &swath.fields.surface_pressure, &self.params.cloud_screening)
            }
        };
        let cloud = match cloud {
            Outcome::Ready(cloud) => cloud,
            Outcome::Skip(reason) => return Ok(Outcome::Skip(reason)),
        };

        Ok(swath.apply_cloud_filter(&cloud, &self.params.swath_screening))
    }

    /// Match one screened swath to the site on `date` and accumulate it
    ///
    /// An overpass without reference data only drops that overpass; the
    /// satellite pixels still count towards the day.
    pub fn process_swath(&mut self, date: NaiveDate, pixels: &ValidPixels) -> CosampleResult<Outcome<MatchWindow>> {
        let window = match self.matcher.match_pixels(date, pixels, &self.reference.site) {
            Outcome::Ready(window) => window,
            Outcome::Skip(reason) => return Ok(Outcome::Skip(reason)),
        };

        self.aggregator.add_satellite(date, pixels, &window)?;

        for &overpass in &window.overpass_hours {
            match self.matcher.select_reference(date, overpass, &self.reference) {
                Outcome::Ready(indices) => {
                    self.aggregator.add_reference(date, &self.reference, &indices)?;
                }
                Outcome::Skip(reason) => {
                    log::debug!("Overpass at {:.2} UTC on {}: {}", overpass, date, reason);
                }
            }
        }

        Ok(Outcome::Ready(window))
    }

    /// Process every orbit of one day; returns the number of swaths that contributed
    pub fn process_day(&mut self, root: &Path, product_tag: &str, date: NaiveDate) -> CosampleResult<usize> {
        log::info!("Processing {}", date);
        let orbits = orbit_pairs_on_day(root, date, product_tag, self.params.cloud_product)?;

        let mut used = 0;
        for orbit in &orbits {
            let pixels = match self.load_orbit(orbit)? {
                Outcome::Ready(pixels) => pixels,
                Outcome::Skip(reason) => {
                    log::warn!("Skipping {}: {}", orbit.no2.display(), reason);
                    continue;
                }
            };
            match self.process_swath(date, &pixels)? {
                Outcome::Ready(_) => used += 1,
                Outcome::Skip(reason) => log::debug!("No match in {}: {}", orbit.no2.display(), reason),
            }
        }

        log::debug!("{} of {} swaths used on {}", used, orbits.len(), date);
        Ok(used)
    }

    /// Process all days in the configured range
    pub fn run(&mut self, root: &Path, product_tag: &str) -> CosampleResult<()> {
        let end = self.params.end_date;
        for date in self.params.start_date.iter_days().take_while(|d| *d <= end) {
            if let Err(e) = self.process_day(root, product_tag, date) {
                log::error!("Aborting on {}: {}", date, e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Convert the accumulated sums to daily means
    pub fn finish(self) -> DailySeries {
        self.aggregator.finalize()
    }
}
