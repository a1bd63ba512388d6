use crate::core::cloud_mask::CloudMask;
use crate::types::{ColumnMode, Grid, Outcome, SiteLocation, SkipReason};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Acquisition time shared by every ground pixel of one scanline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanlineTime {
    /// Day of month
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

/// Raw per-pixel fields of one satellite orbit, in the product's native units (mol/m2)
///
/// All grids share the shape of `latitude`; fill values are already NaN.
#[derive(Debug, Clone)]
pub struct SwathFields {
    pub longitude: Grid,
    pub latitude: Grid,
    /// One entry per scanline; `None` where the product carries no valid time
    pub scanline_times: Vec<Option<ScanlineTime>>,
    pub qa_value: Grid,
    /// Product total vertical column, only used for its fill pattern
    pub total_vcd: Grid,
    pub total_scd: Grid,
    pub total_scd_precision: Grid,
    pub strat_vcd: Grid,
    pub strat_vcd_precision: Grid,
    pub strat_amf: Grid,
    /// Surface pressure in Pa
    pub surface_pressure: Grid,
    /// Degrees
    pub solar_zenith: Grid,
    /// Degrees
    pub viewing_zenith: Grid,
    /// Multiplication factor from mol/m2 to molecules/cm2
    pub unit_factor: f64,
}

impl SwathFields {
    /// Grid shape (scanlines, ground pixels)
    pub fn dim(&self) -> (usize, usize) {
        self.latitude.dim()
    }
}

/// Whether any pixel of the grid lies within `half_width_deg` of the site in both axes
pub fn any_pixel_near(longitude: &Grid, latitude: &Grid, site: &SiteLocation, half_width_deg: f64) -> bool {
    Zip::from(longitude)
        .and(latitude)
        .fold(false, |found, &lon, &lat| {
            found
                || ((lon - site.longitude).abs() <= half_width_deg
                    && (lat - site.latitude).abs() <= half_width_deg)
        })
}

/// Empirical bias correction of the stratospheric and tropospheric columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasCorrectionParams {
    /// Divisor applied to the stratospheric column
    pub strat_divisor: f64,
    /// Offset subtracted from the stratospheric column, molecules/cm2
    pub strat_offset: f64,
    /// Divisor applied to the tropospheric column
    pub trop_divisor: f64,
}

impl Default for BiasCorrectionParams {
    fn default() -> Self {
        Self {
            strat_divisor: 0.79,
            strat_offset: 6.9e14,
            trop_divisor: 1.6,
        }
    }
}

/// Pixel screening applied to a swath
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwathScreeningParams {
    /// Pixels with a lower QA value are discarded
    pub min_qa_value: f64,
    /// Half-width (degrees) of the box used to decide whether a file is worth reading
    pub site_search_box_deg: f64,
}

impl Default for SwathScreeningParams {
    fn default() -> Self {
        Self {
            min_qa_value: 0.45,
            site_search_box_deg: 1.0,
        }
    }
}

/// Geometric air mass factor, 1/cos(SZA) + 1/cos(VZA)
pub fn geometric_amf(solar_zenith: &Grid, viewing_zenith: &Grid) -> Grid {
    Zip::from(solar_zenith)
        .and(viewing_zenith)
        .map_collect(|&sza, &vza| 1.0 / sza.to_radians().cos() + 1.0 / vza.to_radians().cos())
}

/// Vertical columns and errors derived from the slant column with a geometric AMF
///
/// Native units (mol/m2).
#[derive(Debug, Clone)]
pub struct DerivedColumns {
    pub geometric_amf: Grid,
    pub strat_vcd: Grid,
    pub trop_vcd: Grid,
    pub total_vcd: Grid,
    pub total_error: Grid,
    pub trop_error: Grid,
}

impl DerivedColumns {
    /// Decompose the total slant column into stratospheric and tropospheric vertical columns
    pub fn derive(fields: &SwathFields, bias: Option<&BiasCorrectionParams>) -> Self {
        let geometric_amf = geometric_amf(&fields.solar_zenith, &fields.viewing_zenith);

        match bias {
            None => {
                let trop_vcd = tropospheric_vcd(fields, &fields.strat_vcd, &geometric_amf);
                let total_vcd = &trop_vcd + &fields.strat_vcd;
                let total_error = quadrature(&fields.strat_vcd_precision, &fields.total_scd_precision);
                let trop_error = scale_by_fraction(&total_error, &trop_vcd, &total_vcd);

                Self {
                    geometric_amf,
                    strat_vcd: fields.strat_vcd.clone(),
                    trop_vcd,
                    total_vcd,
                    total_error,
                    trop_error,
                }
            }
            Some(params) => {
                let offset = params.strat_offset / fields.unit_factor;
                let rescale = |strat: &Grid| strat.mapv(|s| s / params.strat_divisor - offset);

                let strat_once = rescale(&fields.strat_vcd);
                let trop_vcd = tropospheric_vcd(fields, &strat_once, &geometric_amf)
                    .mapv(|v| v / params.trop_divisor);

                // The stratospheric correction is applied a second time before summation
                let strat_vcd = rescale(&strat_once);
                let total_vcd = &trop_vcd + &strat_vcd;

                let strat_error = Zip::from(&fields.strat_vcd_precision)
                    .and(&strat_vcd)
                    .and(&fields.strat_vcd)
                    .map_collect(|&err, &corrected, &original| err * (corrected / original));
                let total_error = quadrature(&strat_error, &fields.total_scd_precision);
                let trop_error = scale_by_fraction(&total_error, &trop_vcd, &total_vcd);

                Self {
                    geometric_amf,
                    strat_vcd,
                    trop_vcd,
                    total_vcd,
                    total_error,
                    trop_error,
                }
            }
        }
    }
}

/// (SCD_total - VCD_strat * AMF_strat) / AMF_geo
fn tropospheric_vcd(fields: &SwathFields, strat_vcd: &Grid, geometric_amf: &Grid) -> Grid {
    Zip::from(&fields.total_scd)
        .and(strat_vcd)
        .and(&fields.strat_amf)
        .and(geometric_amf)
        .map_collect(|&scd, &strat, &strat_amf, &amf_geo| (scd - strat * strat_amf) / amf_geo)
}

fn quadrature(a: &Grid, b: &Grid) -> Grid {
    Zip::from(a).and(b).map_collect(|&x, &y| (x * x + y * y).sqrt())
}

/// error * (part / whole)
fn scale_by_fraction(error: &Grid, part: &Grid, whole: &Grid) -> Grid {
    Zip::from(error)
        .and(part)
        .and(whole)
        .map_collect(|&err, &p, &w| err * (p / w))
}

/// Screened satellite pixels flattened into parallel lists
///
/// Every list has one entry per valid pixel, in row-major grid order.
/// Columns and errors are in molecules/cm2, cloud pressure in Pa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidPixels {
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    pub value: Vec<f64>,
    pub error: Vec<f64>,
    pub day: Vec<u32>,
    pub hour: Vec<u32>,
    pub minute: Vec<u32>,
    pub cloud_fraction: Vec<f64>,
    pub cloud_pressure: Vec<f64>,
    /// Stratospheric column, kept in tropospheric mode only
    pub stratospheric: Option<Vec<f64>>,
    /// Total column, kept in tropospheric mode only
    pub total: Option<Vec<f64>>,
}

impl ValidPixels {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Acquisition time of a pixel as fractional UTC hour
    pub fn utc_hour(&self, index: usize) -> f64 {
        self.hour[index] as f64 + self.minute[index] as f64 / 60.0
    }
}

/// One satellite orbit with its derived columns
pub struct SatelliteSwath {
    pub fields: SwathFields,
    pub columns: DerivedColumns,
    pub mode: ColumnMode,
}

impl SatelliteSwath {
    /// Derive columns for the requested mode, applying the bias correction when given
    pub fn new(fields: SwathFields, mode: ColumnMode, bias: Option<&BiasCorrectionParams>) -> Self {
        let columns = DerivedColumns::derive(&fields, bias);
        log::debug!(
            "Derived {} columns on {}x{} grid (bias correction: {})",
            mode,
            fields.dim().0,
            fields.dim().1,
            bias.is_some()
        );
        Self { fields, columns, mode }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.fields.dim()
    }

    /// Observed value and error grids for the column mode
    fn observed(&self) -> (&Grid, &Grid) {
        match self.mode {
            ColumnMode::Total => (&self.columns.total_vcd, &self.columns.total_error),
            ColumnMode::Tropospheric => (&self.columns.trop_vcd, &self.columns.trop_error),
        }
    }

    /// Validity mask: product fill, low QA, snow/ice, missing time or undefined value/error
    pub fn validity_mask(&self, cloud: &CloudMask, params: &SwathScreeningParams) -> Array2<bool> {
        let (value, error) = self.observed();
        let times = &self.fields.scanline_times;

        let mut mask = Zip::from(value)
            .and(error)
            .and(&self.fields.total_vcd)
            .and(&self.fields.qa_value)
            .and(&cloud.snow_ice_flag)
            .map_collect(|&v, &e, &product, &qa, &snow| {
                !product.is_nan()
                    && !(qa < params.min_qa_value)
                    && snow == 0.0
                    && v.is_finite()
                    && e.is_finite()
            });

        for (row, time) in times.iter().enumerate() {
            if time.is_none() {
                mask.row_mut(row).fill(false);
            }
        }
        mask
    }

    /// Screen the swath with a cloud mask and flatten the valid pixels
    ///
    /// Skips with `ShapeMismatch` when the cloud grid differs from the swath grid.
    pub fn apply_cloud_filter(&self, cloud: &CloudMask, params: &SwathScreeningParams) -> Outcome<ValidPixels> {
        if cloud.dim() != self.dim() {
            log::warn!(
                "Cloud product and NO2 grids differ: {:?} vs {:?}, skipping this swath",
                cloud.dim(),
                self.dim()
            );
            return Outcome::Skip(SkipReason::ShapeMismatch {
                expected: self.dim(),
                found: cloud.dim(),
            });
        }

        let mask = self.validity_mask(cloud, params);
        let (value, error) = self.observed();
        let factor = self.fields.unit_factor;

        let mut pixels = ValidPixels {
            longitude: compress(&self.fields.longitude, &mask),
            latitude: compress(&self.fields.latitude, &mask),
            value: compress(value, &mask).into_iter().map(|v| v * factor).collect(),
            error: compress(error, &mask).into_iter().map(|e| e * factor).collect(),
            cloud_fraction: compress(&cloud.cloud_fraction, &mask),
            cloud_pressure: compress(&cloud.cloud_pressure, &mask),
            ..Default::default()
        };

        for ((row, _), _) in mask.indexed_iter().filter(|&(_, &valid)| valid) {
            if let Some(time) = self.fields.scanline_times[row] {
                pixels.day.push(time.day);
                pixels.hour.push(time.hour);
                pixels.minute.push(time.minute);
            }
        }

        if self.mode == ColumnMode::Tropospheric {
            pixels.stratospheric = Some(
                compress(&self.columns.strat_vcd, &mask)
                    .into_iter()
                    .map(|v| v * factor)
                    .collect(),
            );
            pixels.total = Some(
                compress(&self.columns.total_vcd, &mask)
                    .into_iter()
                    .map(|v| v * factor)
                    .collect(),
            );
        }

        log::debug!("{} valid pixels after screening", pixels.len());
        Outcome::Ready(pixels)
    }
}

/// Values of `grid` where `mask` is set, in row-major order
fn compress<T: Copy>(grid: &Array2<T>, mask: &Array2<bool>) -> Vec<T> {
    grid.iter()
        .zip(mask.iter())
        .filter_map(|(&v, &keep)| if keep { Some(v) } else { None })
        .collect()
}
