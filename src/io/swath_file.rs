use crate::core::swath::{any_pixel_near, ScanlineTime, SwathFields};
use crate::io::netcdf_reader::NetcdfReader;
use crate::types::{CosampleError, CosampleResult, Outcome, SiteLocation, SkipReason};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::path::Path;

const PRODUCT: &str = "PRODUCT";
const DETAILED_RESULTS: &str = "PRODUCT/SUPPORT_DATA/DETAILED_RESULTS";
const INPUT_DATA: &str = "PRODUCT/SUPPORT_DATA/INPUT_DATA";
const GEOLOCATIONS: &str = "PRODUCT/SUPPORT_DATA/GEOLOCATIONS";

const UNIT_FACTOR_ATTRIBUTE: &str = "multiplication_factor_to_convert_to_molecules_percm2";

/// Start of the product time axis
pub fn product_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2010, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Scanline acquisition times from the product reference time (s since epoch) and per-scanline offsets (ms)
pub fn scanline_times(reference_seconds: f64, delta_ms: &[f64]) -> Vec<Option<ScanlineTime>> {
    let epoch = product_epoch();
    delta_ms
        .iter()
        .map(|&delta| {
            if !reference_seconds.is_finite() || !delta.is_finite() {
                return None;
            }
            let offset = Duration::milliseconds((reference_seconds * 1000.0 + delta).round() as i64);
            epoch.checked_add_signed(offset).map(|t| ScanlineTime {
                day: t.day(),
                hour: t.hour(),
                minute: t.minute(),
            })
        })
        .collect()
}

fn var(group: &str, name: &str) -> String {
    format!("{}/{}", group, name)
}

/// Read one L2 NO2 orbit file
///
/// Skips with `NoData` when no pixel lies within `search_box_deg` of the site; the
/// check runs on geolocation alone before any other field is read.
pub fn read_swath_fields<P: AsRef<Path>>(
    path: P,
    site: &SiteLocation,
    search_box_deg: f64,
) -> CosampleResult<Outcome<SwathFields>> {
    let path = path.as_ref();
    let nc = NetcdfReader::open(path)?;

    let longitude = nc.read_grid(&var(PRODUCT, "longitude"))?;
    let latitude = nc.read_grid(&var(PRODUCT, "latitude"))?;
    if !any_pixel_near(&longitude, &latitude, site, search_box_deg) {
        log::debug!("No pixels within {} deg of site in {}", search_box_deg, path.display());
        return Ok(Outcome::Skip(SkipReason::NoData));
    }

    let trop_column = var(PRODUCT, "nitrogendioxide_tropospheric_column");
    let unit_factor = nc.attribute_f64(&trop_column, UNIT_FACTOR_ATTRIBUTE)?.ok_or_else(|| {
        CosampleError::InvalidFormat(format!(
            "{} lacks {} in {}",
            trop_column,
            UNIT_FACTOR_ATTRIBUTE,
            path.display()
        ))
    })?;

    let reference_seconds = nc
        .read_values(&var(PRODUCT, "time"))?
        .first()
        .copied()
        .unwrap_or(f64::NAN);
    let delta_ms = nc.read_values(&var(PRODUCT, "delta_time"))?;

    let (rows, _) = latitude.dim();
    if delta_ms.len() != rows {
        return Err(CosampleError::InvalidFormat(format!(
            "{} scanline times for {} scanlines in {}",
            delta_ms.len(),
            rows,
            path.display()
        )));
    }

    let fields = SwathFields {
        scanline_times: scanline_times(reference_seconds, &delta_ms),
        qa_value: nc.read_grid(&var(PRODUCT, "qa_value"))?,
        total_vcd: nc.read_grid(&var(DETAILED_RESULTS, "nitrogendioxide_total_column"))?,
        total_scd: nc.read_grid(&var(DETAILED_RESULTS, "nitrogendioxide_slant_column_density"))?,
        total_scd_precision: nc.read_grid(&var(
            DETAILED_RESULTS,
            "nitrogendioxide_slant_column_density_precision",
        ))?,
        strat_vcd: nc.read_grid(&var(DETAILED_RESULTS, "nitrogendioxide_stratospheric_column"))?,
        strat_vcd_precision: nc.read_grid(&var(
            DETAILED_RESULTS,
            "nitrogendioxide_stratospheric_column_precision",
        ))?,
        strat_amf: nc.read_grid(&var(DETAILED_RESULTS, "air_mass_factor_stratosphere"))?,
        surface_pressure: nc.read_grid(&var(INPUT_DATA, "surface_pressure"))?,
        solar_zenith: nc.read_grid(&var(GEOLOCATIONS, "solar_zenith_angle"))?,
        viewing_zenith: nc.read_grid(&var(GEOLOCATIONS, "viewing_zenith_angle"))?,
        longitude,
        latitude,
        unit_factor,
    };

    log::info!(
        "Read {}x{} swath from {}",
        fields.dim().0,
        fields.dim().1,
        path.display()
    );
    Ok(Outcome::Ready(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanline_times_from_offsets() {
        // 2019-06-03T00:00:00 is 297_216_000 s after the epoch
        let reference = 297_216_000.0;
        let delta = [
            (13.0 * 3600.0 + 29.0 * 60.0) * 1000.0 + 59_999.0,
            (23.0 * 3600.0 + 59.0 * 60.0) * 1000.0 + 30_000.0,
            24.0 * 3600.0 * 1000.0 + 60_000.0,
            f64::NAN,
        ];
        let times = scanline_times(reference, &delta);

        assert_eq!(times[0], Some(ScanlineTime { day: 3, hour: 13, minute: 29 }));
        assert_eq!(times[1], Some(ScanlineTime { day: 3, hour: 23, minute: 59 }));
        assert_eq!(times[2], Some(ScanlineTime { day: 4, hour: 0, minute: 1 }));
        assert_eq!(times[3], None);
    }
}
