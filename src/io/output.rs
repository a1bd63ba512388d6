use crate::core::aggregator::{DailySeries, DailyValues};
use crate::types::{CloudProduct, CosampleResult};
use netcdf::extent::Extents;
use std::path::Path;

const TIME_DIM: &str = "time";

struct OutputVariable {
    name: &'static str,
    units: &'static str,
    long_name: &'static str,
    value: fn(&DailyValues) -> f64,
}

const VARIABLES: &[OutputVariable] = &[
    OutputVariable {
        name: "start_utc",
        units: "hours",
        long_name: "Start of reference sampling window (UTC)",
        value: |d| d.start_utc,
    },
    OutputVariable {
        name: "end_utc",
        units: "hours",
        long_name: "End of reference sampling window (UTC)",
        value: |d| d.end_utc,
    },
    OutputVariable {
        name: "panno2",
        units: "molecules/cm2",
        long_name: "Reference NO2 column, weighted daily mean",
        value: |d| d.ref_mean,
    },
    OutputVariable {
        name: "panerr",
        units: "molecules/cm2",
        long_name: "Reference NO2 column error",
        value: |d| d.ref_error,
    },
    OutputVariable {
        name: "pancnt",
        units: "unitless",
        long_name: "Number of reference observations used",
        value: |d| d.ref_count as f64,
    },
    OutputVariable {
        name: "satno2",
        units: "molecules/cm2",
        long_name: "Satellite NO2 column, error-weighted daily mean",
        value: |d| d.sat_mean,
    },
    OutputVariable {
        name: "saterr",
        units: "molecules/cm2",
        long_name: "Satellite NO2 column error",
        value: |d| d.sat_error,
    },
    OutputVariable {
        name: "satcnt",
        units: "unitless",
        long_name: "Number of satellite pixels used",
        value: |d| d.sat_count as f64,
    },
    OutputVariable {
        name: "satcldh",
        units: "hPa",
        long_name: "Mean cloud pressure of matched satellite pixels",
        value: |d| d.cloud_pressure_mean,
    },
    OutputVariable {
        name: "satcldf",
        units: "1",
        long_name: "Mean cloud fraction of matched satellite pixels",
        value: |d| d.cloud_fraction_mean,
    },
];

/// Write a finalized daily series as a netCDF-4 time series over `time`
pub fn write_daily_series<P: AsRef<Path>>(
    path: P,
    series: &DailySeries,
    cloud_product: CloudProduct,
) -> CosampleResult<()> {
    let path = path.as_ref();
    log::info!("Writing {} days to {}", series.len(), path.display());

    let mut file = netcdf::create(path)?;
    file.add_dimension(TIME_DIM, series.len())?;

    let days: Vec<f32> = (0..series.len()).map(|i| i as f32).collect();
    let mut var = file.add_variable::<f32>("days", &[TIME_DIM])?;
    var.put_values(days.as_slice(), Extents::All)?;
    var.add_attribute("units", format!("days since {}", series.start_date.format("%Y-%m-%d")))?;
    var.add_attribute("long_name", "Days since start of comparison period")?;

    for column in VARIABLES {
        let data: Vec<f32> = series.days.iter().map(|d| (column.value)(d) as f32).collect();
        let mut var = file.add_variable::<f32>(column.name, &[TIME_DIM])?;
        var.put_values(data.as_slice(), Extents::All)?;
        var.add_attribute("units", column.units)?;
        var.add_attribute("long_name", column.long_name)?;
    }

    file.add_attribute("column_mode", series.mode.tag())?;
    file.add_attribute("cloud_product", cloud_product.tag())?;
    file.add_attribute("start_date", series.start_date.format("%Y-%m-%d").to_string())?;

    Ok(())
}
