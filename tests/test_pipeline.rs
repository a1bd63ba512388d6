use approx::assert_relative_eq;
use chrono::NaiveDate;
use netcdf::extent::Extents;
use no2cosample::io::swath_file::product_epoch;
use no2cosample::types::{DU_TO_MOLECULES_PER_CM2, MOLES_PER_M2_TO_MOLECULES_PER_CM2};
use no2cosample::{
    CloudProduct, ColumnMode, CosampleError, Cosampler, CosamplingParams, OrbitFiles, Outcome,
    ReferenceSeries, ReferenceVersion, SiteLocation, SkipReason,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SITE_LAT: f64 = 28.309;
const SITE_LON: f64 = -16.4994;

const ROWS: usize = 2;
const COLS: usize = 3;
const GRID_DIMS: [&str; 3] = ["time", "scanline", "ground_pixel"];

const FIRST_ORBIT: &str = "20190601T094103";
const SECOND_ORBIT: &str = "20190601T112233";

const REFERENCE_TEXT: &str = "\
Short location name: Izana
Location latitude [deg]: 28.3090
Location longitude [deg]: -16.4994
Location altitude [m]: 300
---------------------------------------------------------------------------
Column 1: UT date and time for center of measurement, yyyymmddThhmmssZ (ISO 8601)
Column 2: Fractional days since 1-Jan-2000 UT midnight for center of measurement
Column 3: Effective duration of measurement in seconds
Column 4: Solar zenith angle for center of measurement in degree
Column 5: L2Fit data quality flag, 0=assured high quality
Column 6: L2 data quality flag for nitrogen dioxide, 0=assured high quality
Column 7: Nitrogen dioxide total vertical column amount [Dobson Units], -9e99=retrieval not successful
Column 8: Uncertainty of nitrogen dioxide total vertical column amount [Dobson Units]
---------------------------------------------------------------------------
20190601T131500Z 7091.55208 40.2 12.1 0 0 0.1300 0.0050
";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 6, d).expect("valid date")
}

fn site() -> SiteLocation {
    SiteLocation {
        latitude: SITE_LAT,
        longitude: SITE_LON,
        altitude: 300.0,
    }
}

fn params(cloud_product: CloudProduct) -> CosamplingParams {
    CosamplingParams {
        column_mode: ColumnMode::Total,
        cloud_product,
        reference_version: ReferenceVersion::V1_7,
        start_date: day(1),
        end_date: day(2),
        ..CosamplingParams::default()
    }
}

fn no2_path(root: &Path, stamp: &str) -> PathBuf {
    root.join("2019").join("06").join(format!(
        "S5P_PAL__L2__NO2____{}_20190601T130403_08464_01_010302_20190607T120622.nc",
        stamp
    ))
}

fn cloud_path(root: &Path, stamp: &str) -> PathBuf {
    root.join("CLOUD_OFFL").join("2019").join("06").join(format!(
        "S5P_OFFL_L2__CLOUD__{}_20190601T130403_08464_01_010107_20190607T120622.nc",
        stamp
    ))
}

fn add_grid_dims(grp: &mut netcdf::GroupMut, rows: usize, cols: usize) {
    grp.add_dimension("time", 1).expect("time dimension");
    grp.add_dimension("scanline", rows).expect("scanline dimension");
    grp.add_dimension("ground_pixel", cols).expect("ground_pixel dimension");
}

fn put_grid(grp: &mut netcdf::GroupMut, name: &str, values: &[f32]) {
    let mut var = grp.add_variable::<f32>(name, &GRID_DIMS).expect("add variable");
    var.put_values(values, Extents::All).expect("write variable");
}

fn filled(value: f32, n: usize) -> Vec<f32> {
    vec![value; n]
}

/// A 2x3 NO2 orbit over 2019-06-01 13:10/13:11 UTC, `lat_shift` degrees north of the site
fn write_no2_file(path: &Path, lat_shift: f64) {
    fs::create_dir_all(path.parent().expect("has parent")).expect("create dir");
    let n = ROWS * COLS;

    let longitude: Vec<f32> = (0..n)
        .map(|i| (SITE_LON + 0.05 * ((i % COLS) as f64 - 1.0)) as f32)
        .collect();
    let latitude: Vec<f32> = (0..n)
        .map(|i| (SITE_LAT + lat_shift + 0.05 * (i / COLS) as f64) as f32)
        .collect();
    let midnight = day(1).and_hms_opt(0, 0, 0).expect("valid time");
    let reference_seconds = (midnight - product_epoch()).num_seconds() as f64;

    let mut file = netcdf::create(path).expect("create NO2 file");
    let mut product = file.add_group("PRODUCT").expect("PRODUCT group");
    add_grid_dims(&mut product, ROWS, COLS);
    put_grid(&mut product, "longitude", &longitude);
    put_grid(&mut product, "latitude", &latitude);
    put_grid(&mut product, "qa_value", &filled(1.0, n));
    {
        let mut var = product
            .add_variable::<f32>("nitrogendioxide_tropospheric_column", &GRID_DIMS)
            .expect("add variable");
        var.put_values(filled(4e-5, n).as_slice(), Extents::All).expect("write variable");
        var.add_attribute(
            "multiplication_factor_to_convert_to_molecules_percm2",
            MOLES_PER_M2_TO_MOLECULES_PER_CM2,
        )
        .expect("unit factor");
    }
    {
        let mut var = product.add_variable::<f64>("time", &["time"]).expect("add time");
        var.put_values(&[reference_seconds], Extents::All).expect("write time");
    }
    {
        let mut var = product
            .add_variable::<f64>("delta_time", &["time", "scanline"])
            .expect("add delta_time");
        var.put_values(&[47_400_000.0, 47_460_000.0], Extents::All)
            .expect("write delta_time");
    }

    let mut support = product.add_group("SUPPORT_DATA").expect("SUPPORT_DATA group");
    {
        let mut grp = support.add_group("DETAILED_RESULTS").expect("DETAILED_RESULTS group");
        add_grid_dims(&mut grp, ROWS, COLS);
        put_grid(&mut grp, "nitrogendioxide_total_column", &filled(6e-5, n));
        put_grid(&mut grp, "nitrogendioxide_slant_column_density", &filled(1e-4, n));
        put_grid(&mut grp, "nitrogendioxide_slant_column_density_precision", &filled(1e-6, n));
        put_grid(&mut grp, "nitrogendioxide_stratospheric_column", &filled(2e-5, n));
        put_grid(&mut grp, "nitrogendioxide_stratospheric_column_precision", &filled(1e-6, n));
        put_grid(&mut grp, "air_mass_factor_stratosphere", &filled(1.0, n));
    }
    {
        let mut grp = support.add_group("INPUT_DATA").expect("INPUT_DATA group");
        add_grid_dims(&mut grp, ROWS, COLS);
        put_grid(&mut grp, "surface_pressure", &filled(100_000.0, n));
        put_grid(&mut grp, "cloud_fraction_crb", &filled(0.1, n));
        put_grid(&mut grp, "cloud_pressure_crb", &filled(80_000.0, n));
        put_grid(&mut grp, "apparent_scene_pressure", &filled(90_000.0, n));
        // ocean
        put_grid(&mut grp, "snow_ice_flag", &filled(255.0, n));
    }
    {
        let mut grp = support.add_group("GEOLOCATIONS").expect("GEOLOCATIONS group");
        add_grid_dims(&mut grp, ROWS, COLS);
        put_grid(&mut grp, "solar_zenith_angle", &filled(0.0, n));
        put_grid(&mut grp, "viewing_zenith_angle", &filled(0.0, n));
    }
}

/// A separate cloud product file on a `rows` x `cols` grid
fn write_cloud_file(path: &Path, rows: usize, cols: usize) {
    fs::create_dir_all(path.parent().expect("has parent")).expect("create dir");
    let n = rows * cols;

    let mut file = netcdf::create(path).expect("create cloud file");
    let mut product = file.add_group("PRODUCT").expect("PRODUCT group");
    add_grid_dims(&mut product, rows, cols);
    put_grid(&mut product, "cloud_fraction", &filled(0.2, n));
    put_grid(&mut product, "cloud_top_pressure", &filled(70_000.0, n));
    put_grid(&mut product, "qa_value", &filled(1.0, n));

    let mut support = product.add_group("SUPPORT_DATA").expect("SUPPORT_DATA group");
    let mut input = support.add_group("INPUT_DATA").expect("INPUT_DATA group");
    add_grid_dims(&mut input, rows, cols);
    put_grid(&mut input, "snow_ice_flag", &filled(0.0, n));
}

fn load_reference(tmp: &Path, params: &CosamplingParams) -> ReferenceSeries {
    let path = tmp.join("Pandora101s1_Izana_L2Tot_rnvs1p1-7.txt");
    fs::write(&path, REFERENCE_TEXT).expect("write reference");
    Cosampler::load_reference(&path, params).expect("parse reference")
}

fn expected_total_column() -> f64 {
    // (SCD - strat * AMF_strat) / AMF_geo + strat, AMF_geo = 2 at nadir
    ((1e-4 - 2e-5) / 2.0 + 2e-5) * MOLES_PER_M2_TO_MOLECULES_PER_CM2
}

#[test]
fn test_run_with_colocated_clouds() {
    let _ = env_logger::builder().is_test(true).try_init();

    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("tropomi");
    write_no2_file(&no2_path(&root, FIRST_ORBIT), 0.0);

    let params = params(CloudProduct::Fresco);
    let reference = load_reference(tmp.path(), &params);
    let mut cosampler = Cosampler::new(params, reference).expect("valid range");
    cosampler.run(&root, "PAL_").expect("run completes");
    let series = cosampler.finish();

    let first = series.day(day(1)).expect("in range");
    assert_eq!(first.sat_count, ROWS * COLS);
    assert_relative_eq!(first.sat_mean, expected_total_column(), max_relative = 1e-5);
    assert_relative_eq!(first.cloud_fraction_mean, 0.1, max_relative = 1e-5);
    assert_relative_eq!(first.cloud_pressure_mean, 800.0, max_relative = 1e-5);
    assert_eq!(first.ref_count, 1);
    assert_relative_eq!(first.ref_mean, 0.13 * DU_TO_MOLECULES_PER_CM2, max_relative = 1e-9);
    assert_relative_eq!(first.ref_error, 0.005 * DU_TO_MOLECULES_PER_CM2, max_relative = 1e-9);
    assert_relative_eq!(first.start_utc, 13.25, max_relative = 1e-12);

    let second = series.day(day(2)).expect("in range");
    assert_eq!(second.sat_count, 0);
    assert!(second.sat_mean.is_nan());
}

#[test]
fn test_scanline_times_read_from_file() {
    let tmp = TempDir::new().expect("tempdir");
    let path = no2_path(tmp.path(), FIRST_ORBIT);
    write_no2_file(&path, 0.0);

    let reference = ReferenceSeries::new(site(), ReferenceVersion::V1_7, Vec::new());
    let cosampler = Cosampler::new(params(CloudProduct::Fresco), reference).expect("valid range");
    let pixels = cosampler
        .load_orbit(&OrbitFiles { no2: path, cloud: None })
        .expect("readable orbit")
        .ready()
        .expect("orbit near site");

    assert_eq!(pixels.len(), ROWS * COLS);
    assert_eq!(pixels.day, vec![1; ROWS * COLS]);
    assert_eq!(pixels.hour, vec![13; ROWS * COLS]);
    assert_eq!(pixels.minute, vec![10, 10, 10, 11, 11, 11]);
}

#[test]
fn test_orbit_far_from_site_is_skipped() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("tropomi");
    let path = no2_path(&root, FIRST_ORBIT);
    write_no2_file(&path, 5.0);

    let reference = ReferenceSeries::new(site(), ReferenceVersion::V1_7, Vec::new());
    let mut cosampler = Cosampler::new(params(CloudProduct::Fresco), reference).expect("valid range");
    let outcome = cosampler
        .load_orbit(&OrbitFiles { no2: path, cloud: None })
        .expect("readable orbit");
    assert_eq!(outcome, Outcome::Skip(SkipReason::NoData));

    assert_eq!(cosampler.process_day(&root, "PAL_", day(1)).expect("day completes"), 0);
    let series = cosampler.finish();
    assert_eq!(series.day(day(1)).expect("in range").sat_count, 0);
}

#[test]
fn test_mismatched_cloud_grid_skips_only_that_orbit() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("tropomi");
    write_no2_file(&no2_path(&root, FIRST_ORBIT), 0.0);
    write_no2_file(&no2_path(&root, SECOND_ORBIT), 0.0);
    write_cloud_file(&cloud_path(&root, FIRST_ORBIT), ROWS + 1, COLS);
    write_cloud_file(&cloud_path(&root, SECOND_ORBIT), ROWS, COLS);

    let params = params(CloudProduct::O22Cld);
    let reference = load_reference(tmp.path(), &params);
    let mut cosampler = Cosampler::new(params, reference).expect("valid range");

    cosampler.run(&root, "PAL_").expect("run completes");

    let series = cosampler.finish();
    let first = series.day(day(1)).expect("in range");
    assert_eq!(first.sat_count, ROWS * COLS);
    assert_relative_eq!(first.sat_mean, expected_total_column(), max_relative = 1e-5);
    assert_relative_eq!(first.cloud_fraction_mean, 0.2, max_relative = 1e-5);
    assert_relative_eq!(first.cloud_pressure_mean, 700.0, max_relative = 1e-5);
}

#[test]
fn test_missing_cloud_file_aborts_run() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("tropomi");
    write_no2_file(&no2_path(&root, FIRST_ORBIT), 0.0);

    let reference = ReferenceSeries::new(site(), ReferenceVersion::V1_7, Vec::new());
    let mut cosampler = Cosampler::new(params(CloudProduct::O22Cld), reference).expect("valid range");

    let result = cosampler.run(&root, "PAL_");
    assert!(matches!(result, Err(CosampleError::InconsistentFileSet(_))));
}
