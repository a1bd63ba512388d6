//! Locating input files on disk and naming the output file

use crate::types::{CloudProduct, ColumnMode, CosampleError, CosampleResult, ReferenceVersion};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};

/// A ground site with a known reference data record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownSite {
    /// Selector used on the command line and in output names
    pub key: &'static str,
    pub instrument: u32,
    /// Site name as it appears in reference file names
    pub name: &'static str,
    pub version: ReferenceVersion,
}

pub const KNOWN_SITES: &[KnownSite] = &[
    KnownSite { key: "altzomoni", instrument: 65, name: "Altzomoni", version: ReferenceVersion::V1_8 },
    KnownSite { key: "izana", instrument: 101, name: "Izana", version: ReferenceVersion::V1_7 },
    KnownSite { key: "mauna_loa_59", instrument: 59, name: "MaunaLoaHI", version: ReferenceVersion::V1_7 },
    KnownSite { key: "mauna_loa_56", instrument: 56, name: "MaunaLoaHI", version: ReferenceVersion::V1_7 },
    KnownSite { key: "eureka", instrument: 144, name: "Eureka-PEARL", version: ReferenceVersion::V1_7 },
    KnownSite { key: "fairbanks", instrument: 29, name: "FairbanksAK", version: ReferenceVersion::V1_7 },
    KnownSite { key: "fort-mckay", instrument: 122, name: "FortMcKay", version: ReferenceVersion::V1_7 },
    KnownSite { key: "ny-alesund", instrument: 152, name: "NyAlesund", version: ReferenceVersion::V1_7 },
];

pub fn known_site(key: &str) -> CosampleResult<&'static KnownSite> {
    KNOWN_SITES
        .iter()
        .find(|s| s.key == key)
        .ok_or_else(|| CosampleError::InvalidMode(format!("Unknown reference site: {}", key)))
}

impl KnownSite {
    /// File-name suffix identifying column type and processing version
    pub fn file_suffix(&self, mode: ColumnMode) -> &'static str {
        match (self.version, mode) {
            (ReferenceVersion::V1_7, ColumnMode::Total) => "Tot_rnvs1p1-7",
            (ReferenceVersion::V1_7, ColumnMode::Tropospheric) => "Trop_rnvh1p1-7",
            (ReferenceVersion::V1_8, ColumnMode::Total) => "_rnvs3p1-8",
            (ReferenceVersion::V1_8, ColumnMode::Tropospheric) => "_rnvh3p1-8",
        }
    }

    /// `<dir>/<key>/Pandora<num>s1_<name>_L2<suffix>.txt`
    pub fn reference_file_path(&self, dir: &Path, mode: ColumnMode) -> PathBuf {
        dir.join(self.key).join(format!(
            "Pandora{}s1_{}_L2{}.txt",
            self.instrument,
            self.name,
            self.file_suffix(mode)
        ))
    }
}

/// Site box half-width in degrees for a selector such as "02"
pub fn box_half_width_deg(selector: &str) -> CosampleResult<f64> {
    match selector {
        "03" => Ok(0.3),
        "02" => Ok(0.2),
        "01" => Ok(0.1),
        "005" => Ok(0.05),
        _ => Err(CosampleError::InvalidMode(format!("Unsupported box size: {}", selector))),
    }
}

/// Reference sampling half-width in hours for a selector in minutes
pub fn time_half_width_hours(selector: &str) -> CosampleResult<f64> {
    match selector {
        "60" => Ok(1.0),
        "30" => Ok(0.5),
        "15" => Ok(0.25),
        _ => Err(CosampleError::InvalidMode(format!("Unsupported time window: {}", selector))),
    }
}

fn files_with_prefix(dir: &Path, prefix: &str) -> CosampleResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        log::debug!("Directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn month_dir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(date.format("%Y").to_string()).join(date.format("%m").to_string())
}

/// NO2 orbit files for `date` under `root/YYYY/MM/`, sorted by name
pub fn satellite_files_on_day(root: &Path, date: NaiveDate, product_tag: &str) -> CosampleResult<Vec<PathBuf>> {
    let prefix = format!("S5P_{}_L2__NO2____{}", product_tag, date.format("%Y%m%dT"));
    let files = files_with_prefix(&month_dir(root, date), &prefix)?;
    log::info!("Found {} satellite files for {}", files.len(), date);
    Ok(files)
}

/// Separate cloud product files for `date` under `root/CLOUD_OFFL/YYYY/MM/`
pub fn cloud_files_on_day(root: &Path, date: NaiveDate) -> CosampleResult<Vec<PathBuf>> {
    let prefix = format!("S5P_OFFL_L2__CLOUD__{}", date.format("%Y%m%dT"));
    files_with_prefix(&month_dir(&root.join("CLOUD_OFFL"), date), &prefix)
}

/// One NO2 orbit file and where its cloud fields come from
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitFiles {
    pub no2: PathBuf,
    /// `None` when the cloud fields are read from the NO2 file itself
    pub cloud: Option<PathBuf>,
}

/// Pair each NO2 file of the day with its cloud source
///
/// For the separate cloud product the number of files must agree, otherwise
/// the delivery is incomplete and the run cannot continue.
pub fn orbit_pairs_on_day(
    root: &Path,
    date: NaiveDate,
    product_tag: &str,
    cloud_product: CloudProduct,
) -> CosampleResult<Vec<OrbitFiles>> {
    let no2_files = satellite_files_on_day(root, date, product_tag)?;
    if !cloud_product.is_external() {
        return Ok(no2_files.into_iter().map(|no2| OrbitFiles { no2, cloud: None }).collect());
    }

    let cloud_files = cloud_files_on_day(root, date)?;
    if cloud_files.len() != no2_files.len() {
        log::error!(
            "NO2 files = {}, cloud files = {} on {}",
            no2_files.len(),
            cloud_files.len(),
            date
        );
        return Err(CosampleError::InconsistentFileSet(format!(
            "{} NO2 files but {} cloud files on {}",
            no2_files.len(),
            cloud_files.len(),
            date
        )));
    }

    Ok(no2_files
        .into_iter()
        .zip(cloud_files)
        .map(|(no2, cloud)| OrbitFiles { no2, cloud: Some(cloud) })
        .collect())
}

/// First `YYYYMMDDTHHMMSS` token of the file name, the orbit start time
pub fn orbit_start_stamp(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let re = Regex::new(r"\d{8}T\d{6}").ok()?;
    re.find(&name).map(|m| m.as_str().to_string())
}

/// Output file name for a run configuration
///
/// The cloud product appears as the user selected it (`dlr-ocra` stays `dlr-ocra`).
pub fn output_file_name(
    site_key: &str,
    cloud_selector: &str,
    mode: ColumnMode,
    box_selector: &str,
    window_selector: &str,
    bias_corrected: bool,
) -> String {
    let suffix = if bias_corrected { "bias-corr-v2" } else { "v1" };
    format!(
        "tropomi-pandora-comparison-{}-{}-{}-{}deg-{}min-{}.nc",
        site_key,
        cloud_selector,
        mode.tag(),
        box_selector,
        window_selector,
        suffix
    )
}
