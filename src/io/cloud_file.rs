use crate::core::cloud_mask::{ColocatedCloudFields, ExternalCloudFields};
use crate::io::discovery::orbit_start_stamp;
use crate::io::netcdf_reader::NetcdfReader;
use crate::types::{CosampleError, CosampleResult};
use std::path::Path;

const PRODUCT: &str = "PRODUCT";
const INPUT_DATA: &str = "PRODUCT/SUPPORT_DATA/INPUT_DATA";

/// Read the separate L2 cloud product for one orbit
///
/// `expected_stamp` is the orbit start stamp of the NO2 file this cloud file is
/// paired with; a file from a different orbit is a fatal pairing error.
pub fn read_external_cloud_fields<P: AsRef<Path>>(
    path: P,
    expected_stamp: &str,
) -> CosampleResult<ExternalCloudFields> {
    let path = path.as_ref();
    let stamp = orbit_start_stamp(path).unwrap_or_default();
    if stamp != expected_stamp {
        log::error!("NO2 file {}, cloud file {}: not the same orbit", expected_stamp, stamp);
        return Err(CosampleError::InconsistentFileSet(format!(
            "cloud file {} does not match orbit {}",
            path.display(),
            expected_stamp
        )));
    }

    let nc = NetcdfReader::open(path)?;
    Ok(ExternalCloudFields {
        cloud_fraction: nc.read_grid(&format!("{}/cloud_fraction", PRODUCT))?,
        cloud_top_pressure: nc.read_grid(&format!("{}/cloud_top_pressure", PRODUCT))?,
        qa_value: nc.read_grid(&format!("{}/qa_value", PRODUCT))?,
        snow_ice_flag: nc.read_flag_grid(&format!("{}/snow_ice_flag", INPUT_DATA))?,
    })
}

/// Read the cloud retrieval carried inside the NO2 file itself
pub fn read_colocated_cloud_fields<P: AsRef<Path>>(path: P) -> CosampleResult<ColocatedCloudFields> {
    let nc = NetcdfReader::open(path)?;
    Ok(ColocatedCloudFields {
        cloud_fraction: nc.read_grid(&format!("{}/cloud_fraction_crb", INPUT_DATA))?,
        cloud_pressure: nc.read_grid(&format!("{}/cloud_pressure_crb", INPUT_DATA))?,
        scene_pressure: nc.read_grid(&format!("{}/apparent_scene_pressure", INPUT_DATA))?,
        snow_ice_flag: nc.read_flag_grid(&format!("{}/snow_ice_flag", INPUT_DATA))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_orbit_is_fatal() {
        let path = Path::new("/data/S5P_OFFL_L2__CLOUD__20190601T112233_20190601T130403_08465_01_010107_20190607T120622.nc");
        let result = read_external_cloud_fields(path, "20190601T094103");
        assert!(matches!(result, Err(CosampleError::InconsistentFileSet(_))));
    }
}
