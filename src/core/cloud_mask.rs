use crate::types::{Grid, Outcome, SkipReason};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Cloud fields read from the separate L2 cloud product
#[derive(Debug, Clone)]
pub struct ExternalCloudFields {
    pub cloud_fraction: Grid,
    /// Pa
    pub cloud_top_pressure: Grid,
    pub qa_value: Grid,
    pub snow_ice_flag: Grid,
}

/// Cloud fields stored in the NO2 product itself
#[derive(Debug, Clone)]
pub struct ColocatedCloudFields {
    pub cloud_fraction: Grid,
    /// Pa
    pub cloud_pressure: Grid,
    /// Apparent scene pressure, Pa
    pub scene_pressure: Grid,
    pub snow_ice_flag: Grid,
}

/// Thresholds and flag codes used to screen cloud fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudScreeningParams {
    /// External product pixels below this QA value lose their cloud fields
    pub min_qa_value: f64,
    /// Snow/ice code for ocean scenes
    pub ocean_code: f64,
    /// Snow/ice code for suspect coastline scenes
    pub suspect_coast_code: f64,
    /// Snow/ice cover percentage below which a scene counts as clear
    pub min_snow_percent: f64,
    /// Exclusive range of snow/ice codes that may be cloud misclassified as snow
    pub misclassified_codes: (f64, f64),
    /// Scene pressure above this fraction of surface pressure marks a misclassified scene as clear
    pub scene_pressure_ratio: f64,
}

impl Default for CloudScreeningParams {
    fn default() -> Self {
        Self {
            min_qa_value: 0.5,
            ocean_code: 255.0,
            suspect_coast_code: 252.0,
            min_snow_percent: 1.0,
            misclassified_codes: (80.0, 104.0),
            scene_pressure_ratio: 0.98,
        }
    }
}

impl CloudScreeningParams {
    /// Map a raw snow/ice code to 0 when the scene should be treated as snow-free
    pub fn normalize_snow_flag(&self, flag: f64, scene_pressure: f64, surface_pressure: f64) -> f64 {
        if flag == self.ocean_code || flag == self.suspect_coast_code || flag < self.min_snow_percent {
            return 0.0;
        }
        let (low, high) = self.misclassified_codes;
        if flag > low && flag < high && scene_pressure > self.scene_pressure_ratio * surface_pressure {
            return 0.0;
        }
        flag
    }
}

/// Screened cloud fields on the swath grid
///
/// `cloud_fraction` and `cloud_pressure` are NaN wherever the cloud retrieval is
/// unusable. `snow_ice_flag` is 0 for snow-free scenes.
#[derive(Debug, Clone)]
pub struct CloudMask {
    pub cloud_fraction: Grid,
    /// Pa
    pub cloud_pressure: Grid,
    pub snow_ice_flag: Grid,
}

impl CloudMask {
    pub fn dim(&self) -> (usize, usize) {
        self.cloud_fraction.dim()
    }

    /// Screen the external cloud product: low QA or snow/ice invalidates the cloud fields
    pub fn from_external(fields: ExternalCloudFields, params: &CloudScreeningParams) -> Outcome<Self> {
        let dim = fields.cloud_fraction.dim();
        for found in [fields.cloud_top_pressure.dim(), fields.qa_value.dim(), fields.snow_ice_flag.dim()] {
            if found != dim {
                return Outcome::Skip(SkipReason::ShapeMismatch { expected: dim, found });
            }
        }

        let screen = |field: &Grid| {
            Zip::from(field)
                .and(&fields.qa_value)
                .and(&fields.snow_ice_flag)
                .map_collect(|&v, &qa, &snow| {
                    if qa < params.min_qa_value || snow != 0.0 {
                        f64::NAN
                    } else {
                        v
                    }
                })
        };

        let cloud_fraction = screen(&fields.cloud_fraction);
        let cloud_pressure = screen(&fields.cloud_top_pressure);

        Outcome::Ready(Self {
            cloud_fraction,
            cloud_pressure,
            snow_ice_flag: fields.snow_ice_flag,
        })
    }

    /// Screen the co-located cloud fields, normalizing the snow/ice flag first
    ///
    /// `surface_pressure` comes from the swath and must share its grid.
    pub fn from_colocated(
        fields: ColocatedCloudFields,
        surface_pressure: &Grid,
        params: &CloudScreeningParams,
    ) -> Outcome<Self> {
        let dim = fields.cloud_fraction.dim();
        for found in [
            fields.cloud_pressure.dim(),
            fields.scene_pressure.dim(),
            fields.snow_ice_flag.dim(),
            surface_pressure.dim(),
        ] {
            if found != dim {
                return Outcome::Skip(SkipReason::ShapeMismatch { expected: dim, found });
            }
        }

        let snow_ice_flag = Zip::from(&fields.snow_ice_flag)
            .and(&fields.scene_pressure)
            .and(surface_pressure)
            .map_collect(|&flag, &scene, &surface| params.normalize_snow_flag(flag, scene, surface));

        let screen = |field: &Grid| {
            Zip::from(field)
                .and(&snow_ice_flag)
                .map_collect(|&v, &snow| if snow != 0.0 { f64::NAN } else { v })
        };

        let cloud_fraction = screen(&fields.cloud_fraction);
        let cloud_pressure = screen(&fields.cloud_pressure);

        Outcome::Ready(Self {
            cloud_fraction,
            cloud_pressure,
            snow_ice_flag,
        })
    }
}
