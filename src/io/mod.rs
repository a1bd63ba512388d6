//! Input/output: file discovery, product readers and result persistence

pub mod cloud_file;
pub mod discovery;
pub mod netcdf_reader;
pub mod output;
pub mod reference_file;
pub mod swath_file;

pub use cloud_file::{read_colocated_cloud_fields, read_external_cloud_fields};
pub use discovery::{known_site, orbit_pairs_on_day, orbit_start_stamp, output_file_name, KnownSite, OrbitFiles};
pub use netcdf_reader::NetcdfReader;
pub use output::write_daily_series;
pub use reference_file::{ReferenceFile, ReferenceFileRecord};
pub use swath_file::read_swath_fields;
