use crate::types::{CosampleError, CosampleResult, Grid};
use ndarray::{ArrayD, Axis, Ix2};
use netcdf::extent::Extents;
use netcdf::AttrValue;
use std::path::{Path, PathBuf};

/// Thin wrapper over a netCDF-4 file that reads variables by group path
/// (e.g. `PRODUCT/SUPPORT_DATA/INPUT_DATA/surface_pressure`) as `f64` grids
pub struct NetcdfReader {
    file: netcdf::File,
    path: PathBuf,
}

impl NetcdfReader {
    pub fn open<P: AsRef<Path>>(path: P) -> CosampleResult<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening netCDF file: {}", path.display());
        let file = netcdf::open(&path)?;
        Ok(Self { file, path })
    }

    fn variable(&self, name: &str) -> CosampleResult<netcdf::Variable<'_>> {
        self.file.variable(name).ok_or_else(|| CosampleError::MissingVariable {
            path: self.path.clone(),
            variable: name.to_string(),
        })
    }

    /// Numeric value of a variable attribute, if present
    pub fn attribute_f64(&self, variable: &str, attribute: &str) -> CosampleResult<Option<f64>> {
        let var = self.variable(variable)?;
        let value = match var.attribute(attribute) {
            Some(attr) => attr.value()?,
            None => return Ok(None),
        };
        Ok(attr_value_to_f64(&value))
    }

    fn read_raw(&self, name: &str) -> CosampleResult<ArrayD<f64>> {
        let var = self.variable(name)?;
        Ok(var.values_arr::<f64, _>(Extents::All)?)
    }

    /// All values of a variable, flattened, with fill values as NaN and packing undone
    pub fn read_values(&self, name: &str) -> CosampleResult<Vec<f64>> {
        let arr = self.unpack(name, self.read_raw(name)?)?;
        Ok(arr.iter().copied().collect())
    }

    /// First time slice of a (time, scanline, ground_pixel) variable, unpacked, fill as NaN
    pub fn read_grid(&self, name: &str) -> CosampleResult<Grid> {
        let raw = self.read_raw(name)?;
        let unpacked = self.unpack(name, raw)?;
        self.first_slice(name, unpacked)
    }

    /// First time slice of a flag variable, values as stored
    pub fn read_flag_grid(&self, name: &str) -> CosampleResult<Grid> {
        let raw = self.read_raw(name)?;
        self.first_slice(name, raw)
    }

    fn unpack(&self, name: &str, mut arr: ArrayD<f64>) -> CosampleResult<ArrayD<f64>> {
        let fill = self.attribute_f64(name, "_FillValue")?;
        let scale = self.attribute_f64(name, "scale_factor")?.unwrap_or(1.0);
        let offset = self.attribute_f64(name, "add_offset")?.unwrap_or(0.0);

        arr.mapv_inplace(|v| match fill {
            Some(f) if v == f => f64::NAN,
            _ => v * scale + offset,
        });
        Ok(arr)
    }

    fn first_slice(&self, name: &str, arr: ArrayD<f64>) -> CosampleResult<Grid> {
        let arr = match arr.ndim() {
            3 => arr.index_axis_move(Axis(0), 0),
            2 => arr,
            n => {
                return Err(CosampleError::InvalidFormat(format!(
                    "{} in {} has {} dimensions, expected 2 or 3",
                    name,
                    self.path.display(),
                    n
                )))
            }
        };
        arr.into_dimensionality::<Ix2>().map_err(|e| {
            CosampleError::InvalidFormat(format!("{} in {}: {}", name, self.path.display(), e))
        })
    }
}

fn attr_value_to_f64(value: &AttrValue) -> Option<f64> {
    match value {
        AttrValue::Uchar(v) => Some(*v as f64),
        AttrValue::Schar(v) => Some(*v as f64),
        AttrValue::Ushort(v) => Some(*v as f64),
        AttrValue::Short(v) => Some(*v as f64),
        AttrValue::Uint(v) => Some(*v as f64),
        AttrValue::Int(v) => Some(*v as f64),
        AttrValue::Ulonglong(v) => Some(*v as f64),
        AttrValue::Longlong(v) => Some(*v as f64),
        AttrValue::Float(v) => Some(*v as f64),
        AttrValue::Double(v) => Some(*v),
        AttrValue::Floats(v) => v.first().map(|x| *x as f64),
        AttrValue::Doubles(v) => v.first().copied(),
        _ => None,
    }
}
