//! Reader for ground-based spectrometer L2 text files
//!
//! Layout: a `key: value` header, a dashed separator, `Column N: description`
//! lines, a second dashed separator, then whitespace-separated data rows.
//! Columns are located by their description rather than by position, since
//! processing versions number them differently.

use crate::types::{ColumnMode, CosampleError, CosampleResult, SiteLocation};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::Path;

/// Values at or below this denote a failed retrieval
pub const MISSING_VALUE_THRESHOLD: f64 = -9e99;

/// Flag value for a row whose quality flag is missing; fails every accept-list
pub const MISSING_FLAG: i32 = i32::MAX;

const LATITUDE_KEY: &str = "Location latitude [deg]";
const LONGITUDE_KEY: &str = "Location longitude [deg]";
const ALTITUDE_KEY: &str = "Location altitude [m]";
const SITE_NAME_KEY: &str = "Short location name";

/// One measurement row, values in the file's native units
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFileRecord {
    pub time: NaiveDateTime,
    /// Fractional days since 2000-01-01
    pub julian_day: f64,
    pub solar_zenith: f64,
    pub value: f64,
    pub error: f64,
    pub qa_flag: i32,
    pub fit_flag: i32,
}

#[derive(Debug, Clone)]
pub struct ReferenceFile {
    pub site_name: Option<String>,
    pub site: SiteLocation,
    pub records: Vec<ReferenceFileRecord>,
}

/// Zero-based data-row positions of the columns we use
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    julian_day: usize,
    solar_zenith: usize,
    fit_flag: usize,
    qa_flag: usize,
    value: usize,
    error: usize,
}

impl ColumnLayout {
    fn from_descriptions(columns: &[(usize, String)], mode: ColumnMode) -> CosampleResult<Self> {
        let species = match mode {
            ColumnMode::Total => "nitrogen dioxide total vertical column amount",
            ColumnMode::Tropospheric => "nitrogen dioxide tropospheric vertical column amount",
        };
        let uncertainty = format!("uncertainty of {}", species);

        let find = |what: &str, pred: &dyn Fn(&str) -> bool| -> CosampleResult<usize> {
            columns
                .iter()
                .find(|(_, desc)| pred(desc.as_str()))
                .map(|(number, _)| number - 1)
                .ok_or_else(|| CosampleError::InvalidFormat(format!("no column for {}", what)))
        };

        Ok(Self {
            julian_day: find("fractional days", &|d: &str| d.starts_with("fractional days since 1-jan-2000"))?,
            solar_zenith: find("solar zenith angle", &|d: &str| d.starts_with("solar zenith angle"))?,
            fit_flag: find("L2Fit quality flag", &|d: &str| d.starts_with("l2fit data quality flag"))?,
            qa_flag: find("NO2 quality flag", &|d: &str| d.starts_with("l2 data quality flag for nitrogen dioxide"))?,
            value: find(species, &|d: &str| d.starts_with(species))?,
            error: find(&uncertainty, &|d: &str| d.contains(uncertainty.as_str()))?,
        })
    }

    fn width(&self) -> usize {
        [self.julian_day, self.solar_zenith, self.fit_flag, self.qa_flag, self.value, self.error]
            .iter()
            .max()
            .map_or(1, |m| m + 1)
    }
}

#[derive(PartialEq)]
enum Section {
    Header,
    Columns,
    Data,
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-')
}

fn format_error(line_no: usize, msg: impl std::fmt::Display) -> CosampleError {
    CosampleError::InvalidFormat(format!("line {}: {}", line_no, msg))
}

fn parse_value(token: &str, line_no: usize) -> CosampleResult<f64> {
    let v: f64 = token
        .parse()
        .map_err(|_| format_error(line_no, format!("cannot parse '{}'", token)))?;
    Ok(if v <= MISSING_VALUE_THRESHOLD { f64::NAN } else { v })
}

/// Quality flags; a missing flag becomes `MISSING_FLAG`
fn parse_flag(token: &str, line_no: usize) -> CosampleResult<i32> {
    let v = parse_value(token, line_no)?;
    if !v.is_finite() {
        return Ok(MISSING_FLAG);
    }
    if v.fract() != 0.0 || v < i32::MIN as f64 || v > i32::MAX as f64 {
        return Err(format_error(line_no, format!("bad quality flag '{}'", token)));
    }
    Ok(v as i32)
}

fn parse_timestamp(token: &str, line_no: usize) -> CosampleResult<NaiveDateTime> {
    let trimmed = token.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S%.f")
        .map_err(|e| format_error(line_no, format!("bad timestamp '{}': {}", token, e)))
}

fn header_f64(header: &HashMap<String, String>, key: &str) -> CosampleResult<f64> {
    let raw = header
        .get(key)
        .ok_or_else(|| CosampleError::InvalidFormat(format!("missing header key '{}'", key)))?;
    raw.parse()
        .map_err(|_| CosampleError::InvalidFormat(format!("header '{}' is not numeric: {}", key, raw)))
}

impl ReferenceFile {
    pub fn read<P: AsRef<Path>>(path: P, mode: ColumnMode) -> CosampleResult<Self> {
        let path = path.as_ref();
        log::info!("Reading reference file {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let file = Self::parse(&text, mode)?;
        log::debug!("{} records in {}", file.records.len(), path.display());
        Ok(file)
    }

    pub fn parse(text: &str, mode: ColumnMode) -> CosampleResult<Self> {
        let mut section = Section::Header;
        let mut header: HashMap<String, String> = HashMap::new();
        let mut columns: Vec<(usize, String)> = Vec::new();
        let mut layout: Option<ColumnLayout> = None;
        let mut records = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;

            match section {
                Section::Header => {
                    if is_separator(line) {
                        section = Section::Columns;
                    } else if let Some((key, value)) = line.split_once(':') {
                        header.insert(key.trim().to_string(), value.trim().to_string());
                    }
                }
                Section::Columns => {
                    if is_separator(line) {
                        layout = Some(ColumnLayout::from_descriptions(&columns, mode)?);
                        section = Section::Data;
                    } else if let Some(rest) = line.trim().strip_prefix("Column ") {
                        let (number, desc) = rest
                            .split_once(':')
                            .ok_or_else(|| format_error(line_no, "column line without ':'"))?;
                        let number: usize = number
                            .trim()
                            .parse()
                            .map_err(|_| format_error(line_no, format!("bad column number '{}'", number)))?;
                        if number == 0 {
                            return Err(format_error(line_no, "column numbers start at 1"));
                        }
                        columns.push((number, desc.trim().to_lowercase()));
                    }
                }
                Section::Data => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let layout = layout.ok_or_else(|| format_error(line_no, "data before column list"))?;
                    let tokens: Vec<&str> = line.split_whitespace().collect();
                    if tokens.len() < layout.width() {
                        return Err(format_error(
                            line_no,
                            format!("{} fields, expected at least {}", tokens.len(), layout.width()),
                        ));
                    }
                    records.push(ReferenceFileRecord {
                        time: parse_timestamp(tokens[0], line_no)?,
                        julian_day: parse_value(tokens[layout.julian_day], line_no)?,
                        solar_zenith: parse_value(tokens[layout.solar_zenith], line_no)?,
                        value: parse_value(tokens[layout.value], line_no)?,
                        error: parse_value(tokens[layout.error], line_no)?,
                        qa_flag: parse_flag(tokens[layout.qa_flag], line_no)?,
                        fit_flag: parse_flag(tokens[layout.fit_flag], line_no)?,
                    });
                }
            }
        }

        if section != Section::Data {
            return Err(CosampleError::InvalidFormat(
                "file ended before the data section".to_string(),
            ));
        }

        let site = SiteLocation {
            latitude: header_f64(&header, LATITUDE_KEY)?,
            longitude: header_f64(&header, LONGITUDE_KEY)?,
            altitude: header_f64(&header, ALTITUDE_KEY)?,
        };

        Ok(Self {
            site_name: header.get(SITE_NAME_KEY).cloned(),
            site,
            records,
        })
    }
}
