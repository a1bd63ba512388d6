use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use no2cosample::io::discovery::{box_half_width_deg, known_site, output_file_name, time_half_width_hours};
use no2cosample::io::output::write_daily_series;
use no2cosample::{CloudProduct, ColumnMode, ComparisonStatistics, Cosampler, CosamplingParams};
use std::path::PathBuf;

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Co-sample satellite NO2 columns with a ground reference site.
///
/// Matches every orbit in the date range to the site, builds daily error-weighted means of both
/// records and writes them to a netCDF file in the output directory.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "cosample")]
#[clap(author, version, about)]
struct CosampleOptions {
    /// Root of the satellite archive, laid out as YYYY/MM/ (cloud product under CLOUD_OFFL/).
    #[clap(long)]
    trop_dir: PathBuf,

    /// Directory holding one sub-directory of reference files per site.
    #[clap(long)]
    ref_dir: PathBuf,

    /// Directory to write the comparison file into.
    #[clap(long)]
    out_dir: PathBuf,

    /// Column to compare, Tot or Trop.
    #[clap(long, parse(try_from_str=parse_column_mode))]
    #[clap(default_value = "Tot")]
    column: ColumnMode,

    /// Cloud product used for screening: fresco or o22cld (alias dlr-ocra).
    ///
    /// The name is used unchanged in the output file name.
    #[clap(long, default_value = "fresco")]
    cloud_product: String,

    /// Reference site, e.g. izana, altzomoni, mauna_loa_59, eureka.
    #[clap(long, default_value = "izana")]
    site: String,

    /// Half-width of the site box in tenths of a degree: 03, 02, 01 or 005.
    #[clap(long, default_value = "02")]
    box_deg: String,

    /// Half-width of the reference sampling window in minutes: 60, 30 or 15.
    #[clap(long, default_value = "30")]
    window_min: String,

    /// Apply the empirical bias correction to the satellite columns.
    #[clap(long)]
    bias_correction: bool,

    /// First day to process (yyyy-mm-dd).
    #[clap(long, default_value = "2019-06-01")]
    start_date: NaiveDate,

    /// Last day to process, inclusive (yyyy-mm-dd).
    #[clap(long, default_value = "2020-05-31")]
    end_date: NaiveDate,

    /// Satellite product name in the file names, OFFL or PAL_.
    #[clap(long, default_value = "PAL_")]
    product: String,
}

fn parse_column_mode(mode: &str) -> Result<ColumnMode, String> {
    mode.parse().map_err(|e| format!("{}", e))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = CosampleOptions::parse();

    let site = known_site(&opts.site)?;
    let cloud_product: CloudProduct = opts.cloud_product.parse()?;
    let mut params = CosamplingParams {
        column_mode: opts.column,
        cloud_product,
        reference_version: site.version,
        apply_bias_correction: opts.bias_correction,
        start_date: opts.start_date,
        end_date: opts.end_date,
        ..CosamplingParams::default()
    };
    params.matching.box_half_width_deg = box_half_width_deg(&opts.box_deg)?;
    params.matching.time_half_width_hours = time_half_width_hours(&opts.window_min)?;

    let reference_path = site.reference_file_path(&opts.ref_dir, params.column_mode);
    let reference = Cosampler::load_reference(&reference_path, &params)
        .with_context(|| format!("reading reference file {}", reference_path.display()))?;
    log::info!("Reference site: {} ({})", site.name, reference_path.display());

    let mut cosampler = Cosampler::new(params, reference)?;
    cosampler.run(&opts.trop_dir, &opts.product)?;
    let series = cosampler.finish();

    let out_file = opts.out_dir.join(output_file_name(
        site.key,
        &opts.cloud_product,
        opts.column,
        &opts.box_deg,
        &opts.window_min,
        opts.bias_correction,
    ));
    write_daily_series(&out_file, &series, cloud_product)
        .with_context(|| format!("writing {}", out_file.display()))?;

    match ComparisonStatistics::from_series(&series) {
        Some(stats) => {
            for line in stats.to_string().lines() {
                log::info!("{}", line);
            }
        }
        None => log::warn!("Fewer than two days with both satellite and reference data"),
    }

    Ok(())
}
