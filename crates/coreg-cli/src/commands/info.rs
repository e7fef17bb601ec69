use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use coreg_core::io::read_raster;

#[derive(Args)]
pub struct InfoArgs {
    /// Raster file (any GDAL-readable format)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let raster = read_raster(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let gt = &raster.geotransform;
    let footprint = raster.footprint();

    println!("File:        {}", args.file.display());
    println!("Dimensions:  {}x{}", raster.cols(), raster.rows());
    println!("Bands:       {}", raster.bands());
    println!("Pixel size:  {} x {}", gt.pixel_width, gt.pixel_height);
    println!("Origin:      ({}, {})", gt.top_left_x, gt.top_left_y);
    if gt.is_rotated() {
        println!("Rotation:    ({}, {})", gt.rotation_x, gt.rotation_y);
    }
    println!(
        "Extent:      x {:.3}..{:.3}, y {:.3}..{:.3}",
        footprint.min_x, footprint.max_x, footprint.min_y, footprint.max_y
    );
    println!("Projection:  {}", raster.projection);
    if let Some(datum) = raster.projection.datum() {
        println!("Datum:       {}", datum);
    }
    match raster.nodata {
        Some(nodata) => println!("Nodata:      {}", nodata),
        None => println!("Nodata:      not set"),
    }

    let total = (raster.rows() * raster.cols()) as f64;
    for band in 1..=raster.bands() {
        let valid = raster.valid_mask(band)?.iter().filter(|&&v| v).count();
        println!(
            "Band {:<3}     {:.1}% valid",
            band,
            100.0 * valid as f64 / total
        );
    }

    let data_mb = (raster.data.len() * std::mem::size_of::<f32>()) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", data_mb);

    Ok(())
}
