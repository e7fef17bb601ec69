//! Raster I/O through GDAL datasets. The driver is picked by GDAL on read and
//! by [`OutputFormat`] on write.

use std::path::Path;

use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{Dataset, DriverManager};
use ndarray::Array3;
use tracing::debug;

use crate::error::{CoregError, Result};
use crate::geo::{GeoTransform, Projection};
use crate::raster::Raster;

use super::{CreationOptions, OutputFormat};

/// Read every band of a GDAL-readable raster as float32.
pub fn read_dataset(path: &Path) -> Result<Raster> {
    let ds = Dataset::open(path)?;
    let (cols, rows) = ds.raster_size();
    let bands = ds.raster_count() as usize;
    if bands == 0 || rows == 0 || cols == 0 {
        return Err(CoregError::InvalidRaster(format!(
            "{}: empty raster ({} bands, {}x{})",
            path.display(),
            bands,
            cols,
            rows
        )));
    }

    let geotransform = match ds.geo_transform() {
        Ok(gt) => GeoTransform::from_gdal(gt),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No geotransform, using pixel grid");
            GeoTransform::default()
        }
    };
    let projection = Projection::from_wkt(ds.projection());

    let mut samples = Vec::with_capacity(bands * rows * cols);
    let mut nodata = None;
    for b in 1..=bands {
        let band = ds.rasterband(b)?;
        if b == 1 {
            nodata = band.no_data_value();
        }
        let buffer = band.read_as::<f32>((0, 0), (cols, rows), (cols, rows), None)?;
        let (_, data) = buffer.into_shape_and_vec();
        samples.extend(data);
    }
    let data = Array3::from_shape_vec((bands, rows, cols), samples)
        .map_err(|e| CoregError::InvalidRaster(format!("{}: {}", path.display(), e)))?;

    Ok(Raster::new(data, geotransform, projection)?
        .with_nodata(nodata)
        .with_source_path(path))
}

/// Write all bands as float32 with the driver of `format`. Creation options
/// reach the driver unchanged.
pub fn write_dataset(
    raster: &Raster,
    path: &Path,
    format: OutputFormat,
    options: &CreationOptions,
) -> Result<()> {
    let (bands, rows, cols) = (raster.bands(), raster.rows(), raster.cols());
    let driver = DriverManager::get_driver_by_name(format.driver_name())?;

    let mut gdal_options = RasterCreationOptions::new();
    for (key, value) in options.entries() {
        gdal_options.set_name_value(key, value)?;
    }
    let mut ds = driver.create_with_band_type_with_options::<f32, _>(
        path,
        cols,
        rows,
        bands,
        &gdal_options,
    )?;

    ds.set_geo_transform(&raster.geotransform.to_gdal())?;
    if !raster.projection.is_empty() {
        ds.set_projection(raster.projection.wkt())?;
    }

    for b in 1..=bands {
        let mut band = ds.rasterband(b)?;
        if let Some(nodata) = raster.nodata {
            band.set_no_data_value(Some(nodata))?;
        }
        let values: Vec<f32> = raster.band(b)?.iter().copied().collect();
        let mut buffer = Buffer::new((cols, rows), values);
        band.write((0, 0), (cols, rows), &mut buffer)?;
    }
    debug!(
        driver = format.driver_name(),
        options = options.entries().len(),
        "Created dataset"
    );
    Ok(())
}
