use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::{CoregError, Result};
use crate::geo::{BoundingBox, GeoTransform, Projection};

/// A georeferenced, band-stacked raster held in memory.
///
/// Pixel values are stored as f32, shape = (bands, rows, cols).
#[derive(Clone, Debug)]
pub struct Raster {
    pub data: Array3<f32>,
    pub geotransform: GeoTransform,
    pub projection: Projection,
    pub nodata: Option<f64>,
    /// `true` marks pixels that must not take part in matching.
    pub bad_data_mask: Option<Array2<bool>>,
    /// Ancillary cloud/quality mask: `true` marks valid but unusable pixels.
    pub obscuration_mask: Option<Array2<bool>>,
    /// File the raster was read from, if any.
    pub source_path: Option<PathBuf>,
}

impl Raster {
    pub fn new(data: Array3<f32>, geotransform: GeoTransform, projection: Projection) -> Result<Self> {
        let (bands, rows, cols) = data.dim();
        if bands == 0 || rows == 0 || cols == 0 {
            return Err(CoregError::InvalidRaster(format!(
                "empty raster ({} bands, {}x{})",
                bands, cols, rows
            )));
        }
        geotransform.validate()?;
        Ok(Self {
            data,
            geotransform,
            projection,
            nodata: None,
            bad_data_mask: None,
            obscuration_mask: None,
            source_path: None,
        })
    }

    /// Single-band raster from a 2-D array.
    pub fn from_band(band: Array2<f32>, geotransform: GeoTransform, projection: Projection) -> Result<Self> {
        Self::new(band.insert_axis(Axis(0)), geotransform, projection)
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_bad_data_mask(mut self, mask: Array2<bool>) -> Result<Self> {
        self.check_mask_shape(&mask, "bad-data mask")?;
        self.bad_data_mask = Some(mask);
        Ok(self)
    }

    pub fn with_obscuration_mask(mut self, mask: Array2<bool>) -> Result<Self> {
        self.check_mask_shape(&mask, "obscuration mask")?;
        self.obscuration_mask = Some(mask);
        Ok(self)
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    fn check_mask_shape(&self, mask: &Array2<bool>, what: &str) -> Result<()> {
        if mask.dim() != (self.rows(), self.cols()) {
            return Err(CoregError::InvalidRaster(format!(
                "{} is {}x{} but the raster is {}x{}",
                what,
                mask.ncols(),
                mask.nrows(),
                self.cols(),
                self.rows()
            )));
        }
        Ok(())
    }

    pub fn bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// View of a band, 1-based like GDAL band numbers.
    pub fn band(&self, band: usize) -> Result<ArrayView2<'_, f32>> {
        if band == 0 || band > self.bands() {
            return Err(CoregError::InvalidConfig(format!(
                "band {} requested but the raster has {} band(s)",
                band,
                self.bands()
            )));
        }
        Ok(self.data.index_axis(Axis(0), band - 1))
    }

    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd as f32)
    }

    /// Pixel is neither nodata nor flagged by the bad-data mask.
    pub fn is_valid(&self, band: &ArrayView2<'_, f32>, row: usize, col: usize) -> bool {
        !self.is_nodata(band[[row, col]])
            && !self
                .bad_data_mask
                .as_ref()
                .is_some_and(|m| m[[row, col]])
    }

    /// Per-pixel validity of a band.
    pub fn valid_mask(&self, band: usize) -> Result<Array2<bool>> {
        let view = self.band(band)?;
        Ok(Array2::from_shape_fn((self.rows(), self.cols()), |(r, c)| {
            self.is_valid(&view, r, c)
        }))
    }

    pub fn has_valid_data(&self, band: usize) -> Result<bool> {
        let view = self.band(band)?;
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                if self.is_valid(&view, row, col) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub fn footprint(&self) -> BoundingBox {
        self.geotransform.footprint(self.rows(), self.cols())
    }

    /// Short display name used in logs and derived output names.
    pub fn display_name(&self) -> String {
        self.source_path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<in-memory>".to_string())
    }
}

/// Where a raster comes from: a file to be read, or data already in memory.
#[derive(Clone, Debug)]
pub enum RasterSource {
    Path(PathBuf),
    Memory(Raster),
}

impl RasterSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn from_memory(raster: Raster) -> Self {
        Self::Memory(raster)
    }

    /// Materialise into an in-memory [`Raster`].
    pub fn load(self) -> Result<Raster> {
        match self {
            Self::Path(path) => crate::io::read_raster(&path),
            Self::Memory(raster) => Ok(raster),
        }
    }
}

impl From<Raster> for RasterSource {
    fn from(raster: Raster) -> Self {
        Self::Memory(raster)
    }
}

impl From<PathBuf> for RasterSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for RasterSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}
