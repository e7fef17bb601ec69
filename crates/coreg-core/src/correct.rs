use ndarray::{Array3, Axis};
use tracing::{debug, info};

use crate::consts::DEFAULT_OUTPUT_NODATA;
use crate::error::Result;
use crate::geo::GeoTransform;
use crate::pipeline::config::CorrectionConfig;
use crate::pipeline::types::ShiftResult;
use crate::raster::Raster;
use crate::resample::{resample_to_grid, SampleSource};

/// The corrected target and how it was produced.
#[derive(Clone, Debug)]
pub struct DeshiftResult {
    pub is_shifted: bool,
    pub is_resampled: bool,
    /// Corrected target; its geotransform is the updated one.
    pub raster: Raster,
    /// Geotransform of the target before correction.
    pub original_geotransform: GeoTransform,
    /// The output pixel grid coincides with the reference grid.
    pub grid_matches_reference: bool,
    pub shift: ShiftResult,
}

impl DeshiftResult {
    pub fn updated_geotransform(&self) -> GeoTransform {
        self.raster.geotransform
    }
}

/// Apply a validated shift to the target.
///
/// Without grid alignment only the geotransform origin moves. With it, every
/// band is resampled onto the reference grid (or an `out_gsd` grid anchored
/// at the reference origin) over the target's original extent.
pub fn apply_correction(
    target: &Raster,
    reference_grid: &GeoTransform,
    shift: &ShiftResult,
    config: &CorrectionConfig,
) -> Result<DeshiftResult> {
    let original = target.geotransform;
    let shifted_gt = original.translated(shift.dx_map, shift.dy_map);

    if !config.align_grids {
        let mut raster = target.clone();
        raster.geotransform = shifted_gt;
        info!(
            dx_map = shift.dx_map,
            dy_map = shift.dy_map,
            "Corrected target geotransform"
        );
        return Ok(DeshiftResult {
            is_shifted: true,
            is_resampled: false,
            grid_matches_reference: shifted_gt.is_aligned_with(reference_grid),
            raster,
            original_geotransform: original,
            shift: shift.clone(),
        });
    }

    let grid = output_grid(reference_grid, config.out_gsd);
    let (out_gt, rows, cols) = snap_extent(&grid, target);
    let fill = target.nodata.unwrap_or(DEFAULT_OUTPUT_NODATA);
    debug!(rows, cols, ?out_gt, fill, "Resampling target onto reference grid");

    let mut data = Array3::<f32>::zeros((target.bands(), rows, cols));
    for (idx, mut out_band) in data.axis_iter_mut(Axis(0)).enumerate() {
        let band = idx + 1;
        let view = target.band(band)?;
        let mask = target.valid_mask(band)?;
        let (values, _) = resample_to_grid(
            SampleSource::new(view, &mask),
            &shifted_gt,
            &out_gt,
            rows,
            cols,
            config.resamp_alg_deshift,
            fill as f32,
        );
        out_band.assign(&values);
    }

    let mut raster = Raster::new(data, out_gt, target.projection.clone())?.with_nodata(Some(fill));
    raster.source_path = target.source_path.clone();

    info!(
        method = %config.resamp_alg_deshift,
        rows,
        cols,
        "Resampled target onto reference grid"
    );

    Ok(DeshiftResult {
        is_shifted: true,
        is_resampled: true,
        grid_matches_reference: out_gt.is_aligned_with(reference_grid),
        raster,
        original_geotransform: original,
        shift: shift.clone(),
    })
}

/// Reference grid, optionally with a different pixel size but the same origin.
fn output_grid(reference_grid: &GeoTransform, out_gsd: Option<(f64, f64)>) -> GeoTransform {
    match out_gsd {
        Some((gx, gy)) => GeoTransform::new(
            reference_grid.top_left_x,
            gx.copysign(reference_grid.pixel_width),
            reference_grid.top_left_y,
            gy.copysign(reference_grid.pixel_height),
        ),
        None => *reference_grid,
    }
}

/// Smallest window of `grid` covering the target's original footprint.
fn snap_extent(grid: &GeoTransform, target: &Raster) -> (GeoTransform, usize, usize) {
    const EPS: f64 = 1e-6;
    let bbox = target.footprint();
    let corners = [
        grid.map_to_pixel(bbox.min_x, bbox.min_y),
        grid.map_to_pixel(bbox.min_x, bbox.max_y),
        grid.map_to_pixel(bbox.max_x, bbox.min_y),
        grid.map_to_pixel(bbox.max_x, bbox.max_y),
    ];
    let col_min = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let col_max = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let row_min = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let row_max = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let col0 = (col_min + EPS).floor();
    let row0 = (row_min + EPS).floor();
    let cols = ((col_max - EPS).ceil() - col0).max(1.0) as usize;
    let rows = ((row_max - EPS).ceil() - row0).max(1.0) as usize;

    let (x0, y0) = grid.pixel_to_map(col0, row0);
    (
        GeoTransform::new(x0, grid.pixel_width, y0, grid.pixel_height),
        rows,
        cols,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Projection;
    use ndarray::Array2;

    fn shift(dx_map: f64, dy_map: f64) -> ShiftResult {
        ShiftResult {
            dx_px: dx_map / 10.0,
            dy_px: -dy_map / 10.0,
            dx_map,
            dy_map,
            reliability: 90.0,
            peak_ratio: 0.1,
            is_reliable: true,
            iterations: 1,
            window_center: (0.0, 0.0),
            window_size: (64, 64),
            resolution: (10.0, 10.0),
            ssim_before: None,
            ssim_after: None,
        }
    }

    #[test]
    fn test_snap_extent_keeps_aligned_footprint() {
        let grid = GeoTransform::new(0.0, 10.0, 1000.0, -10.0);
        let target = Raster::from_band(
            Array2::ones((8, 6)),
            GeoTransform::new(50.0, 10.0, 900.0, -10.0),
            Projection::default(),
        )
        .unwrap();
        let (gt, rows, cols) = snap_extent(&grid, &target);
        assert_eq!(gt, target.geotransform);
        assert_eq!((rows, cols), (8, 6));
    }

    #[test]
    fn test_out_gsd_keeps_reference_origin() {
        let grid = GeoTransform::new(0.0, 10.0, 1000.0, -10.0);
        let out = output_grid(&grid, Some((20.0, 20.0)));
        assert_eq!(out.pixel_width, 20.0);
        assert_eq!(out.pixel_height, -20.0);
        assert_eq!(out.top_left_x, 0.0);
    }

    #[test]
    fn test_translate_only_keeps_pixels() {
        let data = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f32);
        let target = Raster::from_band(
            data,
            GeoTransform::new(0.0, 10.0, 100.0, -10.0),
            Projection::default(),
        )
        .unwrap();
        let result = apply_correction(
            &target,
            &target.geotransform,
            &shift(3.0, -4.0),
            &CorrectionConfig::default(),
        )
        .unwrap();
        assert!(!result.is_resampled);
        assert_eq!(result.raster.data, target.data);
        assert_eq!(result.updated_geotransform().top_left_x, 3.0);
        assert_eq!(result.updated_geotransform().top_left_y, 96.0);
    }
}
