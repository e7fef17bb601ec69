use ndarray::{s, Array2, ArrayView2};
use tracing::{debug, warn};

use crate::consts::{
    AUTO_WINDOW_FRACTION, AUTO_WINDOW_MAX, AUTO_WINDOW_MIN, SMALL_WINDOW_THRESHOLD,
};
use crate::error::{FailureKind, Result};
use crate::geo::{BoundingBox, GeoTransform};
use crate::pipeline::config::{WindowConfig, WindowPosition};
use crate::pipeline::types::{Advisory, AdvisoryKind};
use crate::raster::Raster;
use crate::resample::{resample_to_grid, ResamplingMethod, SampleSource};

use super::reconcile::Reconciliation;

/// Resolved matching window: centre in map coordinates, size in analysis pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSpec {
    pub center: (f64, f64),
    /// `(width, height)`.
    pub size: (usize, usize),
}

/// Equal-shape reference and target windows on the analysis grid.
#[derive(Clone, Debug)]
pub struct SampleWindow {
    pub reference: Array2<f32>,
    pub target: Array2<f32>,
    /// Geotransform of the window on the analysis grid.
    pub geotransform: GeoTransform,
    /// Integer correction applied to the target window, in analysis pixels.
    pub target_offset: (i64, i64),
    pub ref_nodata_fraction: f64,
    pub tgt_nodata_fraction: f64,
    pub ref_obscured_fraction: f64,
    pub tgt_obscured_fraction: f64,
}

impl SampleWindow {
    pub fn dim(&self) -> (usize, usize) {
        self.reference.dim()
    }

    pub fn resolution(&self) -> (f64, f64) {
        self.geotransform.resolution()
    }
}

/// Bands and thresholds used while cutting windows.
#[derive(Clone, Copy, Debug)]
pub struct ExtractOptions<'a> {
    pub ref_band: usize,
    pub tgt_band: usize,
    pub window: &'a WindowConfig,
    pub method: ResamplingMethod,
}

/// Turn the configured (or automatic) position and size into a [`WindowSpec`].
pub fn resolve_window(
    reference: &Raster,
    target: &Raster,
    rec: &Reconciliation,
    config: &WindowConfig,
    advisories: &mut Vec<Advisory>,
) -> Result<WindowSpec> {
    let center = match config.position {
        Some(WindowPosition::Map { x, y }) => (x, y),
        Some(WindowPosition::Pixel { col, row }) => {
            reference.geotransform.pixel_to_map(col, row)
        }
        None => rec.overlap.center(),
    };
    if !rec.overlap.contains_point(center.0, center.1) {
        return Err(FailureKind::OutOfBounds(format!(
            "window centre ({:.3}, {:.3}) lies outside the image overlap",
            center.0, center.1
        ))
        .into());
    }

    let size = match config.size {
        Some((w, h)) => {
            if w < SMALL_WINDOW_THRESHOLD || h < SMALL_WINDOW_THRESHOLD {
                let message = format!(
                    "The window size ({}, {}) is a rather small value; the shift estimate \
                     may be inaccurate. Consider at least {} pixels per side.",
                    w, h, SMALL_WINDOW_THRESHOLD
                );
                warn!("{}", message);
                advisories.push(Advisory::new(AdvisoryKind::SmallWindow, message));
            }
            (w, h)
        }
        None => {
            let side = auto_window_size(reference, target, rec)?;
            (side, side)
        }
    };

    debug!(?center, ?size, "Resolved matching window");
    Ok(WindowSpec { center, size })
}

/// Odd square size proportional to the larger image extent, clamped to the overlap.
fn auto_window_size(reference: &Raster, target: &Raster, rec: &Reconciliation) -> Result<usize> {
    let (res_x, res_y) = rec.resolution;
    let extent_px = |bbox: &BoundingBox| (bbox.width() / res_x).max(bbox.height() / res_y);
    let largest = extent_px(&reference.footprint()).max(extent_px(&target.footprint()));

    let mut side = ((largest * AUTO_WINDOW_FRACTION) as usize).clamp(AUTO_WINDOW_MIN, AUTO_WINDOW_MAX);
    let overlap_limit =
        ((rec.overlap.width() / res_x).min(rec.overlap.height() / res_y) + 1e-6).floor() as usize;
    side = side.min(overlap_limit);
    if side % 2 == 0 {
        side = side.saturating_sub(1);
    }
    if side < 3 {
        return Err(FailureKind::OutOfBounds(format!(
            "the image overlap ({} pixels across) is too small for a matching window",
            overlap_limit
        ))
        .into());
    }
    Ok(side)
}

/// Cut the reference and target windows for one matching pass.
///
/// `target_offset` is the integer correction found by earlier passes; the
/// target window is read displaced by it so that only the residual shift
/// remains between the two windows.
pub fn extract_window(
    reference: &Raster,
    target: &Raster,
    rec: &Reconciliation,
    spec: &WindowSpec,
    options: &ExtractOptions<'_>,
    target_offset: (i64, i64),
) -> Result<SampleWindow> {
    let (w, h) = spec.size;
    let window_gt = snap_window(&rec.grid, spec);
    let tol = rec.resolution.0.min(rec.resolution.1) * 1e-6;

    let window_box = window_gt.footprint(h, w);
    if !rec.overlap.contains(&window_box, tol) {
        return Err(FailureKind::OutOfBounds(format!(
            "a {}x{} window centred at ({:.3}, {:.3}) extends beyond the image overlap",
            w, h, spec.center.0, spec.center.1
        ))
        .into());
    }

    let (off_x, off_y) = target_offset;
    let (shift_x, shift_y) = window_gt.pixel_delta_to_map(-(off_x as f64), -(off_y as f64));
    let target_gt = window_gt.translated(shift_x, shift_y);
    if !target.footprint().contains(&target_gt.footprint(h, w), tol) {
        return Err(FailureKind::OutOfBounds(format!(
            "the matching window left the target image after re-matching by ({}, {}) pixels",
            off_x, off_y
        ))
        .into());
    }

    let ref_cut = cut_band(
        reference,
        options.ref_band,
        &window_gt,
        (h, w),
        rec.ref_needs_resampling,
        options.method,
    )?;
    let tgt_cut = cut_band(
        target,
        options.tgt_band,
        &target_gt,
        (h, w),
        rec.needs_resampling,
        options.method,
    )?;

    let ref_nodata_fraction = invalid_fraction(&ref_cut.1);
    let tgt_nodata_fraction = invalid_fraction(&tgt_cut.1);
    let max_nodata = options.window.max_nodata_fraction;
    for (name, fraction) in [("reference", ref_nodata_fraction), ("target", tgt_nodata_fraction)] {
        if fraction >= max_nodata {
            return Err(FailureKind::NoValidData(format!(
                "{:.1}% of the {} matching window is nodata (limit {:.1}%)",
                fraction * 100.0,
                name,
                max_nodata * 100.0
            ))
            .into());
        }
    }

    let ref_obscured_fraction = obscured_fraction(reference, &window_gt, (h, w));
    let tgt_obscured_fraction = obscured_fraction(target, &target_gt, (h, w));
    let max_obscured = options.window.max_obscured_fraction;
    let worst = ref_obscured_fraction.max(tgt_obscured_fraction);
    if worst > max_obscured {
        return Err(FailureKind::ObscuredWindow {
            fraction: worst * 100.0,
            limit: max_obscured * 100.0,
        }
        .into());
    }

    debug!(
        ?target_offset,
        ref_nodata_fraction,
        tgt_nodata_fraction,
        ref_obscured_fraction,
        tgt_obscured_fraction,
        "Extracted matching window"
    );

    Ok(SampleWindow {
        reference: fill_invalid(ref_cut.0, &ref_cut.1),
        target: fill_invalid(tgt_cut.0, &tgt_cut.1),
        geotransform: window_gt,
        target_offset,
        ref_nodata_fraction,
        tgt_nodata_fraction,
        ref_obscured_fraction,
        tgt_obscured_fraction,
    })
}

/// Window geotransform whose origin falls on a node of the analysis grid.
fn snap_window(grid: &GeoTransform, spec: &WindowSpec) -> GeoTransform {
    let (w, h) = spec.size;
    let (col, row) = grid.map_to_pixel(spec.center.0, spec.center.1);
    let col0 = (col - w as f64 / 2.0).round();
    let row0 = (row - h as f64 / 2.0).round();
    let (x0, y0) = grid.pixel_to_map(col0, row0);
    GeoTransform::new(x0, grid.pixel_width, y0, grid.pixel_height)
}

/// Values and validity of one band on the window grid `win_gt`.
fn cut_band(
    raster: &Raster,
    band: usize,
    win_gt: &GeoTransform,
    (h, w): (usize, usize),
    resample: bool,
    method: ResamplingMethod,
) -> Result<(Array2<f32>, Array2<bool>)> {
    let view = raster.band(band)?;
    if !resample {
        if let Some((row0, col0)) = grid_offset(&raster.geotransform, win_gt, (h, w), view) {
            let values = view.slice(s![row0..row0 + h, col0..col0 + w]).to_owned();
            let valid = Array2::from_shape_fn((h, w), |(r, c)| {
                raster.is_valid(&view, row0 + r, col0 + c)
            });
            return Ok((values, valid));
        }
    }
    let mask = raster.valid_mask(band)?;
    let source = SampleSource::new(view, &mask);
    Ok(resample_to_grid(
        source,
        &raster.geotransform,
        win_gt,
        h,
        w,
        method,
        0.0,
    ))
}

/// Integer `(row, col)` of the window origin in the raster, if the window is
/// aligned with the raster grid and lies fully inside it.
fn grid_offset(
    raster_gt: &GeoTransform,
    win_gt: &GeoTransform,
    (h, w): (usize, usize),
    view: ArrayView2<'_, f32>,
) -> Option<(usize, usize)> {
    if !raster_gt.is_aligned_with(win_gt) {
        return None;
    }
    let (col, row) = raster_gt.map_to_pixel(win_gt.top_left_x, win_gt.top_left_y);
    let (col, row) = (col.round(), row.round());
    if col < 0.0 || row < 0.0 {
        return None;
    }
    let (col, row) = (col as usize, row as usize);
    let (rows, cols) = view.dim();
    (row + h <= rows && col + w <= cols).then_some((row, col))
}

fn invalid_fraction(valid: &Array2<bool>) -> f64 {
    let total = valid.len();
    if total == 0 {
        return 1.0;
    }
    valid.iter().filter(|v| !**v).count() as f64 / total as f64
}

/// Fraction of window pixels flagged by the raster's obscuration mask,
/// looked up at the nearest source pixel.
fn obscured_fraction(raster: &Raster, win_gt: &GeoTransform, (h, w): (usize, usize)) -> f64 {
    let Some(mask) = raster.obscuration_mask.as_ref() else {
        return 0.0;
    };
    let (rows, cols) = mask.dim();
    let mut flagged = 0usize;
    for r in 0..h {
        for c in 0..w {
            let (x, y) = win_gt.pixel_to_map(c as f64 + 0.5, r as f64 + 0.5);
            let (sc, sr) = raster.geotransform.map_to_pixel(x, y);
            if sc < 0.0 || sr < 0.0 {
                continue;
            }
            let (sc, sr) = (sc.floor() as usize, sr.floor() as usize);
            if sr < rows && sc < cols && mask[[sr, sc]] {
                flagged += 1;
            }
        }
    }
    flagged as f64 / (h * w).max(1) as f64
}

/// Replace invalid pixels with the mean of the valid ones.
fn fill_invalid(mut values: Array2<f32>, valid: &Array2<bool>) -> Array2<f32> {
    let (sum, count) = values
        .iter()
        .zip(valid.iter())
        .filter(|(_, ok)| **ok)
        .fold((0.0f64, 0usize), |(s, n), (v, _)| (s + *v as f64, n + 1));
    let mean = if count > 0 { (sum / count as f64) as f32 } else { 0.0 };
    values.zip_mut_with(valid, |v, ok| {
        if !*ok {
            *v = mean;
        }
    });
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_window_lands_on_grid() {
        let grid = GeoTransform::new(100.0, 10.0, 1000.0, -10.0);
        let spec = WindowSpec {
            center: (253.0, 747.0),
            size: (5, 5),
        };
        let gt = snap_window(&grid, &spec);
        assert!(gt.is_aligned_with(&grid));
        let (cx, cy) = gt.pixel_to_map(2.5, 2.5);
        assert!((cx - 253.0).abs() <= 5.0);
        assert!((cy - 747.0).abs() <= 5.0);
    }

    #[test]
    fn test_fill_invalid_uses_valid_mean() {
        let values = Array2::from_shape_vec((1, 3), vec![2.0f32, 4.0, -9999.0]).unwrap();
        let valid = Array2::from_shape_vec((1, 3), vec![true, true, false]).unwrap();
        let filled = fill_invalid(values, &valid);
        assert_eq!(filled[[0, 2]], 3.0);
    }

    #[test]
    fn test_invalid_fraction() {
        let valid = Array2::from_shape_vec((2, 2), vec![true, false, false, false]).unwrap();
        assert_eq!(invalid_fraction(&valid), 0.75);
    }
}
