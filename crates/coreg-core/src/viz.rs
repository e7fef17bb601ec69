//! Diagnostic renderings of a match. Purely observational: nothing here
//! feeds back into the shift computation.

use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat, Luma};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use tracing::info;

use crate::align::{shift_array, PixelShift};
use crate::error::{CoregError, Result};

/// Windows and correlation surface retained from the final matching pass.
#[derive(Clone, Debug)]
pub struct MatchDiagnostics {
    pub reference: Array2<f32>,
    /// Target window as read at the start of matching (no correction applied).
    pub target: Array2<f32>,
    /// Correlation surface of the final pass, zero shift at the centre.
    pub correlation: Array2<f64>,
    /// Total shift found, in analysis pixels.
    pub shift: PixelShift,
}

impl MatchDiagnostics {
    /// Write `<stem>_correlation.png` and `<stem>_match.png` into `dir`.
    ///
    /// The match image shows reference, target, and corrected target side by side.
    pub fn save_pngs(&self, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let correlation_path = dir.join(format!("{}_correlation.png", stem));
        let surface = self.correlation.mapv(|v| v as f32);
        save_normalized_png(surface.view(), &correlation_path)?;

        let corrected = shift_array(&self.target, self.shift);
        let strip = concatenate(
            Axis(1),
            &[
                normalize(self.reference.view()).view(),
                normalize(self.target.view()).view(),
                normalize(corrected.view()).view(),
            ],
        )
        .map_err(|e| CoregError::InvalidRaster(format!("cannot tile match windows: {}", e)))?;
        let match_path = dir.join(format!("{}_match.png", stem));
        save_unit_png(strip.view(), &match_path)?;

        info!(dir = %dir.display(), "Wrote match diagnostics");
        Ok(vec![correlation_path, match_path])
    }
}

/// Stretch values linearly to `[0, 1]`.
fn normalize(data: ArrayView2<'_, f32>) -> Array2<f32> {
    let (lo, hi) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    if !(range > 0.0) {
        return Array2::zeros(data.dim());
    }
    data.mapv(|v| if v.is_finite() { (v - lo) / range } else { 0.0 })
}

fn save_normalized_png(data: ArrayView2<'_, f32>, path: &Path) -> Result<()> {
    save_unit_png(normalize(data).view(), path)
}

/// Save `[0, 1]` data as 8-bit grayscale PNG.
fn save_unit_png(data: ArrayView2<'_, f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let val = (data[[row, col]].clamp(0.0, 1.0) * 255.0) as u8;
            img.put_pixel(col as u32, row as u32, Luma([val]));
        }
    }
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
