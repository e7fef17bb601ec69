use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{CROSS_POWER_EPSILON, PEAK_EXCLUSION_RADIUS, UPSAMPLE_SEARCH_WINDOW};
use crate::error::{CoregError, FailureKind, Result};
use crate::pipeline::config::{EstimatorConfig, SubpixelMethod, TaperWindow};

use super::fft::{fft2d_forward, fftshift, ifft2d_inverse};
use super::subpixel::{refine_peak_paraboloid, refine_peak_upsampled};

/// Translation that moves the target window onto the reference window,
/// in analysis-grid pixels (x = columns, y = rows downward).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelShift {
    pub dx: f64,
    pub dy: f64,
}

impl PixelShift {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Whole-pixel part worth re-matching by. Components within half a
    /// pixel count as zero so that a shift of exactly 0.5 does not oscillate.
    pub fn integer_part(&self) -> (i64, i64) {
        let step = |v: f64| {
            if v.abs() <= 0.5 + 1e-6 {
                0
            } else {
                v.round() as i64
            }
        };
        (step(self.dx), step(self.dy))
    }
}

impl std::ops::Add for PixelShift {
    type Output = PixelShift;

    fn add(self, rhs: PixelShift) -> PixelShift {
        PixelShift::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

/// Outcome of one phase-correlation pass.
#[derive(Clone, Debug)]
pub struct ShiftEstimate {
    pub shift: PixelShift,
    /// Peak prominence in percent (0..100).
    pub reliability: f64,
    /// Strongest secondary peak relative to the main peak.
    pub peak_ratio: f64,
    pub is_reliable: bool,
    /// Correlation surface with zero displacement at `(h/2, w/2)`.
    pub correlation: Array2<f64>,
}

/// Remove the mean and apply the configured taper.
pub fn preprocess(data: &Array2<f32>, taper: TaperWindow) -> Array2<f32> {
    let mean = data.mean().unwrap_or(0.0);
    let centred = data.mapv(|v| v - mean);
    match taper {
        TaperWindow::None => centred,
        TaperWindow::Hann => apply_hann(&centred),
    }
}

pub fn apply_hann(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let wy: Vec<f64> = (0..h)
        .map(|r| 0.5 * (1.0 - (std::f64::consts::TAU * r as f64 / h as f64).cos()))
        .collect();
    let wx: Vec<f64> = (0..w)
        .map(|c| 0.5 * (1.0 - (std::f64::consts::TAU * c as f64 / w as f64).cos()))
        .collect();
    Array2::from_shape_fn((h, w), |(r, c)| data[[r, c]] * (wy[r] * wx[c]) as f32)
}

/// `a * conj(b) / |a * conj(b)|`, zero where the magnitude vanishes.
pub fn normalized_cross_power(
    a: &Array2<Complex<f64>>,
    b: &Array2<Complex<f64>>,
) -> Array2<Complex<f64>> {
    ndarray::Zip::from(a).and(b).map_collect(|&fa, &fb| {
        let cross = fa * fb.conj();
        let mag = cross.norm();
        if mag > CROSS_POWER_EPSILON {
            cross / mag
        } else {
            Complex::new(0.0, 0.0)
        }
    })
}

pub fn find_peak(data: &Array2<f64>) -> (usize, usize, f64) {
    let mut best = (0, 0, f64::NEG_INFINITY);
    for ((row, col), &v) in data.indexed_iter() {
        if v > best.2 {
            best = (row, col, v);
        }
    }
    best
}

/// Peak prominence against the background of the surface, in percent:
/// `100 * (1 - (mean + 2*std of background) / mean of 3x3 peak)`.
/// Also returns the highest background value relative to the peak.
fn peak_statistics(surface: &Array2<f64>, peak_row: usize, peak_col: usize) -> (f64, f64) {
    let (h, w) = surface.dim();
    let near = |r: usize, c: usize, radius: usize| {
        r.abs_diff(peak_row) <= radius && c.abs_diff(peak_col) <= radius
    };

    let mut peak_sum = 0.0;
    let mut peak_n = 0usize;
    let mut bg_sum = 0.0;
    let mut bg_sq = 0.0;
    let mut bg_n = 0usize;
    let mut bg_max = f64::NEG_INFINITY;
    for ((r, c), &v) in surface.indexed_iter() {
        if near(r, c, 1) {
            peak_sum += v;
            peak_n += 1;
        }
        if near(r, c, PEAK_EXCLUSION_RADIUS) {
            continue;
        }
        bg_sum += v;
        bg_sq += v * v;
        bg_n += 1;
        bg_max = bg_max.max(v);
    }

    let peak_val = surface[[peak_row, peak_col]];
    if bg_n == 0 || peak_n == 0 || h * w == 0 || peak_val <= 0.0 {
        return (0.0, 1.0);
    }
    let bg_mean = bg_sum / bg_n as f64;
    let bg_std = (bg_sq / bg_n as f64 - bg_mean * bg_mean).max(0.0).sqrt();
    let peak_mean = peak_sum / peak_n as f64;

    let reliability = if peak_mean > 0.0 {
        (100.0 * (1.0 - (bg_mean + 2.0 * bg_std) / peak_mean)).clamp(0.0, 100.0)
    } else {
        0.0
    };
    let ratio = (bg_max / peak_val).max(0.0);
    (reliability, ratio)
}

/// Estimate the translation between two equally sized windows by phase correlation.
pub fn compute_shift(
    reference: &Array2<f32>,
    target: &Array2<f32>,
    config: &EstimatorConfig,
) -> Result<ShiftEstimate> {
    let (h, w) = reference.dim();
    let (th, tw) = target.dim();
    if h != th || w != tw {
        return Err(CoregError::Estimation(format!(
            "window size mismatch: {}x{} vs {}x{}",
            w, h, tw, th
        )));
    }
    if h < 3 || w < 3 {
        return Err(CoregError::Estimation(format!(
            "window of {}x{} pixels is too small to correlate",
            w, h
        )));
    }

    let ref_fft = fft2d_forward(&preprocess(reference, config.taper));
    let tgt_fft = fft2d_forward(&preprocess(target, config.taper));

    let cross_power = normalized_cross_power(&ref_fft, &tgt_fft);
    let correlation = fftshift(&ifft2d_inverse(&cross_power));

    let (peak_row, peak_col, peak_val) = find_peak(&correlation);
    if !(peak_val > CROSS_POWER_EPSILON) {
        return Err(FailureKind::FeaturelessWindow.into());
    }
    let coarse_dy = peak_row as f64 - (h / 2) as f64;
    let coarse_dx = peak_col as f64 - (w / 2) as f64;

    let (dy, dx) = match config.subpixel {
        SubpixelMethod::Paraboloid => {
            let (sub_dy, sub_dx) = refine_peak_paraboloid(&correlation, peak_row, peak_col);
            (coarse_dy + sub_dy, coarse_dx + sub_dx)
        }
        SubpixelMethod::Upsampled { factor } => refine_peak_upsampled(
            &cross_power,
            (coarse_dy, coarse_dx),
            factor,
            UPSAMPLE_SEARCH_WINDOW,
        ),
    };

    let (reliability, peak_ratio) = peak_statistics(&correlation, peak_row, peak_col);
    let is_reliable =
        reliability >= config.min_reliability && peak_ratio <= config.max_peak_ratio;

    debug!(
        coarse_dx,
        coarse_dy,
        dx,
        dy,
        peak = peak_val,
        reliability,
        peak_ratio,
        "Phase correlation peak"
    );

    Ok(ShiftEstimate {
        shift: PixelShift::new(dx, dy),
        reliability,
        peak_ratio,
        is_reliable,
        correlation,
    })
}

/// Translate an array by `shift` with bilinear interpolation: the value at
/// `(row, col)` is taken from `(row - dy, col - dx)`. Samples outside are 0.
pub fn shift_array(data: &Array2<f32>, shift: PixelShift) -> Array2<f32> {
    let (h, w) = data.dim();
    Array2::from_shape_fn((h, w), |(row, col)| {
        bilinear_sample(data, row as f64 - shift.dy, col as f64 - shift.dx)
    })
}

pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let sample = |r: i64, c: i64| -> f32 {
        if r >= 0 && r < h as i64 && c >= 0 && c < w as i64 {
            data[[r as usize, c as usize]]
        } else {
            0.0
        }
    };

    sample(y0, x0) * (1.0 - fx) * (1.0 - fy)
        + sample(y0, x0 + 1) * fx * (1.0 - fy)
        + sample(y0 + 1, x0) * (1.0 - fx) * fy
        + sample(y0 + 1, x0 + 1) * fx * fy
}
