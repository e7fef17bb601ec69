use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::geo::GeoTransform;

/// Interpolation kernel used when pixels are moved between grids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResamplingMethod {
    Nearest,
    Bilinear,
    #[default]
    Cubic,
}

impl std::fmt::Display for ResamplingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "Nearest"),
            Self::Bilinear => write!(f, "Bilinear"),
            Self::Cubic => write!(f, "Cubic"),
        }
    }
}

impl std::str::FromStr for ResamplingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" | "near" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(format!("unknown resampling method '{}'", other)),
        }
    }
}

/// A band together with its per-pixel validity.
#[derive(Clone, Copy)]
pub struct SampleSource<'a> {
    pub data: ArrayView2<'a, f32>,
    pub valid: &'a Array2<bool>,
}

impl<'a> SampleSource<'a> {
    pub fn new(data: ArrayView2<'a, f32>, valid: &'a Array2<bool>) -> Self {
        Self { data, valid }
    }

    fn at(&self, r: i64, c: i64) -> Option<f32> {
        let (h, w) = self.data.dim();
        let r = r.clamp(0, h as i64 - 1) as usize;
        let c = c.clamp(0, w as i64 - 1) as usize;
        self.valid[[r, c]].then(|| self.data[[r, c]])
    }

    /// Interpolate at fractional pixel position `(y, x)` where integer
    /// coordinates are pixel centres. `None` outside the raster or where the
    /// kernel touches invalid pixels.
    pub fn sample(&self, y: f64, x: f64, method: ResamplingMethod) -> Option<f32> {
        let (h, w) = self.data.dim();
        const EDGE: f64 = 0.5 + 1e-9;
        if y < -EDGE || x < -EDGE || y > h as f64 - EDGE || x > w as f64 - EDGE {
            return None;
        }
        match method {
            ResamplingMethod::Nearest => self.at(y.round() as i64, x.round() as i64),
            ResamplingMethod::Bilinear => self.bilinear(y, x),
            ResamplingMethod::Cubic => self.cubic(y, x).or_else(|| self.bilinear(y, x)),
        }
    }

    fn bilinear(&self, y: f64, x: f64) -> Option<f32> {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let mut acc = 0.0f64;
        for (dr, wy) in [(0, 1.0 - fy), (1, fy)] {
            for (dc, wx) in [(0, 1.0 - fx), (1, fx)] {
                let weight = wy * wx;
                if weight <= 0.0 {
                    continue;
                }
                acc += weight * self.at(y0 + dr, x0 + dc)? as f64;
            }
        }
        Some(acc as f32)
    }

    fn cubic(&self, y: f64, x: f64) -> Option<f32> {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let wx = [
            cubic_kernel(fx + 1.0),
            cubic_kernel(fx),
            cubic_kernel(fx - 1.0),
            cubic_kernel(fx - 2.0),
        ];
        let wy = [
            cubic_kernel(fy + 1.0),
            cubic_kernel(fy),
            cubic_kernel(fy - 1.0),
            cubic_kernel(fy - 2.0),
        ];

        let mut acc = 0.0f64;
        for (i, &wr) in wy.iter().enumerate() {
            for (j, &wc) in wx.iter().enumerate() {
                let weight = wr * wc;
                if weight == 0.0 {
                    continue;
                }
                acc += weight * self.at(y0 - 1 + i as i64, x0 - 1 + j as i64)? as f64;
            }
        }
        Some(acc as f32)
    }
}

/// Catmull-Rom cubic convolution kernel (a = -0.5).
fn cubic_kernel(x: f64) -> f64 {
    const A: f64 = -0.5;
    let abs_x = x.abs();
    if abs_x <= 1.0 {
        ((A + 2.0) * abs_x - (A + 3.0)) * abs_x * abs_x + 1.0
    } else if abs_x < 2.0 {
        ((A * abs_x - 5.0 * A) * abs_x + 8.0 * A) * abs_x - 4.0 * A
    } else {
        0.0
    }
}

/// Resample `source` (on `src_gt`) onto a `rows x cols` grid described by `dst_gt`.
///
/// Returns the values and their validity; invalid pixels hold `fill`.
pub fn resample_to_grid(
    source: SampleSource<'_>,
    src_gt: &GeoTransform,
    dst_gt: &GeoTransform,
    rows: usize,
    cols: usize,
    method: ResamplingMethod,
    fill: f32,
) -> (Array2<f32>, Array2<bool>) {
    let sample_row = |row: usize| -> Vec<Option<f32>> {
        (0..cols)
            .map(|col| {
                let (x, y) = dst_gt.pixel_to_map(col as f64 + 0.5, row as f64 + 0.5);
                let (src_col, src_row) = src_gt.map_to_pixel(x, y);
                source.sample(src_row - 0.5, src_col - 0.5, method)
            })
            .collect()
    };

    let sampled: Vec<Vec<Option<f32>>> = if rows * cols >= PARALLEL_PIXEL_THRESHOLD {
        (0..rows).into_par_iter().map(sample_row).collect()
    } else {
        (0..rows).map(sample_row).collect()
    };

    let mut values = Array2::<f32>::from_elem((rows, cols), fill);
    let mut valid = Array2::<bool>::from_elem((rows, cols), false);
    for (row, row_data) in sampled.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            if let Some(v) = val {
                values[[row, col]] = v;
                valid[[row, col]] = true;
            }
        }
    }
    (values, valid)
}
