use std::sync::Arc;

use ndarray::{Array2, Axis};
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Run `plan` over every lane along `axis`, in parallel for large arrays.
fn transform_lanes(work: &mut Array2<Complex<f64>>, plan: &Arc<dyn Fft<f64>>, axis: Axis) {
    let parallel = work.len() >= PARALLEL_PIXEL_THRESHOLD;
    let across = Axis(1 - axis.index());
    let run = |mut lane: ndarray::ArrayViewMut1<'_, Complex<f64>>| {
        let mut buf: Vec<Complex<f64>> = lane.to_vec();
        plan.process(&mut buf);
        for (dst, src) in lane.iter_mut().zip(buf) {
            *dst = src;
        }
    };
    if parallel {
        work.axis_iter_mut(across).into_par_iter().for_each(run);
    } else {
        work.axis_iter_mut(across).for_each(run);
    }
}

/// 2D forward FFT: row-wise FFT, then column-wise FFT.
pub fn fft2d_forward(data: &Array2<f32>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft_forward(w);
    let fft_col = planner.plan_fft_forward(h);

    let mut work = data.mapv(|v| Complex::new(v as f64, 0.0));
    transform_lanes(&mut work, &fft_row, Axis(1));
    transform_lanes(&mut work, &fft_col, Axis(0));
    work
}

/// 2D inverse FFT, returning the real part normalized by `1/(h*w)`.
pub fn ifft2d_inverse(data: &Array2<Complex<f64>>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let ifft_row = planner.plan_fft_inverse(w);
    let ifft_col = planner.plan_fft_inverse(h);

    let mut work = data.clone();
    transform_lanes(&mut work, &ifft_col, Axis(0));
    transform_lanes(&mut work, &ifft_row, Axis(1));

    let scale = 1.0 / (h * w) as f64;
    work.mapv(|v| v.re * scale)
}

/// Move the zero-displacement bin to the centre `(h/2, w/2)`.
pub fn fftshift(data: &Array2<f64>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut out = Array2::<f64>::zeros((h, w));
    for ((r, c), &v) in data.indexed_iter() {
        out[[(r + h / 2) % h, (c + w / 2) % w]] = v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_inverse_identity() {
        let data = Array2::from_shape_fn((6, 10), |(r, c)| (r * 10 + c) as f32);
        let back = ifft2d_inverse(&fft2d_forward(&data));
        for ((r, c), &v) in back.indexed_iter() {
            assert!((v - data[[r, c]] as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fftshift_moves_origin_to_centre() {
        let mut data = Array2::<f64>::zeros((5, 4));
        data[[0, 0]] = 1.0;
        let shifted = fftshift(&data);
        assert_eq!(shifted[[2, 2]], 1.0);
    }
}
