use ndarray::Array2;
use num_complex::Complex;
use std::f64::consts::TAU;

/// Refine peak location using paraboloid fitting on the 3x3 neighborhood.
///
/// Returns (delta_row, delta_col) as fractional pixel offsets from the integer peak.
pub fn refine_peak_paraboloid(
    correlation: &Array2<f64>,
    peak_row: usize,
    peak_col: usize,
) -> (f64, f64) {
    let (h, w) = correlation.dim();

    if peak_row == 0 || peak_row >= h - 1 || peak_col == 0 || peak_col >= w - 1 {
        return (0.0, 0.0);
    }

    let vertex = |prev: f64, curr: f64, next: f64| {
        let denom = prev - 2.0 * curr + next;
        if denom.abs() > 1e-12 {
            ((prev - next) / (2.0 * denom)).clamp(-0.5, 0.5)
        } else {
            0.0
        }
    };

    let delta_row = vertex(
        correlation[[peak_row - 1, peak_col]],
        correlation[[peak_row, peak_col]],
        correlation[[peak_row + 1, peak_col]],
    );
    let delta_col = vertex(
        correlation[[peak_row, peak_col - 1]],
        correlation[[peak_row, peak_col]],
        correlation[[peak_row, peak_col + 1]],
    );

    (delta_row, delta_col)
}

/// Refine a coarse peak by evaluating the inverse DFT of the cross-power
/// spectrum on a fine grid around it (Guizar-Sicairos et al., 2008).
///
/// `coarse` is the signed integer displacement `(dy, dx)`. The search spans
/// `window` pixels at `1/upsample` spacing. Returns the refined `(dy, dx)`.
pub fn refine_peak_upsampled(
    cross_power: &Array2<Complex<f64>>,
    coarse: (f64, f64),
    upsample: usize,
    window: f64,
) -> (f64, f64) {
    let (h, w) = cross_power.dim();
    let up = upsample.max(1) as f64;
    let mut size = (window * up).ceil() as usize;
    if size % 2 == 0 {
        size += 1;
    }
    let half = (size - 1) as f64 / (2.0 * up);
    let start_row = coarse.0 - half;
    let start_col = coarse.1 - half;

    let row_kernel = dft_kernel(h, size, start_row, up);
    let col_kernel = dft_kernel(w, size, start_col, up);

    // row_kernel^T * cross_power -> (size, w)
    let mut partial = Array2::<Complex<f64>>::zeros((size, w));
    for i in 0..size {
        for c in 0..w {
            let mut sum = Complex::new(0.0, 0.0);
            for r in 0..h {
                sum += row_kernel[[r, i]] * cross_power[[r, c]];
            }
            partial[[i, c]] = sum;
        }
    }

    let mut best = (0usize, 0usize);
    let mut best_val = f64::NEG_INFINITY;
    for i in 0..size {
        for j in 0..size {
            let mut sum = Complex::new(0.0, 0.0);
            for c in 0..w {
                sum += partial[[i, c]] * col_kernel[[c, j]];
            }
            let val = sum.norm();
            if val > best_val {
                best_val = val;
                best = (i, j);
            }
        }
    }

    (
        start_row + best.0 as f64 / up,
        start_col + best.1 as f64 / up,
    )
}

/// Kernel `(n, size)` with entries `exp(+i 2π f_k p_j / n)`, `f_k` the
/// signed frequency of bin `k` and `p_j = start + j / up`.
fn dft_kernel(n: usize, size: usize, start: f64, up: f64) -> Array2<Complex<f64>> {
    let mut kernel = Array2::<Complex<f64>>::zeros((n, size));
    for k in 0..n {
        let freq = if k <= n / 2 { k as f64 } else { k as f64 - n as f64 };
        for j in 0..size {
            let pos = start + j as f64 / up;
            let phase = TAU * freq * pos / n as f64;
            kernel[[k, j]] = Complex::new(phase.cos(), phase.sin());
        }
    }
    kernel
}
