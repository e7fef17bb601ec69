use ndarray::{s, Array2, ArrayView2};

use crate::align::{shift_array, PixelShift};
use crate::consts::{SSIM_C1, SSIM_C2};

/// Global structural similarity of two equally shaped arrays.
///
/// Both arrays are scaled to a common `[0, 1]` range first. Returns 0 for
/// empty or mismatched inputs.
pub fn ssim(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>) -> f64 {
    if a.dim() != b.dim() || a.is_empty() {
        return 0.0;
    }

    let (lo, hi) = a
        .iter()
        .chain(b.iter())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = (hi - lo) as f64;
    let scale = |v: f32| {
        if range > 0.0 {
            (v - lo) as f64 / range
        } else {
            0.0
        }
    };

    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| scale(v)).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| scale(v)).sum::<f64>() / n;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut cov = 0.0;
    for (&va, &vb) in a.iter().zip(b.iter()) {
        let da = scale(va) - mean_a;
        let db = scale(vb) - mean_b;
        var_a += da * da;
        var_b += db * db;
        cov += da * db;
    }
    var_a /= n;
    var_b /= n;
    cov /= n;

    ((2.0 * mean_a * mean_b + SSIM_C1) * (2.0 * cov + SSIM_C2))
        / ((mean_a * mean_a + mean_b * mean_b + SSIM_C1) * (var_a + var_b + SSIM_C2))
}

/// SSIM between the reference window and the target window before and
/// after applying `shift`, evaluated away from the borders the shift exposes.
pub fn ssim_before_after(
    reference: &Array2<f32>,
    target: &Array2<f32>,
    shift: PixelShift,
) -> (f64, f64) {
    let corrected = shift_array(target, shift);
    let (h, w) = reference.dim();
    let margin = (shift.dx.abs().max(shift.dy.abs()).ceil() as usize + 1).min(h.min(w) / 2);
    if h <= 2 * margin || w <= 2 * margin {
        return (ssim(reference.view(), target.view()), ssim(reference.view(), corrected.view()));
    }
    let inner = s![margin..h - margin, margin..w - margin];
    (
        ssim(reference.slice(inner), target.slice(inner)),
        ssim(reference.slice(inner), corrected.slice(inner)),
    )
}
