use tracing::{info, warn};

use crate::align::{PixelShift, ShiftEstimate};
use crate::consts::DEFAULT_MAX_SHIFT_PX;
use crate::error::FailureKind;
use crate::grid::{SampleWindow, WindowSpec};
use crate::pipeline::types::ShiftResult;

/// Largest accepted shift in map units: the configured bound, or
/// [`DEFAULT_MAX_SHIFT_PX`] analysis pixels.
pub fn max_shift_bound(max_shift: Option<f64>, resolution: (f64, f64)) -> f64 {
    max_shift.unwrap_or(DEFAULT_MAX_SHIFT_PX * resolution.0.max(resolution.1))
}

/// Convert the accumulated pixel shift to map units and bound-check it.
///
/// An implausible shift is discarded, never clamped.
pub fn build_shift_result(
    total: PixelShift,
    estimate: &ShiftEstimate,
    window: &SampleWindow,
    spec: &WindowSpec,
    iterations: usize,
    max_shift: Option<f64>,
) -> Result<ShiftResult, FailureKind> {
    let (dx_map, dy_map) = window
        .geotransform
        .pixel_delta_to_map(total.dx, total.dy);
    let resolution = window.resolution();
    let bound = max_shift_bound(max_shift, resolution);

    let magnitude = dx_map.abs().max(dy_map.abs());
    if !(magnitude <= bound) {
        warn!(dx_map, dy_map, bound, "Rejecting implausible shift");
        return Err(FailureKind::ImplausibleShift {
            dx_map,
            dy_map,
            max_shift: bound,
        });
    }

    info!(
        dx_px = total.dx,
        dy_px = total.dy,
        dx_map,
        dy_map,
        reliability = estimate.reliability,
        "Calculated shift"
    );

    Ok(ShiftResult {
        dx_px: total.dx,
        dy_px: total.dy,
        dx_map,
        dy_map,
        reliability: estimate.reliability,
        peak_ratio: estimate.peak_ratio,
        is_reliable: estimate.is_reliable,
        iterations,
        window_center: spec.center,
        window_size: spec.size,
        resolution,
        ssim_before: None,
        ssim_after: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bound_uses_coarser_axis() {
        assert_eq!(max_shift_bound(None, (10.0, 20.0)), 100.0);
        assert_eq!(max_shift_bound(Some(7.5), (10.0, 20.0)), 7.5);
    }
}
