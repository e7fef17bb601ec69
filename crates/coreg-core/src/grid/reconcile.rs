use tracing::{debug, info, warn};

use crate::error::{FailureKind, Result};
use crate::geo::{BoundingBox, GeoTransform};
use crate::pipeline::types::{Advisory, AdvisoryKind};
use crate::raster::Raster;

/// Common analysis frame of a reference/target pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    /// North-up grid on which both windows are compared. Equals the
    /// reference geotransform unless the reference is rotated.
    pub grid: GeoTransform,
    /// Pixel size `(x, y)` of the analysis grid.
    pub resolution: (f64, f64),
    /// The reference must be resampled onto `grid` (rotated reference).
    pub ref_needs_resampling: bool,
    /// The target must be resampled onto `grid`.
    pub needs_resampling: bool,
    /// Both projections are undefined; coordinates are plain pixel coordinates.
    pub pixel_coordinates: bool,
    pub projections_compatible: bool,
    /// Normalised datum shared by both images, when known.
    pub datum: Option<String>,
    /// Mutual overlap of both footprints in map coordinates.
    pub overlap: BoundingBox,
}

/// Compare the geometry of two rasters and derive the analysis frame.
///
/// Datum or projection incompatibilities and disjoint footprints are fatal.
/// Grid differences only produce advisories.
pub fn reconcile(
    reference: &Raster,
    target: &Raster,
    advisories: &mut Vec<Advisory>,
) -> Result<Reconciliation> {
    let (pixel_coordinates, datum) = check_projections(reference, target)?;

    let ref_gt = reference.geotransform;
    let ref_needs_resampling = ref_gt.is_rotated();
    let grid = if ref_needs_resampling {
        north_up_grid(&ref_gt, &reference.footprint())
    } else {
        ref_gt
    };
    if ref_needs_resampling {
        push_advisory(
            advisories,
            AdvisoryKind::Resampling,
            format!(
                "The reference image has a rotated grid ({:?}) and needs to be resampled \
                 to a north-up grid for shift estimation.",
                ref_gt.to_gdal()
            ),
        );
    }

    let needs_resampling = !target.geotransform.is_aligned_with(&grid);
    if needs_resampling {
        let (rx, ry) = grid.resolution();
        let (tx, ty) = target.geotransform.resolution();
        let reason = if target.geotransform.is_rotated() {
            "it has a rotated grid".to_string()
        } else if (rx - tx).abs() > rx * 1e-6 || (ry - ty).abs() > ry * 1e-6 {
            format!("its resolution ({}, {}) differs from ({}, {})", tx, ty, rx, ry)
        } else {
            "its pixel grid is offset by a fraction of a pixel".to_string()
        };
        push_advisory(
            advisories,
            AdvisoryKind::Resampling,
            format!(
                "The target image needs to be resampled to the reference grid for shift \
                 estimation because {}.",
                reason
            ),
        );
    }

    let overlap = reference
        .footprint()
        .intersection(&target.footprint())
        .ok_or_else(|| {
            FailureKind::OutOfBounds("the reference and target images do not overlap".into())
        })?;

    let resolution = grid.resolution();
    info!(
        ?resolution,
        needs_resampling,
        ref_needs_resampling,
        pixel_coordinates,
        overlap_width = overlap.width(),
        overlap_height = overlap.height(),
        "Reconciled image grids"
    );

    Ok(Reconciliation {
        grid,
        resolution,
        ref_needs_resampling,
        needs_resampling,
        pixel_coordinates,
        projections_compatible: true,
        datum,
        overlap,
    })
}

/// Returns `(pixel_coordinates, datum)`.
fn check_projections(
    reference: &Raster,
    target: &Raster,
) -> std::result::Result<(bool, Option<String>), FailureKind> {
    let (rp, tp) = (&reference.projection, &target.projection);
    match (rp.is_empty(), tp.is_empty()) {
        (true, true) => {
            debug!("Neither image has a projection; using pixel coordinates");
            return Ok((true, None));
        }
        (true, false) | (false, true) => {
            return Err(FailureKind::ProjectionMismatch {
                reference: rp.to_string(),
                target: tp.to_string(),
            });
        }
        (false, false) => {}
    }

    let ref_datum = rp.datum();
    let tgt_datum = tp.datum();
    if let (Some(a), Some(b)) = (&ref_datum, &tgt_datum) {
        if a != b {
            return Err(FailureKind::DatumMismatch {
                reference: a.clone(),
                target: b.clone(),
            });
        }
    }
    if !rp.is_equivalent(tp) {
        return Err(FailureKind::ProjectionMismatch {
            reference: rp.to_string(),
            target: tp.to_string(),
        });
    }
    Ok((false, ref_datum.or(tgt_datum)))
}

/// North-up grid covering `footprint` with the pixel size of `gt`.
fn north_up_grid(gt: &GeoTransform, footprint: &BoundingBox) -> GeoTransform {
    let (res_x, res_y) = gt.resolution();
    GeoTransform::new(footprint.min_x, res_x, footprint.max_y, -res_y)
}

fn push_advisory(advisories: &mut Vec<Advisory>, kind: AdvisoryKind, message: String) {
    warn!("{}", message);
    advisories.push(Advisory::new(kind, message));
}
