use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::align::{compute_shift, PixelShift};
use crate::correct::{apply_correction, DeshiftResult};
use crate::error::{CoregError, FailureKind, Result};
use crate::grid::{extract_window, reconcile, resolve_window, ExtractOptions, Reconciliation};
use crate::io::{auto_output_path, write_raster, CreationOptions};
use crate::quality::ssim_before_after;
use crate::raster::{Raster, RasterSource};
use crate::validate::{build_shift_result, max_shift_bound};
use crate::viz::MatchDiagnostics;

use super::config::CoregConfig;
use super::types::{
    Advisory, AdvisoryKind, CoregReport, CoregStage, NoOpReporter, ProgressReporter, ShiftResult,
};

/// Global co-registration of a target image onto a reference image.
///
/// Construction loads both images and performs every check that does not
/// need a matching window: band selection, whole-image nodata and grid/CRS
/// compatibility. [`calculate_spatial_shifts`](Self::calculate_spatial_shifts)
/// then estimates the shift, [`correct_shifts`](Self::correct_shifts) applies it.
pub struct Coreg {
    config: CoregConfig,
    reference: Raster,
    target: Raster,
    reconciliation: Reconciliation,
    path_out: Option<PathBuf>,
    reporter: Arc<dyn ProgressReporter>,
    advisories: Vec<Advisory>,
    /// Advisories raised during construction, kept across re-runs.
    setup_advisories: usize,
    outcome: Option<std::result::Result<ShiftResult, FailureKind>>,
    diagnostics: Option<MatchDiagnostics>,
    deshift: Option<DeshiftResult>,
}

impl Coreg {
    pub fn new(
        reference: impl Into<RasterSource>,
        target: impl Into<RasterSource>,
        config: CoregConfig,
    ) -> Result<Self> {
        Self::with_reporter(reference, target, config, Arc::new(NoOpReporter))
    }

    pub fn with_reporter(
        reference: impl Into<RasterSource>,
        target: impl Into<RasterSource>,
        config: CoregConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self> {
        config.validate()?;

        reporter.begin_stage(CoregStage::Loading, Some(2));
        let reference = reference.into().load()?;
        reporter.advance(1);
        let target = target.into().load()?;
        reporter.advance(2);
        reporter.finish_stage();

        let path_out = resolve_output_path(&config, &reference, &target)?;

        for (name, raster, band) in [
            ("reference", &reference, config.ref_band),
            ("target", &target, config.tgt_band),
        ] {
            if !raster.has_valid_data(band)? {
                return Err(FailureKind::NoValidData(format!(
                    "the {} image only contains nodata values (band {})",
                    name, band
                ))
                .into());
            }
        }

        reporter.begin_stage(CoregStage::Reconciling, None);
        let mut advisories = Vec::new();
        let reconciliation = reconcile(&reference, &target, &mut advisories)?;
        reporter.finish_stage();

        info!(
            reference = %reference.display_name(),
            target = %target.display_name(),
            "Initialised co-registration"
        );

        Ok(Self {
            setup_advisories: advisories.len(),
            config,
            reference,
            target,
            reconciliation,
            path_out,
            reporter,
            advisories,
            outcome: None,
            diagnostics: None,
            deshift: None,
        })
    }

    /// Estimate the global shift. A failure is retained and also returned.
    pub fn calculate_spatial_shifts(&mut self) -> Result<&ShiftResult> {
        self.advisories.truncate(self.setup_advisories);
        self.outcome = None;
        self.diagnostics = None;
        self.deshift = None;

        let (result, diagnostics) = match self.detect() {
            Ok(found) => found,
            Err(err) => {
                if let Some(kind) = err.failure() {
                    warn!("Shift calculation failed: {}", kind);
                    self.outcome = Some(Err(kind.clone()));
                }
                return Err(err);
            }
        };
        self.diagnostics = Some(diagnostics);
        match self.outcome.insert(Ok(result)) {
            Ok(result) => Ok(&*result),
            Err(kind) => Err(kind.clone().into()),
        }
    }

    fn detect(&mut self) -> Result<(ShiftResult, MatchDiagnostics)> {
        let reporter = Arc::clone(&self.reporter);

        reporter.begin_stage(CoregStage::SelectingWindow, None);
        let spec = resolve_window(
            &self.reference,
            &self.target,
            &self.reconciliation,
            &self.config.window,
            &mut self.advisories,
        )?;
        reporter.finish_stage();

        let options = ExtractOptions {
            ref_band: self.config.ref_band,
            tgt_band: self.config.tgt_band,
            window: &self.config.window,
            method: self.config.estimator.resamp_alg_calc,
        };
        let max_iter = self.config.estimator.max_iter.max(1);
        let bound = max_shift_bound(self.config.max_shift, self.reconciliation.resolution);

        reporter.begin_stage(CoregStage::Estimating, Some(max_iter));
        let mut offset = (0i64, 0i64);
        let mut first_target = None;
        let mut iterations = 0;
        let (window, estimate, total) = loop {
            iterations += 1;
            let window = extract_window(
                &self.reference,
                &self.target,
                &self.reconciliation,
                &spec,
                &options,
                offset,
            )?;
            if first_target.is_none() {
                first_target = Some(window.target.clone());
            }
            let estimate = compute_shift(&window.reference, &window.target, &self.config.estimator)?;
            reporter.advance(iterations);

            let total = PixelShift::new(offset.0 as f64, offset.1 as f64) + estimate.shift;
            let (ix, iy) = estimate.shift.integer_part();
            if (ix, iy) == (0, 0) {
                break (window, estimate, total);
            }
            let (mx, my) = window.geotransform.pixel_delta_to_map(total.dx, total.dy);
            if mx.abs().max(my.abs()) > bound {
                break (window, estimate, total);
            }
            if iterations >= max_iter {
                let message = format!(
                    "Shift estimation did not converge within {} iteration(s); the residual \
                     integer shift is ({}, {}) pixels.",
                    max_iter, ix, iy
                );
                warn!("{}", message);
                self.advisories
                    .push(Advisory::new(AdvisoryKind::NotConverged, message));
                break (window, estimate, total);
            }
            offset = (offset.0 + ix, offset.1 + iy);
        };
        reporter.finish_stage();

        if !estimate.is_reliable {
            let message = format!(
                "The correlation peak is weak (reliability {:.1}%, secondary peak ratio {:.2}); \
                 the shift may be wrong.",
                estimate.reliability, estimate.peak_ratio
            );
            warn!("{}", message);
            self.advisories
                .push(Advisory::new(AdvisoryKind::LowReliability, message));
        }

        reporter.begin_stage(CoregStage::Validating, None);
        let mut result = build_shift_result(
            total,
            &estimate,
            &window,
            &spec,
            iterations,
            self.config.max_shift,
        )?;

        let first_target = first_target.unwrap_or_else(|| window.target.clone());
        let (before, after) = ssim_before_after(&window.reference, &first_target, total);
        result.ssim_before = Some(before);
        result.ssim_after = Some(after);
        if after < before {
            let message = format!(
                "Structural similarity of the matching window decreased after correction \
                 ({:.4} -> {:.4}).",
                before, after
            );
            warn!("{}", message);
            self.advisories
                .push(Advisory::new(AdvisoryKind::SsimDecreased, message));
        }
        reporter.finish_stage();

        let diagnostics = MatchDiagnostics {
            reference: window.reference,
            target: first_target,
            correlation: estimate.correlation,
            shift: total,
        };
        Ok((result, diagnostics))
    }

    /// Apply the shift to the target, calculating it first if needed.
    ///
    /// The output file, if configured, is written only after every stage
    /// has succeeded.
    pub fn correct_shifts(&mut self) -> Result<&DeshiftResult> {
        let shift = match &self.outcome {
            Some(Ok(shift)) => shift.clone(),
            Some(Err(kind)) => return Err(kind.clone().into()),
            None => self.calculate_spatial_shifts()?.clone(),
        };

        self.reporter.begin_stage(CoregStage::Correcting, Some(self.target.bands()));
        let deshift = apply_correction(
            &self.target,
            &self.reconciliation.grid,
            &shift,
            &self.config.correction,
        )?;
        self.reporter.finish_stage();

        if let Some(path) = &self.path_out {
            self.reporter.begin_stage(CoregStage::Writing, None);
            let options = CreationOptions::parse(&self.config.output.creation_options)?;
            write_raster(&deshift.raster, path, self.config.output.fmt_out, &options)?;
            self.reporter.finish_stage();
        }

        Ok(&*self.deshift.insert(deshift))
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, Some(Ok(_)))
    }

    pub fn shift(&self) -> Option<&ShiftResult> {
        self.outcome.as_ref().and_then(|o| o.as_ref().ok())
    }

    pub fn failure(&self) -> Option<&FailureKind> {
        self.outcome.as_ref().and_then(|o| o.as_ref().err())
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    pub fn diagnostics(&self) -> Option<&MatchDiagnostics> {
        self.diagnostics.as_ref()
    }

    pub fn deshift_result(&self) -> Option<&DeshiftResult> {
        self.deshift.as_ref()
    }

    pub fn reference(&self) -> &Raster {
        &self.reference
    }

    pub fn target(&self) -> &Raster {
        &self.target
    }

    pub fn config(&self) -> &CoregConfig {
        &self.config
    }

    /// Resolved output path (after `"auto"` expansion).
    pub fn path_out(&self) -> Option<&Path> {
        self.path_out.as_deref()
    }

    pub fn report(&self) -> CoregReport {
        match &self.outcome {
            Some(outcome) => CoregReport::from_outcome(
                self.reference.display_name(),
                self.target.display_name(),
                outcome.as_ref(),
                &self.advisories,
            ),
            None => CoregReport {
                reference: self.reference.display_name(),
                target: self.target.display_name(),
                success: false,
                failure: None,
                advisories: self.advisories.clone(),
                shift: None,
            },
        }
    }
}

fn resolve_output_path(
    config: &CoregConfig,
    reference: &Raster,
    target: &Raster,
) -> Result<Option<PathBuf>> {
    if config.output.is_auto() {
        return auto_output_path(
            reference.source_path.as_deref(),
            target.source_path.as_deref(),
            config.output.fmt_out,
        )
        .map(Some);
    }
    match &config.output.path_out {
        Some(path) if path.as_os_str().is_empty() => Err(CoregError::InvalidConfig(
            "path_out must not be empty".into(),
        )),
        other => Ok(other.clone()),
    }
}
