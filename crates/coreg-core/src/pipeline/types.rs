use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Co-registration stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoregStage {
    Loading,
    Reconciling,
    SelectingWindow,
    Estimating,
    Validating,
    Correcting,
    Writing,
}

impl std::fmt::Display for CoregStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading images"),
            Self::Reconciling => write!(f, "Reconciling grids"),
            Self::SelectingWindow => write!(f, "Selecting matching window"),
            Self::Estimating => write!(f, "Estimating shift"),
            Self::Validating => write!(f, "Validating shift"),
            Self::Correcting => write!(f, "Correcting shifts"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for a co-registration run.
///
/// All methods have default no-op implementations. Reporting never
/// influences the computed shift.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g. matching iterations), if known.
    fn begin_stage(&self, _stage: CoregStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when the caller does not supply one.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Category of a non-fatal condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvisoryKind {
    /// The matching window is smaller than recommended.
    SmallWindow,
    /// The target (or reference) grid has to be resampled for matching.
    Resampling,
    /// Integer re-matching did not settle within `max_iter` passes.
    NotConverged,
    /// The correlation peak is weak or ambiguous.
    LowReliability,
    /// Structural similarity dropped after correction.
    SsimDecreased,
}

impl std::fmt::Display for AdvisoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SmallWindow => write!(f, "Small window"),
            Self::Resampling => write!(f, "Resampling"),
            Self::NotConverged => write!(f, "Not converged"),
            Self::LowReliability => write!(f, "Low reliability"),
            Self::SsimDecreased => write!(f, "SSIM decreased"),
        }
    }
}

/// A warning attached to a run. Never alters computed values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub message: String,
}

impl Advisory {
    pub fn new(kind: AdvisoryKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Validated global shift of the target relative to the reference.
///
/// `dx`/`dy` are the correction to apply to the target: adding
/// `(dx_map, dy_map)` to the target's geotransform origin aligns it with
/// the reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShiftResult {
    /// Shift in analysis-grid pixels (x = columns, y = rows downward).
    pub dx_px: f64,
    pub dy_px: f64,
    /// Shift in map units.
    pub dx_map: f64,
    pub dy_map: f64,
    /// Peak prominence in percent (0..100).
    pub reliability: f64,
    /// Secondary-to-main peak ratio of the correlation surface.
    pub peak_ratio: f64,
    pub is_reliable: bool,
    /// Matching passes used.
    pub iterations: usize,
    /// Window centre in map coordinates.
    pub window_center: (f64, f64),
    /// Window size `(width, height)` in analysis pixels.
    pub window_size: (usize, usize),
    /// Analysis grid pixel size `(x, y)`.
    pub resolution: (f64, f64),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssim_before: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssim_after: Option<f64>,
}

impl ShiftResult {
    /// Length of the shift vector in map units.
    pub fn vector_length_map(&self) -> f64 {
        self.dx_map.hypot(self.dy_map)
    }

    /// Direction of the shift vector in map space, degrees clockwise from north.
    pub fn vector_angle_deg(&self) -> f64 {
        let angle = self.dx_map.atan2(self.dy_map).to_degrees();
        if angle < 0.0 {
            angle + 360.0
        } else {
            angle
        }
    }
}

/// Serializable summary of a run, for reports and batch tables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoregReport {
    pub reference: String,
    pub target: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default)]
    pub advisories: Vec<Advisory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<ShiftResult>,
}

impl CoregReport {
    pub fn from_outcome(
        reference: impl Into<String>,
        target: impl Into<String>,
        outcome: std::result::Result<&ShiftResult, &FailureKind>,
        advisories: &[Advisory],
    ) -> Self {
        let (success, failure, shift) = match outcome {
            Ok(shift) => (true, None, Some(shift.clone())),
            Err(kind) => (false, Some(kind.to_string()), None),
        };
        Self {
            reference: reference.into(),
            target: target.into(),
            success,
            failure,
            advisories: advisories.to_vec(),
            shift,
        }
    }
}
