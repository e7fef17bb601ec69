use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_MAX_ITER, DEFAULT_MAX_NODATA_FRACTION, DEFAULT_MAX_OBSCURED_FRACTION,
    DEFAULT_MAX_PEAK_RATIO, DEFAULT_MIN_RELIABILITY, DEFAULT_UPSAMPLE_FACTOR,
};
use crate::error::{CoregError, Result};
use crate::io::{CreationOptions, OutputFormat};
use crate::resample::ResamplingMethod;

/// Every caller-facing knob of a co-registration run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoregConfig {
    /// Band of the reference image used for matching (1-based).
    #[serde(default = "default_band")]
    pub ref_band: usize,
    /// Band of the target image used for matching (1-based).
    #[serde(default = "default_band")]
    pub tgt_band: usize,
    /// Largest plausible shift in map units. Unset means 5 analysis pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_shift: Option<f64>,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_band() -> usize {
    1
}

impl Default for CoregConfig {
    fn default() -> Self {
        Self {
            ref_band: 1,
            tgt_band: 1,
            max_shift: None,
            window: WindowConfig::default(),
            estimator: EstimatorConfig::default(),
            correction: CorrectionConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl CoregConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.ref_band == 0 || self.tgt_band == 0 {
            return Err(CoregError::InvalidConfig(
                "band numbers are 1-based".into(),
            ));
        }
        if let Some(max_shift) = self.max_shift {
            if !(max_shift > 0.0) {
                return Err(CoregError::InvalidConfig(format!(
                    "max_shift must be positive, got {}",
                    max_shift
                )));
            }
        }
        if let Some((w, h)) = self.window.size {
            if w < 3 || h < 3 {
                return Err(CoregError::InvalidConfig(format!(
                    "window size {}x{} is too small to correlate",
                    w, h
                )));
            }
        }
        for (name, value) in [
            ("max_nodata_fraction", self.window.max_nodata_fraction),
            ("max_obscured_fraction", self.window.max_obscured_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoregError::InvalidConfig(format!(
                    "{} must lie in 0..=1, got {}",
                    name, value
                )));
            }
        }
        if self.estimator.max_iter == 0 {
            return Err(CoregError::InvalidConfig(
                "max_iter must be at least 1".into(),
            ));
        }
        if let SubpixelMethod::Upsampled { factor } = self.estimator.subpixel {
            if factor == 0 {
                return Err(CoregError::InvalidConfig(
                    "upsampling factor must be at least 1".into(),
                ));
            }
        }
        if let Some(gsd) = self.correction.out_gsd {
            if !(gsd.0 > 0.0 && gsd.1 > 0.0) {
                return Err(CoregError::InvalidConfig(format!(
                    "out_gsd must be positive, got {:?}",
                    gsd
                )));
            }
        }
        CreationOptions::parse(&self.output.creation_options)?.validate(self.output.fmt_out)?;
        Ok(())
    }
}

/// Matching window placement and acceptance thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window centre. Unset means the centre of the image overlap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<WindowPosition>,
    /// Window size `(width, height)` in analysis pixels. Unset means auto.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<(usize, usize)>,
    /// Windows whose nodata fraction reaches this value are rejected.
    pub max_nodata_fraction: f64,
    /// Windows whose cloud-masked fraction exceeds this value are rejected.
    pub max_obscured_fraction: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            position: None,
            size: None,
            max_nodata_fraction: DEFAULT_MAX_NODATA_FRACTION,
            max_obscured_fraction: DEFAULT_MAX_OBSCURED_FRACTION,
        }
    }
}

/// Matching window centre, in map coordinates or reference-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WindowPosition {
    Map { x: f64, y: f64 },
    Pixel { col: f64, row: f64 },
}

impl std::fmt::Display for WindowPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Map { x, y } => write!(f, "map ({:.3}, {:.3})", x, y),
            Self::Pixel { col, row } => write!(f, "pixel (col {:.1}, row {:.1})", col, row),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub taper: TaperWindow,
    pub subpixel: SubpixelMethod,
    /// Integer re-matching passes before giving up on convergence.
    pub max_iter: usize,
    /// Reliability (percent) below which a result is flagged unreliable.
    pub min_reliability: f64,
    /// Secondary-to-main peak ratio above which a result is flagged unreliable.
    pub max_peak_ratio: f64,
    /// Resampling used when the target must be brought onto the analysis grid.
    pub resamp_alg_calc: ResamplingMethod,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            taper: TaperWindow::default(),
            subpixel: SubpixelMethod::default(),
            max_iter: DEFAULT_MAX_ITER,
            min_reliability: DEFAULT_MIN_RELIABILITY,
            max_peak_ratio: DEFAULT_MAX_PEAK_RATIO,
            resamp_alg_calc: ResamplingMethod::Cubic,
        }
    }
}

/// Taper applied to each window before the FFT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaperWindow {
    #[default]
    Hann,
    None,
}

impl std::fmt::Display for TaperWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hann => write!(f, "Hann"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Sub-pixel peak refinement strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum SubpixelMethod {
    /// 3x3 parabola fit around the integer peak (~0.1-0.2 px).
    Paraboloid,
    /// Matrix-multiply DFT upsampling (~1/factor px).
    Upsampled { factor: usize },
}

impl Default for SubpixelMethod {
    fn default() -> Self {
        Self::Upsampled {
            factor: DEFAULT_UPSAMPLE_FACTOR,
        }
    }
}

impl std::fmt::Display for SubpixelMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paraboloid => write!(f, "Paraboloid"),
            Self::Upsampled { factor } => write!(f, "Upsampled DFT (x{})", factor),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Resample the corrected target onto the reference grid.
    pub align_grids: bool,
    pub resamp_alg_deshift: ResamplingMethod,
    /// Output pixel size `(x, y)` for the grid-aligned path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_gsd: Option<(f64, f64)>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            align_grids: false,
            resamp_alg_deshift: ResamplingMethod::Cubic,
            out_gsd: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination of the corrected target. `"auto"` derives a name next to the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_out: Option<PathBuf>,
    #[serde(default)]
    pub fmt_out: OutputFormat,
    /// `KEY=VALUE` options handed to the writer verbatim.
    #[serde(default)]
    pub creation_options: Vec<String>,
}

impl OutputConfig {
    pub fn is_auto(&self) -> bool {
        self.path_out
            .as_deref()
            .is_some_and(|p| p == Path::new("auto"))
    }
}
