/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon guarding the cross-power normalisation against division by zero.
pub const CROSS_POWER_EPSILON: f64 = 1e-12;

/// Relative tolerance (in pixels) when deciding whether two grids line up.
pub const GRID_TOLERANCE_PX: f64 = 1e-6;

/// Window sizes below this (in either dimension) trigger a small-window advisory.
pub const SMALL_WINDOW_THRESHOLD: usize = 128;

/// Lower bound for an automatically chosen window size.
pub const AUTO_WINDOW_MIN: usize = 33;

/// Upper bound for an automatically chosen window size.
pub const AUTO_WINDOW_MAX: usize = 513;

/// Auto window size as a fraction of the larger overlap extent.
pub const AUTO_WINDOW_FRACTION: f64 = 0.25;

/// A window fails with `NoValidData` when its invalid fraction reaches this value.
/// 1.0 means only entirely invalid windows are rejected.
pub const DEFAULT_MAX_NODATA_FRACTION: f64 = 1.0;

/// A window fails with `ObscuredWindow` when more than this fraction is cloud-masked.
pub const DEFAULT_MAX_OBSCURED_FRACTION: f64 = 0.25;

/// Default plausibility bound, in analysis-grid pixels, when no map-unit bound is set.
pub const DEFAULT_MAX_SHIFT_PX: f64 = 5.0;

/// Default number of integer re-matching iterations.
pub const DEFAULT_MAX_ITER: usize = 5;

/// Default upsampling factor for DFT sub-pixel refinement.
/// 20 gives ~0.05 px accuracy; 100 gives ~0.01 px accuracy.
pub const DEFAULT_UPSAMPLE_FACTOR: usize = 20;

/// Search window (in pixels) around the coarse peak for upsampled DFT refinement.
pub const UPSAMPLE_SEARCH_WINDOW: f64 = 1.5;

/// Results with a reliability score (percent) below this are flagged unreliable.
pub const DEFAULT_MIN_RELIABILITY: f64 = 30.0;

/// Results whose strongest secondary peak exceeds this fraction of the main peak
/// are flagged unreliable.
pub const DEFAULT_MAX_PEAK_RATIO: f64 = 0.8;

/// Half-size of the neighbourhood excluded around the main peak when
/// searching for secondary peaks.
pub const PEAK_EXCLUSION_RADIUS: usize = 2;

/// SSIM stabilisation constants for a unit dynamic range.
pub const SSIM_C1: f64 = 0.01 * 0.01;
pub const SSIM_C2: f64 = 0.03 * 0.03;

/// Nodata value written when the target has none and grid alignment creates empty pixels.
pub const DEFAULT_OUTPUT_NODATA: f64 = -9999.0;

