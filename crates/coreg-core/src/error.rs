use thiserror::Error;

/// Conditions that terminate a co-registration run.
///
/// Kept separate from [`CoregError`] so the orchestrator can retain the
/// failure of a run and hand it back to the caller on request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureKind {
    #[error("Input images have different geographic datums ({reference} vs {target}); reprojection is not supported")]
    DatumMismatch { reference: String, target: String },

    #[error("Input projections are not equal ({reference} vs {target}); reprojection is not supported")]
    ProjectionMismatch { reference: String, target: String },

    #[error("No valid data: {0}")]
    NoValidData(String),

    #[error("Matching window is obscured: {fraction:.1}% of its pixels are masked (limit {limit:.1}%)")]
    ObscuredWindow { fraction: f64, limit: f64 },

    #[error("Matching window out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Matching windows carry no texture to correlate")]
    FeaturelessWindow,

    #[error("Implausible shift of ({dx_map:.3}, {dy_map:.3}) map units exceeds max_shift {max_shift:.3}")]
    ImplausibleShift {
        dx_map: f64,
        dy_map: f64,
        max_shift: f64,
    },
}

#[derive(Error, Debug)]
pub enum CoregError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported raster format: {0}")]
    Format(String),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Estimation error: {0}")]
    Estimation(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error(transparent)]
    Failure(#[from] FailureKind),
}

impl CoregError {
    /// The engine failure behind this error, if it is one.
    pub fn failure(&self) -> Option<&FailureKind> {
        match self {
            Self::Failure(kind) => Some(kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoregError>;
