pub mod align;
pub mod consts;
pub mod correct;
pub mod error;
pub mod geo;
pub mod grid;
pub mod io;
pub mod pipeline;
pub mod quality;
pub mod raster;
pub mod resample;
pub mod validate;
pub mod viz;

pub use error::{CoregError, FailureKind, Result};
pub use pipeline::config::CoregConfig;
pub use pipeline::Coreg;
pub use raster::{Raster, RasterSource};
