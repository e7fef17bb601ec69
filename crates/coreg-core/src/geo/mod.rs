pub mod projection;
pub mod transform;

pub use projection::Projection;
pub use transform::{BoundingBox, GeoTransform};
