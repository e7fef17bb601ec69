pub mod ssim;

pub use ssim::{ssim, ssim_before_after};
