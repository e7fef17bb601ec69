pub mod fft;
pub mod phase_correlation;
pub mod subpixel;

pub use phase_correlation::{compute_shift, shift_array, PixelShift, ShiftEstimate};
