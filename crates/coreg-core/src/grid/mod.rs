pub mod reconcile;
pub mod window;

pub use reconcile::{reconcile, Reconciliation};
pub use window::{extract_window, resolve_window, ExtractOptions, SampleWindow, WindowSpec};
