pub mod config;
mod orchestrator;
pub mod types;

pub use orchestrator::Coreg;
pub use types::{
    Advisory, AdvisoryKind, CoregReport, CoregStage, NoOpReporter, ProgressReporter, ShiftResult,
};
