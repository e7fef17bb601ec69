use std::time::Duration;

use anyhow::Result;
use coreg_core::pipeline::{CoregStage, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner showing the current co-registration stage.
pub struct SpinnerReporter {
    pb: ProgressBar,
}

impl SpinnerReporter {
    pub fn new() -> Result<Self> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg:28} {pos}/{len}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        Ok(Self { pb })
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProgressReporter for SpinnerReporter {
    fn begin_stage(&self, stage: CoregStage, total_items: Option<usize>) {
        self.pb.set_message(stage.to_string());
        self.pb.set_length(total_items.unwrap_or(1) as u64);
        self.pb.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.pb.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.pb.length() {
            self.pb.set_position(len);
        }
    }
}

/// Bar counting finished pairs in batch mode.
pub fn batch_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:12} [{bar:40}] {pos}/{len} pairs")?
            .progress_chars("=> "),
    );
    pb.set_message("Matching");
    Ok(pb)
}
