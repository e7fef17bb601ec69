use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use coreg_core::Coreg;

use super::matching::{write_toml, MatchArgs};
use crate::progress::SpinnerReporter;
use crate::summary;

#[derive(Args)]
pub struct DetectArgs {
    /// Reference image
    pub reference: PathBuf,

    /// Target image
    pub target: PathBuf,

    #[command(flatten)]
    pub matching: MatchArgs,

    /// Write the run report (TOML) to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Save correlation surface and match window PNGs into this directory
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,
}

pub fn run(args: &DetectArgs) -> Result<()> {
    let config = args.matching.build_config()?;

    let reporter = Arc::new(SpinnerReporter::new()?);
    let setup = Coreg::with_reporter(
        args.reference.clone(),
        args.target.clone(),
        config,
        reporter.clone(),
    );
    let mut coreg = match setup {
        Ok(coreg) => coreg,
        Err(err) => {
            reporter.finish();
            return Err(err).context("Failed to prepare co-registration");
        }
    };
    let estimate = coreg.calculate_spatial_shifts().map(|_| ());
    reporter.finish();

    summary::print_run_header(&coreg);
    if let Some(shift) = coreg.shift() {
        summary::print_shift(shift);
    }
    summary::print_advisories(&coreg);

    if let Some(ref path) = args.report {
        write_toml(path, &coreg.report())?;
        println!("\nReport saved to {}", path.display());
    }
    if let (Some(dir), Some(diagnostics)) = (&args.diagnostics, coreg.diagnostics()) {
        let stem = format!(
            "{}__{}",
            coreg.target().display_name(),
            coreg.reference().display_name()
        );
        for path in diagnostics.save_pngs(dir, &stem)? {
            println!("Diagnostic image saved to {}", path.display());
        }
    }

    estimate.context("Shift estimation failed")
}
