use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use coreg_core::io::OutputFormat;
use coreg_core::{Coreg, CoregConfig};

use super::matching::{MatchArgs, ResamplingArg};
use crate::progress::SpinnerReporter;
use crate::summary;

#[derive(Args)]
pub struct CorrectArgs {
    /// Reference image
    pub reference: PathBuf,

    /// Target image
    pub target: PathBuf,

    #[command(flatten)]
    pub matching: MatchArgs,

    /// Output file path, or "auto" for <target>__shifted_to__<reference> next to the target
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (ENVI or GTiff)
    #[arg(long)]
    pub format: Option<String>,

    /// Writer creation option KEY=VALUE (repeatable)
    #[arg(long = "co")]
    pub creation_options: Vec<String>,

    /// Resample the corrected target onto the reference grid
    #[arg(long)]
    pub align_grids: bool,

    /// Resampling used for the corrected output
    #[arg(long, value_enum)]
    pub resamp_deshift: Option<ResamplingArg>,

    /// Output pixel size: GSD or X,Y (with --align-grids)
    #[arg(long, value_delimiter = ',')]
    pub out_gsd: Option<Vec<f64>>,
}

impl CorrectArgs {
    fn build_config(&self) -> Result<CoregConfig> {
        let mut config = self.matching.build_config()?;

        if let Some(ref output) = self.output {
            config.output.path_out = Some(output.clone());
        } else if config.output.path_out.is_none() {
            config.output.path_out = Some(PathBuf::from("auto"));
        }
        if let Some(ref format) = self.format {
            config.output.fmt_out = format.parse::<OutputFormat>()?;
        }
        if !self.creation_options.is_empty() {
            config.output.creation_options = self.creation_options.clone();
        }
        if self.align_grids {
            config.correction.align_grids = true;
        }
        if let Some(method) = self.resamp_deshift {
            config.correction.resamp_alg_deshift = method.into();
        }
        if let Some(ref gsd) = self.out_gsd {
            config.correction.out_gsd = Some(match gsd.as_slice() {
                [g] => (*g, *g),
                [x, y] => (*x, *y),
                _ => bail!("--out-gsd takes one or two values"),
            });
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn run(args: &CorrectArgs) -> Result<()> {
    let config = args.build_config()?;

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
    let corrected = coreg.correct_shifts().map(|deshift| {
        (
            deshift.is_resampled,
            deshift.original_geotransform,
            deshift.updated_geotransform(),
        )
    });
    reporter.finish();

    summary::print_run_header(&coreg);
    if let Some(shift) = coreg.shift() {
        summary::print_shift(shift);
    }
    summary::print_advisories(&coreg);

    let (is_resampled, before, after) = corrected.context("Shift correction failed")?;
    println!();
    if is_resampled {
        println!("Target resampled onto the reference grid");
    } else {
        println!(
            "Target origin moved from ({:.3}, {:.3}) to ({:.3}, {:.3})",
            before.top_left_x, before.top_left_y, after.top_left_x, after.top_left_y
        );
    }
    if let Some(path) = coreg.path_out() {
        println!("Output saved to {}", path.display());
    }

    Ok(())
}
