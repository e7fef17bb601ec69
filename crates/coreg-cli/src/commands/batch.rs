use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use coreg_core::pipeline::CoregReport;
use coreg_core::{Coreg, CoregConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::matching::{load_config, write_toml};
use crate::progress::batch_bar;
use crate::summary;

#[derive(Args)]
pub struct BatchArgs {
    /// Pair list (TOML with one [[pair]] table per image pair)
    pub pairs: PathBuf,

    /// Config file (TOML) shared by all pairs
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write corrected targets, not only the shifts
    #[arg(long)]
    pub correct: bool,

    /// Number of worker threads (default: all cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write all run reports (TOML) to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// One image pair. Relative paths are resolved against the pair list's directory.
#[derive(Clone, Debug, Deserialize)]
struct BatchPair {
    reference: PathBuf,
    target: PathBuf,
    /// Output path for this pair; falls back to the config's `path_out`, then `"auto"`.
    #[serde(default)]
    path_out: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(rename = "pair", default)]
    pairs: Vec<BatchPair>,
}

#[derive(Serialize)]
struct BatchReport<'a> {
    #[serde(rename = "pair")]
    reports: &'a [CoregReport],
}

pub fn run(args: &BatchArgs) -> Result<()> {
    let config = match args.config {
        Some(ref path) => load_config(path)?,
        None => CoregConfig::default(),
    };
    let pairs = load_pairs(&args.pairs)?;
    if pairs.is_empty() {
        println!("No image pairs in {}", args.pairs.display());
        return Ok(());
    }

    let pool = {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = args.jobs {
            builder = builder.num_threads(jobs);
        }
        builder.build().context("Failed to start worker threads")?
    };

    println!(
        "Processing {} image pair(s) on {} thread(s)",
        pairs.len(),
        pool.current_num_threads()
    );
    let pb = batch_bar(pairs.len())?;

    let reports: Vec<CoregReport> = pool.install(|| {
        pairs
            .par_iter()
            .map(|pair| {
                let report = process_pair(pair, &config, args.correct);
                pb.inc(1);
                report
            })
            .collect()
    });
    pb.finish_with_message("Done");

    summary::print_batch_table(&reports);

    if let Some(ref path) = args.report {
        write_toml(path, &BatchReport { reports: &reports })?;
        println!("\nReport saved to {}", path.display());
    }

    Ok(())
}

fn load_pairs(path: &Path) -> Result<Vec<BatchPair>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pair list {}", path.display()))?;
    let file = parse_pairs(&contents)
        .with_context(|| format!("Invalid pair list {}", path.display()))?;
    let base = path.parent().unwrap_or(Path::new("."));
    Ok(file
        .pairs
        .into_iter()
        .map(|pair| BatchPair {
            reference: base.join(pair.reference),
            target: base.join(pair.target),
            path_out: pair.path_out.map(|p| if p == Path::new("auto") { p } else { base.join(p) }),
        })
        .collect())
}

fn parse_pairs(contents: &str) -> Result<BatchFile> {
    Ok(toml::from_str(contents)?)
}

/// Run one pair to completion. Failures end up in the report, never abort the batch.
fn process_pair(pair: &BatchPair, config: &CoregConfig, correct: bool) -> CoregReport {
    let mut config = config.clone();
    if correct {
        if let Some(ref path_out) = pair.path_out {
            config.output.path_out = Some(path_out.clone());
        } else if config.output.path_out.is_none() {
            config.output.path_out = Some(PathBuf::from("auto"));
        }
    } else {
        config.output.path_out = None;
    }

    let mut coreg = match Coreg::new(pair.reference.clone(), pair.target.clone(), config) {
        Ok(coreg) => coreg,
        Err(err) => {
            warn!(
                reference = %pair.reference.display(),
                target = %pair.target.display(),
                "Pair skipped: {}",
                err
            );
            return CoregReport {
                reference: file_stem(&pair.reference),
                target: file_stem(&pair.target),
                success: false,
                failure: Some(err.to_string()),
                advisories: Vec::new(),
                shift: None,
            };
        }
    };

    let outcome = if correct {
        coreg.correct_shifts().map(|_| ())
    } else {
        coreg.calculate_spatial_shifts().map(|_| ())
    };
    let mut report = coreg.report();
    if let Err(err) = outcome {
        // Errors outside the engine's failure kinds are not retained by `Coreg`.
        if report.failure.is_none() {
            report.success = false;
            report.failure = Some(err.to_string());
        }
    }
    report
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
