use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use coreg_core::io::OutputFormat;
use coreg_core::pipeline::config::{CoregConfig, OutputConfig};

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full default CoregConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = CoregConfig {
        output: OutputConfig {
            path_out: Some(PathBuf::from("auto")),
            fmt_out: OutputFormat::Envi,
            creation_options: vec![],
        },
        ..Default::default()
    };
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
